//! Helpers for running child processes with timeouts and bounded output.

use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long to keep reading output once the child has exited.
///
/// Processes outside the killed group can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// On Unix the child leads its own process group, and on timeout the whole group is killed and
/// `timed_out` is set. Reading stops [`DRAIN_GRACE`] after the child exits; whatever was
/// captured by then is returned.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_sink = spawn_reader(stdout, output_limit_bytes, done_tx.clone());
    let stderr_sink = spawn_reader(stderr, output_limit_bytes, done_tx);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing process group"
            );
            timed_out = true;
            kill_process_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    drain_readers(&done_rx, 2)?;
    let (stdout, stdout_truncated) = take_captured(&stdout_sink).context("collect stdout")?;
    let (stderr, stderr_truncated) = take_captured(&stderr_sink).context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            warn!(%err, "killpg failed, killing child only");
            child.kill().context("kill command")?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

type Sink = Arc<Mutex<Captured>>;

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    done: mpsc::Sender<Result<()>>,
) -> Sink {
    let sink = Sink::default();
    let thread_sink = Arc::clone(&sink);
    thread::spawn(move || {
        let result = read_stream_limited(reader, limit, &thread_sink);
        let _ = done.send(result);
    });
    sink
}

/// Wait for `readers` end-of-stream signals, giving up after [`DRAIN_GRACE`].
fn drain_readers(done: &mpsc::Receiver<Result<()>>, readers: usize) -> Result<()> {
    let deadline = Instant::now() + DRAIN_GRACE;
    let mut pending = readers;
    while pending > 0 {
        match done.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(result) => {
                result?;
                pending -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(pending, "output pipes still open after exit, keeping partial output");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
    }
    Ok(())
}

fn take_captured(sink: &Sink) -> Result<(Vec<u8>, usize)> {
    let mut captured = sink
        .lock()
        .map_err(|_| anyhow!("output reader thread panicked"))?;
    let Captured { bytes, truncated } = std::mem::take(&mut *captured);
    Ok((bytes, truncated))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, sink: &Sink) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut captured = sink
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let remaining = limit.saturating_sub(captured.bytes.len());
        let keep = n.min(remaining);
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }

    Ok(())
}

/// Locate an executable by name or path.
///
/// Names containing a path separator are checked directly; bare names are
/// searched on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; echo oops >&2; exit 3"]);
        let out = run_command_with_timeout(cmd, Duration::from_secs(10), 1024).expect("run");
        assert_eq!(out.stdout_text().trim(), "hello");
        assert_eq!(out.stderr_text().trim(), "oops");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.timed_out);
    }

    #[test]
    fn kills_child_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exec sleep 5"]);
        let out = run_command_with_timeout(cmd, Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
    }

    #[test]
    fn timeout_kills_grandchildren_holding_the_pipes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5; echo late"]);
        let started = Instant::now();
        let out = run_command_with_timeout(cmd, Duration::from_millis(300), 1024).expect("run");
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn background_process_does_not_hold_up_return() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 6 & echo hi"]);
        let started = Instant::now();
        let out = run_command_with_timeout(cmd, Duration::from_secs(10), 1024).expect("run");
        assert!(!out.timed_out);
        assert_eq!(out.stdout_text().trim(), "hi");
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 0123456789"]);
        let out = run_command_with_timeout(cmd, Duration::from_secs(10), 4).expect("run");
        assert_eq!(out.stdout, b"0123");
        assert_eq!(out.stdout_truncated, 6);
    }

    #[test]
    fn finds_sh_on_path_and_rejects_missing_names() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("definitely-not-a-real-binary-xyz").is_none());
        assert!(find_executable("").is_none());
    }
}
