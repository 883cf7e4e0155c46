//! Dependency-ordered spec runner.
//!
//! Reads a YAML spec collection, orders it by dependencies, and executes one
//! spec per step against a coding backend (mock, Codex CLI, or Claude Code
//! CLI). Exit codes are listed in [`specrun::exit_codes`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use specrun::backend::{BackendKind, create_backend};
use specrun::io::config::ConfigOverrides;
use specrun::run::{
    CommitOutcome, RunRequest, StateOutcome, execute_run, load_runner_config, render_progress,
};
use specrun::{doctor, exit_codes, logging, plan};

#[derive(Parser)]
#[command(
    name = "specrun",
    version,
    about = "Run dependency-ordered specs against coding backends"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute specs in dependency order.
    Run(RunArgs),
    /// Validate a spec file and print the resolved order.
    Plan {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Check git, the spec file, configuration, and the backend CLI.
    Doctor {
        #[arg(long)]
        spec: Option<PathBuf>,
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Send a free-form prompt to the backend and print its reply.
    Chat {
        #[arg(long)]
        prompt: String,
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// YAML spec file.
    #[arg(long)]
    spec: PathBuf,
    /// Repository the backend works in.
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    #[arg(long)]
    max_steps: Option<u32>,
    #[arg(long)]
    max_attempts: Option<u32>,
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
    /// Overrides the goal from the spec file.
    #[arg(long)]
    goal: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long, conflicts_with = "continue_on_failure")]
    stop_on_failure: bool,
    #[arg(long)]
    continue_on_failure: bool,
    /// Write the JSON run record here.
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// Write the Markdown report here.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write a repository state snapshot (JSON) here.
    #[arg(long)]
    state: Option<PathBuf>,
    /// Commit tracked changes after the run.
    #[arg(long)]
    auto_commit: bool,
    /// Conventional-commit type for the auto-commit, e.g. `chore` or `feat(core)`.
    #[arg(long, requires = "auto_commit")]
    commit_prefix: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    fn into_request(self) -> RunRequest {
        let stop_on_failure = match (self.stop_on_failure, self.continue_on_failure) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        RunRequest {
            spec_path: self.spec,
            repo_path: self.repo,
            config_path: self.config,
            goal: self.goal,
            overrides: ConfigOverrides {
                backend: self.backend,
                max_steps: self.max_steps,
                max_attempts: self.max_attempts,
                stop_on_failure,
                timeout_secs: self.timeout_secs,
            },
            summary_out: self.summary_out,
            report_out: self.report,
            state_out: self.state,
            auto_commit: self.auto_commit,
            commit_prefix: self.commit_prefix,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init(cli.verbose);
    let code = match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Run(args) => cmd_run(args),
        Command::Plan { spec } => {
            let plan = plan::build_plan(&spec)?;
            print!("{}", plan::render_plan(&plan));
            Ok(exit_codes::OK)
        }
        Command::Doctor {
            spec,
            backend,
            config,
            repo,
        } => {
            let checks =
                doctor::run_checks(&repo, spec.as_deref(), config.as_deref(), backend, env_var);
            print!("{}", doctor::render_checks(&checks));
            Ok(doctor::exit_code(&checks))
        }
        Command::Chat {
            prompt,
            backend,
            config,
            repo,
        } => {
            let overrides = ConfigOverrides {
                backend,
                ..ConfigOverrides::default()
            };
            let config = load_runner_config(&repo, config.as_deref(), env_var, &overrides)?;
            let backend = create_backend(config.backend, &config);
            let reply = backend
                .chat(&prompt, Some(&repo))
                .with_context(|| format!("{} chat", backend.name()))?;
            println!("{reply}");
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let request = args.into_request();
    let outcome = execute_run(&request, env_var, |_| {})?;
    print!("{}", render_progress(&outcome.summary));
    if let Some(path) = &request.summary_out {
        println!("Summary written to {}", path.display());
    }
    if let Some(path) = &request.report_out {
        println!("Report written to {}", path.display());
    }
    match &outcome.state {
        Some(StateOutcome::Written(path)) => println!("State written to {}", path.display()),
        Some(StateOutcome::Failed(err)) => eprintln!("Error: state snapshot failed: {err}"),
        None => {}
    }
    match &outcome.commit {
        Some(CommitOutcome::Created) => println!("Auto-commit created."),
        Some(CommitOutcome::Skipped) => println!("Auto-commit skipped (no changes)."),
        Some(CommitOutcome::Failed(err)) => eprintln!("Auto-commit failed: {err}"),
        None => {}
    }
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_flags() {
        let cli = Cli::parse_from([
            "specrun",
            "run",
            "--spec",
            "specs.yaml",
            "--max-steps",
            "4",
            "--backend",
            "codex",
            "--continue-on-failure",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.into_request();
        assert_eq!(request.overrides.max_steps, Some(4));
        assert_eq!(request.overrides.backend, Some(BackendKind::Codex));
        assert_eq!(request.overrides.stop_on_failure, Some(false));
        assert_eq!(request.repo_path, PathBuf::from("."));
    }

    #[test]
    fn stop_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "specrun",
            "run",
            "--spec",
            "s.yaml",
            "--stop-on-failure",
            "--continue-on-failure",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn commit_prefix_requires_auto_commit() {
        let parsed =
            Cli::try_parse_from(["specrun", "run", "--spec", "s.yaml", "--commit-prefix", "feat"]);
        assert!(parsed.is_err());
    }
}
