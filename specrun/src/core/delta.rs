//! Repository delta: which paths changed between two `git status` snapshots.

use std::collections::BTreeSet;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file (the new path for renames).
    pub path: String,
}

/// Parse one porcelain line; `None` for blank or malformed lines.
pub fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        let path = path.trim();
        return (!path.is_empty()).then(|| StatusEntry {
            code: "??".to_string(),
            path: path.to_string(),
        });
    }
    let code = line.get(..2)?;
    if code.trim().is_empty() {
        return None;
    }
    let mut path = line.get(3..)?.trim();
    if code.contains(['R', 'C'])
        && let Some((_, new)) = path.split_once(" -> ")
    {
        path = new.trim();
    }
    if path.is_empty() {
        return None;
    }
    Some(StatusEntry {
        code: code.to_string(),
        path: path.to_string(),
    })
}

/// Every changed path listed in porcelain output.
pub fn changed_paths(porcelain: &str) -> BTreeSet<String> {
    porcelain
        .lines()
        .filter_map(parse_status_line)
        .map(|entry| entry.path)
        .collect()
}

/// A status snapshot, or the reason it could not be taken.
pub type Snapshot = Result<BTreeSet<String>, String>;

/// Files changed by an executor call, plus a warning if that is unknowable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDelta {
    pub files: Vec<String>,
    pub warning: Option<String>,
}

/// Paths present in `after` but not in `before`, sorted.
///
/// A failed snapshot on either side yields no files and a warning.
pub fn compute_delta(before: &Snapshot, after: &Snapshot) -> FileDelta {
    match (before, after) {
        (Ok(before), Ok(after)) => FileDelta {
            files: after.difference(before).cloned().collect(),
            warning: None,
        },
        (Err(reason), _) | (_, Err(reason)) => FileDelta {
            files: Vec::new(),
            warning: Some(format!("Git status unavailable: {reason}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn parses_untracked_line() {
        let e = parse_status_line("?? foo.txt").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: "??".to_string(),
                path: "foo.txt".to_string()
            }
        );
    }

    #[test]
    fn parses_modified_line() {
        let e = parse_status_line(" M src/main.rs").expect("parse");
        assert_eq!(e.code, " M");
        assert_eq!(e.path, "src/main.rs");
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.txt -> new.txt").expect("parse");
        assert_eq!(e.path, "new.txt");
    }

    #[test]
    fn arrow_in_tracked_file_name_is_kept() {
        let e = parse_status_line(" M a->b.rs").expect("parse");
        assert_eq!(e.path, "a->b.rs");
        let e = parse_status_line("RM a->b.rs -> c.rs").expect("parse");
        assert_eq!(e.path, "c.rs");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        assert_eq!(parse_status_line(""), None);
        assert_eq!(parse_status_line("M"), None);
        assert_eq!(parse_status_line("   "), None);
        assert_eq!(parse_status_line("?? "), None);
    }

    #[test]
    fn changed_paths_collects_every_entry() {
        let porcelain = " M a.rs\n?? b.rs\nR  c.rs -> d.rs\n\n";
        assert_eq!(changed_paths(porcelain), set(&["a.rs", "b.rs", "d.rs"]));
    }

    #[test]
    fn delta_is_set_difference() {
        let delta = compute_delta(&Ok(set(&["a.rs"])), &Ok(set(&["a.rs", "z.rs", "b.rs"])));
        assert_eq!(delta.files, vec!["b.rs", "z.rs"]);
        assert_eq!(delta.warning, None);
    }

    #[test]
    fn failed_snapshot_degrades_to_warning() {
        let delta = compute_delta(&Err("not a git repository".to_string()), &Ok(set(&["a.rs"])));
        assert!(delta.files.is_empty());
        assert_eq!(
            delta.warning.as_deref(),
            Some("Git status unavailable: not a git repository")
        );

        let delta = compute_delta(&Ok(set(&[])), &Err("boom".to_string()));
        assert_eq!(delta.warning.as_deref(), Some("Git status unavailable: boom"));
    }
}
