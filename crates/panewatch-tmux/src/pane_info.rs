//! Pane listing: the `list-panes -a -F` format string and its parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use panewatch_core::types::{Pane, Target};

use crate::error::TmuxError;
use crate::executor::{CommandSpawner, TargetExecutor};

/// ASCII Unit Separator. Chosen because it cannot appear in pane titles,
/// paths, or command names.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Ten-field format string for `tmux list-panes -a -F`.
pub const LIST_PANES_FORMAT: &str = "#{pane_id}\u{1f}#{session_name}\u{1f}#{window_id}\u{1f}#{window_name}\u{1f}#{pane_current_command}\u{1f}#{pane_pid}\u{1f}#{pane_tty}\u{1f}#{pane_current_path}\u{1f}#{history_bytes}\u{1f}#{pane_title}";

/// One parsed `list-panes` row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaneRow {
    pub pane_id: String,
    pub session_name: String,
    pub window_id: String,
    pub window_name: String,
    pub current_cmd: String,
    pub current_pid: Option<i64>,
    pub tty: String,
    pub current_path: String,
    pub history_bytes: u64,
    pub title: String,
}

impl PaneRow {
    /// Convert into the store-level pane record.
    pub fn into_pane(self, target_id: &str, now: DateTime<Utc>) -> Pane {
        Pane {
            target_id: target_id.to_string(),
            pane_id: self.pane_id,
            session_name: self.session_name,
            window_id: self.window_id,
            window_name: self.window_name,
            current_cmd: self.current_cmd,
            current_pid: self.current_pid,
            tty: self.tty,
            current_path: self.current_path,
            history_bytes: self.history_bytes,
            title: self.title,
            updated_at: now,
        }
    }
}

/// Execute `tmux list-panes -a` on a target and parse the output.
pub async fn list_panes<S: CommandSpawner>(
    executor: &TargetExecutor<S>,
    target: &Target,
    cancel: &CancellationToken,
) -> Result<Vec<PaneRow>, TmuxError> {
    let argv = vec![
        "tmux".to_string(),
        "list-panes".to_string(),
        "-a".to_string(),
        "-F".to_string(),
        LIST_PANES_FORMAT.to_string(),
    ];
    let output = executor.run(target, &argv, cancel).await?;
    parse_list_panes_output(&output.output_text)
}

/// Parse the raw output of `tmux list-panes -a -F <FORMAT>`.
///
/// Structural violations (missing fields, malformed ids) fail hard.
pub fn parse_list_panes_output(output: &str) -> Result<Vec<PaneRow>, TmuxError> {
    let mut rows = Vec::new();
    for (idx, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(line, idx + 1)?);
    }
    Ok(rows)
}

/// Split a row into its ten fields.
///
/// Accepts, in order of preference: the Unit Separator, a literal TAB,
/// the two-character sequence `\t` (produced by some tmux quoting paths),
/// and a legacy underscore separator.
fn split_fields(line: &str) -> Vec<&str> {
    for separator in [FIELD_SEPARATOR.to_string(), "\t".to_string()] {
        let parts: Vec<&str> = line.split(separator.as_str()).collect();
        if parts.len() >= 10 {
            return parts;
        }
    }
    let escaped: Vec<&str> = line.split("\\t").collect();
    if escaped.len() >= 10 {
        return escaped;
    }
    line.split('_').collect()
}

fn parse_line(line: &str, line_num: usize) -> Result<PaneRow, TmuxError> {
    let parts = split_fields(line);
    if parts.len() < 10 {
        return Err(TmuxError::Parse {
            line_num,
            detail: format!("expected 10 separated fields, got {}", parts.len()),
        });
    }

    let pane_id = parts[0].trim();
    if !pane_id.starts_with('%') {
        return Err(TmuxError::Parse {
            line_num,
            detail: format!("pane id must begin with '%': {pane_id:?}"),
        });
    }
    let window_id = parts[2].trim();
    if !window_id.starts_with('@') {
        return Err(TmuxError::Parse {
            line_num,
            detail: format!("window id must begin with '@': {window_id:?}"),
        });
    }

    let current_pid: Option<i64> = parts[5].trim().parse().ok();
    let history_bytes: u64 = parts[8].trim().parse().unwrap_or(0);

    // Titles may themselves contain the legacy separator; everything past
    // the ninth field is rejoined.
    let title = if parts.len() > 10 {
        parts[9..].join("_")
    } else {
        parts[9].to_string()
    };

    Ok(PaneRow {
        pane_id: pane_id.to_string(),
        session_name: parts[1].to_string(),
        window_id: window_id.to_string(),
        window_name: parts[3].to_string(),
        current_cmd: parts[4].to_string(),
        current_pid,
        tty: parts[6].to_string(),
        current_path: parts[7].to_string(),
        history_bytes,
        title,
    })
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn row(separator: &str) -> String {
        [
            "%3",
            "main",
            "@1",
            "dev",
            "codex",
            "4242",
            "/dev/ttys005",
            "/home/user/project",
            "16384",
            "codex session",
        ]
        .join(separator)
    }

    #[test]
    fn parse_unit_separator_row() {
        let line = row("\u{1f}");
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.pane_id, "%3");
        assert_eq!(pane.session_name, "main");
        assert_eq!(pane.window_id, "@1");
        assert_eq!(pane.window_name, "dev");
        assert_eq!(pane.current_cmd, "codex");
        assert_eq!(pane.current_pid, Some(4242));
        assert_eq!(pane.tty, "/dev/ttys005");
        assert_eq!(pane.current_path, "/home/user/project");
        assert_eq!(pane.history_bytes, 16384);
        assert_eq!(pane.title, "codex session");
    }

    #[test]
    fn parse_tab_separated_row() {
        let line = row("\t");
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.pane_id, "%3");
        assert_eq!(pane.title, "codex session");
    }

    #[test]
    fn parse_escaped_tab_row() {
        // Some tmux quoting paths emit a literal backslash-t.
        let line = row("\\t");
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.pane_id, "%3");
        assert_eq!(pane.current_cmd, "codex");
    }

    #[test]
    fn parse_legacy_underscore_row() {
        let line = [
            "%0", "main", "@0", "dev", "zsh", "100", "ttys000", "/home", "0", "shell",
        ]
        .join("_");
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.pane_id, "%0");
        assert_eq!(pane.title, "shell");
    }

    #[test]
    fn legacy_separator_rejoins_title_underscores() {
        let line = [
            "%0", "main", "@0", "dev", "zsh", "100", "ttys000", "/home", "0", "my", "title",
        ]
        .join("_");
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.title, "my_title");
    }

    #[test]
    fn parse_multiple_rows_skips_blank_lines() {
        let output = format!("{}\n\n{}\n", row("\u{1f}"), row("\u{1f}"));
        let rows = parse_list_panes_output(&output).expect("parse");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn parse_empty_output() {
        let rows = parse_list_panes_output("").expect("parse");
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_fields_fail_hard() {
        let err = parse_list_panes_output("%0\u{1f}main\u{1f}@0").expect_err("should fail");
        assert!(matches!(err, TmuxError::Parse { line_num: 1, .. }));
    }

    #[test]
    fn invalid_pane_id_fails_hard() {
        let line = row("\u{1f}").replacen("%3", "3", 1);
        let err = parse_line(&line, 7).expect_err("should fail");
        match err {
            TmuxError::Parse { line_num, detail } => {
                assert_eq!(line_num, 7);
                assert!(detail.contains('%'));
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn invalid_window_id_fails_hard() {
        let line = row("\u{1f}").replacen("@1", "1", 1);
        assert!(parse_line(&line, 1).is_err());
    }

    #[test]
    fn missing_pid_parses_as_none() {
        let line = row("\u{1f}").replacen("4242", "", 1);
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.current_pid, None);
    }

    #[test]
    fn unparseable_history_defaults_to_zero() {
        let line = row("\u{1f}").replacen("16384", "n/a", 1);
        let pane = parse_line(&line, 1).expect("parse");
        assert_eq!(pane.history_bytes, 0);
    }

    #[test]
    fn format_string_has_ten_fields() {
        assert_eq!(LIST_PANES_FORMAT.matches(FIELD_SEPARATOR).count(), 9);
        assert!(LIST_PANES_FORMAT.starts_with("#{pane_id}"));
        assert!(LIST_PANES_FORMAT.ends_with("#{pane_title}"));
    }

    #[test]
    fn into_pane_carries_all_fields() {
        let now = Utc::now();
        let pane = parse_line(&row("\u{1f}"), 1)
            .expect("parse")
            .into_pane("local", now);
        assert_eq!(pane.target_id, "local");
        assert_eq!(pane.pane_id, "%3");
        assert_eq!(pane.current_pid, Some(4242));
        assert_eq!(pane.updated_at, now);
    }
}
