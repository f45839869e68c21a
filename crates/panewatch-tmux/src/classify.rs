//! Agent-type classification for a pane.
//!
//! The pane's `current_cmd` is checked for known agent tokens first. Known
//! wrapper runtimes (node, python, ...) hide the agent binary behind the
//! interpreter, so those panes get a `ps -t <tty>` probe. Shells and empty
//! commands never probe: they are `none`.

use tokio_util::sync::CancellationToken;

use panewatch_core::types::{AgentType, Target};

use crate::executor::{CommandSpawner, TargetExecutor};

/// Agent binary tokens matched case-insensitively as substrings.
const AGENT_TOKENS: &[(&str, AgentType)] = &[
    ("codex", AgentType::Codex),
    ("claude", AgentType::Claude),
    ("gemini", AgentType::Gemini),
];

/// Interpreter commands that commonly wrap agent CLIs.
const WRAPPER_RUNTIMES: &[&str] = &[
    "node", "nodejs", "python", "python3", "ruby", "java", "bun", "deno",
];

/// Shell basenames; case-insensitive, login-shell `-` prefix stripped.
const KNOWN_SHELLS: &[&str] = &[
    "zsh", "bash", "fish", "sh", "dash", "nu", "pwsh", "tcsh", "csh", "ksh", "ash",
];

/// Scan a string for a known agent token.
pub fn agent_token_in(text: &str) -> Option<AgentType> {
    let lower = text.to_ascii_lowercase();
    AGENT_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, agent)| *agent)
}

pub fn is_wrapper_runtime(current_cmd: &str) -> bool {
    WRAPPER_RUNTIMES.contains(&cmd_basename(current_cmd).as_str())
}

pub fn is_known_shell(current_cmd: &str) -> bool {
    KNOWN_SHELLS.contains(&cmd_basename(current_cmd).as_str())
}

/// Basename of a command, lowercased, login-shell `-` prefix stripped.
fn cmd_basename(cmd: &str) -> String {
    let trimmed = cmd.trim();
    let basename = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let first_word = basename.split_whitespace().next().unwrap_or(basename);
    let stripped = first_word.strip_prefix('-').unwrap_or(first_word);
    stripped.to_ascii_lowercase()
}

/// Classify the agent hosted by a pane.
///
/// 1. `current_cmd` containing an agent token wins outright.
/// 2. A wrapper runtime with a TTY gets a `ps -t <tty> -o command=` probe
///    (both the raw tty and its `/dev/`-stripped form are tried).
/// 3. Everything else (shells, editors, empty commands) is `none`.
pub async fn classify_agent<S: CommandSpawner>(
    executor: &TargetExecutor<S>,
    target: &Target,
    current_cmd: &str,
    tty: &str,
    cancel: &CancellationToken,
) -> AgentType {
    if let Some(agent) = agent_token_in(current_cmd) {
        return agent;
    }

    // Shells and empty commands never trigger the TTY probe.
    if current_cmd.trim().is_empty() || is_known_shell(current_cmd) {
        return AgentType::None;
    }
    if !is_wrapper_runtime(current_cmd) || tty.is_empty() {
        return AgentType::None;
    }

    for probe_tty in tty_probe_forms(tty) {
        let argv = vec![
            "ps".to_string(),
            "-t".to_string(),
            probe_tty,
            "-o".to_string(),
            "command=".to_string(),
        ];
        match executor.run(target, &argv, cancel).await {
            Ok(output) => {
                if let Some(agent) = scan_process_lines(&output.output_text) {
                    return agent;
                }
            }
            Err(error) => {
                tracing::debug!(
                    target_id = %target.target_id,
                    tty,
                    %error,
                    "tty probe failed"
                );
            }
        }
    }

    AgentType::None
}

/// Probe forms for a tty path: raw, then `/dev/`-stripped.
fn tty_probe_forms(tty: &str) -> Vec<String> {
    let mut forms = vec![tty.to_string()];
    if let Some(stripped) = tty.strip_prefix("/dev/") {
        forms.push(stripped.to_string());
    }
    forms
}

/// Scan `ps` output lines for an agent token.
fn scan_process_lines(output: &str) -> Option<AgentType> {
    output.lines().find_map(agent_token_in)
}

// ─── Tests ────────────────────────────────────────────────────────
