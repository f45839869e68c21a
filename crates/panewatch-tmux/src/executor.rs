//! Target executor: runs argv against a local or ssh target with a
//! per-attempt deadline, read-only-verb retries, and cancellation.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use panewatch_core::types::{Target, TargetKind};

use crate::error::TmuxError;

/// tmux verbs that are safe to retry. Anything else, `send-keys`
/// included, executes exactly once.
pub const READ_ONLY_VERBS: &[&str] = &[
    "list-panes",
    "list-windows",
    "list-sessions",
    "display-message",
    "capture-pane",
    "show-options",
    "show-environment",
];

/// Fixed ssh option set applied to every ssh invocation.
const SSH_CONTROL_PERSIST_SECS: u64 = 60;

/// Successful execution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub output_text: String,
    pub duration: Duration,
}

/// Trait seam for spawning a subprocess. Enables mock injection in tests.
pub trait CommandSpawner: Send + Sync {
    /// Run `argv` with the given per-attempt deadline and return stdout.
    fn spawn(
        &self,
        argv: &[String],
        deadline: Duration,
    ) -> impl Future<Output = Result<String, TmuxError>> + Send;
}

/// Real subprocess spawner using `tokio::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl<T: CommandSpawner + ?Sized> CommandSpawner for std::sync::Arc<T> {
    async fn spawn(&self, argv: &[String], deadline: Duration) -> Result<String, TmuxError> {
        self.as_ref().spawn(argv, deadline).await
    }
}

impl CommandSpawner for ProcessSpawner {
    async fn spawn(&self, argv: &[String], deadline: Duration) -> Result<String, TmuxError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(TmuxError::CommandFailed("empty argv".into()));
        };

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(deadline, command.output()).await {
            Ok(result) => result.map_err(TmuxError::Io)?,
            Err(_) => {
                return Err(TmuxError::TargetUnreachable(format!(
                    "attempt timed out after {deadline:?}"
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Executor wrapping a spawner with target addressing and retry policy.
#[derive(Debug, Clone)]
pub struct TargetExecutor<S> {
    pub(crate) spawner: S,
    command_timeout: Duration,
    connect_timeout_secs: u64,
    retry_backoff: Vec<Duration>,
}

impl<S: CommandSpawner> TargetExecutor<S> {
    pub fn new(
        spawner: S,
        command_timeout: Duration,
        connect_timeout_secs: u64,
        retry_backoff_ms: &[u64],
    ) -> Self {
        Self {
            spawner,
            command_timeout,
            connect_timeout_secs,
            retry_backoff: retry_backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }

    /// Run `argv` on `target`. `argv[0]` is the program to run there.
    ///
    /// Timeout, cancellation and exhausted retries all surface as
    /// `target_unreachable`, wrapping the last underlying error.
    pub async fn run(
        &self,
        target: &Target,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, TmuxError> {
        let full_argv = self.address(target, argv)?;
        let attempts = if retryable(argv) {
            1 + self.retry_backoff.len()
        } else {
            1
        };

        let mut last_error: Option<TmuxError> = None;
        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(TmuxError::TargetUnreachable("cancelled".into()));
            }

            if attempt > 0 {
                let backoff = self.retry_backoff[attempt - 1];
                let pause = backoff + jitter(backoff);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(TmuxError::TargetUnreachable("cancelled".into()));
                    }
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            let started = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TmuxError::TargetUnreachable("cancelled".into()));
                }
                result = self.spawner.spawn(&full_argv, self.command_timeout) => result,
            };

            match result {
                Ok(output_text) => {
                    return Ok(ExecOutput {
                        output_text,
                        duration: started.elapsed(),
                    });
                }
                Err(error) => {
                    tracing::debug!(
                        target_id = %target.target_id,
                        attempt,
                        %error,
                        "target command attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".into());
        Err(TmuxError::TargetUnreachable(detail))
    }

    /// Wrap argv for the target's transport.
    fn address(&self, target: &Target, argv: &[String]) -> Result<Vec<String>, TmuxError> {
        match target.kind {
            TargetKind::Local => Ok(argv.to_vec()),
            TargetKind::Ssh => {
                let connection = target.connection.as_deref().unwrap_or("");
                if connection.is_empty() {
                    return Err(TmuxError::UnsafeConnection("empty connection ref".into()));
                }
                if connection.starts_with('-') {
                    return Err(TmuxError::UnsafeConnection(connection.into()));
                }
                let mut wrapped = vec![
                    "ssh".to_string(),
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    "-o".to_string(),
                    format!("ConnectTimeout={}", self.connect_timeout_secs),
                    "-o".to_string(),
                    "ControlMaster=auto".to_string(),
                    "-o".to_string(),
                    format!("ControlPersist={SSH_CONTROL_PERSIST_SECS}"),
                    connection.to_string(),
                ];
                wrapped.extend(argv.iter().cloned());
                Ok(wrapped)
            }
        }
    }
}

/// Retry only read-only tmux verbs. `argv[0]` is the program; when it is
/// tmux the verb follows it, otherwise the first element is checked
/// directly.
fn retryable(argv: &[String]) -> bool {
    let verb = match argv.first() {
        Some(program) if basename(program) == "tmux" => argv.get(1),
        first => first,
    };
    verb.is_some_and(|v| READ_ONLY_VERBS.contains(&v.as_str()))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Deterministic jitter in [0, backoff/4), derived from the wall clock.
fn jitter(backoff: Duration) -> Duration {
    let quarter = backoff / 4;
    if quarter.is_zero() {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Duration::from_nanos((nanos % quarter.as_nanos()) as u64)
}

// ─── Tests ────────────────────────────────────────────────────────
