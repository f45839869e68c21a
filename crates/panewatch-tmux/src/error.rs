//! Error types for the target/tmux backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    /// The subprocess ran but exited non-zero.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Retries exhausted, attempt timed out, or the caller cancelled.
    #[error("target unreachable: {0}")]
    TargetUnreachable(String),

    /// ssh connection-ref begins with `-` (option injection).
    #[error("unsafe ssh connection ref: {0}")]
    UnsafeConnection(String),

    #[error("failed to parse list-panes line {line_num}: {detail}")]
    Parse { line_num: usize, detail: String },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    /// Both timeout and cancellation surface as `target_unreachable` so
    /// callers keep a single classification path.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::TargetUnreachable(_) | Self::UnsafeConnection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_classification() {
        assert!(TmuxError::TargetUnreachable("timeout".into()).is_unreachable());
        assert!(TmuxError::UnsafeConnection("-oProxyCommand=x".into()).is_unreachable());
        assert!(!TmuxError::CommandFailed("exit 1".into()).is_unreachable());
    }
}
