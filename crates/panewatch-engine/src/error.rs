//! Engine error type: a thin union over the layers it composes.

use panewatch_core::error::CoreError;
use panewatch_store::error::StoreError;
use panewatch_tmux::error::TmuxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tmux(#[from] TmuxError),
}

impl EngineError {
    /// Short stable code for logs and wire surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(error) => error.code(),
            Self::Store(error) => match error {
                StoreError::Duplicate(_) => "duplicate",
                StoreError::IdempotencyConflict(_) => "idempotency_conflict",
                StoreError::NotFound(_) => "not_found",
                _ => "store_error",
            },
            Self::Tmux(error) => {
                if error.is_unreachable() {
                    "target_unreachable"
                } else {
                    "tmux_error"
                }
            }
        }
    }
}
