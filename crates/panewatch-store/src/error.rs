//! Store error taxonomy, mapped onto the core's contractual codes.

use panewatch_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint collision on a runtime id.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Dedupe key already present. Benign; callers treat it as success.
    #[error("idempotency conflict: {0}")]
    IdempotencyConflict(String),

    /// CAS rejection: the write carried a lower state version than stored.
    #[error("stale state write for {target_id}/{pane_id}: version {attempted} < {current}")]
    VersionConflict {
        target_id: String,
        pane_id: String,
        attempted: i64,
        current: i64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted row failed to decode.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Translate into the core's contractual error, where one applies.
    pub fn to_core(&self) -> CoreError {
        match self {
            Self::Duplicate(detail) => CoreError::Duplicate(detail.clone()),
            Self::IdempotencyConflict(key) => CoreError::IdempotencyConflict(key.clone()),
            Self::NotFound(detail) => CoreError::NotFound(detail.clone()),
            Self::VersionConflict { .. } | Self::Corrupt(_) | Self::Sqlite(_) => {
                CoreError::InvalidEvent(self.to_string())
            }
        }
    }
}
