//! Error taxonomy surfaced by the core. The variant names are contractual;
//! the wire names clients see may differ.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Executor exhausted retries or was cancelled. Recovered automatically
    /// via the health FSM and the reconciler.
    #[error("target unreachable: {0}")]
    TargetUnreachable(String),

    /// Ingest attempted against an outdated runtime; the event is dropped.
    #[error("runtime stale: expected {expected}, current {current}")]
    RuntimeStale { expected: String, current: String },

    /// Event older than the last accepted one for its runtime. Soft.
    #[error("out-of-order event for runtime {runtime_id}")]
    OutOfOrder { runtime_id: String },

    /// Unique-constraint collision on a runtime id.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Dedupe key already ingested. Treated as success by callers.
    #[error("idempotency conflict: dedupe key {0} already present")]
    IdempotencyConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Adapter registration with an incompatible contract. Fatal at startup.
    #[error("unsupported contract version for adapter {adapter}: {version}")]
    UnsupportedContractVersion { adapter: String, version: String },

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    /// Short stable code for logs and wire surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TargetUnreachable(_) => "target_unreachable",
            Self::RuntimeStale { .. } => "runtime_stale",
            Self::OutOfOrder { .. } => "out_of_order",
            Self::Duplicate(_) => "duplicate",
            Self::IdempotencyConflict(_) => "idempotency_conflict",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedContractVersion { .. } => "unsupported_contract_version",
            Self::InvalidEvent(_) => "invalid_event",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_detail() {
        let err = CoreError::RuntimeStale {
            expected: "r-old".into(),
            current: "r-new".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("r-old"));
        assert!(msg.contains("r-new"));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CoreError::IdempotencyConflict("k".into()).code(),
            "idempotency_conflict"
        );
        assert_eq!(
            CoreError::TargetUnreachable("ssh died".into()).code(),
            "target_unreachable"
        );
        assert_eq!(
            CoreError::OutOfOrder {
                runtime_id: "r".into()
            }
            .code(),
            "out_of_order"
        );
    }
}
