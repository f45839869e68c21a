//! Runtime identity: deterministic runtime-id derivation, pane-epoch
//! rotation policy, and the runtime freshness validator.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::types::{AgentType, Runtime};

/// Derive the runtime id for one agent lifetime in one pane.
///
/// `hex(sha256(target_id|boot_id|pane_id|pane_epoch|agent_type|started_ns))`.
/// Deterministic: identical inputs always produce the identical id.
pub fn runtime_id(
    target_id: &str,
    boot_id: &str,
    pane_id: &str,
    pane_epoch: i64,
    agent_type: AgentType,
    started_at: DateTime<Utc>,
) -> String {
    let started_ns = started_at.timestamp_nanos_opt().unwrap_or_default();
    let material = format!(
        "{target_id}|{boot_id}|{pane_id}|{pane_epoch}|{agent_type}|{started_ns}"
    );
    let digest = Sha256::digest(material.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}

/// Whether a new pane epoch must be allocated for the observed pane.
///
/// Rotation is due when the previous runtime ended, the tmux server boot id
/// changed, the pid changed between two present values, or a pid appeared
/// where the previous runtime had none.
pub fn epoch_rotation_due(prev: &Runtime, observed_pid: Option<i64>, observed_boot_id: &str) -> bool {
    if prev.ended_at.is_some() {
        return true;
    }
    if prev.boot_id != observed_boot_id {
        return true;
    }
    match (prev.pid, observed_pid) {
        (Some(old), Some(new)) => old != new,
        (None, Some(_)) => true,
        // A vanished pid alone does not rotate; the next present pid will.
        (Some(_), None) | (None, None) => false,
    }
}

/// Reject writes addressed to an outdated runtime.
///
/// Fails with `runtime_stale` when both ids are non-empty and unequal.
pub fn validate_runtime_freshness(expected_id: &str, current_id: &str) -> Result<(), CoreError> {
    if !expected_id.is_empty() && !current_id.is_empty() && expected_id != current_id {
        return Err(CoreError::RuntimeStale {
            expected: expected_id.to_string(),
            current: current_id.to_string(),
        });
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn runtime(pid: Option<i64>, boot_id: &str, ended: bool) -> Runtime {
        Runtime {
            runtime_id: "r".into(),
            target_id: "local".into(),
            pane_id: "%0".into(),
            pane_epoch: 0,
            agent_type: AgentType::Codex,
            boot_id: boot_id.into(),
            pid,
            started_at: ts("2026-03-01T00:00:00Z"),
            ended_at: ended.then(|| ts("2026-03-01T00:01:00Z")),
        }
    }

    #[test]
    fn runtime_id_is_deterministic() {
        let at = ts("2026-03-01T00:00:00Z");
        let a = runtime_id("local", "boot-1", "%0", 0, AgentType::Codex, at);
        let b = runtime_id("local", "boot-1", "%0", 0, AgentType::Codex, at);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn runtime_id_varies_with_every_input() {
        let at = ts("2026-03-01T00:00:00Z");
        let base = runtime_id("local", "boot-1", "%0", 0, AgentType::Codex, at);

        assert_ne!(base, runtime_id("remote", "boot-1", "%0", 0, AgentType::Codex, at));
        assert_ne!(base, runtime_id("local", "boot-2", "%0", 0, AgentType::Codex, at));
        assert_ne!(base, runtime_id("local", "boot-1", "%1", 0, AgentType::Codex, at));
        assert_ne!(base, runtime_id("local", "boot-1", "%0", 1, AgentType::Codex, at));
        assert_ne!(base, runtime_id("local", "boot-1", "%0", 0, AgentType::Claude, at));
        assert_ne!(
            base,
            runtime_id(
                "local",
                "boot-1",
                "%0",
                0,
                AgentType::Codex,
                ts("2026-03-01T00:00:01Z")
            )
        );
    }

    #[test]
    fn rotation_due_when_previous_ended() {
        let prev = runtime(Some(100), "boot-1", true);
        assert!(epoch_rotation_due(&prev, Some(100), "boot-1"));
    }

    #[test]
    fn rotation_due_on_boot_change() {
        let prev = runtime(Some(100), "boot-1", false);
        assert!(epoch_rotation_due(&prev, Some(100), "boot-2"));
    }

    #[test]
    fn rotation_due_on_pid_change() {
        let prev = runtime(Some(100), "boot-1", false);
        assert!(epoch_rotation_due(&prev, Some(200), "boot-1"));
    }

    #[test]
    fn rotation_due_when_pid_appears() {
        let prev = runtime(None, "boot-1", false);
        assert!(epoch_rotation_due(&prev, Some(100), "boot-1"));
    }

    #[test]
    fn no_rotation_when_signature_unchanged() {
        let prev = runtime(Some(100), "boot-1", false);
        assert!(!epoch_rotation_due(&prev, Some(100), "boot-1"));
    }

    #[test]
    fn no_rotation_when_pid_vanishes() {
        let prev = runtime(Some(100), "boot-1", false);
        assert!(!epoch_rotation_due(&prev, None, "boot-1"));
    }

    #[test]
    fn freshness_rejects_mismatched_ids() {
        let err = validate_runtime_freshness("r-old", "r-new").expect_err("should fail");
        assert_eq!(err.code(), "runtime_stale");
    }

    #[test]
    fn freshness_allows_empty_sides() {
        assert!(validate_runtime_freshness("", "r-new").is_ok());
        assert!(validate_runtime_freshness("r-old", "").is_ok());
        assert!(validate_runtime_freshness("", "").is_ok());
    }

    #[test]
    fn freshness_allows_match() {
        assert!(validate_runtime_freshness("r-1", "r-1").is_ok());
    }
}
