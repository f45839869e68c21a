//! Process-wide configuration. A copy of this struct is handed to every
//! component constructor; there are no mutable globals in the core.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::TargetKind;

/// Seed definition for a target, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSeed {
    pub name: String,
    #[serde(default)]
    pub kind: TargetKind,
    /// ssh destination argument (required for ssh targets).
    #[serde(default)]
    pub connection: Option<String>,
}

impl TargetSeed {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Local,
            connection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UDS path for the JSON-RPC server.
    pub socket_path: String,
    /// Store location (SQLite database file).
    pub db_path: String,
    /// Per-attempt executor deadline (milliseconds).
    pub command_timeout_ms: u64,
    /// ssh ConnectTimeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-retry delays for read-only tmux verbs (milliseconds).
    pub retry_backoff_ms: Vec<u64>,
    /// Tick period for topology, resolver and reconciler loops (milliseconds).
    pub active_reconcile_interval_ms: u64,
    /// Inbox TTL for pending-bind events (milliseconds).
    pub pending_bind_ttl_ms: u64,
    /// Max clock skew tolerated when matching start_hint (milliseconds).
    pub bind_window_ms: u64,
    /// Signal silence threshold before a pane decays to unknown (seconds).
    pub stale_signal_ttl_secs: u64,
    /// Age at which completed panes demote to idle (seconds).
    pub completed_demotion_after_secs: u64,
    /// Consecutive failures to mark a target down.
    pub target_down_failures: u32,
    /// Rolling failure window (seconds).
    pub target_down_window_secs: u64,
    /// Successes required to return a target to ok.
    pub target_recover_successes: u32,
    /// Age at which event payloads are scrubbed (seconds).
    pub event_payload_ttl_secs: u64,
    /// Age at which events are deleted entirely (seconds).
    pub event_metadata_ttl_secs: u64,
    /// Experimental capture path. Accepted and logged, otherwise inert.
    pub enable_tty_v2_pane_tap: bool,
    /// Configured targets. Empty means "auto-seed local".
    pub targets: Vec<TargetSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            db_path: default_db_path(),
            command_timeout_ms: 3_000,
            connect_timeout_secs: 5,
            retry_backoff_ms: vec![200, 500],
            active_reconcile_interval_ms: 2_000,
            pending_bind_ttl_ms: 15_000,
            bind_window_ms: 2_000,
            stale_signal_ttl_secs: 90,
            completed_demotion_after_secs: 300,
            target_down_failures: 3,
            target_down_window_secs: 60,
            target_recover_successes: 2,
            event_payload_ttl_secs: 86_400,
            event_metadata_ttl_secs: 604_800,
            enable_tty_v2_pane_tap: false,
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a TOML config document and validate it.
    pub fn from_toml(text: &str) -> Result<Self, CoreError> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for seed in &self.targets {
            match seed.kind {
                TargetKind::Ssh => {
                    let conn = seed.connection.as_deref().unwrap_or("");
                    if conn.is_empty() {
                        return Err(CoreError::InvalidConfig(format!(
                            "ssh target {} has no connection",
                            seed.name
                        )));
                    }
                    // Option-injection guard; also enforced by the executor.
                    if conn.starts_with('-') {
                        return Err(CoreError::InvalidConfig(format!(
                            "ssh connection for target {} begins with '-'",
                            seed.name
                        )));
                    }
                }
                TargetKind::Local => {}
            }
        }
        if self.command_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "command_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Targets to observe; auto-seeds a default "local" when none configured.
    pub fn seeded_targets(&self) -> Vec<TargetSeed> {
        if self.targets.is_empty() {
            vec![TargetSeed::local("local")]
        } else {
            self.targets.clone()
        }
    }

    /// Poll interval in whole seconds, floored at 1 for the stabilizer math.
    pub fn poll_interval_secs(&self) -> u64 {
        (self.active_reconcile_interval_ms / 1_000).max(1)
    }
}

pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/panewatch/panewatchd.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/panewatch-{user}/panewatchd.sock")
}

pub fn default_db_path() -> String {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return format!("{dir}/panewatch/panewatch.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return format!("{home}/.local/state/panewatch/panewatch.db");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/panewatch-{user}/panewatch.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.command_timeout_ms, 3_000);
        assert_eq!(config.retry_backoff_ms, vec![200, 500]);
        assert!(config.targets.is_empty());
        assert!(!config.enable_tty_v2_pane_tap);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").expect("parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn toml_overrides_and_targets() {
        let text = r#"
            command_timeout_ms = 1500
            stale_signal_ttl_secs = 30

            [[targets]]
            name = "build-box"
            kind = "ssh"
            connection = "user@build.example.com"
        "#;
        let config = Config::from_toml(text).expect("parse");
        assert_eq!(config.command_timeout_ms, 1_500);
        assert_eq!(config.stale_signal_ttl_secs, 30);
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].kind, TargetKind::Ssh);
        assert_eq!(
            config.targets[0].connection.as_deref(),
            Some("user@build.example.com")
        );
    }

    #[test]
    fn ssh_target_without_connection_rejected() {
        let text = r#"
            [[targets]]
            name = "mystery"
            kind = "ssh"
        "#;
        let err = Config::from_toml(text).expect_err("should fail");
        assert!(err.to_string().contains("no connection"));
    }

    #[test]
    fn ssh_connection_starting_with_dash_rejected() {
        let text = r#"
            [[targets]]
            name = "evil"
            kind = "ssh"
            connection = "-oProxyCommand=touch /tmp/pwn"
        "#;
        let err = Config::from_toml(text).expect_err("should fail");
        assert!(err.to_string().contains("begins with '-'"));
    }

    #[test]
    fn seeded_targets_auto_local() {
        let config = Config::default();
        let targets = config.seeded_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "local");
        assert_eq!(targets[0].kind, TargetKind::Local);
    }

    #[test]
    fn poll_interval_floors_at_one_second() {
        let config = Config {
            active_reconcile_interval_ms: 250,
            ..Config::default()
        };
        assert_eq!(config.poll_interval_secs(), 1);
        let config = Config {
            active_reconcile_interval_ms: 5_000,
            ..Config::default()
        };
        assert_eq!(config.poll_interval_secs(), 5);
    }

    #[test]
    fn zero_command_timeout_rejected() {
        let config = Config {
            command_timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
