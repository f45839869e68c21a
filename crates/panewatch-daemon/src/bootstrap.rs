//! Daemon bootstrap: config, store, adapter sync, loop supervision.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use panewatch_adapters::{Adapter, AdapterRegistry, ClaudeAdapter, CodexAdapter, GeminiAdapter};
use panewatch_core::config::Config;
use panewatch_core::types::{Target, TargetHealth};
use panewatch_engine::{IngestEngine, InboxResolver, Reconciler, TopologyObserver};
use panewatch_store::ops::Store;
use panewatch_store::sqlite::SqliteStore;
use panewatch_tmux::executor::{ProcessSpawner, TargetExecutor};

use crate::cli::DaemonOpts;
use crate::loops;
use crate::server::{self, ServerShared};

pub async fn run_daemon(opts: DaemonOpts, socket_override: Option<String>) -> anyhow::Result<()> {
    let config = load_config(&opts, socket_override)?;
    if config.enable_tty_v2_pane_tap {
        tracing::info!("enable_tty_v2_pane_tap is set; the experimental capture path is inert in this build");
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(Path::new(&config.db_path))?);
    seed_targets(store.as_ref(), &config)?;
    let registry = Arc::new(sync_adapters(store.as_ref())?);
    tracing::info!(
        adapters = registry.len(),
        targets = config.seeded_targets().len(),
        db = %config.db_path,
        "bootstrap complete"
    );

    let ingest = Arc::new(IngestEngine::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        config.clone(),
    ));
    let executor = Arc::new(TargetExecutor::new(
        ProcessSpawner,
        Duration::from_millis(config.command_timeout_ms),
        config.connect_timeout_secs,
        &config.retry_backoff_ms,
    ));
    let observer = TopologyObserver::new(
        Arc::clone(&store),
        Arc::clone(&ingest),
        executor,
        &config,
    );
    let resolver = InboxResolver::new(Arc::clone(&store), Arc::clone(&ingest), &config);
    let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&ingest), &config);

    let (notifications, _) = tokio::sync::broadcast::channel(256);
    let shared = Arc::new(ServerShared {
        store: Arc::clone(&store),
        ingest: Arc::clone(&ingest),
        notifications: notifications.clone(),
    });

    let cancel = CancellationToken::new();
    let handles = loops::spawn_loops(
        observer,
        resolver,
        reconciler,
        Arc::clone(&ingest),
        Arc::clone(&store),
        notifications,
        &config,
        cancel.clone(),
    );

    let socket_path = config.socket_path.clone();
    tokio::select! {
        result = server::run_server(&socket_path, shared, cancel.clone()) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    // Unwind: stop loops, then remove the socket. Committed state stays
    // committed; the next start resumes from the store.
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    let _ = std::fs::remove_file(&socket_path);
    tracing::info!("panewatch daemon stopped");
    Ok(())
}

fn load_config(opts: &DaemonOpts, socket_override: Option<String>) -> anyhow::Result<Config> {
    let mut config = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Config::from_toml(&text)?
        }
        None => Config::default(),
    };
    if let Some(ms) = opts.poll_interval_ms {
        config.active_reconcile_interval_ms = ms;
    }
    if let Some(db_path) = &opts.db_path {
        config.db_path = db_path.clone();
    }
    if let Some(socket) = socket_override {
        config.socket_path = socket;
    }
    config.validate()?;
    Ok(config)
}

/// Upsert configured targets; an empty config auto-seeds "local".
fn seed_targets(store: &dyn Store, config: &Config) -> anyhow::Result<()> {
    let now = Utc::now();
    for (idx, seed) in config.seeded_targets().iter().enumerate() {
        store.upsert_target(&Target {
            target_id: seed.name.clone(),
            name: seed.name.clone(),
            kind: seed.kind,
            connection: seed.connection.clone(),
            health: TargetHealth::Ok,
            is_default: idx == 0,
            last_seen_at: None,
            updated_at: now,
        })?;
    }
    Ok(())
}

/// Sync the built-in adapters into the store (preserving any persisted
/// `enabled` flags), then build the runtime registry from the enabled set.
fn sync_adapters(store: &dyn Store) -> anyhow::Result<AdapterRegistry> {
    let now = Utc::now();
    let builtin = AdapterRegistry::builtin()?;
    for record in builtin.records(now) {
        store.upsert_adapter(&record)?;
    }

    let enabled: HashSet<String> = store
        .list_adapters()?
        .into_iter()
        .filter(|record| record.enabled)
        .map(|record| record.name)
        .collect();

    let adapters: Vec<Box<dyn Adapter>> = vec![
        Box::new(ClaudeAdapter),
        Box::new(CodexAdapter),
        Box::new(GeminiAdapter),
    ];
    let mut registry = AdapterRegistry::empty();
    for adapter in adapters {
        if enabled.contains(adapter.name()) {
            registry.register(adapter)?;
        } else {
            tracing::warn!(adapter = adapter.name(), "adapter disabled; skipping");
        }
    }
    Ok(registry)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(error) => {
                tracing::warn!(%error, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_targets_auto_local_default() {
        let store = SqliteStore::open_in_memory().expect("open");
        seed_targets(&store, &Config::default()).expect("seed");
        let targets = store.list_targets().expect("list");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target_id, "local");
        assert!(targets[0].is_default);
    }

    #[test]
    fn sync_adapters_twice_yields_same_rows() {
        let store = SqliteStore::open_in_memory().expect("open");
        let first = sync_adapters(&store).expect("sync");
        assert_eq!(first.len(), 3);
        let rows_first = store.list_adapters().expect("list");

        let second = sync_adapters(&store).expect("sync");
        assert_eq!(second.len(), 3);
        let rows_second = store.list_adapters().expect("list");
        assert_eq!(rows_first.len(), rows_second.len());
        for (a, b) in rows_first.iter().zip(rows_second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.enabled, b.enabled);
            assert_eq!(a.contract_version, b.contract_version);
        }
    }

    #[test]
    fn disabled_adapter_is_excluded_from_registry() {
        let store = SqliteStore::open_in_memory().expect("open");
        sync_adapters(&store).expect("first sync");
        store
            .set_adapter_enabled("codex-notify", false)
            .expect("disable");

        // The next bootstrap honors the persisted flag.
        let registry = sync_adapters(&store).expect("resync");
        assert_eq!(registry.len(), 2);
        let record = store
            .get_adapter("codex-notify")
            .expect("get")
            .expect("present");
        assert!(!record.enabled, "resync must not re-enable the adapter");
    }

    #[test]
    fn load_config_applies_overrides() {
        let opts = DaemonOpts {
            config: None,
            poll_interval_ms: Some(750),
            db_path: Some("/tmp/pw-test.db".into()),
        };
        let config =
            load_config(&opts, Some("/tmp/pw-test.sock".into())).expect("load");
        assert_eq!(config.active_reconcile_interval_ms, 750);
        assert_eq!(config.db_path, "/tmp/pw-test.db");
        assert_eq!(config.socket_path, "/tmp/pw-test.sock");
    }
}
