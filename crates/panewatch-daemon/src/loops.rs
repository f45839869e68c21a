//! Long-running daemon loops: topology, resolver, reconciler, retention,
//! and the notification differ. One tokio task per loop, each with its own
//! ticker, all unwinding promptly on cancellation.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use panewatch_core::config::Config;
use panewatch_engine::{IngestEngine, InboxResolver, Reconciler, TopologyObserver};
use panewatch_store::ops::Store;
use panewatch_tmux::executor::ProcessSpawner;

use crate::notify::{Notification, SnapshotDiffer};
use crate::view::build_pane_views;

/// Retention cadence. The first purge runs one period after startup.
const RETENTION_PERIOD_SECS: u64 = 3_600;

#[allow(clippy::too_many_arguments)]
pub fn spawn_loops(
    mut observer: TopologyObserver<ProcessSpawner>,
    resolver: InboxResolver,
    reconciler: Reconciler,
    ingest: Arc<IngestEngine>,
    store: Arc<dyn Store>,
    notifications: broadcast::Sender<Notification>,
    config: &Config,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let tick_period = Duration::from_millis(config.active_reconcile_interval_ms.max(100));
    let mut handles = Vec::with_capacity(5);

    // ── Topology ─────────────────────────────────────────────────
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = observer.tick(&cancel, Utc::now()).await {
                            tracing::warn!(%error, "topology tick failed");
                        }
                    }
                }
            }
            tracing::debug!("topology loop stopped");
        }));
    }

    // ── Inbox resolver ───────────────────────────────────────────
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match resolver.tick(Utc::now()).await {
                            Ok(stats) if stats.bound > 0
                                || stats.dropped_ttl > 0
                                || stats.dropped_no_candidate > 0
                                || stats.dropped_ambiguous > 0 =>
                            {
                                tracing::debug!(?stats, "inbox resolved");
                            }
                            Ok(_) => {}
                            Err(error) => tracing::warn!(%error, "resolver tick failed"),
                        }
                    }
                }
            }
            tracing::debug!("resolver loop stopped");
        }));
    }

    // ── Reconciler ───────────────────────────────────────────────
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match reconciler.tick(Utc::now()).await {
                            Ok(emitted) if emitted > 0 => {
                                tracing::debug!(emitted, "reconcile events emitted");
                            }
                            Ok(_) => {}
                            Err(error) => tracing::warn!(%error, "reconciler tick failed"),
                        }
                    }
                }
            }
            tracing::debug!("reconciler loop stopped");
        }));
    }

    // ── Retention ────────────────────────────────────────────────
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(RETENTION_PERIOD_SECS));
            // The interval fires immediately; consume that so the first
            // purge lands one period after startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match ingest.purge(Utc::now()).await {
                            Ok(stats) => tracing::info!(
                                scrubbed = stats.payloads_scrubbed,
                                deleted = stats.events_deleted,
                                inbox = stats.inbox_deleted,
                                "retention purge complete"
                            ),
                            Err(error) => tracing::warn!(%error, "retention purge failed"),
                        }
                    }
                }
            }
            tracing::debug!("retention loop stopped");
        }));
    }

    // ── Notifier ─────────────────────────────────────────────────
    {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut differ = SnapshotDiffer::new();
            let mut ticker = interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match build_pane_views(store.as_ref()) {
                            Ok(views) => {
                                for notification in differ.diff(&views) {
                                    // No subscribers is fine.
                                    let _ = notifications.send(notification);
                                }
                            }
                            Err(error) => tracing::warn!(%error, "snapshot diff failed"),
                        }
                    }
                }
            }
            tracing::debug!("notifier loop stopped");
        }));
    }

    handles
}
