//! UDS JSON-RPC server: newline-delimited JSON, connection-per-request,
//! except `subscribe`, which holds the connection open and streams
//! notifications.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use panewatch_core::types::{EventEnvelope, EventSource};
use panewatch_engine::{IngestEngine, IngestOutcome};
use panewatch_store::ops::Store;

use crate::notify::{Notification, SubscribeFilter, Summary};
use crate::view::build_pane_views;

pub struct ServerShared {
    pub store: Arc<dyn Store>,
    pub ingest: Arc<IngestEngine>,
    pub notifications: broadcast::Sender<Notification>,
}

/// Run the UDS JSON-RPC server until cancelled.
pub async fn run_server(
    socket_path: &str,
    shared: Arc<ServerShared>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let socket_dir = std::path::Path::new(socket_path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid socket path: {socket_path}"))?;
    std::fs::create_dir_all(socket_dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    // Stale socket: if nothing answers, unlink and take over.
    if std::path::Path::new(socket_path).exists() {
        if UnixStream::connect(socket_path).await.is_err() {
            std::fs::remove_file(socket_path)?;
            tracing::info!("removed stale socket at {socket_path}");
        } else {
            anyhow::bail!("another daemon is already running at {socket_path}");
        }
    }

    let listener = UnixListener::bind(socket_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("UDS server listening on {socket_path}");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(error) = handle_connection(stream, shared).await {
                        tracing::debug!(%error, "connection error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_connection(stream: UnixStream, shared: Arc<ServerShared>) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let request: serde_json::Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();
    let params = request["params"].clone();

    let result = match method {
        "list_panes" => {
            let views = build_pane_views(shared.store.as_ref())?;
            serde_json::to_value(views)?
        }
        "status" => {
            let views = build_pane_views(shared.store.as_ref())?;
            let targets = shared.store.list_targets()?;
            serde_json::json!({
                "summary": Summary::of(&views),
                "targets": targets,
            })
        }
        "source.ingest" => handle_ingest(&shared, &params).await?,
        "subscribe" => {
            let filter: SubscribeFilter =
                serde_json::from_value(params.get("filter").cloned().unwrap_or_default())
                    .unwrap_or_default();
            let receiver = shared.notifications.subscribe();
            write_response(&mut writer, &id, serde_json::json!({"subscribed": true})).await?;
            return stream_notifications(writer, receiver, filter).await;
        }
        _ => {
            let error_response = serde_json::json!({
                "jsonrpc": "2.0",
                "error": {"code": -32601, "message": "method not found"},
                "id": id,
            });
            let mut text = serde_json::to_string(&error_response)?;
            text.push('\n');
            writer.write_all(text.as_bytes()).await?;
            return Ok(());
        }
    };

    write_response(&mut writer, &id, result).await
}

async fn write_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    id: &serde_json::Value,
    result: serde_json::Value,
) -> anyhow::Result<()> {
    let response = serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    });
    let mut text = serde_json::to_string(&response)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    Ok(())
}

/// Forward notifications until the subscriber goes away. A subscriber
/// that lags the channel is disconnected and must re-subscribe.
async fn stream_notifications(
    mut writer: tokio::net::unix::OwnedWriteHalf,
    mut receiver: broadcast::Receiver<Notification>,
    filter: SubscribeFilter,
) -> anyhow::Result<()> {
    loop {
        let notification = match receiver.recv().await {
            Ok(notification) => notification,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "subscriber lagged; disconnecting");
                break;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !filter.admits(&notification) {
            continue;
        }
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method_name(&notification),
            "params": notification,
        });
        let mut text = serde_json::to_string(&message)?;
        text.push('\n');
        if writer.write_all(text.as_bytes()).await.is_err() {
            break;
        }
    }
    Ok(())
}

fn method_name(notification: &Notification) -> &'static str {
    match notification {
        Notification::StateChanged { .. } => "state_changed",
        Notification::PaneAdded { .. } => "pane_added",
        Notification::PaneRemoved { .. } => "pane_removed",
        Notification::Summary(_) => "summary",
    }
}

// ─── source.ingest ────────────────────────────────────────────────

/// Event shape accepted from hook/notify/wrapper bridges. Most fields are
/// optional; the daemon fills in identity and timing defaults.
#[derive(Debug, Deserialize)]
struct IngestRequestEvent {
    event_type: String,
    pane_id: String,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    runtime_id: Option<String>,
    #[serde(default)]
    pid: Option<i64>,
    #[serde(default)]
    start_hint: Option<DateTime<Utc>>,
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    dedupe_key: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

async fn handle_ingest(
    shared: &Arc<ServerShared>,
    params: &serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let source_kind = params["source_kind"].as_str().unwrap_or("hook");
    let source = EventSource::from_str(source_kind)?;
    let request: IngestRequestEvent = serde_json::from_value(params["event"].clone())?;

    let now = Utc::now();
    let event_id = request.event_id.unwrap_or_else(|| {
        format!(
            "{source}:{}:{}",
            request.pane_id,
            now.timestamp_nanos_opt().unwrap_or_default()
        )
    });
    let dedupe_key = request
        .dedupe_key
        .unwrap_or_else(|| format!("{source}:{event_id}"));
    let raw_payload = match &request.payload {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let event = EventEnvelope {
        event_id,
        event_type: request.event_type,
        source,
        dedupe_key,
        event_time: request.event_time.unwrap_or(now),
        ingested_at: now,
        runtime_id: request.runtime_id,
        target_id: request.target_id.unwrap_or_else(|| "local".to_string()),
        pane_id: request.pane_id,
        pid: request.pid,
        start_hint: request.start_hint,
        raw_payload,
    };

    let outcome = shared.ingest.ingest(event).await?;
    Ok(serde_json::json!({"outcome": outcome_name(&outcome)}))
}

fn outcome_name(outcome: &IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Projected(_) => "projected",
        IngestOutcome::Accepted => "accepted",
        IngestOutcome::Parked { .. } => "pending_bind",
        IngestOutcome::IdempotencyConflict => "idempotency_conflict",
        IngestOutcome::OutOfOrder => "out_of_order",
        IngestOutcome::RuntimeStale => "runtime_stale",
    }
}

// ─── Tests ────────────────────────────────────────────────────────
