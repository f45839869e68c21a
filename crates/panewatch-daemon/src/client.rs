//! UDS JSON-RPC client for the CLI subcommands.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::cli::IngestOpts;

async fn rpc_call(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to daemon at {socket_path}: {e}"))?;

    let (reader, mut writer) = stream.into_split();

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    let mut text = serde_json::to_string(&request)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.shutdown().await?;

    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;

    let response: serde_json::Value = serde_json::from_str(line.trim())?;
    if let Some(error) = response.get("error") {
        anyhow::bail!("RPC error: {error}");
    }
    Ok(response["result"].clone())
}

/// `panewatch status` — daemon summary plus target health.
pub async fn cmd_status(socket_path: &str) -> anyhow::Result<()> {
    let status = rpc_call(socket_path, "status", serde_json::json!({})).await?;

    let summary = &status["summary"];
    println!("panewatch daemon running");
    println!(
        "Panes: {} total ({} running, {} waiting, {} error)",
        summary["total"],
        summary["running"],
        summary["waiting_input"].as_u64().unwrap_or(0)
            + summary["waiting_approval"].as_u64().unwrap_or(0),
        summary["error"],
    );

    if let Some(targets) = status["targets"].as_array() {
        let parts: Vec<String> = targets
            .iter()
            .map(|t| {
                format!(
                    "{}={}",
                    t["target_id"].as_str().unwrap_or("?"),
                    t["health"].as_str().unwrap_or("?")
                )
            })
            .collect();
        println!("Targets: {}", parts.join(", "));
    }
    Ok(())
}

/// `panewatch ls` — pane table.
pub async fn cmd_ls(socket_path: &str) -> anyhow::Result<()> {
    let panes = rpc_call(socket_path, "list_panes", serde_json::json!({})).await?;
    let Some(rows) = panes.as_array() else {
        anyhow::bail!("unexpected list_panes response");
    };

    println!(
        "{:<8} {:<6} {:<12} {:<8} {:<16} {:<20} {}",
        "TARGET", "PANE", "SESSION", "AGENT", "STATE", "REASON", "CONF"
    );
    for row in rows {
        println!(
            "{:<8} {:<6} {:<12} {:<8} {:<16} {:<20} {}",
            row["target_id"].as_str().unwrap_or("?"),
            row["pane_id"].as_str().unwrap_or("?"),
            row["session_name"].as_str().unwrap_or(""),
            row["agent_type"].as_str().unwrap_or("?"),
            row["state"].as_str().unwrap_or("?"),
            row["reason_code"].as_str().unwrap_or(""),
            row["confidence"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

/// `panewatch json` — machine-readable pane list.
pub async fn cmd_json(socket_path: &str) -> anyhow::Result<()> {
    let panes = rpc_call(socket_path, "list_panes", serde_json::json!({})).await?;
    println!("{}", serde_json::to_string_pretty(&panes)?);
    Ok(())
}

/// `panewatch ingest` — read one JSON event from stdin and forward it.
/// The bridge used by agent hook and notify wrapper scripts.
pub async fn cmd_ingest(socket_path: &str, opts: &IngestOpts) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)?;
    let event: serde_json::Value = serde_json::from_str(input.trim())
        .map_err(|e| anyhow::anyhow!("stdin is not a JSON event: {e}"))?;

    let params = serde_json::json!({
        "source_kind": opts.source,
        "event": event,
    });
    let result = rpc_call(socket_path, "source.ingest", params).await?;
    println!(
        "{}",
        result["outcome"].as_str().unwrap_or("unknown_outcome")
    );
    Ok(())
}
