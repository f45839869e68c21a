//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "panewatch", about = "agent activity monitor for tmux panes")]
pub struct Cli {
    /// UDS socket path (default: $XDG_RUNTIME_DIR/panewatch/panewatchd.sock)
    #[arg(long, short = 's', global = true)]
    pub socket_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon (observer loops + UDS server)
    Daemon(DaemonOpts),
    /// Show daemon and target health summary
    Status,
    /// List panes as a table
    Ls,
    /// Machine-readable pane list
    Json,
    /// Forward one event from stdin to the daemon (hook/notify bridge)
    Ingest(IngestOpts),
}

#[derive(clap::Args)]
pub struct DaemonOpts {
    /// Config file path (TOML)
    #[arg(long, short = 'c')]
    pub config: Option<std::path::PathBuf>,

    /// Override the topology/resolver/reconciler tick period
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Override the store location
    #[arg(long)]
    pub db_path: Option<String>,
}

#[derive(clap::Args)]
pub struct IngestOpts {
    /// Event source kind: hook, notify or wrapper
    #[arg(long, default_value = "hook")]
    pub source: String,
}

pub fn default_socket_path() -> String {
    panewatch_core::config::default_socket_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "panewatch",
            "daemon",
            "--poll-interval-ms",
            "500",
            "--db-path",
            "/tmp/pw.db",
        ])
        .expect("parse");
        match cli.command {
            Command::Daemon(opts) => {
                assert_eq!(opts.poll_interval_ms, Some(500));
                assert_eq!(opts.db_path.as_deref(), Some("/tmp/pw.db"));
            }
            _ => panic!("expected daemon subcommand"),
        }
    }

    #[test]
    fn global_socket_flag_parses_anywhere() {
        let cli = Cli::try_parse_from(["panewatch", "status", "-s", "/tmp/pw.sock"])
            .expect("parse");
        assert_eq!(cli.socket_path.as_deref(), Some("/tmp/pw.sock"));
    }

    #[test]
    fn ingest_source_defaults_to_hook() {
        let cli = Cli::try_parse_from(["panewatch", "ingest"]).expect("parse");
        match cli.command {
            Command::Ingest(opts) => assert_eq!(opts.source, "hook"),
            _ => panic!("expected ingest subcommand"),
        }
    }
}
