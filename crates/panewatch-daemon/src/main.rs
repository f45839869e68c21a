//! panewatch: agent activity monitor for tmux panes.
//! Single-process binary embedding the observer, resolver, reconciler and
//! retention loops plus the UDS JSON-RPC surface.

use clap::Parser;

mod bootstrap;
mod cli;
mod client;
mod loops;
mod notify;
mod server;
mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Daemon(opts) => {
            let filter = std::env::var("PANEWATCH_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("panewatch daemon starting");
            bootstrap::run_daemon(opts, args.socket_path).await?;
        }
        cli::Command::Status => {
            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            client::cmd_status(&socket_path).await?;
        }
        cli::Command::Ls => {
            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            client::cmd_ls(&socket_path).await?;
        }
        cli::Command::Json => {
            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            client::cmd_json(&socket_path).await?;
        }
        cli::Command::Ingest(opts) => {
            let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);
            client::cmd_ingest(&socket_path, &opts).await?;
        }
    }

    Ok(())
}
