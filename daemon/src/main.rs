//! helmsman-daemon binary: bind the control socket, spawn sessions for
//! the configured terminals, serve until shutdown.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use helmsman_control::{
    paths::{default_socket_path, default_workspace_dir},
    ControlClient, DaemonRequest, WorkspacePaths,
};
use helmsman_daemon::{registry::Registry, server};

#[derive(Parser)]
#[command(
    name = "helmsman-daemon",
    about = "Session manager for helmsman terminal orchestration"
)]
struct Cli {
    /// Workspace directory holding config.json and state.json
    #[arg(long, env = "HELMSMAN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Control socket path
    #[arg(long, env = "HELMSMAN_SOCKET")]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let paths = WorkspacePaths::new(
        cli.workspace.unwrap_or_else(default_workspace_dir),
        cli.socket.unwrap_or_else(default_socket_path),
    );

    // Two daemons on one socket would mean two writers of one state
    // document; refuse if a live one answers.
    let probe = ControlClient::new(paths.clone()).with_timeout(Duration::from_secs(1));
    if probe.is_daemon_running().await {
        anyhow::bail!(
            "a daemon is already listening on {}",
            paths.socket_path().display()
        );
    }

    tracing::info!(
        workspace = %paths.workspace_dir().display(),
        socket = %paths.socket_path().display(),
        "starting helmsman daemon"
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (evt_tx, evt_rx) = mpsc::channel(1024);

    let mut registry = Registry::new(paths.clone(), evt_tx)
        .map_err(|e| anyhow::anyhow!("failed to initialize registry: {}", e))?;
    registry.start();

    let handle = Registry::handle(cmd_tx);
    let listener = server::bind(paths.socket_path())?;
    let server_task = tokio::spawn(server::serve(listener, handle.clone()));

    // Ctrl+C routes through the normal shutdown path so state is flushed.
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            let _ = shutdown_handle.dispatch(DaemonRequest::Shutdown).await;
        }
    });

    registry.run(cmd_rx, evt_rx).await;

    server_task.abort();
    let _ = std::fs::remove_file(paths.socket_path());
    tracing::info!("daemon stopped");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("helmsman_daemon=info".parse()?)
        .add_directive("helmsman_control=info".parse()?);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
    Ok(())
}
