//! The daemon's control socket.
//!
//! Newline-delimited JSON over a Unix listener: each connection carries
//! one request and gets exactly one response line. Connections are
//! handled concurrently; the registry's command queue serializes the
//! actual work.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use helmsman_control::{DaemonRequest, DaemonResponse, ErrorKind};

use crate::registry::RegistryHandle;

/// Bind the control socket, clearing any stale file left by a previous
/// run. The caller has already verified no live daemon owns it.
pub fn bind(socket_path: &Path) -> Result<UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(socket_path);
    UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind control socket at {}", socket_path.display()))
}

/// Accept connections until the task is dropped.
pub async fn serve(listener: UnixListener, handle: RegistryHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handle).await {
                        tracing::debug!(error = %e, "connection error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, handle: RegistryHandle) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader.read_line(&mut line).await?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let response = match serde_json::from_str::<DaemonRequest>(&line) {
        Ok(request) => handle.dispatch(request).await,
        Err(e) => DaemonResponse::Error {
            kind: ErrorKind::Invalid,
            message: format!("malformed request: {}", e),
        },
    };

    let response_json = serde_json::to_string(&response).unwrap_or_else(|e| {
        // A response that cannot serialize is a bug; still answer.
        format!(
            r#"{{"type":"Error","kind":"internal","message":"failed to serialize response: {}"}}"#,
            e
        )
    });
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use helmsman_control::{ControlClient, CreateSpec, DataSource, WorkspacePaths};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Boot a real daemon (registry + socket) in a temp workspace and
    /// return a client pointed at it.
    fn boot(dir: &TempDir) -> (ControlClient, tokio::task::JoinHandle<()>) {
        let paths = WorkspacePaths::new(dir.path(), dir.path().join("daemon.sock"));

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (evt_tx, evt_rx) = mpsc::channel(1024);
        let registry = Registry::new(paths.clone(), evt_tx).unwrap();
        let handle = Registry::handle(cmd_tx);

        let listener = bind(paths.socket_path()).unwrap();
        tokio::spawn(serve(listener, handle));
        let registry_task = tokio::spawn(registry.run(cmd_rx, evt_rx));

        let client = ControlClient::new(paths).with_timeout(Duration::from_secs(2));
        (client, registry_task)
    }

    #[tokio::test]
    async fn full_loop_create_list_delete() {
        let dir = TempDir::new().unwrap();
        let (client, registry_task) = boot(&dir);

        assert!(client.is_daemon_running().await);

        let created = client
            .create_terminal(CreateSpec {
                name: Some("Builder".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Builder");

        let list = client.list_terminals().await.unwrap();
        assert_eq!(list.source, DataSource::Daemon);
        assert!(list.terminals.iter().any(|t| t.id == created.id));

        client.delete_terminal(&created.id).await.unwrap();
        let err = client.delete_terminal(&created.id).await.unwrap_err();
        assert_eq!(err.kind(), helmsman_control::ErrorKind::NotFound);

        client.shutdown_daemon().await.unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), registry_task).await;
    }

    #[tokio::test]
    async fn malformed_requests_get_invalid_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let (client, _registry_task) = boot(&dir);

        // Hand-rolled broken request straight at the socket.
        let stream = tokio::net::UnixStream::connect(dir.path().join("daemon.sock"))
            .await
            .unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{ nope\n").await.unwrap();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.contains("\"Error\""));
        assert!(line.contains("invalid"));

        // The daemon is still healthy afterwards.
        assert!(client.is_daemon_running().await);
    }
}
