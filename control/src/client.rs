//! The control client: a uniform, fault-tolerant API over the daemon
//! socket with a read-only disk fallback.
//!
//! Every call is stateless: connect, send one request, read one response,
//! done. Mutations require a live daemon and fail fast with `Unreachable`
//! when none is listening. Reads fall back to the on-disk documents —
//! exactly once, no retry loop — and label the result so callers can tell
//! authoritative data from a possibly-stale snapshot.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::{ControlError, ControlResult};
use crate::paths::WorkspacePaths;
use crate::protocol::{
    AgentMetrics, CreateSpec, DaemonRequest, DaemonResponse, DataSource, MetricsReport,
    TerminalList, TerminalOutput, TerminalSummary,
};
use crate::store::{RuntimeState, TerminalPatch, WorkspaceConfig};

/// Ceiling for one daemon round trip. This is interactive tooling; a call
/// that outlives this window reports `Timeout` instead of hanging.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregated view for the MCP layer: both documents plus the workspace
/// location, labeled with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct UiState {
    pub workspace_dir: PathBuf,
    pub daemon_running: bool,
    pub source: DataSource,
    pub config: WorkspaceConfig,
    pub state: RuntimeState,
}

/// Typed client for the daemon control socket.
#[derive(Debug, Clone)]
pub struct ControlClient {
    paths: WorkspacePaths,
    timeout: Duration,
}

impl ControlClient {
    /// Client over environment-resolved paths.
    pub fn from_env() -> Self {
        Self::new(WorkspacePaths::resolve())
    }

    pub fn new(paths: WorkspacePaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    /// Liveness probe.
    pub async fn ping(&self) -> ControlResult<()> {
        match self.request("ping", DaemonRequest::Ping).await? {
            DaemonResponse::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn is_daemon_running(&self) -> bool {
        self.ping().await.is_ok()
    }

    /// Ordered terminal summaries. Live status when the daemon answers;
    /// otherwise one reconstruction from disk, labeled `Snapshot`.
    pub async fn list_terminals(&self) -> ControlResult<TerminalList> {
        match self.request("list_terminals", DaemonRequest::ListTerminals).await {
            Ok(DaemonResponse::Terminals { terminals }) => Ok(TerminalList {
                source: DataSource::Daemon,
                terminals,
            }),
            Ok(other) => Err(unexpected(other)),
            Err(ControlError::Unreachable(_)) => self.snapshot(),
            Err(e) => Err(e),
        }
    }

    /// Most recent `lines` lines of captured output. Empty string when
    /// the session has produced nothing yet. With the daemon down, the
    /// on-disk configuration still answers whether the id exists, but no
    /// output mirror exists on disk — the fallback result is labeled
    /// `Snapshot` and carries no text.
    pub async fn terminal_output(&self, id: &str, lines: usize) -> ControlResult<TerminalOutput> {
        let req = DaemonRequest::GetOutput {
            id: id.to_string(),
            lines,
        };
        match self.request("get_output", req).await {
            Ok(DaemonResponse::Output { text, .. }) => Ok(TerminalOutput {
                source: DataSource::Daemon,
                text,
            }),
            Ok(other) => Err(unexpected(other)),
            Err(ControlError::Unreachable(_)) => {
                let config = WorkspaceConfig::load(&self.paths.config_path())?;
                if !config.contains(id) {
                    return Err(ControlError::NotFound(id.to_string()));
                }
                Ok(TerminalOutput {
                    source: DataSource::Snapshot,
                    text: String::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Enqueue text for the session's input stream. No file-based
    /// fallback exists for this; the caller sees `Unreachable` when the
    /// daemon is down. Does not wait for any status transition.
    pub async fn send_input(&self, id: &str, text: &str) -> ControlResult<()> {
        let req = DaemonRequest::SendInput {
            id: id.to_string(),
            text: text.to_string(),
        };
        self.expect_ok("send_input", req).await
    }

    /// Allocate a new terminal. The daemon assigns defaults from its
    /// persisted counter; an explicit id that collides yields `Conflict`.
    pub async fn create_terminal(&self, spec: CreateSpec) -> ControlResult<TerminalSummary> {
        match self.request("create_terminal", DaemonRequest::Create { spec }).await? {
            DaemonResponse::Created { terminal } => Ok(terminal),
            other => Err(unexpected(other)),
        }
    }

    /// Tear down a terminal. Unknown ids surface `NotFound` so drift is
    /// visible to the caller.
    pub async fn delete_terminal(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("delete_terminal", DaemonRequest::Delete { id: id.to_string() })
            .await
    }

    /// Recreate the underlying session with cleared history; the
    /// configuration entry is untouched.
    pub async fn restart_terminal(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("restart_terminal", DaemonRequest::Restart { id: id.to_string() })
            .await
    }

    /// Merge a partial configuration update; unspecified fields keep
    /// their current values.
    pub async fn configure_terminal(&self, id: &str, patch: TerminalPatch) -> ControlResult<()> {
        let req = DaemonRequest::Configure {
            id: id.to_string(),
            patch,
        };
        self.expect_ok("configure_terminal", req).await
    }

    /// Make `id` the single primary terminal, atomically.
    pub async fn set_primary_terminal(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("set_primary_terminal", DaemonRequest::SetPrimary { id: id.to_string() })
            .await
    }

    /// Enable interval-driven prompt injection. Idempotent: a second
    /// start never produces a duplicate timer.
    pub async fn start_autonomous(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("start_autonomous", DaemonRequest::StartInterval { id: id.to_string() })
            .await
    }

    /// Disable interval-driven prompt injection.
    pub async fn stop_autonomous(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("stop_autonomous", DaemonRequest::StopInterval { id: id.to_string() })
            .await
    }

    /// Inject the configured interval prompt once, immediately, without
    /// disturbing the schedule's next fire time.
    pub async fn launch_interval(&self, id: &str) -> ControlResult<()> {
        self.expect_ok("launch_interval", DaemonRequest::RunIntervalNow { id: id.to_string() })
            .await
    }

    /// Performance counters for a terminal; zeroed counters when nothing
    /// was recorded yet. With the daemon down, the counters are
    /// reconstructed from what the state document mirrors (the last
    /// interval run) and labeled `Snapshot`.
    pub async fn agent_metrics(&self, id: &str) -> ControlResult<MetricsReport> {
        let req = DaemonRequest::GetMetrics { id: id.to_string() };
        match self.request("get_agent_metrics", req).await {
            Ok(DaemonResponse::Metrics { metrics, .. }) => Ok(MetricsReport {
                source: DataSource::Daemon,
                metrics,
            }),
            Ok(other) => Err(unexpected(other)),
            Err(ControlError::Unreachable(_)) => {
                let config = WorkspaceConfig::load(&self.paths.config_path())?;
                if !config.contains(id) {
                    return Err(ControlError::NotFound(id.to_string()));
                }
                let state = RuntimeState::load(&self.paths.state_path())?;
                let metrics = AgentMetrics {
                    last_interval_run: state.terminals.get(id).and_then(|r| r.last_interval_run),
                    ..Default::default()
                };
                Ok(MetricsReport {
                    source: DataSource::Snapshot,
                    metrics,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the daemon to flush state and exit.
    pub async fn shutdown_daemon(&self) -> ControlResult<()> {
        self.expect_ok("shutdown", DaemonRequest::Shutdown).await
    }

    /// Both documents plus the workspace path in one labeled snapshot.
    /// The documents come from disk (the daemon mirrors every mutation
    /// there); the daemon is probed only for the provenance label.
    pub async fn ui_state(&self) -> ControlResult<UiState> {
        let daemon_running = self.is_daemon_running().await;
        let config = WorkspaceConfig::load(&self.paths.config_path())?;
        let state = RuntimeState::load(&self.paths.state_path())?;
        Ok(UiState {
            workspace_dir: self.paths.workspace_dir().to_path_buf(),
            daemon_running,
            source: if daemon_running {
                DataSource::Daemon
            } else {
                DataSource::Snapshot
            },
            config,
            state,
        })
    }

    /// Reconstruct terminal summaries from the on-disk documents. Used
    /// only as the single, non-looping fallback for reads.
    fn snapshot(&self) -> ControlResult<TerminalList> {
        let config = WorkspaceConfig::load(&self.paths.config_path())?;
        let state = RuntimeState::load(&self.paths.state_path())?;

        let terminals = config
            .terminals
            .iter()
            .map(|t| {
                let runtime = state.terminals.get(&t.id).cloned().unwrap_or_default();
                TerminalSummary::from_parts(t, runtime.status, runtime.is_primary)
            })
            .collect();

        Ok(TerminalList {
            source: DataSource::Snapshot,
            terminals,
        })
    }

    /// Send a request expecting a bare `Ok` acknowledgment.
    async fn expect_ok(&self, op: &'static str, req: DaemonRequest) -> ControlResult<()> {
        match self.request(op, req).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// One bounded round trip: connect, write one JSON line, read one
    /// JSON line. Connection failure maps to `Unreachable`; an expired
    /// window maps to `Timeout` with the effect unknown.
    async fn request(
        &self,
        op: &'static str,
        request: DaemonRequest,
    ) -> ControlResult<DaemonResponse> {
        let socket = self.paths.socket_path();
        let stream = match UnixStream::connect(socket).await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(op, error = %e, "daemon socket not connectable");
                return Err(ControlError::Unreachable(socket.display().to_string()));
            }
        };

        let round_trip = async {
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);

            let request_json = serde_json::to_string(&request)?;
            writer.write_all(request_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            let mut line = String::new();
            reader.read_line(&mut line).await?;
            let response: DaemonResponse = serde_json::from_str(&line).map_err(|e| {
                ControlError::Internal(format!("failed to parse daemon response: {}", e))
            })?;
            Ok::<_, ControlError>(response)
        };

        let response = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| ControlError::Timeout(op, self.timeout.as_millis() as u64))??;

        match response {
            DaemonResponse::Error { kind, message } => Err(ControlError::from_wire(kind, message)),
            other => Ok(other),
        }
    }
}

fn unexpected(response: DaemonResponse) -> ControlError {
    ControlError::Internal(format!("unexpected daemon response: {:?}", response))
}
