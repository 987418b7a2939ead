//! helmsman-control — control plane for terminal-agent orchestration.
//!
//! The pieces, bottom up:
//!
//! - [`store`]: the two on-disk documents (Workspace Configuration and
//!   Runtime State) with atomic writes and unknown-field preservation.
//! - [`protocol`]: the newline-delimited JSON contract spoken over the
//!   daemon's Unix socket.
//! - [`client`]: [`ControlClient`], a stateless per-call client with a
//!   bounded timeout and a labeled disk fallback for reads.
//! - [`error`]: the typed error taxonomy every operation reports through.
//! - [`paths`]: workspace/socket resolution with the two supported
//!   environment overrides.
//!
//! The daemon binary consumes [`protocol`] and [`store`] from the other
//! side; the MCP server consumes [`client`]. Neither side ever writes the
//! documents while the daemon is alive except the daemon itself.

pub mod client;
pub mod error;
pub mod paths;
pub mod protocol;
pub mod store;

pub use client::{ControlClient, UiState, DEFAULT_TIMEOUT};
pub use error::{ControlError, ControlResult, ErrorKind};
pub use paths::{WorkspacePaths, SOCKET_ENV, WORKSPACE_ENV};
pub use protocol::{
    AgentMetrics, CreateSpec, DaemonRequest, DaemonResponse, DataSource, MetricsReport,
    TerminalList, TerminalOutput, TerminalSummary,
};
pub use store::{
    AutonomousConfig, RoleConfig, RuntimeState, TerminalConfig, TerminalPatch, TerminalRuntime,
    TerminalStatus, WorkspaceConfig, SCHEMA_VERSION,
};
