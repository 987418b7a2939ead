//! Wire protocol between the control client and the daemon.
//!
//! Framing: newline-delimited JSON over a Unix domain socket, one request
//! per connection, one in-flight request per connection. The connection is
//! unauthenticated and local-only; an absent socket is the normal signal
//! for "daemon not running", not a protocol violation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorKind;
use crate::store::{AutonomousConfig, RoleConfig, TerminalConfig, TerminalStatus};

/// Request from a control client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonRequest {
    /// Liveness probe.
    Ping,

    /// Enumerate all terminals with live status.
    ListTerminals,

    /// Most recent `lines` lines of captured output for a terminal.
    GetOutput { id: String, lines: usize },

    /// Deliver text to a terminal's input stream.
    SendInput { id: String, text: String },

    /// Allocate and start a new terminal.
    Create { spec: CreateSpec },

    /// Tear down a terminal and remove it from both documents.
    Delete { id: String },

    /// Recreate the underlying session, preserving configuration.
    Restart { id: String },

    /// Merge a partial configuration update.
    Configure {
        id: String,
        patch: crate::store::TerminalPatch,
    },

    /// Make `id` the single primary terminal.
    SetPrimary { id: String },

    /// Enable the autonomous interval timer.
    StartInterval { id: String },

    /// Disable the autonomous interval timer.
    StopInterval { id: String },

    /// Fire one interval injection now, leaving the schedule untouched.
    RunIntervalNow { id: String },

    /// Performance counters for a terminal.
    GetMetrics { id: String },

    /// Flush state and exit.
    Shutdown,
}

/// Response from the daemon. Every request gets exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    Pong,
    Terminals { terminals: Vec<TerminalSummary> },
    Output { id: String, text: String },
    Created { terminal: TerminalSummary },
    Metrics { id: String, metrics: AgentMetrics },
    Ok,
    Error { kind: ErrorKind, message: String },
}

/// Caller-supplied fields for terminal creation. Everything is optional;
/// the daemon fills defaults from the persisted agent counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: RoleConfig,
    #[serde(default)]
    pub autonomous: AutonomousConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// One terminal as seen by a caller: configuration joined with live
/// runtime fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub id: String,
    pub name: String,
    pub status: TerminalStatus,
    pub is_primary: bool,
    pub role: RoleConfig,
    pub autonomous: AutonomousConfig,
    pub session_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl TerminalSummary {
    /// Join a config entry with its runtime fields.
    pub fn from_parts(config: &TerminalConfig, status: TerminalStatus, is_primary: bool) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            status,
            is_primary,
            role: config.role.clone(),
            autonomous: config.autonomous.clone(),
            session_name: config.session_name.clone(),
            working_dir: config.working_dir.clone(),
            created_at: config.created_at,
        }
    }
}

/// Performance counters the daemon tracks per terminal. A terminal with
/// no recorded activity reports the zeroed default rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub interval_runs: u64,
    pub inputs_sent: u64,
    pub restarts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interval_run: Option<DateTime<Utc>>,
}

/// Where a read result came from. `Daemon` data is authoritative;
/// `Snapshot` data was reconstructed from disk because the daemon was
/// unreachable and may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Daemon,
    Snapshot,
}

/// Result of `list_terminals`, labeled with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalList {
    pub source: DataSource,
    pub terminals: Vec<TerminalSummary>,
}

/// Result of `terminal_output`, labeled with its provenance. Output
/// history lives only in the daemon, so a `Snapshot` result can prove
/// the terminal exists but carries no text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalOutput {
    pub source: DataSource,
    pub text: String,
}

/// Result of `agent_metrics`, labeled with its provenance. A `Snapshot`
/// result reconstructs what the state document mirrors (the last
/// interval run); the counters themselves live only in the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub source: DataSource,
    pub metrics: AgentMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_as_tagged_json() {
        let req = DaemonRequest::GetOutput {
            id: "t-1".into(),
            lines: 40,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"GetOutput\""));

        let back: DaemonRequest = serde_json::from_str(&json).unwrap();
        match back {
            DaemonRequest::GetOutput { id, lines } => {
                assert_eq!(id, "t-1");
                assert_eq!(lines, 40);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn error_response_carries_kind_and_message() {
        let resp = DaemonResponse::Error {
            kind: ErrorKind::NotFound,
            message: "terminal not found: t-9".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"kind\":\"not_found\""));
        assert!(json.contains("t-9"));
    }

    #[test]
    fn create_spec_defaults_are_empty() {
        let spec: CreateSpec = serde_json::from_str("{}").unwrap();
        assert!(spec.id.is_none());
        assert!(spec.name.is_none());
        assert_eq!(spec.role, RoleConfig::Plain);
        assert!(!spec.autonomous.enabled());
    }

    #[test]
    fn metrics_default_is_the_no_data_result() {
        let metrics = AgentMetrics::default();
        assert_eq!(metrics.interval_runs, 0);
        assert_eq!(metrics.inputs_sent, 0);
        assert_eq!(metrics.restarts, 0);
        assert!(metrics.last_interval_run.is_none());
    }
}
