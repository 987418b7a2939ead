//! Response shapes for terminal-mcp tools.
//!
//! Field order is the serialization order; together with `BTreeMap` keys
//! inside the control types this keeps repeated tool output
//! byte-identical for unchanged state.

use serde::Serialize;

use helmsman_control::{AgentMetrics, DataSource, TerminalSummary};

#[derive(Debug, Serialize)]
pub struct TerminalListResponse {
    /// "daemon" for live data, "snapshot" for a disk reconstruction that
    /// may be stale.
    pub source: DataSource,
    pub total: usize,
    pub terminals: Vec<TerminalSummary>,
}

#[derive(Debug, Serialize)]
pub struct TerminalOutputResponse {
    pub source: DataSource,
    pub id: String,
    pub lines_requested: usize,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub source: DataSource,
    pub id: String,
    pub metrics: AgentMetrics,
}

#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub running: bool,
    pub socket_path: String,
    pub workspace_dir: String,
}
