//! Terminal MCP Library
//!
//! Exposes helmsman's terminal orchestration as a fixed MCP tool
//! catalog: enumerate, create, configure, restart, and delete terminals;
//! deliver input; toggle autonomous interval mode; read output, metrics,
//! and the aggregated UI state.
//!
//! Degradation contract: reads survive a dead daemon by reconstructing
//! from the on-disk documents (labeled as snapshots); mutations fail
//! fast with an unreachable error instead of queuing.

pub mod handlers;
pub mod params;
pub mod server;
pub mod types;

// Re-export main server type
pub use server::TerminalMcpServer;

// Re-export parameter types for direct API usage
pub use params::*;
