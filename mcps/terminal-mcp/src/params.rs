//! Parameter definitions for terminal-mcp tools.
//!
//! Role fields are flattened into the tool schema (`role_kind` plus its
//! kind-specific companions); handlers reassemble them into the typed
//! role and reject inconsistent combinations before dispatch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Reads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTerminalOutputParams {
    /// Terminal id
    pub id: String,
    /// How many trailing lines to return (default 50)
    #[serde(default)]
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetAgentMetricsParams {
    /// Terminal id
    pub id: String,
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTerminalParams {
    /// Explicit terminal id; omit to auto-assign from the agent counter
    #[serde(default)]
    pub id: Option<String>,
    /// Display name; omit to auto-name from the agent counter
    #[serde(default)]
    pub name: Option<String>,
    /// Role kind: "plain" (default), "worker", or "custom"
    #[serde(default)]
    pub role_kind: Option<String>,
    /// Agent CLI to run; required when role_kind is "worker"
    #[serde(default)]
    pub worker_type: Option<String>,
    /// Prompt file handed to a worker role
    #[serde(default)]
    pub prompt_file: Option<String>,
    /// Free-form prompt reference; required when role_kind is "custom"
    #[serde(default)]
    pub role_reference: Option<String>,
    /// Autonomous interval in milliseconds; 0 or omitted disables it
    #[serde(default)]
    pub target_interval_ms: Option<u64>,
    /// Prompt injected on each autonomous interval
    #[serde(default)]
    pub interval_prompt: Option<String>,
    /// Working directory for the session
    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteTerminalParams {
    /// Terminal id
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RestartTerminalParams {
    /// Terminal id
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigureTerminalParams {
    /// Terminal id
    pub id: String,
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// New role kind: "plain", "worker", or "custom"
    #[serde(default)]
    pub role_kind: Option<String>,
    #[serde(default)]
    pub worker_type: Option<String>,
    #[serde(default)]
    pub prompt_file: Option<String>,
    #[serde(default)]
    pub role_reference: Option<String>,
    /// New autonomous interval in milliseconds; 0 disables
    #[serde(default)]
    pub target_interval_ms: Option<u64>,
    #[serde(default)]
    pub interval_prompt: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

// ============================================================================
// Interaction
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendInputParams {
    /// Terminal id
    pub id: String,
    /// Text delivered to the session's input stream
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetPrimaryTerminalParams {
    /// Terminal id to promote; every other terminal is demoted
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartAutonomousModeParams {
    /// Terminal id
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StopAutonomousModeParams {
    /// Terminal id
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LaunchIntervalParams {
    /// Terminal id
    pub id: String,
}
