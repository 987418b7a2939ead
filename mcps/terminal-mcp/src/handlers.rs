//! Handler implementations for terminal-mcp tools.
//!
//! Validation failures are protocol errors naming the offending field;
//! operational failures from the control client come back as `isError`
//! text blocks with the original message preserved, so the calling
//! assistant can read and act on them.

use mcp_common::{error_text, invalid_params, json_success, CallToolResult, McpError};
use serde_json::json;

use helmsman_control::{ControlClient, ControlError, CreateSpec, RoleConfig, TerminalPatch};

use crate::params::*;
use crate::types::*;

const DEFAULT_OUTPUT_LINES: usize = 50;

// ============================================================================
// Reads
// ============================================================================

pub async fn list_terminals(client: &ControlClient) -> Result<CallToolResult, McpError> {
    match client.list_terminals().await {
        Ok(list) => json_success(&TerminalListResponse {
            source: list.source,
            total: list.terminals.len(),
            terminals: list.terminals,
        }),
        Err(e) => Ok(render(e)),
    }
}

pub async fn get_terminal_output(
    client: &ControlClient,
    params: GetTerminalOutputParams,
) -> Result<CallToolResult, McpError> {
    let lines = params.lines.unwrap_or(DEFAULT_OUTPUT_LINES);
    if lines == 0 {
        return Err(invalid_params("lines must be at least 1"));
    }

    match client.terminal_output(&params.id, lines).await {
        Ok(output) => json_success(&TerminalOutputResponse {
            source: output.source,
            id: params.id,
            lines_requested: lines,
            text: output.text,
        }),
        Err(e) => Ok(render(e)),
    }
}

pub async fn get_agent_metrics(
    client: &ControlClient,
    params: GetAgentMetricsParams,
) -> Result<CallToolResult, McpError> {
    match client.agent_metrics(&params.id).await {
        Ok(report) => json_success(&MetricsResponse {
            source: report.source,
            id: params.id,
            metrics: report.metrics,
        }),
        Err(e) => Ok(render(e)),
    }
}

pub async fn get_ui_state(client: &ControlClient) -> Result<CallToolResult, McpError> {
    match client.ui_state().await {
        Ok(ui) => json_success(&ui),
        Err(e) => Ok(render(e)),
    }
}

pub async fn get_daemon_status(client: &ControlClient) -> Result<CallToolResult, McpError> {
    let running = client.is_daemon_running().await;
    json_success(&DaemonStatusResponse {
        running,
        socket_path: client.paths().socket_path().display().to_string(),
        workspace_dir: client.paths().workspace_dir().display().to_string(),
    })
}

// ============================================================================
// Session lifecycle
// ============================================================================

pub async fn create_terminal(
    client: &ControlClient,
    params: CreateTerminalParams,
) -> Result<CallToolResult, McpError> {
    if let Some(id) = &params.id {
        if id.trim().is_empty() {
            return Err(invalid_params("id must not be empty"));
        }
    }
    let role = role_from_parts(
        params.role_kind.as_deref(),
        params.worker_type,
        params.prompt_file,
        params.role_reference,
    )?
    .unwrap_or_default();

    let spec = CreateSpec {
        id: params.id,
        name: params.name,
        role,
        autonomous: helmsman_control::AutonomousConfig {
            target_interval_ms: params.target_interval_ms.unwrap_or(0),
            interval_prompt: params.interval_prompt,
        },
        working_dir: params.working_dir.map(Into::into),
    };

    match client.create_terminal(spec).await {
        Ok(terminal) => json_success(&terminal),
        Err(e) => Ok(render(e)),
    }
}

pub async fn delete_terminal(
    client: &ControlClient,
    params: DeleteTerminalParams,
) -> Result<CallToolResult, McpError> {
    match client.delete_terminal(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("terminal '{}' deleted", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn restart_terminal(
    client: &ControlClient,
    params: RestartTerminalParams,
) -> Result<CallToolResult, McpError> {
    match client.restart_terminal(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("terminal '{}' restarted with cleared history", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn configure_terminal(
    client: &ControlClient,
    params: ConfigureTerminalParams,
) -> Result<CallToolResult, McpError> {
    let role = role_from_parts(
        params.role_kind.as_deref(),
        params.worker_type,
        params.prompt_file,
        params.role_reference,
    )?;

    let patch = TerminalPatch {
        name: params.name,
        role,
        target_interval_ms: params.target_interval_ms,
        interval_prompt: params.interval_prompt,
        working_dir: params.working_dir.map(Into::into),
    };
    if patch.is_empty() {
        return Err(invalid_params(
            "at least one field to update must be provided",
        ));
    }

    match client.configure_terminal(&params.id, patch).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("terminal '{}' configuration updated", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

// ============================================================================
// Interaction
// ============================================================================

pub async fn send_input(
    client: &ControlClient,
    params: SendInputParams,
) -> Result<CallToolResult, McpError> {
    match client.send_input(&params.id, &params.text).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": "input delivered",
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn set_primary_terminal(
    client: &ControlClient,
    params: SetPrimaryTerminalParams,
) -> Result<CallToolResult, McpError> {
    match client.set_primary_terminal(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("terminal '{}' is now primary", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn start_autonomous_mode(
    client: &ControlClient,
    params: StartAutonomousModeParams,
) -> Result<CallToolResult, McpError> {
    match client.start_autonomous(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("autonomous mode running for terminal '{}'", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn stop_autonomous_mode(
    client: &ControlClient,
    params: StopAutonomousModeParams,
) -> Result<CallToolResult, McpError> {
    match client.stop_autonomous(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": format!("autonomous mode stopped for terminal '{}'", params.id),
        })),
        Err(e) => Ok(render(e)),
    }
}

pub async fn launch_interval(
    client: &ControlClient,
    params: LaunchIntervalParams,
) -> Result<CallToolResult, McpError> {
    match client.launch_interval(&params.id).await {
        Ok(()) => json_success(&json!({
            "success": true,
            "id": params.id,
            "message": "interval prompt injected; schedule unchanged",
        })),
        Err(e) => Ok(render(e)),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Render an operational failure as an isError text block, message
/// verbatim.
fn render(err: ControlError) -> CallToolResult {
    error_text(err.to_string())
}

/// Reassemble the flattened role fields into the typed role config.
/// `Ok(None)` means the caller didn't touch the role at all.
fn role_from_parts(
    role_kind: Option<&str>,
    worker_type: Option<String>,
    prompt_file: Option<String>,
    role_reference: Option<String>,
) -> Result<Option<RoleConfig>, McpError> {
    match role_kind {
        None => {
            if worker_type.is_some() || prompt_file.is_some() || role_reference.is_some() {
                return Err(invalid_params(
                    "role_kind is required when worker_type, prompt_file, or role_reference is set",
                ));
            }
            Ok(None)
        }
        Some("plain") => {
            if worker_type.is_some() || prompt_file.is_some() || role_reference.is_some() {
                return Err(invalid_params(
                    "worker_type, prompt_file, and role_reference do not apply when role_kind is \"plain\"",
                ));
            }
            Ok(Some(RoleConfig::Plain))
        }
        Some("worker") => {
            if role_reference.is_some() {
                return Err(invalid_params(
                    "role_reference does not apply when role_kind is \"worker\"",
                ));
            }
            let worker_type = worker_type.ok_or_else(|| {
                invalid_params("worker_type is required when role_kind is \"worker\"")
            })?;
            Ok(Some(RoleConfig::Worker {
                worker_type,
                prompt_file: prompt_file.map(Into::into),
            }))
        }
        Some("custom") => {
            if worker_type.is_some() || prompt_file.is_some() {
                return Err(invalid_params(
                    "worker_type and prompt_file do not apply when role_kind is \"custom\"",
                ));
            }
            let reference = role_reference.ok_or_else(|| {
                invalid_params("role_reference is required when role_kind is \"custom\"")
            })?;
            Ok(Some(RoleConfig::Custom { reference }))
        }
        Some(other) => Err(invalid_params(format!(
            "role_kind must be \"plain\", \"worker\", or \"custom\" (got \"{}\")",
            other
        ))),
    }
}
