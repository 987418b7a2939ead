//! MCP server for terminal orchestration.
//!
//! The tool catalog is fixed at startup: the router is built once in
//! `new()` and is the authoritative list for tools/list. Each tool maps
//! 1:1 to one control-client operation, plus the composite UI-state and
//! daemon-status reads.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};

use helmsman_control::ControlClient;

use crate::handlers;
use crate::params::*;

/// The terminal orchestration MCP server.
#[derive(Clone)]
pub struct TerminalMcpServer {
    client: ControlClient,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TerminalMcpServer {
    /// Server over environment-resolved workspace and socket paths.
    pub fn new() -> Self {
        Self::with_client(ControlClient::from_env())
    }

    /// Server over an explicit client. Used by tests.
    pub fn with_client(client: ControlClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[tool(
        description = "List all terminals with status; falls back to a disk snapshot when the daemon is down"
    )]
    async fn list_terminals(&self) -> Result<CallToolResult, McpError> {
        handlers::list_terminals(&self.client).await
    }

    #[tool(description = "Most recent output lines captured for a terminal")]
    async fn get_terminal_output(
        &self,
        Parameters(params): Parameters<GetTerminalOutputParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_terminal_output(&self.client, params).await
    }

    #[tool(description = "Per-terminal performance counters (interval runs, inputs, restarts)")]
    async fn get_agent_metrics(
        &self,
        Parameters(params): Parameters<GetAgentMetricsParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_agent_metrics(&self.client, params).await
    }

    #[tool(
        description = "Comprehensive UI state: workspace path, configuration, and runtime state in one snapshot"
    )]
    async fn get_ui_state(&self) -> Result<CallToolResult, McpError> {
        handlers::get_ui_state(&self.client).await
    }

    #[tool(description = "Whether the session daemon is reachable, and where")]
    async fn get_daemon_status(&self) -> Result<CallToolResult, McpError> {
        handlers::get_daemon_status(&self.client).await
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    #[tool(description = "Create a terminal; id/name auto-assigned from the agent counter if omitted")]
    async fn create_terminal(
        &self,
        Parameters(params): Parameters<CreateTerminalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::create_terminal(&self.client, params).await
    }

    #[tool(description = "Tear down a terminal and remove it from configuration and state")]
    async fn delete_terminal(
        &self,
        Parameters(params): Parameters<DeleteTerminalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::delete_terminal(&self.client, params).await
    }

    #[tool(description = "Recreate a terminal's session with cleared history, keeping its configuration")]
    async fn restart_terminal(
        &self,
        Parameters(params): Parameters<RestartTerminalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::restart_terminal(&self.client, params).await
    }

    #[tool(description = "Partially update a terminal's configuration (unset fields are untouched)")]
    async fn configure_terminal(
        &self,
        Parameters(params): Parameters<ConfigureTerminalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::configure_terminal(&self.client, params).await
    }

    // ========================================================================
    // Interaction
    // ========================================================================

    #[tool(description = "Deliver text to a terminal's input stream (requires a running daemon)")]
    async fn send_input(
        &self,
        Parameters(params): Parameters<SendInputParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::send_input(&self.client, params).await
    }

    #[tool(description = "Make one terminal primary; all others are demoted atomically")]
    async fn set_primary_terminal(
        &self,
        Parameters(params): Parameters<SetPrimaryTerminalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::set_primary_terminal(&self.client, params).await
    }

    #[tool(description = "Start interval-driven prompt injection for a terminal (idempotent)")]
    async fn start_autonomous_mode(
        &self,
        Parameters(params): Parameters<StartAutonomousModeParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::start_autonomous_mode(&self.client, params).await
    }

    #[tool(description = "Stop interval-driven prompt injection for a terminal")]
    async fn stop_autonomous_mode(
        &self,
        Parameters(params): Parameters<StopAutonomousModeParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::stop_autonomous_mode(&self.client, params).await
    }

    #[tool(description = "Inject the interval prompt once, immediately, without touching the schedule")]
    async fn launch_interval(
        &self,
        Parameters(params): Parameters<LaunchIntervalParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::launch_interval(&self.client, params).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for TerminalMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Terminal orchestration control plane. Lists, creates, configures, and drives \
                 PTY-backed agent terminals owned by the helmsman daemon. Reads fall back to \
                 on-disk snapshots (labeled 'snapshot') when the daemon is down; mutations \
                 require a running daemon and report 'unreachable' otherwise."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

impl Default for TerminalMcpServer {
    fn default() -> Self {
        Self::new()
    }
}
