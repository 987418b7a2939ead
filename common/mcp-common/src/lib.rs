//! Shared plumbing for helmsman's MCP servers.
//!
//! - [`init`]: tracing setup (stderr only — stdout belongs to the MCP
//!   protocol) and the `serve_stdio!` startup macro.
//! - [`result`]: `CallToolResult` constructors: deterministic JSON
//!   success blocks, plain text, and `isError`-tagged failures.
//! - [`error`]: conversions from common error types into
//!   `rmcp::ErrorData` so `?` works inside tool handlers.

pub mod error;
pub mod init;
pub mod result;

pub use error::{internal_error, invalid_params, IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use result::{error_text, json_success, text_success};

// Commonly needed rmcp types, re-exported so servers depend on one name.
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};
