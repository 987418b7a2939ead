//! Conversions into `rmcp::ErrorData`.
//!
//! Protocol-level errors (invalid params, internal faults) go through
//! these; operational failures that a caller should read belong in
//! `isError` text results instead (see [`crate::result::error_text`]).

use rmcp::ErrorData as McpError;

/// Result alias for tool handler signatures.
pub type McpResult<T> = Result<T, McpError>;

/// Convert an error into an MCP protocol error.
pub trait IntoMcpError {
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for std::io::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("IO error: {}", self), None)
    }
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("JSON error: {}", self), None)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

impl IntoMcpError for String {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self, None)
    }
}

/// `.to_mcp_err()?` on any result whose error converts.
pub trait ResultExt<T> {
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// The caller's arguments failed validation; the message should name the
/// offending field.
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_with_context() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = result.to_mcp_err().unwrap_err();
        assert!(err.message.contains("no such file"));
    }

    #[test]
    fn invalid_params_keeps_the_field_name() {
        let err = invalid_params("lines must be at least 1");
        assert!(err.message.contains("lines"));
    }
}
