//! `CallToolResult` constructors.
//!
//! Success payloads are serialized with `serde_json::to_string_pretty`,
//! which walks struct fields in declaration order — so a response type
//! with fixed fields (and `BTreeMap` for any maps) serializes
//! byte-identically for unchanged state. Callers diff tool output across
//! invocations; don't break that.

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Successful result carrying one pretty-printed JSON text block.
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Successful result carrying plain text.
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Failed result: a text block tagged `isError`, with the message kept
/// verbatim. Use this for operational failures the caller should read
/// and act on; reserve protocol-level errors for malformed invocations.
pub fn error_text(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        id: &'static str,
        count: u32,
    }

    fn first_text(result: &CallToolResult) -> String {
        match &result.content[0].raw {
            RawContent::Text(t) => t.text.to_string(),
            other => panic!("expected text content, got {:?}", other),
        }
    }

    #[test]
    fn json_success_is_not_tagged_error() {
        let result = json_success(&Sample { id: "t-1", count: 3 }).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn json_success_is_deterministic() {
        let sample = Sample { id: "t-1", count: 3 };
        let a = json_success(&sample).unwrap();
        let b = json_success(&sample).unwrap();
        assert_eq!(first_text(&a), first_text(&b));
    }

    #[test]
    fn error_text_sets_the_flag_and_keeps_the_message() {
        let result = error_text("daemon unreachable at /tmp/x.sock");
        assert!(result.is_error.unwrap_or(false));
        assert!(first_text(&result).contains("/tmp/x.sock"));
    }
}
