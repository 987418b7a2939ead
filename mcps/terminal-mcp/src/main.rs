//! Terminal MCP - terminal orchestration over the helmsman control plane.

use terminal_mcp::TerminalMcpServer;

mcp_common::serve_stdio!(TerminalMcpServer, "terminal_mcp");
