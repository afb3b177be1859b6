//! # recall-mcp
//!
//! An MCP (Model Context Protocol) server exposing the memory pipeline's
//! tools over stdio JSON-RPC: any MCP-speaking client (Claude Desktop, an
//! agent runtime, a test harness) can drive the unstructured and structured
//! memory stores without linking against them directly.
//!
//! ## Exposing tools as an MCP server
//!
//! ```ignore
//! use recall_core::llm::tool::Tools;
//! use recall_mcp::McpServer;
//!
//! let mut tools = Tools::new();
//! tools.register(my_tool);
//!
//! let mut server = McpServer::stdio(tools, "recall", "0.1.0")?;
//! server.run().await?;
//! ```
//!
//! ## Error handling
//!
//! Transport- and protocol-level failures surface as [`McpError`]. Tool
//! call failures never abort the server: [`McpServer`] wraps them into the
//! `{success: false, error}` envelope and reports them as the tool result.

mod server;
pub mod protocol;
pub mod transport;

pub use protocol::{CallToolResult, Content, McpError};
pub use server::McpServer;
