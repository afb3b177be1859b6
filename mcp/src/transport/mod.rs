//! Transport layer for MCP communication.
//!
//! Only stdio is implemented: the server is meant to be launched as a
//! subprocess by an MCP-speaking client (Claude Desktop, an agent runtime,
//! or a test harness piping JSON-RPC over stdin/stdout).

mod stdio;
mod traits;

pub use stdio::StdioTransport;
pub use traits::{BidirectionalTransport, Transport};
