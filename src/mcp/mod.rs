//! MCP surface: JSON-RPC routing and the line-framed stdio server.

pub mod protocol;
pub mod router;
pub mod transport;

pub use protocol::{rpc_error, rpc_success, JsonRpcRequest, PROTOCOL_VERSION};
pub use router::McpRouter;
pub use transport::StdioServer;
