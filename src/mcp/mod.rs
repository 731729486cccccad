// MCP (Model Context Protocol) surface exposing the license operations as tools.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::{Tool, ToolRegistry};
