pub mod client;
pub mod tool;
pub mod types;

pub use client::{discover_tools, HttpMcpTransport, McpTransport};
pub use tool::McpTool;
pub use types::McpToolDescriptor;
