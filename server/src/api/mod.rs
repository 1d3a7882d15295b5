//! API layer

pub mod http;
pub mod mcp;
