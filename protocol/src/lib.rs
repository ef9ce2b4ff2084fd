//! Data model shared between the task core and the MCP server facade.

mod models;

pub use models::*;
