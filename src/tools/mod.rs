//! Tool parameter types and the logic behind each MCP tool, kept apart
//! from the server's routing.

pub mod authoring;
pub mod page;
pub mod playback;
