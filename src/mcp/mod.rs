//! MCP (Model Context Protocol) server for ForkArcade
//!
//! Exposes the tool registry over stdio so AI models can create, edit and
//! publish games. Start it with `forkarcade serve` (feature `mcp`).

mod server;

pub use server::{run_server, ForkArcadeMcpServer};
