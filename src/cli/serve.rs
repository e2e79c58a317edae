//! `serve`: the MCP server over stdio.

use std::process::ExitCode;

use tokio::runtime::Runtime;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::tools::ToolContext;

/// Execute the serve command
pub fn run_serve(ctx: ToolContext) -> ExitCode {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create async runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match rt.block_on(crate::mcp::run_server(ctx)) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: MCP server failed: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
