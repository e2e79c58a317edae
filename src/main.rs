//! ForkArcade - command-line entry point and MCP server

use std::process::ExitCode;

use forkarcade::cli;

fn main() -> ExitCode {
    cli::run()
}
