//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod assets;
mod call;
#[cfg(feature = "mcp")]
mod serve;

use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{self, CliOverrides, ForkArcadeConfig};
use crate::logging;
use crate::tools::ToolContext;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// ForkArcade - scaffold, author and publish pixel-art browser games
#[derive(Parser)]
#[command(name = "forkarcade")]
#[command(about = "ForkArcade - tool-call backend for scaffolding, authoring and publishing games")]
#[command(version)]
pub struct Cli {
    /// Config file (default: forkarcade.toml discovered from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding all games (overrides config and FORKARCADE_GAMES_DIR)
    #[arg(long, global = true)]
    pub games_dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    #[cfg(feature = "mcp")]
    Serve,

    /// List the tools available from the current directory
    Tools {
        /// Print names, descriptions and input schemas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call a tool with JSON arguments and print its result
    Call {
        /// Tool name, e.g. create_sprite
        tool: String,

        /// Arguments as a JSON object (default: {})
        args: Option<String>,

        /// Read the arguments from a JSON file instead
        #[arg(long, conflicts_with = "args")]
        args_file: Option<PathBuf>,

        /// Write a returned thumbnail image to this file
        #[arg(long)]
        image_out: Option<PathBuf>,
    },

    /// Render a thumbnail from a layers file without committing it
    Thumbnail {
        /// Game directory
        game: PathBuf,

        /// JSON file with {"w", "h", "layers"} (a bare layers array is accepted)
        layers: PathBuf,

        /// Output PNG (default: {game}/_thumbnail.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert legacy `pixels` sprites in _sprites.json to the frames schema
    MigrateSprites {
        /// Game directory
        game: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

/// Load configuration with CLI overrides applied.
fn load_config(cli: &Cli) -> Result<ForkArcadeConfig, config::ConfigError> {
    let overrides = CliOverrides { config: cli.config.clone(), games_dir: cli.games_dir.clone() };
    let mut config = config::load_config(overrides.config.as_deref())?;
    config::merge_cli_overrides(&mut config, &overrides);
    let cwd = env::current_dir()?;
    config.paths.games_dir = config::loader::resolve_path(&cwd, &config.paths.games_dir);
    Ok(config)
}

/// Build the tool context, or report the config error and exit.
pub(crate) fn context(cli: &Cli) -> Result<ToolContext, ExitCode> {
    match load_config(cli) {
        Ok(config) => Ok(ToolContext::system(config)),
        Err(e) => {
            eprintln!("Error: {}", e);
            Err(ExitCode::from(EXIT_INVALID_ARGS))
        }
    }
}

/// Main CLI entry point
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = match context(&cli) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    match cli.command {
        #[cfg(feature = "mcp")]
        Commands::Serve => serve::run_serve(ctx),
        Commands::Tools { json } => call::run_tools(&ctx, json),
        Commands::Call { tool, args, args_file, image_out } => {
            call::run_call(&ctx, &tool, args.as_deref(), args_file.as_deref(), image_out.as_deref())
        }
        Commands::Thumbnail { game, layers, output } => {
            assets::run_thumbnail(&ctx, &game, &layers, output.as_deref())
        }
        Commands::MigrateSprites { game, dry_run } => {
            assets::run_migrate_sprites(&ctx, &game, dry_run)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_call() {
        let cli = Cli::parse_from(["forkarcade", "--games-dir", "/g", "call", "get_versions", "{\"path\":\"x\"}"]);
        assert_eq!(cli.games_dir, Some(PathBuf::from("/g")));
        match cli.command {
            Commands::Call { tool, args, .. } => {
                assert_eq!(tool, "get_versions");
                assert_eq!(args.as_deref(), Some("{\"path\":\"x\"}"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_args_conflict() {
        let parsed = Cli::try_parse_from(["forkarcade", "call", "x", "{}", "--args-file", "a.json"]);
        assert!(parsed.is_err());
    }
}
