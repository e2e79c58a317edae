//! ForkArcade - tool-call backend for pixel-art browser games
//!
//! This library provides:
//! - A registry of tools for scaffolding, authoring and publishing games,
//!   served over MCP or called from the command line
//! - Sprite sheet and tile map storage with generated browser loaders
//! - A layered procedural thumbnail compositor
//! - Thin wrappers around the `gh` and `git` command-line tools

pub mod cache;
pub mod cli;
pub mod color;
pub mod config;
pub mod game;
pub mod github;
pub mod logging;
pub mod maps;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod paths;
pub mod shapes;
pub mod sprites;
pub mod templates;
pub mod thumbnail;
pub mod tools;
