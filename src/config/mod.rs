//! Configuration for the ForkArcade backend
//!
//! Provides types and loading for `forkarcade.toml`.

pub mod loader;
pub mod schema;

pub use loader::{load_config, merge_cli_overrides, CliOverrides, ConfigError};
pub use schema::*;
