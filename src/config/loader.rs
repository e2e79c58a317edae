//! Configuration loading and discovery for `forkarcade.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::ForkArcadeConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked for during discovery.
pub const CONFIG_FILE: &str = "forkarcade.toml";

/// Environment variable overriding `platform.api_url`.
pub const ENV_API_URL: &str = "FORKARCADE_API";

/// Environment variable overriding `paths.games_dir`.
pub const ENV_GAMES_DIR: &str = "FORKARCADE_GAMES_DIR";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse forkarcade.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Explicit config file instead of discovery
    pub config: Option<PathBuf>,
    /// Override the games root
    pub games_dir: Option<PathBuf>,
}

/// Find forkarcade.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for forkarcade.toml
/// 2. Check XDG_CONFIG_HOME/forkarcade/forkarcade.toml (or ~/.config/forkarcade/forkarcade.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find forkarcade.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("forkarcade").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find forkarcade.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration.
///
/// With an explicit `path` the file must exist. Otherwise the file is
/// discovered with [`find_config`], and defaults are used when none is found.
/// Relative paths in the `[paths]` section are resolved against the
/// directory holding the config file (or the current directory), and
/// environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> Result<ForkArcadeConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let (mut config, root) = match config_path {
        Some(p) => {
            let config = load_config_file(&p)?;
            let root = project_root(&p).map(Path::to_path_buf).unwrap_or_default();
            tracing::debug!(path = %p.display(), "loaded configuration");
            (config, root)
        }
        None => (default_config(), env::current_dir()?),
    };

    apply_env_overrides(&mut config);
    resolve_paths(&mut config, &root);
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<ForkArcadeConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ForkArcadeConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Configuration used when no forkarcade.toml is found.
pub fn default_config() -> ForkArcadeConfig {
    ForkArcadeConfig::default()
}

/// Apply `FORKARCADE_API` and `FORKARCADE_GAMES_DIR` when set and non-empty.
pub fn apply_env_overrides(config: &mut ForkArcadeConfig) {
    if let Some(api) = env::var(ENV_API_URL).ok().filter(|v| !v.is_empty()) {
        config.platform.api_url = api;
    }
    if let Some(dir) = env::var(ENV_GAMES_DIR).ok().filter(|v| !v.is_empty()) {
        config.paths.games_dir = PathBuf::from(dir);
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file and environment values.
pub fn merge_cli_overrides(config: &mut ForkArcadeConfig, overrides: &CliOverrides) {
    if let Some(ref dir) = overrides.games_dir {
        config.paths.games_dir = dir.clone();
    }
}

/// Make `games_dir` and `sdk_path` absolute relative to `root`.
pub fn resolve_paths(config: &mut ForkArcadeConfig, root: &Path) {
    config.paths.games_dir = resolve_path(root, &config.paths.games_dir);
    config.paths.sdk_path = resolve_path(root, &config.paths.sdk_path);
}

/// Get the project root directory from a config file path.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
