//! Configuration schema types for `forkarcade.toml`
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration for the public ForkArcade platform.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Platform identity: GitHub organization, topics and public URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// GitHub organization that owns templates and games
    pub org: String,
    /// Platform API base URL (overridden by `FORKARCADE_API`)
    pub api_url: String,
    /// Public site where published games are listed
    pub site_url: String,
    /// Topic that marks a repository as a game template
    pub template_topic: String,
    /// Topic added to every game repository
    pub game_topic: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            org: "ForkArcade".to_string(),
            api_url: "http://localhost:8000".to_string(),
            site_url: "https://forkarcade.github.io".to_string(),
            template_topic: "forkarcade-template".to_string(),
            game_topic: "forkarcade-game".to_string(),
        }
    }
}

impl PlatformConfig {
    /// GitHub Pages URL a published game is served from.
    pub fn game_url(&self, slug: &str) -> String {
        format!("https://{}.github.io/{}/", self.org.to_lowercase(), slug)
    }

    /// Platform page for a game.
    pub fn platform_url(&self, slug: &str) -> String {
        format!("{}/#/play/{}", self.site_url.trim_end_matches('/'), slug)
    }

    pub fn repo_url(&self, slug: &str) -> String {
        format!("https://github.com/{}/{}", self.org, slug)
    }
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory all game checkouts live under (overridden by `FORKARCADE_GAMES_DIR`)
    pub games_dir: PathBuf,
    /// Canonical copy of `forkarcade-sdk.js`
    pub sdk_path: PathBuf,
    /// Command written into each game's `.mcp.json`
    pub server_command: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            games_dir: PathBuf::from("games"),
            sdk_path: PathBuf::from("sdk/forkarcade-sdk.js"),
            server_command: "forkarcade".to_string(),
        }
    }
}

/// Timeouts, cache lifetimes and size bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Timeout for `git` and mutating `gh` commands
    pub command_timeout_secs: u64,
    /// Timeout for read-only `gh api` calls
    pub api_timeout_secs: u64,
    /// Lifetime of cached template listings and template files
    pub cache_ttl_secs: u64,
    /// Lifetime of a cached `_sprites.json`
    pub sprite_cache_ttl_secs: u64,
    /// Largest accepted thumbnail or layer dimension
    pub max_thumbnail_size: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            api_timeout_secs: 15,
            cache_ttl_secs: 300,
            sprite_cache_ttl_secs: 5,
            max_thumbnail_size: 512,
        }
    }
}

impl LimitsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sprite_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.sprite_cache_ttl_secs)
    }
}

/// Complete `forkarcade.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForkArcadeConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// A single configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "limits.command_timeout_secs")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "forkarcade.toml: '{}' {}", self.field, self.message)
    }
}

impl ForkArcadeConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut require = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: message.to_string(),
                });
            }
        };

        require(!self.platform.org.trim().is_empty(), "platform.org", "must be a non-empty string");
        require(
            !self.platform.template_topic.trim().is_empty(),
            "platform.template_topic",
            "must be a non-empty string",
        );
        require(
            !self.platform.game_topic.trim().is_empty(),
            "platform.game_topic",
            "must be a non-empty string",
        );
        require(
            !self.paths.server_command.trim().is_empty(),
            "paths.server_command",
            "must be a non-empty string",
        );
        require(
            self.limits.command_timeout_secs > 0,
            "limits.command_timeout_secs",
            "must be a positive integer",
        );
        require(self.limits.api_timeout_secs > 0, "limits.api_timeout_secs", "must be a positive integer");
        require(
            (1..=4096).contains(&self.limits.max_thumbnail_size),
            "limits.max_thumbnail_size",
            "must be between 1 and 4096",
        );

        errors
    }
}
