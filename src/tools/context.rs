//! Shared state handed to every tool call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ForkArcadeConfig;
use crate::game::{detect_game_context, GameConfig};
use crate::github::{CommandRunner, GitHub, SystemRunner};
use crate::paths::GamesRoot;
use crate::sprites::SpriteCache;
use crate::templates::TemplateCatalog;

use super::ToolError;

/// Configuration, caches and the command runner used by the tool handlers.
pub struct ToolContext {
    pub config: ForkArcadeConfig,
    pub games: GamesRoot,
    pub runner: Arc<dyn CommandRunner>,
    pub catalog: TemplateCatalog,
    pub sprites: SpriteCache,
    /// Directory relative tool paths are resolved against and game context is read from
    pub cwd: PathBuf,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("games", &self.games)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl ToolContext {
    pub fn new(config: ForkArcadeConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let games = GamesRoot::new(config.paths.games_dir.clone());
        let catalog = TemplateCatalog::new(
            &config.platform.org,
            &config.platform.template_topic,
            config.limits.cache_ttl(),
        );
        let sprites = SpriteCache::new(config.limits.sprite_cache_ttl());
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { config, games, runner, catalog, sprites, cwd }
    }

    /// Context that runs real `gh`/`git` processes.
    pub fn system(config: ForkArcadeConfig) -> Self {
        Self::new(config, Arc::new(SystemRunner))
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn github(&self) -> GitHub<'_> {
        GitHub::new(
            self.runner.as_ref(),
            &self.config.platform.org,
            self.config.limits.command_timeout(),
            self.config.limits.api_timeout(),
        )
    }

    /// The game the server was started in, if any.
    pub fn game_context(&self) -> Option<GameConfig> {
        detect_game_context(&self.cwd)
    }

    /// Resolve a tool `path` argument to a directory inside the games root.
    pub fn game_path(&self, input: &str) -> Result<PathBuf, ToolError> {
        Ok(self.games.resolve(&self.cwd, input)?)
    }

    pub fn games_root(&self) -> &Path {
        self.games.path()
    }
}
