//! Game directories: `.forkarcade.json`, SDK versions, file checks and
//! version snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const GAME_CONFIG: &str = ".forkarcade.json";
pub const MCP_CONFIG: &str = ".mcp.json";
pub const SDK_FILE: &str = "forkarcade-sdk.js";
pub const VERSIONS_DIR: &str = "versions";

/// Files copied into `versions/v{n}/` when they exist.
pub const SNAPSHOT_FILES: [&str; 6] =
    ["index.html", "game.js", "style.css", "sprites.js", "maps.js", SDK_FILE];

#[derive(Debug, Error)]
pub enum GameError {
    #[error("No .forkarcade.json found in {}", .0.display())]
    Missing(PathBuf),
    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Contents of `.forkarcade.json`. Unknown keys are preserved on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub current_version: u32,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub sdk_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: u32,
    pub date: String,
    #[serde(default)]
    pub issue: Option<u64>,
    #[serde(default)]
    pub description: String,
}

impl GameConfig {
    /// Bump `currentVersion` and append its history entry. Returns the new version.
    pub fn record_publish(&mut self, date: NaiveDate) -> u32 {
        let next = self.current_version + 1;
        self.current_version = next;
        let description =
            if next == 1 { "Initial release".to_string() } else { format!("Published v{}", next) };
        self.versions.push(VersionEntry {
            version: next,
            date: date.format("%Y-%m-%d").to_string(),
            issue: None,
            description,
        });
        next
    }
}

pub fn load_game_config(game_dir: &Path) -> Result<GameConfig, GameError> {
    let path = game_dir.join(GAME_CONFIG);
    if !path.exists() {
        return Err(GameError::Missing(game_dir.to_path_buf()));
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text)
        .map_err(|source| GameError::Parse { path: path.display().to_string(), source })
}

pub fn save_game_config(game_dir: &Path, config: &GameConfig) -> Result<(), GameError> {
    let path = game_dir.join(GAME_CONFIG);
    let json = serde_json::to_string_pretty(config)
        .map_err(|source| GameError::Parse { path: path.display().to_string(), source })?;
    fs::write(path, json + "\n")?;
    Ok(())
}

/// The game config of `dir`, if it is a game directory with a template set.
pub fn detect_game_context(dir: &Path) -> Option<GameConfig> {
    match load_game_config(dir) {
        Ok(config) if !config.template.is_empty() => Some(config),
        Ok(_) => None,
        Err(GameError::Missing(_)) => None,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "ignoring unreadable game config");
            None
        }
    }
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v(\d+)").expect("valid version regex"))
}

/// SDK version from the `v{n}` marker on the first line, 0 when absent.
pub fn parse_sdk_version(content: &str) -> u32 {
    let first_line = content.lines().next().unwrap_or("");
    version_re()
        .captures(first_line)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// The canonical SDK and its version.
#[derive(Debug, Clone)]
pub struct SdkInfo {
    pub version: u32,
    pub content: String,
}

pub fn read_sdk(path: &Path) -> io::Result<SdkInfo> {
    let content = fs::read_to_string(path)?;
    Ok(SdkInfo { version: parse_sdk_version(&content), content })
}

/// Version of the SDK copy in a game directory, 0 when missing.
pub fn local_sdk_version(game_dir: &Path) -> u32 {
    fs::read_to_string(game_dir.join(SDK_FILE)).map(|c| parse_sdk_version(&c)).unwrap_or(0)
}

/// Outcome of the pre-publish file checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check the files a game needs before it can be published.
///
/// `latest_sdk` is the canonical SDK version; the outdated check is skipped
/// when it is unknown.
pub fn check_game_files(game_dir: &Path, latest_sdk: Option<u32>) -> GameReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if !game_dir.join(SDK_FILE).exists() {
        issues.push(format!("Missing {SDK_FILE}. Use the update_sdk tool to add it"));
    } else if let Some(latest) = latest_sdk {
        let local = local_sdk_version(game_dir);
        if local < latest {
            warnings.push(format!(
                "SDK outdated: local v{local}, latest v{latest}. Use update_sdk tool."
            ));
        }
    }

    match fs::read_to_string(game_dir.join("index.html")) {
        Err(_) => issues.push("Missing index.html".to_string()),
        Ok(html) => {
            if !html.contains("forkarcade-sdk") {
                issues.push(
                    "SDK not included in index.html. Add <script src=\"forkarcade-sdk.js\"></script>"
                        .to_string(),
                );
            } else if html.contains("http") && !html.contains("src=\"forkarcade-sdk.js\"") {
                warnings.push(
                    "SDK loaded from remote URL. Change to <script src=\"forkarcade-sdk.js\"></script> (local file)"
                        .to_string(),
                );
            }
            if !html.contains("<canvas") {
                issues.push("No <canvas> element found in index.html".to_string());
            }
            if !html.contains("sprites.js") {
                warnings.push(
                    "sprites.js not included in index.html, sprite rendering will not work. \
                     Add <script src=\"sprites.js\"></script> before game.js"
                        .to_string(),
                );
            }
        }
    }

    match fs::read_to_string(game_dir.join("game.js")) {
        Err(_) => issues.push("Missing game.js".to_string()),
        Ok(js) => {
            if !js.contains("submitScore") {
                issues.push(
                    "game.js does not call ForkArcade.submitScore(), scores won't be recorded"
                        .to_string(),
                );
            }
            if !js.contains("onReady") {
                issues.push(
                    "game.js does not call ForkArcade.onReady(), game may not initialize properly"
                        .to_string(),
                );
            }
        }
    }

    if !game_dir.join("style.css").exists() {
        warnings.push("Missing style.css (optional but recommended)".to_string());
    }
    if !game_dir.join("sprites.js").exists() {
        warnings.push("No sprites.js, game will use text fallback for rendering (optional)".to_string());
    }

    GameReport { valid: issues.is_empty(), issues, warnings }
}

/// Copy the snapshot files into `versions/v{version}/`. Returns the copied names.
pub fn snapshot_version(game_dir: &Path, version: u32) -> io::Result<Vec<&'static str>> {
    let target = game_dir.join(VERSIONS_DIR).join(format!("v{}", version));
    fs::create_dir_all(&target)?;
    let mut copied = Vec::new();
    for name in SNAPSHOT_FILES {
        let src = game_dir.join(name);
        if src.is_file() {
            fs::copy(&src, target.join(name))?;
            copied.push(name);
        }
    }
    Ok(copied)
}

/// `.mcp.json` contents pointing a game's assistant session at this server.
pub fn mcp_config_json(command: &str, args: &[String]) -> Value {
    serde_json::json!({
        "mcpServers": {
            "forkarcade": {
                "type": "stdio",
                "command": command,
                "args": args,
                "env": {},
            }
        }
    })
}
