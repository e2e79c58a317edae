//! Evolve issues: listing them and applying their data patches.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{check_slug, ToolContext, ToolError, ToolOutput, ToolResult};
use crate::game::{self, GAME_CONFIG};
use crate::maps::{self, MapSet};
use crate::sprites::{self, SpriteSheet};

pub const EVOLVE_LABEL: &str = "evolve";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListEvolveIssuesInput {
    #[serde(default)]
    #[schemars(
        description = "Game slug. Defaults to the current game, or every game in the games directory"
    )]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApplyDataPatchInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[schemars(description = "Full GitHub issue body containing a ```json:data-patch block")]
    pub issue_body: String,
}

/// A parsed ```` ```json:data-patch ```` block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum DataPatch {
    Sprites(SpriteSheet),
    Maps(MapSet),
}

fn patch_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json:data-patch[ \t]*\r?\n(.*?)\r?\n```").expect("valid patch regex"))
}

/// Extract and parse the data patch from an issue body.
pub fn parse_data_patch(body: &str) -> Result<DataPatch, ToolError> {
    let block = patch_block()
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ToolError::invalid("No ```json:data-patch block found in issue body"))?;
    let value: Value = serde_json::from_str(block.as_str())
        .map_err(|e| ToolError::invalid(format!("Invalid JSON in data-patch block: {}", e)))?;
    match value.get("type").and_then(Value::as_str) {
        Some("sprites") | Some("maps") => {}
        Some(other) => {
            return Err(ToolError::invalid(format!(
                "Unsupported data-patch type: {}. Expected sprites or maps",
                other
            )))
        }
        None => return Err(ToolError::invalid("data-patch block has no \"type\"")),
    }
    serde_json::from_value(value)
        .map_err(|e| ToolError::invalid(format!("Invalid data-patch data: {}", e)))
}

pub fn list_evolve_issues(ctx: &ToolContext, input: ListEvolveIssuesInput) -> ToolResult {
    let slugs = match input.slug.filter(|s| !s.is_empty()) {
        Some(slug) => vec![slug],
        None => match ctx.game_context().map(|g| g.slug).filter(|s| !s.is_empty()) {
            Some(slug) => vec![slug],
            None => all_game_slugs(ctx.games_root())?,
        },
    };

    let gh = ctx.github();
    let mut games = Vec::new();
    let mut total = 0;
    for slug in slugs {
        check_slug(&slug)?;
        match gh.list_issues(&slug, EVOLVE_LABEL) {
            Ok(issues) => {
                let issues = match issues {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                total += issues.len();
                games.push(json!({ "slug": slug, "issues": issues }));
            }
            Err(e) => {
                tracing::warn!(%slug, error = %e, "listing evolve issues failed");
                games.push(json!({ "slug": slug, "error": e.to_string() }));
            }
        }
    }

    Ok(ToolOutput::json(json!({ "games": games, "total": total })))
}

/// Slugs of every game under `root` that has a game config.
fn all_game_slugs(root: &Path) -> Result<Vec<String>, ToolError> {
    let pattern = format!("{}/*/{}", glob::Pattern::escape(&root.to_string_lossy()), GAME_CONFIG);
    let entries = glob::glob(&pattern)
        .map_err(|e| ToolError::invalid(format!("Invalid games directory pattern: {}", e)))?;

    let mut slugs = Vec::new();
    for entry in entries.flatten() {
        let Some(dir) = entry.parent() else { continue };
        let slug = game::load_game_config(dir)
            .ok()
            .map(|config| config.slug)
            .filter(|slug| !slug.is_empty())
            .or_else(|| dir.file_name().map(|name| name.to_string_lossy().into_owned()));
        slugs.extend(slug);
    }
    slugs.sort();
    Ok(slugs)
}

/// Merge the patch into the game's sprite or map data and regenerate its script.
///
/// Entries named by the patch are replaced whole; everything else is kept.
pub fn apply_data_patch(ctx: &ToolContext, input: ApplyDataPatchInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    if !game_dir.is_dir() {
        return Err(ToolError::invalid(format!(
            "Game directory not found: {}",
            game_dir.display()
        )));
    }

    match parse_data_patch(&input.issue_body)? {
        DataPatch::Sprites(patch) => {
            patch.validate()?;
            let mut sheet = sprites::load_sheet(&game_dir)?;
            let mut changed = Vec::new();
            for (category, entries) in patch.0 {
                for (name, sprite) in entries {
                    changed.push(format!("{}/{}", category, name));
                    sheet.0.entry(category.clone()).or_default().insert(name, sprite);
                }
            }
            sprites::save_sheet(&game_dir, &sheet)?;
            ctx.sprites.invalidate(&game_dir);

            tracing::info!(count = changed.len(), "applied sprite patch");
            Ok(ToolOutput::json(json!({
                "ok": true,
                "type": "sprites",
                "message": format!(
                    "Applied {} sprites; wrote {} and {}",
                    changed.len(),
                    sprites::SPRITES_JSON,
                    sprites::SPRITES_JS
                ),
                "changed": changed,
                "total_sprites": sheet.count(),
            })))
        }
        DataPatch::Maps(patch) => {
            patch.validate()?;
            let mut set = maps::load_maps(&game_dir)?;
            let changed: Vec<String> = patch.0.keys().cloned().collect();
            set.0.extend(patch.0);
            maps::save_maps(&game_dir, &set)?;

            tracing::info!(count = changed.len(), "applied map patch");
            Ok(ToolOutput::json(json!({
                "ok": true,
                "type": "maps",
                "message": format!(
                    "Applied {} maps; wrote {} and {}",
                    changed.len(),
                    maps::MAPS_JSON,
                    maps::MAPS_JS
                ),
                "changed": changed,
                "total_maps": set.0.len(),
            })))
        }
    }
}
