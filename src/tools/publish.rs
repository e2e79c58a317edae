//! Publishing and version history.

use std::fmt;
use std::path::Path;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::workflow::PathInput;
use super::{check_slug, ToolContext, ToolError, ToolOutput, ToolResult};
use crate::game::{self, GameError, GAME_CONFIG, VERSIONS_DIR};
use crate::github::GitHub;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PublishGameInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[serde(default)]
    #[schemars(description = "Game slug (repo name). Defaults to the current game")]
    pub slug: Option<String>,

    #[serde(default)]
    #[schemars(description = "Game title. Defaults to the current game")]
    pub title: Option<String>,

    #[serde(default)]
    #[schemars(description = "Game description, set on the GitHub repository")]
    pub description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn publish_game(ctx: &ToolContext, input: PublishGameInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    // fall back to the game the server runs in, then to the target's own config
    let known = ctx
        .game_context()
        .or_else(|| game::load_game_config(&game_dir).ok())
        .unwrap_or_default();

    let slug = non_empty(input.slug)
        .or_else(|| non_empty(Some(known.slug)))
        .ok_or_else(|| ToolError::invalid("slug is required outside a game directory"))?;
    check_slug(&slug)?;
    let title = non_empty(input.title)
        .or_else(|| non_empty(Some(known.title)))
        .unwrap_or_else(|| slug.clone());

    let gh = ctx.github();
    let platform = &ctx.config.platform;
    let mut results: Vec<String> = Vec::new();
    let _span = tracing::info_span!("publish", %slug, %title).entered();

    if let Err(e) = gh.commit_all(&game_dir, "Publish game") {
        tracing::debug!(error = %e, "publish commit skipped");
    }

    gh.push_main(&game_dir).map_err(|e| stopped(e, &results))?;
    results.push("Pushed to GitHub".to_string());

    if let Some(description) = non_empty(input.description) {
        gh.set_description(&slug, &description).map_err(|e| stopped(e, &results))?;
    }

    if let Err(e) = gh.add_topics(&slug, &[platform.game_topic.as_str()]) {
        tracing::debug!(error = %e, "adding game topic failed");
    }

    match gh.enable_pages(&slug) {
        Ok(_) => results.push("GitHub Pages enabled".to_string()),
        Err(e) => {
            let message = e.to_string();
            if message.contains("already exists") {
                results.push("GitHub Pages already enabled".to_string());
            } else {
                results.push(format!("Pages warning: {}", message));
            }
        }
    }

    match snapshot(&gh, &game_dir) {
        Ok(Some(version)) => results.push(format!("Version v{} snapshot created", version)),
        Ok(None) => {}
        Err(e) => results.push(format!("Version snapshot warning: {}", e)),
    }
    Ok(ToolOutput::json(json!({
        "ok": true,
        "results": results,
        "repo": platform.repo_url(&slug),
        "game_url": platform.game_url(&slug),
        "platform_url": platform.platform_url(&slug),
    })))
}

fn stopped(error: impl fmt::Display, results: &[String]) -> ToolError {
    ToolError::Partial { message: error.to_string(), results: results.to_vec() }
}

/// Record the next version, copy its files and commit the snapshot.
///
/// `None` when the directory has no game config to version.
fn snapshot(gh: &GitHub<'_>, game_dir: &Path) -> Result<Option<u32>, ToolError> {
    let mut config = match game::load_game_config(game_dir) {
        Ok(config) => config,
        Err(GameError::Missing(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let version = config.record_publish(chrono::Local::now().date_naive());
    game::snapshot_version(game_dir, version)?;
    game::save_game_config(game_dir, &config)?;

    let versions = format!("{}/", VERSIONS_DIR);
    gh.commit_paths(game_dir, &[versions.as_str(), GAME_CONFIG], &format!("Version v{}", version))?;
    gh.push(game_dir)?;
    tracing::info!(version, "version snapshot committed");
    Ok(Some(version))
}

pub fn get_versions(ctx: &ToolContext, input: PathInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    let config = game::load_game_config(&game_dir).map_err(|e| match e {
        GameError::Missing(_) => ToolError::invalid("No .forkarcade.json found"),
        GameError::Parse { .. } => ToolError::invalid("Cannot parse .forkarcade.json"),
        other => other.into(),
    })?;
    Ok(ToolOutput::json(json!({
        "slug": config.slug,
        "title": config.title,
        "template": config.template,
        "currentVersion": config.current_version,
        "versions": config.versions,
    })))
}
