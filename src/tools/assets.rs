//! Sprite and map authoring tools.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::workflow::{template_or_context, PathInput, TemplateInput};
use super::{ToolContext, ToolError, ToolOutput, ToolResult};
use crate::game;
use crate::maps::{load_maps, save_maps, MapDef};
use crate::sprites::{
    generate_preview_html, load_sheet, save_sheet, PREVIEW_HTML, SPRITES_JS, SPRITES_JSON,
    VALID_CATEGORIES,
};
use crate::templates::render_asset_guide;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSpriteInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[schemars(description = "Category, e.g. tiles, enemies, items, player, effects, terrain, units, ui")]
    pub category: String,

    #[schemars(description = "Sprite name, e.g. \"rat\", \"wallLit\", \"warrior\"")]
    pub name: String,

    #[schemars(description = "Character to hex color map: { \"1\": \"#a86\", \"2\": \"#d9a\" }")]
    pub palette: BTreeMap<String, String>,

    #[schemars(description = "Pixel grid of one frame; each row is a string, \".\" is transparent")]
    pub pixels: Vec<String>,

    #[serde(default)]
    #[schemars(
        description = "Frame index (0-based). Omit to append a new frame; pass an existing index to replace it"
    )]
    pub frame: Option<usize>,

    #[serde(default)]
    #[schemars(
        description = "Anchor point [ox, oy] in pixels. Default [0,0] (top-left); [w/2, h-1] is bottom-center"
    )]
    pub origin: Option<[i32; 2]>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateAssetsInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[serde(default)]
    #[schemars(description = "Template key (optional, detected from the game when omitted)")]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateMapInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[schemars(description = "Map name, e.g. \"level1\"")]
    pub name: String,

    #[schemars(description = "Tile rows of equal length; each character is a tile id digit 0-9")]
    pub grid: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Optional zone rows, one character per cell, same size as grid")]
    pub zones: Option<Vec<String>>,

    #[serde(default)]
    #[schemars(description = "Optional object placements, e.g. {\"type\": \"chest\", \"x\": 3, \"y\": 4}")]
    pub objects: Option<Vec<Value>>,
}

fn existing_game_dir(ctx: &ToolContext, path: &str) -> Result<PathBuf, ToolError> {
    let dir = ctx.game_path(path)?;
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(ToolError::invalid(format!("Game directory not found: {}", dir.display())))
    }
}

/// Template of the target game, else of the game the server runs in.
fn game_template(ctx: &ToolContext, game_dir: &Path) -> Option<String> {
    game::detect_game_context(game_dir)
        .or_else(|| ctx.game_context())
        .map(|config| config.template)
}

pub fn get_asset_guide(ctx: &ToolContext, input: TemplateInput) -> ToolResult {
    let template = template_or_context(ctx, input.template).unwrap_or_default();
    let gh = ctx.github();
    let missing = || ToolError::invalid(format!("No asset guide for template: {}", template));

    let info = ctx.catalog.get(&gh, &template)?.ok_or_else(missing)?;
    let guide = ctx.catalog.assets(&gh, &template)?.ok_or_else(missing)?;
    Ok(ToolOutput::text(render_asset_guide(&info.name, &guide)))
}

pub fn create_sprite(ctx: &ToolContext, input: CreateSpriteInput) -> ToolResult {
    let game_dir = existing_game_dir(ctx, &input.path)?;

    let template = game_template(ctx, &game_dir);
    let allowed = match &template {
        Some(key) => ctx.catalog.categories(&ctx.github(), key),
        None => VALID_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    };
    if !allowed.contains(&input.category) {
        return Err(ToolError::invalid(format!(
            "Invalid category: {}. Valid for {}: {}",
            input.category,
            template.as_deref().unwrap_or("all"),
            allowed.join(", ")
        )));
    }

    let mut sheet = load_sheet(&game_dir)?;
    let preview = input.pixels.join("\n");
    let outcome = sheet.upsert_frame(
        &input.category,
        &input.name,
        input.palette,
        input.pixels,
        input.frame,
        input.origin,
    )?;
    save_sheet(&game_dir, &sheet)?;
    ctx.sprites.invalidate(&game_dir);

    tracing::info!(
        category = %input.category,
        name = %input.name,
        frame = outcome.frame,
        "saved sprite frame"
    );
    Ok(ToolOutput::json(json!({
        "ok": true,
        "message": format!(
            "Sprite '{}' frame {} saved in category '{}' ({}x{})",
            input.name, outcome.frame, input.category, outcome.w, outcome.h
        ),
        "frame": outcome.frame,
        "frames": outcome.frame_count,
        "total_sprites": sheet.count(),
        "preview": preview,
    })))
}

pub fn validate_assets(ctx: &ToolContext, input: ValidateAssetsInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    let template = input
        .template
        .filter(|t| !t.is_empty())
        .or_else(|| game_template(ctx, &game_dir))
        .unwrap_or_default();

    let guide = ctx.catalog.assets(&ctx.github(), &template)?.ok_or_else(|| {
        ToolError::invalid("Cannot detect template type. Pass template parameter explicitly.")
    })?;

    let sheet = load_sheet(&game_dir)?;
    let included_in_html = fs::read_to_string(game_dir.join("index.html"))
        .map(|html| html.contains(SPRITES_JS))
        .unwrap_or(false);

    let mut categories = Map::new();
    let mut total_found = 0;
    let mut total_required = 0;
    let mut complete = true;
    for (category, info) in &guide.categories {
        let found = sheet.names(category);
        let missing: Vec<&String> = info.sprites.iter().filter(|s| !found.contains(s)).collect();
        complete &= missing.is_empty();
        total_found += found.len();
        total_required += info.sprites.len();
        categories.insert(category.to_string(), json!({ "found": found, "missing": missing }));
    }

    Ok(ToolOutput::json(json!({
        "template": template,
        "sprites_file": game_dir.join(SPRITES_JS).exists(),
        "sprites_json": game_dir.join(SPRITES_JSON).exists(),
        "included_in_html": included_in_html,
        "categories": categories,
        "total_found": total_found,
        "total_required": total_required,
        "complete": complete,
    })))
}

pub fn preview_assets(ctx: &ToolContext, input: PathInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    if !game_dir.join(SPRITES_JSON).exists() {
        return Err(ToolError::invalid(
            "No _sprites.json found. Create sprites first with create_sprite tool.",
        ));
    }
    let sheet = load_sheet(&game_dir)?;
    let count = sheet.count();
    if count == 0 {
        return Err(ToolError::invalid("No sprites defined yet. Use create_sprite to add sprites."));
    }

    let path = game_dir.join(PREVIEW_HTML);
    fs::write(&path, generate_preview_html(&sheet))?;
    Ok(ToolOutput::json(json!({
        "ok": true,
        "message": format!("Preview generated with {} sprites", count),
        "path": path.display().to_string(),
        "open": format!("open {}", path.display()),
    })))
}

pub fn create_map(ctx: &ToolContext, input: CreateMapInput) -> ToolResult {
    let game_dir = existing_game_dir(ctx, &input.path)?;
    let mut maps = load_maps(&game_dir)?;

    let map = MapDef {
        grid: input.grid,
        zones: input.zones,
        objects: input.objects.unwrap_or_default(),
        extra: Map::new(),
    };
    let (w, h) = (map.width(), map.height());
    maps.upsert(&input.name, map)?;
    save_maps(&game_dir, &maps)?;

    tracing::info!(name = %input.name, w, h, "saved map");
    Ok(ToolOutput::json(json!({
        "ok": true,
        "message": format!("Map '{}' saved ({}x{})", input.name, w, h),
        "total_maps": maps.0.len(),
    })))
}
