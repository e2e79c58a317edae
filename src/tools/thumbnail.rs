//! The `create_thumbnail` tool.

use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{ToolContext, ToolError, ToolOutput, ToolResult};
use crate::sprites::SpriteSheet;
use crate::thumbnail::{
    render_thumbnail, save_thumbnail, LayerSpec, ThumbnailRequest, DEFAULT_HEIGHT, DEFAULT_WIDTH,
    THUMBNAIL_JSON, THUMBNAIL_PNG,
};

pub const DESCRIPTION: &str = r##"Render the game thumbnail (_thumbnail.png, default 72x32) from stacked layers and commit it.

Each layer draws on its own transparent canvas at "res" [w, h] (default: output size), is resampled
to the output size with "aa" (nearest, bilinear, bicubic, lanczos), faded by "opacity" and composited
over the layers below. The result is flattened on black. Use low-res layers with nearest for chunky
pixel art, high-res layers with lanczos for smooth detail.

Operations (one key per object, coordinates in layer pixels):
- {"fill": "#123"}
- {"rect": {"x", "y", "w", "h", "color"}}
- {"gradient": {"from", "to", "direction": "vertical"|"horizontal", "x", "y", "w", "h"}}
- {"circle": {"cx", "cy", "r", "color", "outline", "width"}}
- {"polygon": {"points": [[x, y], ...], "color", "outline", "width"}}
- {"triangle": {"points": [[x, y], [x, y], [x, y]], "color"}}
- {"line": {"x1", "y1", "x2", "y2", "color", "width"}}
- {"scatter": {"color", "count", "seed", "x", "y", "w", "h"}}
- {"dither": {"color", "density", "seed", "x", "y", "w", "h"}}
- {"pixels": {"palette": {"1": "#f00"}, "rows": [".1."], "x", "y"}}
- {"sprite": {"category", "name", "x", "y", "scale", "frame"}} uses the game's _sprites.json
- {"pixel_text": {"text", "x", "y", "color", "shadow", "scale"}}
- {"hex_grid": {"cols", "rows", "hex_size", "x", "y", "terrain", "colors", "outline", "default_color"}}

Colors are #rgb, #rrggbb or #rrggbbaa. Same seed gives the same image.
Explicit w/h must be at least 1. Shapes must stay within two layer sizes of the origin, stroke
widths are at most 16 and scatter draws at most 4 points per layer pixel."##;

fn default_commit() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateThumbnailInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,

    #[serde(default)]
    #[schemars(description = "Output width in pixels (default 72)")]
    pub w: Option<u32>,

    #[serde(default)]
    #[schemars(description = "Output height in pixels (default 32)")]
    pub h: Option<u32>,

    #[schemars(description = "Layers, bottom first")]
    pub layers: Vec<LayerSpec>,

    #[serde(default = "default_commit")]
    #[schemars(description = "Commit and push the thumbnail (default true)")]
    pub commit: bool,
}

/// The game's sprite sheet, loaded only when a layer draws sprites.
///
/// An unreadable `_sprites.json` becomes a warning; the sprite ops then report
/// their sprites as missing.
pub fn sprites_for(
    ctx: &ToolContext,
    game_dir: &Path,
    request: &ThumbnailRequest,
    warnings: &mut Vec<String>,
) -> Option<Arc<SpriteSheet>> {
    if !request.uses_sprites() {
        return None;
    }
    match ctx.sprites.load(game_dir) {
        Ok(sheet) => sheet,
        Err(e) => {
            tracing::warn!(error = %e, "sprite sheet unavailable");
            warnings.push(format!("Sprites unavailable: {}", e));
            None
        }
    }
}

pub fn create_thumbnail(ctx: &ToolContext, input: CreateThumbnailInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    if !game_dir.is_dir() {
        return Err(ToolError::invalid(format!(
            "Game directory not found: {}",
            game_dir.display()
        )));
    }

    let request = ThumbnailRequest {
        w: input.w.unwrap_or(DEFAULT_WIDTH),
        h: input.h.unwrap_or(DEFAULT_HEIGHT),
        layers: input.layers,
    };
    let mut warnings = Vec::new();
    let sprites = sprites_for(ctx, &game_dir, &request, &mut warnings);
    let rendered =
        render_thumbnail(&request, sprites.as_deref(), ctx.config.limits.max_thumbnail_size)?;
    warnings.extend(rendered.warnings);
    let (path, png) = save_thumbnail(&game_dir, &request, &rendered.image)?;
    tracing::info!(
        path = %path.display(),
        w = request.w,
        h = request.h,
        layers = request.layers.len(),
        "saved thumbnail"
    );

    let mut results = vec![format!("Saved {}", THUMBNAIL_PNG)];
    if input.commit {
        let gh = ctx.github();
        let committed = gh
            .commit_paths(&game_dir, &[THUMBNAIL_PNG, THUMBNAIL_JSON], "Update thumbnail")
            .and_then(|_| gh.push(&game_dir));
        match committed {
            Ok(_) => results.push("Committed and pushed".to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "thumbnail commit failed");
                results.push(format!("Commit warning: {}", e));
            }
        }
    }

    Ok(ToolOutput::json(json!({
        "ok": true,
        "path": path.display().to_string(),
        "size": [request.w, request.h],
        "layers": request.layers.len(),
        "warnings": warnings,
        "results": results,
    }))
    .with_image(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults() {
        let input: CreateThumbnailInput =
            serde_json::from_value(json!({"path": "g", "layers": [{"ops": []}]})).unwrap();
        assert!(input.commit);
        assert_eq!((input.w, input.h), (None, None));
        assert_eq!(input.layers[0].opacity, 1.0);
    }

    #[test]
    fn test_description_lists_every_operation() {
        for key in crate::thumbnail::Operation::KEYS {
            assert!(DESCRIPTION.contains(&format!("{{\"{}\"", key)), "{}", key);
        }
    }
}
