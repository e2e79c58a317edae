//! Offline asset commands: thumbnail rendering and sprite migration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde_json::Value;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::sprites::{self, SpriteSheet, SPRITES_JSON};
use crate::thumbnail::{self, ThumbnailRequest};
use crate::tools::thumbnail::sprites_for;
use crate::tools::ToolContext;

fn game_dir(ctx: &ToolContext, game: &Path) -> Result<PathBuf, ExitCode> {
    match ctx.game_path(&game.to_string_lossy()) {
        Ok(dir) if dir.is_dir() => Ok(dir),
        Ok(dir) => {
            eprintln!("Error: Game directory not found: {}", dir.display());
            Err(ExitCode::from(EXIT_INVALID_ARGS))
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Err(ExitCode::from(EXIT_INVALID_ARGS))
        }
    }
}

/// Parse a layers file: a full request object or a bare layers array.
fn parse_request(text: &str) -> Result<ThumbnailRequest, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(_) => Ok(ThumbnailRequest { layers: serde_json::from_value(value)?, ..Default::default() }),
        other => serde_json::from_value(other),
    }
}

/// Execute the thumbnail command
pub fn run_thumbnail(
    ctx: &ToolContext,
    game: &Path,
    layers: &Path,
    output: Option<&Path>,
) -> ExitCode {
    let dir = match game_dir(ctx, game) {
        Ok(dir) => dir,
        Err(code) => return code,
    };
    let request = match fs::read_to_string(layers).map_err(|e| e.to_string()).and_then(|text| {
        parse_request(&text).map_err(|e| e.to_string())
    }) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: Cannot read layers '{}': {}", layers.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mut warnings = Vec::new();
    let sprites = sprites_for(ctx, &dir, &request, &mut warnings);
    let rendered = match thumbnail::render_thumbnail(
        &request,
        sprites.as_deref(),
        ctx.config.limits.max_thumbnail_size,
    ) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    for warning in warnings.iter().chain(&rendered.warnings) {
        eprintln!("Warning: {}", warning);
    }

    let saved = match output {
        Some(path) => thumbnail::encode_png(&rendered.image)
            .and_then(|png| fs::write(path, png).map_err(Into::into))
            .map(|_| path.to_path_buf()),
        None => thumbnail::save_thumbnail(&dir, &request, &rendered.image).map(|(path, _)| path),
    };
    match saved {
        Ok(path) => {
            println!("Saved: {}", path.display());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Execute the migrate-sprites command
pub fn run_migrate_sprites(ctx: &ToolContext, game: &Path, dry_run: bool) -> ExitCode {
    let dir = match game_dir(ctx, game) {
        Ok(dir) => dir,
        Err(code) => return code,
    };
    let path = dir.join(SPRITES_JSON);
    let mut data: Value = match fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: Cannot read {}: {}", path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let changed = sprites::migrate_legacy(&mut data);
    let sheet: SpriteSheet = match serde_json::from_value(data) {
        Ok(sheet) => sheet,
        Err(e) => {
            eprintln!("Error: {} still does not match the frames schema: {}", SPRITES_JSON, e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if let Err(e) = sheet.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    if changed == 0 {
        println!("No legacy sprites found ({} sprites)", sheet.count());
        return ExitCode::from(EXIT_SUCCESS);
    }
    if dry_run {
        println!("Would migrate {} sprites", changed);
        return ExitCode::from(EXIT_SUCCESS);
    }
    if let Err(e) = sprites::save_sheet(&dir, &sheet) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }
    ctx.sprites.invalidate(&dir);
    tracing::info!(changed, path = %path.display(), "migrated legacy sprites");
    println!("Migrated {} sprites", changed);
    ExitCode::from(EXIT_SUCCESS)
}
