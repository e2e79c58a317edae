//! Sprite definitions, `_sprites.json` persistence and generated scripts.
//!
//! A game's sprites live in `_sprites.json` as
//! `{category: {name: {w, h, palette, frames, origin}}}`. Every write also
//! regenerates `sprites.js`, the browser-side loader games include from
//! `index.html`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{Clock, TtlCache};
use crate::color::is_palette_hex;

pub const SPRITES_JSON: &str = "_sprites.json";
pub const SPRITES_JS: &str = "sprites.js";
pub const PREVIEW_HTML: &str = "_preview.html";

/// Categories accepted when a template does not declare its own.
pub const VALID_CATEGORIES: [&str; 8] =
    ["tiles", "enemies", "items", "player", "effects", "terrain", "units", "ui"];

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("pixels must be a non-empty array of strings")]
    EmptyPixels,
    #[error("Row {row} has {len} chars, expected {expected}")]
    RowLength { row: usize, len: usize, expected: usize },
    #[error("Character '{ch}' in row {row} not found in palette")]
    UnknownChar { ch: char, row: usize },
    #[error("Invalid color '{value}' for palette key '{key}'")]
    InvalidColor { key: String, value: String },
    #[error("Palette key '{0}' must be a single character")]
    PaletteKey(String),
    #[error("Frame is {got_w}x{got_h} but the sprite is {w}x{h}")]
    SizeMismatch { w: usize, h: usize, got_w: usize, got_h: usize },
    #[error("Frame index {index} out of range, sprite '{name}' has {count} frames")]
    FrameOutOfRange { name: String, index: usize, count: usize },
    #[error("Sprite {category}/{name}: {message}")]
    Invalid { category: String, name: String, message: String },
    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One sprite: a palette and one or more equally sized frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDef {
    pub w: usize,
    pub h: usize,
    pub palette: BTreeMap<String, String>,
    pub frames: Vec<Vec<String>>,
    #[serde(default)]
    pub origin: [i32; 2],
}

impl SpriteDef {
    /// Check dimensions, palette colors and frame characters.
    pub fn validate(&self) -> Result<(), SpriteError> {
        validate_palette(&self.palette)?;
        for frame in &self.frames {
            let (w, h) = validate_frame(&self.palette, frame)?;
            if (w, h) != (self.w, self.h) {
                return Err(SpriteError::SizeMismatch { w: self.w, h: self.h, got_w: w, got_h: h });
            }
        }
        Ok(())
    }
}

/// All sprites of a game, by category then name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteSheet(pub BTreeMap<String, BTreeMap<String, SpriteDef>>);

impl SpriteSheet {
    pub fn get(&self, category: &str, name: &str) -> Option<&SpriteDef> {
        self.0.get(category).and_then(|c| c.get(name))
    }

    /// Total number of sprites across categories.
    pub fn count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn names(&self, category: &str) -> Vec<String> {
        self.0.get(category).map(|c| c.keys().cloned().collect()).unwrap_or_default()
    }

    /// Validate every sprite, naming the first bad one.
    pub fn validate(&self) -> Result<(), SpriteError> {
        for (category, sprites) in &self.0 {
            for (name, sprite) in sprites {
                sprite.validate().map_err(|e| SpriteError::Invalid {
                    category: category.clone(),
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Insert or replace one frame of a sprite.
    ///
    /// `frame: None` appends. An index equal to the frame count also appends;
    /// larger indices are rejected. The new palette is merged over the
    /// existing one. Frames of an existing sprite must keep its size.
    pub fn upsert_frame(
        &mut self,
        category: &str,
        name: &str,
        palette: BTreeMap<String, String>,
        pixels: Vec<String>,
        frame: Option<usize>,
        origin: Option<[i32; 2]>,
    ) -> Result<UpsertOutcome, SpriteError> {
        validate_palette(&palette)?;

        let sprites = self.0.entry(category.to_string()).or_default();
        let (w, h, index) = match sprites.get_mut(name) {
            Some(sprite) => {
                let mut merged = sprite.palette.clone();
                merged.extend(palette);
                let (w, h) = validate_frame(&merged, &pixels)?;
                if (w, h) != (sprite.w, sprite.h) {
                    return Err(SpriteError::SizeMismatch { w: sprite.w, h: sprite.h, got_w: w, got_h: h });
                }
                let count = sprite.frames.len();
                let index = frame.unwrap_or(count);
                if index > count {
                    return Err(SpriteError::FrameOutOfRange { name: name.to_string(), index, count });
                }
                sprite.palette = merged;
                if index == count {
                    sprite.frames.push(pixels);
                } else {
                    sprite.frames[index] = pixels;
                }
                if let Some(origin) = origin {
                    sprite.origin = origin;
                }
                (w, h, index)
            }
            None => {
                let (w, h) = validate_frame(&palette, &pixels)?;
                let index = frame.unwrap_or(0);
                if index > 0 {
                    return Err(SpriteError::FrameOutOfRange { name: name.to_string(), index, count: 0 });
                }
                sprites.insert(
                    name.to_string(),
                    SpriteDef { w, h, palette, frames: vec![pixels], origin: origin.unwrap_or([0, 0]) },
                );
                (w, h, 0)
            }
        };

        let frame_count = sprites.get(name).map(|s| s.frames.len()).unwrap_or(0);
        Ok(UpsertOutcome { w, h, frame: index, frame_count })
    }
}

/// Result of [`SpriteSheet::upsert_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub w: usize,
    pub h: usize,
    pub frame: usize,
    pub frame_count: usize,
}

fn validate_palette(palette: &BTreeMap<String, String>) -> Result<(), SpriteError> {
    for (key, value) in palette {
        if key.chars().count() != 1 {
            return Err(SpriteError::PaletteKey(key.clone()));
        }
        if !is_palette_hex(value) {
            return Err(SpriteError::InvalidColor { key: key.clone(), value: value.clone() });
        }
    }
    Ok(())
}

/// Validate one frame against a palette and return its (w, h).
pub fn validate_frame(
    palette: &BTreeMap<String, String>,
    pixels: &[String],
) -> Result<(usize, usize), SpriteError> {
    let first = pixels.first().ok_or(SpriteError::EmptyPixels)?;
    let w = first.chars().count();
    if w == 0 {
        return Err(SpriteError::EmptyPixels);
    }
    for (row, line) in pixels.iter().enumerate() {
        let len = line.chars().count();
        if len != w {
            return Err(SpriteError::RowLength { row, len, expected: w });
        }
        for ch in line.chars() {
            if ch != '.' && !palette.contains_key(ch.to_string().as_str()) {
                return Err(SpriteError::UnknownChar { ch, row });
            }
        }
    }
    Ok((w, pixels.len()))
}

/// Load `_sprites.json` from a game directory. A missing file is an empty sheet.
pub fn load_sheet(game_dir: &Path) -> Result<SpriteSheet, SpriteError> {
    let path = game_dir.join(SPRITES_JSON);
    if !path.exists() {
        return Ok(SpriteSheet::default());
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text)
        .map_err(|source| SpriteError::Parse { path: path.display().to_string(), source })
}

/// Write `_sprites.json` and regenerate `sprites.js`.
pub fn save_sheet(game_dir: &Path, sheet: &SpriteSheet) -> Result<(), SpriteError> {
    fs::write(game_dir.join(SPRITES_JSON), pretty_json(sheet) + "\n")?;
    fs::write(game_dir.join(SPRITES_JS), generate_sprites_js(sheet))?;
    Ok(())
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Browser loader exposing `SPRITE_DEFS`, `drawSprite`, `getSprite` and `spriteFrames`.
pub fn generate_sprites_js(sheet: &SpriteSheet) -> String {
    let mut out = String::new();
    out.push_str("// sprites.js - ForkArcade pixel art sprites\n");
    out.push_str("// Generated from _sprites.json, do not edit by hand\n\n");
    out.push_str("var SPRITE_DEFS = ");
    out.push_str(&pretty_json(sheet));
    out.push_str("\n\n");
    out.push_str(SPRITES_JS_RUNTIME);
    out
}

const SPRITES_JS_RUNTIME: &str = r#"function drawSprite(ctx, spriteDef, x, y, size, frame) {
  if (!spriteDef) return false
  frame = frame || 0
  frame = frame % spriteDef.frames.length
  var key = size + '_' + frame
  if (!spriteDef._c) spriteDef._c = {}
  if (!spriteDef._c[key]) {
    var cv = document.createElement('canvas')
    cv.width = size
    cv.height = size
    var cc = cv.getContext('2d')
    var pixels = spriteDef.frames[frame]
    var pw = size / spriteDef.w
    var ph = size / spriteDef.h
    for (var row = 0; row < spriteDef.h; row++) {
      var line = pixels[row]
      for (var col = 0; col < spriteDef.w; col++) {
        var ch = line[col]
        if (ch === ".") continue
        var color = spriteDef.palette[ch]
        if (!color) continue
        cc.fillStyle = color
        cc.fillRect(col * pw, row * ph, Math.ceil(pw), Math.ceil(ph))
      }
    }
    spriteDef._c[key] = cv
  }
  var ox = spriteDef.origin[0] * (size / spriteDef.w)
  var oy = spriteDef.origin[1] * (size / spriteDef.h)
  ctx.drawImage(spriteDef._c[key], x - ox, y - oy)
  return true
}

function getSprite(category, name) {
  return SPRITE_DEFS[category] && SPRITE_DEFS[category][name] || null
}

function spriteFrames(spriteDef) {
  return spriteDef ? spriteDef.frames.length : 0
}

window.addEventListener('message', function(event) {
  var data = event.data
  if (data && data.type === 'FA_SPRITES_UPDATE' && data.sprites) {
    SPRITE_DEFS = data.sprites
    for (var cat in SPRITE_DEFS) {
      for (var name in SPRITE_DEFS[cat]) {
        if (SPRITE_DEFS[cat][name]._c) delete SPRITE_DEFS[cat][name]._c
      }
    }
  }
})
"#;

/// Standalone HTML page drawing every frame of every sprite at 4x.
pub fn generate_preview_html(sheet: &SpriteSheet) -> String {
    let data = serde_json::to_string(sheet).unwrap_or_else(|_| "{}".to_string());
    PREVIEW_TEMPLATE.replace("__SPRITE_DATA__", &data)
}

const PREVIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Sprite Preview</title>
<style>
  body { background: #111; color: #ccc; font-family: monospace; padding: 20px; }
  h2 { color: #fd4; margin-top: 24px; }
  .sprite-row { display: flex; gap: 16px; flex-wrap: wrap; margin: 8px 0; }
  .sprite-card { text-align: center; }
  .sprite-card canvas { border: 1px solid #333; display: block; margin: 4px auto; image-rendering: pixelated; }
  .sprite-card span { font-size: 11px; color: #888; }
  .frames-row { display: flex; gap: 4px; justify-content: center; }
</style></head><body>
<h1>ForkArcade Sprite Preview</h1>
<script>
var data = __SPRITE_DATA__;
function drawFrame(ctx, s, frame, x, y, sz) {
  var px = s.frames[frame], pw = sz / s.w, ph = sz / s.h;
  for (var r = 0; r < s.h; r++) {
    var l = px[r];
    for (var c = 0; c < s.w; c++) {
      var ch = l[c];
      if (ch === '.') continue;
      ctx.fillStyle = s.palette[ch];
      ctx.fillRect(x + c * pw, y + r * ph, Math.ceil(pw), Math.ceil(ph));
    }
  }
}
for (var cat in data) {
  var h2 = document.createElement('h2'); h2.textContent = cat; document.body.appendChild(h2);
  var row = document.createElement('div'); row.className = 'sprite-row';
  for (var name in data[cat]) {
    var card = document.createElement('div'); card.className = 'sprite-card';
    var s = data[cat][name], scale = 4;
    var framesRow = document.createElement('div'); framesRow.className = 'frames-row';
    for (var f = 0; f < s.frames.length; f++) {
      var w = s.w * scale, h = s.h * scale;
      var cv = document.createElement('canvas'); cv.width = w; cv.height = h;
      drawFrame(cv.getContext('2d'), s, f, 0, 0, w);
      framesRow.appendChild(cv);
    }
    card.appendChild(framesRow);
    var label = document.createElement('span');
    label.textContent = name + (s.frames.length > 1 ? ' (' + s.frames.length + ' frames)' : '');
    card.appendChild(label); row.appendChild(card);
  }
  document.body.appendChild(row);
}
</script></body></html>
"#;

/// Convert legacy `pixels` entries into the frames schema in place.
///
/// Returns how many sprites were changed. Sprites missing an `origin` get
/// `[0, 0]`.
pub fn migrate_legacy(data: &mut Value) -> usize {
    let mut changed = 0;
    let Some(categories) = data.as_object_mut() else { return 0 };
    for sprites in categories.values_mut() {
        let Some(sprites) = sprites.as_object_mut() else { continue };
        for sprite in sprites.values_mut() {
            let Some(sprite) = sprite.as_object_mut() else { continue };
            let mut touched = false;
            if !sprite.contains_key("frames") {
                if let Some(pixels) = sprite.remove("pixels") {
                    sprite.insert("frames".to_string(), Value::Array(vec![pixels]));
                    touched = true;
                }
            }
            if !sprite.contains_key("origin") {
                sprite.insert("origin".to_string(), serde_json::json!([0, 0]));
                touched = true;
            }
            if touched {
                changed += 1;
            }
        }
    }
    changed
}

/// Path-keyed, time-bounded memo of parsed sprite sheets.
#[derive(Debug)]
pub struct SpriteCache {
    inner: TtlCache<PathBuf, Arc<SpriteSheet>>,
}

impl SpriteCache {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: TtlCache::new(ttl) }
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { inner: TtlCache::with_clock(ttl, clock) }
    }

    /// The sheet for `game_dir`, or `None` when it has no `_sprites.json`.
    pub fn load(&self, game_dir: &Path) -> Result<Option<Arc<SpriteSheet>>, SpriteError> {
        if !game_dir.join(SPRITES_JSON).exists() {
            return Ok(None);
        }
        let key = game_dir.to_path_buf();
        let sheet = self.inner.get_or_try_insert_with(&key, || {
            tracing::debug!(game = %game_dir.display(), "loading sprite sheet");
            load_sheet(game_dir).map(Arc::new)
        })?;
        Ok(Some(sheet))
    }

    /// Drop the cached sheet after a write.
    pub fn invalidate(&self, game_dir: &Path) {
        self.inner.invalidate(&game_dir.to_path_buf());
    }
}
