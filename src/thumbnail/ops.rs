//! Thumbnail drawing operations.
//!
//! An operation is a JSON object keyed by its name, e.g.
//! `{"rect": {"x": 0, "y": 0, "w": 8, "h": 4, "color": "#222"}}`. The first
//! recognised key in [`Operation::KEYS`] order selects the handler; objects
//! with no recognised key become [`Operation::Unknown`] and only produce a
//! warning.

use std::collections::{HashMap, HashSet};

use image::Rgba;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::blend::Canvas;
use super::font::{self, ADVANCE};
use super::hex::HexLayout;
use crate::color::{parse_color, ColorError};
use crate::shapes::{
    rasterize_circle, rasterize_polygon, rasterize_polygon_outline, rasterize_ring,
    rasterize_thick_line,
};
use crate::sprites::SpriteSheet;

/// Failure of a single operation. Fails the whole thumbnail.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    Payload(String),
    #[error(transparent)]
    Color(#[from] ColorError),
}

/// Shared state handed to every handler of one layer.
pub struct DrawContext<'a> {
    /// The game's sprite table, when it has one
    pub sprites: Option<&'a SpriteSheet>,
    pub warnings: &'a mut Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RectOp {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradientOp {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub direction: GradientDirection,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CircleOp {
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
    pub color: Option<String>,
    pub outline: Option<String>,
    #[serde(default = "default_one")]
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolygonOp {
    pub points: Vec<[f64; 2]>,
    pub color: Option<String>,
    pub outline: Option<String>,
    #[serde(default = "default_one")]
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriangleOp {
    pub points: [[f64; 2]; 3],
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineOp {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: String,
    #[serde(default = "default_one")]
    pub width: u32,
}

/// Seeded random points in a region.
///
/// `count` is capped at [`SCATTER_PER_PIXEL`] points per canvas pixel; a
/// capped op draws the same leading points as the uncapped one would.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScatterOp {
    pub color: String,
    pub count: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
}

/// Seeded per-pixel noise in a region.
///
/// One sample is drawn per pixel of the region that lies on the canvas, in
/// row-major order. A region hanging off the canvas therefore uses a
/// different random sequence than the same region placed fully inside it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DitherOp {
    pub color: String,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PixelsOp {
    pub palette: HashMap<String, String>,
    pub rows: Vec<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpriteOp {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_one")]
    pub scale: u32,
    #[serde(default)]
    pub frame: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PixelTextOp {
    pub text: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_text_color")]
    pub color: String,
    pub shadow: Option<String>,
    #[serde(default = "default_one")]
    pub scale: u32,
}

/// Pointy-top hex tessellation. At most one cell per canvas pixel; the
/// outline is no wider than `hex_size`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HexGridOp {
    pub cols: u32,
    pub rows: u32,
    #[serde(default = "default_hex_size")]
    pub hex_size: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub terrain: Vec<Vec<String>>,
    #[serde(default)]
    pub colors: HashMap<String, String>,
    pub outline: Option<String>,
    #[serde(default = "default_one")]
    pub outline_width: u32,
    #[serde(default = "default_hex_color")]
    pub default_color: String,
}

/// Upper bound on scatter points per canvas pixel.
pub const SCATTER_PER_PIXEL: u64 = 4;

/// Rasterized shapes must stay within this many canvas sides of the origin.
/// Shapes are rasterized whole before clipping, so their size bounds the work.
const REACH: f64 = 2.0;

/// Widest accepted stroke (`width`, `outline_width`).
pub const MAX_STROKE: u32 = 16;

fn default_one() -> u32 {
    1
}

fn default_seed() -> u64 {
    42
}

fn default_density() -> f64 {
    0.5
}

fn default_text_color() -> String {
    "#fff".to_string()
}

fn default_hex_size() -> f64 {
    4.0
}

fn default_hex_color() -> String {
    "#333".to_string()
}

/// A parsed drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Fill(String),
    Rect(RectOp),
    Gradient(GradientOp),
    Circle(CircleOp),
    Polygon(PolygonOp),
    Triangle(TriangleOp),
    Line(LineOp),
    Scatter(ScatterOp),
    Dither(DitherOp),
    Pixels(PixelsOp),
    Sprite(SpriteOp),
    PixelText(PixelTextOp),
    HexGrid(HexGridOp),
    /// No recognised key; holds the keys that were present
    Unknown(Vec<String>),
}

impl Operation {
    /// Recognised operation names in precedence order.
    pub const KEYS: [&'static str; 13] = [
        "fill",
        "rect",
        "gradient",
        "circle",
        "polygon",
        "triangle",
        "line",
        "scatter",
        "dither",
        "pixels",
        "sprite",
        "pixel_text",
        "hex_grid",
    ];

    /// Parse an operation object.
    pub fn from_value(value: &Value) -> Result<Operation, OpError> {
        let obj = value
            .as_object()
            .ok_or_else(|| OpError::Payload("operation must be a JSON object".to_string()))?;

        let Some((key, payload)) =
            Self::KEYS.iter().find_map(|k| obj.get(*k).map(|payload| (*k, payload)))
        else {
            return Ok(Operation::Unknown(obj.keys().cloned().collect()));
        };

        let op = match key {
            "fill" => Operation::Fill(payload_as(key, payload)?),
            "rect" => Operation::Rect(payload_as(key, payload)?),
            "gradient" => Operation::Gradient(payload_as(key, payload)?),
            "circle" => Operation::Circle(payload_as(key, payload)?),
            "polygon" => Operation::Polygon(payload_as(key, payload)?),
            "triangle" => Operation::Triangle(payload_as(key, payload)?),
            "line" => Operation::Line(payload_as(key, payload)?),
            "scatter" => Operation::Scatter(payload_as(key, payload)?),
            "dither" => Operation::Dither(payload_as(key, payload)?),
            "pixels" => Operation::Pixels(payload_as(key, payload)?),
            "sprite" => Operation::Sprite(payload_as(key, payload)?),
            "pixel_text" => Operation::PixelText(payload_as(key, payload)?),
            _ => Operation::HexGrid(payload_as(key, payload)?),
        };
        Ok(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Fill(_) => "fill",
            Operation::Rect(_) => "rect",
            Operation::Gradient(_) => "gradient",
            Operation::Circle(_) => "circle",
            Operation::Polygon(_) => "polygon",
            Operation::Triangle(_) => "triangle",
            Operation::Line(_) => "line",
            Operation::Scatter(_) => "scatter",
            Operation::Dither(_) => "dither",
            Operation::Pixels(_) => "pixels",
            Operation::Sprite(_) => "sprite",
            Operation::PixelText(_) => "pixel_text",
            Operation::HexGrid(_) => "hex_grid",
            Operation::Unknown(_) => "unknown",
        }
    }

    /// Draw this operation onto `canvas`.
    pub fn apply(&self, canvas: &mut Canvas, ctx: &mut DrawContext<'_>) -> Result<(), OpError> {
        match self {
            Operation::Fill(color) => {
                let color = parse_color(color)?;
                canvas.fill_rect(0, 0, canvas.width().into(), canvas.height().into(), color);
            }
            Operation::Rect(op) => draw_rect(canvas, op)?,
            Operation::Gradient(op) => draw_gradient(canvas, op)?,
            Operation::Circle(op) => draw_circle(canvas, op)?,
            Operation::Polygon(op) => draw_polygon(canvas, op)?,
            Operation::Triangle(op) => {
                let color = parse_color(&op.color)?;
                check_reach(canvas, "triangle", op.points.iter().flatten().copied())?;
                let points: Vec<(i32, i32)> = op.points.iter().map(|p| point(*p)).collect();
                canvas.paint(rasterize_polygon(&points), color);
            }
            Operation::Line(op) => {
                let color = parse_color(&op.color)?;
                check_stroke("line", op.width)?;
                check_reach(canvas, "line", [op.x1, op.y1, op.x2, op.y2])?;
                let p0 = point([op.x1, op.y1]);
                let p1 = point([op.x2, op.y2]);
                canvas.paint(rasterize_thick_line(p0, p1, op.width), color);
            }
            Operation::Scatter(op) => draw_scatter(canvas, op)?,
            Operation::Dither(op) => draw_dither(canvas, op)?,
            Operation::Pixels(op) => draw_pixels(canvas, op)?,
            Operation::Sprite(op) => draw_sprite(canvas, op, ctx)?,
            Operation::PixelText(op) => draw_text(canvas, op)?,
            Operation::HexGrid(op) => draw_hex_grid(canvas, op, ctx)?,
            Operation::Unknown(keys) => {
                let keys = if keys.is_empty() { "(none)".to_string() } else { keys.join(", ") };
                tracing::debug!(%keys, "unknown thumbnail operation");
                ctx.warnings.push(format!("Unknown operation: {}", keys));
            }
        }
        Ok(())
    }
}

fn payload_as<T: DeserializeOwned>(key: &str, payload: &Value) -> Result<T, OpError> {
    T::deserialize(payload).map_err(|e| OpError::Payload(format!("invalid {} payload: {}", key, e)))
}

/// Round to a pixel coordinate, saturating at the `i64` range.
fn px(v: f64) -> i64 {
    v.round() as i64
}

/// Vertex for the shape rasterizers. Callers check the range with [`check_reach`].
fn point(p: [f64; 2]) -> (i32, i32) {
    (p[0].round() as i32, p[1].round() as i32)
}

fn check_reach(
    canvas: &Canvas,
    op: &str,
    values: impl IntoIterator<Item = f64>,
) -> Result<(), OpError> {
    let limit = REACH * f64::from(canvas.width().max(canvas.height()));
    match values.into_iter().find(|v| !v.is_finite() || v.abs() > limit) {
        Some(v) => Err(OpError::Payload(format!(
            "{} geometry out of range: {} (limit {} for this layer)",
            op, v, limit
        ))),
        None => Ok(()),
    }
}

fn check_stroke(op: &str, width: u32) -> Result<(), OpError> {
    if width > MAX_STROKE {
        return Err(OpError::Payload(format!(
            "{} width must be at most {}, got {}",
            op, MAX_STROKE, width
        )));
    }
    Ok(())
}

/// Region `(x, y, w, h)` with width/height defaulting to the canvas size.
/// Explicit sizes must be at least one pixel.
fn region(
    canvas: &Canvas,
    x: f64,
    y: f64,
    w: Option<f64>,
    h: Option<f64>,
) -> Result<(i64, i64, i64, i64), OpError> {
    let size = |name: &str, value: Option<f64>, default: u32| match value.map(px) {
        None => Ok(i64::from(default)),
        Some(n) if n >= 1 => Ok(n),
        Some(n) => Err(OpError::Payload(format!("{} must be at least 1, got {}", name, n))),
    };
    Ok((px(x), px(y), size("w", w, canvas.width())?, size("h", h, canvas.height())?))
}

/// The part of `start..start + len` inside `0..limit`; empty when disjoint.
fn clip_span(start: i64, len: i64, limit: u32) -> std::ops::Range<i64> {
    start.max(0)..start.saturating_add(len).min(i64::from(limit))
}

fn draw_rect(canvas: &mut Canvas, op: &RectOp) -> Result<(), OpError> {
    let color = parse_color(&op.color)?;
    let (x, y, w, h) = region(canvas, op.x, op.y, op.w, op.h)?;
    canvas.fill_rect(x, y, w, h, color);
    Ok(())
}

/// Per-channel interpolation, alpha included.
pub fn lerp_color(a: Rgba<u8>, b: Rgba<u8>, t: f64) -> Rgba<u8> {
    let mix = |i: usize| {
        let (a, b) = (a[i] as f64, b[i] as f64);
        (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
    };
    Rgba([mix(0), mix(1), mix(2), mix(3)])
}

fn draw_gradient(canvas: &mut Canvas, op: &GradientOp) -> Result<(), OpError> {
    let from = parse_color(&op.from)?;
    let to = parse_color(&op.to)?;
    let (x, y, w, h) = region(canvas, op.x, op.y, op.w, op.h)?;

    let (start, steps, limit) = match op.direction {
        GradientDirection::Vertical => (y, h, canvas.height()),
        GradientDirection::Horizontal => (x, w, canvas.width()),
    };
    let denom = (steps - 1).max(1) as f64;
    // bands on the canvas only; colours still span the whole region
    for pos in clip_span(start, steps, limit) {
        let color = lerp_color(from, to, (pos as f64 - start as f64) / denom);
        match op.direction {
            GradientDirection::Vertical => canvas.fill_rect(x, pos, w, 1, color),
            GradientDirection::Horizontal => canvas.fill_rect(pos, y, 1, h, color),
        }
    }
    Ok(())
}

fn draw_circle(canvas: &mut Canvas, op: &CircleOp) -> Result<(), OpError> {
    if op.color.is_none() && op.outline.is_none() {
        return Err(OpError::Payload("circle needs a color, an outline or both".to_string()));
    }
    check_stroke("circle", op.width)?;
    check_reach(canvas, "circle", [op.cx, op.cy, op.r])?;
    let (cx, cy, r) = (op.cx.round() as i32, op.cy.round() as i32, op.r.round() as i32);
    if let Some(color) = &op.color {
        canvas.paint(rasterize_circle(cx, cy, r), parse_color(color)?);
    }
    if let Some(outline) = &op.outline {
        canvas.paint(rasterize_ring(cx, cy, r, op.width), parse_color(outline)?);
    }
    Ok(())
}

fn draw_polygon(canvas: &mut Canvas, op: &PolygonOp) -> Result<(), OpError> {
    if op.points.len() < 3 {
        return Err(OpError::Payload(format!(
            "polygon needs at least 3 points, got {}",
            op.points.len()
        )));
    }
    if op.color.is_none() && op.outline.is_none() {
        return Err(OpError::Payload("polygon needs a color, an outline or both".to_string()));
    }
    check_stroke("polygon", op.width)?;
    check_reach(canvas, "polygon", op.points.iter().flatten().copied())?;
    let points: Vec<(i32, i32)> = op.points.iter().map(|p| point(*p)).collect();
    if let Some(color) = &op.color {
        canvas.paint(rasterize_polygon(&points), parse_color(color)?);
    }
    if let Some(outline) = &op.outline {
        canvas.paint(rasterize_polygon_outline(&points, op.width), parse_color(outline)?);
    }
    Ok(())
}

fn draw_scatter(canvas: &mut Canvas, op: &ScatterOp) -> Result<(), OpError> {
    let color = parse_color(&op.color)?;
    let (x, y, w, h) = region(canvas, op.x, op.y, op.w, op.h)?;
    let pixels = u64::from(canvas.width()) * u64::from(canvas.height());
    let count = u64::from(op.count).min(pixels * SCATTER_PER_PIXEL);
    let mut rng = StdRng::seed_from_u64(op.seed);
    for _ in 0..count {
        let px = x.saturating_add(rng.gen_range(0..w));
        let py = y.saturating_add(rng.gen_range(0..h));
        canvas.put(px, py, color);
    }
    Ok(())
}

fn draw_dither(canvas: &mut Canvas, op: &DitherOp) -> Result<(), OpError> {
    let color = parse_color(&op.color)?;
    let (x, y, w, h) = region(canvas, op.x, op.y, op.w, op.h)?;
    let mut rng = StdRng::seed_from_u64(op.seed);
    let columns = clip_span(x, w, canvas.width());
    for py in clip_span(y, h, canvas.height()) {
        for px in columns.clone() {
            let sample: f64 = rng.gen();
            if sample < op.density {
                canvas.put(px, py, color);
            }
        }
    }
    Ok(())
}

/// Parse a char -> hex palette. Keys must be single characters.
fn char_palette(
    palette: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
) -> Result<HashMap<char, Rgba<u8>>, OpError> {
    let mut out = HashMap::new();
    for (key, value) in palette {
        let mut chars = key.as_ref().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                out.insert(c, parse_color(value.as_ref())?);
            }
            _ => {
                return Err(OpError::Payload(format!(
                    "palette key '{}' must be a single character",
                    key.as_ref()
                )))
            }
        }
    }
    Ok(out)
}

fn draw_pixels(canvas: &mut Canvas, op: &PixelsOp) -> Result<(), OpError> {
    let palette = char_palette(&op.palette)?;
    let width = op.rows.first().map(|r| r.chars().count()).unwrap_or(0);
    if let Some((i, row)) = op.rows.iter().enumerate().find(|(_, r)| r.chars().count() != width) {
        return Err(OpError::Payload(format!(
            "row {} has {} chars, expected {}",
            i,
            row.chars().count(),
            width
        )));
    }

    let (ox, oy) = (px(op.x), px(op.y));
    for (ry, row) in op.rows.iter().enumerate() {
        for (rx, ch) in row.chars().enumerate() {
            if ch == '.' {
                continue;
            }
            if let Some(color) = palette.get(&ch) {
                canvas.put(ox.saturating_add(rx as i64), oy.saturating_add(ry as i64), *color);
            }
        }
    }
    Ok(())
}

fn draw_sprite(canvas: &mut Canvas, op: &SpriteOp, ctx: &mut DrawContext<'_>) -> Result<(), OpError> {
    let Some(sprite) = ctx.sprites.and_then(|s| s.get(&op.category, &op.name)) else {
        ctx.warnings.push(format!("Sprite not found: {}/{}", op.category, op.name));
        return Ok(());
    };
    if sprite.frames.is_empty() {
        ctx.warnings.push(format!("Sprite has no frames: {}/{}", op.category, op.name));
        return Ok(());
    }

    let palette = match char_palette(&sprite.palette) {
        Ok(palette) => palette,
        Err(e) => {
            ctx.warnings.push(format!("Sprite {}/{} skipped: {}", op.category, op.name, e));
            return Ok(());
        }
    };

    let frame = &sprite.frames[op.frame % sprite.frames.len()];
    // blocks of different source pixels never overlap, so clipping keeps
    // the cost within the canvas area plus the sprite size
    let scale = i64::from(op.scale.max(1));
    let left = px(op.x).saturating_sub(i64::from(sprite.origin[0]).saturating_mul(scale));
    let top = px(op.y).saturating_sub(i64::from(sprite.origin[1]).saturating_mul(scale));

    for (ry, row) in frame.iter().enumerate() {
        for (rx, ch) in row.chars().enumerate() {
            let Some(color) = palette.get(&ch) else { continue };
            let dx = left.saturating_add((rx as i64).saturating_mul(scale));
            let dy = top.saturating_add((ry as i64).saturating_mul(scale));
            if scale == 1 {
                canvas.put(dx, dy, *color);
            } else {
                canvas.fill_rect(dx, dy, scale, scale, *color);
            }
        }
    }
    Ok(())
}

fn draw_text(canvas: &mut Canvas, op: &PixelTextOp) -> Result<(), OpError> {
    let color = parse_color(&op.color)?;
    let shadow = op.shadow.as_deref().map(parse_color).transpose()?;
    let scale = i64::from(op.scale.max(1));
    let advance = i64::from(ADVANCE).saturating_mul(scale);
    let text = op.text.to_uppercase();

    let pass = |canvas: &mut Canvas, ox: i64, oy: i64, color: Rgba<u8>| {
        let mut cursor = ox;
        for ch in text.chars() {
            if cursor >= i64::from(canvas.width()) {
                break;
            }
            if let Some(g) = font::glyph(ch) {
                for (gx, gy) in font::glyph_pixels(g) {
                    let gx = cursor.saturating_add(i64::from(gx) * scale);
                    let gy = oy.saturating_add(i64::from(gy) * scale);
                    canvas.fill_rect(gx, gy, scale, scale, color);
                }
            }
            cursor = cursor.saturating_add(advance);
        }
    };

    let (x, y) = (px(op.x), px(op.y));
    if let Some(shadow) = shadow {
        pass(canvas, x.saturating_add(scale), y.saturating_add(scale), shadow);
    }
    pass(canvas, x, y, color);
    Ok(())
}

fn draw_hex_grid(canvas: &mut Canvas, op: &HexGridOp, ctx: &mut DrawContext<'_>) -> Result<(), OpError> {
    if op.hex_size.is_nan() || op.hex_size <= 0.0 {
        return Err(OpError::Payload(format!("hex_size must be positive, got {}", op.hex_size)));
    }
    let default = parse_color(&op.default_color)?;
    let outline = op.outline.as_deref().map(parse_color).transpose()?;
    let mut colors = HashMap::with_capacity(op.colors.len());
    for (name, hex) in &op.colors {
        colors.insert(name.as_str(), parse_color(hex)?);
    }

    let layout = HexLayout { x: op.x, y: op.y, size: op.hex_size };
    let cells = u64::from(op.cols) * u64::from(op.rows);
    if cells > u64::from(canvas.width()) * u64::from(canvas.height()) {
        return Err(OpError::Payload(format!(
            "hex_grid has {} cells, more than the {}x{} layer has pixels",
            cells,
            canvas.width(),
            canvas.height()
        )));
    }
    let far_x = op.x + (f64::from(op.cols) + 0.5) * layout.hex_width();
    let far_y = op.y + f64::from(op.rows) * layout.row_step() + op.hex_size;
    check_stroke("hex_grid", op.outline_width)?;
    check_reach(canvas, "hex_grid", [op.x, op.y, far_x, far_y])?;
    // an outline never needs to be wider than the hex itself
    let stroke = op.outline_width.min(op.hex_size.ceil() as u32);
    let mut reported = HashSet::new();

    for row in 0..op.rows {
        for col in 0..op.cols {
            let name = op.terrain.get(row as usize).and_then(|r| r.get(col as usize));
            let fill = match name {
                Some(name) => match colors.get(name.as_str()) {
                    Some(color) => *color,
                    None => {
                        if reported.insert(name.clone()) {
                            ctx.warnings.push(format!(
                                "Unknown terrain '{}' in hex_grid, using default color",
                                name
                            ));
                        }
                        default
                    }
                },
                None => default,
            };

            let corners = layout.corners(col, row);
            canvas.paint(rasterize_polygon(&corners), fill);
            if let Some(outline) = outline {
                canvas.paint(rasterize_polygon_outline(&corners, stroke), outline);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(ops: &[Value], w: u32, h: u32) -> (image::RgbaImage, Vec<String>) {
        run_with_sprites(ops, w, h, None)
    }

    fn run_with_sprites(
        ops: &[Value],
        w: u32,
        h: u32,
        sprites: Option<&SpriteSheet>,
    ) -> (image::RgbaImage, Vec<String>) {
        let mut canvas = Canvas::new(w, h);
        let mut warnings = Vec::new();
        for op in ops {
            let op = Operation::from_value(op).unwrap();
            let mut ctx = DrawContext { sprites, warnings: &mut warnings };
            op.apply(&mut canvas, &mut ctx).unwrap();
        }
        (canvas.into_image(), warnings)
    }

    fn try_apply(op: Value, w: u32, h: u32) -> Result<image::RgbaImage, OpError> {
        let mut canvas = Canvas::new(w, h);
        let mut warnings = Vec::new();
        let mut ctx = DrawContext { sprites: None, warnings: &mut warnings };
        Operation::from_value(&op)?.apply(&mut canvas, &mut ctx)?;
        Ok(canvas.into_image())
    }

    #[test]
    fn test_first_declared_key_wins() {
        let op = Operation::from_value(&json!({"rect": {"color": "#fff"}, "fill": "#000"})).unwrap();
        assert_eq!(op.name(), "fill");
    }

    #[test]
    fn test_unknown_operation_warns() {
        let (image, warnings) = run(&[json!({"sparkle": {}})], 2, 2);
        assert_eq!(warnings, vec!["Unknown operation: sparkle".to_string()]);
        assert!(image.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(Operation::from_value(&json!("fill")).is_err());
    }

    #[test]
    fn test_bad_payload_is_rejected() {
        let err = Operation::from_value(&json!({"line": {"x1": 0}})).unwrap_err();
        assert!(err.to_string().contains("invalid line payload"));
    }

    #[test]
    fn test_bad_color_fails_apply() {
        let op = Operation::from_value(&json!({"fill": "#12345"})).unwrap();
        let mut canvas = Canvas::new(1, 1);
        let mut warnings = Vec::new();
        let mut ctx = DrawContext { sprites: None, warnings: &mut warnings };
        assert!(matches!(op.apply(&mut canvas, &mut ctx), Err(OpError::Color(_))));
    }

    #[test]
    fn test_rect_defaults_to_canvas_size() {
        let (image, _) = run(&[json!({"rect": {"x": 2, "y": 1, "color": "#f00"}})], 4, 3);
        assert_eq!(image.get_pixel(1, 1)[3], 0);
        assert_eq!(*image.get_pixel(3, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_vertical_gradient_endpoints() {
        let (image, _) = run(&[json!({"gradient": {"from": "#000", "to": "#fff"}})], 1, 5);
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(0, 2), Rgba([128, 128, 128, 255]));
        assert_eq!(*image.get_pixel(0, 4), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_horizontal_gradient_single_column() {
        let (image, _) = run(
            &[json!({"gradient": {"from": "#102030", "to": "#fff", "direction": "horizontal"}})],
            1,
            3,
        );
        assert!(image.pixels().all(|p| *p == Rgba([16, 32, 48, 255])));
    }

    #[test]
    fn test_lerp_color_includes_alpha() {
        let c = lerp_color(Rgba([0, 0, 0, 0]), Rgba([200, 100, 50, 255]), 0.5);
        assert_eq!(c, Rgba([100, 50, 25, 128]));
    }

    #[test]
    fn test_circle_needs_paint() {
        let op = Operation::from_value(&json!({"circle": {"cx": 1, "cy": 1, "r": 1}})).unwrap();
        let mut canvas = Canvas::new(3, 3);
        let mut warnings = Vec::new();
        let mut ctx = DrawContext { sprites: None, warnings: &mut warnings };
        assert!(op.apply(&mut canvas, &mut ctx).is_err());
    }

    #[test]
    fn test_circle_outline_leaves_center() {
        let (image, _) =
            run(&[json!({"circle": {"cx": 5, "cy": 5, "r": 4, "outline": "#fff"}})], 11, 11);
        assert_eq!(image.get_pixel(5, 5)[3], 0);
        assert_eq!(image.get_pixel(5, 1)[3], 255);
    }

    #[test]
    fn test_scatter_is_deterministic() {
        let ops = [json!({"scatter": {"color": "#fff", "count": 20, "seed": 7}})];
        let (a, _) = run(&ops, 16, 16);
        let (b, _) = run(&ops, 16, 16);
        assert_eq!(a, b);
        assert!(a.pixels().any(|p| p[3] == 255));
    }

    #[test]
    fn test_dither_density_extremes() {
        let (none, _) = run(&[json!({"dither": {"color": "#fff", "density": 0.0}})], 8, 8);
        assert!(none.pixels().all(|p| p[3] == 0));
        let (all, _) = run(&[json!({"dither": {"color": "#fff", "density": 1.0}})], 8, 8);
        assert!(all.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_pixels_skips_dots_and_unmapped() {
        let (image, _) = run(
            &[json!({"pixels": {"palette": {"a": "#f00"}, "rows": ["a.", "za"], "x": 1}})],
            4,
            2,
        );
        assert_eq!(*image.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(2, 0)[3], 0);
        assert_eq!(image.get_pixel(1, 1)[3], 0);
        assert_eq!(*image.get_pixel(2, 1), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_pixels_ragged_rows_rejected() {
        let op = Operation::from_value(&json!({"pixels": {"palette": {}, "rows": ["aa", "a"]}}))
            .unwrap();
        let mut canvas = Canvas::new(2, 2);
        let mut warnings = Vec::new();
        let mut ctx = DrawContext { sprites: None, warnings: &mut warnings };
        assert!(op.apply(&mut canvas, &mut ctx).is_err());
    }

    #[test]
    fn test_sprite_without_table_warns() {
        let (image, warnings) =
            run(&[json!({"sprite": {"category": "player", "name": "hero"}})], 4, 4);
        assert_eq!(warnings, vec!["Sprite not found: player/hero".to_string()]);
        assert!(image.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_sprite_origin_scale_and_frame_wrap() {
        let sheet: SpriteSheet = serde_json::from_value(json!({
            "player": {"hero": {
                "w": 2, "h": 1,
                "palette": {"a": "#0f0", "b": "#00f"},
                "frames": [["a."], ["b."]],
                "origin": [1, 0]
            }}
        }))
        .unwrap();
        let (image, warnings) = run_with_sprites(
            &[json!({"sprite": {"category": "player", "name": "hero", "x": 4, "y": 0, "scale": 2, "frame": 3}})],
            8,
            2,
            Some(&sheet),
        );
        assert!(warnings.is_empty());
        // frame 3 % 2 = 1 ("b."), origin shifts left by 1 * 2
        assert_eq!(*image.get_pixel(2, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(3, 1), Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(4, 0)[3], 0);
    }

    #[test]
    fn test_pixel_text_advance_and_shadow() {
        let (image, _) = run(
            &[json!({"pixel_text": {"text": "i?", "color": "#fff", "shadow": "#f00"}})],
            10,
            7,
        );
        // 'I' top bar
        assert_eq!(*image.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        // shadow peeks out below the bottom bar
        assert_eq!(*image.get_pixel(1, 5), Rgba([255, 0, 0, 255]));
        // '?' starts at x = 4
        assert_eq!(*image.get_pixel(4, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_pixel_text_unknown_chars_still_advance() {
        let (image, _) = run(&[json!({"pixel_text": {"text": "@1"}})], 8, 5);
        for x in 0..4 {
            for y in 0..5 {
                assert_eq!(image.get_pixel(x, y)[3], 0);
            }
        }
        assert_eq!(image.get_pixel(5, 0)[3], 255);
    }

    #[test]
    fn test_hex_grid_unmapped_terrain_warns_once() {
        let (image, warnings) = run(
            &[json!({"hex_grid": {
                "cols": 2, "rows": 2,
                "terrain": [["lava", "lava"], ["lava", "grass"]],
                "colors": {"grass": "#0f0"}
            }})],
            24,
            24,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("lava"));
        assert!(image.pixels().any(|p| *p == Rgba([0x33, 0x33, 0x33, 255])));
        assert!(image.pixels().any(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_non_positive_region_rejected() {
        let gradient = json!({"gradient": {"from": "#000", "to": "#fff", "h": -1e12}});
        let err = try_apply(gradient, 2, 2).unwrap_err();
        assert!(err.to_string().contains("h must be at least 1"), "{}", err);
        assert!(try_apply(json!({"rect": {"w": 0, "color": "#fff"}}), 2, 2).is_err());
        assert!(try_apply(json!({"scatter": {"color": "#fff", "count": 3, "w": -4}}), 2, 2).is_err());
    }

    #[test]
    fn test_gradient_partly_off_canvas_keeps_colours() {
        let op = json!({"gradient": {"from": "#000", "to": "#fff", "y": -2, "h": 5}});
        let image = try_apply(op, 1, 3).unwrap();
        assert_eq!(*image.get_pixel(0, 0), Rgba([128, 128, 128, 255]));
        assert_eq!(*image.get_pixel(0, 2), Rgba([255, 255, 255, 255]));

        let far = json!({"gradient": {"from": "#000", "to": "#fff", "x": -1e300, "w": 1e300}});
        assert!(try_apply(far, 2, 2).is_ok());
    }

    #[test]
    fn test_huge_scale_saturates() {
        let text = json!({"pixel_text": {"text": "AB", "scale": 1_000_000_000u32, "shadow": "#f00"}});
        let image = try_apply(text, 4, 4).unwrap();
        assert!(image.pixels().all(|p| p[3] == 0));

        let sheet: SpriteSheet = serde_json::from_value(json!({
            "ui": {"bar": {"w": 2, "h": 1, "palette": {"a": "#f00", "b": "#00f"}, "frames": [["ab"]], "origin": [1, 0]}}
        }))
        .unwrap();
        let (image, warnings) = run_with_sprites(
            &[json!({"sprite": {"category": "ui", "name": "bar", "scale": u32::MAX}})],
            3,
            2,
            Some(&sheet),
        );
        assert!(warnings.is_empty());
        // the 'a' block ends at x = 0, the 'b' block covers the canvas
        assert!(image.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn test_dither_visits_canvas_only() {
        let huge = json!({"dither": {"color": "#fff", "density": 1.0, "w": 1e15, "h": 1e15}});
        let image = try_apply(huge, 4, 4).unwrap();
        assert!(image.pixels().all(|p| p[3] == 255));

        let inside = json!({"dither": {"color": "#fff", "seed": 5, "w": 4, "h": 4}});
        let default = json!({"dither": {"color": "#fff", "seed": 5}});
        assert_eq!(try_apply(inside, 4, 4).unwrap(), try_apply(default, 4, 4).unwrap());
    }

    #[test]
    fn test_scatter_count_is_capped() {
        let op = json!({"scatter": {"color": "#fff", "count": u32::MAX, "seed": 1}});
        let image = try_apply(op, 2, 2).unwrap();
        assert!(image.pixels().any(|p| p[3] == 255));
    }

    #[test]
    fn test_oversized_shapes_rejected() {
        let circle = json!({"circle": {"cx": 1, "cy": 1, "r": 1e9, "color": "#fff"}});
        assert!(try_apply(circle, 4, 4).unwrap_err().to_string().contains("out of range"));
        let line = json!({"line": {"x1": 0, "y1": 0, "x2": 3, "y2": 3, "color": "#fff", "width": 1000}});
        assert!(try_apply(line, 4, 4).is_err());
        let polygon = json!({"polygon": {"points": [[0, 0], [1e12, 0], [0, 3]], "color": "#fff"}});
        assert!(try_apply(polygon, 4, 4).is_err());
        let grid = json!({"hex_grid": {"cols": 100000, "rows": 100000}});
        assert!(try_apply(grid, 8, 8).unwrap_err().to_string().contains("cells"));
        let wide = json!({"hex_grid": {"cols": 1000, "rows": 1, "hex_size": 4}});
        assert!(try_apply(wide, 64, 64).is_err());

        let near = json!({"circle": {"cx": -6, "cy": 2, "r": 7, "color": "#fff"}});
        let image = try_apply(near, 4, 4).unwrap();
        assert_eq!(image.get_pixel(0, 2)[3], 255);
    }
}
