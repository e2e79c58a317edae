//! Layered procedural thumbnail compositor.
//!
//! A [`ThumbnailRequest`] is a stack of layers. Each layer is drawn on its own
//! transparent canvas at its own resolution, resampled to the output size,
//! faded by its opacity and alpha-composited over the layers below. The result
//! is flattened onto opaque black.

pub mod blend;
pub mod font;
pub mod hex;
pub mod ops;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use blend::{Canvas, Resample};
pub use ops::{DrawContext, OpError, Operation};

use crate::sprites::SpriteSheet;

pub const THUMBNAIL_PNG: &str = "_thumbnail.png";
pub const THUMBNAIL_JSON: &str = "_thumbnail.json";

pub const DEFAULT_WIDTH: u32 = 72;
pub const DEFAULT_HEIGHT: u32 = 32;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Thumbnail size {width}x{height} is out of range (1..={max} per side)")]
    InvalidSize { width: u32, height: u32, max: u32 },
    #[error("Layer {layer} resolution {width}x{height} is out of range (1..={max} per side)")]
    InvalidLayerSize { layer: usize, width: u32, height: u32, max: u32 },
    #[error("Layer {layer} op {index} ({op}): {source}")]
    Operation {
        layer: usize,
        index: usize,
        op: String,
        #[source]
        source: OpError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_opacity() -> f64 {
    1.0
}

/// Output size and ordered layers, bottom first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    #[serde(default = "default_width")]
    pub w: u32,
    #[serde(default = "default_height")]
    pub h: u32,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

impl Default for ThumbnailRequest {
    fn default() -> Self {
        Self { w: DEFAULT_WIDTH, h: DEFAULT_HEIGHT, layers: Vec::new() }
    }
}

impl ThumbnailRequest {
    /// Whether any layer has a `sprite` op.
    pub fn uses_sprites(&self) -> bool {
        self.layers.iter().flat_map(|layer| &layer.ops).any(|op| op.get("sprite").is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LayerSpec {
    /// Drawing resolution; the output size when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Drawing resolution [w, h]; defaults to the output size")]
    pub res: Option<[u32; 2]>,
    #[serde(default)]
    #[schemars(description = "Resampling filter: nearest, bilinear, bicubic or lanczos")]
    pub aa: Resample,
    #[serde(default = "default_opacity")]
    #[schemars(description = "Layer opacity 0.0-1.0 (default 1.0)")]
    pub opacity: f64,
    #[serde(default)]
    #[schemars(description = "Drawing operations, applied in order")]
    pub ops: Vec<Value>,
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self { res: None, aa: Resample::Nearest, opacity: 1.0, ops: Vec::new() }
    }
}

/// A flattened thumbnail plus the non-fatal problems met while drawing it.
#[derive(Debug, Clone)]
pub struct RenderedThumbnail {
    pub image: RgbaImage,
    pub warnings: Vec<String>,
}

fn check_size(width: u32, height: u32, max: u32) -> bool {
    (1..=max).contains(&width) && (1..=max).contains(&height)
}

/// Render `request` into an opaque RGBA image.
///
/// `max_size` bounds every side, of the output and of each layer. Sprite
/// lookups go through `sprites` when the game has a sprite table.
pub fn render_thumbnail(
    request: &ThumbnailRequest,
    sprites: Option<&SpriteSheet>,
    max_size: u32,
) -> Result<RenderedThumbnail, ThumbnailError> {
    let (width, height) = (request.w, request.h);
    if !check_size(width, height, max_size) {
        return Err(ThumbnailError::InvalidSize { width, height, max: max_size });
    }

    let mut warnings = Vec::new();
    let mut acc = RgbaImage::new(width, height);

    for (layer_index, layer) in request.layers.iter().enumerate() {
        let [lw, lh] = layer.res.unwrap_or([width, height]);
        if !check_size(lw, lh, max_size) {
            return Err(ThumbnailError::InvalidLayerSize {
                layer: layer_index,
                width: lw,
                height: lh,
                max: max_size,
            });
        }

        let mut canvas = Canvas::new(lw, lh);
        for (index, raw) in layer.ops.iter().enumerate() {
            let wrap = |op: String, source: OpError| ThumbnailError::Operation {
                layer: layer_index,
                index,
                op,
                source,
            };
            let op = Operation::from_value(raw).map_err(|e| wrap("?".to_string(), e))?;
            let mut ctx = DrawContext { sprites, warnings: &mut warnings };
            op.apply(&mut canvas, &mut ctx).map_err(|e| wrap(op.name().to_string(), e))?;
        }

        let mut image = blend::resample(canvas.into_image(), width, height, layer.aa);
        blend::apply_opacity(&mut image, layer.opacity);
        blend::composite_over(&mut acc, &image);
        tracing::debug!(layer = layer_index, res = ?[lw, lh], aa = ?layer.aa, "composited layer");
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    Ok(RenderedThumbnail { image: blend::flatten_on_black(&acc), warnings })
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ThumbnailError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Write `_thumbnail.png` and the `_thumbnail.json` request next to it.
///
/// Returns the PNG path and its encoded bytes.
pub fn save_thumbnail(
    game_dir: &Path,
    request: &ThumbnailRequest,
    image: &RgbaImage,
) -> Result<(PathBuf, Vec<u8>), ThumbnailError> {
    let png = encode_png(image)?;
    let path = game_dir.join(THUMBNAIL_PNG);
    fs::write(&path, &png)?;
    let json = serde_json::to_string_pretty(request)?;
    fs::write(game_dir.join(THUMBNAIL_JSON), json + "\n")?;
    Ok((path, png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use serde_json::json;

    fn request(value: Value) -> ThumbnailRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let req = request(json!({"layers": [{}]}));
        assert_eq!((req.w, req.h), (72, 32));
        assert_eq!(req.layers[0].aa, Resample::Nearest);
        assert_eq!(req.layers[0].opacity, 1.0);
        assert!(req.layers[0].res.is_none());
    }

    #[test]
    fn test_empty_request_is_black() {
        let out = render_thumbnail(&ThumbnailRequest::default(), None, 512).unwrap();
        assert_eq!(out.image.dimensions(), (72, 32));
        assert!(out.image.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_size_bounds() {
        let req = request(json!({"w": 0, "h": 10}));
        assert!(matches!(render_thumbnail(&req, None, 512), Err(ThumbnailError::InvalidSize { .. })));
        let req = request(json!({"w": 513, "h": 10}));
        assert!(matches!(render_thumbnail(&req, None, 512), Err(ThumbnailError::InvalidSize { .. })));
        let req = request(json!({"w": 4, "h": 4, "layers": [{"res": [4, 0]}]}));
        assert!(matches!(
            render_thumbnail(&req, None, 512),
            Err(ThumbnailError::InvalidLayerSize { layer: 0, .. })
        ));
    }

    #[test]
    fn test_half_opacity_layer() {
        let req = request(json!({
            "w": 1, "h": 1,
            "layers": [{"opacity": 0.5, "ops": [{"fill": "#ffffff"}]}]
        }));
        let px = *render_thumbnail(&req, None, 512).unwrap().image.get_pixel(0, 0);
        assert_eq!(px[3], 255);
        assert!(px[0] >= 127 && px[0] <= 128);
    }

    #[test]
    fn test_operation_error_names_layer_and_op() {
        let req = request(json!({
            "w": 2, "h": 2,
            "layers": [{}, {"ops": [{"fill": "#fff"}, {"rect": {"color": "nope"}}]}]
        }));
        let err = render_thumbnail(&req, None, 512).unwrap_err();
        match err {
            ThumbnailError::Operation { layer, index, ref op, .. } => {
                assert_eq!((layer, index, op.as_str()), (1, 1, "rect"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_warnings_are_collected() {
        let req = request(json!({
            "w": 2, "h": 2,
            "layers": [{"ops": [{"sparkle": {}}, {"sprite": {"category": "hero", "name": "x"}}]}]
        }));
        let out = render_thumbnail(&req, None, 512).unwrap();
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0], "Unknown operation: sparkle");
    }

    #[test]
    fn test_save_writes_png_and_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let req = request(json!({"w": 3, "h": 2, "layers": [{"ops": [{"fill": "#123"}]}]}));
        let out = render_thumbnail(&req, None, 512).unwrap();
        let (path, png) = save_thumbnail(temp.path(), &req, &out.image).unwrap();

        assert_eq!(path, temp.path().join(THUMBNAIL_PNG));
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, out.image);

        let saved: ThumbnailRequest =
            serde_json::from_str(&fs::read_to_string(temp.path().join(THUMBNAIL_JSON)).unwrap())
                .unwrap();
        assert_eq!(saved, req);
    }
}
