//! Pixel blending, layer resampling and the final flatten.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Resampling filter used when a layer's resolution differs from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Resample {
    /// Nearest-neighbor (pixel-perfect)
    #[default]
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl Resample {
    pub fn filter(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Bilinear => FilterType::Triangle,
            Resample::Bicubic => FilterType::CatmullRom,
            Resample::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Layer canvas that clips and alpha-blends every write.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Transparent canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Blend `color` over the pixel at (x, y). Out-of-bounds writes are dropped.
    pub fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        if color[3] == 0 {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        *dst = blend_pixels(&color, dst, color[3] as f32 / 255.0);
    }

    /// Blend `color` over every pixel in `pixels`.
    pub fn paint<I>(&mut self, pixels: I, color: Rgba<u8>)
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        for (x, y) in pixels {
            self.put(x.into(), y.into(), color);
        }
    }

    /// Blend `color` over an axis-aligned rectangle, clipped to the canvas.
    ///
    /// Only the visible part is visited, so the cost is bounded by the canvas.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(i64::from(self.width()));
        let y1 = y.saturating_add(h).min(i64::from(self.height()));
        for py in y0..y1 {
            for px in x0..x1 {
                self.put(px, py, color);
            }
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Blend source pixel over destination with Porter-Duff "source over".
///
/// `src_alpha` is the effective source coverage in 0.0..=1.0.
pub fn blend_pixels(src: &Rgba<u8>, dst: &Rgba<u8>, src_alpha: f32) -> Rgba<u8> {
    let dst_alpha = dst[3] as f32 / 255.0;

    // out_alpha = src_alpha + dst_alpha * (1 - src_alpha)
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    // out_color = (src * src_alpha + dst * dst_alpha * (1 - src_alpha)) / out_alpha
    let composite = |s: u8, d: u8| -> u8 {
        let s = s as f32 / 255.0;
        let d = d as f32 / 255.0;
        let result = (s * src_alpha + d * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        (result.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    Rgba([
        composite(src[0], dst[0]),
        composite(src[1], dst[1]),
        composite(src[2], dst[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Resize `image` to (width, height) unless it already has that size.
pub fn resample(image: RgbaImage, width: u32, height: u32, mode: Resample) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    image::imageops::resize(&image, width, height, mode.filter())
}

/// Multiply every alpha value by `opacity` (clamped to 0..=1).
pub fn apply_opacity(image: &mut RgbaImage, opacity: f64) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as f64 * opacity).round() as u8;
    }
}

/// Composite `layer` over `acc`. Both images must have the same size.
pub fn composite_over(acc: &mut RgbaImage, layer: &RgbaImage) {
    for (dst, src) in acc.pixels_mut().zip(layer.pixels()) {
        if src[3] == 0 {
            continue;
        }
        *dst = blend_pixels(src, dst, src[3] as f32 / 255.0);
    }
}

/// Flatten onto an opaque black background.
pub fn flatten_on_black(image: &RgbaImage) -> RgbaImage {
    let black = Rgba([0, 0, 0, 255]);
    let mut out = RgbaImage::from_pixel(image.width(), image.height(), black);
    composite_over(&mut out, image);
    out
}
