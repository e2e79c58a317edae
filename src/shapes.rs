//! Shape rasterization primitives for thumbnail drawing.
//!
//! Each function converts a geometric shape into the set of integer pixel
//! coordinates it covers. Coordinates may be negative or lie outside any
//! canvas; clipping is the caller's job.

use std::collections::HashSet;

/// Rasterize a line using Bresenham's line algorithm.
///
/// ```
/// use forkarcade::shapes::rasterize_line;
///
/// let pixels = rasterize_line((0, 0), (3, 3));
/// assert_eq!(pixels.len(), 4);
/// assert!(pixels.contains(&(3, 3)));
/// ```
pub fn rasterize_line(p0: (i32, i32), p1: (i32, i32)) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();

    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        pixels.insert((x0, y0));

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }

    pixels
}

/// Rasterize a line with a stroke width.
///
/// Every pixel of the Bresenham line is widened into a `width`×`width`
/// square centred on it. A width of 0 or 1 yields the plain line.
pub fn rasterize_thick_line(p0: (i32, i32), p1: (i32, i32), width: u32) -> HashSet<(i32, i32)> {
    let core = rasterize_line(p0, p1);
    if width <= 1 {
        return core;
    }

    let lo = -((width as i32 - 1) / 2);
    let hi = width as i32 / 2;
    let mut pixels = HashSet::with_capacity(core.len() * (width * width) as usize);
    for (x, y) in core {
        for oy in lo..=hi {
            for ox in lo..=hi {
                pixels.insert((x + ox, y + oy));
            }
        }
    }
    pixels
}

/// Rasterize a filled rectangle with top-left corner (x, y) and size (w, h).
///
/// ```
/// use forkarcade::shapes::rasterize_rect;
///
/// let pixels = rasterize_rect(0, 0, 3, 2);
/// assert_eq!(pixels.len(), 6);
/// ```
pub fn rasterize_rect(x: i32, y: i32, w: i32, h: i32) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();

    if w <= 0 || h <= 0 {
        return pixels;
    }

    for dy in 0..h {
        for dx in 0..w {
            pixels.insert((x + dx, y + dy));
        }
    }

    pixels
}

/// Rasterize a filled circle. Radius 0 is the single centre pixel.
///
/// ```
/// use forkarcade::shapes::rasterize_circle;
///
/// assert_eq!(rasterize_circle(3, 3, 0).len(), 1);
/// assert!(rasterize_circle(3, 3, 2).contains(&(3, 1)));
/// ```
pub fn rasterize_circle(cx: i32, cy: i32, r: i32) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();
    if r < 0 {
        return pixels;
    }

    // (r + 0.5)^2 - 0.5 keeps radius 1 a plus sign and avoids flat-sided discs
    let limit = (r as f64 + 0.5).powi(2) - 0.5;
    for dy in -r..=r {
        for dx in -r..=r {
            if ((dx * dx + dy * dy) as f64) <= limit {
                pixels.insert((cx + dx, cy + dy));
            }
        }
    }
    pixels
}

/// Rasterize a circle outline `width` pixels thick, growing inwards from `r`.
pub fn rasterize_ring(cx: i32, cy: i32, r: i32, width: u32) -> HashSet<(i32, i32)> {
    let outer = rasterize_circle(cx, cy, r);
    if width == 0 {
        return HashSet::new();
    }
    let inner_r = r - width as i32;
    if inner_r < 0 {
        return outer;
    }
    let inner = rasterize_circle(cx, cy, inner_r);
    outer.difference(&inner).copied().collect()
}

/// Rasterize a filled polygon.
///
/// Interior spans come from a scanline pass with half-open edge ranges, so
/// vertices shared by two edges are counted once. The outline is then
/// added with Bresenham lines, which makes the fill inclusive of its edges
/// the way pixel-art tools draw it.
///
/// ```
/// use forkarcade::shapes::rasterize_polygon;
///
/// let triangle = vec![(0, 0), (4, 0), (2, 3)];
/// let pixels = rasterize_polygon(&triangle);
/// assert!(pixels.contains(&(2, 1)));
/// assert!(pixels.contains(&(2, 3)));
/// ```
pub fn rasterize_polygon(vertices: &[(i32, i32)]) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();

    if vertices.len() < 3 {
        return pixels;
    }

    let min_y = vertices.iter().map(|(_, y)| *y).min().unwrap_or(0);
    let max_y = vertices.iter().map(|(_, y)| *y).max().unwrap_or(0);

    for y in min_y..=max_y {
        let mut intersections = Vec::new();

        for i in 0..vertices.len() {
            let j = (i + 1) % vertices.len();
            let (x1, y1) = vertices[i];
            let (x2, y2) = vertices[j];

            if y1 == y2 {
                continue;
            }

            let (top, bottom) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
            if y >= top && y < bottom {
                let t = (y - y1) as f64 / (y2 - y1) as f64;
                let x = x1 as f64 + t * (x2 - x1) as f64;
                intersections.push(x.round() as i32);
            }
        }

        intersections.sort_unstable();

        for pair in intersections.chunks(2) {
            if let [x_start, x_end] = pair {
                for x in *x_start..=*x_end {
                    pixels.insert((x, y));
                }
            }
        }
    }

    pixels.extend(rasterize_polygon_outline(vertices, 1));
    pixels
}

/// Rasterize the closed outline of a polygon with the given stroke width.
pub fn rasterize_polygon_outline(vertices: &[(i32, i32)], width: u32) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();
    if vertices.len() < 2 || width == 0 {
        return pixels;
    }
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        pixels.extend(rasterize_thick_line(vertices[i], vertices[j], width));
    }
    pixels
}
