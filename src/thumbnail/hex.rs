//! Pointy-top hex tessellation geometry for `hex_grid`.

use std::f64::consts::PI;

/// Layout of a hex grid anchored at (`x`, `y`), the top-left of its bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexLayout {
    pub x: f64,
    pub y: f64,
    /// Centre-to-corner distance
    pub size: f64,
}

impl HexLayout {
    /// Width of one hex (flat side to flat side).
    pub fn hex_width(&self) -> f64 {
        3f64.sqrt() * self.size
    }

    /// Vertical distance between consecutive row centres.
    pub fn row_step(&self) -> f64 {
        1.5 * self.size
    }

    /// Centre of the hex at (`col`, `row`). Odd rows shift right by half a hex.
    pub fn center(&self, col: u32, row: u32) -> (f64, f64) {
        let w = self.hex_width();
        let shift = if row % 2 == 1 { w / 2.0 } else { 0.0 };
        let cx = self.x + w / 2.0 + col as f64 * w + shift;
        let cy = self.y + self.size + row as f64 * self.row_step();
        (cx, cy)
    }

    /// The six corners of the hex at (`col`, `row`), rounded to pixels.
    ///
    /// Corner `i` sits at angle `60°·i − 30°`.
    pub fn corners(&self, col: u32, row: u32) -> Vec<(i32, i32)> {
        let (cx, cy) = self.center(col, row);
        (0..6)
            .map(|i| {
                let angle = (60.0 * i as f64 - 30.0) * PI / 180.0;
                (
                    (cx + self.size * angle.cos()).round() as i32,
                    (cy + self.size * angle.sin()).round() as i32,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_center() {
        let layout = HexLayout { x: 0.0, y: 0.0, size: 4.0 };
        let (cx, cy) = layout.center(0, 0);
        assert!((cx - 3f64.sqrt() * 2.0).abs() < 1e-9);
        assert!((cy - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_odd_rows_are_offset() {
        let layout = HexLayout { x: 0.0, y: 0.0, size: 4.0 };
        let (even_x, _) = layout.center(0, 0);
        let (odd_x, odd_y) = layout.center(0, 1);
        assert!((odd_x - even_x - layout.hex_width() / 2.0).abs() < 1e-9);
        assert!((odd_y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_corners_are_pointy_top() {
        let layout = HexLayout { x: 0.0, y: 0.0, size: 10.0 };
        let corners = layout.corners(0, 0);
        assert_eq!(corners.len(), 6);
        let (cx, cy) = layout.center(0, 0);
        // corner 2 (90°) is straight below, corner 5 (270°) straight above
        assert_eq!(corners[2], (cx.round() as i32, 20));
        assert_eq!(corners[5], (cx.round() as i32, 0));
        assert_eq!(corners[0].1, (cy - 5.0).round() as i32);
    }
}
