//! Fixed 3×5 bitmap font for `pixel_text`.
//!
//! Each glyph is five rows of three bits; bit 2 is the leftmost column.

pub const GLYPH_WIDTH: i32 = 3;
pub const GLYPH_HEIGHT: i32 = 5;

/// Horizontal advance per character, before scaling (glyph plus one column gap).
pub const ADVANCE: i32 = 4;

type Glyph = [u8; 5];

/// Look up the glyph for an upper-case character.
pub fn glyph(c: char) -> Option<&'static Glyph> {
    let g: &'static Glyph = match c {
        'A' => &[0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => &[0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => &[0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => &[0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => &[0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => &[0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => &[0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => &[0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => &[0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => &[0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => &[0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => &[0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => &[0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => &[0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => &[0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => &[0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => &[0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => &[0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => &[0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => &[0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => &[0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => &[0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => &[0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => &[0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => &[0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => &[0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => &[0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => &[0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => &[0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => &[0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => &[0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => &[0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => &[0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => &[0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => &[0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => &[0b111, 0b101, 0b111, 0b001, 0b110],
        ' ' => &[0, 0, 0, 0, 0],
        '.' => &[0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => &[0b000, 0b000, 0b000, 0b010, 0b100],
        '!' => &[0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => &[0b110, 0b001, 0b010, 0b000, 0b010],
        '-' => &[0b000, 0b000, 0b111, 0b000, 0b000],
        ':' => &[0b000, 0b010, 0b000, 0b010, 0b000],
        '\'' => &[0b010, 0b010, 0b000, 0b000, 0b000],
        '/' => &[0b001, 0b001, 0b010, 0b100, 0b100],
        '+' => &[0b000, 0b010, 0b111, 0b010, 0b000],
        '=' => &[0b000, 0b111, 0b000, 0b111, 0b000],
        '(' => &[0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => &[0b100, 0b010, 0b010, 0b010, 0b100],
        _ => return None,
    };
    Some(g)
}

/// Pixel offsets (column, row) lit by a glyph, in unscaled font units.
pub fn glyph_pixels(g: &Glyph) -> impl Iterator<Item = (i32, i32)> + '_ {
    g.iter().enumerate().flat_map(|(row, bits)| {
        (0..GLYPH_WIDTH).filter_map(move |col| {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                Some((col, row as i32))
            } else {
                None
            }
        })
    })
}
