//! Hex color parsing
//!
//! Supports `RGB`, `RGBA`, `RRGGBB` and `RRGGBBAA`, each with an optional
//! leading `#`. Short forms duplicate every nibble (`a` -> `aa`).

use image::Rgba;
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Input string was empty (or only `#`)
    #[error("empty color string")]
    Empty,
    /// Invalid length (must be 3, 4, 6, or 8 hex chars)
    #[error("invalid color length {0} in '{1}', expected 3, 4, 6, or 8 hex digits")]
    InvalidLength(usize, String),
    /// Contains non-hex characters
    #[error("invalid hex character '{0}' in '{1}'")]
    InvalidHex(char, String),
}

/// Parse a hex color string into an RGBA color.
///
/// ```
/// use forkarcade::color::parse_color;
///
/// assert_eq!(parse_color("#F00").unwrap(), image::Rgba([255, 0, 0, 255]));
/// assert_eq!(parse_color("102030").unwrap(), image::Rgba([16, 32, 48, 255]));
/// assert_eq!(parse_color("#00000080").unwrap(), image::Rgba([0, 0, 0, 128]));
/// assert!(parse_color("#12345").is_err());
/// ```
pub fn parse_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.is_empty() {
        return Err(ColorError::Empty);
    }

    if let Some(c) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex(c, s.to_string()));
    }

    // All characters are ASCII hex digits from here on, so byte indexing is safe.
    let digits: Vec<u8> = hex.bytes().map(hex_value).collect();

    match digits.len() {
        3 => Ok(Rgba([digits[0] * 17, digits[1] * 17, digits[2] * 17, 255])),
        4 => Ok(Rgba([digits[0] * 17, digits[1] * 17, digits[2] * 17, digits[3] * 17])),
        6 => Ok(Rgba([
            digits[0] * 16 + digits[1],
            digits[2] * 16 + digits[3],
            digits[4] * 16 + digits[5],
            255,
        ])),
        8 => Ok(Rgba([
            digits[0] * 16 + digits[1],
            digits[2] * 16 + digits[3],
            digits[4] * 16 + digits[5],
            digits[6] * 16 + digits[7],
        ])),
        len => Err(ColorError::InvalidLength(len, s.to_string())),
    }
}

/// Format a color as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
pub fn to_hex(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

/// Check whether a string is an acceptable sprite palette color.
///
/// Sprite palettes are emitted verbatim into browser canvas code as
/// `fillStyle`, so the leading `#` is mandatory there.
pub fn is_palette_hex(s: &str) -> bool {
    s.starts_with('#') && parse_color(s).is_ok()
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}
