//! Land-cover class metadata.

use serde::{Deserialize, Serialize};

/// An RGB display colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale a 16-bit TIFF colour map entry down to 8 bits per channel.
    pub fn from_u16(r: u16, g: u16, b: u16) -> Self {
        Self {
            r: (r >> 8) as u8,
            g: (g >> 8) as u8,
            b: (b >> 8) as u8,
        }
    }

    /// Format as `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Display name and colour of one land-cover class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    /// `#rrggbb`, or `None` when the raster carries no colour table.
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Color::new(0x47, 0x6b, 0xa0).to_hex(), "#476ba0");
        assert_eq!(Color::new(0, 0, 0).to_hex(), "#000000");
    }

    #[test]
    fn test_from_u16() {
        let color = Color::from_u16(0xffff, 0x8000, 0x00ff);
        assert_eq!(color, Color::new(0xff, 0x80, 0x00));
    }
}
