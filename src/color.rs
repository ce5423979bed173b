//! Palette colors and the nearest-index lookup table.
//!
//! The renderer's source art is palettized; whenever the compositor has
//! to squeeze a true-color texel back into an index (16-bit and 8-bit
//! destinations) it goes through [`ColorLut`], a 15-bit RGB bucket table
//! built once per active palette.

/// Palette index treated as transparent when a block is chroma-keyed.
pub const CHROMA_KEY_INDEX: u8 = 255;

/// An 8-bit-per-channel color, byte order r,g,b,a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Reads a texel from a byte slice laid out r,g,b,a.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { r: bytes[0], g: bytes[1], b: bytes[2], a: bytes[3] }
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Color equality ignoring alpha.
    pub fn rgb_eq(self, other: Rgba) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// The active 256-entry palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgba; 256],
}

impl Palette {
    pub fn new(colors: [Rgba; 256]) -> Self {
        Self { colors }
    }

    /// A ramp palette (index i maps to gray level i, opaque). Handy for
    /// tests and as a safe default before the real palette is loaded.
    pub fn grayscale() -> Self {
        let mut colors = [Rgba::default(); 256];
        for (i, c) in colors.iter_mut().enumerate() {
            *c = Rgba::new(i as u8, i as u8, i as u8, 0xFF);
        }
        Self { colors }
    }

    pub fn set_color(&mut self, index: u8, color: Rgba) {
        self.colors[index as usize] = color;
    }

    /// The RGBA value of a palette index. Always opaque.
    pub fn color(&self, index: u8) -> Rgba {
        self.colors[index as usize].with_alpha(0xFF)
    }

    pub fn colors(&self) -> &[Rgba; 256] {
        &self.colors
    }
}

/// Pixel-to-nearest-palette-index lookup.
///
/// Channels are quantized to 5 bits, giving a 32768-bucket table; each
/// bucket holds the palette index whose color is closest (squared RGB
/// distance) to the bucket's representative color. The table is owned by
/// whoever owns the palette and rebuilt when the palette changes, never
/// shared as hidden global state.
#[derive(Clone)]
pub struct ColorLut {
    table: Box<[u8; 32768]>,
}

impl ColorLut {
    pub fn build(palette: &Palette) -> Self {
        let mut table = Box::new([0u8; 32768]);
        for (key, slot) in table.iter_mut().enumerate() {
            let r = (((key >> 10) & 0x1F) << 3) as i32;
            let g = (((key >> 5) & 0x1F) << 3) as i32;
            let b = ((key & 0x1F) << 3) as i32;
            *slot = nearest_index(palette, r, g, b);
        }
        Self { table }
    }

    /// Palette index nearest to the given color.
    pub fn nearest(&self, r: u8, g: u8, b: u8) -> u8 {
        self.table[Self::key(r, g, b)]
    }

    fn key(r: u8, g: u8, b: u8) -> usize {
        (((r as usize) >> 3) << 10) | (((g as usize) >> 3) << 5) | ((b as usize) >> 3)
    }
}

fn nearest_index(palette: &Palette, r: i32, g: i32, b: i32) -> u8 {
    let mut best = 0u8;
    let mut best_dist = i32::MAX;
    for i in 0..256usize {
        let c = palette.colors()[i];
        let dr = c.r as i32 - r;
        let dg = c.g as i32 - g;
        let db = c.b as i32 - b;
        let dist = dr * dr + dg * dg + db * db;
        if dist < best_dist {
            best_dist = dist;
            best = i as u8;
        }
    }
    best
}
