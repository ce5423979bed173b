//! Pixel formats for cached blocks.
//!
//! The set is closed: every format the cache can hand to the upload
//! collaborator has a drawing routine in the compositor, and a fixed
//! byte width per texel.

use serde::{Deserialize, Serialize};

/// Storage format of a cached pixel block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// One palette index per texel. Holes are cut with the chroma key.
    Palette8,
    /// Low byte palette index, high byte alpha.
    IntensityAlpha16,
    /// Four bytes per texel, byte order r,g,b,a.
    Rgba32,
    /// One alpha level per texel (fade masks).
    Alpha8,
    /// One intensity level per texel.
    Intensity8,
}

impl PixelFormat {
    /// Byte width of one texel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba32 => 4,
            PixelFormat::IntensityAlpha16 => 2,
            PixelFormat::Palette8 | PixelFormat::Alpha8 | PixelFormat::Intensity8 => 1,
        }
    }

    /// Whether texels in this format carry an alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba32 | PixelFormat::IntensityAlpha16 | PixelFormat::Alpha8
        )
    }
}
