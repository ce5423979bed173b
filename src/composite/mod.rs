//! Pixel compositing: columns into blocks, patches into textures.
//!
//! This module provides:
//! - `column`: the column/span compositor, decoding run-length posts
//!   into a destination block with scale, clip, flip, colormap and
//!   blend handling
//! - `texture`: assembly of multi-patch composite textures and the
//!   simplified single-patch path
//! - `blend`: the blend styles shared by both

pub mod blend;
pub mod column;
pub mod texture;

pub use blend::{blend_palette_indexes, blend_pixel, BlendStyle};
pub use column::{composite_column, ColorCtx, ColumnFlip, ColumnParams, Placement};
pub use texture::{composite_patch, composite_texture, draw_texture_patch};

/// Fixed-point resampling accumulators: 16 fractional bits.
pub(crate) const FRACBITS: i32 = 16;
pub(crate) const FRACUNIT: i32 = 1 << FRACBITS;

/// 16.16 fixed-point value.
pub type Fixed = i32;

/// Scales `value` by a 16.16 factor, rounding to nearest with the
/// half-unit bias the resampler uses everywhere.
pub(crate) fn scale_round(value: i32, scale: Fixed) -> i32 {
    ((value * scale) + FRACUNIT / 2) >> FRACBITS
}
