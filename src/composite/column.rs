//! The column/span compositor.
//!
//! Decodes one source column's posts into a destination block, leaving
//! every destination texel outside the column's vertical extent
//! untouched. Handles vertical scaling (nearest-neighbor via a
//! fixed-point accumulator), clipping against the block, vertical flip,
//! colormap remapping, bit-depth conversion and blending.

use std::cmp::min;

use super::blend::{blend_palette_indexes, blend_pixel, BlendStyle};
use super::{scale_round, Fixed, FRACBITS};
use crate::color::{ColorLut, Palette, Rgba};
use crate::mip::{Colormap, PixelBlock};
use crate::patch::{Column, SourceDepth};

/// Whether a column is drawn top-down or bottom-up.
///
/// Selected once per patch before the column loop; the flipped variant
/// measures post offsets from the bottom of the patch and walks the
/// source run backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFlip {
    Normal,
    Flipped,
}

/// Placement of a patch inside a composite texture. Absent for the
/// simplified single-patch path (sprites, standalone patches), which
/// draws at the origin with no blending.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub origin_y: i32,
    pub style: BlendStyle,
    pub alpha: u8,
}

/// Palette state threaded through a compositing pass. Built by the
/// cache from its active palette; never global.
pub struct ColorCtx<'a> {
    pub palette: &'a Palette,
    pub lut: &'a ColorLut,
    pub chroma_key: u8,
}

/// Per-column parameters computed once per patch.
pub struct ColumnParams<'a> {
    /// Source rows advanced per destination row (16.16).
    pub y_frac_step: Fixed,
    /// Destination rows per source row (16.16).
    pub scale_y: Fixed,
    pub flip: ColumnFlip,
    pub placement: Option<Placement>,
    /// Cut holes where 8-bit source texels equal the chroma key.
    pub chroma_keyed: bool,
    pub colormap: Option<&'a Colormap>,
}

impl ColumnParams<'_> {
    fn origin_y(&self) -> i32 {
        self.placement.map_or(0, |p| p.origin_y)
    }

    fn blend(&self) -> Option<(BlendStyle, u8)> {
        match self.placement {
            Some(p) if p.style.reads_destination() => Some((p.style, p.alpha)),
            _ => None,
        }
    }
}

/// Composites one source column into destination column `dest_x`.
///
/// `patch_height` is the source patch's height in rows, needed to
/// mirror post offsets for [`ColumnFlip::Flipped`].
pub fn composite_column(
    block: &mut PixelBlock,
    dest_x: u32,
    column: Column<'_>,
    depth: SourceDepth,
    patch_height: i32,
    params: &ColumnParams<'_>,
    ctx: &ColorCtx<'_>,
) {
    if dest_x >= block.width() {
        return;
    }
    let bpp = block.format().bytes_per_pixel();
    let block_height = block.height() as i32;
    let stride = block.stride();
    let base = dest_x as usize * bpp;
    let pixel_size = depth.pixel_size();

    for post in column.posts() {
        let length = post.length as i32;
        if length <= 0 {
            continue;
        }
        let top = match params.flip {
            ColumnFlip::Normal => post.top,
            ColumnFlip::Flipped => patch_height - length - post.top,
        };

        let mut count = scale_round(length, params.scale_y);
        let mut position = params.origin_y() + top;
        let mut y_frac: Fixed = match params.flip {
            ColumnFlip::Normal => 0,
            ColumnFlip::Flipped => (length - 1) << FRACBITS,
        };

        if position < 0 {
            // Rows above the block: advance the source cursor by the
            // clipped amount and shrink the output run.
            match params.flip {
                ColumnFlip::Normal => y_frac = -position << FRACBITS,
                ColumnFlip::Flipped => y_frac += position << FRACBITS,
            }
            count += scale_round(position, params.scale_y);
            position = 0;
        }

        let mut position = scale_round(position, params.scale_y);
        if position < 0 {
            position = 0;
        }
        if position + count >= block_height {
            count = block_height - position;
        }

        let mut offset = base + position as usize * stride;
        while count > 0 {
            count -= 1;
            let src_row = min((y_frac >> FRACBITS).max(0), length - 1) as usize;
            let px = &post.pixels[src_row * pixel_size..(src_row + 1) * pixel_size];
            write_texel(block.bytes_mut(), offset, bpp, px, depth, params, ctx);
            offset += stride;
            match params.flip {
                ColumnFlip::Normal => y_frac += params.y_frac_step,
                ColumnFlip::Flipped => y_frac -= params.y_frac_step,
            }
        }
    }
}

/// Decodes one source texel, applies colormap and depth conversion,
/// blends and writes it at `offset`.
fn write_texel(
    dest: &mut [u8],
    offset: usize,
    bpp: usize,
    px: &[u8],
    depth: SourceDepth,
    params: &ColumnParams<'_>,
    ctx: &ColorCtx<'_>,
) {
    let mut texel: u8 = 0;
    let mut alpha: u8 = 0xFF;
    let mut rgba = Rgba::default();

    match depth {
        SourceDepth::Bpp32 => {
            rgba = Rgba::from_bytes(px);
            alpha = rgba.a;
            if bpp < 4 {
                texel = ctx.lut.nearest(rgba.r, rgba.g, rgba.b);
            }
        }
        SourceDepth::Bpp16 => {
            texel = px[0];
            alpha = px[1];
        }
        SourceDepth::Bpp8 => {
            texel = px[0];
            if params.chroma_keyed && texel == ctx.chroma_key {
                alpha = 0;
            }
        }
    }

    if let Some(colormap) = params.colormap {
        match depth {
            SourceDepth::Bpp32 => {
                remap_rgba(&mut rgba, (bpp < 4).then_some(&mut texel), colormap, ctx)
            }
            _ => texel = colormap.remap(texel),
        }
    }

    // palette-indexed source headed for a true-color destination
    if depth != SourceDepth::Bpp32 && bpp == 4 {
        rgba = ctx.palette.color(texel);
    }

    let blend = params.blend();
    match bpp {
        2 => {
            if let Some((style, blend_alpha)) = blend {
                texel = blend_palette_indexes(
                    dest[offset],
                    texel,
                    style,
                    blend_alpha,
                    ctx.palette,
                    ctx.lut,
                );
            }
            dest[offset] = texel;
            dest[offset + 1] = alpha;
        }
        4 => {
            let mut color = rgba.with_alpha(alpha);
            if let Some((style, blend_alpha)) = blend {
                let background = Rgba::from_bytes(&dest[offset..offset + 4]);
                color = blend_pixel(background, color, style, blend_alpha);
            }
            dest[offset..offset + 4].copy_from_slice(&color.to_bytes());
        }
        _ => {
            if let Some((style, blend_alpha)) = blend {
                texel = blend_palette_indexes(
                    dest[offset],
                    texel,
                    style,
                    blend_alpha,
                    ctx.palette,
                    ctx.lut,
                );
            }
            dest[offset] = texel;
        }
    }
}

/// Colormap remapping for true-color texels: finds the palette entry
/// with the texel's RGB, substitutes the remapped entry's color, and
/// preserves the texel's own translucency unless an index is also
/// wanted for a palettized destination.
fn remap_rgba(
    rgba: &mut Rgba,
    texel: Option<&mut u8>,
    colormap: &Colormap,
    ctx: &ColorCtx<'_>,
) {
    for i in 0..=255u8 {
        if !ctx.palette.color(i).rgb_eq(*rgba) {
            continue;
        }
        let mapped = ctx.palette.color(colormap.remap(i));
        match texel {
            Some(texel) => {
                *texel = ctx.lut.nearest(mapped.r, mapped.g, mapped.b);
                *rgba = mapped;
            }
            None => *rgba = mapped.with_alpha(rgba.a),
        }
        return;
    }
}
