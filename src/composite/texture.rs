//! Assembly of composite textures from placed patches.
//!
//! A composite texture is a canvas the size of its definition, filled
//! with the background (chroma key for palette formats) and then
//! layered with each placed patch in definition order. Placement may
//! hang patches off any edge; out-of-bounds spans are clipped, and a
//! patch entirely outside the canvas is rejected up front.

use log::warn;

use super::column::{composite_column, ColorCtx, ColumnFlip, ColumnParams, Placement};
use super::{Fixed, FRACBITS, FRACUNIT};
use crate::formats::PixelFormat;
use crate::mip::{Colormap, MipFlags, PixelBlock};
use crate::models::{CompositeTexture, PatchPlacement};
use crate::patch::{Patch, PatchError};

/// Layers one placed patch into a texture's block.
///
/// `tex_w`/`tex_h` are the texture's nominal dimensions; the block may
/// be a different size, in which case the patch is resampled by the
/// block-to-texture ratio on both axes.
pub fn draw_texture_patch(
    block: &mut PixelBlock,
    tex_w: i32,
    tex_h: i32,
    placement: &PatchPlacement,
    patch: &Patch<'_>,
    chroma_keyed: bool,
    ctx: &ColorCtx<'_>,
) -> Result<(), PatchError> {
    if tex_w <= 0 || tex_h <= 0 || block.width() == 0 || block.height() == 0 {
        return Ok(());
    }
    let width = patch.width() as i32;
    let height = patch.height() as i32;

    let x1 = placement.origin_x;
    let x2 = x1 + width;
    if x1 > tex_w || x2 < 0 {
        return Ok(());
    }
    if placement.origin_y > tex_h || placement.origin_y + height < 0 {
        return Ok(());
    }

    // clip against the left and right texture edges
    let x = x1.max(0);
    let x2 = x2.min(tex_w);

    let block_w = block.width() as i32;
    let block_h = block.height() as i32;
    let col = x * block_w / tex_w;
    let ncols = (x2 - x) * block_w / tex_w;

    // columns clipped off the left edge still advance the source
    let mut x_frac: Fixed = if x1 < 0 { -x1 << FRACBITS } else { 0 };
    let x_frac_step = (tex_w << FRACBITS) / block_w;

    let flip = if placement.flip.vertical { ColumnFlip::Flipped } else { ColumnFlip::Normal };
    let params = ColumnParams {
        y_frac_step: (tex_h << FRACBITS) / block_h,
        scale_y: (block_h << FRACBITS) / tex_h,
        flip,
        placement: Some(Placement {
            origin_y: placement.origin_y,
            style: placement.style,
            alpha: placement.alpha,
        }),
        chroma_keyed,
        colormap: None,
    };

    for i in 0..ncols {
        let src = (x_frac >> FRACBITS).clamp(0, width - 1) as usize;
        let src = if placement.flip.horizontal { width as usize - 1 - src } else { src };
        let column = patch.column(src)?;
        composite_column(block, (col + i) as u32, column, patch.depth(), height, &params, ctx);
        x_frac += x_frac_step;
    }
    Ok(())
}

/// Composites a full texture definition into a fresh block.
///
/// `patches` runs parallel to `texture.patches`; a `None` entry is a
/// source the caller could not load, and is skipped (the canvas keeps
/// its background there). A patch whose column data turns out malformed
/// mid-draw is abandoned with a warning, keeping whatever it already
/// contributed.
pub fn composite_texture(
    texture: &CompositeTexture,
    patches: &[Option<Patch<'_>>],
    format: PixelFormat,
    ctx: &ColorCtx<'_>,
) -> (PixelBlock, MipFlags) {
    let sky = texture.is_sky();
    let mut block =
        PixelBlock::new_background(format, texture.width, texture.height, ctx.chroma_key);
    let mut flags = if sky {
        prefill_sky(&mut block, ctx);
        MipFlags::wrap_xy()
    } else {
        MipFlags::chroma_keyed_wrap_xy()
    };

    for (placement, patch) in texture.patches.iter().zip(patches) {
        let Some(patch) = patch else { continue };
        if let Err(err) = draw_texture_patch(
            &mut block,
            texture.width as i32,
            texture.height as i32,
            placement,
            patch,
            flags.chroma_keyed,
            ctx,
        ) {
            warn!("texture {}: abandoning malformed patch: {err}", texture.name);
        }
    }

    if format == PixelFormat::Rgba32 && block.has_transparent_texels() {
        flags.transparent = true;
    }
    (block, flags)
}

/// Composites a standalone patch 1:1 into a block of its own size
/// (sprites, HUD patches and their recolor variants).
pub fn composite_patch(
    patch: &Patch<'_>,
    format: PixelFormat,
    chroma_keyed: bool,
    colormap: Option<&Colormap>,
    ctx: &ColorCtx<'_>,
) -> Result<PixelBlock, PatchError> {
    let width = patch.width();
    let height = patch.height();
    let mut block = PixelBlock::new_background(format, width, height, ctx.chroma_key);
    let params = ColumnParams {
        y_frac_step: FRACUNIT,
        scale_y: FRACUNIT,
        flip: ColumnFlip::Normal,
        placement: None,
        chroma_keyed,
        colormap,
    };
    for x in 0..width {
        let column = patch.column(x as usize)?;
        composite_column(&mut block, x, column, patch.depth(), height as i32, &params, ctx);
    }
    Ok(block)
}

/// Sky canvases show the chroma-key color instead of cutting it, so
/// the background prefill is the key color at full alpha.
fn prefill_sky(block: &mut PixelBlock, ctx: &ColorCtx<'_>) {
    let key = ctx.chroma_key;
    match block.format() {
        PixelFormat::Palette8 | PixelFormat::Intensity8 => block.bytes_mut().fill(key),
        PixelFormat::IntensityAlpha16 => {
            for texel in block.bytes_mut().chunks_exact_mut(2) {
                texel[0] = key;
                texel[1] = 0xFF;
            }
        }
        PixelFormat::Rgba32 => {
            let color = ctx.palette.color(key).to_bytes();
            for texel in block.bytes_mut().chunks_exact_mut(4) {
                texel.copy_from_slice(&color);
            }
        }
        PixelFormat::Alpha8 => block.bytes_mut().fill(0xFF),
    }
}
