//! Blend styles for patches layered into a composite texture.

use serde::{Deserialize, Serialize};

use crate::color::{ColorLut, Palette, Rgba};

/// How a patch's pixels combine with what is already in the block.
///
/// `Copy` replaces; everything else mixes against the existing
/// destination contents using the patch's constant alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendStyle {
    /// Overwrite the destination (z-order occlusion, no mixing).
    #[default]
    Copy,
    /// Classic alpha blend: result moves from background toward
    /// foreground by `alpha * foreground.a / 255`.
    Translucent,
    /// Additive: result = min(255, base + fg * amount)
    Add,
    /// Subtractive: result = max(0, base - fg * amount)
    Subtract,
    /// Reverse subtractive: result = max(0, fg * amount - base)
    ReverseSubtract,
    /// Multiplicative: result = base * fg / 255, alpha ignored
    Modulate,
}

impl BlendStyle {
    /// Blend styles other than `Copy` read the destination back.
    pub fn reads_destination(self) -> bool {
        self != BlendStyle::Copy
    }
}

/// Blends one foreground texel over an already-composited background
/// texel. The background is texture content and treated as opaque; the
/// result keeps the background's alpha except where the style dictates
/// otherwise.
pub fn blend_pixel(background: Rgba, foreground: Rgba, style: BlendStyle, alpha: u8) -> Rgba {
    match style {
        BlendStyle::Copy => foreground,
        BlendStyle::Translucent => {
            let amount = mul255(alpha, foreground.a);
            Rgba::new(
                lerp(background.r, foreground.r, amount),
                lerp(background.g, foreground.g, amount),
                lerp(background.b, foreground.b, amount),
                background.a.max(amount),
            )
        }
        BlendStyle::Add => {
            let amount = mul255(alpha, foreground.a);
            Rgba::new(
                background.r.saturating_add(mul255(foreground.r, amount)),
                background.g.saturating_add(mul255(foreground.g, amount)),
                background.b.saturating_add(mul255(foreground.b, amount)),
                background.a,
            )
        }
        BlendStyle::Subtract => {
            let amount = mul255(alpha, foreground.a);
            Rgba::new(
                background.r.saturating_sub(mul255(foreground.r, amount)),
                background.g.saturating_sub(mul255(foreground.g, amount)),
                background.b.saturating_sub(mul255(foreground.b, amount)),
                background.a,
            )
        }
        BlendStyle::ReverseSubtract => {
            let amount = mul255(alpha, foreground.a);
            Rgba::new(
                mul255(foreground.r, amount).saturating_sub(background.r),
                mul255(foreground.g, amount).saturating_sub(background.g),
                mul255(foreground.b, amount).saturating_sub(background.b),
                background.a,
            )
        }
        BlendStyle::Modulate => Rgba::new(
            mul255(background.r, foreground.r),
            mul255(background.g, foreground.g),
            mul255(background.b, foreground.b),
            background.a,
        ),
    }
}

/// Blends two palette indexes by blending their palette colors and
/// snapping the result back to the nearest index.
pub fn blend_palette_indexes(
    background: u8,
    foreground: u8,
    style: BlendStyle,
    alpha: u8,
    palette: &Palette,
    lut: &ColorLut,
) -> u8 {
    if style == BlendStyle::Copy {
        return foreground;
    }
    let blended = blend_pixel(palette.color(background), palette.color(foreground), style, alpha);
    lut.nearest(blended.r, blended.g, blended.b)
}

fn mul255(a: u8, b: u8) -> u8 {
    ((a as u16 * b as u16) / 255) as u8
}

fn lerp(from: u8, to: u8, amount: u8) -> u8 {
    let from = from as i32;
    let to = to as i32;
    (from + (to - from) * amount as i32 / 255) as u8
}
