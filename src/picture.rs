//! Raw (row-encoded) picture lumps, flats and fade masks.
//!
//! These formats have no holes and no column structure:
//!
//! - a raw picture is an 8-byte header (`width:i16le, zero:u8, mode:u8,
//!   height:i16le, reserved:i16le`) followed by row-major pixel data at
//!   the mode's depth
//! - a flat is headerless square 8-bit pixel data, its side inferred
//!   from the lump size
//! - a fade mask is headerless 8-bit data at one of four fixed screen
//!   ratios, consumed purely as an alpha channel

use thiserror::Error;

use crate::color::Palette;
use crate::composite::{Fixed, FRACBITS, FRACUNIT};
use crate::formats::PixelFormat;
use crate::mip::PixelBlock;

const PIC_HEADER_LEN: usize = 8;

/// Pixel encoding of a raw picture lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicMode {
    /// 8-bit palette indexes.
    Palette,
    /// 8-bit intensity.
    Intensity,
    /// Intensity low byte, alpha high byte.
    IntensityAlpha,
    /// 24-bit r,g,b. Recognized but not rendered; the block keeps its
    /// background.
    Rgb24,
    /// 32-bit r,g,b,a.
    Rgba32,
}

impl PicMode {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PicMode::Palette),
            1 => Some(PicMode::Intensity),
            2 => Some(PicMode::IntensityAlpha),
            3 => Some(PicMode::Rgb24),
            4 => Some(PicMode::Rgba32),
            _ => None,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PicMode::Palette | PicMode::Intensity => 1,
            PicMode::IntensityAlpha => 2,
            PicMode::Rgb24 => 3,
            PicMode::Rgba32 => 4,
        }
    }

    /// The block format a picture of this mode composites into.
    /// Palette pictures follow the configured texture format; the rest
    /// dictate their own.
    pub fn block_format(self, palette_format: PixelFormat) -> PixelFormat {
        match self {
            PicMode::Palette => palette_format,
            PicMode::Intensity => PixelFormat::Intensity8,
            PicMode::IntensityAlpha => PixelFormat::IntensityAlpha16,
            PicMode::Rgb24 | PicMode::Rgba32 => PixelFormat::Rgba32,
        }
    }
}

/// Malformed picture or mask lumps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PictureError {
    #[error("picture lump truncated: {got} bytes, need at least {need}")]
    Truncated { got: usize, need: usize },
    #[error("unknown picture mode {0}")]
    BadMode(u8),
    #[error("picture has non-positive dimensions {width}x{height}")]
    BadDimensions { width: i16, height: i16 },
    #[error("fade mask lump of unrecognized size {0}")]
    BadMaskSize(usize),
}

/// Zero-copy view over one raw picture lump.
#[derive(Debug, Clone, Copy)]
pub struct RawPic<'a> {
    mode: PicMode,
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> RawPic<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PictureError> {
        if bytes.len() < PIC_HEADER_LEN {
            return Err(PictureError::Truncated { got: bytes.len(), need: PIC_HEADER_LEN });
        }
        let width = i16::from_le_bytes([bytes[0], bytes[1]]);
        let mode = PicMode::from_byte(bytes[3]).ok_or(PictureError::BadMode(bytes[3]))?;
        let height = i16::from_le_bytes([bytes[4], bytes[5]]);
        if width <= 0 || height <= 0 {
            return Err(PictureError::BadDimensions { width, height });
        }
        let data = &bytes[PIC_HEADER_LEN..];
        let need = width as usize * height as usize * mode.bytes_per_pixel();
        if data.len() < need {
            return Err(PictureError::Truncated {
                got: bytes.len(),
                need: PIC_HEADER_LEN + need,
            });
        }
        Ok(Self { mode, width: width as u32, height: height as u32, data })
    }

    pub fn mode(&self) -> PicMode {
        self.mode
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Resamples a raw picture into a block of the given format and size.
///
/// When the destination matches the source exactly (same dimensions,
/// same texel width), the rows are copied straight through.
pub fn composite_pic(
    pic: &RawPic<'_>,
    format: PixelFormat,
    block_w: u32,
    block_h: u32,
    palette: &Palette,
) -> PixelBlock {
    let src_bpp = pic.mode.bytes_per_pixel();
    let dest_bpp = format.bytes_per_pixel();
    let exact = pic.width as usize * pic.height as usize * src_bpp;

    if block_w == pic.width && block_h == pic.height && src_bpp == dest_bpp {
        return PixelBlock::from_raw(format, block_w, block_h, pic.data[..exact].to_vec());
    }

    let mut block = PixelBlock::new_background(format, block_w, block_h, 0);
    let step_x: Fixed = ((pic.width as i32) << FRACBITS) / block_w as i32;
    let step_y: Fixed = ((pic.height as i32) << FRACBITS) / block_h as i32;
    let src_stride = pic.width as usize * src_bpp;
    let dest_stride = block.stride();

    let mut pos_y: Fixed = 0;
    for j in 0..block_h as usize {
        let src_row = &pic.data[(pos_y >> FRACBITS) as usize * src_stride..];
        let dest_at = j * dest_stride;
        let mut pos_x: Fixed = 0;
        for i in 0..block_w as usize {
            // the half-unit bias can round one past the last source
            // column when upscaling
            let s = (((pos_x + FRACUNIT / 2) >> FRACBITS) as usize).min(pic.width as usize - 1);
            let dest = &mut block.bytes_mut()[dest_at + i * dest_bpp..];
            match pic.mode {
                PicMode::Palette => {
                    let texel = src_row[s];
                    match dest_bpp {
                        1 => dest[0] = texel,
                        2 => {
                            dest[0] = texel;
                            dest[1] = 0xFF;
                        }
                        _ => dest[..4].copy_from_slice(&palette.color(texel).to_bytes()),
                    }
                }
                PicMode::Intensity => dest[0] = src_row[s],
                PicMode::IntensityAlpha => dest[..2].copy_from_slice(&src_row[s * 2..s * 2 + 2]),
                PicMode::Rgb24 => {}
                PicMode::Rgba32 => dest[..4].copy_from_slice(&src_row[s * 4..s * 4 + 4]),
            }
            pos_x += step_x;
        }
        pos_y += step_y;
    }
    block
}

/// Flat side length from the lump size. Unrecognized sizes fall back
/// to the classic 64x64.
pub fn flat_dimensions(lump_size: usize) -> (u32, u32) {
    let side = match lump_size {
        4194304 => 2048,
        1048576 => 1024,
        262144 => 512,
        65536 => 256,
        16384 => 128,
        1024 => 32,
        _ => 64,
    };
    (side, side)
}

/// Fade masks come at four fixed sizes only.
pub fn fade_mask_dimensions(lump_size: usize) -> Result<(u32, u32), PictureError> {
    match lump_size {
        256000 => Ok((640, 400)),
        64000 => Ok((320, 200)),
        16000 => Ok((160, 100)),
        4000 => Ok((80, 50)),
        other => Err(PictureError::BadMaskSize(other)),
    }
}

/// Converts a fade mask's palette indexes into an alpha-only block:
/// each texel's alpha is the red level of its palette color.
pub fn composite_fade_mask(
    bytes: &[u8],
    palette: &Palette,
) -> Result<PixelBlock, PictureError> {
    let (width, height) = fade_mask_dimensions(bytes.len())?;
    let mut block = PixelBlock::new_background(PixelFormat::Alpha8, width, height, 0);
    for (dest, &texel) in block.bytes_mut().iter_mut().zip(bytes) {
        *dest = palette.color(texel).r;
    }
    Ok(block)
}
