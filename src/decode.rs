//! Alternate-format source detection and conversion.
//!
//! Asset archives may carry PNG data where a run-length patch is
//! expected. Rather than teach the compositor a second source format,
//! a detected PNG is decoded and re-encoded as a 32-bit patch, after
//! which the normal column path applies. Fully transparent PNG pixels
//! become holes (absent from any post).

use thiserror::Error;

use crate::patch::{PatchBuilder, SourceDepth};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.len() >= PNG_SIGNATURE.len() && bytes[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("png decode failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Decodes PNG bytes and re-encodes them as a 32-bit patch lump.
pub fn png_to_patch(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
    let mut builder = PatchBuilder::new(img.width(), img.height(), SourceDepth::Bpp32);
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[3] != 0 {
            builder.set_rgba(x, y, pixel.0);
        }
    }
    Ok(builder.build())
}
