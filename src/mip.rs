//! Cached image entries and their pixel blocks.
//!
//! A [`MipEntry`] is one GPU-bindable image variant. Its CPU-side pixels
//! live in a [`PixelBlock`] whose ownership is explicit: freshly
//! generated blocks are `Owned`, and after upload they are demoted to a
//! `Cached` weak handle parked in the reclaim pool. Dereferencing a weak
//! handle checks liveness; a dead handle means the allocator reclaimed
//! the block and the entry must be regenerated before any further read.

use std::sync::{Arc, Weak};

use crate::color::Rgba;
use crate::formats::PixelFormat;

/// Opaque id of a texture resident on the GPU, issued by the upload
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Flags describing how a cached image is sampled and blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MipFlags {
    pub wrap_x: bool,
    pub wrap_y: bool,
    /// Treat the chroma-key palette index as fully transparent.
    pub chroma_keyed: bool,
    /// Set after compositing when any texel ended up with zero alpha,
    /// so draw calls can pick the right blending.
    pub transparent: bool,
}

impl MipFlags {
    pub const fn wrap_xy() -> Self {
        Self { wrap_x: true, wrap_y: true, chroma_keyed: false, transparent: false }
    }

    pub const fn chroma_keyed_wrap_xy() -> Self {
        Self { wrap_x: true, wrap_y: true, chroma_keyed: true, transparent: false }
    }
}

/// A 256-entry palette-index remap table (team colors and similar
/// recolors). Variant caching keys on the *handle* (`Arc` pointer
/// identity), not on table contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
    map: [u8; 256],
}

impl Colormap {
    pub fn new(map: [u8; 256]) -> Self {
        Self { map }
    }

    /// The identity remap.
    pub fn identity() -> Self {
        let mut map = [0u8; 256];
        for (i, m) in map.iter_mut().enumerate() {
            *m = i as u8;
        }
        Self { map }
    }

    pub fn remap(&self, index: u8) -> u8 {
        self.map[index as usize]
    }
}

/// A flat, row-major pixel buffer: `width * height * bpp` bytes, row
/// stride `width * bpp`. Written once by the compositor, then read-only
/// until a full regeneration replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBlock {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBlock {
    /// An all-background block: palette formats are filled with the
    /// chroma-key index (16-bit additionally gets alpha 0), true-color
    /// and alpha-only formats with zeroes.
    pub fn new_background(format: PixelFormat, width: u32, height: u32, chroma_key: u8) -> Self {
        let texels = (width * height) as usize;
        let data = match format {
            PixelFormat::Palette8 => vec![chroma_key; texels],
            PixelFormat::IntensityAlpha16 => {
                let mut data = vec![0u8; texels * 2];
                for texel in data.chunks_exact_mut(2) {
                    texel[0] = chroma_key;
                }
                data
            }
            PixelFormat::Rgba32 => vec![0u8; texels * 4],
            PixelFormat::Alpha8 | PixelFormat::Intensity8 => vec![0u8; texels],
        };
        Self { format, width, height, data }
    }

    /// Wraps raw bytes that are already in `format` at the given size.
    /// Panics if the byte count disagrees with the dimensions; callers
    /// validate lump sizes first.
    pub fn from_raw(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height) as usize * format.bytes_per_pixel(),
            "pixel data does not match dimensions"
        );
        Self { format, width, height, data }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The texel at (x, y) as raw bytes.
    pub fn texel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let at = y as usize * self.stride() + x as usize * bpp;
        &self.data[at..at + bpp]
    }

    /// The texel at (x, y) decoded as RGBA. Only meaningful for
    /// `Rgba32` blocks; used by hole scanning and tests.
    pub fn texel_rgba(&self, x: u32, y: u32) -> Rgba {
        Rgba::from_bytes(self.texel(x, y))
    }

    /// True when any texel carries zero alpha (only alpha-carrying
    /// formats can answer yes).
    pub fn has_transparent_texels(&self) -> bool {
        match self.format {
            PixelFormat::Rgba32 => self.data.chunks_exact(4).any(|t| t[3] == 0),
            PixelFormat::IntensityAlpha16 => self.data.chunks_exact(2).any(|t| t[1] == 0),
            PixelFormat::Alpha8 => self.data.iter().any(|&a| a == 0),
            PixelFormat::Palette8 | PixelFormat::Intensity8 => false,
        }
    }
}

/// Ownership state of an entry's CPU-side pixels.
///
/// `Owned` pins the block (it cannot be reclaimed); `Cached` is a weak
/// handle whose block the reclaim pool may drop between frames. Never
/// hold the inner `Arc` across a call that can purge the pool.
#[derive(Debug, Clone, Default)]
pub enum BlockSlot {
    #[default]
    Absent,
    Owned(Arc<PixelBlock>),
    Cached(Weak<PixelBlock>),
}

impl BlockSlot {
    /// The block, if still alive.
    pub fn live(&self) -> Option<Arc<PixelBlock>> {
        match self {
            BlockSlot::Absent => None,
            BlockSlot::Owned(block) => Some(Arc::clone(block)),
            BlockSlot::Cached(weak) => weak.upgrade(),
        }
    }
}

/// One cached, GPU-bindable image variant.
#[derive(Debug, Clone, Default)]
pub struct MipEntry {
    pub format: Option<PixelFormat>,
    pub width: u32,
    pub height: u32,
    pub flags: MipFlags,
    /// Which recolor variant this is; `None` is the base image.
    pub colormap: Option<Arc<Colormap>>,
    pub slot: BlockSlot,
    pub handle: Option<TextureHandle>,
}

impl MipEntry {
    /// Absent / CPU-resident / GPU-resident, per the state machine:
    /// an entry with a dead weak slot counts as absent even while its
    /// GPU copy survives, and must be regenerated before any read.
    pub fn cpu_resident(&self) -> bool {
        self.slot.live().is_some()
    }

    pub fn gpu_resident(&self) -> bool {
        self.handle.is_some()
    }

    /// Takes a freshly generated block (pinned until upload).
    pub fn adopt(&mut self, block: PixelBlock) -> Arc<PixelBlock> {
        self.width = block.width();
        self.height = block.height();
        self.format = Some(block.format());
        let block = Arc::new(block);
        self.slot = BlockSlot::Owned(Arc::clone(&block));
        block
    }

    /// Drops CPU pixels and GPU residency both (full invalidation).
    pub fn reset(&mut self) {
        self.slot = BlockSlot::Absent;
        self.handle = None;
    }
}
