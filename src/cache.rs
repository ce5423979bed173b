//! The cache manager: one context object owning every cached entry.
//!
//! A [`TextureCache`] is constructed per renderer session and threaded
//! through explicitly; there is no process-wide state. It holds three
//! directories: the map texture table (composite textures by index),
//! its flat-rendered twin, and a per-lump table for standalone patches,
//! flats, raw pictures and fade masks, each with its recolor variants.
//!
//! Every getter follows the same state machine: regenerate the CPU
//! block if it is absent or was reclaimed, upload if the GPU has no
//! copy yet, bind, then park the block in the reclaim pool. A dead
//! weak handle always means regeneration, even while the GPU copy is
//! still valid; recompositing is idempotent, so correctness wins over
//! the wasted work.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use thiserror::Error;

use crate::color::{ColorLut, Palette, CHROMA_KEY_INDEX};
use crate::composite::texture::{composite_patch, composite_texture};
use crate::composite::ColorCtx;
use crate::decode::{is_png, png_to_patch, DecodeError};
use crate::formats::PixelFormat;
use crate::memory::{ReclaimPool, ReclaimTag};
use crate::mip::{BlockSlot, Colormap, MipEntry, MipFlags, PixelBlock, TextureHandle};
use crate::models::CompositeTexture;
use crate::patch::{Patch, PatchError, SourceDepth};
use crate::picture::{composite_fade_mask, composite_pic, flat_dimensions, PicMode, PictureError, RawPic};
use crate::store::{AssetStore, LumpId, StoreError};
use crate::upload::{GpuUploader, UploadDesc};

/// Pixel formats the cache composites into. Palette formats keep
/// blocks small and defer coloring to the driver; 32-bit formats bake
/// the palette into the texels (and so must be recomposited on every
/// palette change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Format for composite textures, flats and raw palette pictures.
    pub texture_format: PixelFormat,
    /// Format for standalone patches and their recolor variants.
    pub patch_format: PixelFormat,
    /// Palette index treated as transparent under chroma keying.
    pub chroma_key: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            texture_format: PixelFormat::Palette8,
            patch_format: PixelFormat::IntensityAlpha16,
            chroma_key: CHROMA_KEY_INDEX,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Picture(#[from] PictureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("texture index {index} out of range, directory has {count}")]
    TextureOutOfRange { index: usize, count: usize },
}

/// Per-lump cache slot: the base image plus its recolor variants.
/// Variants are keyed by colormap handle identity and searched
/// linearly; the set is bounded by distinct recolors in view, so a
/// vector beats a map here.
#[derive(Debug, Default)]
struct LumpEntry {
    base: MipEntry,
    variants: Vec<MipEntry>,
}

pub struct TextureCache {
    config: CacheConfig,
    palette: Palette,
    lut: ColorLut,
    textures: Vec<CompositeTexture>,
    map_textures: Vec<MipEntry>,
    map_flats: Vec<MipEntry>,
    lumps: HashMap<LumpId, LumpEntry>,
    pool: ReclaimPool,
}

impl TextureCache {
    pub fn new(config: CacheConfig, palette: Palette) -> Self {
        let lut = ColorLut::build(&palette);
        Self {
            config,
            palette,
            lut,
            textures: Vec::new(),
            map_textures: Vec::new(),
            map_flats: Vec::new(),
            lumps: HashMap::new(),
            pool: ReclaimPool::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Bytes held by reclaimable CPU copies.
    pub fn parked_bytes(&self) -> usize {
        self.pool.bytes()
    }

    pub fn texture_entry(&self, index: usize) -> Option<&MipEntry> {
        self.map_textures.get(index)
    }

    pub fn lump_entry(&self, lump: LumpId) -> Option<&MipEntry> {
        self.lumps.get(&lump).map(|e| &e.base)
    }

    pub fn variant_count(&self, lump: LumpId) -> usize {
        self.lumps.get(&lump).map_or(0, |e| e.variants.len())
    }

    /// Installs a level's texture directory, replacing the previous
    /// one. Old GPU copies are deleted and old CPU copies leave the
    /// reclaim pool immediately.
    pub fn load_map_textures(
        &mut self,
        textures: Vec<CompositeTexture>,
        gpu: &mut dyn GpuUploader,
    ) {
        for entry in self.map_textures.drain(..).chain(self.map_flats.drain(..)) {
            if let Some(handle) = entry.handle {
                gpu.delete(handle);
            }
            if let Some(block) = entry.slot.live() {
                self.pool.discard(&block);
            }
        }
        let count = textures.len();
        self.textures = textures;
        self.map_textures = vec![MipEntry::default(); count];
        self.map_flats = vec![MipEntry::default(); count];
    }

    /// Makes texture `index` GPU-resident and binds it.
    pub fn get_texture(
        &mut self,
        index: usize,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let count = self.textures.len();
        if index >= count {
            return Err(CacheError::TextureOutOfRange { index, count });
        }
        let ctx = ColorCtx {
            palette: &self.palette,
            lut: &self.lut,
            chroma_key: self.config.chroma_key,
        };
        let entry = &mut self.map_textures[index];
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let (block, flags) =
                    load_texture_block(&self.textures[index], self.config.texture_format, store, &ctx);
                entry.flags = flags;
                entry.adopt(block)
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// Like [`get_texture`](Self::get_texture), but composited as an
    /// 8-bit flat (floor/ceiling rendering of wall textures).
    pub fn get_texture_flat(
        &mut self,
        index: usize,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let count = self.textures.len();
        if index >= count {
            return Err(CacheError::TextureOutOfRange { index, count });
        }
        let ctx = ColorCtx {
            palette: &self.palette,
            lut: &self.lut,
            chroma_key: self.config.chroma_key,
        };
        let entry = &mut self.map_flats[index];
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let (block, flags) =
                    load_texture_block(&self.textures[index], PixelFormat::Palette8, store, &ctx);
                entry.flags = flags;
                entry.adopt(block)
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// A raw flat lump: headerless square 8-bit data, side inferred
    /// from the lump size. Short lumps are padded with the chroma key.
    pub fn get_flat(
        &mut self,
        lump: LumpId,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let entry = &mut self.lumps.entry(lump).or_default().base;
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let bytes = store.lump(lump)?;
                let (width, height) = flat_dimensions(bytes.len());
                let mut data = bytes.to_vec();
                data.resize((width * height) as usize, self.config.chroma_key);
                entry.flags = MipFlags::chroma_keyed_wrap_xy();
                entry.adopt(PixelBlock::from_raw(PixelFormat::Palette8, width, height, data))
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// A standalone patch (sprite, HUD element) in its base colors.
    pub fn get_patch(
        &mut self,
        lump: LumpId,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let ctx = ColorCtx {
            palette: &self.palette,
            lut: &self.lut,
            chroma_key: self.config.chroma_key,
        };
        let entry = &mut self.lumps.entry(lump).or_default().base;
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let (block, flags) =
                    load_patch_block(lump, self.config.patch_format, None, store, &ctx)?;
                entry.flags = flags;
                entry.adopt(block)
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// A patch recolored through `colormap`. Passing `None` is exactly
    /// [`get_patch`](Self::get_patch) and never creates a variant.
    /// Variants are cached per colormap *handle*: the same `Arc` passed
    /// twice reuses its entry, equal contents behind different handles
    /// do not.
    pub fn get_mapped_patch(
        &mut self,
        lump: LumpId,
        colormap: Option<&Arc<Colormap>>,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let Some(colormap) = colormap else {
            return self.get_patch(lump, store, gpu);
        };
        let ctx = ColorCtx {
            palette: &self.palette,
            lut: &self.lut,
            chroma_key: self.config.chroma_key,
        };
        let entry = self.lumps.entry(lump).or_default();
        let index = match entry
            .variants
            .iter()
            .position(|v| v.colormap.as_ref().is_some_and(|c| Arc::ptr_eq(c, colormap)))
        {
            Some(index) => index,
            None => {
                entry.variants.push(MipEntry {
                    colormap: Some(Arc::clone(colormap)),
                    ..MipEntry::default()
                });
                entry.variants.len() - 1
            }
        };
        let variant = &mut entry.variants[index];
        let block = match variant.slot.live() {
            Some(block) => block,
            None => {
                let (block, flags) = load_patch_block(
                    lump,
                    self.config.patch_format,
                    Some(colormap.as_ref()),
                    store,
                    &ctx,
                )?;
                variant.flags = flags;
                variant.adopt(block)
            }
        };
        Ok(finish_entry(variant, block, &mut self.pool, gpu))
    }

    /// A raw row-encoded picture. Its mode dictates the block format,
    /// except palette pictures, which follow the configured texture
    /// format.
    pub fn get_raw_picture(
        &mut self,
        lump: LumpId,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let entry = &mut self.lumps.entry(lump).or_default().base;
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let bytes = store.lump(lump)?;
                let pic = RawPic::parse(bytes)?;
                if pic.mode() == PicMode::Rgb24 {
                    warn!("{lump}: 24-bit picture data is not rendered");
                }
                let format = pic.mode().block_format(self.config.texture_format);
                let block = composite_pic(&pic, format, pic.width(), pic.height(), &self.palette);
                entry.flags = MipFlags::default();
                entry.adopt(block)
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// A screen-wipe fade mask, converted to an alpha-only block. A
    /// lump of unrecognized size is reported and skipped.
    pub fn get_fade_mask(
        &mut self,
        lump: LumpId,
        store: &dyn AssetStore,
        gpu: &mut dyn GpuUploader,
    ) -> Result<TextureHandle, CacheError> {
        let entry = &mut self.lumps.entry(lump).or_default().base;
        let block = match entry.slot.live() {
            Some(block) => block,
            None => {
                let bytes = store.lump(lump)?;
                let block = match composite_fade_mask(bytes, &self.palette) {
                    Ok(block) => block,
                    Err(err) => {
                        warn!("fade mask {lump} ignored: {err}");
                        return Err(err.into());
                    }
                };
                entry.flags = MipFlags::default();
                entry.adopt(block)
            }
        };
        Ok(finish_entry(entry, block, &mut self.pool, gpu))
    }

    /// Full teardown: every directory, variant, CPU copy and GPU copy
    /// goes away.
    pub fn invalidate_all(&mut self, gpu: &mut dyn GpuUploader) {
        gpu.clear_all();
        self.textures.clear();
        self.map_textures.clear();
        self.map_flats.clear();
        self.lumps.clear();
        self.pool.purge_all();
    }

    /// Level end: recolor variants are level-scoped, base entries are
    /// not. Frees every variant and nothing else.
    pub fn invalidate_colormaps_only(&mut self, gpu: &mut dyn GpuUploader) {
        for entry in self.lumps.values_mut() {
            for variant in entry.variants.drain(..) {
                if let Some(handle) = variant.handle {
                    gpu.delete(handle);
                }
            }
        }
    }

    /// Installs a new palette. Palettized formats only need the driver
    /// told; 32-bit formats bake palette colors into texels, so every
    /// entry is dropped for recompositing on next reference. The
    /// driver is expected to flush its own texture objects when its
    /// palette changes.
    pub fn set_palette(&mut self, palette: Palette, gpu: &mut dyn GpuUploader) {
        gpu.set_palette(&palette);
        self.lut = ColorLut::build(&palette);
        self.palette = palette;

        if self.config.texture_format == PixelFormat::Rgba32
            || self.config.patch_format == PixelFormat::Rgba32
        {
            self.pool.purge_all();
            for entry in self.map_textures.iter_mut().chain(self.map_flats.iter_mut()) {
                entry.reset();
            }
            for entry in self.lumps.values_mut() {
                entry.base.reset();
                for variant in &mut entry.variants {
                    variant.reset();
                }
            }
        }
    }

    /// End-of-frame tick: CPU copies idle for a full frame are freed,
    /// everything else becomes purgeable next time.
    pub fn unlock_frame(&mut self) {
        self.pool.purge(ReclaimTag::Unlocked);
        self.pool.demote_all();
    }
}

/// Uploads if the GPU has no copy, binds, and parks the CPU block in
/// the reclaim pool.
fn finish_entry(
    entry: &mut MipEntry,
    block: Arc<PixelBlock>,
    pool: &mut ReclaimPool,
    gpu: &mut dyn GpuUploader,
) -> TextureHandle {
    let handle = match entry.handle {
        Some(handle) => handle,
        None => {
            let handle = gpu.upload(&UploadDesc {
                format: block.format(),
                width: block.width(),
                height: block.height(),
                flags: entry.flags,
                data: block.bytes(),
            });
            entry.handle = Some(handle);
            handle
        }
    };
    if matches!(entry.slot, BlockSlot::Owned(_)) {
        entry.slot = BlockSlot::Cached(pool.stash(block, ReclaimTag::Reclaimable));
    } else {
        pool.touch(&block);
    }
    gpu.bind(handle);
    handle
}

/// Fetches, converts and composites every patch of one texture
/// definition. Missing or malformed sources are logged and leave
/// background texels; the texture still composites.
fn load_texture_block(
    texture: &CompositeTexture,
    format: PixelFormat,
    store: &dyn AssetStore,
    ctx: &ColorCtx<'_>,
) -> (PixelBlock, MipFlags) {
    let mut buffers: Vec<Option<(Cow<'_, [u8]>, SourceDepth)>> =
        Vec::with_capacity(texture.patches.len());
    for placement in &texture.patches {
        let buffer = match store.lump(placement.source) {
            Ok(bytes) if is_png(bytes) => match png_to_patch(bytes) {
                Ok(converted) => Some((Cow::Owned(converted), SourceDepth::Bpp32)),
                Err(err) => {
                    warn!("texture {}: {}: {err}", texture.name, placement.source);
                    None
                }
            },
            Ok(bytes) => Some((Cow::Borrowed(bytes), SourceDepth::Bpp8)),
            Err(err) => {
                warn!("texture {}: {err}", texture.name);
                None
            }
        };
        buffers.push(buffer);
    }
    let patches: Vec<Option<Patch<'_>>> = buffers
        .iter()
        .map(|buffer| {
            let (bytes, depth) = buffer.as_ref()?;
            match Patch::parse(bytes, *depth) {
                Ok(patch) => Some(patch),
                Err(err) => {
                    warn!("texture {}: malformed patch: {err}", texture.name);
                    None
                }
            }
        })
        .collect();
    composite_texture(texture, &patches, format, ctx)
}

/// Fetches one patch lump (converting PNG sources) and composites it
/// standalone, optionally recolored.
fn load_patch_block(
    lump: LumpId,
    format: PixelFormat,
    colormap: Option<&Colormap>,
    store: &dyn AssetStore,
    ctx: &ColorCtx<'_>,
) -> Result<(PixelBlock, MipFlags), CacheError> {
    let bytes = store.lump(lump)?;
    let (buffer, depth): (Cow<'_, [u8]>, SourceDepth) = if is_png(bytes) {
        (Cow::Owned(png_to_patch(bytes)?), SourceDepth::Bpp32)
    } else {
        (Cow::Borrowed(bytes), SourceDepth::Bpp8)
    };
    let patch = Patch::parse(&buffer, depth)?;
    let block = composite_patch(&patch, format, true, colormap, ctx)?;
    let mut flags = MipFlags { chroma_keyed: true, ..MipFlags::default() };
    if format == PixelFormat::Rgba32 && block.has_transparent_texels() {
        flags.transparent = true;
    }
    Ok((block, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatchFlip, PatchPlacement};
    use crate::composite::BlendStyle;
    use crate::patch::PatchBuilder;
    use crate::store::MemoryStore;
    use crate::upload::RecordingUploader;

    fn solid_patch(w: u32, h: u32, index: u8) -> Vec<u8> {
        let mut builder = PatchBuilder::new(w, h, SourceDepth::Bpp8);
        for x in 0..w {
            for y in 0..h {
                builder.set_index(x, y, index);
            }
        }
        builder.build()
    }

    fn placement(source: LumpId) -> PatchPlacement {
        PatchPlacement {
            source,
            origin_x: 0,
            origin_y: 0,
            flip: PatchFlip::default(),
            style: BlendStyle::Copy,
            alpha: 0xFF,
        }
    }

    /// A cache with one 4x4 texture backed by one solid patch.
    fn fixture(config: CacheConfig) -> (TextureCache, MemoryStore, RecordingUploader) {
        let mut store = MemoryStore::new();
        store.insert(LumpId(1), solid_patch(4, 4, 30));
        let mut cache = TextureCache::new(config, Palette::grayscale());
        let mut gpu = RecordingUploader::new();
        cache.load_map_textures(
            vec![CompositeTexture {
                name: "WALL1".into(),
                width: 4,
                height: 4,
                patches: vec![placement(LumpId(1))],
            }],
            &mut gpu,
        );
        (cache, store, gpu)
    }

    #[test]
    fn test_repeat_references_upload_once() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        let first = cache.get_texture(0, &store, &mut gpu).unwrap();
        let second = cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(first, second);
        assert_eq!(gpu.uploads.len(), 1);
        assert_eq!(gpu.binds, vec![first, first]);
        assert_eq!(gpu.uploads[0].data, vec![30u8; 16]);
        assert!(gpu.uploads[0].flags.chroma_keyed);
    }

    #[test]
    fn test_reclaimed_block_regenerates_without_reupload() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        let handle = cache.get_texture(0, &store, &mut gpu).unwrap();
        assert!(cache.texture_entry(0).unwrap().cpu_resident());
        assert_eq!(cache.parked_bytes(), 16);

        // two idle frames reclaim the CPU copy
        cache.unlock_frame();
        cache.unlock_frame();
        let entry = cache.texture_entry(0).unwrap();
        assert!(!entry.cpu_resident());
        assert!(entry.gpu_resident());

        let again = cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(again, handle);
        assert_eq!(gpu.uploads.len(), 1, "existing GPU copy must be reused");
        assert!(cache.texture_entry(0).unwrap().cpu_resident());
    }

    #[test]
    fn test_block_used_every_frame_stays_resident() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        cache.get_texture(0, &store, &mut gpu).unwrap();
        for _ in 0..3 {
            cache.unlock_frame();
            cache.get_texture(0, &store, &mut gpu).unwrap();
        }
        assert!(cache.texture_entry(0).unwrap().cpu_resident());
        assert_eq!(gpu.uploads.len(), 1);
    }

    #[test]
    fn test_texture_index_out_of_range() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        assert!(matches!(
            cache.get_texture(5, &store, &mut gpu),
            Err(CacheError::TextureOutOfRange { index: 5, count: 1 })
        ));
    }

    #[test]
    fn test_missing_patch_source_yields_background_texture() {
        let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
        let store = MemoryStore::new();
        let mut gpu = RecordingUploader::new();
        cache.load_map_textures(
            vec![CompositeTexture {
                name: "WALL1".into(),
                width: 2,
                height: 2,
                patches: vec![placement(LumpId(99))],
            }],
            &mut gpu,
        );
        cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(gpu.uploads[0].data, vec![CHROMA_KEY_INDEX; 4]);
    }

    #[test]
    fn test_zero_patch_texture_is_all_background() {
        let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
        let store = MemoryStore::new();
        let mut gpu = RecordingUploader::new();
        cache.load_map_textures(
            vec![CompositeTexture { name: "BLANK".into(), width: 4, height: 2, patches: vec![] }],
            &mut gpu,
        );
        cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(gpu.uploads[0].data, vec![CHROMA_KEY_INDEX; 8]);
    }

    #[test]
    fn test_default_colormap_never_creates_a_variant() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        store.insert(LumpId(2), solid_patch(2, 2, 9));
        let plain = cache.get_patch(LumpId(2), &store, &mut gpu).unwrap();
        let mapped = cache.get_mapped_patch(LumpId(2), None, &store, &mut gpu).unwrap();
        assert_eq!(plain, mapped);
        assert_eq!(cache.variant_count(LumpId(2)), 0);
        assert_eq!(gpu.uploads.len(), 1);
    }

    #[test]
    fn test_variants_key_on_colormap_handle_identity() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        store.insert(LumpId(2), solid_patch(2, 2, 9));
        let mut map = [0u8; 256];
        for (i, m) in map.iter_mut().enumerate() {
            *m = i as u8;
        }
        map[9] = 100;
        let red = Arc::new(Colormap::new(map));
        let same_contents = Arc::new(Colormap::new(map));

        let first = cache.get_mapped_patch(LumpId(2), Some(&red), &store, &mut gpu).unwrap();
        let second = cache.get_mapped_patch(LumpId(2), Some(&red), &store, &mut gpu).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.variant_count(LumpId(2)), 1);

        // a different handle is a different variant even if equal
        let third =
            cache.get_mapped_patch(LumpId(2), Some(&same_contents), &store, &mut gpu).unwrap();
        assert_ne!(first, third);
        assert_eq!(cache.variant_count(LumpId(2)), 2);
        // remapped texel landed in the upload
        assert_eq!(gpu.uploads[0].data[0], 100);
    }

    #[test]
    fn test_invalidate_colormaps_keeps_base_entries() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        store.insert(LumpId(2), solid_patch(2, 2, 9));
        let colormap = Arc::new(Colormap::identity());
        cache.get_patch(LumpId(2), &store, &mut gpu).unwrap();
        let variant = cache.get_mapped_patch(LumpId(2), Some(&colormap), &store, &mut gpu).unwrap();

        cache.invalidate_colormaps_only(&mut gpu);
        assert_eq!(cache.variant_count(LumpId(2)), 0);
        assert!(cache.lump_entry(LumpId(2)).unwrap().gpu_resident());
        assert_eq!(gpu.deleted, vec![variant]);
    }

    #[test]
    fn test_invalidate_all_clears_everything() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        cache.get_texture(0, &store, &mut gpu).unwrap();
        cache.invalidate_all(&mut gpu);
        assert_eq!(gpu.clear_count, 1);
        assert_eq!(cache.texture_count(), 0);
        assert_eq!(cache.parked_bytes(), 0);
    }

    #[test]
    fn test_palette_change_recomposites_32bit_entries() {
        let config = CacheConfig { texture_format: PixelFormat::Rgba32, ..CacheConfig::default() };
        let (mut cache, store, mut gpu) = fixture(config);
        cache.get_texture(0, &store, &mut gpu).unwrap();
        // grayscale palette: index 30 -> (30,30,30,255)
        assert_eq!(&gpu.uploads[0].data[..4], &[30, 30, 30, 255]);

        let mut inverted = Palette::grayscale();
        for i in 0..=255u8 {
            inverted.set_color(i, crate::color::Rgba::new(255 - i, 255 - i, 255 - i, 255));
        }
        cache.set_palette(inverted, &mut gpu);
        assert_eq!(gpu.palette_count, 1);
        assert!(!cache.texture_entry(0).unwrap().gpu_resident());

        cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(gpu.uploads.len(), 2);
        assert_eq!(&gpu.uploads[1].data[..4], &[225, 225, 225, 255]);
    }

    #[test]
    fn test_palette_change_keeps_palettized_entries() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        cache.get_texture(0, &store, &mut gpu).unwrap();
        cache.set_palette(Palette::grayscale(), &mut gpu);
        assert!(cache.texture_entry(0).unwrap().gpu_resident());
        cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(gpu.uploads.len(), 1);
    }

    #[test]
    fn test_flat_side_comes_from_lump_size() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        store.insert(LumpId(5), vec![3u8; 1024]);
        cache.get_flat(LumpId(5), &store, &mut gpu).unwrap();
        let upload = gpu.uploads.last().unwrap();
        assert_eq!((upload.width, upload.height), (32, 32));
        assert_eq!(upload.format, PixelFormat::Palette8);

        // short lump falls back to 64x64, padded with the chroma key
        store.insert(LumpId(6), vec![3u8; 100]);
        cache.get_flat(LumpId(6), &store, &mut gpu).unwrap();
        let upload = gpu.uploads.last().unwrap();
        assert_eq!((upload.width, upload.height), (64, 64));
        assert_eq!(upload.data[99], 3);
        assert_eq!(upload.data[100], CHROMA_KEY_INDEX);
    }

    #[test]
    fn test_raw_picture_format_follows_mode() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        let mut pic = Vec::new();
        pic.extend_from_slice(&2i16.to_le_bytes());
        pic.push(0);
        pic.push(2); // intensity-alpha
        pic.extend_from_slice(&1i16.to_le_bytes());
        pic.extend_from_slice(&0i16.to_le_bytes());
        pic.extend_from_slice(&[7, 0xFF, 8, 0x80]);
        store.insert(LumpId(5), pic);

        cache.get_raw_picture(LumpId(5), &store, &mut gpu).unwrap();
        let upload = gpu.uploads.last().unwrap();
        assert_eq!(upload.format, PixelFormat::IntensityAlpha16);
        assert_eq!(upload.data, vec![7, 0xFF, 8, 0x80]);
        assert!(!upload.flags.wrap_x);
    }

    #[test]
    fn test_fade_mask_of_bad_size_is_skipped() {
        let (mut cache, mut store, mut gpu) = fixture(CacheConfig::default());
        store.insert(LumpId(5), vec![0u8; 4000]);
        store.insert(LumpId(6), vec![0u8; 123]);
        assert!(cache.get_fade_mask(LumpId(5), &store, &mut gpu).is_ok());
        assert!(matches!(
            cache.get_fade_mask(LumpId(6), &store, &mut gpu),
            Err(CacheError::Picture(PictureError::BadMaskSize(123)))
        ));
        // failed entry stays absent and retries next reference
        store.insert(LumpId(6), vec![0u8; 4000]);
        assert!(cache.get_fade_mask(LumpId(6), &store, &mut gpu).is_ok());
    }

    #[test]
    fn test_load_map_textures_deletes_old_gpu_copies() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        let old = cache.get_texture(0, &store, &mut gpu).unwrap();
        cache.load_map_textures(
            vec![CompositeTexture { name: "NEW".into(), width: 2, height: 2, patches: vec![] }],
            &mut gpu,
        );
        assert_eq!(gpu.deleted, vec![old]);
        assert_eq!(cache.texture_count(), 1);
        assert!(!cache.texture_entry(0).unwrap().gpu_resident());
    }

    #[test]
    fn test_load_map_textures_discards_parked_blocks() {
        let (mut cache, store, mut gpu) = fixture(CacheConfig::default());
        cache.get_texture(0, &store, &mut gpu).unwrap();
        assert_eq!(cache.parked_bytes(), 16);

        // the old directory's CPU copies go with it, no frame ticks needed
        cache.load_map_textures(Vec::new(), &mut gpu);
        assert_eq!(cache.parked_bytes(), 0);
    }
}
