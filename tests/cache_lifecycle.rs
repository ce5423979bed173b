//! End-to-end cache behavior: generation, upload, reclaim and
//! regeneration, recolor variants, palette changes.

use std::sync::Arc;

use mipcache::patch::{PatchBuilder, SourceDepth};
use mipcache::{
    CacheConfig, Colormap, CompositeTexture, LumpId, MemoryStore, Palette, PatchPlacement,
    PixelFormat, RecordingUploader, TextureCache, CHROMA_KEY_INDEX,
};

fn solid_patch(w: u32, h: u32, index: u8) -> Vec<u8> {
    let mut builder = PatchBuilder::new(w, h, SourceDepth::Bpp8);
    for x in 0..w {
        for y in 0..h {
            builder.set_index(x, y, index);
        }
    }
    builder.build()
}

fn placement(source: LumpId, x: i32, y: i32) -> PatchPlacement {
    PatchPlacement {
        source,
        origin_x: x,
        origin_y: y,
        flip: Default::default(),
        style: Default::default(),
        alpha: 0xFF,
    }
}

fn texture(name: &str, w: u32, h: u32, patches: Vec<PatchPlacement>) -> CompositeTexture {
    CompositeTexture { name: name.to_string(), width: w, height: h, patches }
}

#[test]
fn test_frame_loop_uploads_each_texture_once() {
    let mut store = MemoryStore::new();
    store.insert(LumpId(1), solid_patch(8, 8, 10));
    store.insert(LumpId(2), solid_patch(8, 8, 20));

    let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
    let mut gpu = RecordingUploader::new();
    cache.load_map_textures(
        vec![
            texture("WALL1", 8, 8, vec![placement(LumpId(1), 0, 0)]),
            texture("WALL2", 8, 8, vec![placement(LumpId(2), 0, 0)]),
        ],
        &mut gpu,
    );

    for _ in 0..5 {
        cache.get_texture(0, &store, &mut gpu).unwrap();
        cache.get_texture(1, &store, &mut gpu).unwrap();
        cache.get_texture(0, &store, &mut gpu).unwrap();
        cache.unlock_frame();
    }
    assert_eq!(gpu.uploads.len(), 2);
    assert_eq!(gpu.binds.len(), 15);
    // both CPU copies survive the loop, they are touched every frame
    assert!(cache.texture_entry(0).unwrap().cpu_resident());
    assert!(cache.texture_entry(1).unwrap().cpu_resident());
}

#[test]
fn test_idle_texture_is_reclaimed_then_regenerated() {
    let mut store = MemoryStore::new();
    store.insert(LumpId(1), solid_patch(4, 4, 10));

    let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
    let mut gpu = RecordingUploader::new();
    cache.load_map_textures(vec![texture("WALL1", 4, 4, vec![placement(LumpId(1), 0, 0)])], &mut gpu);

    let handle = cache.get_texture(0, &store, &mut gpu).unwrap();
    cache.unlock_frame();
    cache.unlock_frame();
    assert!(!cache.texture_entry(0).unwrap().cpu_resident());
    assert_eq!(cache.parked_bytes(), 0);

    // a dead block regenerates, the surviving GPU copy is reused
    let again = cache.get_texture(0, &store, &mut gpu).unwrap();
    assert_eq!(again, handle);
    assert_eq!(gpu.uploads.len(), 1);
    assert!(cache.texture_entry(0).unwrap().cpu_resident());
}

#[test]
fn test_sky_texture_uploads_opaque_and_unkeyed() {
    let store = MemoryStore::new();
    let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
    let mut gpu = RecordingUploader::new();
    cache.load_map_textures(vec![texture("SKY1", 4, 4, vec![])], &mut gpu);

    cache.get_texture(0, &store, &mut gpu).unwrap();
    let upload = &gpu.uploads[0];
    assert!(!upload.flags.chroma_keyed);
    assert!(upload.flags.wrap_x && upload.flags.wrap_y);
    assert_eq!(upload.data, vec![CHROMA_KEY_INDEX; 16]);
}

#[test]
fn test_png_source_composites_like_a_patch() {
    let mut img = image::RgbaImage::new(2, 2);
    img.put_pixel(0, 0, image::Rgba([64, 64, 64, 255]));
    img.put_pixel(1, 1, image::Rgba([128, 128, 128, 255]));
    let mut png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageOutputFormat::Png).unwrap();

    let mut store = MemoryStore::new();
    store.insert(LumpId(1), png.into_inner());

    let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
    let mut gpu = RecordingUploader::new();
    cache.load_map_textures(vec![texture("PNGTEX", 2, 2, vec![placement(LumpId(1), 0, 0)])], &mut gpu);

    cache.get_texture(0, &store, &mut gpu).unwrap();
    let upload = &gpu.uploads[0];
    assert_eq!(upload.format, PixelFormat::Palette8);
    // grayscale palette snaps (64,64,64) back to index 64
    assert_eq!(upload.data[0], 64);
    assert_eq!(upload.data[3], 128);
    // transparent PNG pixels stay background
    assert_eq!(upload.data[1], CHROMA_KEY_INDEX);
    assert_eq!(upload.data[2], CHROMA_KEY_INDEX);
}

#[test]
fn test_variant_freed_at_level_end_comes_back_on_request() {
    let mut store = MemoryStore::new();
    store.insert(LumpId(3), solid_patch(2, 2, 9));

    let mut cache = TextureCache::new(CacheConfig::default(), Palette::grayscale());
    let mut gpu = RecordingUploader::new();

    let mut map = [0u8; 256];
    for (i, m) in map.iter_mut().enumerate() {
        *m = i as u8;
    }
    map[9] = 42;
    let recolor = Arc::new(Colormap::new(map));

    let base = cache.get_patch(LumpId(3), &store, &mut gpu).unwrap();
    let variant = cache.get_mapped_patch(LumpId(3), Some(&recolor), &store, &mut gpu).unwrap();
    assert_ne!(base, variant);
    assert_eq!(cache.variant_count(LumpId(3)), 1);
    // recolored index 9 -> 42 in the 16-bit upload
    assert_eq!(gpu.uploads[1].data[0], 42);

    cache.invalidate_colormaps_only(&mut gpu);
    assert_eq!(cache.variant_count(LumpId(3)), 0);
    assert!(cache.lump_entry(LumpId(3)).unwrap().gpu_resident());

    let rebuilt = cache.get_mapped_patch(LumpId(3), Some(&recolor), &store, &mut gpu).unwrap();
    assert_eq!(cache.variant_count(LumpId(3)), 1);
    assert_ne!(rebuilt, variant, "freed variant must get a fresh GPU copy");
}

#[test]
fn test_palette_swap_recomposites_truecolor_patches() {
    let mut store = MemoryStore::new();
    store.insert(LumpId(3), solid_patch(1, 1, 50));

    let config = CacheConfig { patch_format: PixelFormat::Rgba32, ..CacheConfig::default() };
    let mut cache = TextureCache::new(config, Palette::grayscale());
    let mut gpu = RecordingUploader::new();

    cache.get_patch(LumpId(3), &store, &mut gpu).unwrap();
    assert_eq!(&gpu.uploads[0].data[..3], &[50, 50, 50]);

    let mut palette = Palette::grayscale();
    palette.set_color(50, mipcache::Rgba::new(200, 0, 0, 255));
    cache.set_palette(palette, &mut gpu);

    cache.get_patch(LumpId(3), &store, &mut gpu).unwrap();
    assert_eq!(gpu.uploads.len(), 2);
    assert_eq!(&gpu.uploads[1].data[..3], &[200, 0, 0]);
}

#[test]
fn test_texture_and_flat_directories_are_independent() {
    let mut store = MemoryStore::new();
    store.insert(LumpId(1), solid_patch(4, 4, 10));

    let config = CacheConfig { texture_format: PixelFormat::Rgba32, ..CacheConfig::default() };
    let mut cache = TextureCache::new(config, Palette::grayscale());
    let mut gpu = RecordingUploader::new();
    cache.load_map_textures(vec![texture("WALL1", 4, 4, vec![placement(LumpId(1), 0, 0)])], &mut gpu);

    let as_texture = cache.get_texture(0, &store, &mut gpu).unwrap();
    let as_flat = cache.get_texture_flat(0, &store, &mut gpu).unwrap();
    assert_ne!(as_texture, as_flat);
    assert_eq!(gpu.uploads[0].format, PixelFormat::Rgba32);
    // the flat twin is always 8-bit regardless of the texture format
    assert_eq!(gpu.uploads[1].format, PixelFormat::Palette8);
    assert_eq!(gpu.uploads[1].data, vec![10u8; 16]);
}
