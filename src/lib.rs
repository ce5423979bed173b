//! mipcache - Texture and patch caching for a palettized 3D renderer
//!
//! This library provides functionality to:
//! - Decode run-length column patches (including tall-patch offsets)
//!   and raw picture, flat and fade-mask lumps
//! - Composite patches into textures with scaling, clipping, flipping,
//!   recoloring and blend styles
//! - Manage the CPU/GPU residency of every cached image, regenerating
//!   reclaimed blocks on demand

pub mod cache;
pub mod color;
pub mod composite;
pub mod decode;
pub mod formats;
pub mod memory;
pub mod mip;
pub mod models;
pub mod patch;
pub mod picture;
pub mod store;
pub mod upload;

pub use cache::{CacheConfig, CacheError, TextureCache};
pub use color::{ColorLut, Palette, Rgba, CHROMA_KEY_INDEX};
pub use composite::BlendStyle;
pub use formats::PixelFormat;
pub use mip::{Colormap, MipEntry, MipFlags, PixelBlock, TextureHandle};
pub use models::{CompositeTexture, PatchFlip, PatchPlacement};
pub use store::{AssetStore, LumpId, MemoryStore, StoreError};
pub use upload::{GpuUploader, RecordingUploader, UploadDesc};
