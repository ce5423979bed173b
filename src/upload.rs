//! GPU upload seam.
//!
//! The cache is driver-agnostic: everything it needs from the video
//! side is behind [`GpuUploader`]. The real renderer backs this with
//! its GL driver; tests use [`RecordingUploader`].

use crate::color::Palette;
use crate::formats::PixelFormat;
use crate::mip::{MipFlags, TextureHandle};

/// One upload request: the block's pixels plus everything the driver
/// needs to create the texture object.
#[derive(Debug, Clone, Copy)]
pub struct UploadDesc<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub flags: MipFlags,
    pub data: &'a [u8],
}

pub trait GpuUploader {
    /// Creates a GPU texture from the block and returns its handle.
    ///
    /// Blocks arrive at their exact pixel dimensions, which need not be
    /// powers of two; the driver must accept arbitrary sizes (or pad on
    /// its own side).
    fn upload(&mut self, desc: &UploadDesc<'_>) -> TextureHandle;

    /// Makes the handle the current texture for subsequent draws.
    fn bind(&mut self, handle: TextureHandle);

    fn delete(&mut self, handle: TextureHandle);

    /// Drops every texture the driver holds.
    fn clear_all(&mut self);

    /// Hands the active palette to the driver (palettized render paths
    /// need it at draw time).
    fn set_palette(&mut self, palette: &Palette);
}

/// What a [`RecordingUploader`] remembers about one upload.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub handle: TextureHandle,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub flags: MipFlags,
    pub data: Vec<u8>,
}

/// Records every call for assertions; hands out sequential handles.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    pub uploads: Vec<UploadRecord>,
    pub binds: Vec<TextureHandle>,
    pub deleted: Vec<TextureHandle>,
    pub clear_count: u32,
    pub palette_count: u32,
    next: u32,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_bound(&self) -> Option<TextureHandle> {
        self.binds.last().copied()
    }
}

impl GpuUploader for RecordingUploader {
    fn upload(&mut self, desc: &UploadDesc<'_>) -> TextureHandle {
        let handle = TextureHandle(self.next);
        self.next += 1;
        self.uploads.push(UploadRecord {
            handle,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            flags: desc.flags,
            data: desc.data.to_vec(),
        });
        handle
    }

    fn bind(&mut self, handle: TextureHandle) {
        self.binds.push(handle);
    }

    fn delete(&mut self, handle: TextureHandle) {
        self.deleted.push(handle);
    }

    fn clear_all(&mut self) {
        self.clear_count += 1;
    }

    fn set_palette(&mut self, _palette: &Palette) {
        self.palette_count += 1;
    }
}
