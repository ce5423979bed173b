//! The run-length column wire format.
//!
//! Patches are stored as vertical runs ("posts") per column, exactly as
//! they appear in existing asset archives:
//!
//! - header: `width:i16le, height:i16le, leftoffset:i16le, topoffset:i16le`
//! - `width` column offsets (`u32le`), each relative to the start of the
//!   patch bytes
//! - per post: `topdelta:u8, length:u8, pad:u8`, then `length` pixels at
//!   the source depth, then one pad byte; `topdelta == 0xFF` terminates
//!   the column's post list
//!
//! A raw topdelta less than or equal to the previous resolved delta is
//! additive ("tall patch" encoding), which lets columns address rows past
//! 254. The running value resets at the start of every column.

use thiserror::Error;

/// Sentinel topdelta closing a column's post list.
pub const COLUMN_TERMINATOR: u8 = 0xFF;

const HEADER_LEN: usize = 8;

/// Bit depth of the pixels stored inside a patch's posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDepth {
    /// Palette indexes.
    Bpp8,
    /// Low byte palette index, high byte alpha.
    Bpp16,
    /// r,g,b,a texels.
    Bpp32,
}

impl SourceDepth {
    pub const fn pixel_size(self) -> usize {
        match self {
            SourceDepth::Bpp8 => 1,
            SourceDepth::Bpp16 => 2,
            SourceDepth::Bpp32 => 4,
        }
    }
}

/// Malformed patch bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("patch lump truncated: {got} bytes, need at least {need}")]
    Truncated { got: usize, need: usize },
    #[error("patch has non-positive dimensions {width}x{height}")]
    BadDimensions { width: i16, height: i16 },
    #[error("column {column} offset {offset} is outside the lump")]
    BadColumnOffset { column: usize, offset: usize },
    #[error("column index {column} out of range, patch is {width} wide")]
    ColumnOutOfRange { column: usize, width: usize },
}

/// Zero-copy view over one patch lump.
#[derive(Debug, Clone, Copy)]
pub struct Patch<'a> {
    bytes: &'a [u8],
    depth: SourceDepth,
    width: u16,
    height: u16,
    left_offset: i16,
    top_offset: i16,
}

impl<'a> Patch<'a> {
    /// Validates the header and column offset table.
    pub fn parse(bytes: &'a [u8], depth: SourceDepth) -> Result<Self, PatchError> {
        if bytes.len() < HEADER_LEN {
            return Err(PatchError::Truncated { got: bytes.len(), need: HEADER_LEN });
        }
        let width = i16::from_le_bytes([bytes[0], bytes[1]]);
        let height = i16::from_le_bytes([bytes[2], bytes[3]]);
        let left_offset = i16::from_le_bytes([bytes[4], bytes[5]]);
        let top_offset = i16::from_le_bytes([bytes[6], bytes[7]]);
        if width <= 0 || height <= 0 {
            return Err(PatchError::BadDimensions { width, height });
        }
        let table_end = HEADER_LEN + width as usize * 4;
        if bytes.len() < table_end {
            return Err(PatchError::Truncated { got: bytes.len(), need: table_end });
        }
        Ok(Self {
            bytes,
            depth,
            width: width as u16,
            height: height as u16,
            left_offset,
            top_offset,
        })
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn left_offset(&self) -> i32 {
        self.left_offset as i32
    }

    pub fn top_offset(&self) -> i32 {
        self.top_offset as i32
    }

    pub fn depth(&self) -> SourceDepth {
        self.depth
    }

    /// The post list of column `x`.
    pub fn column(&self, x: usize) -> Result<Column<'a>, PatchError> {
        if x >= self.width as usize {
            return Err(PatchError::ColumnOutOfRange { column: x, width: self.width as usize });
        }
        let entry = HEADER_LEN + x * 4;
        let offset = u32::from_le_bytes([
            self.bytes[entry],
            self.bytes[entry + 1],
            self.bytes[entry + 2],
            self.bytes[entry + 3],
        ]) as usize;
        if offset >= self.bytes.len() {
            return Err(PatchError::BadColumnOffset { column: x, offset });
        }
        Ok(Column { bytes: &self.bytes[offset..], depth: self.depth })
    }
}

/// One column's post list.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    bytes: &'a [u8],
    depth: SourceDepth,
}

impl<'a> Column<'a> {
    /// Iterates posts with topdeltas already resolved to absolute rows.
    ///
    /// Truncated or otherwise malformed post data ends the iteration;
    /// deciding whether a short column is acceptable is the cache
    /// manager's call, not the decoder's.
    pub fn posts(&self) -> Posts<'a> {
        Posts { bytes: self.bytes, depth: self.depth, prev_delta: None }
    }
}

/// One decoded post: an absolute row and its run of source pixels.
#[derive(Debug, Clone, Copy)]
pub struct Post<'a> {
    /// Absolute top row, tall-patch deltas already resolved.
    pub top: i32,
    /// Pixel count.
    pub length: usize,
    /// `length * pixel_size` bytes of source pixels.
    pub pixels: &'a [u8],
}

/// Iterator over a column's posts. See [`Column::posts`].
pub struct Posts<'a> {
    bytes: &'a [u8],
    depth: SourceDepth,
    prev_delta: Option<i32>,
}

impl<'a> Iterator for Posts<'a> {
    type Item = Post<'a>;

    fn next(&mut self) -> Option<Post<'a>> {
        if self.bytes.len() < 3 || self.bytes[0] == COLUMN_TERMINATOR {
            return None;
        }
        let raw = self.bytes[0] as i32;
        let length = self.bytes[1] as usize;
        let top = match self.prev_delta {
            Some(prev) if raw <= prev => prev + raw,
            _ => raw,
        };
        self.prev_delta = Some(top);

        let data_len = length * self.depth.pixel_size();
        // header (3) + pixels + trailing pad
        let post_len = 3 + data_len + 1;
        if self.bytes.len() < post_len {
            self.bytes = &[];
            return None;
        }
        let pixels = &self.bytes[3..3 + data_len];
        self.bytes = &self.bytes[post_len..];
        Some(Post { top, length, pixels })
    }
}

/// Encodes pixel grids into patch bytes.
///
/// Used by tests and by the PNG conversion path, which re-encodes a
/// decoded image as a 32-bit patch so the column compositor can treat
/// every source uniformly. Cells left unset become holes (absent from
/// any post).
pub struct PatchBuilder {
    width: u32,
    height: u32,
    depth: SourceDepth,
    left_offset: i16,
    top_offset: i16,
    // column-major, one Option per cell, None = hole
    cells: Vec<Option<Vec<u8>>>,
}

impl PatchBuilder {
    pub fn new(width: u32, height: u32, depth: SourceDepth) -> Self {
        Self {
            width,
            height,
            depth,
            left_offset: 0,
            top_offset: 0,
            cells: vec![None; (width * height) as usize],
        }
    }

    pub fn with_offsets(mut self, left: i16, top: i16) -> Self {
        self.left_offset = left;
        self.top_offset = top;
        self
    }

    /// Sets an 8-bit palette index pixel.
    pub fn set_index(&mut self, x: u32, y: u32, index: u8) -> &mut Self {
        debug_assert_eq!(self.depth.pixel_size(), 1);
        self.set_raw(x, y, vec![index])
    }

    /// Sets a 16-bit pixel (palette index + alpha).
    pub fn set_index_alpha(&mut self, x: u32, y: u32, index: u8, alpha: u8) -> &mut Self {
        debug_assert_eq!(self.depth.pixel_size(), 2);
        self.set_raw(x, y, vec![index, alpha])
    }

    /// Sets a 32-bit r,g,b,a pixel.
    pub fn set_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> &mut Self {
        debug_assert_eq!(self.depth.pixel_size(), 4);
        self.set_raw(x, y, rgba.to_vec())
    }

    fn set_raw(&mut self, x: u32, y: u32, pixel: Vec<u8>) -> &mut Self {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.cells[(x * self.height + y) as usize] = Some(pixel);
        self
    }

    /// Serializes to wire bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.width as i16).to_le_bytes());
        out.extend_from_slice(&(self.height as i16).to_le_bytes());
        out.extend_from_slice(&self.left_offset.to_le_bytes());
        out.extend_from_slice(&self.top_offset.to_le_bytes());
        let table_at = out.len();
        out.resize(out.len() + self.width as usize * 4, 0);

        for x in 0..self.width {
            let offset = out.len() as u32;
            out[table_at + x as usize * 4..table_at + x as usize * 4 + 4]
                .copy_from_slice(&offset.to_le_bytes());
            self.encode_column(x, &mut out);
        }
        out
    }

    fn encode_column(&self, x: u32, out: &mut Vec<u8>) {
        let mut prev: Option<i32> = None;
        let mut y = 0u32;
        while y < self.height {
            // find the next run of set cells
            while y < self.height && self.cell(x, y).is_none() {
                y += 1;
            }
            if y >= self.height {
                break;
            }
            let start = y;
            while y < self.height && self.cell(x, y).is_some() && (y - start) < 254 {
                y += 1;
            }
            self.encode_post(x, start, y - start, &mut prev, out);
        }
        out.push(COLUMN_TERMINATOR);
    }

    /// Emits the topdelta byte sequence reaching absolute row `top`,
    /// ratcheting with zero-length posts when the additive encoding
    /// cannot reach it in one step, then the post itself.
    fn encode_post(&self, x: u32, top: u32, length: u32, prev: &mut Option<i32>, out: &mut Vec<u8>) {
        let top = top as i32;
        loop {
            match *prev {
                // A raw byte larger than the previous resolved delta is
                // read back as an absolute row.
                None if top <= 254 => break self.emit(x, top, length, top, out, prev),
                None => {
                    out.extend_from_slice(&[254, 0, 0, 0]);
                    *prev = Some(254);
                }
                Some(p) if top <= 254 => {
                    debug_assert!(top > p, "post rows must strictly increase");
                    break self.emit(x, top, length, top, out, prev);
                }
                Some(p) => {
                    let delta = top - p;
                    if delta <= p && delta <= 254 {
                        break self.emit(x, delta, length, top, out, prev);
                    }
                    let step = p.min(254);
                    out.extend_from_slice(&[step as u8, 0, 0, 0]);
                    *prev = Some(p + step);
                }
            }
        }
    }

    fn emit(&self, x: u32, raw: i32, length: u32, top: i32, out: &mut Vec<u8>, prev: &mut Option<i32>) {
        out.push(raw as u8);
        out.push(length as u8);
        out.push(0);
        for y in top as u32..top as u32 + length {
            let pixel = self.cell(x, y).expect("run cells are set");
            out.extend_from_slice(pixel);
        }
        out.push(0);
        *prev = Some(top);
    }

    fn cell(&self, x: u32, y: u32) -> Option<&Vec<u8>> {
        self.cells[(x * self.height + y) as usize].as_ref()
    }
}
