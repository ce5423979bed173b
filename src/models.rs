//! Texture directory model types.
//!
//! A level's texture directory is a list of [`CompositeTexture`]
//! definitions: named canvases assembled from placed patches. The
//! definitions come from the world loader (or from JSON in tooling and
//! tests); the cache stores them verbatim and composites lazily.

use serde::{Deserialize, Serialize};

use crate::composite::BlendStyle;
use crate::store::LumpId;

/// Horizontal/vertical mirroring of a placed patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchFlip {
    #[serde(default)]
    pub horizontal: bool,
    #[serde(default)]
    pub vertical: bool,
}

/// One patch placed inside a composite texture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchPlacement {
    /// Lump holding the patch's column data.
    pub source: LumpId,
    pub origin_x: i32,
    pub origin_y: i32,
    #[serde(default)]
    pub flip: PatchFlip,
    #[serde(default)]
    pub style: BlendStyle,
    #[serde(default = "opaque")]
    pub alpha: u8,
}

fn opaque() -> u8 {
    0xFF
}

/// A renderable texture assembled by layering patches at offsets.
/// Patch list order is z-order: later entries draw over earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub patches: Vec<PatchPlacement>,
}

impl CompositeTexture {
    /// Legacy sky canvases (`SKY1`..`SKY99` style names) rely on the
    /// chroma-key color being *visible* as sky rather than cut to
    /// holes, so the compositor pre-fills them opaque and skips
    /// chroma-keying.
    pub fn is_sky(&self) -> bool {
        self.name.starts_with("SKY") && self.name.len() <= 5
    }
}
