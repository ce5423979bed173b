//! Asset store: where raw lump bytes come from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one lump in the asset archive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LumpId(pub u32);

impl std::fmt::Display for LumpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lump {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} not found in the asset store")]
    NotFound(LumpId),
}

/// Read access to raw asset bytes. The cache never interprets lump
/// names or archive layout; it asks for bytes by id and decodes them.
pub trait AssetStore {
    fn lump(&self, id: LumpId) -> Result<&[u8], StoreError>;

    fn lump_len(&self, id: LumpId) -> Result<usize, StoreError> {
        Ok(self.lump(id)?.len())
    }
}

/// In-memory store, used by tests and by tooling that synthesizes
/// assets on the fly.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lumps: HashMap<LumpId, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: LumpId, bytes: impl Into<Vec<u8>>) {
        self.lumps.insert(id, bytes.into());
    }
}

impl AssetStore for MemoryStore {
    fn lump(&self, id: LumpId) -> Result<&[u8], StoreError> {
        self.lumps.get(&id).map(Vec::as_slice).ok_or(StoreError::NotFound(id))
    }
}
