//! Reclaimable parking for CPU-side pixel blocks.
//!
//! Once a block is uploaded, its entry keeps only a weak handle; the
//! strong reference moves here. Two tags order reclamation:
//! `Reclaimable` blocks were used this frame, `Unlocked` blocks were
//! not. `unlock_frame` on the cache purges the unlocked generation and
//! demotes the rest, so a block survives at least one full frame past
//! its last use before its memory goes away.

use std::sync::{Arc, Weak};

use crate::mip::PixelBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimTag {
    /// Referenced this frame; not up for reclamation yet.
    Reclaimable,
    /// Idle since last frame; freed by the next purge.
    Unlocked,
}

#[derive(Debug, Default)]
pub struct ReclaimPool {
    entries: Vec<(ReclaimTag, Arc<PixelBlock>)>,
}

impl ReclaimPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a block and returns the weak handle its entry keeps.
    pub fn stash(&mut self, block: Arc<PixelBlock>, tag: ReclaimTag) -> Weak<PixelBlock> {
        let weak = Arc::downgrade(&block);
        self.entries.push((tag, block));
        weak
    }

    /// Re-marks an already parked block as used this frame.
    pub fn touch(&mut self, block: &Arc<PixelBlock>) {
        for (tag, parked) in &mut self.entries {
            if Arc::ptr_eq(parked, block) {
                *tag = ReclaimTag::Reclaimable;
                return;
            }
        }
    }

    /// Drops one parked block regardless of its tag (the owning entry
    /// is going away, not merely idle).
    pub fn discard(&mut self, block: &Arc<PixelBlock>) {
        self.entries.retain(|(_, parked)| !Arc::ptr_eq(parked, block));
    }

    /// End of frame: everything still parked becomes purgeable.
    pub fn demote_all(&mut self) {
        for (tag, _) in &mut self.entries {
            *tag = ReclaimTag::Unlocked;
        }
    }

    /// Drops every block carrying `tag`; their weak handles go dead.
    pub fn purge(&mut self, tag: ReclaimTag) {
        self.entries.retain(|(t, _)| *t != tag);
    }

    pub fn purge_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total parked pixel bytes.
    pub fn bytes(&self) -> usize {
        self.entries.iter().map(|(_, b)| b.bytes().len()).sum()
    }
}
