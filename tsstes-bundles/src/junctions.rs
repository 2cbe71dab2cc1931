//! Junction arena of the current region plus the look-ahead pending set.

use std::collections::VecDeque;

use tsstes_core::models::Junction;

/// Stable handle of a junction inside a [JunctionPool].
pub type JunctionId = usize;

///
/// Junctions of one region, kept in input (start-sorted) order, together with
/// a stable end-sorted permutation.
///
/// Junctions are never removed while a region is processed; retraction
/// tombstones them in place so every [JunctionId] stays valid. Junctions read
/// past the region's provisional end wait in the pending set and are carried
/// into the next region.
///
#[derive(Debug, Default)]
pub struct JunctionPool {
    junctions: Vec<Junction>,
    by_end: Vec<JunctionId>,
    pending: VecDeque<Junction>,
}

impl JunctionPool {
    pub fn new() -> Self {
        JunctionPool::default()
    }

    pub fn push(&mut self, junction: Junction) {
        self.junctions.push(junction);
    }

    pub fn push_pending(&mut self, junction: Junction) {
        self.pending.push_back(junction);
    }

    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, id: JunctionId) -> &Junction {
        &self.junctions[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.iter()
    }

    /// Junction id at position `rank` of the end-sorted order.
    pub fn by_end(&self, rank: usize) -> JunctionId {
        self.by_end[rank]
    }

    ///
    /// Rebuild the end-sorted permutation. The sort is stable, so junctions
    /// sharing an end keep their input order.
    ///
    pub fn sort_by_end(&mut self) {
        self.by_end = (0..self.junctions.len()).collect();
        let junctions = &self.junctions;
        self.by_end.sort_by_key(|&id| junctions[id].end);
    }

    pub fn retract(&mut self, id: JunctionId) {
        self.junctions[id].retract();
    }

    pub fn retract_all(&mut self, ids: &[JunctionId]) {
        for &id in ids {
            self.retract(id);
        }
    }

    /// Summed coverage of the non-retracted junctions among `ids`.
    pub fn coverage_of(&self, ids: &[JunctionId]) -> f64 {
        ids.iter().map(|&id| self.junctions[id].coverage).sum()
    }

    ///
    /// Move pending junctions of `chrom` starting at or before `bundle_end` into
    /// the region, raising `bundle_end` to their ends.
    ///
    /// Returns `true` when the pending set was drained (so the caller may read
    /// more junctions), `false` when a pending junction still lies beyond the
    /// region.
    ///
    pub fn absorb_pending(&mut self, chrom: &str, bundle_end: &mut i64) -> bool {
        while let Some(next) = self.pending.front() {
            if next.chrom != chrom || next.start > *bundle_end {
                return false;
            }
            *bundle_end = (*bundle_end).max(next.end);
            if let Some(junction) = self.pending.pop_front() {
                self.junctions.push(junction);
            }
        }
        true
    }

    /// Forget the region's junctions; the pending set is kept.
    pub fn clear(&mut self) {
        self.junctions.clear();
        self.by_end.clear();
    }
}
