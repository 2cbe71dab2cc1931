//! Same-strand junction noise suppression.

use fxhash::FxHashMap;
use tsstes_core::models::Strand;

use crate::junctions::{JunctionId, JunctionPool};

///
/// Sweep over start-sorted junctions that retracts weak junctions overlapped by
/// a stronger, strand-compatible one, as long as the stronger one is itself
/// below `small_coverage`.
///
/// Open junctions are keyed by `(start, strand)`; a key holds the latest
/// junction seen with that start and strand and is closed the first time a
/// junction of that group ends before the sweep position.
///
pub struct NoiseFilter {
    small_coverage: f64,
}

impl NoiseFilter {
    pub fn new(small_coverage: f64) -> Self {
        NoiseFilter { small_coverage }
    }

    ///
    /// Retract dominated junctions of the pool. The pool's end order must be
    /// current (see [JunctionPool::sort_by_end]).
    ///
    /// Returns the number of junctions retracted.
    ///
    pub fn apply(&self, pool: &mut JunctionPool) -> usize {
        let marked = self.dominated(pool);
        let count = marked.len();
        pool.retract_all(&marked);
        count
    }

    fn dominated(&self, pool: &JunctionPool) -> Vec<JunctionId> {
        let n = pool.len();
        let mut open: FxHashMap<(i64, Strand), JunctionId> = FxHashMap::default();
        let mut mark = vec![false; n];
        let mut closing = 0;

        for current in 0..n {
            let cur = pool.get(current);

            while closing < n && pool.get(pool.by_end(closing)).end < cur.start {
                let ended = pool.get(pool.by_end(closing));
                open.remove(&(ended.start, ended.strand));
                closing += 1;
            }

            for &other in open.values() {
                let o = pool.get(other);
                if !o.strand.compatible(&cur.strand) {
                    continue;
                }
                if cur.coverage > o.coverage {
                    if cur.coverage < self.small_coverage {
                        mark[other] = true;
                    }
                } else if cur.coverage < o.coverage && o.coverage < self.small_coverage {
                    mark[current] = true;
                }
            }

            open.insert((cur.start, cur.strand), current);
        }

        mark.iter()
            .enumerate()
            .filter_map(|(id, &m)| m.then_some(id))
            .collect()
    }
}
