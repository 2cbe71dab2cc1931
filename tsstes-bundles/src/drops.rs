//! Dual-window coverage drop detection.
//!
//! Every contiguous coverage run long enough to hold both windows is scanned
//! base by base (or in steps of `delta` where the coverage is flat). At each
//! offset the coverage on either side of a symmetric window is compared, after
//! correcting for reads that splice out of (or into) the window, and sharp
//! rises or falls become start or end candidates.

use serde::Serialize;
use tsstes_core::config::DetectionParams;
use tsstes_core::models::CoverageSegment;

use crate::coverage::{ContiguousRun, CoverageBuffer};
use crate::errors::InvariantViolation;
use crate::junctions::JunctionPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Coverage rises going right.
    Start,
    /// Coverage falls going right.
    End,
}

///
/// A candidate transcript boundary. Boundaries of a contiguous run are
/// reported with a retained fraction of 0.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DropCandidate {
    pub position: i64,
    pub polarity: Polarity,
    /// Fraction of coverage that survives across the boundary; lower is sharper.
    pub retained_fraction: f64,
    /// Per-base coverage change across the boundary.
    pub coverage_delta: f64,
}

impl DropCandidate {
    fn run_boundary(position: i64, polarity: Polarity, coverage: f64) -> Self {
        DropCandidate {
            position,
            polarity,
            retained_fraction: 0.0,
            coverage_delta: coverage,
        }
    }

    pub fn is_run_boundary(&self) -> bool {
        self.retained_fraction == 0.0
    }
}

/// Positions into the junction pool shared by consecutive runs of a region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JunctionCursors {
    /// Into the start (input) order.
    pub start: usize,
    /// Into the end-sorted order.
    pub end: usize,
}

pub struct DropDetector {
    window: usize,
    small_window: usize,
    step: usize,
    noise: f64,
}

impl DropDetector {
    pub fn new(params: &DetectionParams) -> Self {
        DropDetector {
            window: params.win as usize,
            small_window: params.smallwin as usize,
            step: params.delta as usize,
            noise: params.percnoise,
        }
    }

    ///
    /// Append the drop candidates of one contiguous run to `drops`, framed by
    /// a start boundary at the run's first base and an end boundary at its
    /// last base.
    ///
    /// # Arguments
    ///
    /// - coverage: the region's coverage
    /// - run: the run to scan
    /// - pool: the region's junctions, end order already built
    /// - cursors: junction cursors carried over from the previous run
    /// - drops: output, in ascending position order
    ///
    pub fn scan_run(
        &self,
        coverage: &CoverageBuffer,
        run: ContiguousRun,
        pool: &JunctionPool,
        cursors: &mut JunctionCursors,
        drops: &mut Vec<DropCandidate>,
    ) -> Result<(), InvariantViolation> {
        let segments = &coverage.segments()[run.first..=run.last];
        let (first, last) = (&segments[0], &segments[segments.len() - 1]);
        let (start, end) = (first.start, last.end);
        let n = pool.len();

        while cursors.start < n && pool.get(cursors.start).start < start {
            cursors.start += 1;
        }
        while cursors.end < n && pool.get(pool.by_end(cursors.end)).end < start {
            cursors.end += 1;
        }

        drops.push(DropCandidate::run_boundary(
            start,
            Polarity::Start,
            first.coverage,
        ));

        let len = (end - start + 1) as usize;
        if len >= self.window + self.small_window {
            let (sums, anchors) = WindowSums::build(self.window, segments, len, pool, cursors);
            let (starts, ends) = self.scan(&sums, &anchors, len);
            merge_tracks(&starts, &ends, start, drops)?;
        }

        cursors.start = cursors.start.saturating_sub(1);
        while cursors.start < n && pool.get(cursors.start).start < end {
            cursors.start += 1;
        }

        drops.push(DropCandidate::run_boundary(end, Polarity::End, last.coverage));

        Ok(())
    }

    fn scan(
        &self,
        sums: &WindowSums,
        anchors: &[usize],
        len: usize,
    ) -> (CandidateTrack, CandidateTrack) {
        let (w, sw) = (self.window, self.small_window);
        let mut starts = CandidateTrack::default();
        let mut ends = CandidateTrack::default();
        let mut first_anchor = 0;
        let mut i = sw + 1;

        while i < len - sw {
            let mut l = i.saturating_sub(w).max(1);
            let mut r = 2 * i - l - 1;
            if r > len - 1 {
                r = len - 1;
                l = 2 * i - r - 1;
            }

            let mut best = sums.percentages(l, r, i);

            while first_anchor < anchors.len() && anchors[first_anchor] <= l {
                first_anchor += 1;
            }
            for &a in anchors[first_anchor..].iter().take_while(|&&a| a < r) {
                let anchored = if i > a + sw {
                    sums.percentages(a, 2 * i - a - 1, i)
                } else if a + 1 > i + sw {
                    sums.percentages(2 * i - a - 1, a, i)
                } else {
                    continue;
                };
                best.keep_sharpest(&anchored);
            }

            let mut offered = false;
            if best.right < self.noise {
                starts.offer(i, best.right, best.avg_right, w);
                offered = true;
            }
            if best.left < self.noise {
                ends.offer(i, best.left, best.avg_left, w);
                offered = true;
            }

            i += if !offered && best.left > 0.5 && best.right > 0.5 {
                self.step
            } else {
                1
            };
        }

        (starts, ends)
    }
}

// ──────────────────────────────────────────────
// Windowed sums
// ──────────────────────────────────────────────

/// Drop statistics around one offset.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Percentages {
    left: f64,
    right: f64,
    avg_left: f64,
    avg_right: f64,
}

impl Percentages {
    fn keep_sharpest(&mut self, other: &Percentages) {
        if other.left < self.left {
            self.left = other.left;
            self.avg_left = other.avg_left;
        }
        if other.right < self.right {
            self.right = other.right;
            self.avg_right = other.avg_right;
        }
    }
}

///
/// Running coverage sums over a run, reset every `window` offsets, plus the
/// two junction-adjusted variants. Offset `k` (1-based) is genomic position
/// `run start + k - 1`.
///
struct WindowSums {
    window: usize,
    cov: Vec<f64>,
    adj_start: Vec<f64>,
    adj_end: Vec<f64>,
}

impl WindowSums {
    /// Returns the sums together with the offsets where junctions start or end.
    fn build(
        window: usize,
        segments: &[CoverageSegment],
        len: usize,
        pool: &JunctionPool,
        cursors: &mut JunctionCursors,
    ) -> (Self, Vec<usize>) {
        let size = len + window + 10;
        let mut cov = vec![0.0; size];
        let mut adj_start = vec![0.0; size];
        let mut adj_end = vec![0.0; size];
        let mut anchors = Vec::new();
        let n = pool.len();
        let start = segments[0].start;
        let mut seg = 0;

        for i in 0..len {
            let pos = start + i as i64;
            while pos > segments[seg].end {
                seg += 1;
            }
            let i1 = i + 1;
            let r = i % window;
            cov[i1] = segments[seg].coverage;
            if r != 0 {
                cov[i1] += cov[i];
                adj_start[i1] += adj_start[i];
                adj_end[i1] += adj_end[i];
            }

            let mut anchored = false;
            if cursors.start < n && pool.get(cursors.start).start == pos {
                let mut jcov = 0.0;
                while cursors.start < n && pool.get(cursors.start).start == pos {
                    jcov += pool.get(cursors.start).coverage;
                    cursors.start += 1;
                }
                for j in 1..r + 2 {
                    adj_start[i - r + j] += jcov * j as f64;
                }
                if i > window {
                    for j in 1..window - r {
                        adj_start[i - window + j + 1] += jcov * j as f64;
                    }
                }
                anchors.push(i1);
                anchored = true;
            }

            if cursors.end < n && pool.get(pool.by_end(cursors.end)).end == pos {
                let mut jcov = 0.0;
                while cursors.end < n && pool.get(pool.by_end(cursors.end)).end == pos {
                    jcov += pool.get(pool.by_end(cursors.end)).coverage;
                    cursors.end += 1;
                }
                for slot in &mut adj_end[i1..i1 + window] {
                    *slot += jcov;
                }
                if !anchored {
                    anchors.push(i1);
                }
            }
        }

        (
            WindowSums {
                window,
                cov,
                adj_start,
                adj_end,
            },
            anchors,
        )
    }

    ///
    /// Compare `[l, i)` against `[i, r]`. Sums are rebuilt from the block-reset
    /// arrays by re-adding the total of the block preceding the boundary.
    ///
    fn percentages(&self, l: usize, r: usize, i: usize) -> Percentages {
        let w = self.window;
        let mut out = Percentages {
            left: 1.0,
            right: 1.0,
            avg_left: 0.0,
            avg_right: 0.0,
        };

        let mut sum_left = self.cov[i - 1] - self.cov[l - 1];
        let mut sum_left_adj = self.adj_start[i - 1] - self.adj_start[l - 1];
        let kw = i - 1 - (i - 2) % w;
        if kw < i && kw >= l {
            sum_left += self.cov[kw - 1];
            sum_left_adj += self.adj_start[kw - 1];
        }
        let sum_left_adj = sum_left - sum_left_adj;

        let mut sum_right = self.cov[r] - self.cov[i - 1];
        let mut sum_right_adj = self.adj_end[r] - self.adj_end[i - 1];
        let kw = r - (r - 1) % w;
        if kw >= i {
            sum_right += self.cov[kw - 1];
            sum_right_adj += self.adj_end[kw - 1];
        }
        let sum_right_adj = sum_right - sum_right_adj;

        let width = (i - l) as f64;
        if sum_left_adj > sum_right {
            out.avg_left = (sum_left_adj - sum_right) / width;
            out.left = sum_right / sum_left_adj;
        }
        if sum_right_adj > sum_left {
            out.avg_right = (sum_right_adj - sum_left) / width;
            out.right = sum_left / sum_right_adj;
        }

        out
    }
}

// ──────────────────────────────────────────────
// Candidate de-duplication
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrackEntry {
    offset: usize,
    fraction: f64,
    delta: f64,
    active: bool,
}

///
/// Candidates of one polarity in scan order. Only the sharpest candidate
/// within `window` bases of its neighbours stays active; losers are never
/// re-activated.
///
#[derive(Debug, Default)]
struct CandidateTrack {
    entries: Vec<TrackEntry>,
    best: usize,
}

impl CandidateTrack {
    fn offer(&mut self, offset: usize, fraction: f64, delta: f64, window: usize) {
        let opened = self.entries.is_empty();
        self.entries.push(TrackEntry {
            offset,
            fraction,
            delta,
            active: true,
        });
        if opened {
            return;
        }

        let last = self.entries.len() - 1;
        if offset - self.entries[self.best].offset > window {
            let prev = self.entries[last - 1];
            if prev.fraction >= fraction || offset - prev.offset > window {
                // new competition among the candidates still within reach
                self.best = last;
                let mut k = last;
                while k > 0 && offset - self.entries[k - 1].offset <= window {
                    k -= 1;
                    if fraction > self.entries[k].fraction {
                        self.best = k;
                        self.entries[last].active = false;
                    } else {
                        self.entries[k].active = false;
                    }
                }
            } else {
                self.entries[last].active = false;
            }
        } else if fraction < self.entries[self.best].fraction {
            self.entries[self.best].active = false;
            self.best = last;
        } else {
            self.entries[last].active = false;
        }
    }
}

///
/// Interleave the active start and end candidates of a run by offset. An end
/// candidate sits on the last base before the fall, a start candidate on the
/// first base after the rise.
///
fn merge_tracks(
    starts: &CandidateTrack,
    ends: &CandidateTrack,
    run_start: i64,
    drops: &mut Vec<DropCandidate>,
) -> Result<(), InvariantViolation> {
    let to_drop = |entry: &TrackEntry, polarity: Polarity| {
        let shift = match polarity {
            Polarity::Start => 1,
            Polarity::End => 2,
        };
        DropCandidate {
            position: run_start + entry.offset as i64 - shift,
            polarity,
            retained_fraction: entry.fraction,
            coverage_delta: entry.delta,
        }
    };

    let (s, e) = (&starts.entries, &ends.entries);
    let (mut si, mut ei) = (0, 0);

    while si < s.len() && ei < e.len() {
        if e[ei].offset < s[si].offset {
            if e[ei].active {
                drops.push(to_drop(&e[ei], Polarity::End));
            }
            ei += 1;
        } else {
            if s[si].active {
                if e[ei].active && e[ei].offset == s[si].offset {
                    return Err(InvariantViolation::CoincidentDrops {
                        position: run_start + s[si].offset as i64 - 1,
                    });
                }
                drops.push(to_drop(&s[si], Polarity::Start));
            }
            si += 1;
        }
    }
    drops.extend(
        s[si..]
            .iter()
            .filter(|t| t.active)
            .map(|t| to_drop(t, Polarity::Start)),
    );
    drops.extend(
        e[ei..]
            .iter()
            .filter(|t| t.active)
            .map(|t| to_drop(t, Polarity::End)),
    );

    Ok(())
}
