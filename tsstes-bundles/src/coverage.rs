//! Coverage segments of the region currently being scanned.

use tsstes_core::models::CoverageSegment;

/// Index range `[first, last]` of segments forming one gap-free stretch of coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousRun {
    pub first: usize,
    pub last: usize,
}

///
/// Ordered, non-overlapping coverage segments of one region.
///
/// Range queries take a caller-held cursor into the segment list so that a
/// sequence of queries with non-decreasing start positions costs amortized O(1)
/// per query.
///
#[derive(Debug, Default, Clone)]
pub struct CoverageBuffer {
    segments: Vec<CoverageSegment>,
}

impl CoverageBuffer {
    pub fn new() -> Self {
        CoverageBuffer {
            segments: Vec::new(),
        }
    }

    /// Append a segment; it must start after the end of the previous one.
    pub fn push(&mut self, segment: CoverageSegment) {
        debug_assert!(
            self.segments
                .last()
                .is_none_or(|prev| prev.end < segment.start),
            "coverage segments must be sorted and disjoint"
        );
        self.segments.push(segment);
    }

    /// Drop all segments, keeping the allocation for the next region.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[CoverageSegment] {
        &self.segments
    }

    pub fn first(&self) -> Option<&CoverageSegment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&CoverageSegment> {
        self.segments.last()
    }

    /// Total number of covered bases (gaps excluded).
    pub fn covered_length(&self) -> i64 {
        self.segments.iter().map(|s| s.len()).sum()
    }

    ///
    /// Split the buffer into gap-free runs of adjacent segments.
    ///
    pub fn contiguous_runs(&self) -> Vec<ContiguousRun> {
        let mut runs: Vec<ContiguousRun> = Vec::new();
        let mut prev_end: Option<i64> = None;

        for (i, seg) in self.segments.iter().enumerate() {
            match (prev_end, runs.last_mut()) {
                (Some(end), Some(run)) if seg.start - 1 <= end => run.last = i,
                _ => runs.push(ContiguousRun { first: i, last: i }),
            }
            prev_end = Some(seg.end);
        }

        runs
    }

    ///
    /// Sum of `length * coverage` over the intersection of `[start, end]` with
    /// the buffered segments.
    ///
    /// The cursor is advanced past every segment that ends before `start` and
    /// is left on the segment holding `end` (or the first one after it). Reset
    /// it to 0, or rewind it with [CoverageBuffer::rewind], before querying a
    /// start that lies behind it. Returns 0 when the range lies entirely past
    /// the last segment or inside a gap.
    ///
    pub fn cumulative_coverage(&self, start: i64, end: i64, cursor: &mut usize) -> f64 {
        let segs = &self.segments;
        let mut sum = 0.0;

        while *cursor < segs.len() && start > segs[*cursor].end {
            *cursor += 1;
        }
        if *cursor >= segs.len() {
            return sum;
        }

        let mut start = start.max(segs[*cursor].start);

        while end > segs[*cursor].end {
            sum += (segs[*cursor].end - start + 1) as f64 * segs[*cursor].coverage;
            *cursor += 1;
            if *cursor == segs.len() {
                return sum;
            }
            start = segs[*cursor].start;
        }

        if end < start {
            return sum;
        }

        sum + (end - start + 1) as f64 * segs[*cursor].coverage
    }

    /// Coverage of the single base at `position`.
    pub fn point_coverage(&self, position: i64, cursor: &mut usize) -> f64 {
        self.cumulative_coverage(position, position, cursor)
    }

    ///
    /// Move a cursor back until its segment starts at or before `position`.
    ///
    /// Positions before the first segment are clamped to its start, with the
    /// cursor reset to 0. Returns the cursor together with the clamped position.
    ///
    pub fn rewind(&self, cursor: usize, position: i64) -> (usize, i64) {
        let Some(first) = self.segments.first() else {
            return (0, position);
        };
        if position < first.start {
            return (0, first.start);
        }

        let mut cursor = cursor.min(self.segments.len() - 1);
        while self.segments[cursor].start > position {
            cursor -= 1;
        }
        (cursor, position)
    }
}
