//! Three-way merge of drop candidates, junction starts and junction ends.

use crate::coverage::CoverageBuffer;
use crate::drops::{DropCandidate, Polarity};
use crate::errors::InvariantViolation;
use crate::junctions::{JunctionId, JunctionPool};
use crate::records::{Evidence, Record, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Drop(i64),
    JunctionStart(i64),
    JunctionEnd(i64),
}

/// `a` sorts strictly before `b`; an exhausted stream sorts after everything.
fn precedes(a: Option<i64>, b: Option<i64>) -> bool {
    match (a, b) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => a < b,
    }
}

///
/// Turns the drop candidates and surviving junctions of a region into one
/// position-ordered record stream, arbitrating between competing junction
/// groups and retracting the junctions of every rejected group.
///
/// At equal positions junction ends are taken before junction starts, and
/// junction events before drops.
///
pub struct EventMerger<'a> {
    delta: i64,
    coverage: &'a CoverageBuffer,
    drops: &'a [DropCandidate],
    pool: &'a mut JunctionPool,
    records: Vec<Record>,
    cursor: usize,
    drop_cursor: usize,
    last_drop: usize,
    start_cursor: usize,
    end_cursor: usize,
    prev_position: i64,
    region_end: i64,
}

impl<'a> EventMerger<'a> {
    pub fn new(
        delta: i64,
        coverage: &'a CoverageBuffer,
        drops: &'a [DropCandidate],
        pool: &'a mut JunctionPool,
    ) -> Self {
        EventMerger {
            delta,
            coverage,
            drops,
            pool,
            records: Vec::new(),
            cursor: 0,
            drop_cursor: 0,
            last_drop: drops.len().saturating_sub(1),
            start_cursor: 0,
            end_cursor: 0,
            prev_position: 0,
            region_end: 0,
        }
    }

    ///
    /// Run the merge. The stream opens with a bundle start at the first
    /// covered base (drop 0) and closes with a bundle end at the last one (the
    /// final drop); both carry confidence 0.
    ///
    pub fn merge(mut self) -> Result<Vec<Record>, InvariantViolation> {
        let (Some(first), Some(last)) = (self.coverage.first(), self.coverage.last()) else {
            return Ok(Vec::new());
        };
        let (first, last) = (*first, *last);
        self.region_end = last.end;

        self.records.push(Record::new(
            RecordKind::BundleStart,
            first.start,
            Evidence::Drop(0),
            0.0,
            first.coverage,
        ));
        self.drop_cursor = 1;
        self.prev_position = first.start;

        let n = self.pool.len();
        while self.drop_cursor < self.last_drop || self.start_cursor < n || self.end_cursor < n {
            if !self.step()? {
                break;
            }
        }

        self.fold_gap(last.end);
        self.records.push(Record::new(
            RecordKind::BundleEnd,
            last.end,
            Evidence::Drop(self.last_drop),
            0.0,
            last.coverage,
        ));

        Ok(self.records)
    }

    ///
    /// Consume the next event. Returns `false` once every stream is exhausted.
    /// A drop list that lacks its closing boundary leaves the drop cursor past
    /// the last drop, which is reported as a stalled merge.
    ///
    fn step(&mut self) -> Result<bool, InvariantViolation> {
        let next_drop =
            (self.drop_cursor < self.last_drop).then(|| self.drops[self.drop_cursor].position);
        let next_start = self.next_active_start();
        let next_end = self.next_active_end();

        if next_drop.is_none() && next_start.is_none() && next_end.is_none() {
            let n = self.pool.len();
            if self.drop_cursor == self.last_drop && self.start_cursor == n && self.end_cursor == n
            {
                return Ok(false);
            }
            return Err(InvariantViolation::StalledMerge {
                drop_cursor: self.drop_cursor,
                drops: self.last_drop,
                start_cursor: self.start_cursor,
                end_cursor: self.end_cursor,
                junctions: n,
            });
        }

        let event = if precedes(next_drop, next_start) {
            if precedes(next_drop, next_end) {
                next_drop.map(Event::Drop)
            } else {
                next_end.map(Event::JunctionEnd)
            }
        } else if precedes(next_start, next_end) {
            next_start.map(Event::JunctionStart)
        } else {
            next_end.map(Event::JunctionEnd)
        };

        match event {
            Some(Event::Drop(pos)) => self.take_drops(pos),
            Some(Event::JunctionStart(pos)) => self.take_junction_starts(pos),
            Some(Event::JunctionEnd(pos)) => self.take_junction_ends(pos),
            None => {}
        }

        Ok(true)
    }

    fn next_active_start(&mut self) -> Option<i64> {
        while self.start_cursor < self.pool.len() {
            let junction = self.pool.get(self.start_cursor);
            if junction.is_active() {
                return Some(junction.start);
            }
            self.start_cursor += 1;
        }
        None
    }

    fn next_active_end(&mut self) -> Option<i64> {
        while self.end_cursor < self.pool.len() {
            let junction = self.pool.get(self.pool.by_end(self.end_cursor));
            if junction.is_active() {
                return Some(junction.end);
            }
            self.end_cursor += 1;
        }
        None
    }

    /// Add the coverage strictly between the previous event and `position` to the last record.
    fn fold_gap(&mut self, position: i64) {
        if position <= self.prev_position + 1 {
            return;
        }
        let mut cursor = self.cursor;
        let gap = self
            .coverage
            .cumulative_coverage(self.prev_position + 1, position - 1, &mut cursor);
        if let Some(last) = self.records.last_mut() {
            last.coverage_to_next += gap;
        }
    }

    /// Coverage over `[left_start, left_end]` and `[right_start, right_end]`.
    fn flanks(&self, left_start: i64, left_end: i64, right_start: i64, right_end: i64) -> (f64, f64) {
        let (mut cursor, left_start) = self.coverage.rewind(self.cursor, left_start);
        let left = self
            .coverage
            .cumulative_coverage(left_start, left_end, &mut cursor);
        let right = self
            .coverage
            .cumulative_coverage(right_start, right_end.min(self.region_end), &mut cursor);
        (left, right)
    }

    fn emit(&mut self, kind: RecordKind, position: i64, evidence: Evidence, confidence: f64) {
        self.fold_gap(position);
        let point = self.coverage.point_coverage(position, &mut self.cursor);
        self.records
            .push(Record::new(kind, position, evidence, confidence, point));
        self.prev_position = position;
    }

    fn take_drops(&mut self, position: i64) {
        self.fold_gap(position);
        let point = self.coverage.point_coverage(position, &mut self.cursor);

        while self.drop_cursor < self.last_drop && self.drops[self.drop_cursor].position == position
        {
            let drop = self.drops[self.drop_cursor];
            let kind = match drop.polarity {
                Polarity::Start => RecordKind::BundleStart,
                Polarity::End => RecordKind::BundleEnd,
            };

            if drop.is_run_boundary() && self.prev_position > position - self.delta {
                match kind {
                    RecordKind::BundleStart => {
                        if let Some(last) = self.records.last() {
                            if last.position == position && last.kind == RecordKind::JunctionStart {
                                self.pool.retract_all(last.junctions());
                            }
                        }
                    }
                    _ => {
                        let reach = position - self.delta;
                        for record in self.records.iter().rev() {
                            if record.position <= reach {
                                break;
                            }
                            if record.kind == RecordKind::JunctionEnd {
                                self.pool.retract_all(record.junctions());
                            }
                        }
                    }
                }
            }

            self.records.push(Record::new(
                kind,
                position,
                Evidence::Drop(self.drop_cursor),
                drop.retained_fraction,
                point,
            ));
            self.drop_cursor += 1;
        }

        self.prev_position = position;
    }

    fn take_junction_ends(&mut self, position: i64) {
        let n = self.pool.len();
        let mut group: Vec<JunctionId> = Vec::new();
        while self.end_cursor < n && self.pool.get(self.pool.by_end(self.end_cursor)).end == position
        {
            let id = self.pool.by_end(self.end_cursor);
            if self.pool.get(id).is_active() {
                group.push(id);
            }
            self.end_cursor += 1;
        }

        let count = self.pool.coverage_of(&group);
        if count > 0.0 && !self.accept_junction_end(position, &group, count) {
            self.pool.retract_all(&group);
        }
    }

    fn accept_junction_end(&mut self, position: i64, group: &[JunctionId], count: f64) -> bool {
        let (left, right) = self.flanks(
            position - self.delta,
            position - 1,
            position,
            position + self.delta - 1,
        );
        if left >= right {
            return false;
        }

        let mut rival: Option<usize> = None;
        let mut rival_count = 0.0;
        if self.prev_position > position - 2 {
            for (i, record) in self.records.iter().enumerate().rev() {
                if record.position <= position - 2 {
                    break;
                }
                if record.position == position - 1 && record.kind == RecordKind::JunctionEnd {
                    rival = Some(i);
                    rival_count += self.pool.coverage_of(record.junctions());
                }
            }
        }
        if rival_count >= count {
            return false;
        }

        self.retract_rival(rival, rival_count);
        self.emit(
            RecordKind::JunctionEnd,
            position,
            Evidence::Junctions(group.to_vec()),
            left / right,
        );
        true
    }

    fn take_junction_starts(&mut self, position: i64) {
        let n = self.pool.len();
        let mut group: Vec<JunctionId> = Vec::new();
        while self.start_cursor < n && self.pool.get(self.start_cursor).start == position {
            if self.pool.get(self.start_cursor).is_active() {
                group.push(self.start_cursor);
            }
            self.start_cursor += 1;
        }

        let count = self.pool.coverage_of(&group);
        if count > 0.0 && !self.accept_junction_start(position, &group, count) {
            self.pool.retract_all(&group);
        }
    }

    fn accept_junction_start(&mut self, position: i64, group: &[JunctionId], count: f64) -> bool {
        let mut rival: Option<usize> = None;
        let mut rival_count = 0.0;

        if self.prev_position > position - self.delta {
            for (i, record) in self.records.iter().enumerate().rev() {
                if record.position <= position - self.delta {
                    break;
                }
                let boundary = record.confidence == 0.0 && record.kind == RecordKind::BundleStart;
                let end_here = record.position == position && record.kind == RecordKind::JunctionEnd;
                if boundary || end_here {
                    return false;
                }
                if record.position == position - 1 && record.kind == RecordKind::JunctionStart {
                    rival = Some(i);
                    rival_count += self.pool.coverage_of(record.junctions());
                }
            }
        }
        if rival_count >= count {
            return false;
        }

        let (left, right) = self.flanks(
            position - self.delta + 1,
            position,
            position + 1,
            position + self.delta,
        );
        if left <= right {
            return false;
        }

        self.retract_rival(rival, rival_count);
        self.emit(
            RecordKind::JunctionStart,
            position,
            Evidence::Junctions(group.to_vec()),
            right / left,
        );
        true
    }

    fn retract_rival(&mut self, rival: Option<usize>, rival_count: f64) {
        if rival_count <= 0.0 {
            return;
        }
        if let Some(i) = rival {
            self.pool.retract_all(self.records[i].junctions());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsstes_core::models::{CoverageSegment, Junction, Strand};

    fn buffer(segments: &[(i64, i64, f64)]) -> CoverageBuffer {
        let mut buffer = CoverageBuffer::new();
        for &(start, end, cov) in segments {
            buffer.push(CoverageSegment::new(start, end, cov));
        }
        buffer
    }

    fn boundaries(start: i64, start_cov: f64, end: i64, end_cov: f64) -> Vec<DropCandidate> {
        vec![
            DropCandidate {
                position: start,
                polarity: Polarity::Start,
                retained_fraction: 0.0,
                coverage_delta: start_cov,
            },
            DropCandidate {
                position: end,
                polarity: Polarity::End,
                retained_fraction: 0.0,
                coverage_delta: end_cov,
            },
        ]
    }

    fn pool(junctions: &[(i64, i64, f64)]) -> JunctionPool {
        let mut pool = JunctionPool::new();
        for &(start, end, coverage) in junctions {
            pool.push(Junction {
                chrom: "chr1".to_string(),
                start,
                end,
                coverage,
                strand: Strand::Plus,
                splice_start: 0.5,
            });
        }
        pool.sort_by_end();
        pool
    }

    #[rstest]
    fn test_trivial_region() {
        let coverage = buffer(&[(100, 300, 20.0)]);
        let drops = boundaries(100, 20.0, 300, 20.0);
        let mut pool = pool(&[]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        let mut start = Record::new(RecordKind::BundleStart, 100, Evidence::Drop(0), 0.0, 20.0);
        start.coverage_to_next = 199.0 * 20.0;
        let end = Record::new(RecordKind::BundleEnd, 300, Evidence::Drop(1), 0.0, 20.0);
        assert_eq!(records, vec![start, end]);
    }

    #[rstest]
    fn test_intron_boundaries_are_accepted() {
        let coverage = buffer(&[(1, 50, 30.0), (51, 100, 10.0), (101, 200, 30.0)]);
        let drops = boundaries(1, 30.0, 200, 30.0);
        let mut pool = pool(&[(50, 101, 20.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        let summary: Vec<(RecordKind, i64, f64, f64, f64)> = records
            .iter()
            .map(|r| {
                (
                    r.kind,
                    r.position,
                    r.confidence,
                    r.point_coverage,
                    r.coverage_to_next,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (RecordKind::BundleStart, 1, 0.0, 30.0, 48.0 * 30.0),
                (RecordKind::JunctionStart, 50, 50.0 / 150.0, 30.0, 50.0 * 10.0),
                (RecordKind::JunctionEnd, 101, 50.0 / 150.0, 30.0, 98.0 * 30.0),
                (RecordKind::BundleEnd, 200, 0.0, 30.0, 0.0),
            ]
        );
        assert_eq!(records[1].junctions(), &[0]);
        assert!(pool.get(0).is_active());
    }

    #[rstest]
    fn test_flat_flanks_reject_and_retract() {
        let coverage = buffer(&[(1, 300, 20.0)]);
        let drops = boundaries(1, 20.0, 300, 20.0);
        let mut pool = pool(&[(100, 200, 15.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(!pool.get(0).is_active());
    }

    #[rstest]
    fn test_junction_start_next_to_bundle_start_is_blocked() {
        let coverage = buffer(&[(1, 3, 30.0), (4, 200, 5.0)]);
        let drops = boundaries(1, 30.0, 200, 5.0);
        let mut pool = pool(&[(3, 150, 20.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        assert!(records.iter().all(|r| !r.kind.is_junction()));
        assert!(!pool.get(0).is_active());
    }

    #[rstest]
    fn test_stronger_adjacent_junction_end_wins() {
        let coverage = buffer(&[(1, 50, 30.0), (51, 99, 10.0), (100, 100, 20.0), (101, 200, 30.0)]);
        let drops = boundaries(1, 30.0, 200, 30.0);
        let mut pool = pool(&[(50, 100, 5.0), (50, 101, 20.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        let junction_ends: Vec<i64> = records
            .iter()
            .filter(|r| r.kind == RecordKind::JunctionEnd)
            .map(|r| r.position)
            .collect();
        assert_eq!(junction_ends, vec![100, 101]);
        assert!(!pool.get(0).is_active());
        assert!(pool.get(1).is_active());
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(0.1, true)]
    fn test_boundary_start_retracts_junction_start_at_same_base(
        #[case] retained_fraction: f64,
        #[case] survives: bool,
    ) {
        let coverage = buffer(&[(1, 100, 30.0), (101, 179, 10.0), (180, 300, 30.0)]);
        let mut drops = boundaries(1, 30.0, 300, 30.0);
        drops.insert(
            1,
            DropCandidate {
                position: 100,
                polarity: Polarity::Start,
                retained_fraction,
                coverage_delta: 20.0,
            },
        );
        let mut pool = pool(&[(100, 180, 20.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        let kinds: Vec<(RecordKind, i64)> = records.iter().map(|r| (r.kind, r.position)).collect();
        let mut expected = vec![
            (RecordKind::BundleStart, 1),
            (RecordKind::JunctionStart, 100),
            (RecordKind::BundleStart, 100),
        ];
        if survives {
            expected.push((RecordKind::JunctionEnd, 180));
        }
        expected.push((RecordKind::BundleEnd, 300));

        assert_eq!(kinds, expected);
        assert_eq!(pool.get(0).is_active(), survives);
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(0.1, true)]
    fn test_boundary_end_retracts_junction_ends_within_delta(
        #[case] retained_fraction: f64,
        #[case] survives: bool,
    ) {
        let coverage = buffer(&[(1, 20, 30.0), (21, 100, 10.0), (101, 300, 30.0)]);
        let mut drops = boundaries(1, 30.0, 300, 30.0);
        drops.insert(
            1,
            DropCandidate {
                position: 103,
                polarity: Polarity::End,
                retained_fraction,
                coverage_delta: 20.0,
            },
        );
        let mut pool = pool(&[(20, 101, 20.0)]);

        let records = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap();

        let kinds: Vec<(RecordKind, i64)> = records.iter().map(|r| (r.kind, r.position)).collect();
        assert_eq!(
            kinds,
            vec![
                (RecordKind::BundleStart, 1),
                (RecordKind::JunctionStart, 20),
                (RecordKind::JunctionEnd, 101),
                (RecordKind::BundleEnd, 103),
                (RecordKind::BundleEnd, 300),
            ]
        );
        assert_eq!(pool.get(0).is_active(), survives);
    }

    #[rstest]
    fn test_drop_list_without_closing_boundary_stalls() {
        let coverage = buffer(&[(1, 300, 20.0)]);
        let drops = vec![DropCandidate {
            position: 1,
            polarity: Polarity::Start,
            retained_fraction: 0.0,
            coverage_delta: 20.0,
        }];
        let mut pool = pool(&[(100, 200, 15.0)]);

        let err = EventMerger::new(5, &coverage, &drops, &mut pool)
            .merge()
            .unwrap_err();

        assert_eq!(
            err,
            InvariantViolation::StalledMerge {
                drop_cursor: 1,
                drops: 0,
                start_cursor: 1,
                end_cursor: 1,
                junctions: 1,
            }
        );
    }

    #[rstest]
    #[case(None, None, false)]
    #[case(Some(3), None, true)]
    #[case(None, Some(3), false)]
    #[case(Some(3), Some(3), false)]
    #[case(Some(2), Some(3), true)]
    fn test_exhausted_sorts_last(
        #[case] a: Option<i64>,
        #[case] b: Option<i64>,
        #[case] expected: bool,
    ) {
        assert_eq!(precedes(a, b), expected);
    }
}
