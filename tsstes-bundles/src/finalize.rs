//! Second pass over a region's records: boundary noise trimming, sub-bundle
//! filtering and the per-bundle summary.

use tsstes_core::config::DetectionParams;

use crate::drops::DropCandidate;
use crate::errors::InvariantViolation;
use crate::junctions::JunctionPool;
use crate::records::{Evidence, Record, RecordKind};
use crate::report::{Bundle, Detail, JunctionRef, ReportEntry};

pub struct BundleFinalizer<'a> {
    window: i64,
    small_window: i64,
    low_coverage: f64,
    chrom: &'a str,
    pool: &'a JunctionPool,
    drops: &'a [DropCandidate],
}

impl<'a> BundleFinalizer<'a> {
    pub fn new(
        params: &DetectionParams,
        chrom: &'a str,
        pool: &'a JunctionPool,
        drops: &'a [DropCandidate],
    ) -> Self {
        BundleFinalizer {
            window: params.win,
            small_window: params.smallwin,
            low_coverage: params.lowcov,
            chrom,
            pool,
            drops,
        }
    }

    ///
    /// Trim the record stream of one region and cut it into reported bundles.
    ///
    /// A confidence-0 bundle start lying past the furthest junction end seen so
    /// far opens a new bundle. Bundle indices are taken from `next_index`.
    ///
    pub fn finalize(
        &self,
        records: &mut [Record],
        next_index: &mut u64,
    ) -> Result<Vec<Bundle>, InvariantViolation> {
        match records.last() {
            Some(last) if last.kind == RecordKind::BundleEnd => {}
            _ => {
                return Err(InvariantViolation::MissingBundleEnd {
                    start: records.first().map_or(0, |r| r.position),
                    end: records.last().map_or(0, |r| r.position),
                });
            }
        }

        let n = records.len();
        let mut last_start: Option<usize> = None;
        let mut last_end: Option<usize> = None;
        let mut last_jstart: Option<usize> = None;
        let mut last_jend: Option<usize> = None;
        let mut bundle_end = records[0].position;
        let mut s = 0;
        let mut bundles = Vec::new();

        for i in 1..n {
            let position = records[i].position;
            let confidence = records[i].confidence;

            match records[i].kind {
                RecordKind::BundleStart if confidence > 0.0 => {
                    if self.weak_neighbour(records, last_jend, position).is_some() {
                        retract_with_sibling(records, i);
                    } else {
                        last_start = Some(i);
                    }
                }
                RecordKind::BundleStart => {
                    if records[i - 1].is_active_at(RecordKind::JunctionEnd, position) {
                        records[i].retract();
                        records[i].point_coverage = 0.0;
                    } else if position > bundle_end {
                        bundles.extend(self.close(records, s, i, next_index));
                        s = i;
                    }
                }
                RecordKind::BundleEnd if confidence > 0.0 => {
                    if self.weak_neighbour(records, last_jstart, position).is_some() {
                        retract_with_sibling(records, i);
                    } else {
                        last_end = Some(i);
                    }
                }
                RecordKind::BundleEnd => {
                    if records[i - 1].is_active_at(RecordKind::JunctionStart, position) {
                        records[i].retract();
                        records[i].point_coverage = 0.0;
                    }
                }
                RecordKind::JunctionStart => {
                    let mut supported = false;
                    for &id in records[i].junctions() {
                        let junction = self.pool.get(id);
                        if junction.is_active() {
                            supported = true;
                            bundle_end = bundle_end.max(junction.end);
                        }
                    }
                    if supported {
                        if confidence < 0.5 {
                            if let Some(e) = self.recent(records, last_end, position) {
                                retract_with_sibling(records, e);
                                last_end = None;
                            }
                        }
                        last_jstart = Some(i);
                    } else {
                        retract_with_sibling(records, i);
                    }
                }
                RecordKind::JunctionEnd => {
                    if self.supported(&records[i]) {
                        if confidence < 0.5 {
                            if let Some(st) = self.recent(records, last_start, position) {
                                retract_with_sibling(records, st);
                                last_start = None;
                            }
                        }
                        last_jend = Some(i);
                    } else {
                        records[i].retract();
                    }
                }
            }
        }

        bundles.extend(self.close(records, s, n, next_index));
        Ok(bundles)
    }

    fn supported(&self, record: &Record) -> bool {
        record
            .junctions()
            .iter()
            .any(|&id| self.pool.get(id).is_active())
    }

    /// The tracked record, if still active and less than `smallwin` bases behind `position`.
    fn recent(&self, records: &[Record], tracked: Option<usize>, position: i64) -> Option<usize> {
        tracked.filter(|&t| {
            records[t].is_active() && position - records[t].position < self.small_window
        })
    }

    fn weak_neighbour(
        &self,
        records: &[Record],
        tracked: Option<usize>,
        position: i64,
    ) -> Option<usize> {
        self.recent(records, tracked, position)
            .filter(|&t| records[t].confidence < 0.5)
    }

    ///
    /// Close the records `[s, e)`: discard short or weak sub-bundles without
    /// junction support and summarize what is left as one bundle.
    ///
    fn close(
        &self,
        records: &mut [Record],
        s: usize,
        e: usize,
        next_index: &mut u64,
    ) -> Option<Bundle> {
        let mut open: Option<usize> = Some(s);
        let mut after_close = s;
        let mut sum = 0.0;
        let mut sum_open = 0.0;
        let mut has_junctions = false;
        let mut retained = 0usize;
        let mut real_end: Option<usize> = None;

        for i in s..e {
            let carried = records[i].carried_coverage();
            sum += carried;
            if !records[i].is_active() {
                if open.is_some() {
                    sum_open += carried;
                }
                continue;
            }
            sum_open += carried;
            retained += 1;

            let boundary = records[i].confidence == 0.0;
            match records[i].kind {
                RecordKind::BundleEnd if boundary => {
                    let from = open.unwrap_or(after_close);
                    let len = records[i].position - records[from].position + 1;
                    let weak = len < self.window || sum_open / (len as f64) < self.low_coverage;
                    if !has_junctions && weak {
                        for record in records[from..=i].iter_mut().filter(|r| r.is_active()) {
                            record.retract();
                            retained -= 1;
                        }
                    } else {
                        real_end = Some(i);
                    }
                    open = None;
                    sum_open = 0.0;
                    has_junctions = false;
                    after_close = i + 1;
                }
                RecordKind::BundleStart if boundary => {
                    open = Some(i);
                    has_junctions = false;
                }
                RecordKind::BundleStart | RecordKind::BundleEnd => {}
                RecordKind::JunctionStart | RecordKind::JunctionEnd => has_junctions = true,
            }
        }

        if retained == 0 {
            return None;
        }

        let first = (s..e).find(|&i| records[i].is_active())?;
        let last = real_end
            .filter(|&i| records[i].is_active())
            .or_else(|| (s..e).rev().find(|&i| records[i].is_active()))?;
        let span = records[last].position - records[first].position + 1;

        let entries = (s..e)
            .filter(|&i| records[i].is_active())
            .map(|i| self.entry(records, i, e))
            .collect();

        let bundle = Bundle {
            chrom: self.chrom.to_string(),
            index: *next_index,
            first: records[first].position,
            last: records[last].position,
            mean_coverage: sum / span as f64,
            entries,
        };
        *next_index += 1;

        Some(bundle)
    }

    fn entry(&self, records: &[Record], i: usize, e: usize) -> ReportEntry {
        let record = &records[i];
        let detail = match &record.evidence {
            Evidence::Drop(d) => Detail::Drop {
                coverage_delta: self.drops[*d].coverage_delta,
            },
            Evidence::Junctions(ids) => Detail::Junctions(
                ids.iter()
                    .map(|&id| self.pool.get(id))
                    .filter(|j| j.is_active())
                    .map(|j| JunctionRef {
                        position: match record.kind {
                            RecordKind::JunctionEnd => j.start,
                            _ => j.end,
                        },
                        strand: j.strand,
                        coverage: j.coverage,
                    })
                    .collect(),
            ),
        };

        ReportEntry {
            kind: record.kind,
            position: record.position,
            confidence: record.confidence,
            point_coverage: record.point_coverage,
            coverage_to_next: mean_to_next(records, i, e),
            detail,
        }
    }
}

///
/// Retract record `x`. If an active record at the same position precedes it
/// (skipping retracted ones), `x`'s point coverage is dropped as well so it is
/// not counted twice.
///
fn retract_with_sibling(records: &mut [Record], x: usize) {
    let position = records[x].position;
    if let Some(prev) = records[..x].iter().rev().find(|r| r.is_active()) {
        if prev.position == position {
            records[x].point_coverage = 0.0;
        }
    }
    records[x].retract();
}

///
/// Mean coverage from record `i` up to the next active record before `e`,
/// folding in whatever the retracted records in between carried. Bundle
/// starts and junction ends count their own base, bundle ends and junction
/// starts on the far side count theirs.
///
fn mean_to_next(records: &[Record], i: usize, e: usize) -> f64 {
    let record = &records[i];
    let mut cov = record.coverage_to_next;
    let mut start = record.position;
    match record.kind {
        RecordKind::BundleStart | RecordKind::JunctionEnd => cov += record.point_coverage,
        RecordKind::BundleEnd | RecordKind::JunctionStart => start += 1,
    }

    let mut j = i + 1;
    while j < e && !records[j].is_active() {
        cov += records[j].carried_coverage();
        j += 1;
    }
    if j >= e {
        return 0.0;
    }

    let next = &records[j];
    let mut len = 0;
    if matches!(
        next.kind,
        RecordKind::BundleEnd | RecordKind::JunctionStart
    ) {
        cov += next.point_coverage;
        len += 1;
    }
    len += next.position - start;

    if len > 0 { cov / len as f64 } else { cov }
}
