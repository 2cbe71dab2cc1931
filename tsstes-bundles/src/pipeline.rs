use log::debug;
use tsstes_core::config::DetectionParams;
use tsstes_core::models::CoverageSegment;

use crate::coverage::{ContiguousRun, CoverageBuffer};
use crate::drops::{DropCandidate, DropDetector, JunctionCursors};
use crate::errors::{BundleError, InvariantViolation, Result};
use crate::finalize::BundleFinalizer;
use crate::junctions::JunctionPool;
use crate::merge::EventMerger;
use crate::noise::NoiseFilter;
use crate::report::Bundle;

#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    /// Nothing was buffered.
    Empty,
    /// Too short, or no run with enough coverage.
    Skipped,
    Analysed(Vec<Bundle>),
}

///
/// Owns every buffer of the candidate caller. Evidence for one region is
/// accumulated through [BundlePipeline::push_segment] and
/// [BundlePipeline::junctions_mut], then [BundlePipeline::process_region]
/// runs noise filtering, drop detection, the event merge and the finalizer,
/// and resets the buffers. Only the pending junctions survive a region.
///
pub struct BundlePipeline {
    params: DetectionParams,
    coverage: CoverageBuffer,
    pool: JunctionPool,
    drops: Vec<DropCandidate>,
    next_bundle: u64,
}

impl BundlePipeline {
    pub fn new(params: DetectionParams) -> Self {
        BundlePipeline {
            params,
            coverage: CoverageBuffer::new(),
            pool: JunctionPool::new(),
            drops: Vec::new(),
            next_bundle: 0,
        }
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn push_segment(&mut self, segment: CoverageSegment) {
        self.coverage.push(segment);
    }

    pub fn coverage(&self) -> &CoverageBuffer {
        &self.coverage
    }

    pub fn junctions_mut(&mut self) -> &mut JunctionPool {
        &mut self.pool
    }

    pub fn junctions(&self) -> &JunctionPool {
        &self.pool
    }

    /// Number of bundles reported so far; also the index of the next one.
    pub fn bundles_emitted(&self) -> u64 {
        self.next_bundle
    }

    ///
    /// Process the buffered region of `chrom` and reset the buffers.
    ///
    /// The region is analysed only if it covers more than `win` bases and at
    /// least one contiguous run has a mean coverage above `lowcov`.
    ///
    pub fn process_region(&mut self, chrom: &str) -> Result<RegionOutcome> {
        let (Some(first), Some(last)) = (self.coverage.first(), self.coverage.last()) else {
            return Ok(RegionOutcome::Empty);
        };
        let (start, end) = (first.start, last.end);

        let runs = self.coverage.contiguous_runs();
        if !self.worth_analysing(&runs) {
            debug!(
                "Skipping {}:{}-{} ({} segments, {} junctions)",
                chrom,
                start,
                end,
                self.coverage.len(),
                self.pool.len()
            );
            self.reset();
            return Ok(RegionOutcome::Skipped);
        }

        let bundles = self
            .analyse(chrom, &runs)
            .map_err(|violation| BundleError::InvariantViolation {
                chrom: chrom.to_string(),
                violation,
            })?;

        debug!(
            "Region {}:{}-{}: {} runs, {} drops, {} bundles",
            chrom,
            start,
            end,
            runs.len(),
            self.drops.len(),
            bundles.len()
        );

        self.reset();
        Ok(RegionOutcome::Analysed(bundles))
    }

    fn worth_analysing(&self, runs: &[ContiguousRun]) -> bool {
        if self.coverage.covered_length() <= self.params.win {
            return false;
        }

        let segments = self.coverage.segments();
        runs.iter().any(|run| {
            let run_segments = &segments[run.first..=run.last];
            let total: f64 = run_segments.iter().map(|s| s.total()).sum();
            let span = run_segments[run_segments.len() - 1].end - run_segments[0].start + 1;
            total > 0.0 && total / span as f64 > self.params.lowcov
        })
    }

    fn analyse(
        &mut self,
        chrom: &str,
        runs: &[ContiguousRun],
    ) -> std::result::Result<Vec<Bundle>, InvariantViolation> {
        self.pool.sort_by_end();
        let suppressed = NoiseFilter::new(self.params.smallcov).apply(&mut self.pool);
        if suppressed > 0 {
            debug!("{}: {} junctions suppressed as noise", chrom, suppressed);
        }

        self.drops.clear();
        let detector = DropDetector::new(&self.params);
        let mut cursors = JunctionCursors::default();
        for &run in runs {
            detector.scan_run(
                &self.coverage,
                run,
                &self.pool,
                &mut cursors,
                &mut self.drops,
            )?;
        }

        let mut records =
            EventMerger::new(self.params.delta, &self.coverage, &self.drops, &mut self.pool)
                .merge()?;

        BundleFinalizer::new(&self.params, chrom, &self.pool, &self.drops)
            .finalize(&mut records, &mut self.next_bundle)
    }

    fn reset(&mut self) {
        self.coverage.clear();
        self.pool.clear();
        self.drops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsstes_core::models::{Junction, Strand};

    use crate::records::RecordKind;

    #[fixture]
    fn pipeline() -> BundlePipeline {
        BundlePipeline::new(DetectionParams::default())
    }

    #[rstest]
    fn test_empty_region(mut pipeline: BundlePipeline) {
        assert_eq!(pipeline.process_region("chr1").unwrap(), RegionOutcome::Empty);
    }

    #[rstest]
    fn test_trivial_region(mut pipeline: BundlePipeline) {
        pipeline.push_segment(CoverageSegment::new(100, 300, 20.0));

        let RegionOutcome::Analysed(bundles) = pipeline.process_region("chr1").unwrap() else {
            panic!("region should be analysed");
        };
        assert_eq!(bundles.len(), 1);
        assert_eq!((bundles[0].first, bundles[0].last), (100, 300));
        let kinds: Vec<RecordKind> = bundles[0].entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![RecordKind::BundleStart, RecordKind::BundleEnd]);
        assert_eq!(pipeline.bundles_emitted(), 1);
        assert!(pipeline.coverage().is_empty());
    }

    #[rstest]
    #[case(vec![(1, 150, 40.0)])]
    #[case(vec![(1, 400, 10.0)])]
    #[case(vec![(1, 100, 9.0), (102, 300, 8.0)])]
    fn test_gated_regions_are_skipped(
        mut pipeline: BundlePipeline,
        #[case] segments: Vec<(i64, i64, f64)>,
    ) {
        for (start, end, cov) in segments {
            pipeline.push_segment(CoverageSegment::new(start, end, cov));
        }
        assert_eq!(pipeline.process_region("chr1").unwrap(), RegionOutcome::Skipped);
        assert!(pipeline.coverage().is_empty());
        assert_eq!(pipeline.bundles_emitted(), 0);
    }

    #[rstest]
    fn test_one_good_run_is_enough(mut pipeline: BundlePipeline) {
        pipeline.push_segment(CoverageSegment::new(1, 100, 2.0));
        pipeline.push_segment(CoverageSegment::new(200, 260, 30.0));

        assert!(matches!(
            pipeline.process_region("chr1").unwrap(),
            RegionOutcome::Analysed(_)
        ));
    }

    #[rstest]
    fn test_pending_junctions_survive_reset(mut pipeline: BundlePipeline) {
        pipeline.push_segment(CoverageSegment::new(1, 400, 20.0));
        pipeline.junctions_mut().push_pending(Junction {
            chrom: "chr1".to_string(),
            start: 900,
            end: 1200,
            coverage: 30.0,
            strand: Strand::Plus,
            splice_start: 0.3,
        });

        pipeline.process_region("chr1").unwrap();
        assert_eq!(pipeline.junctions().pending_len(), 1);
        assert!(pipeline.junctions().is_empty());
    }
}
