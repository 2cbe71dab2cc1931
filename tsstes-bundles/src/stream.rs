//! Streaming driver - reads the coverage and junction streams side by side,
//! delimits regions and hands each one to the [BundlePipeline].
//!
//! Both inputs must be sorted by chromosome and position. Coverage is read
//! line by line; junctions are pulled lazily, only as far as the current
//! region reaches, with the first junction past the region held back in the
//! pipeline's pending set.

use std::io::{BufRead, Lines};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serde::Serialize;
use tsstes_core::config::DetectionParams;
use tsstes_core::models::{CoverageLine, JunctionLine};

use crate::errors::Result;
use crate::pipeline::{BundlePipeline, RegionOutcome};
use crate::report::BundleWriter;

// ──────────────────────────────────────────────
// Public types
// ──────────────────────────────────────────────

/// Counters of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub chromosomes: usize,
    pub bundles: u64,
    pub regions_processed: usize,
    pub regions_skipped: usize,
    pub malformed_coverage_lines: usize,
    pub malformed_junction_lines: usize,
    pub junctions_admitted: usize,
    pub junctions_rejected: usize,
}

// ──────────────────────────────────────────────
// Junction feed
// ──────────────────────────────────────────────

struct JunctionFeed<J: BufRead> {
    lines: Lines<J>,
}

impl<J: BufRead> JunctionFeed<J> {
    fn new(reader: J) -> Result<Self> {
        let mut lines = reader.lines();
        if let Some(header) = lines.next() {
            header?;
        }
        Ok(JunctionFeed { lines })
    }

    ///
    /// Read junctions into the pipeline until the first line that lies on
    /// another chromosome or starts past `bundle_end`. That line still goes
    /// through admission; if admitted it waits in the pending set.
    ///
    fn fill(
        &mut self,
        chrom: &str,
        bundle_end: &mut i64,
        pipeline: &mut BundlePipeline,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for line in self.lines.by_ref() {
            let line = line?;
            let parsed: JunctionLine = match line.parse() {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping junction line {:?}: {}", line, e);
                    summary.malformed_junction_lines += 1;
                    continue;
                }
            };

            let beyond = parsed.chrom != chrom || parsed.start > *bundle_end;

            if parsed.passes_noise_filter(pipeline.params()) {
                summary.junctions_admitted += 1;
                let junction = parsed.into_junction();
                if beyond {
                    pipeline.junctions_mut().push_pending(junction);
                } else {
                    *bundle_end = (*bundle_end).max(junction.end);
                    pipeline.junctions_mut().push(junction);
                }
            } else {
                summary.junctions_rejected += 1;
            }

            if beyond {
                break;
            }
        }

        Ok(())
    }
}

// ──────────────────────────────────────────────
// Driver
// ──────────────────────────────────────────────

fn spinner(show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar
}

fn flush_region(
    chrom: &str,
    pipeline: &mut BundlePipeline,
    writer: &mut dyn BundleWriter,
    summary: &mut RunSummary,
) -> Result<()> {
    match pipeline.process_region(chrom)? {
        RegionOutcome::Empty => {}
        RegionOutcome::Skipped => summary.regions_skipped += 1,
        RegionOutcome::Analysed(bundles) => {
            summary.regions_processed += 1;
            for bundle in &bundles {
                writer.write_bundle(bundle)?;
            }
        }
    }
    Ok(())
}

///
/// Call TSS/TES candidates for a whole pair of input streams.
///
/// # Arguments
///
/// - coverage: coverage lines (`chrom start end coverage`, 0-based start), one header line
/// - junctions: junction lines (`chrom start end name coverage strand percentages`), one header line
/// - params: detection parameters, already validated
/// - writer: receives every bundle, in input order
/// - progress: show a spinner on stderr
///
/// # Returns
///
/// Counters of the run. Any invariant violation aborts the run with an error.
///
pub fn call_candidates<C: BufRead, J: BufRead>(
    coverage: C,
    junctions: J,
    params: DetectionParams,
    writer: &mut dyn BundleWriter,
    progress: bool,
) -> Result<RunSummary> {
    let mut pipeline = BundlePipeline::new(params);
    let mut feed = JunctionFeed::new(junctions)?;
    let mut summary = RunSummary::default();
    let bar = spinner(progress);

    let mut lines = coverage.lines();
    if let Some(header) = lines.next() {
        header?;
    }

    let mut chrom = String::new();
    let mut bundle_end: i64 = 0;

    for line in lines {
        let line = line?;
        let parsed: CoverageLine = match line.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping coverage line {:?}: {}", line, e);
                summary.malformed_coverage_lines += 1;
                continue;
            }
        };
        let segment = parsed.segment;

        if segment.start > bundle_end + 1 || parsed.chrom != chrom {
            flush_region(&chrom, &mut pipeline, writer, &mut summary)?;
            if parsed.chrom != chrom {
                chrom = parsed.chrom;
                summary.chromosomes += 1;
                info!("Finding {} TSS/TES candidates", chrom);
                bar.set_message(format!("Finding {} TSS/TES candidates", chrom));
            }
            bundle_end = 0;
        }

        bundle_end = bundle_end.max(segment.end);
        pipeline.push_segment(segment);
        bar.tick();

        if pipeline.junctions_mut().absorb_pending(&chrom, &mut bundle_end) {
            feed.fill(&chrom, &mut bundle_end, &mut pipeline, &mut summary)?;
        }
    }

    flush_region(&chrom, &mut pipeline, writer, &mut summary)?;
    writer.finish()?;
    bar.finish_and_clear();

    summary.bundles = pipeline.bundles_emitted();
    info!(
        "Done: {} bundles from {} regions ({} skipped) on {} chromosomes",
        summary.bundles, summary.regions_processed, summary.regions_skipped, summary.chromosomes
    );

    Ok(summary)
}
