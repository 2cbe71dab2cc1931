use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{info, warn};

use tsstes_bundles::{OutputFormat, RunSummary, call_candidates, writer_for};
use tsstes_core::config::DetectionParams;
use tsstes_core::utils::{get_dynamic_reader, get_dynamic_reader_w_stdin};

use super::cli::DEFAULT_FORMAT;

///
/// Build the detection parameters: defaults, then the `--config` file, then
/// individual flags. The result is validated.
///
pub fn detection_params(matches: &ArgMatches) -> Result<DetectionParams> {
    let mut params = match matches.get_one::<String>("config") {
        Some(path) => DetectionParams::try_from(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => DetectionParams::default(),
    };

    if let Some(win) = matches.get_one::<i64>("win") {
        params.win = *win;
    }
    if let Some(smallwin) = matches.get_one::<i64>("smallwin") {
        params.smallwin = *smallwin;
    }
    if let Some(delta) = matches.get_one::<i64>("delta") {
        params.delta = *delta;
    }
    if let Some(lowcov) = matches.get_one::<f64>("lowcov") {
        params.lowcov = *lowcov;
    }
    if let Some(percnoise) = matches.get_one::<f64>("percnoise") {
        params.percnoise = *percnoise;
    }

    params.validate().context("Invalid detection parameters")?;
    Ok(params)
}

///
/// `--format` wins. Without it a `.jsonl`/`.json` output file selects JSON
/// lines, anything else the TSV report.
///
pub fn output_format(matches: &ArgMatches) -> Result<OutputFormat> {
    if let Some(format) = matches.get_one::<String>("format") {
        return match OutputFormat::from_str(format) {
            Ok(format) => Ok(format),
            Err(_err) => anyhow::bail!("Unknown output format supplied: {}", format),
        };
    }

    let inferred = matches
        .get_one::<String>("output")
        .and_then(|output| Path::new(output).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| matches!(*ext, "jsonl" | "json"));

    match inferred {
        Some(ext) => {
            warn!("No --format given, writing JSON lines because of the .{} output", ext);
            Ok(OutputFormat::JsonLines)
        }
        None => Ok(OutputFormat::from_str(DEFAULT_FORMAT).unwrap_or_default()),
    }
}

pub fn run_call(matches: &ArgMatches) -> Result<RunSummary> {
    let coverage = matches
        .get_one::<String>("coverage")
        .expect("A path to a coverage file is required.");

    let junctions = matches
        .get_one::<String>("junctions")
        .expect("A path to a junction file is required.");

    if junctions == "-" {
        anyhow::bail!("Only the coverage input can be read from stdin");
    }

    let params = detection_params(matches)?;
    let format = output_format(matches)?;

    let coverage_reader = get_dynamic_reader_w_stdin(coverage)
        .with_context(|| format!("Failed to open coverage input {}", coverage))?;
    let junction_reader = get_dynamic_reader(Path::new(junctions))
        .with_context(|| format!("Failed to open junction input {}", junctions))?;

    let out: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut writer = writer_for(format, out);

    let summary = call_candidates(
        coverage_reader,
        junction_reader,
        params,
        writer.as_mut(),
        matches.get_flag("progress"),
    )
    .context("Candidate calling failed")?;

    info!(
        "{} junctions admitted, {} rejected; {} malformed coverage and {} malformed junction lines skipped",
        summary.junctions_admitted,
        summary.junctions_rejected,
        summary.malformed_coverage_lines,
        summary.malformed_junction_lines
    );

    Ok(summary)
}
