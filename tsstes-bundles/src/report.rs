//! Reported bundles and their writers.

use std::io::Write;
use std::str::FromStr;

use serde::Serialize;
use tsstes_core::models::Strand;

use crate::errors::Result;
use crate::records::RecordKind;

/// The far end of a junction supporting a reported event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionRef {
    pub position: i64,
    pub strand: Strand,
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    Junctions(Vec<JunctionRef>),
    Drop { coverage_delta: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub kind: RecordKind,
    pub position: i64,
    pub confidence: f64,
    pub point_coverage: f64,
    /// Mean coverage up to the next reported entry (0 for the last one).
    pub coverage_to_next: f64,
    pub detail: Detail,
}

///
/// One output block: a transcribed region with its retained events.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    pub chrom: String,
    pub index: u64,
    pub first: i64,
    pub last: i64,
    pub mean_coverage: f64,
    pub entries: Vec<ReportEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Tsv,
    JsonLines,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "jsonl" | "json" => Ok(OutputFormat::JsonLines),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

pub trait BundleWriter {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

///
/// Writes the tab-separated report: a `bundle` header line per bundle followed
/// by one line per retained event.
///
pub struct TsvWriter<W: Write> {
    out: W,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W) -> Self {
        TsvWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> BundleWriter for TsvWriter<W> {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<()> {
        writeln!(
            self.out,
            "bundle\t{}\t{}\t{}\t{}\t{:.2}",
            bundle.chrom, bundle.index, bundle.first, bundle.last, bundle.mean_coverage
        )?;

        for entry in &bundle.entries {
            write!(
                self.out,
                "{}\t{}\t{:.6}\t{:.0}\t{:.3}",
                entry.kind,
                entry.position,
                entry.confidence,
                entry.point_coverage,
                entry.coverage_to_next
            )?;
            match &entry.detail {
                Detail::Junctions(junctions) => {
                    for j in junctions {
                        write!(self.out, "\t{}:{}:{:.0}", j.position, j.strand, j.coverage)?;
                    }
                }
                Detail::Drop { coverage_delta } => write!(self.out, "\t{:.2}", coverage_delta)?,
            }
            writeln!(self.out)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per bundle, one bundle per line.
pub struct JsonLinesWriter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        JsonLinesWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> BundleWriter for JsonLinesWriter<W> {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<()> {
        serde_json::to_writer(&mut self.out, bundle)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Box a writer for the requested format.
pub fn writer_for<'a, W: Write + 'a>(format: OutputFormat, out: W) -> Box<dyn BundleWriter + 'a> {
    match format {
        OutputFormat::Tsv => Box::new(TsvWriter::new(out)),
        OutputFormat::JsonLines => Box::new(JsonLinesWriter::new(out)),
    }
}
