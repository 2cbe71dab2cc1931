use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;

use crate::errors::ParseError;

///
/// A maximal run of uniform coverage, in 1-based inclusive coordinates.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSegment {
    pub start: i64,
    pub end: i64,
    pub coverage: f64,
}

impl CoverageSegment {
    pub fn new(start: i64, end: i64, coverage: f64) -> Self {
        CoverageSegment {
            start,
            end,
            coverage,
        }
    }

    ///
    /// Number of bases covered by the segment
    ///
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Coverage-weighted length of the whole segment.
    pub fn total(&self) -> f64 {
        self.len() as f64 * self.coverage
    }
}

///
/// One parsed line of the coverage (bedGraph-like) stream.
///
/// The start column is 0-based in the file; it is shifted to 1-based on parse.
///
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageLine {
    pub chrom: String,
    pub segment: CoverageSegment,
}

impl FromStr for CoverageLine {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 4 {
            return Err(ParseError::FieldCount {
                expected: 4,
                found: fields.len(),
            });
        }

        let start = parse_position("start", fields[1])?;
        let end = parse_position("end", fields[2])?;
        let coverage = fields[3]
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidNumber {
                field: "coverage",
                value: fields[3].to_string(),
            })?;

        Ok(CoverageLine {
            chrom: fields[0].to_string(),
            segment: CoverageSegment::new(start + 1, end, coverage),
        })
    }
}

impl Display for CoverageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.chrom,
            self.segment.start - 1,
            self.segment.end,
            self.segment.coverage
        )
    }
}

pub(crate) fn parse_position(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger {
            field,
            value: value.to_string(),
        })
}
