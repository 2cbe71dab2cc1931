use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::config::DetectionParams;
use crate::errors::ParseError;
use crate::models::coverage::parse_position;

///
/// Strand of a splice junction. `Unknown` ('.') is compatible with either strand.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    pub fn is_known(&self) -> bool {
        !matches!(self, Strand::Unknown)
    }

    /// Equal strands, or either side unknown.
    pub fn compatible(&self, other: &Strand) -> bool {
        self == other || !self.is_known() || !other.is_known()
    }

    pub fn as_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }
}

impl FromStr for Strand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            "." => Ok(Strand::Unknown),
            other => Err(ParseError::InvalidStrand(other.to_string())),
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for Strand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

///
/// The `spliceStart-spliceOther-percentLeft-percentRight` column of a junction line.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpliceEvidence {
    pub splice_start: f64,
    pub splice_other: f64,
    pub percent_left: f64,
    pub percent_right: f64,
}

impl SpliceEvidence {
    pub fn max_splice(&self) -> f64 {
        self.splice_start.max(self.splice_other)
    }

    pub fn min_splice(&self) -> f64 {
        self.splice_start.min(self.splice_other)
    }

    pub fn min_percent(&self) -> f64 {
        self.percent_left.min(self.percent_right)
    }
}

impl FromStr for SpliceEvidence {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidSpliceEvidence(s.to_string());

        // a '-' directly after an exponent marker belongs to the number
        let mut values: Vec<f64> = Vec::with_capacity(4);
        let mut token = String::new();
        for piece in s.trim().split('-') {
            if piece.is_empty() {
                token.push('-');
                continue;
            }
            if token.ends_with(['e', 'E']) {
                token.push('-');
            }
            token.push_str(piece);
            if token.ends_with(['e', 'E']) {
                continue;
            }
            values.push(token.parse::<f64>().map_err(|_| invalid())?);
            token.clear();
        }

        if !token.is_empty() || values.len() != 4 {
            return Err(invalid());
        }

        Ok(SpliceEvidence {
            splice_start: values[0],
            splice_other: values[1],
            percent_left: values[2],
            percent_right: values[3],
        })
    }
}

///
/// One parsed line of the junction stream, before admission.
///
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionLine {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub name: String,
    pub coverage: f64,
    pub strand: Strand,
    pub evidence: SpliceEvidence,
}

impl FromStr for JunctionLine {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 7 {
            return Err(ParseError::FieldCount {
                expected: 7,
                found: fields.len(),
            });
        }

        let coverage = fields[4]
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidNumber {
                field: "coverage",
                value: fields[4].to_string(),
            })?;

        Ok(JunctionLine {
            chrom: fields[0].to_string(),
            start: parse_position("start", fields[1])?,
            end: parse_position("end", fields[2])?,
            name: fields[3].to_string(),
            coverage,
            strand: fields[5].parse()?,
            evidence: fields[6].parse()?,
        })
    }
}

impl JunctionLine {
    ///
    /// Two-stage splice noise filter deciding whether a junction enters the pipeline.
    ///
    /// Stage one needs some splicing signal and enough reads (fewer reads are
    /// tolerated when the strand is known). Stage two accepts very high coverage
    /// stranded junctions outright, otherwise needs both flank percentages and
    /// both splice scores above noise, relaxing the splice score bound for
    /// well covered stranded junctions.
    ///
    pub fn passes_noise_filter(&self, params: &DetectionParams) -> bool {
        let known = self.strand.is_known();
        let cov = self.coverage;
        let ev = &self.evidence;

        let has_signal = ev.max_splice() > params.splicenoise
            && ((cov >= params.lowcov && known) || cov >= params.smallcov);
        if !has_signal {
            return false;
        }

        (cov > params.highcov && known)
            || (ev.min_percent() > params.splicenoise
                && (ev.min_splice() > params.splicenoise
                    || (ev.min_splice() > params.highnoise && cov > params.smallcov && known)))
    }

    /// Admit the line as a junction; the end coordinate is made exclusive-by-one.
    pub fn into_junction(self) -> Junction {
        Junction {
            chrom: self.chrom,
            start: self.start,
            end: self.end + 1,
            coverage: self.coverage,
            strand: self.strand,
            splice_start: self.evidence.splice_start,
        }
    }
}

///
/// An admitted splice junction. A coverage of zero is a tombstone: the junction
/// was retracted and must be treated as absent, but it stays in place so that
/// indices held elsewhere stay valid.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub coverage: f64,
    pub strand: Strand,
    pub splice_start: f64,
}

impl Junction {
    pub fn is_active(&self) -> bool {
        self.coverage > 0.0
    }

    /// Tombstone the junction. Retracting twice is a no-op.
    pub fn retract(&mut self) {
        self.coverage = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn line(coverage: f64, strand: Strand, evidence: [f64; 4]) -> JunctionLine {
        JunctionLine {
            chrom: "chr1".to_string(),
            start: 1000,
            end: 2000,
            name: "JUNC1".to_string(),
            coverage,
            strand,
            evidence: SpliceEvidence {
                splice_start: evidence[0],
                splice_other: evidence[1],
                percent_left: evidence[2],
                percent_right: evidence[3],
            },
        }
    }

    #[fixture]
    fn params() -> DetectionParams {
        DetectionParams::default()
    }

    #[rstest]
    fn test_parse_junction_line() {
        let parsed: JunctionLine = "chr1\t100\t200\tJ1\t12\t+\t0.02-0.001-0.3-0.1"
            .parse()
            .unwrap();
        assert_eq!(parsed.start, 100);
        assert_eq!(parsed.end, 200);
        assert_eq!(parsed.strand, Strand::Plus);
        assert_eq!(parsed.evidence.splice_other, 0.001);
        assert_eq!(parsed.evidence.percent_right, 0.1);
    }

    #[rstest]
    fn test_parse_exponent_in_evidence() {
        let ev: SpliceEvidence = "1e-05-0.5-2.5E-3-1".parse().unwrap();
        assert_eq!(ev.splice_start, 1e-5);
        assert_eq!(ev.splice_other, 0.5);
        assert_eq!(ev.percent_left, 2.5e-3);
        assert_eq!(ev.percent_right, 1.0);
    }

    #[rstest]
    #[case("0.1-0.2-0.3")]
    #[case("0.1-0.2-0.3-0.4-0.5")]
    #[case("a-b-c-d")]
    fn test_parse_bad_evidence(#[case] raw: &str) {
        assert!(raw.parse::<SpliceEvidence>().is_err());
    }

    #[rstest]
    #[case("chr1\t100\t200\tJ1\t12\t+")]
    #[case("chr1\t100\t200\tJ1\t12\t*\t0.1-0.1-0.1-0.1")]
    #[case("chr1\tx\t200\tJ1\t12\t+\t0.1-0.1-0.1-0.1")]
    fn test_malformed_junction_lines(#[case] raw: &str) {
        assert!(raw.parse::<JunctionLine>().is_err());
    }

    #[rstest]
    fn test_strand_compatibility() {
        assert!(Strand::Plus.compatible(&Strand::Plus));
        assert!(Strand::Plus.compatible(&Strand::Unknown));
        assert!(Strand::Unknown.compatible(&Strand::Minus));
        assert!(!Strand::Plus.compatible(&Strand::Minus));
    }

    #[rstest]
    fn test_into_junction_shifts_end() {
        let j = line(20.0, Strand::Minus, [0.1, 0.1, 0.1, 0.1]).into_junction();
        assert_eq!(j.start, 1000);
        assert_eq!(j.end, 2001);
        assert!(j.is_active());
    }

    #[rstest]
    fn test_retract_is_idempotent() {
        let mut j = line(20.0, Strand::Minus, [0.1, 0.1, 0.1, 0.1]).into_junction();
        j.retract();
        j.retract();
        assert!(!j.is_active());
        assert_eq!(j.coverage, 0.0);
    }

    // min splice score 0.001 is below highnoise, so the relaxed branch fails too
    #[rstest]
    fn test_low_min_splice_is_rejected(params: DetectionParams) {
        let j = line(60.0, Strand::Plus, [0.02, 0.001, 0.3, 0.1]);
        assert!(!j.passes_noise_filter(&params));
    }

    #[rstest]
    fn test_relaxed_branch_admits(params: DetectionParams) {
        let j = line(60.0, Strand::Plus, [0.02, 0.006, 0.3, 0.1]);
        assert!(j.passes_noise_filter(&params));
    }

    // stage one: max splice score must be strictly above splicenoise
    #[rstest]
    #[case([0.01, 0.01, 0.5, 0.5], false)]
    #[case([0.011, 0.011, 0.5, 0.5], true)]
    fn test_stage_one_splice_bound(
        params: DetectionParams,
        #[case] ev: [f64; 4],
        #[case] admitted: bool,
    ) {
        assert_eq!(line(20.0, Strand::Plus, ev).passes_noise_filter(&params), admitted);
    }

    // stage one: lowcov is inclusive for stranded, smallcov inclusive for unstranded
    #[rstest]
    #[case(9.9, Strand::Plus, false)]
    #[case(10.0, Strand::Plus, true)]
    #[case(49.0, Strand::Unknown, false)]
    #[case(50.0, Strand::Unknown, true)]
    fn test_stage_one_coverage_bounds(
        params: DetectionParams,
        #[case] cov: f64,
        #[case] strand: Strand,
        #[case] admitted: bool,
    ) {
        let j = line(cov, strand, [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(j.passes_noise_filter(&params), admitted);
    }

    // stage two: highcov shortcut is strict and needs a known strand
    #[rstest]
    #[case(100.0, Strand::Plus, false)]
    #[case(100.5, Strand::Plus, true)]
    #[case(150.0, Strand::Unknown, false)]
    fn test_stage_two_highcov_shortcut(
        params: DetectionParams,
        #[case] cov: f64,
        #[case] strand: Strand,
        #[case] admitted: bool,
    ) {
        // percentages below noise so only the shortcut can admit
        let j = line(cov, strand, [0.5, 0.5, 0.001, 0.5]);
        assert_eq!(j.passes_noise_filter(&params), admitted);
    }

    // stage two: the flank percentage bound is strict
    #[rstest]
    #[case(0.01, false)]
    #[case(0.0101, true)]
    fn test_stage_two_percent_bound(
        params: DetectionParams,
        #[case] min_percent: f64,
        #[case] admitted: bool,
    ) {
        let j = line(20.0, Strand::Plus, [0.5, 0.5, min_percent, 0.9]);
        assert_eq!(j.passes_noise_filter(&params), admitted);
    }

    // relaxed branch: min splice in (highnoise, splicenoise], coverage strictly above smallcov
    #[rstest]
    #[case(0.005, 60.0, Strand::Plus, false)]
    #[case(0.0051, 60.0, Strand::Plus, true)]
    #[case(0.008, 50.0, Strand::Plus, false)]
    #[case(0.008, 51.0, Strand::Plus, true)]
    #[case(0.008, 60.0, Strand::Unknown, false)]
    fn test_stage_two_relaxed_branch(
        params: DetectionParams,
        #[case] min_splice: f64,
        #[case] cov: f64,
        #[case] strand: Strand,
        #[case] admitted: bool,
    ) {
        let j = line(cov, strand, [0.5, min_splice, 0.5, 0.5]);
        assert_eq!(j.passes_noise_filter(&params), admitted);
    }
}
