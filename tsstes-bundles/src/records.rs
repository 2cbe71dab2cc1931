//! Annotated events of a region, in position order.

use std::fmt::{self, Display};

use serde::Serialize;

use crate::junctions::JunctionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    #[serde(rename = "tstart")]
    BundleStart,
    #[serde(rename = "tend")]
    BundleEnd,
    #[serde(rename = "jstart")]
    JunctionStart,
    #[serde(rename = "jend")]
    JunctionEnd,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::BundleStart => "tstart",
            RecordKind::BundleEnd => "tend",
            RecordKind::JunctionStart => "jstart",
            RecordKind::JunctionEnd => "jend",
        }
    }

    pub fn is_junction(&self) -> bool {
        matches!(self, RecordKind::JunctionStart | RecordKind::JunctionEnd)
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Retracted,
}

/// What a record was derived from.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Index into the region's drop candidates.
    Drop(usize),
    /// The junction group, by pool handle.
    Junctions(Vec<JunctionId>),
}

///
/// One event of the merged stream. Retracted records keep their position so
/// the stream stays ordered; they are skipped in the report but their
/// coverage is folded into the neighbouring records.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub position: i64,
    pub status: Status,
    pub evidence: Evidence,
    /// 0 for run boundaries; drop fraction or flank coverage ratio otherwise.
    pub confidence: f64,
    pub point_coverage: f64,
    /// Summed coverage of the gap up to the next record.
    pub coverage_to_next: f64,
}

impl Record {
    pub fn new(
        kind: RecordKind,
        position: i64,
        evidence: Evidence,
        confidence: f64,
        point_coverage: f64,
    ) -> Self {
        Record {
            kind,
            position,
            status: Status::Active,
            evidence,
            confidence,
            point_coverage,
            coverage_to_next: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Retracting twice is a no-op.
    pub fn retract(&mut self) {
        self.status = Status::Retracted;
    }

    /// Active and of the given kind at the given position.
    pub fn is_active_at(&self, kind: RecordKind, position: i64) -> bool {
        self.is_active() && self.kind == kind && self.position == position
    }

    pub fn junctions(&self) -> &[JunctionId] {
        match &self.evidence {
            Evidence::Junctions(ids) => ids,
            Evidence::Drop(_) => &[],
        }
    }

    /// Total coverage carried by the record, active or not.
    pub fn carried_coverage(&self) -> f64 {
        self.point_coverage + self.coverage_to_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(RecordKind::BundleStart, "tstart")]
    #[case(RecordKind::BundleEnd, "tend")]
    #[case(RecordKind::JunctionStart, "jstart")]
    #[case(RecordKind::JunctionEnd, "jend")]
    fn test_labels(#[case] kind: RecordKind, #[case] label: &str) {
        assert_eq!(kind.to_string(), label);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{label}\""));
    }

    #[rstest]
    fn test_retract_keeps_position() {
        let mut record = Record::new(
            RecordKind::JunctionEnd,
            420,
            Evidence::Junctions(vec![3, 4]),
            0.2,
            15.0,
        );
        record.retract();
        record.retract();

        assert!(!record.is_active());
        assert_eq!(record.position, 420);
        assert_eq!(record.junctions(), &[3, 4]);
        assert!(!record.is_active_at(RecordKind::JunctionEnd, 420));
    }
}
