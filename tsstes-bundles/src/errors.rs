use thiserror::Error;

///
/// A broken ordering invariant. Candidate calling never continues past one of
/// these; the whole run is aborted.
///
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("record stream of region {start}-{end} does not close with a bundle end")]
    MissingBundleEnd { start: i64, end: i64 },

    #[error("active start and end drop candidates coincide at position {position}")]
    CoincidentDrops { position: i64 },

    #[error(
        "event merge stalled with unconsumed input (drops {drop_cursor}/{drops}, junction starts {start_cursor}/{junctions}, junction ends {end_cursor}/{junctions})"
    )]
    StalledMerge {
        drop_cursor: usize,
        drops: usize,
        start_cursor: usize,
        end_cursor: usize,
        junctions: usize,
    },
}

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Invariant violation on {chrom}: {violation}")]
    InvariantViolation {
        chrom: String,
        violation: InvariantViolation,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BundleError>;
