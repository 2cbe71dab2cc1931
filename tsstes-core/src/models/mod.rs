pub mod coverage;
pub mod junction;

// re-export for cleaner imports
pub use self::coverage::{CoverageLine, CoverageSegment};
pub use self::junction::{Junction, JunctionLine, SpliceEvidence, Strand};
