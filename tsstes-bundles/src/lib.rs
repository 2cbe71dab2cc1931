//! # tsstes-bundles
//!
//! Single-pass TSS/TES candidate calling from aggregated coverage and splice
//! junctions.
//!
//! ## Purpose
//!
//! Coverage segments and junctions are read in coordinate order and cut into
//! regions at coverage gaps. Each region is run through four stages:
//!
//! - **`NoiseFilter`**: retracts weak junctions overlapped by a stronger one
//! - **`DropDetector`**: scans every contiguous run for sharp coverage rises and falls
//! - **`EventMerger`**: merges drops, junction starts and junction ends into one record stream
//! - **`BundleFinalizer`**: trims boundary noise, drops weak sub-bundles and summarizes bundles
//!
//! ## Example
//!
//! ```rust
//! use std::io::Cursor;
//! use tsstes_core::config::DetectionParams;
//! use tsstes_bundles::{call_candidates, TsvWriter};
//!
//! let coverage = Cursor::new("track\nchr1\t99\t300\t20\n");
//! let junctions = Cursor::new("header\n");
//! let mut writer = TsvWriter::new(Vec::new());
//!
//! let summary = call_candidates(coverage, junctions, DetectionParams::default(), &mut writer, false).unwrap();
//! assert_eq!(summary.bundles, 1);
//! ```
//!

pub mod coverage;
pub mod drops;
pub mod errors;
pub mod finalize;
pub mod junctions;
pub mod merge;
pub mod noise;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod stream;

pub use errors::{BundleError, InvariantViolation};
pub use pipeline::{BundlePipeline, RegionOutcome};
pub use report::{
    Bundle, BundleWriter, JsonLinesWriter, OutputFormat, TsvWriter, writer_for,
};
pub use stream::{RunSummary, call_candidates};
