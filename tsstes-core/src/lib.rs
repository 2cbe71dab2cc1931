//!
//! # Core models and parameters for `tsstes`
//! Typed records for the two input streams (coverage segments and splice
//! junctions), their line parsers, the junction admission filter and the
//! [config::DetectionParams] shared by every stage of candidate calling.
//!
//! ## Example
//! ```rust
//! use tsstes_core::config::DetectionParams;
//! use tsstes_core::models::JunctionLine;
//!
//! let params = DetectionParams::default();
//! let line: JunctionLine = "chr1\t100\t900\tJ1\t120\t+\t0.2-0.2-0.3-0.4".parse().unwrap();
//! assert!(line.passes_noise_filter(&params));
//! ```
//!

pub mod config;
pub mod errors;
pub mod models;
pub mod utils;
