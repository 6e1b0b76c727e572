//! Descriptive analysis of real-estate transactions.
//!
//! The crate cleans the two input tables (properties and customers), derives
//! a handful of columns, computes grouped summary statistics and renders
//! static PNG charts. One linear pass, in memory; the filesystem is the only
//! external resource.

pub mod charts;
pub mod data;
pub mod export;
pub mod pipeline;
pub mod stats;

pub use pipeline::{run, AnalysisPaths, PipelineError, RunSummary};
