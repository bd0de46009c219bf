//! Drives boolean filter expressions over segments.
//!
//! A [`FilterScan`] evaluates one expression over one segment batch by batch, keeping the
//! sequential cursors of the expression's leaves aligned even when the caller skips batches.
//! [`filter_segments`] fans a scan out over many segments on the rayon pool.

mod metrics;
mod options;
mod parallel;
mod scan;

pub use metrics::{BATCHES_EVALUATED, BATCHES_SKIPPED, CHILDREN_SKIPPED, ROWS_SELECTED};
pub use options::*;
pub use parallel::*;
pub use scan::*;
