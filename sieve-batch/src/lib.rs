//! Column batches and the sources that produce them.
//!
//! A [`Segment`] is a fixed set of rows stored column-wise. Expressions pull rows out of a
//! segment either sequentially, through a [`BatchReader`] that yields consecutive batches, or by
//! row range when the segment supports offset access.

mod batch;
mod field;
mod reader;
mod segment;

pub use batch::*;
pub use field::*;
pub use reader::*;
pub use segment::*;

/// The number of rows evaluated per batch when no other size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 8192;
