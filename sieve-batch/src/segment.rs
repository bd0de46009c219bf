use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;

use arrow_array::ArrayRef;
use sieve_error::{SieveResult, sieve_bail, sieve_err};

use crate::{Batch, BatchReader, FieldId, MemoryBatchReader};

pub type SegmentRef = Arc<dyn Segment>;

/// A fixed set of rows stored column-wise.
///
/// A segment is shared read-only between every evaluation running over it. Sequential access
/// opens an independent [`BatchReader`] per caller; offset access reads an arbitrary row range
/// directly and is only available when [`Segment::supports_range_reads`] returns true.
pub trait Segment: Debug + Send + Sync {
    fn row_count(&self) -> usize;

    /// Opens a sequential reader over `fields` yielding batches of `batch_size` rows.
    fn scan(&self, fields: &[FieldId], batch_size: usize) -> SieveResult<Box<dyn BatchReader>>;

    fn supports_range_reads(&self) -> bool {
        false
    }

    /// Reads `fields` for the given row range.
    fn read_range(&self, fields: &[FieldId], range: Range<usize>) -> SieveResult<Batch> {
        let _ = (fields, range);
        Err(sieve_err!(NotImplemented: "read_range", format!("{self:?}")))
    }
}

/// A segment whose columns are held in memory as Arrow arrays.
#[derive(Debug, Clone)]
pub struct MemorySegment {
    columns: Batch,
}

impl MemorySegment {
    /// Create a segment covering `row_count` rows and holding no columns yet.
    pub fn new(row_count: usize) -> Self {
        Self {
            columns: Batch::new_empty(row_count),
        }
    }

    /// Add a column, checking its length against the segment.
    pub fn with_column(self, field: FieldId, array: ArrayRef) -> SieveResult<Self> {
        Ok(Self {
            columns: self.columns.with_column(field, array)?,
        })
    }

    pub fn into_ref(self) -> SegmentRef {
        Arc::new(self)
    }
}

impl Segment for MemorySegment {
    fn row_count(&self) -> usize {
        self.columns.row_count()
    }

    fn scan(&self, fields: &[FieldId], batch_size: usize) -> SieveResult<Box<dyn BatchReader>> {
        if batch_size == 0 {
            sieve_bail!("batch size must be positive");
        }
        let projected = self.columns.project(fields)?;
        Ok(Box::new(MemoryBatchReader::new(projected, batch_size)))
    }

    fn supports_range_reads(&self) -> bool {
        true
    }

    fn read_range(&self, fields: &[FieldId], range: Range<usize>) -> SieveResult<Batch> {
        if range.start > range.end {
            sieve_bail!("invalid row range {}..{}", range.start, range.end);
        }
        self.columns
            .project(fields)?
            .slice(range.start, range.end - range.start)
    }
}
