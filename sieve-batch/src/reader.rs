use sieve_error::SieveResult;

use crate::Batch;

/// A positional source of consecutive batches.
///
/// Every call to [`BatchReader::next`] yields the batch immediately following the previous one,
/// so two readers opened over the same segment with the same batch size stay aligned as long as
/// both are pulled once per batch.
pub trait BatchReader: Send {
    /// Returns the next batch, or `None` once the stream is exhausted.
    fn next(&mut self) -> SieveResult<Option<Batch>>;

    /// Releases the resources held by the reader. Subsequent calls to `next` return `None`.
    fn close(&mut self) -> SieveResult<()>;
}

/// Yields fixed-size slices of an in-memory batch; the final slice may be short.
#[derive(Debug)]
pub struct MemoryBatchReader {
    batch: Option<Batch>,
    batch_size: usize,
    offset: usize,
}

impl MemoryBatchReader {
    /// ## Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn new(batch: Batch, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            batch: Some(batch),
            batch_size,
            offset: 0,
        }
    }

    /// The number of rows already handed out.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl BatchReader for MemoryBatchReader {
    fn next(&mut self) -> SieveResult<Option<Batch>> {
        let Some(batch) = self.batch.as_ref() else {
            return Ok(None);
        };
        if self.offset >= batch.row_count() {
            return Ok(None);
        }

        let len = self.batch_size.min(batch.row_count() - self.offset);
        let next = batch.slice(self.offset, len)?;
        self.offset += len;
        Ok(Some(next))
    }

    fn close(&mut self) -> SieveResult<()> {
        if self.batch.take().is_some() {
            log::trace!("closed reader after {} rows", self.offset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{ArrayRef, Int32Array};
    use rstest::rstest;

    use super::*;
    use crate::FieldId;

    fn batch(rows: i32) -> Batch {
        let array: ArrayRef = Arc::new(Int32Array::from_iter_values(0..rows));
        Batch::try_new([(FieldId::new(0), array)]).unwrap()
    }

    #[rstest]
    #[case(10, 4, vec![4, 4, 2])]
    #[case(8, 4, vec![4, 4])]
    #[case(3, 8, vec![3])]
    #[case(0, 8, vec![])]
    fn yields_fixed_size_batches(
        #[case] rows: i32,
        #[case] batch_size: usize,
        #[case] expected: Vec<usize>,
    ) {
        let mut reader = MemoryBatchReader::new(batch(rows), batch_size);
        let mut sizes = Vec::new();
        while let Some(next) = reader.next().unwrap() {
            sizes.push(next.row_count());
        }
        assert_eq!(sizes, expected);
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn close_ends_the_stream() {
        let mut reader = MemoryBatchReader::new(batch(10), 4);
        assert!(reader.next().unwrap().is_some());
        reader.close().unwrap();
        assert!(reader.next().unwrap().is_none());
        reader.close().unwrap();
        assert_eq!(reader.offset(), 4);
    }
}
