use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{Debug, Formatter};
use std::ops::Range;

use arrow_array::{Array, ArrayRef};
use sieve_batch::{BatchReader, FieldId, SegmentRef};
use sieve_error::{SieveResult, sieve_bail, sieve_err};
use sieve_mask::Bitmap;

use crate::{Access, ColumnRef, DEFAULT_MASK_PUSHDOWN_THRESHOLD, ExprId};

/// Counters describing how much work an evaluation did and how much it avoided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Children of conjunctions that were evaluated.
    pub children_evaluated: u64,
    /// Children of conjunctions skipped because the running result had reached its fixed point.
    pub children_skipped: u64,
    /// Number of times a conjunction stopped early.
    pub fixed_points: u64,
    /// Batches pulled from a sequential cursor and discarded without being evaluated.
    pub batches_discarded: u64,
}

struct Cursor {
    field: FieldId,
    reader: Box<dyn BatchReader>,
    consumed: usize,
}

/// State of one evaluation of an expression tree over one segment.
///
/// The context owns every sequential cursor of the tree's leaves, keyed by the leaf's
/// [`ExprId`], so the tree itself stays immutable and can be shared between evaluations of
/// different segments. The driver keeps the context across batches and calls
/// [`ExecContext::finish_batch`] after each one.
pub struct ExecContext {
    segment: SegmentRef,
    batch_size: usize,
    batch_index: usize,
    mask_pushdown_threshold: f64,
    cursors: HashMap<ExprId, Cursor>,
    stats: EvalStats,
}

impl ExecContext {
    pub fn try_new(segment: SegmentRef, batch_size: usize) -> SieveResult<Self> {
        if batch_size == 0 {
            sieve_bail!("batch size must be positive");
        }
        Ok(Self {
            segment,
            batch_size,
            batch_index: 0,
            mask_pushdown_threshold: DEFAULT_MASK_PUSHDOWN_THRESHOLD,
            cursors: HashMap::new(),
            stats: EvalStats::default(),
        })
    }

    /// Sets the active-row density below which leaves only compute the active rows.
    pub fn with_mask_pushdown_threshold(mut self, threshold: f64) -> Self {
        self.mask_pushdown_threshold = threshold;
        self
    }

    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The index of the batch currently being evaluated or skipped.
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn mask_pushdown_threshold(&self) -> f64 {
        self.mask_pushdown_threshold
    }

    pub fn batch_count(&self) -> usize {
        self.segment.row_count().div_ceil(self.batch_size)
    }

    /// Returns true once every batch of the segment has been finished.
    pub fn is_exhausted(&self) -> bool {
        self.batch_index >= self.batch_count()
    }

    /// The rows of the segment covered by the current batch.
    pub fn batch_range(&self) -> Range<usize> {
        let row_count = self.segment.row_count();
        let start = (self.batch_index * self.batch_size).min(row_count);
        start..(start + self.batch_size).min(row_count)
    }

    pub fn stats(&self) -> &EvalStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut EvalStats {
        &mut self.stats
    }

    /// Creates the per-batch context for the current batch, with no active mask installed.
    pub fn eval_context(&mut self) -> SieveResult<EvalContext<'_>> {
        if self.is_exhausted() {
            sieve_bail!(
                OutOfBounds: self.batch_index,
                0,
                self.batch_count()
            );
        }
        let row_range = self.batch_range();
        Ok(EvalContext {
            exec: self,
            row_range,
            active_mask: None,
        })
    }

    /// Moves on to the next batch.
    ///
    /// Every cursor opened so far must have consumed the batch that just finished, either by
    /// being read or by being advanced. A cursor left behind means some leaf was neither
    /// evaluated nor moved and would read the wrong rows from now on.
    pub fn finish_batch(&mut self) -> SieveResult<()> {
        let expected = self.batch_index + 1;
        if let Some((id, cursor)) = self
            .cursors
            .iter()
            .find(|(_, cursor)| cursor.consumed != expected)
        {
            sieve_bail!(
                InvalidState: "cursor of leaf {} over column {} consumed {} batches after batch {}",
                id,
                cursor.field,
                cursor.consumed,
                self.batch_index
            );
        }
        self.batch_index = expected;
        Ok(())
    }

    /// Reads the current batch of `field` from the sequential cursor owned by `leaf`.
    pub fn read_sequential(&mut self, leaf: ExprId, field: FieldId) -> SieveResult<ArrayRef> {
        let batch_index = self.batch_index;
        let cursor = self.cursor(leaf, field)?;
        if cursor.consumed != batch_index {
            sieve_bail!(
                InvalidState: "cursor of leaf {} over column {} is at batch {} but batch {} is being evaluated",
                leaf,
                field,
                cursor.consumed,
                batch_index
            );
        }
        let batch = cursor.reader.next()?.ok_or_else(|| {
            sieve_err!(
                InvalidState: "cursor of leaf {} over column {} ended before batch {}",
                leaf,
                field,
                batch_index
            )
        })?;
        cursor.consumed += 1;
        batch.into_column(field)
    }

    /// Moves the sequential cursor of `leaf` past the current batch without using its rows.
    ///
    /// A cursor that has already consumed the current batch is left where it is, so advancing is
    /// idempotent within a batch.
    pub fn advance_sequential(&mut self, leaf: ExprId, field: FieldId) -> SieveResult<()> {
        let batch_index = self.batch_index;
        let cursor = self.cursor(leaf, field)?;
        if cursor.consumed == batch_index + 1 {
            return Ok(());
        }
        if cursor.consumed != batch_index {
            sieve_bail!(
                InvalidState: "cannot advance cursor of leaf {} over column {} from batch {} while at batch {}",
                leaf,
                field,
                cursor.consumed,
                batch_index
            );
        }
        if cursor.reader.next()?.is_none() {
            sieve_bail!(
                InvalidState: "cursor of leaf {} over column {} ended before batch {}",
                leaf,
                field,
                batch_index
            );
        }
        cursor.consumed += 1;
        self.stats.batches_discarded += 1;
        Ok(())
    }

    /// Closes every cursor, returning the first error encountered.
    pub fn close(&mut self) -> SieveResult<()> {
        let mut first_err = None;
        for (_, mut cursor) in self.cursors.drain() {
            if let Err(err) = cursor.reader.close() {
                log::warn!("failed to close cursor over column {}: {}", cursor.field, err);
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn cursor(&mut self, leaf: ExprId, field: FieldId) -> SieveResult<&mut Cursor> {
        Ok(match self.cursors.entry(leaf) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::trace!("opening cursor of leaf {} over column {}", leaf, field);
                entry.insert(Cursor {
                    field,
                    reader: self.segment.scan(&[field], self.batch_size)?,
                    consumed: 0,
                })
            }
        })
    }
}

impl Debug for ExecContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("segment", &self.segment)
            .field("batch_size", &self.batch_size)
            .field("batch_index", &self.batch_index)
            .field("cursors", &self.cursors.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// State threaded through the evaluation of one batch.
///
/// Besides giving leaves access to their columns, the context carries the optional active-rows
/// mask: the rows an ancestor conjunction still needs an answer for. A child may skip the other
/// rows, whose result it may report as unset. Whoever installs a mask must clear it before control
/// returns to a sibling or a parent.
pub struct EvalContext<'a> {
    exec: &'a mut ExecContext,
    row_range: Range<usize>,
    active_mask: Option<Bitmap>,
}

impl EvalContext<'_> {
    pub fn row_count(&self) -> usize {
        self.row_range.len()
    }

    /// The rows of the segment covered by this batch.
    pub fn row_range(&self) -> Range<usize> {
        self.row_range.clone()
    }

    pub fn batch_index(&self) -> usize {
        self.exec.batch_index
    }

    pub fn active_mask(&self) -> Option<&Bitmap> {
        self.active_mask.as_ref()
    }

    /// Installs the active-rows mask for the next child evaluation.
    pub fn set_active_mask(&mut self, mask: Bitmap) -> SieveResult<()> {
        if mask.len() != self.row_count() {
            sieve_bail!(LengthMismatch: self.row_count(), mask.len());
        }
        self.active_mask = Some(mask);
        Ok(())
    }

    /// Removes the active-rows mask, returning it.
    pub fn clear_active_mask(&mut self) -> Option<Bitmap> {
        self.active_mask.take()
    }

    pub(crate) fn replace_active_mask(&mut self, mask: Option<Bitmap>) -> Option<Bitmap> {
        std::mem::replace(&mut self.active_mask, mask)
    }

    pub fn exec(&self) -> &ExecContext {
        &*self.exec
    }

    pub fn exec_mut(&mut self) -> &mut ExecContext {
        &mut *self.exec
    }

    /// Reads this batch's rows of `column` on behalf of `leaf`.
    pub fn read_column(&mut self, leaf: ExprId, column: &ColumnRef) -> SieveResult<ArrayRef> {
        let array = match column.access() {
            Access::Sequential => self.exec.read_sequential(leaf, column.field())?,
            Access::Random => self
                .exec
                .segment
                .read_range(&[column.field()], self.row_range.clone())?
                .into_column(column.field())?,
        };
        if array.data_type() != column.data_type() {
            sieve_bail!(MismatchedTypes: column.data_type(), array.data_type());
        }
        if array.len() != self.row_count() {
            sieve_bail!(LengthMismatch: self.row_count(), array.len());
        }
        Ok(array)
    }
}

impl Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("batch_index", &self.exec.batch_index)
            .field("row_range", &self.row_range)
            .field("active_mask", &self.active_mask)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::Int64Array;
    use arrow_schema::DataType;
    use sieve_batch::MemorySegment;
    use sieve_error::SieveError;

    use super::*;

    fn segment(rows: i64) -> SegmentRef {
        MemorySegment::new(usize::try_from(rows).unwrap())
            .with_column(
                FieldId::new(1),
                Arc::new(Int64Array::from_iter_values(0..rows)),
            )
            .unwrap()
            .into_ref()
    }

    fn values(array: &ArrayRef) -> Vec<i64> {
        array.as_primitive::<Int64Type>().values().to_vec()
    }

    #[test]
    fn batch_ranges() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        assert_eq!(ctx.batch_count(), 3);
        assert_eq!(ctx.batch_range(), 0..4);
        ctx.finish_batch().unwrap();
        ctx.finish_batch().unwrap();
        assert_eq!(ctx.batch_range(), 8..10);
        assert_eq!(ctx.eval_context().unwrap().row_count(), 2);
        ctx.finish_batch().unwrap();
        assert!(ctx.is_exhausted());
        assert!(ctx.eval_context().is_err());
        assert!(ExecContext::try_new(segment(10), 0).is_err());
    }

    #[test]
    fn sequential_and_random_reads_agree() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        let sequential = ColumnRef::new(FieldId::new(1), "x", DataType::Int64);
        let random = sequential.clone().with_access(Access::Random);
        let leaf = ExprId::next();

        ctx.finish_batch().unwrap();
        // Opening a cursor after the first batch leaves it behind.
        let mut eval = ctx.eval_context().unwrap();
        assert!(matches!(
            eval.read_column(leaf, &sequential),
            Err(SieveError::InvalidState(..))
        ));
        assert_eq!(values(&eval.read_column(leaf, &random).unwrap()), vec![4, 5, 6, 7]);
    }

    #[test]
    fn advance_is_idempotent_within_a_batch() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        let column = ColumnRef::new(FieldId::new(1), "x", DataType::Int64);
        let leaf = ExprId::next();

        ctx.advance_sequential(leaf, column.field()).unwrap();
        ctx.advance_sequential(leaf, column.field()).unwrap();
        assert_eq!(ctx.stats().batches_discarded, 1);
        ctx.finish_batch().unwrap();

        let array = ctx.eval_context().unwrap().read_column(leaf, &column).unwrap();
        assert_eq!(values(&array), vec![4, 5, 6, 7]);
        // Reading consumed the batch, so advancing now is a no-op.
        ctx.advance_sequential(leaf, column.field()).unwrap();
        assert_eq!(ctx.stats().batches_discarded, 1);
        ctx.finish_batch().unwrap();

        assert_eq!(
            ctx.eval_context()
                .unwrap()
                .read_column(leaf, &column)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn reading_twice_in_one_batch_is_misaligned() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        let column = ColumnRef::new(FieldId::new(1), "x", DataType::Int64);
        let leaf = ExprId::next();
        let mut eval = ctx.eval_context().unwrap();
        eval.read_column(leaf, &column).unwrap();
        assert!(eval.read_column(leaf, &column).is_err());
    }

    #[test]
    fn finish_batch_detects_lagging_cursor() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        let column = ColumnRef::new(FieldId::new(1), "x", DataType::Int64);
        let leaf = ExprId::next();
        ctx.eval_context().unwrap().read_column(leaf, &column).unwrap();
        ctx.finish_batch().unwrap();
        let err = ctx.finish_batch().unwrap_err();
        assert!(matches!(err, SieveError::InvalidState(..)));
        ctx.close().unwrap();
    }

    #[test]
    fn declared_type_checked() {
        let mut ctx = ExecContext::try_new(segment(4), 4).unwrap();
        let column = ColumnRef::new(FieldId::new(1), "x", DataType::Utf8);
        let err = ctx
            .eval_context()
            .unwrap()
            .read_column(ExprId::next(), &column)
            .unwrap_err();
        assert!(matches!(err, SieveError::MismatchedTypes(..)));
    }

    #[test]
    fn active_mask_length_checked() {
        let mut ctx = ExecContext::try_new(segment(10), 4).unwrap();
        let mut eval = ctx.eval_context().unwrap();
        assert!(eval.set_active_mask(Bitmap::new_set(3)).is_err());
        eval.set_active_mask(Bitmap::new_set(4)).unwrap();
        assert_eq!(eval.active_mask().map(Bitmap::true_count), Some(4));
        assert!(eval.clear_active_mask().is_some());
        assert!(eval.active_mask().is_none());
    }
}
