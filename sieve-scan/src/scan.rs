use std::fmt::{Debug, Formatter};

use sieve_batch::SegmentRef;
use sieve_error::{SieveResult, sieve_bail};
use sieve_expr::{Access, EvalStats, ExecContext, ExprRef, check_boolean, referenced_columns};
use sieve_mask::Bitmap;

use crate::ScanOptions;
use crate::metrics::ScanMetrics;

/// Evaluates a boolean filter expression over every batch of one segment.
#[derive(Debug, Clone)]
pub struct FilterScan {
    expr: ExprRef,
    segment: SegmentRef,
    options: ScanOptions,
}

impl FilterScan {
    pub fn try_new(expr: ExprRef, segment: SegmentRef, options: ScanOptions) -> SieveResult<Self> {
        check_boolean(expr.as_ref())?;
        let by_range = referenced_columns(expr.as_ref())
            .into_iter()
            .find(|column| column.access() == Access::Random);
        if let Some(column) = by_range.filter(|_| !segment.supports_range_reads()) {
            sieve_bail!(
                "column {} is read by row range but the segment only supports sequential scans",
                column
            );
        }
        options.validate()?;
        Ok(Self {
            expr,
            segment,
            options,
        })
    }

    pub fn expr(&self) -> &ExprRef {
        &self.expr
    }

    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Starts a new evaluation with its own cursors.
    pub fn execute(&self) -> SieveResult<FilterStream> {
        let exec = ExecContext::try_new(self.segment.clone(), self.options.batch_size())?
            .with_mask_pushdown_threshold(self.options.mask_pushdown_threshold());
        log::debug!(
            "scanning {} rows in {} batches with filter {}",
            self.segment.row_count(),
            exec.batch_count(),
            self.expr.describe()
        );
        let metrics = self
            .options
            .metrics()
            .map(|registry| ScanMetrics::new(registry, &self.expr.describe()));
        Ok(FilterStream {
            expr: self.expr.clone(),
            exec,
            metrics,
            rows_selected: 0,
            done: false,
        })
    }

    /// Evaluates every batch and concatenates the results into one bitmap for the segment.
    pub fn evaluate_all(&self) -> SieveResult<Bitmap> {
        let mut stream = self.execute()?;
        let mut result = Bitmap::default();
        for batch in stream.by_ref() {
            result.append(&batch?);
        }
        stream.close()?;
        Ok(result)
    }
}

/// Yields the filter result of each batch of a segment, in order.
///
/// The stream is fused: once a batch fails, or every batch has been produced, it yields `None`.
pub struct FilterStream {
    expr: ExprRef,
    exec: ExecContext,
    metrics: Option<ScanMetrics>,
    rows_selected: usize,
    done: bool,
}

impl FilterStream {
    /// The index of the next batch.
    pub fn batch_index(&self) -> usize {
        self.exec.batch_index()
    }

    pub fn batch_count(&self) -> usize {
        self.exec.batch_count()
    }

    pub fn stats(&self) -> &EvalStats {
        self.exec.stats()
    }

    /// Skips the next batch without evaluating it, keeping every cursor aligned.
    pub fn skip_batch(&mut self) -> SieveResult<()> {
        if self.done || self.exec.is_exhausted() {
            sieve_bail!(OutOfBounds: self.exec.batch_index(), 0, self.exec.batch_count());
        }
        let result = self
            .expr
            .move_cursor(&mut self.exec)
            .and_then(|()| self.exec.finish_batch());
        if result.is_err() {
            self.done = true;
        } else if let Some(metrics) = &self.metrics {
            metrics.record_skip();
        }
        result
    }

    /// Releases every cursor. The stream yields nothing afterwards.
    pub fn close(&mut self) -> SieveResult<()> {
        self.done = true;
        self.exec.close()
    }

    fn evaluate_batch(&mut self) -> SieveResult<Bitmap> {
        let before = *self.exec.stats();
        let bitmap = {
            let mut eval = self.exec.eval_context()?;
            self.expr.evaluate(&mut eval)?.into_bitmap()?
        };
        self.exec.finish_batch()?;

        self.rows_selected += bitmap.true_count();
        if let Some(metrics) = &self.metrics {
            metrics.record_batch(bitmap.true_count(), &before, self.exec.stats());
        }
        Ok(bitmap)
    }

    fn log_summary(&self) {
        let stats = self.exec.stats();
        log::debug!(
            "filter {} selected {} of {} rows; {} children evaluated, {} skipped at {} fixed points, {} batches discarded",
            self.expr,
            self.rows_selected,
            self.exec.segment().row_count(),
            stats.children_evaluated,
            stats.children_skipped,
            stats.fixed_points,
            stats.batches_discarded
        );
    }
}

impl Iterator for FilterStream {
    type Item = SieveResult<Bitmap>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.exec.is_exhausted() {
            self.done = true;
            self.log_summary();
            return None;
        }
        let result = self.evaluate_batch();
        if let Err(err) = &result {
            log::debug!(
                "filter {} failed at batch {}: {}",
                self.expr,
                self.exec.batch_index(),
                err
            );
            self.done = true;
        }
        Some(result)
    }
}

impl Debug for FilterStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStream")
            .field("expr", &self.expr)
            .field("exec", &self.exec)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::Int64Array;
    use arrow_schema::DataType;
    use sieve_batch::{BatchReader, FieldId, MemorySegment, Segment};
    use sieve_error::SieveError;
    use sieve_expr::test_harness::{ScriptedExpr, bits, empty_segment, shared};
    use sieve_expr::{always_true, and, col, gt, lt, or};
    use witchcraft_metrics::{MetricId, MetricRegistry};

    use super::*;
    use crate::{BATCHES_EVALUATED, BATCHES_SKIPPED, CHILDREN_SKIPPED, ROWS_SELECTED};

    fn segment(rows: i64) -> SegmentRef {
        MemorySegment::new(usize::try_from(rows).unwrap())
            .with_column(FieldId::new(1), Arc::new(Int64Array::from_iter_values(0..rows)))
            .unwrap()
            .with_column(
                FieldId::new(2),
                Arc::new(Int64Array::from_iter_values((0..rows).map(|v| v % 10))),
            )
            .unwrap()
            .into_ref()
    }

    #[test]
    fn evaluate_all_concatenates_batches() {
        let x = col(1, "x", DataType::Int64);
        let y = col(2, "y", DataType::Int64);
        let expr = and([gt(x, 2i64).unwrap(), lt(y, 5i64).unwrap()]).unwrap();
        let scan = FilterScan::try_new(
            expr,
            segment(20),
            ScanOptions::default().with_batch_size(6),
        )
        .unwrap();

        let result = scan.evaluate_all().unwrap();
        assert_eq!(result.len(), 20);
        assert_eq!(
            result.set_indices().collect::<Vec<_>>(),
            vec![3, 4, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn skipping_batches_keeps_cursors_aligned() {
        let x = col(1, "x", DataType::Int64);
        let y = col(2, "y", DataType::Int64).with_access(Access::Random);
        let expr = or([gt(x, 14i64).unwrap(), lt(y, 1i64).unwrap()]).unwrap();
        let scan = FilterScan::try_new(
            expr,
            segment(20),
            ScanOptions::default().with_batch_size(5),
        )
        .unwrap();

        let mut stream = scan.execute().unwrap();
        assert_eq!(stream.batch_count(), 4);
        assert_eq!(stream.next().unwrap().unwrap(), bits("10000"));
        stream.skip_batch().unwrap();
        assert_eq!(stream.batch_index(), 2);
        assert_eq!(stream.next().unwrap().unwrap(), bits("10000"));
        assert_eq!(stream.next().unwrap().unwrap(), bits("11111"));
        assert!(stream.next().is_none());
        assert!(stream.skip_batch().is_err());
        assert_eq!(stream.stats().batches_discarded, 1);
        stream.close().unwrap();
    }

    #[test]
    fn stream_is_fused_after_error() {
        let failing = ScriptedExpr::repeat("failing", "11", 3)
            .failing_at(1)
            .into_ref();
        let scan = FilterScan::try_new(
            shared(&failing),
            empty_segment(6),
            ScanOptions::default().with_batch_size(2),
        )
        .unwrap();

        let mut stream = scan.execute().unwrap();
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(
            stream.next().unwrap(),
            Err(SieveError::ComputeError(..))
        ));
        assert!(stream.next().is_none());
        assert!(scan.evaluate_all().is_err());
    }

    #[test]
    fn rejects_non_boolean_filters_and_bad_options() {
        let ints = ScriptedExpr::repeat("ints", "1", 1)
            .with_data_type(DataType::Int64)
            .into_ref();
        assert!(matches!(
            FilterScan::try_new(shared(&ints), empty_segment(1), ScanOptions::default()),
            Err(SieveError::MismatchedTypes(..))
        ));
        assert!(
            FilterScan::try_new(
                always_true(),
                empty_segment(1),
                ScanOptions::default().with_batch_size(0)
            )
            .is_err()
        );
    }

    /// A segment that can only be scanned front to back.
    #[derive(Debug)]
    struct ScanOnly(MemorySegment);

    impl Segment for ScanOnly {
        fn row_count(&self) -> usize {
            self.0.row_count()
        }

        fn scan(&self, fields: &[FieldId], batch_size: usize) -> SieveResult<Box<dyn BatchReader>> {
            self.0.scan(fields, batch_size)
        }
    }

    #[test]
    fn random_access_requires_range_reads() {
        let values = MemorySegment::new(4)
            .with_column(FieldId::new(1), Arc::new(Int64Array::from_iter_values(0..4)))
            .unwrap();
        let scan_only: SegmentRef = Arc::new(ScanOnly(values));
        let x = col(1, "x", DataType::Int64);
        let random = or([
            lt(x.clone(), 1i64).unwrap(),
            gt(x.clone().with_access(Access::Random), 2i64).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            FilterScan::try_new(random, scan_only.clone(), ScanOptions::default()),
            Err(SieveError::InvalidArgument(..))
        ));

        let sequential = or([lt(x.clone(), 1i64).unwrap(), gt(x, 2i64).unwrap()]).unwrap();
        let result = FilterScan::try_new(sequential, scan_only, ScanOptions::default())
            .unwrap()
            .evaluate_all()
            .unwrap();
        assert_eq!(result, bits("1001"));
    }

    #[test]
    fn records_metrics() {
        let registry = Arc::new(MetricRegistry::default());
        let zeros = ScriptedExpr::repeat("zeros", "000", 3).into_ref();
        let ones = ScriptedExpr::repeat("ones", "111", 3).into_ref();
        let expr = and([shared(&zeros), shared(&ones)]).unwrap();
        let scan = FilterScan::try_new(
            expr,
            empty_segment(9),
            ScanOptions::default()
                .with_batch_size(3)
                .with_metrics(registry.clone()),
        )
        .unwrap();

        let mut stream = scan.execute().unwrap();
        stream.skip_batch().unwrap();
        let results = stream.collect::<SieveResult<Vec<_>>>().unwrap();
        assert_eq!(results, vec![bits("000"), bits("000")]);

        let count = |name: &'static str| {
            registry
                .counter(MetricId::new(name).with_tag("expr", "(zeros && ones)"))
                .count()
        };
        assert_eq!(count(BATCHES_EVALUATED), 2);
        assert_eq!(count(BATCHES_SKIPPED), 1);
        assert_eq!(count(ROWS_SELECTED), 0);
        assert_eq!(count(CHILDREN_SKIPPED), 2);
        assert_eq!(ones.log().moved, vec![0, 1, 2]);
    }
}
