use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use sieve_batch::SegmentRef;
use sieve_error::{ContextExt, SieveResult};
use sieve_expr::ExprRef;
use sieve_mask::Bitmap;

use crate::{FilterScan, ScanOptions};

/// Evaluates `expr` over each segment on the rayon pool, returning one bitmap per segment in
/// input order.
///
/// Segments share the expression tree but each gets its own cursors, so the only requirement is
/// that the tree holds no per-evaluation state of its own.
pub fn filter_segments(
    expr: &ExprRef,
    segments: &[SegmentRef],
    options: &ScanOptions,
) -> SieveResult<Vec<Bitmap>> {
    options.validate()?;
    log::debug!(
        "filtering {} segments with {}",
        segments.len(),
        expr.describe()
    );
    segments
        .par_iter()
        .enumerate()
        .map(|(idx, segment)| {
            FilterScan::try_new(expr.clone(), segment.clone(), options.clone())?
                .evaluate_all()
                .with_context(|| format!("filtering segment {idx}"))
        })
        .collect()
}

/// Concatenates per-segment results into a single bitmap over all rows.
pub fn concat_results(results: &[Bitmap]) -> Bitmap {
    let mut all = Bitmap::new_unset(0);
    for bitmap in results {
        all.append(bitmap);
    }
    all
}

/// Evaluates `expr` over the segments and returns the selected row indices across all of them.
pub fn selected_rows(
    expr: &ExprRef,
    segments: &[SegmentRef],
    options: &ScanOptions,
) -> SieveResult<Vec<usize>> {
    let results = filter_segments(expr, segments, options)?;
    Ok(concat_results(&results).set_indices().collect())
}
