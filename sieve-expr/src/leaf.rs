use arrow_array::{Array, ArrayRef, BooleanArray};
use arrow_select::filter::filter;
use sieve_error::{SieveResult, sieve_bail};
use sieve_mask::Bitmap;

use crate::{ColumnRef, ColumnVector, EvalContext, ExecContext, ExprId};

/// Evaluates a single-column predicate over the current batch, honouring the active-rows mask.
///
/// The column is always read so the leaf's cursor stays aligned, even when no row is active.
/// Rows outside the mask are reported unset.
pub(crate) fn evaluate_predicate<F>(
    ctx: &mut EvalContext<'_>,
    id: ExprId,
    column: &ColumnRef,
    predicate: F,
) -> SieveResult<ColumnVector>
where
    F: Fn(&ArrayRef) -> SieveResult<BooleanArray>,
{
    let array = ctx.read_column(id, column)?;
    let threshold = ctx.exec().mask_pushdown_threshold();

    let Some(mask) = ctx.active_mask() else {
        return Ok(Bitmap::from_boolean_array(&predicate(&array)?).into());
    };
    if mask.len() != array.len() {
        sieve_bail!(LengthMismatch: array.len(), mask.len());
    }
    if mask.all_false() {
        return Ok(Bitmap::new_unset(array.len()).into());
    }
    if mask.density() >= threshold {
        let mut result = Bitmap::from_boolean_array(&predicate(&array)?);
        result.and_with_count(mask)?;
        return Ok(result.into());
    }

    let active = filter(&array, &mask.to_boolean_array())?;
    let matches = predicate(&active)?;
    let mut result = Bitmap::new_unset(array.len());
    for (row, matched) in mask.set_indices().zip(matches.iter()) {
        if matched == Some(true) {
            result.set(row, true);
        }
    }
    Ok(result.into())
}

/// Moves the cursor of a leaf reading `column` past the current batch.
pub(crate) fn move_leaf_cursor(
    ctx: &mut ExecContext,
    id: ExprId,
    column: &ColumnRef,
) -> SieveResult<()> {
    if column.supports_offset_input() {
        return Ok(());
    }
    ctx.advance_sequential(id, column.field())
}
