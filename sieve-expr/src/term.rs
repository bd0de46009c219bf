use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_arith::boolean::or;
use arrow_array::{Array, ArrayRef, BooleanArray};
use arrow_schema::DataType;
use itertools::Itertools;
use sieve_error::SieveResult;

use crate::leaf::{evaluate_predicate, move_leaf_cursor};
use crate::{
    BOOLEAN, ColumnRef, ColumnVector, CompareOp, EvalContext, ExecContext, ExprId, ExprRef,
    PhysicalExpr, ScalarValue,
};

/// Matches rows whose value is one of a list of literals. An empty list matches nothing.
#[derive(Debug)]
pub struct TermExpr {
    id: ExprId,
    column: ColumnRef,
    values: Vec<ScalarValue>,
}

impl TermExpr {
    pub fn try_new(column: ColumnRef, values: Vec<ScalarValue>) -> SieveResult<Self> {
        for value in &values {
            value.check_comparable(&column)?;
        }
        Ok(Self {
            id: ExprId::next(),
            column,
            values,
        })
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    fn matches(&self, array: &ArrayRef) -> SieveResult<BooleanArray> {
        let mut matched = BooleanArray::from(vec![false; array.len()]);
        for value in &self.values {
            matched = or(&matched, &CompareOp::Eq.apply(array, value)?)?;
        }
        Ok(matched)
    }
}

impl Display for TermExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} in [{}])", self.column, self.values.iter().format(", "))
    }
}

impl PhysicalExpr for TermExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        evaluate_predicate(ctx, self.id, &self.column, |array| self.matches(array))
    }

    fn move_cursor(&self, ctx: &mut ExecContext) -> SieveResult<()> {
        move_leaf_cursor(ctx, self.id, &self.column)
    }

    fn supports_offset_input(&self) -> bool {
        self.column.supports_offset_input()
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![]
    }

    fn column_info(&self) -> Option<&ColumnRef> {
        Some(&self.column)
    }

    fn estimated_cost(&self) -> f64 {
        self.values.len().max(1) as f64
    }
}

/// Creates a `TermExpr` matching any of `values`.
pub fn is_in<V: Into<ScalarValue>>(
    column: ColumnRef,
    values: impl IntoIterator<Item = V>,
) -> SieveResult<ExprRef> {
    Ok(Arc::new(TermExpr::try_new(
        column,
        values.into_iter().map(Into::into).collect(),
    )?))
}

#[cfg(test)]
mod tests {
    use arrow_array::StringArray;
    use sieve_batch::{FieldId, MemorySegment};
    use sieve_mask::Bitmap;

    use super::*;
    use crate::col;

    fn exec() -> ExecContext {
        let segment = MemorySegment::new(5)
            .with_column(
                FieldId::new(7),
                Arc::new(StringArray::from(vec![
                    Some("red"),
                    Some("green"),
                    None,
                    Some("blue"),
                    Some("red"),
                ])),
            )
            .unwrap()
            .into_ref();
        ExecContext::try_new(segment, 5).unwrap()
    }

    #[test]
    fn matches_any_term() {
        let mut exec = exec();
        let expr = is_in(col(7, "color", DataType::Utf8), ["red", "blue"]).unwrap();
        assert_eq!(expr.to_string(), "($color in [\"red\", \"blue\"])");
        let result = expr.evaluate(&mut exec.eval_context().unwrap()).unwrap();
        assert_eq!(result.as_bitmap().unwrap().to_string(), "10011");
    }

    #[test]
    fn empty_terms_match_nothing() {
        let mut exec = exec();
        let expr = is_in(col(7, "color", DataType::Utf8), Vec::<&str>::new()).unwrap();
        let result = expr.evaluate(&mut exec.eval_context().unwrap()).unwrap();
        assert_eq!(result.into_bitmap().unwrap(), Bitmap::new_unset(5));
        exec.finish_batch().unwrap();
    }

    #[test]
    fn terms_type_checked() {
        assert!(is_in(col(7, "color", DataType::Utf8), [1i64, 2]).is_err());
    }
}
