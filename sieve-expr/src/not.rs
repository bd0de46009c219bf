use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_schema::DataType;
use sieve_error::SieveResult;

use crate::{
    BOOLEAN, ColumnVector, EvalContext, ExecContext, ExprRef, PhysicalExpr, check_boolean,
};

/// Negates a boolean child. The active-rows mask is passed through unchanged.
#[derive(Debug)]
pub struct NotExpr {
    child: ExprRef,
}

impl NotExpr {
    pub fn try_new(child: ExprRef) -> SieveResult<Self> {
        check_boolean(child.as_ref())?;
        Ok(Self { child })
    }

    pub fn child(&self) -> &ExprRef {
        &self.child
    }
}

impl Display for NotExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!")?;
        self.child.fmt(f)
    }
}

impl PhysicalExpr for NotExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        let mut bitmap = self.child.evaluate(ctx)?.into_bitmap()?;
        bitmap.flip();
        Ok(bitmap.into())
    }

    fn move_cursor(&self, ctx: &mut ExecContext) -> SieveResult<()> {
        self.child.move_cursor(ctx)
    }

    fn supports_offset_input(&self) -> bool {
        self.child.supports_offset_input()
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![&self.child]
    }

    fn estimated_cost(&self) -> f64 {
        self.child.estimated_cost()
    }
}

pub fn not(operand: ExprRef) -> SieveResult<ExprRef> {
    Ok(Arc::new(NotExpr::try_new(operand)?))
}

#[cfg(test)]
mod tests {
    use arrow_array::BooleanArray;
    use sieve_batch::{FieldId, MemorySegment};

    use super::*;
    use crate::test_harness::{ScriptedExpr, shared};
    use crate::{always_true, col, eq};

    #[test]
    fn invert_booleans() {
        let segment = MemorySegment::new(8)
            .with_column(
                FieldId::new(1),
                Arc::new(BooleanArray::from(vec![
                    true, false, true, true, false, false, true, false,
                ])),
            )
            .unwrap()
            .into_ref();
        let mut exec = ExecContext::try_new(segment, 4).unwrap();
        let expr = not(eq(col(1, "flag", DataType::Boolean), true).unwrap()).unwrap();
        assert_eq!(expr.to_string(), "!($flag = true)");
        assert!(!expr.supports_offset_input());
        let result = expr.evaluate(&mut exec.eval_context().unwrap()).unwrap();
        assert_eq!(result.as_bitmap().unwrap().to_string(), "0100");
        exec.finish_batch().unwrap();

        expr.move_cursor(&mut exec).unwrap();
        assert_eq!(exec.stats().batches_discarded, 1);
        exec.finish_batch().unwrap();
        assert!(exec.is_exhausted());
    }

    #[test]
    fn operand_must_be_boolean() {
        assert!(not(always_true()).is_ok());
        let ints = ScriptedExpr::repeat("ints", "1", 1)
            .with_data_type(DataType::Int32)
            .into_ref();
        assert!(not(shared(&ints)).is_err());
    }
}
