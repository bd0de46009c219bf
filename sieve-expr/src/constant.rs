use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_schema::DataType;
use sieve_error::SieveResult;
use sieve_mask::Bitmap;

use crate::{BOOLEAN, ColumnVector, EvalContext, ExecContext, ExprRef, PhysicalExpr};

/// A predicate with the same value for every row. It reads no column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantExpr {
    value: bool,
}

impl ConstantExpr {
    pub fn new(value: bool) -> Self {
        Self { value }
    }

    pub fn value(&self) -> bool {
        self.value
    }
}

impl Display for ConstantExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl PhysicalExpr for ConstantExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        Ok(if self.value {
            Bitmap::new_set(ctx.row_count())
        } else {
            Bitmap::new_unset(ctx.row_count())
        }
        .into())
    }

    fn move_cursor(&self, _ctx: &mut ExecContext) -> SieveResult<()> {
        Ok(())
    }

    fn supports_offset_input(&self) -> bool {
        true
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![]
    }

    fn estimated_cost(&self) -> f64 {
        0.0
    }
}

pub fn always_true() -> ExprRef {
    Arc::new(ConstantExpr::new(true))
}

pub fn always_false() -> ExprRef {
    Arc::new(ConstantExpr::new(false))
}
