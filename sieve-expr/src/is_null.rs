use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_arith::boolean::{is_not_null as arrow_is_not_null, is_null as arrow_is_null};
use arrow_schema::DataType;
use sieve_error::SieveResult;

use crate::leaf::{evaluate_predicate, move_leaf_cursor};
use crate::{
    BOOLEAN, ColumnRef, ColumnVector, EvalContext, ExecContext, ExprId, ExprRef, PhysicalExpr,
};

/// Matches null rows, or non-null rows when negated.
#[derive(Debug)]
pub struct IsNullExpr {
    id: ExprId,
    column: ColumnRef,
    negated: bool,
}

impl IsNullExpr {
    pub fn new(column: ColumnRef, negated: bool) -> Self {
        Self {
            id: ExprId::next(),
            column,
            negated,
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

impl Display for IsNullExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "({} is not null)", self.column)
        } else {
            write!(f, "({} is null)", self.column)
        }
    }
}

impl PhysicalExpr for IsNullExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        evaluate_predicate(ctx, self.id, &self.column, |array| {
            Ok(if self.negated {
                arrow_is_not_null(array)?
            } else {
                arrow_is_null(array)?
            })
        })
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
        0.5
    }
}

pub fn is_null(column: ColumnRef) -> ExprRef {
    Arc::new(IsNullExpr::new(column, false))
}

pub fn is_not_null(column: ColumnRef) -> ExprRef {
    Arc::new(IsNullExpr::new(column, true))
}
