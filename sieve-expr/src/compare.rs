use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray};
use arrow_ord::cmp;
use arrow_schema::DataType;
use sieve_error::SieveResult;

use crate::leaf::{evaluate_predicate, move_leaf_cursor};
use crate::{
    BOOLEAN, ColumnRef, ColumnVector, EvalContext, ExecContext, ExprId, ExprRef, PhysicalExpr,
    ScalarValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub(crate) fn apply(self, array: &ArrayRef, value: &ScalarValue) -> SieveResult<BooleanArray> {
        let scalar = value.to_scalar();
        Ok(match self {
            Self::Eq => cmp::eq(array, &scalar)?,
            Self::NotEq => cmp::neq(array, &scalar)?,
            Self::Lt => cmp::lt(array, &scalar)?,
            Self::Lte => cmp::lt_eq(array, &scalar)?,
            Self::Gt => cmp::gt(array, &scalar)?,
            Self::Gte => cmp::gt_eq(array, &scalar)?,
        })
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        };
        Display::fmt(display, f)
    }
}

/// Compares every row of a column against a literal. Null rows never match.
#[derive(Debug)]
pub struct CompareExpr {
    id: ExprId,
    column: ColumnRef,
    op: CompareOp,
    value: ScalarValue,
}

impl CompareExpr {
    pub fn try_new(column: ColumnRef, op: CompareOp, value: ScalarValue) -> SieveResult<Self> {
        value.check_comparable(&column)?;
        Ok(Self {
            id: ExprId::next(),
            column,
            op,
            value,
        })
    }

    pub fn try_new_expr(column: ColumnRef, op: CompareOp, value: ScalarValue) -> SieveResult<ExprRef> {
        Ok(Arc::new(Self::try_new(column, op, value)?))
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn value(&self) -> &ScalarValue {
        &self.value
    }
}

impl Display for CompareExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.column, self.op, self.value)
    }
}

impl PhysicalExpr for CompareExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        evaluate_predicate(ctx, self.id, &self.column, |array| {
            self.op.apply(array, &self.value)
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
        match self.column.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 => 4.0,
            _ => 1.0,
        }
    }
}

/// Create a new `CompareExpr` using the `Eq` operator.
pub fn eq(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::Eq, value.into())
}

/// Create a new `CompareExpr` using the `NotEq` operator.
pub fn not_eq(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::NotEq, value.into())
}

/// Create a new `CompareExpr` using the `Lt` operator.
pub fn lt(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::Lt, value.into())
}

/// Create a new `CompareExpr` using the `Lte` operator.
pub fn lt_eq(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::Lte, value.into())
}

/// Create a new `CompareExpr` using the `Gt` operator.
pub fn gt(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::Gt, value.into())
}

/// Create a new `CompareExpr` using the `Gte` operator.
pub fn gt_eq(column: ColumnRef, value: impl Into<ScalarValue>) -> SieveResult<ExprRef> {
    CompareExpr::try_new_expr(column, CompareOp::Gte, value.into())
}
