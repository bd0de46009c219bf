use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_arith::boolean::and;
use arrow_array::{ArrayRef, BooleanArray};
use arrow_schema::DataType;
use sieve_error::SieveResult;

use crate::leaf::{evaluate_predicate, move_leaf_cursor};
use crate::{
    BOOLEAN, ColumnRef, ColumnVector, CompareOp, EvalContext, ExecContext, ExprId, ExprRef,
    PhysicalExpr, ScalarValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrictComparison {
    Strict,
    NonStrict,
}

impl StrictComparison {
    pub const fn to_operator(&self) -> CompareOp {
        match self {
            Self::Strict => CompareOp::Lt,
            Self::NonStrict => CompareOp::Lte,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BetweenOptions {
    pub lower_strict: StrictComparison,
    pub upper_strict: StrictComparison,
}

impl Default for BetweenOptions {
    fn default() -> Self {
        Self {
            lower_strict: StrictComparison::NonStrict,
            upper_strict: StrictComparison::NonStrict,
        }
    }
}

/// Matches rows whose value lies between two literals, with per-bound strictness.
#[derive(Debug)]
pub struct BetweenExpr {
    id: ExprId,
    column: ColumnRef,
    lower: ScalarValue,
    upper: ScalarValue,
    options: BetweenOptions,
}

impl BetweenExpr {
    pub fn try_new(
        column: ColumnRef,
        lower: ScalarValue,
        upper: ScalarValue,
        options: BetweenOptions,
    ) -> SieveResult<Self> {
        lower.check_comparable(&column)?;
        upper.check_comparable(&column)?;
        Ok(Self {
            id: ExprId::next(),
            column,
            lower,
            upper,
            options,
        })
    }

    pub fn options(&self) -> &BetweenOptions {
        &self.options
    }

    fn matches(&self, array: &ArrayRef) -> SieveResult<BooleanArray> {
        let lower = match self.options.lower_strict {
            StrictComparison::Strict => CompareOp::Gt,
            StrictComparison::NonStrict => CompareOp::Gte,
        }
        .apply(array, &self.lower)?;
        let upper = self
            .options
            .upper_strict
            .to_operator()
            .apply(array, &self.upper)?;
        Ok(and(&lower, &upper)?)
    }
}

impl Display for BetweenExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({} {} {} {} {})",
            self.lower,
            self.options.lower_strict.to_operator(),
            self.column,
            self.options.upper_strict.to_operator(),
            self.upper
        )
    }
}

impl PhysicalExpr for BetweenExpr {
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
        2.0
    }
}

/// Creates a `BetweenExpr` over `column`.
pub fn between(
    column: ColumnRef,
    lower: impl Into<ScalarValue>,
    upper: impl Into<ScalarValue>,
    options: BetweenOptions,
) -> SieveResult<ExprRef> {
    Ok(Arc::new(BetweenExpr::try_new(
        column,
        lower.into(),
        upper.into(),
        options,
    )?))
}
