//! Physical filter expressions evaluated batch by batch over a segment.
//!
//! An expression tree is built once and shared read-only. Everything that changes while a segment
//! is evaluated lives in an [`ExecContext`] (sequential cursors, statistics) or in the
//! per-batch [`EvalContext`] (row range, active-rows mask).

use std::any::Any;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow_schema::DataType;
use sieve_error::{SieveResult, sieve_bail};

mod between;
mod column;
mod compare;
mod conjunct;
mod constant;
mod context;
mod is_null;
mod leaf;
mod not;
mod term;
#[cfg(feature = "test-harness")]
pub mod test_harness;
mod vector;

pub use between::*;
pub use column::*;
pub use compare::*;
pub use conjunct::*;
pub use constant::*;
pub use context::*;
pub use is_null::*;
pub use not::*;
pub use term::*;
pub use vector::*;

/// Active-row density below which leaves compute only the active rows of their column.
pub const DEFAULT_MASK_PUSHDOWN_THRESHOLD: f64 = 0.05;

pub(crate) static BOOLEAN: DataType = DataType::Boolean;

pub type ExprRef = Arc<dyn PhysicalExpr>;

/// Identifies an expression node for the lifetime of the process.
///
/// Leaves are keyed by id in the [`ExecContext`] so their cursors can live outside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    pub fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A node of a filter expression tree, evaluated one batch at a time.
pub trait PhysicalExpr: Debug + Display + Send + Sync {
    /// Convert expression reference to reference of [`Any`] type
    fn as_any(&self) -> &dyn Any;

    /// The declared type of the values [`PhysicalExpr::evaluate`] produces.
    fn data_type(&self) -> &DataType;

    /// Evaluates the current batch.
    ///
    /// If the context carries an active-rows mask, the result only has to be correct for the rows
    /// set in the mask.
    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector>;

    /// Moves every sequential cursor under this node past the current batch without evaluating it.
    ///
    /// Cursors that already consumed the current batch stay where they are.
    fn move_cursor(&self, ctx: &mut ExecContext) -> SieveResult<()>;

    /// Whether this node can be skipped for a batch without moving anything, i.e. it reads rows
    /// by offset rather than through a positional cursor.
    fn supports_offset_input(&self) -> bool;

    fn children(&self) -> Vec<&ExprRef>;

    /// The column a leaf reads, `None` for nodes that read no column directly.
    fn column_info(&self) -> Option<&ColumnRef> {
        None
    }

    /// Whether this node produces rows of its own rather than filtering them.
    fn is_source(&self) -> bool {
        false
    }

    /// A static hint of how expensive this node is to evaluate, used to order conjunctions.
    fn estimated_cost(&self) -> f64 {
        1.0
    }

    /// Renders the node for diagnostics.
    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Checks that `expr` produces booleans.
pub fn check_boolean(expr: &dyn PhysicalExpr) -> SieveResult<()> {
    if expr.data_type() != &DataType::Boolean {
        sieve_bail!(MismatchedTypes: "Boolean", expr.data_type());
    }
    Ok(())
}

/// Checks that no node is reachable twice from `roots`.
///
/// Leaves keep their cursors in the [`ExecContext`] under their own [`ExprId`], so a node reachable
/// along two paths would have both paths pull from a single cursor.
pub fn check_strict_tree<'a>(roots: impl IntoIterator<Item = &'a ExprRef>) -> SieveResult<()> {
    let mut seen = HashSet::new();
    let mut stack = roots.into_iter().collect::<Vec<_>>();
    while let Some(expr) = stack.pop() {
        if !seen.insert(Arc::as_ptr(expr).cast::<()>()) {
            sieve_bail!("{} appears more than once in the expression tree", expr);
        }
        stack.extend(expr.children());
    }
    Ok(())
}

/// Every column read by a leaf under `expr`, in depth-first order.
pub fn referenced_columns(expr: &dyn PhysicalExpr) -> Vec<&ColumnRef> {
    let mut columns = Vec::new();
    let mut stack = vec![expr];
    while let Some(node) = stack.pop() {
        columns.extend(node.column_info());
        stack.extend(node.children().into_iter().rev().map(|child| child.as_ref()));
    }
    columns
}
