use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_schema::DataType;
use itertools::Itertools;
use sieve_error::{SieveResult, sieve_bail, sieve_err};
use sieve_mask::Bitmap;

use crate::{
    BOOLEAN, ColumnVector, EvalContext, ExecContext, ExprRef, PhysicalExpr, check_boolean,
    check_strict_tree,
};

/// How a [`ConjunctionExpr`] folds its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    /// Folds `child` into `running`, returning the number of rows still undecided: set rows for
    /// AND, unset rows for OR. Zero means the fold has reached its fixed point.
    fn fold(self, running: &mut Bitmap, child: &Bitmap) -> SieveResult<usize> {
        match self {
            Self::And => running.and_with_count(child),
            Self::Or => running.or_with_count(child),
        }
    }

    fn undecided(self, running: &Bitmap) -> usize {
        match self {
            Self::And => running.true_count(),
            Self::Or => running.false_count(),
        }
    }

    /// The rows whose outcome the next child can still change.
    fn active_rows(self, running: &Bitmap) -> Bitmap {
        match self {
            Self::And => running.clone(),
            Self::Or => running.flipped(),
        }
    }
}

impl Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::And => "&&",
            Self::Or => "||",
        };
        Display::fmt(display, f)
    }
}

/// Combines the bitmaps of its children with AND or OR.
///
/// Children are evaluated one at a time in the evaluation order. Before each child after the
/// first, the rows the child can still influence are installed as the context's active mask, and
/// once the running result reaches its fixed point (no set row for AND, no unset row for OR) the
/// remaining children are skipped for the batch. Skipped children that read through a sequential
/// cursor are moved past the batch immediately, so every cursor is aligned when the next batch
/// starts.
///
/// The evaluation order is a permutation over the children supplied by an optimizer. It never
/// changes the children themselves and is fixed once the node is shared.
#[derive(Debug, Clone)]
pub struct ConjunctionExpr {
    children: Vec<ExprRef>,
    op: BoolOp,
    order: Option<Vec<usize>>,
    supports_offset_input: bool,
}

impl ConjunctionExpr {
    pub fn try_new(children: Vec<ExprRef>, op: BoolOp) -> SieveResult<Self> {
        if children.is_empty() {
            sieve_bail!("{} requires at least one child", op);
        }
        for child in &children {
            check_boolean(child.as_ref())?;
        }
        check_strict_tree(&children)?;
        let supports_offset_input = children.iter().all(|c| c.supports_offset_input());
        Ok(Self {
            children,
            op,
            order: None,
            supports_offset_input,
        })
    }

    pub fn and_expr(children: Vec<ExprRef>) -> SieveResult<Self> {
        Self::try_new(children, BoolOp::And)
    }

    pub fn or_expr(children: Vec<ExprRef>) -> SieveResult<Self> {
        Self::try_new(children, BoolOp::Or)
    }

    pub fn into_expr(self) -> ExprRef {
        Arc::new(self)
    }

    pub fn op(&self) -> BoolOp {
        self.op
    }

    pub fn is_and(&self) -> bool {
        self.op == BoolOp::And
    }

    pub fn is_or(&self) -> bool {
        self.op == BoolOp::Or
    }

    /// The children in declaration order.
    pub fn inputs(&self) -> &[ExprRef] {
        &self.children
    }

    /// The installed evaluation order, if any.
    pub fn order(&self) -> Option<&[usize]> {
        self.order.as_deref()
    }

    /// Installs an evaluation order: `order[i]` is the position of the child evaluated `i`-th.
    pub fn reorder(&mut self, order: Vec<usize>) -> SieveResult<()> {
        if order.len() != self.children.len() {
            sieve_bail!(
                "evaluation order has {} entries but the expression has {} children",
                order.len(),
                self.children.len()
            );
        }
        let mut seen = vec![false; order.len()];
        for &idx in &order {
            match seen.get_mut(idx) {
                Some(seen) if !*seen => *seen = true,
                Some(_) => sieve_bail!("child {} appears twice in evaluation order", idx),
                None => sieve_bail!(OutOfBounds: idx, 0, order.len()),
            }
        }
        log::debug!("evaluation order of {} set to {:?}", self, order);
        self.order = Some(order);
        Ok(())
    }

    /// Returns a copy of this expression with the given evaluation order.
    pub fn with_order(&self, order: Vec<usize>) -> SieveResult<Self> {
        let mut reordered = self.clone();
        reordered.reorder(order)?;
        Ok(reordered)
    }

    /// Orders the children by ascending [`PhysicalExpr::estimated_cost`], keeping declaration
    /// order between children of equal cost.
    pub fn reorder_by_cost(&mut self) -> SieveResult<()> {
        let order = (0..self.children.len())
            .sorted_by(|&a, &b| {
                self.children[a]
                    .estimated_cost()
                    .total_cmp(&self.children[b].estimated_cost())
            })
            .collect_vec();
        self.reorder(order)
    }

    /// Child positions in evaluation order.
    pub fn evaluation_order(&self) -> impl Iterator<Item = usize> + '_ {
        let declared = self.order.is_none().then(|| 0..self.children.len());
        self.order
            .iter()
            .flatten()
            .copied()
            .chain(declared.into_iter().flatten())
    }

    fn evaluate_child(&self, ctx: &mut EvalContext<'_>, idx: usize) -> SieveResult<Bitmap> {
        let child = &self.children[idx];
        ctx.exec_mut().stats_mut().children_evaluated += 1;
        let bitmap = child.evaluate(ctx)?.into_bitmap()?;
        if bitmap.len() != ctx.row_count() {
            sieve_bail!(LengthMismatch: ctx.row_count(), bitmap.len());
        }
        Ok(bitmap)
    }

    /// The rows the next child can still change: the undecided rows of `running`, restricted to
    /// the rows an ancestor still cares about.
    fn active_rows(&self, running: &Bitmap, inherited: Option<&Bitmap>) -> SieveResult<Bitmap> {
        let mut active = self.op.active_rows(running);
        if let Some(inherited) = inherited {
            active.and_with_count(inherited)?;
        }
        Ok(active)
    }

    fn undecided(&self, running: &Bitmap, inherited: Option<&Bitmap>) -> SieveResult<usize> {
        match inherited {
            None => Ok(self.op.undecided(running)),
            Some(_) => Ok(self.active_rows(running, inherited)?.true_count()),
        }
    }

    fn fold_children(
        &self,
        ctx: &mut EvalContext<'_>,
        inherited: Option<&Bitmap>,
    ) -> SieveResult<Bitmap> {
        let mut order = self.evaluation_order();
        let first = order
            .next()
            .ok_or_else(|| sieve_err!(InvalidState: "{} has no children", self.op))?;
        let mut running = self.evaluate_child(ctx, first)?;
        let mut undecided = self.undecided(&running, inherited)?;

        while undecided > 0 {
            let Some(idx) = order.next() else {
                return Ok(running);
            };
            let active = self.active_rows(&running, inherited)?;
            ctx.replace_active_mask(Some(active));
            let child = self.evaluate_child(ctx, idx);
            ctx.replace_active_mask(None);
            let remaining = self.op.fold(&mut running, &child?)?;
            // Rows outside the inherited mask never count as undecided.
            undecided = match inherited {
                None => remaining,
                Some(_) => self.undecided(&running, inherited)?,
            };
        }

        let skipped = order.collect_vec();
        if !skipped.is_empty() {
            log::trace!(
                "{} reached its fixed point in batch {}, skipping {} children",
                self,
                ctx.batch_index(),
                skipped.len()
            );
            let exec = ctx.exec_mut();
            exec.stats_mut().fixed_points += 1;
            exec.stats_mut().children_skipped += skipped.len() as u64;
            for idx in skipped {
                let child = &self.children[idx];
                if !child.supports_offset_input() {
                    child.move_cursor(exec)?;
                }
            }
        }
        Ok(running)
    }
}

impl Display for ConjunctionExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({})",
            self.evaluation_order()
                .map(|idx| &self.children[idx])
                .format(&format!(" {} ", self.op))
        )
    }
}

impl PhysicalExpr for ConjunctionExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &BOOLEAN
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        // The first child sees the mask installed by an ancestor, later children a narrower one.
        // The ancestor's mask is put back before returning, on success or failure.
        let inherited = ctx.active_mask().cloned();
        let result = self.fold_children(ctx, inherited.as_ref());
        ctx.replace_active_mask(inherited);
        Ok(result?.into())
    }

    fn move_cursor(&self, ctx: &mut ExecContext) -> SieveResult<()> {
        if self.supports_offset_input {
            return Ok(());
        }
        for child in &self.children {
            child.move_cursor(ctx)?;
        }
        Ok(())
    }

    fn supports_offset_input(&self) -> bool {
        self.supports_offset_input
    }

    fn children(&self) -> Vec<&ExprRef> {
        self.children.iter().collect()
    }

    fn estimated_cost(&self) -> f64 {
        self.children.iter().map(|c| c.estimated_cost()).sum()
    }
}

/// Creates the conjunction of `children`.
pub fn and(children: impl IntoIterator<Item = ExprRef>) -> SieveResult<ExprRef> {
    Ok(ConjunctionExpr::and_expr(children.into_iter().collect())?.into_expr())
}

/// Creates the disjunction of `children`.
pub fn or(children: impl IntoIterator<Item = ExprRef>) -> SieveResult<ExprRef> {
    Ok(ConjunctionExpr::or_expr(children.into_iter().collect())?.into_expr())
}
