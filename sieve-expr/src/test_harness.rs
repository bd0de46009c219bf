//! Scripted expressions for exercising conjunctions without real columns.

use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use arrow_schema::DataType;
use parking_lot::Mutex;
use sieve_batch::{MemorySegment, SegmentRef};
use sieve_error::{SieveResult, sieve_bail, sieve_err};
use sieve_mask::Bitmap;

use crate::{ColumnVector, EvalContext, ExecContext, ExprRef, PhysicalExpr};

/// Parses a bitmap from a string of `0`s and `1`s.
pub fn bits(s: &str) -> Bitmap {
    s.chars().map(|c| c == '1').collect()
}

/// A segment with `row_count` rows and no columns.
pub fn empty_segment(row_count: usize) -> SegmentRef {
    MemorySegment::new(row_count).into_ref()
}

/// Evaluates `expr` over every batch of the context's segment.
pub fn evaluate_batches(expr: &dyn PhysicalExpr, exec: &mut ExecContext) -> SieveResult<Vec<Bitmap>> {
    let mut results = Vec::new();
    while !exec.is_exhausted() {
        let mut eval = exec.eval_context()?;
        results.push(expr.evaluate(&mut eval)?.into_bitmap()?);
        if eval.active_mask().is_some() {
            sieve_bail!(InvalidState: "active mask left installed by {}", expr);
        }
        exec.finish_batch()?;
    }
    Ok(results)
}

/// What a [`ScriptedExpr`] observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLog {
    /// Batches the expression was evaluated for.
    pub evaluated: Vec<usize>,
    /// Batches the expression's cursor was moved past without evaluating.
    pub moved: Vec<usize>,
    /// The active mask installed in the context at each evaluation.
    pub masks: Vec<Option<Bitmap>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    consumed: usize,
    log: ScriptLog,
}

/// A leaf that replays one scripted bitmap per batch.
///
/// Unless it is offset capable, the leaf behaves like a sequential cursor: each batch must be
/// consumed exactly once, either by evaluating or by moving, and in order. A leaf is meant for a
/// single evaluation at a time.
#[derive(Debug)]
pub struct ScriptedExpr {
    name: String,
    batches: Vec<Bitmap>,
    data_type: DataType,
    offset_capable: bool,
    fail_at: Option<usize>,
    cost: f64,
    state: Mutex<ScriptState>,
}

impl ScriptedExpr {
    pub fn new(name: impl Into<String>, batches: impl IntoIterator<Item = Bitmap>) -> Self {
        Self {
            name: name.into(),
            batches: batches.into_iter().collect(),
            data_type: DataType::Boolean,
            offset_capable: false,
            fail_at: None,
            cost: 1.0,
            state: Mutex::default(),
        }
    }

    /// A leaf producing the same bitmap, given as a `0`/`1` string, for every one of `batches`.
    pub fn repeat(name: impl Into<String>, pattern: &str, batches: usize) -> Self {
        Self::new(name, std::iter::repeat_n(bits(pattern), batches))
    }

    pub fn with_offset_input(mut self, offset_capable: bool) -> Self {
        self.offset_capable = offset_capable;
        self
    }

    /// Makes evaluation of the given batch fail.
    pub fn failing_at(mut self, batch: usize) -> Self {
        self.fail_at = Some(batch);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn into_ref(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn log(&self) -> ScriptLog {
        self.state.lock().log.clone()
    }

    /// Number of batches consumed so far.
    pub fn consumed(&self) -> usize {
        self.state.lock().consumed
    }
}

/// Shares a scripted leaf as an expression while keeping a handle to inspect it.
pub fn shared(expr: &Arc<ScriptedExpr>) -> ExprRef {
    expr.clone()
}

impl Display for ScriptedExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl PhysicalExpr for ScriptedExpr {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> SieveResult<ColumnVector> {
        let batch = ctx.batch_index();
        let mut state = self.state.lock();
        if !self.offset_capable {
            if state.consumed != batch {
                sieve_bail!(
                    InvalidState: "{} is at batch {} but batch {} is being evaluated",
                    self.name,
                    state.consumed,
                    batch
                );
            }
            state.consumed += 1;
        }
        state.log.evaluated.push(batch);
        state.log.masks.push(ctx.active_mask().cloned());

        if self.fail_at == Some(batch) {
            sieve_bail!(ComputeError: "{} failed at batch {}", self.name, batch);
        }
        let bitmap = self
            .batches
            .get(batch)
            .cloned()
            .ok_or_else(|| sieve_err!(OutOfBounds: batch, 0, self.batches.len()))?;
        Ok(bitmap.into())
    }

    fn move_cursor(&self, ctx: &mut ExecContext) -> SieveResult<()> {
        if self.offset_capable {
            return Ok(());
        }
        let batch = ctx.batch_index();
        let mut state = self.state.lock();
        if state.consumed == batch + 1 {
            return Ok(());
        }
        if state.consumed != batch {
            sieve_bail!(
                InvalidState: "cannot move {} from batch {} while at batch {}",
                self.name,
                state.consumed,
                batch
            );
        }
        state.consumed += 1;
        state.log.moved.push(batch);
        Ok(())
    }

    fn supports_offset_input(&self) -> bool {
        self.offset_capable
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![]
    }

    fn estimated_cost(&self) -> f64 {
        self.cost
    }
}
