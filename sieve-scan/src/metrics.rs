use std::sync::Arc;

use sieve_expr::EvalStats;
use witchcraft_metrics::{Counter, MetricId, MetricRegistry};

pub const BATCHES_EVALUATED: &str = "sieve.scan.batches_evaluated";
pub const BATCHES_SKIPPED: &str = "sieve.scan.batches_skipped";
pub const ROWS_SELECTED: &str = "sieve.scan.rows_selected";
pub const CHILDREN_SKIPPED: &str = "sieve.scan.children_skipped";

/// Counters a scan reports into a shared registry.
pub(crate) struct ScanMetrics {
    batches_evaluated: Arc<Counter>,
    batches_skipped: Arc<Counter>,
    rows_selected: Arc<Counter>,
    children_skipped: Arc<Counter>,
}

impl ScanMetrics {
    pub(crate) fn new(registry: &MetricRegistry, expr: &str) -> Self {
        let id = |name: &'static str| MetricId::new(name).with_tag("expr", expr.to_string());
        Self {
            batches_evaluated: registry.counter(id(BATCHES_EVALUATED)),
            batches_skipped: registry.counter(id(BATCHES_SKIPPED)),
            rows_selected: registry.counter(id(ROWS_SELECTED)),
            children_skipped: registry.counter(id(CHILDREN_SKIPPED)),
        }
    }

    pub(crate) fn record_batch(&self, rows_selected: usize, before: &EvalStats, after: &EvalStats) {
        self.batches_evaluated.inc();
        self.rows_selected.add(to_count(rows_selected as u64));
        self.children_skipped
            .add(to_count(after.children_skipped - before.children_skipped));
    }

    pub(crate) fn record_skip(&self) {
        self.batches_skipped.inc();
    }
}

fn to_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
