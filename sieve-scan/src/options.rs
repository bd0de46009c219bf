use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use sieve_batch::DEFAULT_BATCH_SIZE;
use sieve_error::{SieveResult, sieve_bail};
use sieve_expr::DEFAULT_MASK_PUSHDOWN_THRESHOLD;
use witchcraft_metrics::MetricRegistry;

/// Configuration of a [`crate::FilterScan`].
#[derive(Clone)]
pub struct ScanOptions {
    batch_size: usize,
    mask_pushdown_threshold: f64,
    metrics: Option<Arc<MetricRegistry>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            mask_pushdown_threshold: DEFAULT_MASK_PUSHDOWN_THRESHOLD,
            metrics: None,
        }
    }
}

impl ScanOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the active-row density below which leaves only compute the active rows.
    pub fn with_mask_pushdown_threshold(mut self, threshold: f64) -> Self {
        self.mask_pushdown_threshold = threshold;
        self
    }

    /// Records scan counters into `registry`.
    pub fn with_metrics(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mask_pushdown_threshold(&self) -> f64 {
        self.mask_pushdown_threshold
    }

    pub fn metrics(&self) -> Option<&Arc<MetricRegistry>> {
        self.metrics.as_ref()
    }

    pub fn validate(&self) -> SieveResult<()> {
        if self.batch_size == 0 {
            sieve_bail!("batch size must be positive");
        }
        if !(0.0..=1.0).contains(&self.mask_pushdown_threshold) {
            sieve_bail!(
                "mask pushdown threshold must be between 0 and 1, got {}",
                self.mask_pushdown_threshold
            );
        }
        Ok(())
    }
}

impl Debug for ScanOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("batch_size", &self.batch_size)
            .field("mask_pushdown_threshold", &self.mask_pushdown_threshold)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
