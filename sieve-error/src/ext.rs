use crate::{ErrString, SieveError, SieveResult};

/// Attach context to the error of a [`SieveResult`] without touching the success path.
pub trait ContextExt<T> {
    /// Wraps the error, if any, in [`SieveError::Context`] built lazily from `msg`.
    fn with_context<F, S>(self, msg: F) -> SieveResult<T>
    where
        F: FnOnce() -> S,
        S: Into<ErrString>;
}

impl<T> ContextExt<T> for SieveResult<T> {
    fn with_context<F, S>(self, msg: F) -> SieveResult<T>
    where
        F: FnOnce() -> S,
        S: Into<ErrString>,
    {
        self.map_err(|e: SieveError| e.with_context(msg()))
    }
}
