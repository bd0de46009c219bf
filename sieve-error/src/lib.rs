#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! This crate defines error & result types for Sieve.
//! It also contains a variety of useful macros for error handling.

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt, io};

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("SIEVE_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), Backtrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Sieve.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum SieveError {
    /// A row index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// An error occurred while executing a compute kernel.
    #[error("{0}\nBacktrace:\n{1}")]
    ComputeError(ErrString, Backtrace),
    /// An invalid argument was provided, e.g. an empty child list or a malformed permutation.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// An operation was attempted while an object was in the wrong state, e.g. a cursor that is
    /// not positioned at the batch being evaluated.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidState(ErrString, Backtrace),
    /// Two bitmaps or arrays that must agree on length do not.
    #[error("expected length {0}, got {1}\nBacktrace:\n{2}")]
    LengthMismatch(usize, usize, Backtrace),
    /// Two types were expected to match but did not.
    #[error("expected type: {0} but instead got {1}\nBacktrace:\n{2}")]
    MismatchedTypes(ErrString, ErrString, Backtrace),
    /// An assertion failed.
    #[error("{0}\nBacktrace:\n{1}")]
    AssertionFailed(ErrString, Backtrace),
    /// A function is not implemented for a given input.
    #[error("function {0} not implemented for {1}\nBacktrace:\n{2}")]
    NotImplemented(ErrString, ErrString, Backtrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<SieveError>),
    /// A wrapper for IO errors raised by a batch source.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for errors from the Arrow library.
    #[error(transparent)]
    ArrowError(#[from] arrow_schema::ArrowError),
}

impl SieveError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        SieveError::Context(msg.into(), Box::new(self))
    }
}

impl Debug for SieveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return SieveErrors as their error type.
pub type SieveResult<T> = Result<T, SieveError>;

/// A convenient macro for creating a SieveError.
#[macro_export]
macro_rules! sieve_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (LengthMismatch: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::LengthMismatch($expected, $actual, Backtrace::capture())
        )
    }};
    (NotImplemented: $func:expr, $by_whom:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::NotImplemented($func.into(), format!("{}", $by_whom).into(), Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:literal, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::MismatchedTypes($expected.into(), $actual.to_string().into(), Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::MismatchedTypes($expected.to_string().into(), $actual.to_string().into(), Backtrace::capture())
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::SieveError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::SieveError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::SieveError::$variant($err)
        )
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::sieve_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a SieveError.
#[macro_export]
macro_rules! sieve_bail {
    ($($tt:tt)+) => {
        return Err($crate::sieve_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a SieveError in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! sieve_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::sieve_panic!($crate::sieve_err!(OutOfBounds: $idx, $start, $stop))
    }};
    (LengthMismatch: $expected:expr, $actual:expr) => {{
        $crate::sieve_panic!($crate::sieve_err!(LengthMismatch: $expected, $actual))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::sieve_panic!($crate::sieve_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::SieveError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::sieve_panic!($crate::sieve_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::SieveError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::SieveError) -> crate::SieveError {
        error
    }
}
