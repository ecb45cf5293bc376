//! Repository error type
//!
//! Wraps query compilation errors and data-source errors, and reports cancellation.
//! Source errors are carried through unchanged.

use thiserror::Error;

use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum RepositoryError<E> {
    /// Invalid filter, sort or page request
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Error raised by the underlying data source
    #[error("Data source error: {0}")]
    Source(#[source] E),

    /// Cancellation was requested before the call completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl<E> RepositoryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Caller-input faults; everything else is a source or runtime failure
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Query(e) => e.code(),
            Self::Source(_) => "DATA_SOURCE_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}
