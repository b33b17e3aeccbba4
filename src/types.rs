use std::error::Error as StdError;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use thiserror::Error;

/// Errors reported to the callers of the cache.
///
/// Source errors are shared between every caller waiting for the same fetch, hence the `Arc`.
#[derive(Debug, Error)]
pub enum CacheError<E>
where
    E: Debug + Display,
{
    /// The data source failed in a way considered recoverable. The failed region is not remembered and the next
    /// request for it will hit the data source again.
    #[error("transient data source error: {0}")]
    Transient(Arc<E>),

    /// The data source failed permanently. Overlapping requests keep failing with this error until the region is
    /// invalidated or the cache is cleared.
    #[error("data source error: {0}")]
    Source(Arc<E>),

    #[error("waiting for data has been cancelled")]
    Cancelled,

    /// The background fetch terminated without reporting its outcome.
    #[error("fetch task has been abandoned")]
    Abandoned,

    #[error("cache is closed")]
    Closed,
}

impl<E> CacheError<E>
where
    E: Debug + Display,
{
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The data source error, if this is one.
    pub fn source_error(&self) -> Option<&Arc<E>> {
        match self {
            Self::Transient(e) | Self::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> Clone for CacheError<E>
where
    E: Debug + Display,
{
    fn clone(&self) -> Self {
        match self {
            Self::Transient(e) => Self::Transient(Arc::clone(e)),
            Self::Source(e) => Self::Source(Arc::clone(e)),
            Self::Cancelled => Self::Cancelled,
            Self::Abandoned => Self::Abandoned,
            Self::Closed => Self::Closed,
        }
    }
}

/// The final state of a pending request.
pub type Outcome<E> = Result<(), CacheError<E>>;

/// Identifies the lock reported by [`Observer::on_long_wait`](crate::traits::Observer::on_long_wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// The lock over the request ledger.
    Ledger,
    /// The lock over cached records.
    Data,
}

impl Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ledger => "ledger",
            Self::Data => "data",
        })
    }
}

/// Tells if an error is caused by a timeout.
///
/// Walks the whole `source()` chain looking for [`tokio::time::error::Elapsed`] or an I/O error of kind
/// [`TimedOut`](std::io::ErrorKind::TimedOut). This is the default recoverability policy of
/// [`DataSource`](crate::traits::DataSource).
pub fn is_timeout(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<tokio::time::error::Elapsed>() {
            return true;
        }
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = err.source();
    }
    false
}
