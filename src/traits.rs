use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::argument::Argument;
use crate::types::is_timeout;
use crate::types::CacheError;
use crate::types::LockKind;

/// For types that are in charge of reading records from the source of truth.
#[async_trait]
pub trait DataSource: Sized + Send + Sync + 'static {
    /// The type of cached records.
    type Record: Debug + Clone + Send + Sync + 'static;
    /// Arguments the cache is addressed with. They also tell which records belong to which request.
    type Argument: Argument<Record = Self::Record>;
    type Error: StdError + Send + Sync + 'static;
    /// Whatever the data source finds convenient to return. It's consumed once, front to back.
    type Records: IntoIterator<Item = Self::Record> + Send;

    /// Fetches records for the given arguments.
    ///
    /// It is fine to return more than requested, the surplus is filtered out by the cache. The cancellation token is
    /// triggered when the cache is closed; cancellation of individual callers never reaches the data source because
    /// other callers may wait for the same records.
    async fn fetch(
        &self,
        arguments: &[Self::Argument],
        cancel: CancellationToken,
    ) -> Result<Self::Records, Self::Error>;

    /// Tells if a failed fetch may succeed if repeated.
    ///
    /// Recoverable failures are forgotten by the cache; the others stick to the failed region until it is invalidated.
    /// Default implementation only considers timeouts recoverable.
    fn is_recoverable(&self, error: &Self::Error) -> bool {
        is_timeout(error)
    }
}

/// Optional listener of cache events. All methods are called synchronously and may be invoked while cache locks are
/// held; they must not call back into the cache.
pub trait Observer<DS>: Send + Sync + 'static
where
    DS: DataSource,
{
    /// A background fetch is about to be started.
    fn on_fetch(&self, _arguments: &[DS::Argument]) {}
    fn on_fetch_error(&self, _error: &CacheError<DS::Error>) {}
    fn on_invalidate(&self, _arguments: &[DS::Argument]) {}
    /// Acquiring a lock took longer than the cache's `long_wait_threshold`.
    fn on_long_wait(&self, _lock: LockKind, _waited: Duration) {}
}
