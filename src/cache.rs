use crate::argument::Argument;
use crate::ledger::Classified;
use crate::ledger::Ledger;
use crate::request::BatchGuard;
use crate::request::PendingRequest;
use crate::store::DataStore;
use crate::traits::DataSource;
use crate::traits::Observer;
use crate::types::CacheError;
use crate::types::LockKind;
use fieldx_plus::fx_plus;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::sync::RwLockWriteGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

type Request<DS> = PendingRequest<<DS as DataSource>::Argument, <DS as DataSource>::Error>;
type RequestLedger<DS> = Ledger<<DS as DataSource>::Argument, <DS as DataSource>::Error>;

/// Read-through cache over a region-addressed [`DataSource`].
///
/// ```ignore
/// let cache = Cache::builder()
///     .data_source(Arc::new(QuotesSource::new(pool)))
///     .name("quotes")
///     .build()?;
///
/// let arg = Spatial::new(
///     (RangeSet::new(20240101, 20240131), DiscreteSet::single("AAPL".to_string())),
///     |q: &Quote| (q.date, q.symbol.clone()),
/// );
/// // Only the part of January not yet cached or being fetched hits the data source.
/// let quotes = cache.get(vec![arg], &CancellationToken::new()).await?;
/// ```
///
/// Two locks guard the cache state: one over the ledger of accepted requests and one over the cached records. The
/// ledger lock is always taken first, and no task ever waits for a request to settle while holding the data lock.
#[fx_plus(
    parent,
    no_new,
    default(off),
    sync,
    builder(
        doc("Builder object of [`Cache`].", "", "See [`Cache::builder()`] method."),
        method_doc("Implement builder pattern for [`Cache`]."),
    )
)]
pub struct Cache<DS>
where
    DS: DataSource,
{
    #[fieldx(vis(pub(crate)), builder(vis(pub), required, into), get(clone))]
    data_source: Arc<DS>,

    /// Cache name. Most useful for debugging and logging.
    #[fieldx(get(clone), builder(into), default(String::from("<anon>")))]
    name: String,

    /// Lock acquisitions taking longer than this are reported to the log and to the observers.
    #[fieldx(get(copy), default(Duration::from_millis(250)))]
    long_wait_threshold: Duration,

    #[fieldx(get(off), default(Vec::new()))]
    observers: Vec<Arc<dyn Observer<DS>>>,

    #[fieldx(get(off), builder(off), default(RwLock::new(Ledger::new())))]
    ledger: RwLock<RequestLedger<DS>>,

    #[fieldx(get(off), builder(off), default(parking_lot::RwLock::new(DataStore::new())))]
    store: parking_lot::RwLock<DataStore<DS::Record>>,

    // Bumped by every clear() so that fetches started before it don't bring their records back.
    #[fieldx(get(off), builder(off), default(AtomicU64::new(0)))]
    epoch: AtomicU64,

    #[fieldx(get(off), builder(off), default(parking_lot::Mutex::new(Vec::new())))]
    fetch_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,

    #[fieldx(get(off), builder(off), default(CancellationToken::new()))]
    shutdown: CancellationToken,
}

impl<DS> Cache<DS>
where
    DS: DataSource,
{
    fn report_wait(&self, lock: LockKind, waited: Duration) {
        if waited >= self.long_wait_threshold() {
            warn!("[{}] Waited {:?} for the {lock} lock", self.name, waited);
            for observer in &self.observers {
                observer.on_long_wait(lock, waited);
            }
        }
    }

    async fn ledger_write(&self) -> RwLockWriteGuard<'_, RequestLedger<DS>> {
        let started = Instant::now();
        let guard = self.ledger.write().await;
        self.report_wait(LockKind::Ledger, started.elapsed());
        guard
    }

    fn data_read(&self) -> parking_lot::RwLockReadGuard<'_, DataStore<DS::Record>> {
        let started = Instant::now();
        let guard = self.store.read();
        self.report_wait(LockKind::Data, started.elapsed());
        guard
    }

    fn data_write(&self) -> parking_lot::RwLockWriteGuard<'_, DataStore<DS::Record>> {
        let started = Instant::now();
        let guard = self.store.write();
        self.report_wait(LockKind::Data, started.elapsed());
        guard
    }

    /// Returns records belonging to any of the arguments, fetching what is neither cached nor being fetched yet.
    ///
    /// Parts of the arguments already requested by other callers are not fetched again; instead, this call waits for
    /// those requests to settle. If any of the awaited requests failed, the error is returned.
    ///
    /// Cancelling `cancel` only stops waiting: the background fetch keeps running because other callers may depend on
    /// it.
    #[instrument(level = "trace", skip_all, fields(cache = %self.name))]
    pub async fn get(
        &self,
        arguments: Vec<DS::Argument>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DS::Record>, CacheError<DS::Error>> {
        if self.shutdown.is_cancelled() {
            return Err(CacheError::Closed);
        }

        let arguments: Vec<DS::Argument> = arguments.into_iter().filter(|arg| !arg.is_empty()).collect();
        if arguments.is_empty() {
            debug!("[{}] GET with nothing to look for", self.name);
            return Ok(Vec::new());
        }

        let (submitted, batch, epoch) = {
            // The ledger lock may be held by invalidate() for as long as a slow fetch takes.
            let mut ledger = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("[{}] GET cancelled by the caller while waiting for the ledger", self.name);
                    return Err(CacheError::Cancelled);
                }
                ledger = self.ledger_write() => ledger,
            };
            let Classified { submitted, required } = ledger.classify(arguments.clone());
            let batch: Vec<Arc<Request<DS>>> = required.into_iter().map(PendingRequest::new).collect();
            ledger.append(batch.iter().cloned());
            (submitted, batch, self.epoch.load(Ordering::Acquire))
        };

        assert!(
            !(submitted.is_empty() && batch.is_empty()),
            "[{}] arguments are neither covered by the ledger nor required to be fetched: {arguments:?}",
            self.name
        );

        debug!(
            "[{}] GET: {} submitted request(s), {} new",
            self.name,
            submitted.len(),
            batch.len()
        );

        if !batch.is_empty() {
            self.spawn_fetch(batch.clone(), epoch)?;
        }

        let settled = async {
            for request in submitted.iter().chain(batch.iter()) {
                request.wait().await?;
            }
            Ok::<(), CacheError<DS::Error>>(())
        };

        tokio::select! {
            outcome = settled => outcome?,
            _ = cancel.cancelled() => {
                debug!("[{}] GET cancelled by the caller", self.name);
                return Err(CacheError::Cancelled);
            }
        }

        Ok(self.data_read().select(&arguments))
    }

    fn spawn_fetch(&self, batch: Vec<Arc<Request<DS>>>, epoch: u64) -> Result<(), CacheError<DS::Error>> {
        let Some(myself) = self.myself()
        else {
            BatchGuard::new(batch).complete(Err(CacheError::Closed));
            return Err(CacheError::Closed);
        };

        let task = tokio::spawn(async move { myself.cache_data_for_requests(batch, epoch).await });

        let mut tasks = self.fetch_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
        Ok(())
    }

    // The batch settles as a whole: every request in it shares the single data source call.
    #[instrument(level = "trace", skip_all, fields(cache = %self.name, batch = batch.len()))]
    async fn cache_data_for_requests(&self, batch: Vec<Arc<Request<DS>>>, epoch: u64) {
        let guard = BatchGuard::new(batch);
        let arguments: Vec<DS::Argument> = guard.requests().iter().map(|r| r.argument().clone()).collect();

        for observer in &self.observers {
            observer.on_fetch(&arguments);
        }
        debug!("[{}] Fetching {} argument(s)", self.name, arguments.len());

        match self.data_source.fetch(&arguments, self.shutdown.child_token()).await {
            Ok(records) => {
                // The data source is allowed to over-fetch.
                let accepted: Vec<DS::Record> = records
                    .into_iter()
                    .filter(|record| arguments.iter().any(|arg| arg.is_data_included(record)))
                    .collect();

                {
                    let mut store = self.data_write();
                    if self.epoch.load(Ordering::Acquire) == epoch {
                        let count = store.append(accepted);
                        trace!("[{}] Stored {count} record(s)", self.name);
                    }
                    else {
                        debug!(
                            "[{}] Cache has been cleared while fetching, discarding {} record(s)",
                            self.name,
                            accepted.len()
                        );
                    }
                }

                guard.complete(Ok(()));
            }
            Err(error) => {
                let recoverable = self.data_source.is_recoverable(&error);
                let error = if recoverable {
                    CacheError::Transient(Arc::new(error))
                }
                else {
                    CacheError::Source(Arc::new(error))
                };

                warn!("[{}] Fetch failed: {error}", self.name);
                for observer in &self.observers {
                    observer.on_fetch_error(&error);
                }

                guard.complete(Err(error));

                // Waiters must be released before taking the ledger lock: invalidate() may hold it while waiting for
                // this very batch.
                if recoverable {
                    let removed = self.ledger_write().await.remove(guard.requests());
                    debug!("[{}] Rolled back {removed} request(s) after a transient failure", self.name);
                }
            }
        }
    }

    /// Removes cached records and requests overlapping any of the arguments.
    ///
    /// Requests only partially covered by the arguments are cut: the part outside of the arguments stays in the ledger
    /// with the same outcome as the original request, so the records kept for it are still served without refetching.
    /// Overlapping requests still in flight are waited for first.
    ///
    /// Returns the number of removed records.
    #[instrument(level = "trace", skip_all, fields(cache = %self.name))]
    pub async fn invalidate(&self, arguments: Vec<DS::Argument>) -> usize {
        let arguments: Vec<DS::Argument> = arguments.into_iter().filter(|arg| !arg.is_empty()).collect();
        if arguments.is_empty() {
            return 0;
        }

        for observer in &self.observers {
            observer.on_invalidate(&arguments);
        }

        let mut ledger = self.ledger_write().await;
        let mut requests = ledger.requests().to_vec();

        for drop_arg in &arguments {
            let mut kept = Vec::with_capacity(requests.len());

            for request in requests {
                let overlap = request.argument().is_overlapped(drop_arg);
                if !overlap.overlapped {
                    kept.push(request);
                    continue;
                }

                // No data lock is held here; the fetch path needs it to commit before it settles the request.
                let outcome = request.wait().await;

                if let Err(ref error) = outcome {
                    if error.is_transient() {
                        // The failed batch is being rolled back; its fragments must not outlive it.
                        trace!("[{}] Dropping request #{} failed transiently", self.name, request.id());
                        continue;
                    }
                }

                trace!(
                    "[{}] Request #{} cut into {} fragment(s)",
                    self.name,
                    request.id(),
                    overlap.remainder.len()
                );
                kept.extend(
                    overlap
                        .remainder
                        .into_iter()
                        .map(|fragment| PendingRequest::settled(fragment, outcome.clone())),
                );
            }

            requests = kept;
        }

        ledger.replace(requests);
        let removed = self.data_write().remove(&arguments);
        debug!(
            "[{}] Invalidated {} argument(s): {removed} record(s) removed, {} request(s) left",
            self.name,
            arguments.len(),
            ledger.len()
        );

        removed
    }

    /// Forgets all requests and records.
    ///
    /// Fetches in flight still settle their waiters, but their records are discarded.
    #[instrument(level = "trace", skip_all, fields(cache = %self.name))]
    pub async fn clear(&self) {
        let mut ledger = self.ledger_write().await;
        let mut store = self.data_write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        ledger.clear();
        store.clear();
        debug!("[{}] Cleared", self.name);
    }

    /// Waits until every background fetch started so far is done.
    pub async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.fetch_tasks.lock());
            if tasks.is_empty() {
                break;
            }

            for task in tasks {
                if let Err(err) = task.await {
                    warn!("[{}] Fetch task failed: {err}", self.name);
                }
            }
        }
    }

    /// Cancels fetches in flight and waits for them to finish. Subsequent `get` calls fail with
    /// [`CacheError::Closed`].
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.settle().await;
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.data_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests in the ledger, in flight and settled.
    pub async fn request_count(&self) -> usize {
        self.ledger.read().await.len()
    }

    /// Cached records not covered by any succeeded request.
    ///
    /// Always empty for a consistent cache once its background fetches have settled.
    pub async fn uncovered_records(&self) -> Vec<DS::Record> {
        let ledger = self.ledger.read().await;
        let covering: Vec<DS::Argument> = ledger
            .requests()
            .iter()
            .filter(|request| request.is_succeeded())
            .map(|request| request.argument().clone())
            .collect();

        self.data_read()
            .records()
            .iter()
            .filter(|record| !covering.iter().any(|arg| arg.is_data_included(record)))
            .cloned()
            .collect()
    }
}
