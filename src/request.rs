use std::fmt::Debug;
use std::fmt::Display;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::CacheError;
use crate::types::Outcome;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A fetch of the records of a single argument, in flight or settled.
///
/// The outcome is written once; any number of tasks may wait for it.
pub struct PendingRequest<A, E>
where
    E: Debug + Display,
{
    id:       u64,
    argument: A,
    outcome:  watch::Sender<Option<Outcome<E>>>,
}

impl<A, E> PendingRequest<A, E>
where
    E: Debug + Display,
{
    pub(crate) fn new(argument: A) -> Arc<Self> {
        Self::with_state(argument, None)
    }

    /// A request which is born already settled. Used for fragments of requests cut by invalidation.
    pub(crate) fn settled(argument: A, outcome: Outcome<E>) -> Arc<Self> {
        Self::with_state(argument, Some(outcome))
    }

    fn with_state(argument: A, state: Option<Outcome<E>>) -> Arc<Self> {
        let (outcome, _) = watch::channel(state);
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            argument,
            outcome,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn argument(&self) -> &A {
        &self.argument
    }

    /// Sets the outcome unless one is already set. Returns true if this call has settled the request.
    pub(crate) fn complete(&self, outcome: Outcome<E>) -> bool {
        let mut outcome = Some(outcome);
        self.outcome.send_if_modified(|state| {
            if state.is_none() {
                *state = outcome.take();
                true
            }
            else {
                false
            }
        })
    }

    /// The outcome, if the request is settled.
    pub fn outcome(&self) -> Option<Outcome<E>> {
        (*self.outcome.borrow()).clone()
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(*self.outcome.borrow(), Some(Ok(())))
    }

    /// True if the request failed with a recoverable error and is waiting to be rolled back.
    pub fn is_failed_transiently(&self) -> bool {
        matches!(*self.outcome.borrow(), Some(Err(ref e)) if e.is_transient())
    }

    /// Waits for the request to settle.
    pub async fn wait(&self) -> Outcome<E> {
        let mut receiver = self.outcome.subscribe();
        // The sender is owned by `self`, it can't be gone while we're borrowing it. The outcome is bound to a local so
        // that the borrowed `Ref` is released before `receiver`.
        #[allow(clippy::let_and_return)]
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(state) => (*state).clone().unwrap_or(Err(CacheError::Abandoned)),
            Err(_) => Err(CacheError::Abandoned),
        };
        outcome
    }
}

impl<A, E> Debug for PendingRequest<A, E>
where
    A: Debug,
    E: Debug + Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("argument", &self.argument)
            .field("outcome", &*self.outcome.borrow())
            .finish()
    }
}

/// Settles every request of a fetch batch that is still pending when the guard is dropped.
///
/// Keeps waiters from hanging forever if the fetching task panics or gets aborted.
pub(crate) struct BatchGuard<A, E>
where
    E: Debug + Display,
{
    batch: Vec<Arc<PendingRequest<A, E>>>,
}

impl<A, E> BatchGuard<A, E>
where
    E: Debug + Display,
{
    pub(crate) fn new(batch: Vec<Arc<PendingRequest<A, E>>>) -> Self {
        Self { batch }
    }

    pub(crate) fn requests(&self) -> &[Arc<PendingRequest<A, E>>] {
        &self.batch
    }

    /// Settles the whole batch with the same outcome.
    pub(crate) fn complete(&self, outcome: Outcome<E>) {
        for request in &self.batch {
            request.complete(outcome.clone());
        }
    }
}

impl<A, E> Drop for BatchGuard<A, E>
where
    E: Debug + Display,
{
    fn drop(&mut self) {
        for request in &self.batch {
            if request.complete(Err(CacheError::Abandoned)) {
                tracing::warn!("Request #{} abandoned by its fetch task", request.id());
            }
        }
    }
}
