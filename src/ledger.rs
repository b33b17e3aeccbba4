use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use crate::argument::Argument;
use crate::request::PendingRequest;

/// Outcome of [`Ledger::classify`].
pub(crate) struct Classified<A, E>
where
    E: Debug + Display,
{
    /// Existing requests covering some part of the classified arguments.
    pub(crate) submitted: Vec<Arc<PendingRequest<A, E>>>,
    /// Parts of the classified arguments nobody has requested yet.
    pub(crate) required:  Vec<A>,
}

/// The ordered list of requests the cache has accepted so far.
pub(crate) struct Ledger<A, E>
where
    E: Debug + Display,
{
    requests: Vec<Arc<PendingRequest<A, E>>>,
}

impl<A, E> Ledger<A, E>
where
    A: Argument,
    E: Debug + Display,
{
    pub(crate) fn new() -> Self {
        Self { requests: Vec::new() }
    }

    pub(crate) fn requests(&self) -> &[Arc<PendingRequest<A, E>>] {
        &self.requests
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    /// Splits arguments into parts already requested and parts that are still to be fetched.
    ///
    /// Every argument is matched against the requests in the order they were accepted. Whatever part of it overlaps a
    /// request is served by that request; the remainder is matched further down the ledger. Requests failed transiently
    /// are skipped: they are about to be rolled back and their regions must be fetched again.
    ///
    /// The required parts never overlap each other, even if the arguments do.
    pub(crate) fn classify(&self, arguments: Vec<A>) -> Classified<A, E> {
        let mut working = arguments;
        let mut submitted = Vec::new();

        for request in &self.requests {
            if working.is_empty() {
                break;
            }
            if request.is_failed_transiently() {
                continue;
            }

            let mut carried = Vec::with_capacity(working.len());
            let mut hit = false;

            for argument in working {
                let overlap = argument.is_overlapped(request.argument());
                if overlap.overlapped {
                    hit = true;
                    carried.extend(overlap.remainder);
                }
                else {
                    carried.push(argument);
                }
            }

            if hit {
                submitted.push(Arc::clone(request));
            }
            working = carried;
        }

        let mut required: Vec<A> = Vec::with_capacity(working.len());
        for argument in working {
            let mut pieces = vec![argument];
            for taken in &required {
                pieces = pieces
                    .into_iter()
                    .flat_map(|piece| piece.is_overlapped(taken).remainder)
                    .collect();
            }
            required.extend(pieces);
        }

        Classified { submitted, required }
    }

    pub(crate) fn append(&mut self, requests: impl IntoIterator<Item = Arc<PendingRequest<A, E>>>) {
        self.requests.extend(requests);
    }

    /// Removes the given requests, identified by their IDs. Returns the number of requests actually removed.
    pub(crate) fn remove(&mut self, requests: &[Arc<PendingRequest<A, E>>]) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|existing| !requests.iter().any(|r| r.id() == existing.id()));
        before - self.requests.len()
    }

    pub(crate) fn replace(&mut self, requests: Vec<Arc<PendingRequest<A, E>>>) {
        self.requests = requests;
    }

    pub(crate) fn clear(&mut self) {
        self.requests.clear();
    }
}
