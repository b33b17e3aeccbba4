use crate::argument::Argument;

/// Cached records in the order they were received. Records are never modified in place: they're appended by
/// successful fetches and removed in bulk by invalidation.
#[derive(Debug)]
pub(crate) struct DataStore<R> {
    records: Vec<R>,
}

impl<R> DataStore<R>
where
    R: Clone,
{
    pub(crate) fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn records(&self) -> &[R] {
        &self.records
    }

    pub(crate) fn append(&mut self, records: impl IntoIterator<Item = R>) -> usize {
        let before = self.records.len();
        self.records.extend(records);
        self.records.len() - before
    }

    /// Clones records belonging to any of the arguments.
    pub(crate) fn select<A>(&self, arguments: &[A]) -> Vec<R>
    where
        A: Argument<Record = R>,
    {
        self.records
            .iter()
            .filter(|record| arguments.iter().any(|arg| arg.is_data_included(record)))
            .cloned()
            .collect()
    }

    /// Removes records belonging to any of the arguments. Returns the number of removed records.
    pub(crate) fn remove<A>(&mut self, arguments: &[A]) -> usize
    where
        A: Argument<Record = R>,
    {
        let before = self.records.len();
        self.records
            .retain(|record| !arguments.iter().any(|arg| arg.is_data_included(record)));
        before - self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
