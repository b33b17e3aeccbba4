//! # region-cache
//!
//! Generic read-through cache for data addressed by regions of multi-dimensional key-space, like "all quotes of AAPL
//! and MSFT from March 3 to March 17".
//!
//! # The Basics
//!
//! The cache is designed for the following use case:
//!
//! - Records are requested in bulk, by ranges or sets of keys along one or more dimensions.
//! - Fetching from the source of truth is expensive, and requests from different callers overlap.
//! - Parts of the cached data must be invalidated without throwing away everything.
//!
//! The cache operates on the following principles:
//!
//! - It is backend-agnostic: records come from a user-implemented [`DataSource`].
//! - It is record and key agnostic: a caller describes what it needs with an [`Argument`]; the crate provides
//!   [`Spatial`](argument::Spatial), an argument over an N-dimensional [`Region`](region::Region).
//! - Only the missing part of a request is fetched. Whatever is already cached or being fetched by someone else is
//!   waited for instead.
//! - Invalidation may cut a region out of earlier requests; what's left of them stays cached.
//! - Fully async.
//!
//! # Request Ledger
//!
//! The cache doesn't look at the records to decide what to fetch. Instead, it keeps a ledger of every argument it has
//! accepted. A new request is matched against the ledger, and only the parts of its arguments not covered by any
//! earlier request are turned into new ledger entries and handed over to the data source in one background fetch.
//!
//! A failed fetch stays in the ledger, so requests overlapping it fail the same way without hitting the data source
//! again. Unless the data source considers the error recoverable (by default, a timeout); then the failed entries are
//! removed and the next request retries.
//!
//! ```ignore
//! let cache = Cache::builder().data_source(Arc::new(source)).name("quotes").build()?;
//! let march = Spatial::new(
//!     (RangeSet::new(20240303, 20240317), ["AAPL", "MSFT"].into_iter().map(String::from).collect::<DiscreteSet<_>>()),
//!     |q: &Quote| (q.date, q.symbol.clone()),
//! );
//! let quotes = cache.get(vec![march.clone()], &CancellationToken::new()).await?;
//! cache.invalidate(vec![march]).await;
//! ```

pub mod argument;
pub mod cache;
pub(crate) mod ledger;
pub mod region;
pub mod request;
pub mod set;
pub(crate) mod store;
pub mod traits;
pub mod types;

#[doc(inline)]
pub use argument::Argument;
#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use traits::DataSource;

pub use tokio_util::sync::CancellationToken;

pub mod prelude {
    pub use crate::argument::Argument;
    pub use crate::argument::Overlap;
    pub use crate::argument::Spatial;
    pub use crate::cache::Cache;
    pub use crate::region::Dimensions;
    pub use crate::region::Region;
    pub use crate::set::DiscreteSet;
    pub use crate::set::KeySet;
    pub use crate::set::RangeSet;
    pub use crate::set::Step;
    pub use crate::traits::DataSource;
    pub use crate::traits::Observer;
    pub use crate::types::*;
    pub use tokio_util::sync::CancellationToken;
}
