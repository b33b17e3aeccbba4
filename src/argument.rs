use std::fmt::Debug;
use std::sync::Arc;

use crate::region::Dimensions;
use crate::region::Region;

/// Result of testing one argument against another with [`Argument::is_overlapped`].
#[derive(Clone, Debug)]
pub struct Overlap<A> {
    /// True if the two arguments share any part of key-space.
    pub overlapped: bool,
    /// The part of the tested argument lying outside of the other one. When there is no overlap this is the tested
    /// argument itself; when it is fully covered this is empty.
    pub remainder:  Vec<A>,
}

impl<A> Overlap<A> {
    pub fn disjoint(argument: A) -> Self {
        Self {
            overlapped: false,
            remainder:  vec![argument],
        }
    }

    pub fn with_remainder(remainder: Vec<A>) -> Self {
        Self {
            overlapped: true,
            remainder,
        }
    }
}

/// A query object describing a part of key-space.
///
/// Arguments are immutable. Fragmenting an argument always produces new instances.
pub trait Argument: Clone + Debug + Send + Sync + 'static {
    type Record;

    /// Tests `self` against `other` and returns what's left of `self` outside of `other`.
    fn is_overlapped(&self, other: &Self) -> Overlap<Self>;

    /// True if the record belongs to the part of key-space described by this argument.
    fn is_data_included(&self, record: &Self::Record) -> bool;

    /// True if the argument describes no key at all. Such arguments are never fetched.
    fn is_empty(&self) -> bool {
        false
    }
}

type Projection<D, R> = Arc<dyn Fn(&R) -> <D as Dimensions>::Point + Send + Sync>;

/// An argument over a [`Region`]. Records are mapped into key-space with a projection function which is shared by all
/// fragments of the argument.
///
/// ```ignore
/// let arg = Spatial::new(
///     (RangeSet::new(20240101, 20240131), DiscreteSet::single("AAPL".to_string())),
///     |quote: &Quote| (quote.date, quote.symbol.clone()),
/// );
/// ```
pub struct Spatial<D, R>
where
    D: Dimensions,
{
    region:     Region<D>,
    projection: Projection<D, R>,
}

impl<D, R> Spatial<D, R>
where
    D: Dimensions,
    R: 'static,
{
    pub fn new<F>(region: impl Into<Region<D>>, projection: F) -> Self
    where
        F: Fn(&R) -> D::Point + Send + Sync + 'static,
    {
        Self {
            region:     region.into(),
            projection: Arc::new(projection),
        }
    }

    pub fn region(&self) -> &Region<D> {
        &self.region
    }

    /// Creates a sibling argument over another region, sharing the projection of this one.
    pub fn with_region(&self, region: Region<D>) -> Self {
        Self {
            region,
            projection: Arc::clone(&self.projection),
        }
    }

    /// Maps a record into key-space.
    pub fn project(&self, record: &R) -> D::Point {
        (self.projection)(record)
    }
}

impl<D, R> Clone for Spatial<D, R>
where
    D: Dimensions,
{
    fn clone(&self) -> Self {
        Self {
            region:     self.region.clone(),
            projection: Arc::clone(&self.projection),
        }
    }
}

impl<D, R> Debug for Spatial<D, R>
where
    D: Dimensions,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Spatial").field(self.region.dims()).finish()
    }
}

impl<D, R> Argument for Spatial<D, R>
where
    D: Dimensions,
    R: 'static,
{
    type Record = R;

    fn is_overlapped(&self, other: &Self) -> Overlap<Self> {
        if !self.region.intersects(&other.region) {
            return Overlap::disjoint(self.clone());
        }

        Overlap::with_remainder(
            self.region
                .subtract(&other.region)
                .into_iter()
                .map(|region| self.with_region(region))
                .collect(),
        )
    }

    #[inline]
    fn is_data_included(&self, record: &R) -> bool {
        self.region.contains(&self.project(record))
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}
