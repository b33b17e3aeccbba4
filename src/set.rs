//! Per-dimension value sets.
//!
//! A [`Region`](crate::region::Region) is built out of one set per dimension. Whatever the set shape is, it must be
//! closed under subtraction so that fragmenting a region never produces a dimension that cannot be represented. Two
//! shapes are provided:
//!
//! - [`DiscreteSet`] – an explicit list of values; good for symbols, identifiers, enum-like keys.
//! - [`RangeSet`] – a union of inclusive ranges over a value type with well-defined neighbours (see [`Step`]); good for
//!   dates, sequence numbers, timestamps with fixed resolution.

use std::collections::BTreeSet;
use std::fmt::Debug;

/// The contract of a single dimension of key-space.
pub trait KeySet: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The type of a point along this dimension.
    type Value: Clone + Debug + Send + Sync + 'static;

    fn contains(&self, value: &Self::Value) -> bool;

    /// Returns the set of values in `self` but not in `other`.
    fn subtract(&self, other: &Self) -> Self;

    fn is_empty(&self) -> bool;

    /// Returns the set of values present in both sets.
    ///
    /// The default implementation derives the intersection from subtraction; implementors are encouraged to provide a
    /// direct one.
    fn intersect(&self, other: &Self) -> Self {
        self.subtract(&self.subtract(other))
    }
}

/// Values that have well-defined immediate neighbours. Required to split an inclusive range around a removed piece.
pub trait Step: Ord + Clone + Debug + Send + Sync + 'static {
    /// The next value, or `None` at the upper bound of the type.
    fn succ(&self) -> Option<Self>;
    /// The previous value, or `None` at the lower bound of the type.
    fn pred(&self) -> Option<Self>;
}

macro_rules! int_step {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Step for $t {
                #[inline]
                fn succ(&self) -> Option<Self> {
                    self.checked_add(1)
                }

                #[inline]
                fn pred(&self) -> Option<Self> {
                    self.checked_sub(1)
                }
            }
        )+
    };
}

int_step!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiscreteSet<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    values: BTreeSet<T>,
}

impl<T> DiscreteSet<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    pub fn empty() -> Self {
        Self {
            values: BTreeSet::new(),
        }
    }

    pub fn single(value: T) -> Self {
        Self {
            values: BTreeSet::from([value]),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<T> FromIterator<T> for DiscreteSet<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T> KeySet for DiscreteSet<T>
where
    T: Ord + Clone + Debug + Send + Sync + 'static,
{
    type Value = T;

    #[inline]
    fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    fn subtract(&self, other: &Self) -> Self {
        self.values.difference(&other.values).cloned().collect()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn intersect(&self, other: &Self) -> Self {
        self.values.intersection(&other.values).cloned().collect()
    }
}

/// A union of inclusive ranges.
///
/// The ranges are always kept sorted, disjoint and non-adjacent, so two range sets describing the same values compare
/// equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeSet<T>
where
    T: Step,
{
    ranges: Vec<(T, T)>,
}

impl<T> RangeSet<T>
where
    T: Step,
{
    /// A single inclusive range `[lo, hi]`. Empty if `lo > hi`.
    pub fn new(lo: T, hi: T) -> Self {
        Self {
            ranges: if lo <= hi { vec![(lo, hi)] } else { Vec::new() },
        }
    }

    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn point(value: T) -> Self {
        Self::new(value.clone(), value)
    }

    /// Builds a set from arbitrary inclusive ranges. Inverted ranges are ignored, overlapping and adjacent ones are
    /// merged.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = (T, T)>,
    {
        let mut sorted: Vec<(T, T)> = ranges.into_iter().filter(|(lo, hi)| lo <= hi).collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut merged: Vec<(T, T)> = Vec::with_capacity(sorted.len());
        for (lo, hi) in sorted {
            if let Some(last) = merged.last_mut() {
                let touches = last.1 >= lo || last.1.succ().is_some_and(|next| next == lo);
                if touches {
                    if hi > last.1 {
                        last.1 = hi;
                    }
                    continue;
                }
            }
            merged.push((lo, hi));
        }

        Self { ranges: merged }
    }

    pub fn ranges(&self) -> &[(T, T)] {
        &self.ranges
    }
}

impl<T> KeySet for RangeSet<T>
where
    T: Step,
{
    type Value = T;

    fn contains(&self, value: &T) -> bool {
        // First range whose upper bound is not below the value.
        let idx = self.ranges.partition_point(|(_, hi)| hi < value);
        self.ranges.get(idx).is_some_and(|(lo, _)| lo <= value)
    }

    fn subtract(&self, other: &Self) -> Self {
        let theirs = &other.ranges;
        let mut out = Vec::with_capacity(self.ranges.len());
        let mut first = 0;

        for (lo, hi) in &self.ranges {
            while first < theirs.len() && theirs[first].1 < *lo {
                first += 1;
            }

            let mut cursor = first;
            let mut start = Some(lo.clone());

            while let Some(from) = start.take() {
                let Some((cut_lo, cut_hi)) = theirs.get(cursor).filter(|(cut_lo, _)| cut_lo <= hi)
                else {
                    out.push((from, hi.clone()));
                    break;
                };

                if *cut_lo > from {
                    if let Some(until) = cut_lo.pred() {
                        out.push((from, until));
                    }
                }

                if cut_hi < hi {
                    start = cut_hi.succ();
                    cursor += 1;
                }
            }
        }

        Self { ranges: out }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn intersect(&self, other: &Self) -> Self {
        let (ours, theirs) = (&self.ranges, &other.ranges);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < ours.len() && j < theirs.len() {
            let lo = std::cmp::max(&ours[i].0, &theirs[j].0);
            let hi = std::cmp::min(&ours[i].1, &theirs[j].1);
            if lo <= hi {
                out.push((lo.clone(), hi.clone()));
            }
            if ours[i].1 < theirs[j].1 {
                i += 1;
            }
            else {
                j += 1;
            }
        }

        Self { ranges: out }
    }
}
