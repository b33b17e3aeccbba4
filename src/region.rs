//! N-dimensional axis-aligned regions of key-space.
//!
//! A region is a tuple of [`KeySet`]s, one per dimension. The central operation is [`Region::subtract`] which splits
//! `A \ B` into disjoint pieces using slab decomposition: walking the axes in order, the piece emitted for axis `i`
//! carries `A[i] - B[i]` on that axis, the already consumed overlap `A[j] ∩ B[j]` on the axes before it, and the
//! untouched `A[j]` on the axes after it. Every point of `A` outside of `B` lands in exactly one piece.

use std::fmt::Debug;

use crate::set::KeySet;

/// A fixed set of dimensions. Implemented for tuples of 1 to 6 [`KeySet`]s.
pub trait Dimensions: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// A point in key-space: a tuple of per-dimension values.
    type Point: Clone + Debug + Send + Sync + 'static;

    /// The number of dimensions.
    const RANK: usize;

    fn contains(&self, point: &Self::Point) -> bool;

    /// True if any of the dimensions is empty.
    fn is_empty(&self) -> bool;

    /// True if every dimension shares at least one value with the same dimension of `other`.
    fn intersects(&self, other: &Self) -> bool;

    fn intersection(&self, other: &Self) -> Self;

    /// Builds the slab of `self \ other` for the given axis. `None` if the slab is empty.
    fn slab(&self, other: &Self, axis: usize) -> Option<Self>;
}

macro_rules! tuple_dimensions {
    ($rank:literal; $($set:ident $idx:tt),+) => {
        impl<$($set),+> Dimensions for ($($set,)+)
        where
            $($set: KeySet,)+
        {
            type Point = ($($set::Value,)+);

            const RANK: usize = $rank;

            #[inline]
            fn contains(&self, point: &Self::Point) -> bool {
                true $(&& self.$idx.contains(&point.$idx))+
            }

            #[inline]
            fn is_empty(&self) -> bool {
                false $(|| self.$idx.is_empty())+
            }

            fn intersects(&self, other: &Self) -> bool {
                true $(&& !self.$idx.intersect(&other.$idx).is_empty())+
            }

            fn intersection(&self, other: &Self) -> Self {
                ($(self.$idx.intersect(&other.$idx),)+)
            }

            fn slab(&self, other: &Self, axis: usize) -> Option<Self> {
                let slab = ($(
                    if $idx < axis {
                        self.$idx.intersect(&other.$idx)
                    }
                    else if $idx == axis {
                        self.$idx.subtract(&other.$idx)
                    }
                    else {
                        self.$idx.clone()
                    },
                )+);
                (!Dimensions::is_empty(&slab)).then_some(slab)
            }
        }
    };
}

tuple_dimensions!(1; A 0);
tuple_dimensions!(2; A 0, B 1);
tuple_dimensions!(3; A 0, B 1, C 2);
tuple_dimensions!(4; A 0, B 1, C 2, D 3);
tuple_dimensions!(5; A 0, B 1, C 2, D 3, E 4);
tuple_dimensions!(6; A 0, B 1, C 2, D 3, E 4, F 5);

/// An axis-aligned hyper-rectangle of key-space. Immutable.
#[derive(Clone, Debug, PartialEq)]
pub struct Region<D>
where
    D: Dimensions,
{
    dims: D,
}

impl<D> Region<D>
where
    D: Dimensions,
{
    pub fn new(dims: D) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &D {
        &self.dims
    }

    pub fn into_dims(self) -> D {
        self.dims
    }

    #[inline]
    pub fn contains(&self, point: &D::Point) -> bool {
        self.dims.contains(point)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !other.is_empty() && !self.is_empty() && self.dims.intersects(&other.dims)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::new(self.dims.intersection(&other.dims))
    }

    /// Disjoint decomposition of `self \ other`.
    ///
    /// When the regions don't intersect the result is `self` alone. The result never contains empty regions, so
    /// subtracting a covering region yields an empty vector.
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        if !self.intersects(other) {
            return vec![self.clone()];
        }

        (0..D::RANK)
            .filter_map(|axis| self.dims.slab(&other.dims, axis))
            .map(Self::new)
            .collect()
    }
}

impl<D> From<D> for Region<D>
where
    D: Dimensions,
{
    fn from(dims: D) -> Self {
        Self::new(dims)
    }
}
