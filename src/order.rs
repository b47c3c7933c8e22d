//! Orderings for the priority queues.

use crate::hash::Primitive;
use core::cmp::Ordering;

/// A total order on `T`.
///
/// Any `Fn(&T, &T) -> Ordering` closure is a comparator.
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline(always)]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// The natural order of a primitive; floats are ordered totally, with
/// `-0.0 < 0.0` and NaNs at the ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Natural;

impl<T: Primitive> Comparator<T> for Natural {
    #[inline(always)]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.compare(*b)
    }
}

/// Reverses another comparator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reversed<C>(pub C);

impl<T, C: Comparator<T>> Comparator<T> for Reversed<C> {
    #[inline(always)]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.0.compare(b, a)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn comparators() {
        assert_eq!(Natural.compare(&1.5f64, &-2.0), Ordering::Greater);
        assert_eq!(Reversed(Natural).compare(&1i32, &2), Ordering::Greater);
        let by_magnitude = |a: &f32, b: &f32| a.abs().total_cmp(&b.abs());
        assert_eq!(by_magnitude.compare(&-3.0, &2.0), Ordering::Greater);
    }
}
