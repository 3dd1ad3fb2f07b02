#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A lightweight handle into one of the graph arenas.
///
/// Implementors are thin wrappers around an unsigned integer, declared with
/// the [`impl_index!`](crate::impl_index) or
/// [`impl_index_nonzero!`](crate::impl_index_nonzero) macros.
pub trait IndexRef: Copy + Eq {
    fn index(&self) -> usize;
    fn new(input: usize) -> Self;
}

/// A half open range of indices. The start is inclusive, the end is
/// exclusive.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    /// The start of the range (inclusive).
    start: I,
    /// The end of the range (exclusive).
    end: I,
}

impl<I> IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    pub fn new(start: I, end: I) -> Self {
        assert!(start <= end, "start must be less than or equal to end");
        Self { start, end }
    }

    pub fn size(&self) -> usize {
        self.end.index().saturating_sub(self.start.index())
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl<I> IntoIterator for IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    type Item = I;

    type IntoIter = IndexRangeIterator<I>;

    fn into_iter(self) -> Self::IntoIter {
        IndexRangeIterator::new(self)
    }
}

/// An iterator over a half open range of indices. Owns the range it walks,
/// so it can outlive the map that produced it.
#[derive(Debug)]
pub struct IndexRangeIterator<I>
where
    I: IndexRef + PartialOrd,
{
    range: IndexRange<I>,
}

impl<I> IndexRangeIterator<I>
where
    I: IndexRef + PartialOrd,
{
    pub fn new(range: IndexRange<I>) -> Self {
        Self { range }
    }
}

impl<I> Iterator for IndexRangeIterator<I>
where
    I: IndexRef + PartialOrd,
{
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start < self.range.end {
            let out = self.range.start;
            self.range.start = I::new(self.range.start.index() + 1);
            Some(out)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = if self.range.end > self.range.start {
            self.range.end.index() - self.range.start.index()
        } else {
            0
        };

        (size, Some(size))
    }
}

impl<I> ExactSizeIterator for IndexRangeIterator<I> where
    I: IndexRef + PartialOrd
{
}
