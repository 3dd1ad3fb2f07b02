use super::index_trait::{IndexRange, IndexRef};
use std::{
    marker::PhantomData,
    ops::{self, Index},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A push-only arena addressed by an [IndexRef] key. Handles returned by
/// [IndexedMap::push] stay valid for the life of the map; nothing is ever
/// removed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMap<K, D>
where
    K: IndexRef,
{
    data: Vec<D>,
    phantom: PhantomData<K>,
}

impl<K, D> IndexedMap<K, D>
where
    K: IndexRef + PartialOrd,
{
    /// Produces a range containing all the keys in the map. Unlike
    /// [IndexedMap::keys] the result has no lifetime tied to the map.
    pub fn range(&self) -> IndexRange<K> {
        IndexRange::new(K::new(0), K::new(self.len()))
    }
}

impl<K, D> ops::IndexMut<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.data[index.index()]
    }
}

impl<K, D> ops::Index<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    type Output = D;

    fn index(&self, index: K) -> &Self::Output {
        &self.data[index.index()]
    }
}

impl<K, D> IndexedMap<K, D>
where
    K: IndexRef,
{
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub fn get(&self, index: K) -> Option<&D> {
        self.data.get(index.index())
    }

    /// True when the key denotes a slot that has actually been pushed.
    pub fn contains(&self, index: K) -> bool {
        index.index() < self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, item: D) -> K {
        self.data.push(item);
        K::new(self.data.len() - 1)
    }

    /// The key the next call to [IndexedMap::push] will return.
    pub fn peek_next_idx(&self) -> K {
        K::new(self.data.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &D)> {
        self.data.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.data.len()).map(K::new)
    }
}

impl<T, K> Default for IndexedMap<K, T>
where
    K: IndexRef,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A map from arena keys to derived values, backed by a dense vector.
/// Reading a key that was never written yields the default value, which
/// makes it a natural store for annotations like gate depths where the
/// unwritten state is meaningful.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SecondaryMap<K, D>
where
    K: IndexRef,
    D: Clone,
{
    data: Vec<D>,
    phantom: PhantomData<K>,
    default_value: D,
}

// Deliberately no IndexMut: writes go through `insert` so the backing
// vector can grow to cover the key.

impl<K, D> Index<K> for SecondaryMap<K, D>
where
    K: IndexRef,
    D: Clone,
{
    type Output = D;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index)
    }
}

impl<K, D> SecondaryMap<K, D>
where
    K: IndexRef,
    D: Clone,
{
    pub fn new_with_default(default_value: D) -> Self {
        Self {
            data: Default::default(),
            phantom: PhantomData,
            default_value,
        }
    }

    pub fn get(&self, index: K) -> &D {
        if index.index() < self.data.len() {
            &self.data[index.index()]
        } else {
            &self.default_value
        }
    }

    pub fn insert(&mut self, index: K, item: D) {
        if index.index() < self.data.len() {
            self.data[index.index()] = item;
        } else {
            self.data
                .resize(index.index() + 1, self.default_value.clone());
            self.data[index.index()] = item;
        }
    }

    /// Reset every stored value back to the default without shrinking the
    /// backing storage.
    pub fn clear(&mut self) {
        for slot in self.data.iter_mut() {
            *slot = self.default_value.clone();
        }
    }
}

impl<K, D> SecondaryMap<K, D>
where
    K: IndexRef,
    D: Clone + Default,
{
    pub fn new() -> Self {
        Self {
            data: Default::default(),
            phantom: PhantomData,
            default_value: Default::default(),
        }
    }
}

impl<K, D> Default for SecondaryMap<K, D>
where
    K: IndexRef,
    D: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::{IndexRef, impl_index, impl_index_nonzero, maps::IndexedMap};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct MyIdx(u32);
    impl_index!(MyIdx);

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct MyNzIdx(std::num::NonZeroU32);
    impl_index_nonzero!(MyNzIdx);

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct MyData {
        number: usize,
    }

    #[test]
    fn push_and_lookup() {
        let mut map: IndexedMap<MyIdx, MyData> = IndexedMap::new();
        let a = map.push(MyData { number: 7 });
        let b = map.push(MyData { number: 11 });

        assert_eq!(map[a].number, 7);
        assert_eq!(map[b].number, 11);
        assert_eq!(map.len(), 2);
        map[a].number = 13;
        assert_eq!(map.get(a), Some(&MyData { number: 13 }));
        assert!(map.get(MyIdx::new(2)).is_none());
        assert_eq!(map.peek_next_idx(), MyIdx::new(2));
    }

    #[test]
    fn nonzero_option_is_free() {
        assert_eq!(
            std::mem::size_of::<Option<MyNzIdx>>(),
            std::mem::size_of::<MyNzIdx>()
        );
        let idx = MyNzIdx::new(0);
        assert_eq!(idx.index(), 0);
        let idx = MyNzIdx::new(41);
        assert_eq!(idx.index(), 41);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn keys_match_pushes(count in 0_usize..2000) {
            let mut map: IndexedMap<MyIdx, usize> = IndexedMap::new();
            for i in 0..count {
                let key = map.push(i);
                prop_assert_eq!(key.index(), i);
            }
            prop_assert_eq!(map.keys().count(), count);
            prop_assert_eq!(map.is_empty(), count == 0);
            for (k, v) in map.iter() {
                prop_assert_eq!(k.index(), *v);
            }
            let range = map.range();
            prop_assert_eq!(range.size(), count);
            prop_assert_eq!(range.is_empty(), count == 0);
            let walked: Vec<usize> =
                range.into_iter().map(|k| k.index()).collect();
            prop_assert_eq!(walked, (0..count).collect::<Vec<_>>());
        }

        #[test]
        fn secondary_defaults(
            writes in prop::collection::btree_map(0_usize..500, 0_u32..1000, 0..50)
        ) {
            let mut sec: super::SecondaryMap<MyIdx, u32> =
                super::SecondaryMap::new();
            for (k, v) in writes.iter() {
                sec.insert(MyIdx::new(*k), *v);
            }
            for probe in 0..500 {
                let expected = writes.get(&probe).copied().unwrap_or(0);
                prop_assert_eq!(*sec.get(MyIdx::new(probe)), expected);
            }
            sec.clear();
            for probe in 0..500 {
                prop_assert_eq!(sec[MyIdx::new(probe)], 0);
            }
        }
    }
}
