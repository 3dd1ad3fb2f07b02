//! Index handles and arena maps used by the sepal graph structures.
//!
//! Graph nodes (components, ports, buses, exits, entries) live in
//! [`maps::IndexedMap`] arenas and refer to each other through small `Copy`
//! index newtypes declared with [`impl_index!`] or [`impl_index_nonzero!`].
//! Derived annotations that should not live inside the arenas (gate depths,
//! processed flags) go in [`maps::SecondaryMap`].

mod index_trait;
mod macros;
pub mod maps;

pub use index_trait::{IndexRange, IndexRangeIterator, IndexRef};
