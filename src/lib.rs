//! Collections specialised for primitive keys and elements.
//!
//! * [`OpenHashMap`]: an open addressing hash map with linear probing, keyed
//!   by any [`Primitive`], with pluggable key equality ([`Strategy`]).
//! * [`HeapPriorityQueue`]: a binary heap priority queue ordered by a
//!   [`Comparator`].
//! * [`ArraySet`]: a tiny set backed by a flat array.
//!
//! Every container allocates through an [`Alloc`], and every operation that
//! may allocate returns a `Result` instead of aborting when memory runs out.
//! Traversals that can be split for parallel processing implement
//! [`Spliterator`].

pub mod alloc;
pub mod array_set;
pub mod hash;
pub mod heap;
pub mod open_hash_map;
pub mod order;
pub mod raw_vec;
pub mod traverse;

pub use alloc::Alloc;
pub use array_set::ArraySet;
pub use hash::{DefaultStrategy, NumericStrategy, Primitive, Strategy};
pub use heap::HeapPriorityQueue;
pub use open_hash_map::OpenHashMap;
pub use order::{Comparator, Natural, Reversed};
pub use traverse::Spliterator;
