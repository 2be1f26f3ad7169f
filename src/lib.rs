//! proto-collections: in-memory associative containers driven by explicit
//! value protocols instead of `PartialEq`/`Hash`/`Ord`.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the comparison contract separate from the containers so a
//!   key type states exactly which operations it supports, and each
//!   container asks only for what it needs.
//! - Layers:
//!   - `protocol`: `Equatable`, `Hashable`, `Orderable`. Hashing and
//!     ordering are opt-in; the default methods fail with `Unsupported`.
//!   - `ChainedHashMap<K, V>`: separate chaining over `Equatable +
//!     Hashable` keys, power-of-two capacity, load-factor driven growth.
//!   - `SkipList<K, V, C>`: probabilistic ordered map over a
//!     `Comparator`, `ProtocolOrder` (i.e. `Orderable`) by default.
//!   - `SetView`: boolean-sentinel set over either map via `MapLike`.
//!   - `Value`: a dynamic value type exercising the composite rules.
//!
//! Constraints
//! - Single-threaded and synchronous: no locks, no atomics, `!Send`/`!Sync`
//!   containers. Callers synchronise externally if they must.
//! - Containers own their buckets/nodes and hold, not copy, keys and values.
//!   Mutating a key's hash- or order-relevant state after insertion breaks
//!   the container; this is not detected.
//!
//! Failure boundaries
//! - Every call that can run fallible user code (`hash_code`, `compare`)
//!   finishes that work before touching the structure. An error leaves the
//!   container unchanged.
//! - The hash map caches each entry's hash code; rehashing never calls
//!   user code and cannot fail. Skip-list splicing and unlinking happen
//!   after the search and call no user code.
//! - Reentrancy: user protocol code that calls back into the same container
//!   while it is scanning panics in debug builds.
//!
//! Iteration
//! - `ChainedHashMap` yields bucket/chain order, which depends on capacity.
//! - `SkipList` yields ascending comparator order along level 0.
//! - Iterators borrow the container, so mutation during iteration is
//!   rejected at compile time.

pub mod chained_hash_map;
pub mod error;
mod pairs;
pub mod protocol;
mod scan_guard;
pub mod set_view;
pub mod skip_list;
pub mod value;

#[cfg(test)]
mod chained_hash_map_proptest;
#[cfg(test)]
mod skip_list_proptest;

// Public surface
pub use chained_hash_map::{capacity_for, ChainedHashMap};
pub use error::{Error, Result};
pub use protocol::{Equatable, Hashable, Identity, Orderable};
pub use set_view::{HashSetView, MapLike, SetView, SortedSetView};
pub use skip_list::{ByFn, Comparator, ProtocolOrder, SetOutcome, SkipList, SkipListOptions};
pub use value::{Record, Value};
