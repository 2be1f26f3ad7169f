//! ChainedHashMap: separate-chaining hash map driven by the value protocols.
//!
//! Layout
//! - `buckets` has `capacity` slots, always a power of two. A slot stays
//!   `None` until the first key hashes into it.
//! - Each entry caches the `hash_code` computed when it was inserted.
//!   Indexing and rehashing only ever use the cached code, so a resize never
//!   calls back into user code and cannot fail halfway.
//!
//! Growth
//! - Before inserting `n` pairs, if `count + n >= capacity * load_factor`
//!   the table grows to the next power of two at least twice the current
//!   capacity (doubling again until the bound holds) and every entry is
//!   moved exactly once.
//! - A load factor so small that no `usize` capacity satisfies the bound
//!   makes the insert fail with `InvalidArgument`; the map is unchanged.
//!
//! Iteration walks buckets in slot order and each chain in insertion order.
//! That order depends on capacity and changes across resizes.

use crate::error::{Error, Result};
use crate::pairs::pair_up;
use crate::protocol::{fold_unordered, Equatable, Hashable, Orderable};
use crate::scan_guard::ScanGuard;
use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;
use core::mem;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: i64,
}

type Bucket<K, V> = Vec<Entry<K, V>>;

// Raw chained storage. Never calls user code except `eq_value` while
// matching inside a single chain.
#[derive(Clone)]
struct Table<K, V> {
    buckets: Vec<Option<Bucket<K, V>>>,
    count: usize,
    load_factor: f64,
}

pub struct ChainedHashMap<K, V> {
    table: Table<K, V>,
    default: Option<V>,
    guard: ScanGuard,
}

/// Round `n` up to a power of two. Zero is not a capacity.
pub fn capacity_for(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(Error::invalid("capacity must be positive"));
    }
    n.checked_next_power_of_two()
        .ok_or_else(|| Error::invalid(format!("capacity {n} is too large")))
}

#[inline]
fn slot(hash: i64, capacity: usize) -> usize {
    (hash as u64 as usize) & (capacity - 1)
}

fn empty_buckets<K, V>(capacity: usize) -> Vec<Option<Bucket<K, V>>> {
    let mut v = Vec::with_capacity(capacity);
    v.resize_with(capacity, || None);
    v
}

impl<K: Equatable, V> Table<K, V> {
    fn new(capacity: usize, load_factor: f64) -> Self {
        Self {
            buckets: empty_buckets(capacity),
            count: 0,
            load_factor,
        }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn over_bound(&self, n: usize, capacity: usize) -> bool {
        n as f64 >= capacity as f64 * self.load_factor
    }

    // (slot, position in chain) of the entry whose key matches.
    fn locate<Q>(&self, hash: i64, key: &Q) -> Option<(usize, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Equatable,
    {
        let idx = slot(hash, self.capacity());
        let chain = self.buckets[idx].as_ref()?;
        chain
            .iter()
            .position(|e| e.hash == hash && <K as Borrow<Q>>::borrow(&e.key).eq_value(key))
            .map(|pos| (idx, pos))
    }

    fn entry(&self, (idx, pos): (usize, usize)) -> Option<&Entry<K, V>> {
        self.buckets[idx].as_ref().and_then(|chain| chain.get(pos))
    }

    fn entry_mut(&mut self, (idx, pos): (usize, usize)) -> Option<&mut Entry<K, V>> {
        self.buckets[idx].as_mut().and_then(|chain| chain.get_mut(pos))
    }

    // Smallest power-of-two capacity, starting from `from` and doubling,
    // that keeps `n` entries within the load bound. `strict` selects the
    // growth test (`n >= cap * lf`) over the settle test (`n > cap * lf`).
    fn fitting_capacity(&self, n: usize, from: usize, strict: bool) -> Result<usize> {
        let lf = self.load_factor;
        let fits = |cap: usize| {
            let bound = cap as f64 * lf;
            if strict {
                (n as f64) < bound
            } else {
                (n as f64) <= bound
            }
        };
        let mut cap = from;
        while !fits(cap) {
            cap = cap.checked_mul(2).ok_or_else(|| {
                Error::invalid(format!(
                    "{n} entries do not fit any capacity at load factor {lf}"
                ))
            })?;
        }
        Ok(cap)
    }

    // Fails, with the table untouched, when no capacity can hold the batch.
    fn reserve_for(&mut self, incoming: usize) -> Result<()> {
        if incoming == 0 {
            return Ok(());
        }
        let needed = self
            .count
            .checked_add(incoming)
            .ok_or_else(|| Error::invalid("entry count overflows usize"))?;
        let cap = self.capacity();
        if !self.over_bound(needed, cap) {
            return Ok(());
        }
        let from = cap
            .checked_mul(2)
            .ok_or_else(|| Error::invalid(format!("capacity {cap} cannot grow")))?;
        let new_cap = self.fitting_capacity(needed, from, true)?;
        self.rehash(new_cap);
        Ok(())
    }

    fn insert(&mut self, hash: i64, key: K, value: V) -> Option<V> {
        let idx = slot(hash, self.capacity());
        let chain = self.buckets[idx].get_or_insert_with(Vec::new);
        if let Some(e) = chain
            .iter_mut()
            .find(|e| e.hash == hash && e.key.eq_value(&key))
        {
            return Some(mem::replace(&mut e.value, value));
        }
        chain.push(Entry { key, value, hash });
        self.count += 1;
        None
    }

    fn remove(&mut self, (idx, pos): (usize, usize)) -> Option<Entry<K, V>> {
        let chain = self.buckets[idx].as_mut()?;
        if pos >= chain.len() {
            return None;
        }
        let e = chain.remove(pos);
        if chain.is_empty() {
            self.buckets[idx] = None;
        }
        self.count -= 1;
        Some(e)
    }

    // Moves every entry by its cached hash; no user code runs.
    fn rehash(&mut self, new_capacity: usize) {
        let old_capacity = self.capacity();
        let old = mem::replace(&mut self.buckets, empty_buckets(new_capacity));
        for entry in old.into_iter().flatten().flatten() {
            let idx = slot(entry.hash, new_capacity);
            self.buckets[idx].get_or_insert_with(Vec::new).push(entry);
        }
        debug!(
            from = old_capacity,
            to = new_capacity,
            count = self.count,
            "chained hash map rehashed"
        );
    }

    fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = None);
        self.count = 0;
    }
}

impl<K, V> ChainedHashMap<K, V>
where
    K: Hashable,
{
    pub fn new() -> Self {
        Self::from_table(Table::new(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR))
    }

    /// Start with room for `capacity` slots, rounded up to a power of two.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// `load_factor` must be finite and in `(0, 1]`.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f64) -> Result<Self> {
        if !(load_factor > 0.0 && load_factor <= 1.0) {
            return Err(Error::invalid(format!(
                "load factor {load_factor} is outside (0, 1]"
            )));
        }
        Ok(Self::from_table(Table::new(
            capacity_for(capacity)?,
            load_factor,
        )))
    }

    fn from_table(table: Table<K, V>) -> Self {
        Self {
            table,
            default: None,
            guard: ScanGuard::new(),
        }
    }

    /// Build from pairs; fails without side effects if any key cannot hash.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut m = Self::new();
        m.set_many(pairs)?;
        Ok(m)
    }

    /// Value returned by `get` on a miss when no per-call default is given.
    pub fn with_default(mut self, default: V) -> Self {
        self.default = Some(default);
        self
    }

    pub fn set_default(&mut self, default: Option<V>) {
        self.default = default;
    }

    pub fn default_value(&self) -> Option<&V> {
        self.default.as_ref()
    }

    /// Key equality is decided by `Equatable`, never by string case.
    pub fn set_case_sensitive(&mut self, _case_sensitive: bool) -> Result<()> {
        Err(Error::Unsupported(
            "case sensitivity is not configurable; key equality is protocol-driven",
        ))
    }

    pub fn len(&self) -> usize {
        self.table.count
    }
    pub fn is_empty(&self) -> bool {
        self.table.count == 0
    }
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }
    pub fn load_factor(&self) -> f64 {
        self.table.load_factor
    }

    /// Slot index `key` maps to at the current capacity.
    pub fn index_of<Q>(&self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        Ok(slot(key.hash_code()?, self.capacity()))
    }

    /// Value for `key`, or `None` on a miss. Defaults are not consulted.
    pub fn try_get<Q>(&self, key: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        let _g = self.guard.enter("get");
        let hash = key.hash_code()?;
        Ok(self
            .table
            .locate(hash, key)
            .and_then(|at| self.table.entry(at))
            .map(|e| &e.value))
    }

    /// Value for `key`, else the configured default, else `KeyNotFound`.
    pub fn get<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        match self.try_get(key)? {
            Some(v) => Ok(v),
            None => self.default.as_ref().ok_or(Error::KeyNotFound),
        }
    }

    /// Value for `key`, else `default`.
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> Result<&'a V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<Option<&mut V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        let _g = self.guard.enter("get_mut");
        let hash = key.hash_code()?;
        Ok(match self.table.locate(hash, key) {
            Some(at) => self.table.entry_mut(at).map(|e| &mut e.value),
            None => None,
        })
    }

    pub fn has<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        let _g = self.guard.enter("has");
        let hash = key.hash_code()?;
        Ok(self.table.locate(hash, key).is_some())
    }

    /// Insert or overwrite. Returns the previous value for an existing key.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>> {
        let _g = self.guard.enter("set");
        let hash = key.hash_code()?;
        self.table.reserve_for(1)?;
        Ok(self.table.insert(hash, key, value))
    }

    /// Bulk `set`. Every key is hashed first; if one fails the map is left
    /// untouched. Growth is decided once for the whole batch.
    pub fn set_many<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let _g = self.guard.enter("set");
        let staged = pairs
            .into_iter()
            .map(|(k, v)| Ok((k.hash_code()?, k, v)))
            .collect::<Result<Vec<_>>>()?;
        self.table.reserve_for(staged.len())?;
        for (hash, k, v) in staged {
            self.table.insert(hash, k, v);
        }
        Ok(())
    }

    /// Remove `key`, returning the stored pair, or `KeyNotFound`.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hashable,
    {
        let _g = self.guard.enter("delete");
        let hash = key.hash_code()?;
        let e = self
            .table
            .locate(hash, key)
            .and_then(|at| self.table.remove(at))
            .ok_or(Error::KeyNotFound)?;
        Ok((e.key, e.value))
    }

    /// Grow to at least `new_capacity` slots. Never shrinks.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity <= self.capacity() {
            return Ok(());
        }
        let _g = self.guard.enter("resize");
        self.table.rehash(capacity_for(new_capacity)?);
        Ok(())
    }

    /// Set the capacity to `capacity` rounded up to a power of two, doubling
    /// further if the current count would break the load-factor bound.
    /// May shrink. `InvalidArgument` if no `usize` capacity fits.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        let _g = self.guard.enter("set_capacity");
        let new_cap = self
            .table
            .fitting_capacity(self.table.count, capacity_for(capacity)?, false)?;
        if new_cap != self.table.capacity() {
            debug!(requested = capacity, to = new_cap, "capacity set");
            self.table.rehash(new_cap);
        }
        Ok(())
    }

    /// Drop every entry and bucket. Capacity is kept.
    pub fn clear(&mut self) {
        let _g = self.guard.enter("clear");
        self.table.clear();
    }
}

impl<K, V> ChainedHashMap<K, V> {
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.table.buckets.iter(),
            chain: Default::default(),
            remaining: self.table.count,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            buckets: self.table.buckets.iter_mut(),
            chain: Default::default(),
            remaining: self.table.count,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<T> ChainedHashMap<T, T>
where
    T: Hashable,
{
    /// Build from `k0, v0, k1, v1, ...`.
    pub fn from_alternating<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let mut m = Self::new();
        m.set_alternating(items)?;
        Ok(m)
    }

    pub fn set_alternating<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.set_many(pair_up(items)?)
    }
}

impl<K: Hashable, V> Default for ChainedHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for ChainedHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            default: self.default.clone(),
            guard: ScanGuard::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ChainedHashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Maps are equal when they hold the same keys (by `Equatable`) with equal
/// values. Capacity, chain order and defaults do not matter.
impl<K: Hashable, V: Equatable> Equatable for ChainedHashMap<K, V> {
    fn eq_value(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        self.table.count == other.table.count
            && self.iter().all(|(k, v)| match other.try_get(k) {
                Ok(Some(ov)) => v.eq_value(ov),
                _ => false,
            })
    }
}

impl<K: Hashable, V: Hashable> Hashable for ChainedHashMap<K, V> {
    fn hash_code(&self) -> Result<i64> {
        fold_unordered(self.iter())
    }
}

impl<K, V> Orderable for ChainedHashMap<K, V> {}

impl<'a, K, V> IntoIterator for &'a ChainedHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut ChainedHashMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Iterator over entries in bucket/chain order.
pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Option<Bucket<K, V>>>,
    chain: core::slice::Iter<'a, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.chain.next() {
                self.remaining -= 1;
                return Some((&e.key, &e.value));
            }
            match self.buckets.next()? {
                Some(chain) => self.chain = chain.iter(),
                None => continue,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over entries with mutable values, in bucket/chain order.
pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Option<Bucket<K, V>>>,
    chain: core::slice::IterMut<'a, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.chain.next() {
                self.remaining -= 1;
                return Some((&e.key, &mut e.value));
            }
            match self.buckets.next()? {
                Some(chain) => self.chain = chain.iter_mut(),
                None => continue,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

#[cfg(test)]
impl<K: Hashable, V> ChainedHashMap<K, V> {
    /// Structural invariants: power-of-two capacity, load bound, every entry
    /// in the slot its cached hash selects, no empty chains, exact count.
    pub(crate) fn check_invariants(&self) {
        let cap = self.capacity();
        assert!(cap.is_power_of_two());
        assert!(self.table.count as f64 <= cap as f64 * self.table.load_factor);
        let mut seen = 0;
        for (idx, b) in self.table.buckets.iter().enumerate() {
            if let Some(chain) = b {
                assert!(!chain.is_empty(), "empty chain left at slot {idx}");
                for e in chain {
                    assert_eq!(slot(e.hash, cap), idx);
                    assert_eq!(e.key.hash_code().ok(), Some(e.hash));
                    seen += 1;
                }
            }
        }
        assert_eq!(seen, self.table.count);
    }

    pub(crate) fn chain_len(&self, idx: usize) -> usize {
        self.table.buckets[idx].as_ref().map_or(0, Vec::len)
    }
}
