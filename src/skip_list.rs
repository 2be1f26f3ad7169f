//! SkipList: probabilistic ordered map over a pluggable comparator.
//!
//! Nodes live in a `SlotMap` arena; forward pointers are generational keys,
//! so splicing is plain index bookkeeping with no raw pointers. The head
//! sentinel is not a node: it is the `head` array of `max_level` forward
//! pointers, addressed through [`Link::Head`].
//!
//! Invariants
//! - For every level `i < level`, the chain reachable from `head[i]` is
//!   strictly increasing under the comparator and is a subsequence of the
//!   chain at level `i - 1`. Level 0 holds every key.
//! - `head[j]` is empty for every `j >= level`, and `level >= 1`.
//!
//! All comparator calls happen during the search that precedes a mutation;
//! splicing and unlinking never call user code, so an error from the
//! comparator leaves the list untouched.

use crate::error::{Error, Result};
use crate::pairs::pair_up;
use crate::protocol::Orderable;
use crate::scan_guard::ScanGuard;
use core::cmp::Ordering;
use core::fmt;
use core::iter::FusedIterator;
use core::mem;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slotmap::{DefaultKey, SlotMap};
use tracing::trace;

pub const DEFAULT_MAX_LEVEL: usize = 16;
pub const DEFAULT_PROB: f64 = 0.5;

/// Total order used to arrange keys.
pub trait Comparator<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Result<Ordering>;
}

/// Orders keys by their [`Orderable`] implementation. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtocolOrder;

impl<K: ?Sized + Orderable> Comparator<K> for ProtocolOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Result<Ordering> {
        a.compare(b)
    }
}

/// Adapts an infallible closure into a [`Comparator`].
#[derive(Clone, Copy)]
pub struct ByFn<F>(pub F);

impl<K: ?Sized, F> Comparator<K> for ByFn<F>
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Result<Ordering> {
        Ok((self.0)(a, b))
    }
}

impl<F> fmt::Debug for ByFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByFn(..)")
    }
}

/// Construction-time knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkipListOptions {
    /// Highest level a node may reach; at least 1.
    pub max_level: usize,
    /// Promotion probability per level, strictly between 0 and 1.
    pub prob: f64,
    /// Seed for the level generator. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SkipListOptions {
    fn default() -> Self {
        Self {
            max_level: DEFAULT_MAX_LEVEL,
            prob: DEFAULT_PROB,
            seed: None,
        }
    }
}

impl SkipListOptions {
    fn validate(&self) -> Result<()> {
        if self.max_level == 0 {
            return Err(Error::invalid("max_level must be at least 1"));
        }
        if !(self.prob > 0.0 && self.prob < 1.0) {
            return Err(Error::invalid(format!(
                "promotion probability {} is outside (0, 1)",
                self.prob
            )));
        }
        Ok(())
    }

    fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}

/// What `set` did with the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    Overwrite,
}

struct Node<K, V> {
    key: K,
    value: V,
    forward: Vec<Option<DefaultKey>>,
}

/// Predecessor position at one level: the head sentinel or a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Head,
    Node(DefaultKey),
}

struct Search {
    found: Option<DefaultKey>,
    // trail[i] is the last link visited at level i; always `level` long.
    trail: Vec<Link>,
}

// Linked structure without the comparator or RNG.
struct Layers<K, V> {
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    head: Vec<Option<DefaultKey>>,
    level: usize,
}

impl<K, V> Layers<K, V> {
    fn new(max_level: usize) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: vec![None; max_level],
            level: 1,
        }
    }

    #[inline]
    fn forward(&self, at: Link, i: usize) -> Option<DefaultKey> {
        match at {
            Link::Head => self.head[i],
            Link::Node(k) => self.nodes[k].forward[i],
        }
    }

    #[inline]
    fn set_forward(&mut self, at: Link, i: usize, to: Option<DefaultKey>) {
        match at {
            Link::Head => self.head[i] = to,
            Link::Node(k) => self.nodes[k].forward[i] = to,
        }
    }

    fn find<C: Comparator<K>>(&self, cmp: &C, key: &K) -> Result<Search> {
        let mut trail = vec![Link::Head; self.level];
        let mut cur = Link::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, i) {
                if cmp.compare(&self.nodes[next].key, key)? == Ordering::Less {
                    cur = Link::Node(next);
                } else {
                    break;
                }
            }
            trail[i] = cur;
        }
        let found = match self.forward(cur, 0) {
            Some(next) if cmp.compare(&self.nodes[next].key, key)? == Ordering::Equal => Some(next),
            _ => None,
        };
        Ok(Search { found, trail })
    }

    // Read-only descent: same comparisons as `find`, no trail.
    fn lookup<C: Comparator<K>>(&self, cmp: &C, key: &K) -> Result<Option<DefaultKey>> {
        let mut cur = Link::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, i) {
                if cmp.compare(&self.nodes[next].key, key)? == Ordering::Less {
                    cur = Link::Node(next);
                } else {
                    break;
                }
            }
        }
        match self.forward(cur, 0) {
            Some(next) if cmp.compare(&self.nodes[next].key, key)? == Ordering::Equal => Ok(Some(next)),
            _ => Ok(None),
        }
    }

    fn splice(&mut self, mut trail: Vec<Link>, key: K, value: V, new_level: usize) {
        if new_level > self.level {
            trail.resize(new_level, Link::Head);
            trace!(from = self.level, to = new_level, "skip list level raised");
            self.level = new_level;
        }
        let node = self.nodes.insert(Node {
            key,
            value,
            forward: vec![None; new_level],
        });
        for (i, &prev) in trail.iter().enumerate().take(new_level) {
            let next = self.forward(prev, i);
            self.nodes[node].forward[i] = next;
            self.set_forward(prev, i, Some(node));
        }
    }

    fn unlink(&mut self, node: DefaultKey, trail: &[Link]) -> Option<Node<K, V>> {
        for (i, &prev) in trail.iter().enumerate() {
            if self.forward(prev, i) == Some(node) {
                let next = self.nodes[node].forward[i];
                self.set_forward(prev, i, next);
            }
        }
        let removed = self.nodes.remove(node);
        let before = self.level;
        while self.level > 1 && self.head[self.level - 1].is_none() {
            self.level -= 1;
        }
        if self.level != before {
            trace!(from = before, to = self.level, "skip list level lowered");
        }
        removed
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.head.iter_mut().for_each(|h| *h = None);
        self.level = 1;
    }
}

// Geometric level draw: start at 1, climb while a `prob` coin succeeds.
struct LevelGen {
    rng: SmallRng,
    max_level: usize,
    prob: f64,
}

impl LevelGen {
    fn draw(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen_bool(self.prob) {
            level += 1;
        }
        level
    }
}

pub struct SkipList<K, V, C = ProtocolOrder> {
    layers: Layers<K, V>,
    levels: LevelGen,
    comparator: C,
    default: Option<V>,
    guard: ScanGuard,
}

impl<K: Orderable, V> SkipList<K, V, ProtocolOrder> {
    pub fn new() -> Self {
        Self::with_comparator(ProtocolOrder)
    }

    pub fn with_options(options: SkipListOptions) -> Result<Self> {
        Self::with_comparator_and_options(ProtocolOrder, options)
    }

    /// Build from pairs, stopping at the first comparator failure.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut list = Self::new();
        list.set_many(pairs)?;
        Ok(list)
    }
}

impl<T: Orderable> SkipList<T, T, ProtocolOrder> {
    /// Build from `k0, v0, k1, v1, ...`.
    pub fn from_alternating<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let mut list = Self::new();
        list.set_alternating(items)?;
        Ok(list)
    }
}

impl<T, C: Comparator<T>> SkipList<T, T, C> {
    pub fn set_alternating<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.set_many(pair_up(items)?)
    }
}

impl<K, V, C> SkipList<K, V, C>
where
    C: Comparator<K>,
{
    pub fn with_comparator(comparator: C) -> Self {
        let options = SkipListOptions::default();
        Self::from_parts(comparator, &options)
    }

    pub fn with_comparator_and_options(comparator: C, options: SkipListOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_parts(comparator, &options))
    }

    fn from_parts(comparator: C, options: &SkipListOptions) -> Self {
        Self {
            layers: Layers::new(options.max_level),
            levels: LevelGen {
                rng: options.rng(),
                max_level: options.max_level,
                prob: options.prob,
            },
            comparator,
            default: None,
            guard: ScanGuard::new(),
        }
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

    /// Number of index levels in use, `1..=max_level`.
    pub fn level(&self) -> usize {
        self.layers.level
    }
    pub fn max_level(&self) -> usize {
        self.levels.max_level
    }
    pub fn prob(&self) -> f64 {
        self.levels.prob
    }
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Draw a node level from the geometric distribution.
    pub fn random_level(&mut self) -> usize {
        self.levels.draw()
    }

    pub fn has(&self, key: &K) -> Result<bool> {
        let _g = self.guard.enter("has");
        Ok(self.layers.lookup(&self.comparator, key)?.is_some())
    }

    /// Value for `key`, or `None` on a miss. Defaults are not consulted.
    pub fn try_get(&self, key: &K) -> Result<Option<&V>> {
        let _g = self.guard.enter("get");
        let found = self.layers.lookup(&self.comparator, key)?;
        Ok(found.map(|n| &self.layers.nodes[n].value))
    }

    /// Value for `key`, else the configured default, else `KeyNotFound`.
    pub fn get(&self, key: &K) -> Result<&V> {
        match self.try_get(key)? {
            Some(v) => Ok(v),
            None => self.default.as_ref().ok_or(Error::KeyNotFound),
        }
    }

    /// Value for `key`, else `default`.
    pub fn get_or<'a>(&'a self, key: &K, default: &'a V) -> Result<&'a V> {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    pub fn get_mut(&mut self, key: &K) -> Result<Option<&mut V>> {
        let _g = self.guard.enter("get_mut");
        let found = self.layers.lookup(&self.comparator, key)?;
        Ok(found.map(|n| &mut self.layers.nodes[n].value))
    }

    /// Insert, or overwrite the value of an existing key in place.
    pub fn set(&mut self, key: K, value: V) -> Result<SetOutcome> {
        let _g = self.guard.enter("set");
        let search = self.layers.find(&self.comparator, &key)?;
        if let Some(n) = search.found {
            self.layers.nodes[n].value = value;
            return Ok(SetOutcome::Overwrite);
        }
        let new_level = self.levels.draw();
        self.layers.splice(search.trail, key, value, new_level);
        Ok(SetOutcome::Inserted)
    }

    /// Like `set`, but hands back the value an overwrite displaced.
    pub fn replace(&mut self, key: K, value: V) -> Result<Option<V>> {
        let _g = self.guard.enter("set");
        let search = self.layers.find(&self.comparator, &key)?;
        if let Some(n) = search.found {
            return Ok(Some(mem::replace(&mut self.layers.nodes[n].value, value)));
        }
        let new_level = self.levels.draw();
        self.layers.splice(search.trail, key, value, new_level);
        Ok(None)
    }

    /// Bulk `set`, applied pair by pair. A comparator failure stops the
    /// batch; pairs before the failing one stay applied.
    pub fn set_many<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Remove `key`, returning the stored pair, or `None` if absent.
    pub fn delete(&mut self, key: &K) -> Result<Option<(K, V)>> {
        let _g = self.guard.enter("delete");
        let search = self.layers.find(&self.comparator, key)?;
        let Some(node) = search.found else {
            return Ok(None);
        };
        Ok(self
            .layers
            .unlink(node, &search.trail)
            .map(|n| (n.key, n.value)))
    }

    /// Drop every node and reset to a single level.
    pub fn clear(&mut self) {
        let _g = self.guard.enter("clear");
        let dropped = self.layers.nodes.len();
        self.layers.clear();
        trace!(dropped, "skip list cleared");
    }
}

impl<K, V, C> SkipList<K, V, C> {
    pub fn len(&self) -> usize {
        self.layers.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.layers.nodes.is_empty()
    }

    /// Smallest entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        let n = self.layers.head[0]?;
        let node = &self.layers.nodes[n];
        Some((&node.key, &node.value))
    }

    /// Largest entry, found by descending the levels.
    pub fn last(&self) -> Option<(&K, &V)> {
        let mut cur = Link::Head;
        for i in (0..self.layers.level).rev() {
            while let Some(next) = self.layers.forward(cur, i) {
                cur = Link::Node(next);
            }
        }
        match cur {
            Link::Head => None,
            Link::Node(n) => {
                let node = &self.layers.nodes[n];
                Some((&node.key, &node.value))
            }
        }
    }

    /// Ascending traversal along level 0.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.layers.nodes,
            next: self.layers.head[0],
            remaining: self.layers.nodes.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: Orderable, V> Default for SkipList<K, V, ProtocolOrder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for SkipList<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, C> IntoIterator for &'a SkipList<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over a [`SkipList`].
pub struct Iter<'a, K, V> {
    nodes: &'a SlotMap<DefaultKey, Node<K, V>>,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.next?)?;
        self.next = node.forward[0];
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
impl<K, V, C: Comparator<K>> SkipList<K, V, C> {
    /// Per-level chains strictly increase and nest; head is empty above
    /// `level`; level 0 holds every node.
    pub(crate) fn check_invariants(&self) {
        let layers = &self.layers;
        let max_level = self.levels.max_level;
        assert!(layers.level >= 1 && layers.level <= max_level);
        for j in layers.level..max_level {
            assert!(layers.head[j].is_none(), "head[{j}] set above level");
        }
        let mut below: Option<std::collections::HashSet<DefaultKey>> = None;
        for i in 0..layers.level {
            let mut seen = std::collections::HashSet::new();
            let mut cur = layers.head[i];
            let mut prev: Option<DefaultKey> = None;
            while let Some(n) = cur {
                assert!(layers.nodes[n].forward.len() > i);
                if let Some(p) = prev {
                    let ord = self
                        .comparator
                        .compare(&layers.nodes[p].key, &layers.nodes[n].key)
                        .expect("comparable keys");
                    assert_eq!(ord, Ordering::Less, "level {i} not increasing");
                }
                if let Some(b) = &below {
                    assert!(b.contains(&n), "level {i} not a subsequence");
                }
                seen.insert(n);
                prev = Some(n);
                cur = layers.nodes[n].forward[i];
            }
            if i == 0 {
                assert_eq!(seen.len(), layers.nodes.len());
            }
            below = Some(seen);
        }
    }
}
