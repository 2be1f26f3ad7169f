//! Set view: a map whose values are the `true` sentinel.
//!
//! The view only relies on get/set/has/delete/iteration, captured by
//! [`MapLike`], so either container can back it. Membership is key
//! presence.

use crate::chained_hash_map::{self, ChainedHashMap};
use crate::error::{Error, Result};
use crate::protocol::Hashable;
use crate::skip_list::{self, Comparator, SkipList};
use core::marker::PhantomData;

/// The slice of a map's surface a set view consumes.
pub trait MapLike<K, V> {
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn map_get(&self, key: &K) -> Result<Option<&V>>;
    fn map_set(&mut self, key: K, value: V) -> Result<()>;
    fn map_has(&self, key: &K) -> Result<bool>;
    /// `Ok(false)` when the key was absent.
    fn map_delete(&mut self, key: &K) -> Result<bool>;
    fn map_len(&self) -> usize;
    fn map_clear(&mut self);
    fn map_iter(&self) -> Self::Iter<'_>;
}

impl<K: Hashable, V> MapLike<K, V> for ChainedHashMap<K, V> {
    type Iter<'a> = chained_hash_map::Iter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn map_get(&self, key: &K) -> Result<Option<&V>> {
        self.try_get(key)
    }
    fn map_set(&mut self, key: K, value: V) -> Result<()> {
        self.set(key, value).map(drop)
    }
    fn map_has(&self, key: &K) -> Result<bool> {
        self.has(key)
    }
    fn map_delete(&mut self, key: &K) -> Result<bool> {
        match self.delete(key) {
            Ok(_) => Ok(true),
            Err(Error::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
    fn map_len(&self) -> usize {
        self.len()
    }
    fn map_clear(&mut self) {
        self.clear()
    }
    fn map_iter(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

impl<K, V, C: Comparator<K>> MapLike<K, V> for SkipList<K, V, C> {
    type Iter<'a> = skip_list::Iter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn map_get(&self, key: &K) -> Result<Option<&V>> {
        self.try_get(key)
    }
    fn map_set(&mut self, key: K, value: V) -> Result<()> {
        self.set(key, value).map(drop)
    }
    fn map_has(&self, key: &K) -> Result<bool> {
        self.has(key)
    }
    fn map_delete(&mut self, key: &K) -> Result<bool> {
        Ok(self.delete(key)?.is_some())
    }
    fn map_len(&self) -> usize {
        self.len()
    }
    fn map_clear(&mut self) {
        self.clear()
    }
    fn map_iter(&self) -> Self::Iter<'_> {
        self.iter()
    }
}

pub struct SetView<M, K> {
    map: M,
    _k: PhantomData<fn() -> K>,
}

pub type HashSetView<K> = SetView<ChainedHashMap<K, bool>, K>;
pub type SortedSetView<K> = SetView<SkipList<K, bool>, K>;

impl<M, K> SetView<M, K>
where
    M: MapLike<K, bool>,
{
    /// Wrap `map`; any entries it already holds count as members.
    pub fn new(map: M) -> Self {
        Self {
            map,
            _k: PhantomData,
        }
    }

    pub fn from_keys<I>(map: M, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
    {
        let mut set = Self::new(map);
        for k in keys {
            set.insert(k)?;
        }
        Ok(set)
    }

    /// Add `key`; `true` if it was not already a member.
    pub fn insert(&mut self, key: K) -> Result<bool> {
        if self.map.map_has(&key)? {
            return Ok(false);
        }
        self.map.map_set(key, true)?;
        Ok(true)
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.map.map_get(key)?.is_some())
    }

    /// Remove `key`; `true` if it was a member.
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        self.map.map_delete(key)
    }

    pub fn len(&self) -> usize {
        self.map.map_len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.map_len() == 0
    }

    pub fn clear(&mut self) {
        self.map.map_clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.map.map_iter().map(|(k, _)| k)
    }

    pub fn into_inner(self) -> M {
        self.map
    }
}

impl<M, K> Default for SetView<M, K>
where
    M: MapLike<K, bool> + Default,
{
    fn default() -> Self {
        Self::new(M::default())
    }
}
