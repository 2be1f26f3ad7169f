//! Dynamic values built from the protocol implementations.
//!
//! `Value` lets heterogeneous data share one key type. Composite variants
//! follow the structural rules: sequences compare element-wise and hash in
//! order, records match field names case-insensitively, maps compare as
//! key sets and hash order-independently. Values of different variants are
//! never equal, and comparing them is a type mismatch; there is no numeric
//! or string coercion.

use crate::chained_hash_map::ChainedHashMap;
use crate::error::{Error, Result};
use crate::protocol::{fold_unordered, Equatable, Hashable, Identity, Orderable};
use core::cmp::Ordering;
use core::fmt;
use core::mem;
use hashbrown::hash_map::Entry;
use std::cell::OnceCell;

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Seq(Vec<Value>),
    Record(Record),
    Map(Box<ChainedHashMap<Value, Value>>),
    /// Shared object compared by identity.
    Ref(Identity<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Record(_) => "record",
            Value::Map(_) => "map",
            Value::Ref(_) => "ref",
        }
    }

    /// Share `value` behind an identity-compared handle.
    pub fn new_ref(value: Value) -> Self {
        Value::Ref(Identity::new(value))
    }

    /// Build a `Map` value from `k0, v0, k1, v1, ...`.
    pub fn map_from_alternating<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        Ok(Value::Map(Box::new(ChainedHashMap::from_alternating(items)?)))
    }
}

impl Equatable for Value {
    fn eq_value(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.eq_value(b),
            (Float(a), Float(b)) => a.eq_value(b),
            (Bool(a), Bool(b)) => a.eq_value(b),
            (Str(a), Str(b)) => a.eq_value(b),
            (Seq(a), Seq(b)) => a.eq_value(b),
            (Record(a), Record(b)) => a.eq_value(b),
            (Map(a), Map(b)) => (**a).eq_value(&**b),
            (Ref(a), Ref(b)) => a.eq_value(b),
            _ => false,
        }
    }
}

impl Hashable for Value {
    fn hash_code(&self) -> Result<i64> {
        match self {
            Value::Int(i) => i.hash_code(),
            Value::Float(f) => f.hash_code(),
            Value::Bool(b) => b.hash_code(),
            Value::Str(s) => s.hash_code(),
            Value::Seq(items) => items.hash_code(),
            Value::Record(r) => r.hash_code(),
            Value::Map(m) => (**m).hash_code(),
            Value::Ref(r) => r.hash_code(),
        }
    }
}

impl Orderable for Value {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.compare(b),
            (Float(a), Float(b)) => a.compare(b),
            (Bool(a), Bool(b)) => a.compare(b),
            (Str(a), Str(b)) => a.compare(b),
            (Seq(a), Seq(b)) => a.compare(b),
            (Record(_), Record(_)) => Err(Error::Unsupported("compare on records")),
            (Map(_), Map(_)) => Err(Error::Unsupported("compare on maps")),
            (Ref(a), Ref(b)) => a.compare(b),
            (a, b) => Err(Error::TypeMismatch {
                expected: a.kind(),
                found: b.kind(),
            }),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(v)
    }
}
impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}
impl From<ChainedHashMap<Value, Value>> for Value {
    fn from(v: ChainedHashMap<Value, Value>) -> Self {
        Value::Map(Box::new(v))
    }
}

/// Named fields whose names match case-insensitively.
///
/// The first spelling of a name is kept for display. The derived hash is
/// computed on first use and cached until the record is mutated.
#[derive(Clone, Default)]
pub struct Record {
    // lowercased name -> (name as first given, value)
    fields: hashbrown::HashMap<String, (String, Value)>,
    hash: OnceCell<Result<i64>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::insert`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Set a field, returning the value it replaced.
    pub fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        self.hash.take();
        match self.fields.entry(name.to_lowercase()) {
            Entry::Occupied(mut e) => Some(mem::replace(&mut e.get_mut().1, value)),
            Entry::Vacant(e) => {
                e.insert((name.to_owned(), value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(&name.to_lowercase()).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.hash.take();
        self.fields.remove(&name.to_lowercase()).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields with their display names, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.fields.values().map(|(n, v)| (n.as_str(), v))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Equatable for Record {
    fn eq_value(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|(name, (_, v))| {
                other
                    .fields
                    .get(name)
                    .is_some_and(|(_, ov)| v.eq_value(ov))
            })
    }
}

impl Hashable for Record {
    fn hash_code(&self) -> Result<i64> {
        self.hash
            .get_or_init(|| fold_unordered(self.fields.iter().map(|(name, (_, v))| (name, v))))
            .clone()
    }
}

impl Orderable for Record {}
