//! Value protocols: equality, hashing and total order.
//!
//! Containers never look at keys through `PartialEq`/`Hash`/`Ord`; they go
//! through these traits instead so a key type decides exactly which
//! operations it supports. Hashing and ordering are opt-in: the default
//! methods fail with [`Error::Unsupported`].
//!
//! Laws an implementation must keep:
//! - `a.eq_value(a)`, symmetry and transitivity of `eq_value`.
//! - `a.eq_value(b)` implies `a.hash_code() == b.hash_code()`.
//! - `compare` is antisymmetric, transitive and total over the values it
//!   accepts. `Equal` should, but need not, imply `eq_value`.

use crate::error::{Error, Result};
use core::any::{type_name, Any};
use core::cmp::Ordering;
use core::fmt;
use std::rc::Rc;

pub const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Pairwise value equality.
pub trait Equatable {
    fn eq_value(&self, other: &Self) -> bool;

    /// Equality against a possibly absent value; absent is never equal.
    #[inline]
    fn eq_opt(&self, other: Option<&Self>) -> bool {
        other.is_some_and(|o| self.eq_value(o))
    }
}

/// Hash codes consistent with [`Equatable`]. Not required to be injective.
pub trait Hashable: Equatable {
    fn hash_code(&self) -> Result<i64> {
        Err(Error::Unsupported("hash_code"))
    }
}

/// Total order over values of exactly one type.
///
/// The relational helpers are derived from the sign of [`Orderable::compare`].
pub trait Orderable {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        let _ = other;
        Err(Error::Unsupported("compare"))
    }

    fn ord_gt(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_gt())
    }
    fn ord_ge(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_ge())
    }
    fn ord_lt(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_lt())
    }
    fn ord_le(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_le())
    }
    fn ord_eq(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_eq())
    }
    fn ord_ne(&self, other: &Self) -> Result<bool> {
        Ok(self.compare(other)?.is_ne())
    }
}

/// Equality scoped to `T`: both absent is equal, one absent is not, and any
/// present value that is not a `T` is a [`Error::TypeMismatch`].
pub fn eq_as<T: Equatable + 'static>(a: Option<&dyn Any>, b: Option<&dyn Any>) -> Result<bool> {
    let a = a.map(downcast::<T>).transpose()?;
    let b = b.map(downcast::<T>).transpose()?;
    Ok(match (a, b) {
        (None, None) => true,
        (Some(a), b) => a.eq_opt(b),
        (None, Some(_)) => false,
    })
}

fn downcast<T: 'static>(v: &dyn Any) -> Result<&T> {
    v.downcast_ref::<T>().ok_or(Error::TypeMismatch {
        expected: type_name::<T>(),
        found: "a value of another type",
    })
}

/// FNV-1a accumulator over 64-bit element hashes.
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a(u64);

impl Fnv1a {
    pub const fn new() -> Self {
        Fnv1a(FNV_OFFSET_BASIS)
    }

    #[inline]
    pub fn push(&mut self, h: i64) {
        self.0 ^= h as u64;
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }

    #[inline]
    pub fn finish(self) -> i64 {
        self.0 as i64
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-sensitive fold: sequences hash their elements in iteration order.
pub fn fold_ordered<'a, T, I>(items: I) -> Result<i64>
where
    T: Hashable + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut acc = Fnv1a::new();
    for item in items {
        acc.push(item.hash_code()?);
    }
    Ok(acc.finish())
}

/// Order-independent fold for key/value collections.
///
/// Each pair is hashed on its own (key then value), and the pair hashes are
/// combined with a wrapping sum, so two maps holding equal entries hash the
/// same whatever order they were built or iterated in.
pub fn fold_unordered<'a, K, V, I>(entries: I) -> Result<i64>
where
    K: Hashable + ?Sized + 'a,
    V: Hashable + ?Sized + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut sum = 0i64;
    let mut n = 0i64;
    for (k, v) in entries {
        let mut pair = Fnv1a::new();
        pair.push(k.hash_code()?);
        pair.push(v.hash_code()?);
        sum = sum.wrapping_add(pair.finish());
        n += 1;
    }
    let mut acc = Fnv1a::new();
    acc.push(n);
    acc.push(sum);
    Ok(acc.finish())
}

fn hash_bytes(bytes: &[u8]) -> i64 {
    let mut acc = Fnv1a::new();
    for &b in bytes {
        acc.push(i64::from(b));
    }
    acc.finish()
}

macro_rules! integer_protocols {
    ($($t:ty),* $(,)?) => {$(
        impl Equatable for $t {
            #[inline]
            fn eq_value(&self, other: &Self) -> bool {
                self == other
            }
        }
        impl Hashable for $t {
            #[inline]
            fn hash_code(&self) -> Result<i64> {
                Ok(*self as i64)
            }
        }
        impl Orderable for $t {
            #[inline]
            fn compare(&self, other: &Self) -> Result<Ordering> {
                Ok(self.cmp(other))
            }
        }
    )*};
}

integer_protocols!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Equatable for bool {
    fn eq_value(&self, other: &Self) -> bool {
        self == other
    }
}
impl Hashable for bool {
    fn hash_code(&self) -> Result<i64> {
        Ok(i64::from(*self))
    }
}
impl Orderable for bool {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        Ok(self.cmp(other))
    }
}

impl Equatable for char {
    fn eq_value(&self, other: &Self) -> bool {
        self == other
    }
}
impl Hashable for char {
    fn hash_code(&self) -> Result<i64> {
        Ok(i64::from(u32::from(*self)))
    }
}
impl Orderable for char {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        Ok(self.cmp(other))
    }
}

// Floats are equal iff their bit patterns are, matching the bit-pattern hash.
impl Equatable for f64 {
    fn eq_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}
impl Hashable for f64 {
    fn hash_code(&self) -> Result<i64> {
        Ok(self.to_bits() as i64)
    }
}
impl Orderable for f64 {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        Ok(self.total_cmp(other))
    }
}

impl Equatable for f32 {
    fn eq_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}
impl Hashable for f32 {
    fn hash_code(&self) -> Result<i64> {
        Ok(i64::from(self.to_bits()))
    }
}
impl Orderable for f32 {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        Ok(self.total_cmp(other))
    }
}

impl Equatable for str {
    fn eq_value(&self, other: &Self) -> bool {
        self == other
    }
}
impl Hashable for str {
    fn hash_code(&self) -> Result<i64> {
        Ok(hash_bytes(self.as_bytes()))
    }
}
// UTF-8 byte order is codepoint order.
impl Orderable for str {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        Ok(self.cmp(other))
    }
}

impl Equatable for String {
    fn eq_value(&self, other: &Self) -> bool {
        self.as_str().eq_value(other.as_str())
    }
}
impl Hashable for String {
    fn hash_code(&self) -> Result<i64> {
        self.as_str().hash_code()
    }
}
impl Orderable for String {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        self.as_str().compare(other.as_str())
    }
}

impl<T: Equatable> Equatable for [T] {
    fn eq_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.eq_value(b))
    }
}
impl<T: Hashable> Hashable for [T] {
    fn hash_code(&self) -> Result<i64> {
        fold_ordered(self)
    }
}
/// Lexicographic; a strict prefix sorts first.
impl<T: Orderable> Orderable for [T] {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        for (a, b) in self.iter().zip(other) {
            match a.compare(b)? {
                Ordering::Equal => continue,
                ord => return Ok(ord),
            }
        }
        Ok(self.len().cmp(&other.len()))
    }
}

impl<T: Equatable> Equatable for Vec<T> {
    fn eq_value(&self, other: &Self) -> bool {
        self.as_slice().eq_value(other.as_slice())
    }
}
impl<T: Hashable> Hashable for Vec<T> {
    fn hash_code(&self) -> Result<i64> {
        self.as_slice().hash_code()
    }
}
impl<T: Orderable> Orderable for Vec<T> {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        self.as_slice().compare(other.as_slice())
    }
}

impl<T: ?Sized + Equatable> Equatable for &T {
    fn eq_value(&self, other: &Self) -> bool {
        (**self).eq_value(*other)
    }
}
impl<T: ?Sized + Hashable> Hashable for &T {
    fn hash_code(&self) -> Result<i64> {
        (**self).hash_code()
    }
}
impl<T: ?Sized + Orderable> Orderable for &T {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        (**self).compare(*other)
    }
}

/// `None` is the absent value: equal only to another `None`, sorts first.
impl<T: Equatable> Equatable for Option<T> {
    fn eq_value(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), b) => a.eq_opt(b.as_ref()),
            (None, Some(_)) => false,
        }
    }
}
impl<T: Hashable> Hashable for Option<T> {
    fn hash_code(&self) -> Result<i64> {
        match self {
            None => Ok(0),
            Some(v) => v.hash_code(),
        }
    }
}
impl<T: Orderable> Orderable for Option<T> {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        match (self, other) {
            (None, None) => Ok(Ordering::Equal),
            (None, Some(_)) => Ok(Ordering::Less),
            (Some(_), None) => Ok(Ordering::Greater),
            (Some(a), Some(b)) => a.compare(b),
        }
    }
}

impl<A: Equatable, B: Equatable> Equatable for (A, B) {
    fn eq_value(&self, other: &Self) -> bool {
        self.0.eq_value(&other.0) && self.1.eq_value(&other.1)
    }
}
impl<A: Hashable, B: Hashable> Hashable for (A, B) {
    fn hash_code(&self) -> Result<i64> {
        let mut acc = Fnv1a::new();
        acc.push(self.0.hash_code()?);
        acc.push(self.1.hash_code()?);
        Ok(acc.finish())
    }
}
impl<A: Orderable, B: Orderable> Orderable for (A, B) {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        match self.0.compare(&other.0)? {
            Ordering::Equal => self.1.compare(&other.1),
            ord => Ok(ord),
        }
    }
}

/// Reference-like value compared and hashed by identity.
///
/// Two `Identity` handles are equal only when they point at the same
/// allocation; the hash is the allocation address, stable while any handle
/// keeps it alive. Ordering is not provided.
pub struct Identity<T: ?Sized>(Rc<T>);

impl<T> Identity<T> {
    pub fn new(value: T) -> Self {
        Identity(Rc::new(value))
    }
}

impl<T: ?Sized> Identity<T> {
    pub fn from_rc(rc: Rc<T>) -> Self {
        Identity(rc)
    }

    pub fn get(&self) -> &T {
        &self.0
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: ?Sized> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Identity(Rc::clone(&self.0))
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:#x}, {:?})", self.addr(), &*self.0)
    }
}

impl<T: ?Sized> Equatable for Identity<T> {
    fn eq_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Hashable for Identity<T> {
    fn hash_code(&self) -> Result<i64> {
        Ok(self.addr() as i64)
    }
}

impl<T: ?Sized> Orderable for Identity<T> {}
