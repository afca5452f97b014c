//! Pluggable key hashing and key equality.
//!
//! Both are chosen when a table is created or opened and live inside the
//! handle. Any `Fn(&[u8]) -> u64` is a [`KeyHasher`] and any
//! `Fn(&[u8], &[u8]) -> bool` is a [`KeyEq`], so closures plug in directly.
//!
//! The hasher used to open a file must agree with the one that filled it,
//! otherwise lookups search the wrong buckets.

use std::fmt;
use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;

/// Multiplier of the default polynomial hash.
pub const HASH_MULTIPLIER: u64 = 31;

/// Maps the full padded key, `key_size` bytes, to a hash.
pub trait KeyHasher {
    fn hash_key(&self, key: &[u8]) -> u64;
}

/// Decides whether a lookup key matches a stored key.
pub trait KeyEq {
    fn key_eq(&self, lookup: &[u8], stored: &[u8]) -> bool;
}

/// `h = h * 31 + byte` over every byte, wrapping on overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolynomialHash;

impl KeyHasher for PolynomialHash {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        key.iter().fold(0u64, |h, &b| {
            h.wrapping_mul(HASH_MULTIPLIER).wrapping_add(b as u64)
        })
    }
}

/// FxHash over the padded key. Faster on long keys than [`PolynomialHash`]
/// but produces a different bucket layout, so a file must always be opened
/// with the hasher it was created with.
#[derive(Clone, Default)]
pub struct FxKeyHasher(FxBuildHasher);

impl fmt::Debug for FxKeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FxKeyHasher")
    }
}

impl KeyHasher for FxKeyHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self.0.hash_one(key)
    }
}

/// Byte-for-byte equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEq;

impl KeyEq for ExactEq {
    #[inline]
    fn key_eq(&self, lookup: &[u8], stored: &[u8]) -> bool {
        lookup == stored
    }
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64,
{
    fn hash_key(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

impl<F> KeyEq for F
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    fn key_eq(&self, lookup: &[u8], stored: &[u8]) -> bool {
        self(lookup, stored)
    }
}
