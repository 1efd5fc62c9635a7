//! Stable hashing utilities for keys and buckets.
//!
//! Goals:
//! - Bucket mapping must be identical across builds and platforms, so both functions
//!   are spelled out explicitly (no std::DefaultHasher).
//! - Encode hash kind into the header for forward compatibility.

use std::fmt;

use crate::consts::{STRING_HASH_MUL, STRING_HASH_SEED};

/// Type of stable string hash used by secondary indexes.
/// Stored as u16 in the header of hash files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    /// h = h * 33 + byte, seed 5381, wrapping u32.
    /// Байты складываются как беззнаковые (0..=255): для не-ASCII значений
    /// результат не зависит от знаковости `char` платформы.
    Djb2 = 1,
}

impl HashKind {
    pub fn to_u16(self) -> u16 {
        match self {
            HashKind::Djb2 => 1,
        }
    }

    /// Unknown codes return None.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1 => Some(HashKind::Djb2),
            _ => None,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Djb2 => write!(f, "djb2(seed=5381,mul=33)"),
        }
    }
}

/// Default hash kind for new indexes.
pub const HASH_KIND_DEFAULT: HashKind = HashKind::Djb2;

/// Multiplicative rolling hash over the value's significant bytes.
pub fn string_hash(kind: HashKind, bytes: &[u8]) -> u32 {
    match kind {
        HashKind::Djb2 => bytes.iter().fold(STRING_HASH_SEED, |h, &b| {
            h.wrapping_mul(STRING_HASH_MUL).wrapping_add(b as u32)
        }),
    }
}

/// Primary bucket: key mod B, Euclidean so that negative keys still land in [0, B).
#[inline]
pub fn bucket_of_key(key: i32, buckets: u32) -> u32 {
    debug_assert!(buckets > 0, "buckets must be > 0");
    (key as i64).rem_euclid(buckets as i64) as u32
}

/// Secondary bucket: string_hash(value) mod B.
#[inline]
pub fn bucket_of_str(kind: HashKind, value: &[u8], buckets: u32) -> u32 {
    debug_assert!(buckets > 0, "buckets must be > 0");
    string_hash(kind, value) % buckets
}
