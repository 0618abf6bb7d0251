//! Hash functions for table keys.
//!
//! The table only needs a deterministic `K -> i32` mapping; the start slot
//! is the non-negative remainder of the hash modulo the capacity. Because
//! the hash decides where entries live on disk, it must stay stable across
//! processes and releases. That rules out `std`'s randomly seeded hashers.

/// Deterministic hash of a key to a signed 32-bit value.
pub trait HashFunction<K: ?Sized> {
    /// Hash `key`.
    fn hash(&self, key: &K) -> i32;
}

impl<K: ?Sized, F> HashFunction<K> for F
where
    F: Fn(&K) -> i32,
{
    fn hash(&self, key: &K) -> i32 {
        self(key)
    }
}

/// Polynomial string hash over UTF-16 code units: `h = 31 * h + unit`.
///
/// Matches the hash used by existing data files, so tables written by
/// other tools keep their slot placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolyStringHash;

impl PolyStringHash {
    /// Hash a string slice.
    pub fn hash_str(s: &str) -> i32 {
        s.encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
    }
}

impl HashFunction<String> for PolyStringHash {
    fn hash(&self, key: &String) -> i32 {
        Self::hash_str(key)
    }
}

impl HashFunction<str> for PolyStringHash {
    fn hash(&self, key: &str) -> i32 {
        Self::hash_str(key)
    }
}

/// Identity hash for integer keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHash;

impl HashFunction<i32> for IdentityHash {
    fn hash(&self, key: &i32) -> i32 {
        *key
    }
}

impl HashFunction<u32> for IdentityHash {
    fn hash(&self, key: &u32) -> i32 {
        key.cast_signed()
    }
}

/// Start slot for `hash` in a table of `capacity` slots.
///
/// Negative hashes wrap to a non-negative index.
pub fn start_index(hash: i32, capacity: u32) -> u32 {
    debug_assert!(capacity > 0);
    i64::from(hash).rem_euclid(i64::from(capacity)) as u32
}
