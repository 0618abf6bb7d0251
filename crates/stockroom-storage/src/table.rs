//! Open-addressing hash table stored in a [`DiskArray`].
//!
//! The table header and every slot live in the backing file:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4 | Capacity (slot count) |
//! | 0x04 | 4 | Entry count (FULL slots) |
//! | 0x08 | 4 | Serial count (identifier counter, never decremented) |
//! | 0x0C | capacity × E | Slots |
//!
//! Each slot is `E = 1 + key width + value width` bytes:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 1 | State: 0 empty, 1 full, 2 tombstone |
//! | 0x01 | K | Key (zeroed unless full) |
//! | 0x01 + K | V | Value (zeroed unless full) |
//!
//! Collisions are resolved by linear probing with wraparound starting at
//! `hash(key) mod capacity`. Removal leaves a tombstone so that probe chains
//! running through the slot stay intact; tombstones are reclaimed by later
//! inserts on the same chain, by [`DiskHashTable::clear`], and by rehashing.

use crate::codec::{FixedCodec, U32Codec, window, window_mut};
use crate::config::TableConfig;
use crate::disk_array::DiskArray;
use crate::hash::{HashFunction, start_index};
use crate::{Result, StoreError};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Slot state byte: never written.
pub const STATE_EMPTY: u8 = 0;

/// Slot state byte: holds a live entry.
pub const STATE_FULL: u8 = 1;

/// Slot state byte: entry removed.
pub const STATE_TOMBSTONE: u8 = 2;

/// Size of the table header in bytes.
pub const TABLE_HEADER_SIZE: usize = 8;

/// Table bookkeeping stored after the capacity prelude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableHeader {
    /// Number of FULL slots.
    pub entry_count: u32,
    /// Identifier counter for callers minting unique ids.
    pub serial_count: u32,
}

/// Codec for [`TableHeader`]: two little-endian `u32`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHeaderCodec;

impl FixedCodec for TableHeaderCodec {
    type Value = TableHeader;

    fn fixed_size(&self) -> usize {
        TABLE_HEADER_SIZE
    }

    fn write(&self, buf: &mut [u8], offset: usize, value: &TableHeader) -> Result<()> {
        let out = window_mut(buf, offset, TABLE_HEADER_SIZE)?;
        U32Codec.write(out, 0, &value.entry_count)?;
        U32Codec.write(out, 4, &value.serial_count)
    }

    fn read(&self, buf: &[u8], offset: usize) -> Result<TableHeader> {
        let raw = window(buf, offset, TABLE_HEADER_SIZE)?;
        Ok(TableHeader {
            entry_count: U32Codec.read(raw, 0)?,
            serial_count: U32Codec.read(raw, 4)?,
        })
    }
}

/// One table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<K, V> {
    /// Never written since creation, clear or rehash. Ends a probe.
    Empty,
    /// Live entry.
    Full {
        /// Entry key
        key: K,
        /// Entry value
        value: V,
    },
    /// Removed entry. Skipped by lookups, reusable by inserts.
    Tombstone,
}

impl<K, V> Slot<K, V> {
    /// On-disk state byte.
    pub const fn state(&self) -> u8 {
        match self {
            Self::Empty => STATE_EMPTY,
            Self::Full { .. } => STATE_FULL,
            Self::Tombstone => STATE_TOMBSTONE,
        }
    }
}

/// Codec for a `{state, key, value}` slot built from a key and a value codec.
#[derive(Debug, Clone, Copy)]
pub struct SlotCodec<KC, VC> {
    key: KC,
    value: VC,
}

impl<KC: FixedCodec, VC: FixedCodec> SlotCodec<KC, VC> {
    /// Compose a slot codec.
    pub const fn new(key: KC, value: VC) -> Self {
        Self { key, value }
    }

    /// Key codec.
    pub const fn key_codec(&self) -> &KC {
        &self.key
    }

    /// Value codec.
    pub const fn value_codec(&self) -> &VC {
        &self.value
    }
}

impl<KC: FixedCodec, VC: FixedCodec> FixedCodec for SlotCodec<KC, VC> {
    type Value = Slot<KC::Value, VC::Value>;

    fn fixed_size(&self) -> usize {
        1 + self.key.fixed_size() + self.value.fixed_size()
    }

    fn write(&self, buf: &mut [u8], offset: usize, slot: &Self::Value) -> Result<()> {
        let out = window_mut(buf, offset, self.fixed_size())?;
        match slot {
            Slot::Full { key, value } => {
                out[0] = STATE_FULL;
                self.key.write(out, 1, key)?;
                self.value.write(out, 1 + self.key.fixed_size(), value)?;
            }
            Slot::Empty | Slot::Tombstone => {
                out.fill(0);
                out[0] = slot.state();
            }
        }
        Ok(())
    }

    fn read(&self, buf: &[u8], offset: usize) -> Result<Self::Value> {
        let raw = window(buf, offset, self.fixed_size())?;
        match raw[0] {
            STATE_EMPTY => Ok(Slot::Empty),
            STATE_TOMBSTONE => Ok(Slot::Tombstone),
            STATE_FULL => Ok(Slot::Full {
                key: self.key.read(raw, 1)?,
                value: self.value.read(raw, 1 + self.key.fixed_size())?,
            }),
            other => Err(StoreError::Corruption(format!(
                "unknown slot state {other:#04x} at byte {offset}"
            ))),
        }
    }
}

/// Slot state counts from a full scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// EMPTY slots
    pub empty: u32,
    /// FULL slots
    pub full: u32,
    /// TOMBSTONE slots
    pub tombstones: u32,
}

enum Probe<V> {
    Found { index: u32, value: V },
    /// Earliest reusable slot on the chain, `None` if the chain covered the
    /// whole table without one.
    Vacant(Option<u32>),
}

/// Persistent hash table with fixed-width keys and values.
///
/// `KC` and `VC` are the key and value codecs, `F` the hash function. The
/// table owns all three for its lifetime, along with the backing file and
/// mapping.
///
/// Only one instance may have a given file open at a time; the table does no
/// locking of its own.
pub struct DiskHashTable<KC: FixedCodec, VC: FixedCodec, F> {
    slots: DiskArray<SlotCodec<KC, VC>, TableHeaderCodec>,
    hasher: F,
    max_load_factor: f64,
    growth_factor: u32,
}

impl<KC, VC, F> DiskHashTable<KC, VC, F>
where
    KC: FixedCodec,
    KC::Value: PartialEq,
    VC: FixedCodec,
    F: HashFunction<KC::Value>,
{
    /// Open or create a table with the default load and growth factors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `initial_capacity` is zero or a codec
    /// has zero width, and an I/O error if the file cannot be mapped.
    pub fn open(
        path: impl AsRef<Path>,
        initial_capacity: u32,
        key_codec: KC,
        value_codec: VC,
        hasher: F,
    ) -> Result<Self> {
        let config = TableConfig::new(path, initial_capacity);
        Self::with_config(&config, key_codec, value_codec, hasher)
    }

    /// Open or create a table from a validated configuration.
    pub fn with_config(
        config: &TableConfig,
        key_codec: KC,
        value_codec: VC,
        hasher: F,
    ) -> Result<Self> {
        config.validate()?;
        let slots = DiskArray::open_with_header(
            &config.path,
            config.initial_capacity,
            TableHeaderCodec,
            SlotCodec::new(key_codec, value_codec),
        )?;

        Ok(Self {
            slots,
            hasher,
            max_load_factor: config.max_load_factor,
            growth_factor: config.growth_factor,
        })
    }

    /// Current slot count.
    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    /// Stored header.
    pub fn header(&self) -> Result<TableHeader> {
        self.slots
            .header()?
            .ok_or_else(|| StoreError::State("table opened without a header".to_string()))
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<u32> {
        Ok(self.header()?.entry_count)
    }

    /// Whether the table holds no live entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Look up `key`.
    pub fn get(&self, key: &KC::Value) -> Result<Option<VC::Value>> {
        match self.probe(&self.stored_form(key)?)? {
            Probe::Found { value, .. } => Ok(Some(value)),
            Probe::Vacant(_) => Ok(None),
        }
    }

    /// Whether `key` has a live entry.
    ///
    /// Defined as "`get` returns a value", so a value type with an absent-like
    /// sentinel cannot be told apart from a missing key by its value alone.
    pub fn contains_key(&self, key: &KC::Value) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or replace the value for `key`, returning the previous value.
    ///
    /// A replacement is written in place and leaves the entry count alone. A
    /// new entry takes the earliest empty or tombstone slot on the key's
    /// probe chain; if that pushes the load factor past the configured
    /// maximum the table is rehashed before returning.
    ///
    /// The key is stored as the key codec reads it back, so a key the codec
    /// truncates is one entry with its truncated form.
    pub fn put(&mut self, key: KC::Value, value: VC::Value) -> Result<Option<VC::Value>> {
        let key = self.stored_form(&key)?;
        loop {
            match self.probe(&key)? {
                Probe::Found {
                    index,
                    value: previous,
                } => {
                    self.slots.overwrite(index, &Slot::Full { key, value })?;
                    return Ok(Some(previous));
                }
                Probe::Vacant(Some(index)) => {
                    self.occupy(index, key, value, false)?;
                    return Ok(None);
                }
                Probe::Vacant(None) => self.rehash()?,
            }
        }
    }

    /// Insert only if `key` has no live entry. Returns whether it inserted.
    pub fn put_if_absent(&mut self, key: KC::Value, value: VC::Value) -> Result<bool> {
        let key = self.stored_form(&key)?;
        match self.vacancy(&key)? {
            Some(index) => {
                self.occupy(index, key, value, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert an entry built from the current serial counter.
    ///
    /// `make` receives `serial_count` and returns the key and value to store.
    /// On success the entry count and the serial counter are both bumped in
    /// one header write and the serial used is returned. If the key already
    /// exists nothing is written and `None` is returned.
    pub fn insert_with_serial<G>(&mut self, make: G) -> Result<Option<u32>>
    where
        G: FnOnce(u32) -> (KC::Value, VC::Value),
    {
        let serial = self.header()?.serial_count;
        let (key, value) = make(serial);
        let key = self.stored_form(&key)?;
        match self.vacancy(&key)? {
            Some(index) => {
                self.occupy(index, key, value, true)?;
                Ok(Some(serial))
            }
            None => Ok(None),
        }
    }

    /// Remove `key`, returning its value.
    ///
    /// The slot becomes a tombstone with its payload cleared. Removing a
    /// missing key is a no-op.
    pub fn remove(&mut self, key: &KC::Value) -> Result<Option<VC::Value>> {
        let Probe::Found { index, value } = self.probe(&self.stored_form(key)?)? else {
            return Ok(None);
        };

        self.slots.overwrite(index, &Slot::Tombstone)?;
        let mut header = self.header()?;
        header.entry_count = header.entry_count.saturating_sub(1);
        self.slots.set_header(&header)?;
        Ok(Some(value))
    }

    /// Reset every slot to empty and the entry count to zero.
    ///
    /// The serial counter is kept, so identifiers handed out before the
    /// clear are never minted again.
    pub fn clear(&mut self) -> Result<()> {
        self.slots.zero_fill();
        let mut header = self.header()?;
        header.entry_count = 0;
        self.slots.set_header(&header)?;
        debug!("Cleared {}", self.slots.path().display());
        Ok(())
    }

    /// Live entries in slot order.
    pub fn entries(&self) -> Result<Vec<(KC::Value, VC::Value)>> {
        let mut out = Vec::with_capacity(self.len()?.min(self.capacity()) as usize);
        for index in 0..self.capacity() {
            if let Slot::Full { key, value } = self.slots.get(index)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    /// Live keys in slot order.
    pub fn keys(&self) -> Result<Vec<KC::Value>> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Live values in slot order.
    pub fn values(&self) -> Result<Vec<VC::Value>> {
        Ok(self.entries()?.into_iter().map(|(_, value)| value).collect())
    }

    /// Grow by the growth factor and reinsert every live entry.
    ///
    /// Tombstones are dropped, which is what bounds their accumulation over
    /// the life of a table.
    pub fn rehash(&mut self) -> Result<()> {
        let entries = self.entries()?;
        let old_capacity = self.capacity();
        let new_capacity = old_capacity
            .checked_mul(self.growth_factor)
            .ok_or_else(|| {
                StoreError::Config(format!(
                    "cannot grow {} beyond {} slots",
                    self.slots.path().display(),
                    old_capacity
                ))
            })?;

        self.slots.grow(new_capacity)?;
        self.slots.zero_fill();

        let count = entries.len();
        for (key, value) in entries {
            let index = self.first_empty(&key)?;
            self.slots.overwrite(index, &Slot::Full { key, value })?;
        }

        let mut header = self.header()?;
        header.entry_count = count as u32;
        self.slots.set_header(&header)?;

        debug!(
            "Rehashed {} from {} to {} slots ({} entries)",
            self.slots.path().display(),
            old_capacity,
            new_capacity,
            count
        );
        Ok(())
    }

    /// Decode the slot at `index`.
    pub fn slot(&self, index: u32) -> Result<Slot<KC::Value, VC::Value>> {
        self.slots.get(index)
    }

    /// Count slots by state.
    pub fn stats(&self) -> Result<SlotStats> {
        let mut stats = SlotStats::default();
        for index in 0..self.capacity() {
            match self.slot_state(index)? {
                STATE_FULL => stats.full += 1,
                STATE_TOMBSTONE => stats.tombstones += 1,
                _ => stats.empty += 1,
            }
        }
        Ok(stats)
    }

    /// Raw header bytes.
    pub fn raw_header(&self) -> &[u8] {
        self.slots.raw_header()
    }

    /// Raw bytes of the slot at `index`.
    pub fn raw_slot(&self, index: u32) -> Result<&[u8]> {
        self.slots.raw_element(index)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        self.slots.path()
    }

    /// Flush dirty pages to the file.
    pub fn flush(&self) -> Result<()> {
        self.slots.flush()
    }

    /// Flush and release the backing file.
    pub fn close(self) -> Result<()> {
        self.slots.close()
    }

    /// `key` as it reads back after a round trip through the key codec.
    fn stored_form(&self, key: &KC::Value) -> Result<KC::Value> {
        let codec = self.slots.element_codec().key_codec();
        let mut scratch = vec![0u8; codec.fixed_size()];
        codec.write(&mut scratch, 0, key)?;
        codec.read(&scratch, 0)
    }

    /// Walk `key`'s chain. `key` must already be in its stored form.
    fn probe(&self, key: &KC::Value) -> Result<Probe<VC::Value>> {
        let capacity = self.capacity();
        let start = start_index(self.hasher.hash(key), capacity);
        let mut first_free = None;

        for step in 0..capacity {
            let index = wrap(start, step, capacity);
            match self.slots.get(index)? {
                Slot::Empty => return Ok(Probe::Vacant(first_free.or(Some(index)))),
                Slot::Tombstone => {
                    first_free.get_or_insert(index);
                }
                Slot::Full { key: stored, value } if stored == *key => {
                    return Ok(Probe::Found { index, value });
                }
                Slot::Full { .. } => {}
            }
        }
        Ok(Probe::Vacant(first_free))
    }

    /// Free slot for a new `key`, or `None` if the key is already live.
    /// Grows the table when the probe chain has no free slot at all.
    fn vacancy(&mut self, key: &KC::Value) -> Result<Option<u32>> {
        loop {
            match self.probe(key)? {
                Probe::Found { .. } => return Ok(None),
                Probe::Vacant(Some(index)) => return Ok(Some(index)),
                Probe::Vacant(None) => self.rehash()?,
            }
        }
    }

    fn occupy(
        &mut self,
        index: u32,
        key: KC::Value,
        value: VC::Value,
        mint_serial: bool,
    ) -> Result<()> {
        let mut header = self.header()?;
        if mint_serial {
            header.serial_count = header
                .serial_count
                .checked_add(1)
                .ok_or_else(|| StoreError::State("serial counter exhausted".to_string()))?;
        }
        header.entry_count += 1;

        self.slots.overwrite(index, &Slot::Full { key, value })?;
        self.slots.set_header(&header)?;

        if f64::from(header.entry_count) / f64::from(self.capacity()) > self.max_load_factor {
            self.rehash()?;
        }
        Ok(())
    }

    /// First EMPTY slot on `key`'s chain. Only valid on a table without
    /// tombstones or duplicates, i.e. while rehashing.
    fn first_empty(&self, key: &KC::Value) -> Result<u32> {
        let capacity = self.capacity();
        let start = start_index(self.hasher.hash(key), capacity);
        for step in 0..capacity {
            let index = wrap(start, step, capacity);
            if self.slot_state(index)? == STATE_EMPTY {
                return Ok(index);
            }
        }
        Err(StoreError::State(format!(
            "no empty slot left in {} while rehashing",
            self.slots.path().display()
        )))
    }

    fn slot_state(&self, index: u32) -> Result<u8> {
        Ok(self.slots.raw_element(index)?[0])
    }
}

impl<KC: FixedCodec, VC: FixedCodec, F> fmt::Debug for DiskHashTable<KC, VC, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskHashTable")
            .field("slots", &self.slots)
            .field("max_load_factor", &self.max_load_factor)
            .field("growth_factor", &self.growth_factor)
            .finish_non_exhaustive()
    }
}

/// `(start + step) mod capacity` without overflowing `u32`.
fn wrap(start: u32, step: u32, capacity: u32) -> u32 {
    ((u64::from(start) + u64::from(step)) % u64::from(capacity)) as u32
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::{FixedStringCodec, I32Codec};
    use crate::hash::PolyStringHash;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    type StringTable = DiskHashTable<FixedStringCodec, I32Codec, PolyStringHash>;

    fn new_table(dir: &TempDir, name: &str, capacity: u32) -> StringTable {
        DiskHashTable::open(
            dir.path().join(name),
            capacity,
            FixedStringCodec::new(32),
            I32Codec,
            PolyStringHash,
        )
        .expect("open table")
    }

    fn colliding(_: &String) -> i32 {
        3
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_empty_table() {
        let dir = TempDir::new().expect("tempdir");
        let table = new_table(&dir, "empty.db", 8);

        assert_eq!(table.header().unwrap(), TableHeader::default());
        assert!(table.is_empty().unwrap());
        assert_eq!(table.get(&s("missing")).unwrap(), None);
        assert!(!table.contains_key(&s("missing")).unwrap());
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "putget.db", 8);

        assert_eq!(table.put(s("A"), 1).unwrap(), None);
        table.put(s("B"), 2).unwrap();
        table.put(s("C"), 3).unwrap();

        assert_eq!(table.len().unwrap(), 3);
        assert_eq!(table.get(&s("A")).unwrap(), Some(1));
        assert_eq!(table.get(&s("B")).unwrap(), Some(2));
        assert_eq!(table.get(&s("C")).unwrap(), Some(3));
        assert_eq!(table.get(&s("D")).unwrap(), None);
    }

    #[test]
    fn test_overwrite_keeps_entry_count() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "overwrite.db", 8);

        table.put(s("K"), 10).unwrap();
        let before = table.len().unwrap();
        assert_eq!(table.put(s("K"), 99).unwrap(), Some(10));

        assert_eq!(table.len().unwrap(), before);
        assert_eq!(table.get(&s("K")).unwrap(), Some(99));
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "remove.db", 8);

        table.put(s("A"), 1).unwrap();
        table.put(s("B"), 2).unwrap();
        assert_eq!(table.remove(&s("B")).unwrap(), Some(2));

        assert_eq!(table.get(&s("B")).unwrap(), None);
        assert_eq!(table.len().unwrap(), 1);
        assert_eq!(table.stats().unwrap().tombstones, 1);

        assert_eq!(table.remove(&s("Z")).unwrap(), None);
        assert_eq!(table.len().unwrap(), 1);
    }

    #[test]
    fn test_removed_slot_payload_cleared() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "cleared.db", 4);
        table.put(s("A"), 7).unwrap();
        table.remove(&s("A")).unwrap();

        let index = start_index(PolyStringHash::hash_str("A"), 4);
        let raw = table.raw_slot(index).unwrap();
        assert_eq!(raw[0], STATE_TOMBSTONE);
        assert!(raw[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wraparound_linear_probe() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "wrap.db", 5);

        for (key, value) in [("A", 1), ("B", 2), ("C", 3), ("D", 4)] {
            table.put(s(key), value).unwrap();
        }
        for (key, value) in [("A", 1), ("B", 2), ("C", 3), ("D", 4)] {
            assert_eq!(table.get(&s(key)).unwrap(), Some(value), "key {key}");
        }
    }

    #[test]
    fn test_colliding_keys_wrap_past_end() {
        let dir = TempDir::new().expect("tempdir");
        let config = TableConfig::new(dir.path().join("collide.db"), 5).with_max_load_factor(0.9);
        let mut table = DiskHashTable::with_config(
            &config,
            FixedStringCodec::new(8),
            I32Codec,
            colliding,
        )
        .expect("open table");

        // All start at slot 3; the third and fourth wrap to 0 and 1
        for (i, key) in ["w", "x", "y", "z"].iter().enumerate() {
            table.put(s(key), i as i32).unwrap();
        }
        assert_eq!(table.capacity(), 5);
        for (i, key) in ["w", "x", "y", "z"].iter().enumerate() {
            assert_eq!(table.get(&s(key)).unwrap(), Some(i as i32));
        }
        assert!(matches!(table.slot(0).unwrap(), Slot::Full { ref key, .. } if key == "y"));
        assert!(matches!(table.slot(1).unwrap(), Slot::Full { ref key, .. } if key == "z"));
    }

    #[test]
    fn test_tombstone_does_not_end_probe() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = DiskHashTable::open(
            dir.path().join("chain.db"),
            16,
            FixedStringCodec::new(8),
            I32Codec,
            colliding,
        )
        .expect("open table");

        table.put(s("a"), 1).unwrap();
        table.put(s("b"), 2).unwrap();
        table.put(s("c"), 3).unwrap();
        table.remove(&s("b")).unwrap();

        assert_eq!(table.get(&s("c")).unwrap(), Some(3));
        assert_eq!(table.remove(&s("c")).unwrap(), Some(3));
        assert_eq!(table.get(&s("a")).unwrap(), Some(1));
    }

    #[test]
    fn test_insert_reuses_earliest_tombstone() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = DiskHashTable::open(
            dir.path().join("reuse.db"),
            16,
            FixedStringCodec::new(8),
            I32Codec,
            colliding,
        )
        .expect("open table");

        table.put(s("a"), 1).unwrap();
        table.put(s("b"), 2).unwrap();
        table.put(s("c"), 3).unwrap();
        table.remove(&s("b")).unwrap();
        table.put(s("d"), 4).unwrap();

        assert!(matches!(table.slot(4).unwrap(), Slot::Full { ref key, .. } if key == "d"));
        assert_eq!(table.stats().unwrap().tombstones, 0);
        assert_eq!(table.len().unwrap(), 3);
    }

    #[test]
    fn test_put_after_remove_restores_count() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "reput.db", 8);
        table.put(s("k"), 1).unwrap();
        table.put(s("j"), 2).unwrap();
        let before = table.len().unwrap();

        table.remove(&s("k")).unwrap();
        table.put(s("k"), 5).unwrap();

        assert_eq!(table.get(&s("k")).unwrap(), Some(5));
        assert_eq!(table.len().unwrap(), before);
    }

    #[test]
    fn test_load_factor_triggers_rehash() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "rehash.db", 4);

        table.put(s("k1"), 1).unwrap();
        table.put(s("k2"), 2).unwrap();
        table.put(s("k3"), 3).unwrap();
        // 3 / 4 is not above 0.75
        assert_eq!(table.capacity(), 4);
        table.put(s("k4"), 4).unwrap();

        assert_eq!(table.capacity(), 8);
        assert_eq!(table.len().unwrap(), 4);
        for (i, key) in ["k1", "k2", "k3", "k4"].iter().enumerate() {
            assert_eq!(table.get(&s(key)).unwrap(), Some(i as i32 + 1));
        }
    }

    #[test]
    fn test_capacity_one_grows_on_first_insert() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "one.db", 1);
        table.put(s("only"), 1).unwrap();
        assert_eq!(table.capacity(), 2);
        assert_eq!(table.get(&s("only")).unwrap(), Some(1));
    }

    #[test]
    fn test_rehash_drops_tombstones() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "drop.db", 16);
        for i in 0..6 {
            table.put(format!("key{i}"), i).unwrap();
        }
        for i in 0..3 {
            table.remove(&format!("key{i}")).unwrap();
        }
        assert_eq!(table.stats().unwrap().tombstones, 3);

        table.rehash().unwrap();

        let stats = table.stats().unwrap();
        assert_eq!(stats.tombstones, 0);
        assert_eq!(stats.full, 3);
        assert_eq!(stats.empty, 29);
        assert_eq!(table.len().unwrap(), 3);
        for i in 3..6 {
            assert_eq!(table.get(&format!("key{i}")).unwrap(), Some(i));
        }
    }

    #[test]
    fn test_clear_empties_table_and_keeps_serial() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "clear.db", 8);
        table.put(s("a"), 1).unwrap();
        table
            .insert_with_serial(|serial| (format!("id{serial}"), 2))
            .unwrap();
        table.put(s("c"), 3).unwrap();

        table.clear().unwrap();

        assert_eq!(
            table.header().unwrap(),
            TableHeader {
                entry_count: 0,
                serial_count: 1
            }
        );
        assert_eq!(table.get(&s("a")).unwrap(), None);
        assert_eq!(table.get(&s("id0")).unwrap(), None);
        assert_eq!(table.get(&s("c")).unwrap(), None);
        assert_eq!(table.stats().unwrap().empty, 8);
    }

    #[test]
    fn test_keys_and_values_only_full_slots() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "kv.db", 8);
        table.put(s("A"), 1).unwrap();
        table.put(s("B"), 2).unwrap();
        table.put(s("C"), 3).unwrap();
        table.remove(&s("B")).unwrap();

        let mut keys = table.keys().unwrap();
        keys.sort();
        let mut values = table.values().unwrap();
        values.sort_unstable();

        assert_eq!(keys, vec![s("A"), s("C")]);
        assert_eq!(values, vec![1, 3]);
        assert_eq!(keys.len() as u32, table.len().unwrap());
    }

    #[test]
    fn test_serial_insert_mints_sequential_ids() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "serial.db", 8);

        let first = table
            .insert_with_serial(|serial| (format!("item{serial}"), 10))
            .unwrap();
        let second = table
            .insert_with_serial(|serial| (format!("item{serial}"), 20))
            .unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(second, Some(1));
        assert_eq!(
            table.header().unwrap(),
            TableHeader {
                entry_count: 2,
                serial_count: 2
            }
        );
        assert_eq!(table.get(&s("item1")).unwrap(), Some(20));
    }

    #[test]
    fn test_serial_insert_rejects_existing_key() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "serial_dup.db", 8);
        table.put(s("fixed"), 1).unwrap();

        let result = table.insert_with_serial(|_| (s("fixed"), 2)).unwrap();

        assert_eq!(result, None);
        assert_eq!(table.get(&s("fixed")).unwrap(), Some(1));
        assert_eq!(table.header().unwrap().serial_count, 0);
    }

    #[test]
    fn test_put_if_absent() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "absent.db", 8);

        assert!(table.put_if_absent(s("bob"), 1).unwrap());
        assert!(!table.put_if_absent(s("bob"), 2).unwrap());
        assert_eq!(table.get(&s("bob")).unwrap(), Some(1));
        assert_eq!(table.len().unwrap(), 1);
    }

    #[test]
    fn test_negative_hash() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = new_table(&dir, "negative.db", 7);
        // Hashes to i32::MIN
        table.put(s("polygenelubricants"), 1).unwrap();
        assert_eq!(table.get(&s("polygenelubricants")).unwrap(), Some(1));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let result = DiskHashTable::open(
            dir.path().join("zero.db"),
            0,
            FixedStringCodec::new(8),
            I32Codec,
            PolyStringHash,
        );
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_unknown_state_byte_is_corruption() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("state.db");
        new_table(&dir, "state.db", 2).close().unwrap();

        let mut bytes = std::fs::read(&path).expect("read");
        bytes[4 + TABLE_HEADER_SIZE] = 9;
        std::fs::write(&path, &bytes).expect("write");

        let table = new_table(&dir, "state.db", 2);
        assert!(matches!(table.slot(0), Err(StoreError::Corruption(_))));
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().expect("tempdir");
        {
            let mut table = new_table(&dir, "reopen.db", 4);
            for i in 0..10 {
                table.put(format!("k{i}"), i * 10).unwrap();
            }
            table.close().unwrap();
        }

        let table = new_table(&dir, "reopen.db", 4);
        assert_eq!(table.len().unwrap(), 10);
        assert_eq!(table.capacity(), 16);
        for i in 0..10 {
            assert_eq!(table.get(&format!("k{i}")).unwrap(), Some(i * 10));
        }
    }

    #[test]
    fn test_over_width_key_is_one_entry() {
        let dir = TempDir::new().expect("tempdir");
        let mut table = DiskHashTable::open(
            dir.path().join("narrow.db"),
            8,
            FixedStringCodec::new(4),
            I32Codec,
            PolyStringHash,
        )
        .expect("open table");

        assert_eq!(table.put(s("abcdefgh"), 1).unwrap(), None);
        assert_eq!(table.put(s("abcdefgh"), 2).unwrap(), Some(1));
        assert_eq!(table.len().unwrap(), 1);
        assert_eq!(table.keys().unwrap(), vec![s("abcd")]);

        assert_eq!(table.get(&s("abcdefgh")).unwrap(), Some(2));
        assert_eq!(table.get(&s("abcd")).unwrap(), Some(2));
        assert!(!table.put_if_absent(s("abcdxyz"), 3).unwrap());

        assert_eq!(table.remove(&s("abcdefgh")).unwrap(), Some(2));
        assert_eq!(table.len().unwrap(), 0);
        assert_eq!(table.get(&s("abcd")).unwrap(), None);
    }

    #[test]
    fn test_entries_with_corrupt_entry_count() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("count.db");
        {
            let mut table = new_table(&dir, "count.db", 8);
            table.put(s("A"), 1).unwrap();
            table.put(s("B"), 2).unwrap();
            table.close().unwrap();
        }

        let mut bytes = std::fs::read(&path).expect("read");
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).expect("write");

        let table = new_table(&dir, "count.db", 8);
        assert_eq!(table.len().unwrap(), u32::MAX);
        let mut entries = table.entries().unwrap();
        entries.sort();
        assert_eq!(entries, vec![(s("A"), 1), (s("B"), 2)]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, i32),
        Remove(u8),
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0u8..24, any::<i32>()).prop_map(|(k, v)| Op::Put(k, v)),
            3 => (0u8..24).prop_map(Op::Remove),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn table_matches_hashmap_model(ops in prop::collection::vec(op(), 1..80)) {
            let dir = TempDir::new().expect("tempdir");
            // Few buckets so chains collide and wrap
            let mut table = DiskHashTable::open(
                dir.path().join("model.db"),
                2,
                FixedStringCodec::new(8),
                I32Codec,
                |k: &String| PolyStringHash::hash_str(k) % 3,
            ).expect("open table");
            let mut model: HashMap<String, i32> = HashMap::new();

            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        let key = format!("k{k}");
                        prop_assert_eq!(table.put(key.clone(), v).unwrap(), model.insert(key, v));
                    }
                    Op::Remove(k) => {
                        let key = format!("k{k}");
                        prop_assert_eq!(table.remove(&key).unwrap(), model.remove(&key));
                    }
                    Op::Clear => {
                        table.clear().unwrap();
                        model.clear();
                    }
                }
                prop_assert_eq!(table.len().unwrap() as usize, model.len());
                let load = f64::from(table.len().unwrap()) / f64::from(table.capacity());
                prop_assert!(load <= 0.75);
            }

            for k in 0u8..24 {
                let key = format!("k{k}");
                prop_assert_eq!(table.get(&key).unwrap(), model.get(&key).copied());
            }
            let mut entries = table.entries().unwrap();
            entries.sort();
            let mut expected: Vec<_> = model.into_iter().collect();
            expected.sort();
            prop_assert_eq!(entries, expected);
        }
    }
}
