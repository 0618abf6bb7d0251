//! Growable memory-mapped fixed-stride array.
//!
//! File layout (little-endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4 | Capacity (element count) |
//! | 0x04 | H | Header payload (absent when no header codec is configured) |
//! | 0x04 + H | capacity × E | Elements, `E = element_codec.fixed_size()` |
//!
//! The whole file is mapped read-write. Elements are addressed directly in
//! the mapping, so a lookup never deserializes more than the one element it
//! touches. Growth extends the file in place: existing bytes never move and
//! the new tail is zero-filled by the filesystem.

use crate::codec::{FixedCodec, window};
use crate::{Result, StoreError};
use memmap2::{MmapMut, MmapOptions};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Size of the capacity prelude in bytes.
pub const PRELUDE_SIZE: usize = 4;

/// Header codec for arrays without a header region.
///
/// Uninhabited: an array configured without a header never holds one.
#[derive(Debug, Clone, Copy)]
pub enum NoHeader {}

impl FixedCodec for NoHeader {
    type Value = ();

    fn fixed_size(&self) -> usize {
        match *self {}
    }

    fn write(&self, _buf: &mut [u8], _offset: usize, _value: &()) -> Result<()> {
        match *self {}
    }

    fn read(&self, _buf: &[u8], _offset: usize) -> Result<()> {
        match *self {}
    }
}

/// Typed, persistent, growable array of fixed-size elements with an optional
/// fixed-size header.
///
/// The array exclusively owns its file handle and mapping. Both are released
/// when the value is dropped; [`DiskArray::close`] additionally flushes dirty
/// pages and reports failures.
pub struct DiskArray<E: FixedCodec, H: FixedCodec = NoHeader> {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    element_codec: E,
    header_codec: Option<H>,
}

impl<E: FixedCodec> DiskArray<E, NoHeader> {
    /// Open or create a headerless array at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `initial_capacity` is zero or the
    /// element codec has zero width, and an I/O error if the file cannot be
    /// opened, sized or mapped.
    pub fn open(path: impl AsRef<Path>, initial_capacity: u32, element_codec: E) -> Result<Self> {
        Self::open_inner(path.as_ref(), initial_capacity, None, element_codec)
    }
}

impl<E: FixedCodec, H: FixedCodec> DiskArray<E, H> {
    /// Open or create an array with a header region at `path`.
    ///
    /// A new file is created zero-filled with `initial_capacity` elements.
    /// An existing file keeps its stored capacity; `initial_capacity` is
    /// then only validated.
    pub fn open_with_header(
        path: impl AsRef<Path>,
        initial_capacity: u32,
        header_codec: H,
        element_codec: E,
    ) -> Result<Self> {
        Self::open_inner(
            path.as_ref(),
            initial_capacity,
            Some(header_codec),
            element_codec,
        )
    }

    fn open_inner(
        path: &Path,
        initial_capacity: u32,
        header_codec: Option<H>,
        element_codec: E,
    ) -> Result<Self> {
        if initial_capacity < 1 {
            return Err(StoreError::Config(
                "capacity must be at least 1".to_string(),
            ));
        }
        if element_codec.fixed_size() == 0 {
            return Err(StoreError::Config(
                "element codec must have a positive width".to_string(),
            ));
        }
        if header_codec.as_ref().is_some_and(|h| h.fixed_size() == 0) {
            return Err(StoreError::Config(
                "header codec must have a positive width".to_string(),
            ));
        }

        let header_size = header_codec.as_ref().map_or(0, FixedCodec::fixed_size);
        let data_start = PRELUDE_SIZE + header_size;
        let element_size = element_codec.fixed_size();

        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| StoreError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let len = file.metadata()?.len();

        let fresh = !existed || len < PRELUDE_SIZE as u64;
        let capacity = if fresh {
            initial_capacity
        } else {
            let mut prelude = [0u8; PRELUDE_SIZE];
            file.read_exact(&mut prelude)?;
            let stored = u32::from_le_bytes(prelude);
            if stored == 0 {
                return Err(StoreError::Corruption(format!(
                    "{} stores a capacity of zero",
                    path.display()
                )));
            }
            stored
        };

        let bytes = mapped_len(data_start, element_size, capacity)?;
        if fresh {
            // Drop any partial prelude so the whole file starts zeroed
            file.set_len(0)?;
            file.set_len(bytes)?;
            info!(
                "Created {} with capacity {} ({} bytes)",
                path.display(),
                capacity,
                bytes
            );
        } else if len < bytes {
            warn!(
                "{} is shorter than its capacity requires ({} < {} bytes), extending",
                path.display(),
                len,
                bytes
            );
            file.set_len(bytes)?;
        } else {
            debug!("Opened {} with capacity {}", path.display(), capacity);
        }

        let mmap = map_file(&file, bytes)?;
        let mut array = Self {
            path: path.to_path_buf(),
            file,
            mmap,
            element_codec,
            header_codec,
        };
        if fresh {
            array.write_capacity(capacity);
        }
        Ok(array)
    }

    /// Current element count, read from the prelude.
    pub fn capacity(&self) -> u32 {
        let mut raw = [0u8; PRELUDE_SIZE];
        raw.copy_from_slice(&self.mmap[..PRELUDE_SIZE]);
        u32::from_le_bytes(raw)
    }

    /// Read the header, or `None` when no header codec is configured.
    pub fn header(&self) -> Result<Option<H::Value>> {
        match &self.header_codec {
            Some(codec) => codec.read(&self.mmap, PRELUDE_SIZE).map(Some),
            None => Ok(None),
        }
    }

    /// Overwrite the header.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::State`] if no header codec is configured.
    pub fn set_header(&mut self, header: &H::Value) -> Result<()> {
        let Some(codec) = &self.header_codec else {
            return Err(StoreError::State(format!(
                "no header codec configured for {}",
                self.path.display()
            )));
        };
        codec.write(&mut self.mmap, PRELUDE_SIZE, header)
    }

    /// Read the element at `index`.
    pub fn get(&self, index: u32) -> Result<E::Value> {
        let pos = self.element_offset(index)?;
        self.element_codec.read(&self.mmap, pos)
    }

    /// Write `value` at `index`, returning the previous element.
    pub fn set(&mut self, index: u32, value: &E::Value) -> Result<E::Value> {
        let pos = self.element_offset(index)?;
        let previous = self.element_codec.read(&self.mmap, pos)?;
        self.element_codec.write(&mut self.mmap, pos, value)?;
        Ok(previous)
    }

    /// Write `value` at `index` without decoding what was there.
    pub fn overwrite(&mut self, index: u32, value: &E::Value) -> Result<()> {
        let pos = self.element_offset(index)?;
        self.element_codec.write(&mut self.mmap, pos, value)
    }

    /// Extend the array to `new_capacity` elements.
    ///
    /// The file is extended and synced before it is remapped, and the
    /// capacity field is rewritten last. Elements below the old capacity keep
    /// their bytes; new elements are zeroed. Growing to the current capacity
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `new_capacity` is smaller than the
    /// current capacity.
    pub fn grow(&mut self, new_capacity: u32) -> Result<()> {
        let old_capacity = self.capacity();
        if new_capacity < old_capacity {
            return Err(StoreError::Config(format!(
                "cannot shrink {} from {} to {} elements",
                self.path.display(),
                old_capacity,
                new_capacity
            )));
        }
        if new_capacity == old_capacity {
            return Ok(());
        }

        let bytes = mapped_len(self.data_start(), self.element_size(), new_capacity)?;
        self.mmap.flush()?;
        self.file.set_len(bytes)?;
        self.file.sync_all()?;
        self.mmap = map_file(&self.file, bytes)?;
        self.write_capacity(new_capacity);

        debug!(
            "Grew {} from {} to {} elements ({} bytes)",
            self.path.display(),
            old_capacity,
            new_capacity,
            bytes
        );
        Ok(())
    }

    /// Zero every element byte. Prelude and header are untouched.
    pub fn zero_fill(&mut self) {
        let start = self.data_start();
        self.mmap[start..].fill(0);
    }

    /// Raw bytes of the header region (empty without a header codec).
    pub fn raw_header(&self) -> &[u8] {
        &self.mmap[PRELUDE_SIZE..self.data_start()]
    }

    /// Raw bytes of the element at `index`.
    pub fn raw_element(&self, index: u32) -> Result<&[u8]> {
        let pos = self.element_offset(index)?;
        window(&self.mmap, pos, self.element_size())
    }

    /// Flush dirty pages of the mapping to the file.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Flush and release the mapping and file handle.
    pub fn close(self) -> Result<()> {
        self.mmap.flush()?;
        debug!("Closed {}", self.path.display());
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.element_codec.fixed_size()
    }

    /// Bytes in the header region.
    pub fn header_size(&self) -> usize {
        self.header_codec.as_ref().map_or(0, FixedCodec::fixed_size)
    }

    /// Byte offset of element 0.
    pub fn data_start(&self) -> usize {
        PRELUDE_SIZE + self.header_size()
    }

    /// Element codec owned by this array.
    pub const fn element_codec(&self) -> &E {
        &self.element_codec
    }

    fn element_offset(&self, index: u32) -> Result<usize> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(StoreError::IndexOutOfBounds {
                index: u64::from(index),
                capacity,
            });
        }
        Ok(self.data_start() + index as usize * self.element_size())
    }

    fn write_capacity(&mut self, capacity: u32) {
        self.mmap[..PRELUDE_SIZE].copy_from_slice(&capacity.to_le_bytes());
    }
}

impl<E: FixedCodec, H: FixedCodec> fmt::Debug for DiskArray<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskArray")
            .field("path", &self.path)
            .field("capacity", &self.capacity())
            .field("header_size", &self.header_size())
            .field("element_size", &self.element_size())
            .finish_non_exhaustive()
    }
}

/// Total file size for `capacity` elements.
fn mapped_len(data_start: usize, element_size: usize, capacity: u32) -> Result<u64> {
    (element_size as u64)
        .checked_mul(u64::from(capacity))
        .and_then(|n| n.checked_add(data_start as u64))
        .filter(|&n| usize::try_from(n).is_ok())
        .ok_or_else(|| {
            StoreError::Config(format!(
                "{capacity} elements of {element_size} bytes exceed the addressable size"
            ))
        })
}

fn map_file(file: &File, len: u64) -> Result<MmapMut> {
    let len = usize::try_from(len)
        .map_err(|_| StoreError::Config(format!("mapping of {len} bytes is not addressable")))?;

    // The file is opened read-write by this array alone; the mapping never
    // outlives the handle it was created from.
    #[allow(unsafe_code)]
    let mmap = unsafe { MmapOptions::new().len(len).map_mut(file)? };
    Ok(mmap)
}
