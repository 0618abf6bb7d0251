//! Fixed-width codecs.
//!
//! A codec encodes one value type into exactly [`FixedCodec::fixed_size`]
//! bytes at an absolute offset of a byte buffer, and decodes it back. The
//! fixed width is what keeps the disk array addressable in O(1): element
//! `i` always starts at `data_start + i * width`.
//!
//! Every access goes through [`window`] / [`window_mut`], so an offset that
//! does not fit in the buffer is rejected with [`StoreError::OutOfRange`]
//! instead of panicking.
//!
//! | Codec | Width | Encoding |
//! |-------|-------|----------|
//! | [`I32Codec`] | 4 | little-endian `i32` |
//! | [`U32Codec`] | 4 | little-endian `u32` |
//! | [`I64Codec`] | 8 | little-endian `i64` |
//! | [`F32Codec`] | 4 | IEEE-754 bits through the `i32` path |
//! | [`FixedStringCodec`] | N | UTF-8, zero-padded, truncated to N |

use crate::{Result, StoreError};

/// Bidirectional fixed-width encoder/decoder for one value type.
///
/// Implementations must write exactly `fixed_size()` bytes, deterministically,
/// and `read` must reproduce a value equal to the one written whenever its
/// natural encoding fits the width.
pub trait FixedCodec {
    /// Decoded value type.
    type Value;

    /// Exact number of bytes used per value. Must be constant and positive.
    fn fixed_size(&self) -> usize;

    /// Encode `value` at `buf[offset..offset + fixed_size()]`.
    fn write(&self, buf: &mut [u8], offset: usize, value: &Self::Value) -> Result<()>;

    /// Decode the value stored at `buf[offset..offset + fixed_size()]`.
    fn read(&self, buf: &[u8], offset: usize) -> Result<Self::Value>;
}

/// Bounds-checked immutable view of `len` bytes starting at `offset`.
pub fn window(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let size = buf.len();
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(StoreError::OutOfRange { offset, len, size })
}

/// Bounds-checked mutable view of `len` bytes starting at `offset`.
pub fn window_mut(buf: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8]> {
    let size = buf.len();
    offset
        .checked_add(len)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(StoreError::OutOfRange { offset, len, size })
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    let mut raw = [0u8; N];
    raw.copy_from_slice(window(buf, offset, N)?);
    Ok(raw)
}

macro_rules! le_int_codec {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $width:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl FixedCodec for $name {
            type Value = $ty;

            fn fixed_size(&self) -> usize {
                $width
            }

            fn write(&self, buf: &mut [u8], offset: usize, value: &$ty) -> Result<()> {
                window_mut(buf, offset, $width)?.copy_from_slice(&value.to_le_bytes());
                Ok(())
            }

            fn read(&self, buf: &[u8], offset: usize) -> Result<$ty> {
                Ok(<$ty>::from_le_bytes(read_array::<$width>(buf, offset)?))
            }
        }
    };
}

le_int_codec!(
    /// 4-byte little-endian signed integer.
    I32Codec,
    i32,
    4
);

le_int_codec!(
    /// 4-byte little-endian unsigned integer.
    U32Codec,
    u32,
    4
);

le_int_codec!(
    /// 8-byte little-endian signed integer.
    I64Codec,
    i64,
    8
);

/// 4-byte float, stored as its IEEE-754 bit pattern through the `i32` path.
///
/// NaN payloads and signed zero survive the round trip bit for bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct F32Codec;

impl FixedCodec for F32Codec {
    type Value = f32;

    fn fixed_size(&self) -> usize {
        4
    }

    fn write(&self, buf: &mut [u8], offset: usize, value: &f32) -> Result<()> {
        I32Codec.write(buf, offset, &value.to_bits().cast_signed())
    }

    fn read(&self, buf: &[u8], offset: usize) -> Result<f32> {
        let bits = I32Codec.read(buf, offset)?;
        Ok(f32::from_bits(bits.cast_unsigned()))
    }
}

/// Fixed-width UTF-8 string.
///
/// Strings are copied up to `width` bytes and zero-padded beyond. Longer
/// strings are silently truncated at the last character boundary that fits.
/// Decoding stops at the first zero byte, so strings with embedded NULs do
/// not round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedStringCodec {
    width: usize,
}

impl FixedStringCodec {
    /// Create a codec for strings of at most `width` bytes.
    pub const fn new(width: usize) -> Self {
        Self { width }
    }

    /// Configured width in bytes.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Whether `s` survives a write/read cycle unchanged.
    pub fn fits(&self, s: &str) -> bool {
        s.len() <= self.width && !s.as_bytes().contains(&0)
    }

    /// Number of leading bytes of `s` that will be stored.
    fn stored_len(&self, s: &str) -> usize {
        let mut n = s.len().min(self.width);
        while !s.is_char_boundary(n) {
            n -= 1;
        }
        n
    }
}

impl FixedCodec for FixedStringCodec {
    type Value = String;

    fn fixed_size(&self) -> usize {
        self.width
    }

    fn write(&self, buf: &mut [u8], offset: usize, value: &String) -> Result<()> {
        let out = window_mut(buf, offset, self.width)?;
        let n = self.stored_len(value);
        out[..n].copy_from_slice(&value.as_bytes()[..n]);
        out[n..].fill(0);
        Ok(())
    }

    fn read(&self, buf: &[u8], offset: usize) -> Result<String> {
        let raw = window(buf, offset, self.width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}
