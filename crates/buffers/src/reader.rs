//! Binary buffer reader with cursor tracking.

use std::str;

use crate::BufferError;

/// A binary buffer reader that reads data from a byte slice.
///
/// The reader maintains a cursor position and an exclusive end bound.
/// Reads never go past `end`; running out of bytes yields
/// [`BufferError::EndOfBuffer`] instead of panicking.
///
/// # Example
///
/// ```
/// use pof_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.u8().unwrap(), 0x01);
/// assert_eq!(reader.u16().unwrap(), 0x0203);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
    /// End position (exclusive).
    pub end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        let end = uint8.len();
        Self { uint8, x: 0, end }
    }

    /// Creates a reader over `uint8[x..end]`, keeping offsets absolute.
    pub fn from_slice(uint8: &'a [u8], x: usize, end: usize) -> Self {
        let end = end.min(uint8.len());
        Self {
            uint8,
            x: x.min(end),
            end,
        }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.x)
    }

    /// Returns `true` once the cursor reached the end bound.
    pub fn is_eof(&self) -> bool {
        self.x >= self.end
    }

    fn ensure(&self, needed: usize) -> Result<(), BufferError> {
        if self.size() < needed {
            return Err(BufferError::EndOfBuffer {
                offset: self.x,
                needed,
            });
        }
        Ok(())
    }

    /// Peeks at the current byte without advancing the cursor.
    pub fn peek(&self) -> Result<u8, BufferError> {
        self.ensure(1)?;
        Ok(self.uint8[self.x])
    }

    /// Advances the cursor by the given number of bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.ensure(length)?;
        self.x += length;
        Ok(())
    }

    /// Returns a subarray of the given size and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.ensure(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    /// Returns the unread remainder without advancing the cursor.
    pub fn rest(&self) -> &'a [u8] {
        &self.uint8[self.x..self.end]
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        self.ensure(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(out)
    }

    /// Reads an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Reads an unsigned 32-bit integer (big-endian).
    #[inline]
    pub fn u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Reads a signed 32-bit integer (big-endian).
    #[inline]
    pub fn i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Reads a signed 64-bit integer (big-endian).
    #[inline]
    pub fn i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    /// Reads a 32-bit floating point number (big-endian).
    #[inline]
    pub fn f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    /// Reads a 64-bit floating point number (big-endian).
    #[inline]
    pub fn f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// Reads a UTF-8 string of the given byte size.
    pub fn utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        let start = self.x;
        let bytes = self.buf(size)?;
        str::from_utf8(bytes).map_err(|_| BufferError::InvalidUtf8 { offset: start })
    }

    /// Reads a packed integer as sign flag plus magnitude.
    ///
    /// The first byte carries the sign in bit 6 and six value bits; each
    /// byte with bit 7 set is followed by another carrying seven more bits.
    fn packed_magnitude(&mut self) -> Result<(bool, u128), BufferError> {
        let start = self.x;
        let mut b = self.u8()?;
        let negative = b & 0x40 != 0;
        let mut magnitude = (b & 0x3f) as u128;
        let mut shift = 6u32;
        while b & 0x80 != 0 {
            b = self.u8()?;
            let chunk = (b & 0x7f) as u128;
            if chunk != 0 {
                if shift >= 128 || (chunk << shift) >> shift != chunk {
                    return Err(BufferError::Overflow { offset: start });
                }
                magnitude |= chunk << shift;
            }
            shift += 7;
        }
        Ok((negative, magnitude))
    }

    fn packed_bounded(&mut self, max: u128) -> Result<i128, BufferError> {
        let start = self.x;
        let (negative, magnitude) = self.packed_magnitude()?;
        if magnitude > max {
            return Err(BufferError::Overflow { offset: start });
        }
        let value = magnitude as i128;
        Ok(if negative { !value } else { value })
    }

    /// Reads a packed 32-bit integer.
    pub fn packed_i32(&mut self) -> Result<i32, BufferError> {
        Ok(self.packed_bounded(i32::MAX as u128)? as i32)
    }

    /// Reads a packed 64-bit integer.
    pub fn packed_i64(&mut self) -> Result<i64, BufferError> {
        Ok(self.packed_bounded(i64::MAX as u128)? as i64)
    }

    /// Reads a packed 128-bit integer.
    pub fn packed_i128(&mut self) -> Result<i128, BufferError> {
        self.packed_bounded(i128::MAX as u128)
    }
}
