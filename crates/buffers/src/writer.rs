//! Auto-growing binary buffer writer.

/// A binary writer appending big-endian scalars and POF packed integers
/// to an owned buffer.
///
/// # Example
///
/// ```
/// use pof_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.packed_i32(-15);
/// writer.packed_i32(3);
/// writer.utf8("abc");
/// assert_eq!(writer.flush(), vec![0x4e, 0x03, b'a', b'b', b'c']);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Writer {
    /// The bytes written so far.
    pub uint8: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            uint8: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    /// Returns `true` if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.uint8.clear();
    }

    /// Takes the written bytes, leaving the writer empty.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.uint8)
    }

    /// Returns the written bytes without consuming them.
    pub fn as_slice(&self) -> &[u8] {
        &self.uint8
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.uint8.push(val);
    }

    /// Writes an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn u16(&mut self, val: u16) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes an unsigned 32-bit integer (big-endian).
    #[inline]
    pub fn u32(&mut self, val: u32) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes a signed 64-bit integer (big-endian).
    #[inline]
    pub fn i64(&mut self, val: i64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes a 32-bit float (big-endian).
    #[inline]
    pub fn f32(&mut self, val: f32) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Writes a 64-bit float (big-endian).
    #[inline]
    pub fn f64(&mut self, val: f64) {
        self.uint8.extend_from_slice(&val.to_be_bytes());
    }

    /// Appends raw bytes.
    #[inline]
    pub fn buf(&mut self, bytes: &[u8]) {
        self.uint8.extend_from_slice(bytes);
    }

    /// Appends the UTF-8 bytes of a string (no length prefix).
    #[inline]
    pub fn utf8(&mut self, s: &str) {
        self.uint8.extend_from_slice(s.as_bytes());
    }

    /// Writes a packed 32-bit integer.
    pub fn packed_i32(&mut self, n: i32) {
        self.packed_i128(n as i128);
    }

    /// Writes a packed 64-bit integer.
    pub fn packed_i64(&mut self, n: i64) {
        self.packed_i128(n as i128);
    }

    /// Writes a packed 128-bit integer.
    ///
    /// Negative values are stored as their complement with bit 6 of the
    /// first byte set, so all widths share a single encoding.
    pub fn packed_i128(&mut self, n: i128) {
        let (mut b, mut rest) = if n < 0 {
            (0x40u8, (!n) as u128)
        } else {
            (0u8, n as u128)
        };
        b |= (rest & 0x3f) as u8;
        rest >>= 6;
        while rest != 0 {
            self.uint8.push(b | 0x80);
            b = (rest & 0x7f) as u8;
            rest >>= 7;
        }
        self.uint8.push(b);
    }
}
