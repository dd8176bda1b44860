//! Byte buffer primitives for the Portable Object Format.
//!
//! # Overview
//!
//! - [`Reader`] - Reads big-endian scalars and POF packed integers from a
//!   byte slice with cursor tracking. Every read is bounds checked.
//! - [`Writer`] - Writes the same encodings to an auto-growing buffer.
//! - [`print_octets`] - Hex rendering of byte runs for diagnostics.
//!
//! # Example
//!
//! ```
//! use pof_buffers::{Reader, Writer};
//!
//! let mut writer = Writer::new();
//! writer.packed_i32(-2);
//! writer.packed_i32(1000);
//! writer.utf8("hello");
//! let data = writer.flush();
//!
//! let mut reader = Reader::new(&data);
//! assert_eq!(reader.packed_i32().unwrap(), -2);
//! assert_eq!(reader.packed_i32().unwrap(), 1000);
//! assert_eq!(reader.utf8(5).unwrap(), "hello");
//! ```

mod print_octets;
mod reader;
mod writer;

pub use print_octets::print_octets;
pub use reader::Reader;
pub use writer::Writer;

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    EndOfBuffer {
        /// Cursor position at which the read was attempted.
        offset: usize,
        /// Number of bytes the read needed.
        needed: usize,
    },
    /// Invalid UTF-8 sequence.
    InvalidUtf8 {
        /// Offset of the first byte of the string.
        offset: usize,
    },
    /// A packed integer does not fit the requested width.
    Overflow {
        /// Offset of the first byte of the packed integer.
        offset: usize,
    },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::EndOfBuffer { offset, needed } => {
                write!(f, "end of buffer at offset {offset} (needed {needed} bytes)")
            }
            BufferError::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 sequence at offset {offset}")
            }
            BufferError::Overflow { offset } => {
                write!(f, "packed integer overflow at offset {offset}")
            }
        }
    }
}

impl std::error::Error for BufferError {}
