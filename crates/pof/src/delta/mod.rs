//! Binary deltas between an original value and its modified form.
//!
//! A delta starts with a format byte:
//!
//! * [`FMT_EMPTY`]: the result is empty;
//! * [`FMT_REPLACE`]: the remaining bytes are the complete result;
//! * [`FMT_BINDIFF`]: a list of [`OP_EXTRACT`] (copy a range of the
//!   original) and [`OP_APPEND`] (insert literal bytes) instructions closed
//!   by [`OP_TERM`].

mod compressor;
mod encoder;

pub use compressor::BinaryDeltaCompressor;

pub const FMT_EMPTY: u8 = 0x00;
pub const FMT_REPLACE: u8 = 0x01;
pub const FMT_BINDIFF: u8 = 0x02;

/// `OP_EXTRACT <packed offset> <packed length>`
pub const OP_EXTRACT: u8 = 0x45;
/// `OP_APPEND <packed length> <bytes>`
pub const OP_APPEND: u8 = 0x41;
pub const OP_TERM: u8 = 0x2e;

/// Format of an encoded delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFormat {
    Empty,
    Replace,
    BinDiff,
}

impl DeltaFormat {
    /// Reads the format byte of `delta`.
    pub fn of(delta: &[u8]) -> Option<DeltaFormat> {
        match delta.first()? {
            &FMT_EMPTY => Some(DeltaFormat::Empty),
            &FMT_REPLACE => Some(DeltaFormat::Replace),
            &FMT_BINDIFF => Some(DeltaFormat::BinDiff),
            _ => None,
        }
    }

    pub fn marker(self) -> u8 {
        match self {
            DeltaFormat::Empty => FMT_EMPTY,
            DeltaFormat::Replace => FMT_REPLACE,
            DeltaFormat::BinDiff => FMT_BINDIFF,
        }
    }
}
