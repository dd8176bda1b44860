//! Binary decorations: opaque metadata stored next to a value.
//!
//! A decorated buffer is laid out as
//! `marker mask <value length> FMT_EXT value decorations`, where the marker
//! says whether the mask is a single byte or a packed integer. Bit 0 of the
//! mask must be set; it stands for the value itself.

use pof_buffers::Writer;

use crate::constants::{DECO_MAX, DECO_VALUE, FMT_BIN_DECO, FMT_BIN_EXT_DECO, FMT_EXT};
use crate::error::{PofError, Result};

/// Decoration mask and the trailing decoration bytes of a decorated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration<'a> {
    pub mask: u64,
    pub bytes: &'a [u8],
}

impl<'a> Decoration<'a> {
    /// Whether the mask carries decoration slot `id`.
    pub fn has(&self, id: u32) -> bool {
        id <= DECO_MAX && self.mask & (1 << id) != 0
    }

    /// Wraps `value` (tagged POF bytes) with this decoration. `ext` adds
    /// the extended-format marker in front of the value.
    pub(crate) fn wrap(&self, value: &[u8], ext: bool) -> Vec<u8> {
        let inner_len = value.len() + ext as usize;
        let mut w = Writer::with_capacity(inner_len + self.bytes.len() + 12);
        if self.mask <= 0xff {
            w.u8(FMT_BIN_DECO);
            w.u8(self.mask as u8);
        } else {
            w.u8(FMT_BIN_EXT_DECO);
            w.packed_i64(self.mask as i64);
        }
        w.packed_i32(inner_len as i32);
        if ext {
            w.u8(FMT_EXT);
        }
        w.buf(value);
        w.buf(self.bytes);
        w.flush()
    }
}

/// Builds a decorated buffer around the tagged POF value `value`.
///
/// `decorations` is appended verbatim after the value; its layout is owned
/// by whoever defines the decoration slots named in `mask`.
pub fn decorate(value: &[u8], mask: u64, decorations: &[u8]) -> Result<Vec<u8>> {
    let decoration = Decoration {
        mask,
        bytes: decorations,
    };
    if !decoration.has(DECO_VALUE) {
        return Err(PofError::MissingDecoratedValue);
    }
    Ok(decoration.wrap(value, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_mask_uses_byte_form() {
        let out = decorate(&[0x69], 0b101, &[0xaa, 0xbb]).unwrap();
        assert_eq!(out, vec![FMT_BIN_DECO, 0b101, 2, FMT_EXT, 0x69, 0xaa, 0xbb]);
    }

    #[test]
    fn large_mask_uses_packed_form() {
        let out = decorate(&[0x69], 1 | (1 << 9), &[]).unwrap();
        assert_eq!(out[0], FMT_BIN_EXT_DECO);
        assert_eq!(&out[out.len() - 2..], &[FMT_EXT, 0x69]);
    }

    #[test]
    fn slots_past_the_mask_width_are_absent() {
        let decoration = Decoration {
            mask: 1 | (1 << DECO_MAX),
            bytes: &[],
        };
        assert!(decoration.has(DECO_VALUE));
        assert!(decoration.has(DECO_MAX));
        assert!(!decoration.has(1));
        assert!(!decoration.has(DECO_MAX + 1));
    }

    #[test]
    fn value_bit_is_required() {
        assert_eq!(
            decorate(&[0x69], 0b10, &[1]),
            Err(PofError::MissingDecoratedValue)
        );
    }
}
