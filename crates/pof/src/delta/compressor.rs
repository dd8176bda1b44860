use pof_buffers::{Reader, Writer};

use super::{DeltaFormat, FMT_BINDIFF, FMT_EMPTY, FMT_REPLACE, OP_APPEND, OP_EXTRACT, OP_TERM};
use crate::error::{PofError, Result};

/// Computes and applies deltas between arbitrary buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryDeltaCompressor;

impl BinaryDeltaCompressor {
    /// Applies `delta` to `old`.
    ///
    /// ```
    /// use pof::BinaryDeltaCompressor;
    ///
    /// let delta = BinaryDeltaCompressor::extract_delta(b"hello world", b"hello there").unwrap();
    /// let new = BinaryDeltaCompressor::apply_delta(b"hello world", &delta).unwrap();
    /// assert_eq!(new, b"hello there");
    /// ```
    pub fn apply_delta(old: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
        let format = DeltaFormat::of(delta).ok_or_else(|| match delta.first() {
            None => PofError::InvalidDelta("empty delta".into()),
            Some(b) => PofError::InvalidDelta(format!("unknown delta format {b:#04x}")),
        })?;
        match format {
            DeltaFormat::Empty => Ok(Vec::new()),
            DeltaFormat::Replace => Ok(delta[1..].to_vec()),
            DeltaFormat::BinDiff => apply_bindiff(old, &delta[1..]).map_err(|e| match e {
                PofError::Buffer(e) => PofError::InvalidDelta(e.to_string()),
                other => other,
            }),
        }
    }

    /// Delta turning `old` into `new`, or `None` when they are equal.
    ///
    /// Keeps the common prefix and suffix and appends the middle, unless a
    /// full replace is no larger.
    pub fn extract_delta(old: &[u8], new: &[u8]) -> Option<Vec<u8>> {
        if old == new {
            return None;
        }
        if new.is_empty() {
            return Some(vec![FMT_EMPTY]);
        }
        let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        let mut w = Writer::with_capacity(new.len() - prefix - suffix + 16);
        w.u8(FMT_BINDIFF);
        if prefix > 0 {
            extract(&mut w, 0, prefix);
        }
        append(&mut w, &new[prefix..new.len() - suffix]);
        if suffix > 0 {
            extract(&mut w, old.len() - suffix, suffix);
        }
        w.u8(OP_TERM);
        let bindiff = w.flush();

        if bindiff.len() < new.len() + 1 {
            Some(bindiff)
        } else {
            let mut replace = Vec::with_capacity(new.len() + 1);
            replace.push(FMT_REPLACE);
            replace.extend_from_slice(new);
            Some(replace)
        }
    }
}

pub(crate) fn extract(w: &mut Writer, offset: usize, len: usize) {
    w.u8(OP_EXTRACT);
    w.packed_i32(offset as i32);
    w.packed_i32(len as i32);
}

pub(crate) fn append(w: &mut Writer, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    w.u8(OP_APPEND);
    w.packed_i32(bytes.len() as i32);
    w.buf(bytes);
}

fn apply_bindiff(old: &[u8], ops: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(ops);
    let mut out = Vec::with_capacity(old.len());
    loop {
        let at = r.x + 1;
        match r.u8()? {
            OP_EXTRACT => {
                let offset = length(&mut r, "extract offset")?;
                let len = length(&mut r, "extract length")?;
                let range = old
                    .get(offset..offset.saturating_add(len))
                    .ok_or_else(|| {
                        PofError::InvalidDelta(format!(
                            "extract {offset}+{len} past end of {} byte buffer",
                            old.len()
                        ))
                    })?;
                out.extend_from_slice(range);
            }
            OP_APPEND => {
                let len = length(&mut r, "append length")?;
                out.extend_from_slice(r.buf(len)?);
            }
            OP_TERM => {
                if !r.is_eof() {
                    return Err(PofError::InvalidDelta(format!(
                        "{} bytes after terminator",
                        r.size()
                    )));
                }
                return Ok(out);
            }
            op => {
                return Err(PofError::InvalidDelta(format!(
                    "unknown instruction {op:#04x} at offset {at}"
                )))
            }
        }
    }
}

fn length(r: &mut Reader<'_>, what: &str) -> Result<usize> {
    let n = r.packed_i32()?;
    usize::try_from(n).map_err(|_| PofError::InvalidDelta(format!("negative {what} {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_have_no_delta() {
        assert_eq!(BinaryDeltaCompressor::extract_delta(b"abc", b"abc"), None);
    }

    #[test]
    fn empty_result() {
        let delta = BinaryDeltaCompressor::extract_delta(b"abc", b"").unwrap();
        assert_eq!(delta, vec![FMT_EMPTY]);
        assert_eq!(BinaryDeltaCompressor::apply_delta(b"abc", &delta).unwrap(), b"");
    }

    #[test]
    fn middle_change_uses_bindiff() {
        let old = b"0123456789abcdefghij";
        let new = b"0123456789XYcdefghij";
        let delta = BinaryDeltaCompressor::extract_delta(old, new).unwrap();
        assert_eq!(
            delta,
            vec![
                FMT_BINDIFF, OP_EXTRACT, 0, 10, OP_APPEND, 2, b'X', b'Y', OP_EXTRACT, 12, 8,
                OP_TERM
            ]
        );
        assert_eq!(BinaryDeltaCompressor::apply_delta(old, &delta).unwrap(), new);
    }

    #[test]
    fn short_buffers_use_replace() {
        let delta = BinaryDeltaCompressor::extract_delta(b"ab", b"xy").unwrap();
        assert_eq!(delta, vec![FMT_REPLACE, b'x', b'y']);
    }

    #[test]
    fn rejects_bad_deltas() {
        let apply = BinaryDeltaCompressor::apply_delta;
        assert!(matches!(apply(b"ab", &[]), Err(PofError::InvalidDelta(_))));
        assert!(matches!(apply(b"ab", &[0x07]), Err(PofError::InvalidDelta(_))));
        assert!(matches!(
            apply(b"ab", &[FMT_BINDIFF, OP_EXTRACT, 1, 5, OP_TERM]),
            Err(PofError::InvalidDelta(_))
        ));
        assert!(matches!(
            apply(b"ab", &[FMT_BINDIFF, OP_APPEND, 3, 1]),
            Err(PofError::InvalidDelta(_))
        ));
        assert!(matches!(
            apply(b"ab", &[FMT_BINDIFF, OP_EXTRACT, 0, 1]),
            Err(PofError::InvalidDelta(_))
        ));
        assert!(matches!(
            apply(b"ab", &[FMT_BINDIFF, OP_TERM, 0]),
            Err(PofError::InvalidDelta(_))
        ));
    }
}
