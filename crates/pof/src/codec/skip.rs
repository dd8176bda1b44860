//! Skipping encoded values without decoding them.
//!
//! Child lookup in a container walks past every sibling between the
//! nearest materialized child and the target. These functions only move
//! the cursor; nothing is allocated.

use pof_buffers::Reader;

use crate::constants::*;
use crate::error::{PofError, Result};

/// Skips one tagged value (type tag followed by its body).
pub fn skip_value(reader: &mut Reader<'_>, depth: usize) -> Result<()> {
    let tag = reader.packed_i32()?;
    skip_uniform_value(reader, tag, depth)
}

/// Skips the body of a value whose type is already known: either read
/// from a tag, or implied by a uniform container.
pub fn skip_uniform_value(reader: &mut Reader<'_>, type_id: i32, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(PofError::malformed(reader.x, "value nesting exceeds the depth limit"));
    }
    let depth = depth - 1;
    match type_id {
        id if id >= 0 => {
            reader.packed_i32()?;
            skip_properties(reader, depth)?;
        }
        T_INT16 | T_INT32 | T_BOOLEAN | T_REFERENCE => {
            reader.packed_i32()?;
        }
        T_INT64 => {
            reader.packed_i64()?;
        }
        T_INT128 => {
            reader.packed_i128()?;
        }
        T_FLOAT32 => reader.skip(4)?,
        T_FLOAT64 => reader.skip(8)?,
        T_FLOAT128 => reader.skip(16)?,
        T_DECIMAL32 => {
            reader.packed_i32()?;
            reader.packed_i32()?;
        }
        T_DECIMAL64 => {
            reader.packed_i64()?;
            reader.packed_i32()?;
        }
        T_DECIMAL128 => {
            reader.packed_i128()?;
            reader.packed_i32()?;
        }
        T_OCTET => reader.skip(1)?,
        T_OCTET_STRING | T_CHAR_STRING => {
            let len = reader.packed_i32()?;
            if len > 0 {
                reader.skip(len as usize)?;
            }
        }
        T_CHAR => skip_char(reader)?,
        T_DATE => skip_packed(reader, 3)?,
        T_YEAR_MONTH_INTERVAL => skip_packed(reader, 2)?,
        T_TIME => skip_time(reader)?,
        T_DATETIME => {
            skip_packed(reader, 3)?;
            skip_time(reader)?;
        }
        T_TIME_INTERVAL => skip_packed(reader, 4)?,
        T_DAY_TIME_INTERVAL => skip_packed(reader, 5)?,
        T_COLLECTION | T_ARRAY => {
            let n = read_size(reader)?;
            for _ in 0..n {
                skip_value(reader, depth)?;
            }
        }
        T_UNIFORM_COLLECTION | T_UNIFORM_ARRAY => {
            let element_type = reader.packed_i32()?;
            let n = read_size(reader)?;
            for _ in 0..n {
                skip_uniform_value(reader, element_type, depth)?;
            }
        }
        T_SPARSE_ARRAY => {
            read_size(reader)?;
            skip_properties(reader, depth)?;
        }
        T_UNIFORM_SPARSE_ARRAY => {
            let element_type = reader.packed_i32()?;
            read_size(reader)?;
            let mut index = reader.packed_i32()?;
            while index >= 0 {
                skip_uniform_value(reader, element_type, depth)?;
                index = reader.packed_i32()?;
            }
        }
        T_MAP => {
            let n = read_size(reader)?;
            for _ in 0..n {
                skip_value(reader, depth)?;
                skip_value(reader, depth)?;
            }
        }
        T_UNIFORM_KEYS_MAP => {
            let key_type = reader.packed_i32()?;
            let n = read_size(reader)?;
            for _ in 0..n {
                skip_uniform_value(reader, key_type, depth)?;
                skip_value(reader, depth)?;
            }
        }
        T_UNIFORM_MAP => {
            let key_type = reader.packed_i32()?;
            let value_type = reader.packed_i32()?;
            let n = read_size(reader)?;
            for _ in 0..n {
                skip_uniform_value(reader, key_type, depth)?;
                skip_uniform_value(reader, value_type, depth)?;
            }
        }
        T_IDENTITY => {
            reader.packed_i32()?;
            skip_value(reader, depth)?;
        }
        // compact values carry no body
        V_INT_22..=V_BOOLEAN_FALSE => {}
        other => {
            return Err(PofError::malformed(
                reader.x,
                format!("unknown type identifier {other}"),
            ))
        }
    }
    Ok(())
}

/// Skips `(index, value)` pairs up to and including the negative
/// terminator.
fn skip_properties(reader: &mut Reader<'_>, depth: usize) -> Result<()> {
    let mut index = reader.packed_i32()?;
    while index >= 0 {
        skip_value(reader, depth)?;
        index = reader.packed_i32()?;
    }
    Ok(())
}

fn skip_packed(reader: &mut Reader<'_>, count: usize) -> Result<()> {
    for _ in 0..count {
        reader.packed_i32()?;
    }
    Ok(())
}

fn skip_time(reader: &mut Reader<'_>) -> Result<()> {
    skip_packed(reader, 4)?;
    if reader.packed_i32()? == 2 {
        skip_packed(reader, 2)?;
    }
    Ok(())
}

fn skip_char(reader: &mut Reader<'_>) -> Result<()> {
    let start = reader.x;
    let b = reader.u8()?;
    let extra = match b & 0xf0 {
        0x00..=0x70 => 0,
        0xc0 | 0xd0 => 1,
        0xe0 => 2,
        _ => return Err(PofError::malformed(start, "invalid char encoding")),
    };
    reader.skip(extra)?;
    Ok(())
}

/// Reads a non-negative element count.
pub(crate) fn read_size(reader: &mut Reader<'_>) -> Result<usize> {
    let start = reader.x;
    let n = reader.packed_i32()?;
    usize::try_from(n).map_err(|_| PofError::malformed(start, format!("negative size {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_buffers::Writer;

    #[test]
    fn skips_nested_array_exactly() {
        let mut w = Writer::new();
        w.packed_i32(T_ARRAY);
        w.packed_i32(2);
        w.packed_i32(T_CHAR_STRING);
        w.packed_i32(3);
        w.utf8("abc");
        w.packed_i32(V_INT_0);
        w.u8(0xaa); // trailing byte must stay unread
        let data = w.flush();
        let mut r = Reader::new(&data);
        skip_value(&mut r, 16).unwrap();
        assert_eq!(r.x, data.len() - 1);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut w = Writer::new();
        for _ in 0..4 {
            w.packed_i32(T_ARRAY);
            w.packed_i32(1);
        }
        w.packed_i32(V_INT_0);
        let data = w.flush();
        assert!(skip_value(&mut Reader::new(&data), 16).is_ok());
        assert!(matches!(
            skip_value(&mut Reader::new(&data), 3),
            Err(PofError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let mut w = Writer::new();
        w.packed_i32(-100);
        let data = w.flush();
        assert!(matches!(
            skip_value(&mut Reader::new(&data), 8),
            Err(PofError::Malformed { .. })
        ));
    }
}
