//! POF value decoder.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use pof_buffers::Reader;

use super::skip::read_size;
use crate::constants::*;
use crate::context::PofContext;
use crate::error::{PofError, Result};
use crate::value::{PofDateTime, PofDecimal, PofTime, PofZone, SparseArray, UserValue, Value};

/// Decodes native [`Value`]s from a POF byte range.
///
/// Identities registered by `T_IDENTITY` tags are remembered for the life
/// of the decoder so later `T_REFERENCE` tags resolve against them.
pub struct PofDecoder<'a> {
    pub reader: Reader<'a>,
    ctx: &'a dyn PofContext,
    identities: HashMap<i32, Value>,
    max_depth: usize,
}

impl<'a> PofDecoder<'a> {
    pub fn new(reader: Reader<'a>, ctx: &'a dyn PofContext, max_depth: usize) -> Self {
        Self {
            reader,
            ctx,
            identities: HashMap::new(),
            max_depth,
        }
    }

    /// Makes an identity resolved elsewhere visible to references in this
    /// decode.
    pub fn seed_identity(&mut self, id: i32, value: Value) {
        self.identities.insert(id, value);
    }

    /// Decodes one tagged value.
    pub fn decode_value(&mut self) -> Result<Value> {
        self.value(self.max_depth)
    }

    /// Decodes one value whose type is implied (uniform container element).
    pub fn decode_uniform(&mut self, type_id: i32) -> Result<Value> {
        self.body(type_id, self.max_depth)
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        let tag = self.reader.packed_i32()?;
        self.body(tag, depth)
    }

    fn body(&mut self, type_id: i32, depth: usize) -> Result<Value> {
        if depth == 0 {
            return Err(PofError::malformed(
                self.reader.x,
                "value nesting exceeds the depth limit",
            ));
        }
        let depth = depth - 1;
        let r = &mut self.reader;
        Ok(match type_id {
            id if id >= 0 => Value::User(self.user(id, depth)?),
            T_INT16 => {
                let start = r.x;
                let n = r.packed_i32()?;
                Value::Int16(
                    i16::try_from(n).map_err(|_| PofError::malformed(start, "int16 out of range"))?,
                )
            }
            T_INT32 => Value::Int32(r.packed_i32()?),
            T_INT64 => Value::Int64(r.packed_i64()?),
            T_INT128 => Value::Int128(r.packed_i128()?),
            T_FLOAT32 => Value::Float32(r.f32()?),
            T_FLOAT64 => Value::Float64(r.f64()?),
            T_DECIMAL32 => {
                let unscaled = r.packed_i32()? as i128;
                Value::Decimal(PofDecimal::new(unscaled, r.packed_i32()?))
            }
            T_DECIMAL64 => {
                let unscaled = r.packed_i64()? as i128;
                Value::Decimal(PofDecimal::new(unscaled, r.packed_i32()?))
            }
            T_DECIMAL128 => {
                let unscaled = r.packed_i128()?;
                Value::Decimal(PofDecimal::new(unscaled, r.packed_i32()?))
            }
            T_BOOLEAN => Value::Bool(r.packed_i32()? != 0),
            T_OCTET => Value::Octet(r.u8()?),
            T_OCTET_STRING => {
                let len = r.packed_i32()?;
                if len < 0 {
                    Value::Null
                } else {
                    Value::Binary(r.buf(len as usize)?.to_vec())
                }
            }
            T_CHAR => Value::Char(read_char(r)?),
            T_CHAR_STRING => {
                let len = r.packed_i32()?;
                if len < 0 {
                    Value::Null
                } else {
                    Value::String(r.utf8(len as usize)?.to_owned())
                }
            }
            T_DATE => Value::Date(read_date(r)?),
            T_TIME => Value::Time(read_time(r)?),
            T_DATETIME => {
                let date = read_date(r)?;
                let time = read_time(r)?;
                Value::DateTime(PofDateTime { date, time })
            }
            T_COLLECTION | T_ARRAY => {
                let n = read_size(r)?;
                let mut items = Vec::with_capacity(n.min(r.size()));
                for _ in 0..n {
                    items.push(self.value(depth)?);
                }
                if type_id == T_ARRAY {
                    Value::Array(items)
                } else {
                    Value::Collection(items)
                }
            }
            T_UNIFORM_ARRAY => {
                let element_type = r.packed_i32()?;
                let n = read_size(r)?;
                self.uniform_array(element_type, n, depth)?
            }
            T_UNIFORM_COLLECTION => {
                let element_type = r.packed_i32()?;
                let n = read_size(r)?;
                let mut items = Vec::with_capacity(n.min(r.size()));
                for _ in 0..n {
                    items.push(self.body(element_type, depth)?);
                }
                Value::Collection(items)
            }
            T_SPARSE_ARRAY => {
                let size = r.packed_i32()?;
                let mut sparse = SparseArray::new(size);
                let mut index = self.reader.packed_i32()?;
                while index >= 0 {
                    let item = self.value(depth)?;
                    sparse.entries.insert(index, item);
                    index = self.reader.packed_i32()?;
                }
                Value::SparseArray(sparse)
            }
            T_UNIFORM_SPARSE_ARRAY => {
                let element_type = r.packed_i32()?;
                let size = r.packed_i32()?;
                let mut sparse = SparseArray::new(size);
                let mut index = self.reader.packed_i32()?;
                while index >= 0 {
                    let item = self.body(element_type, depth)?;
                    sparse.entries.insert(index, item);
                    index = self.reader.packed_i32()?;
                }
                Value::SparseArray(sparse)
            }
            T_MAP => {
                let n = read_size(r)?;
                let mut entries = Vec::with_capacity(n.min(r.size()));
                for _ in 0..n {
                    let key = self.value(depth)?;
                    entries.push((key, self.value(depth)?));
                }
                Value::Map(entries)
            }
            T_UNIFORM_KEYS_MAP => {
                let key_type = r.packed_i32()?;
                let n = read_size(r)?;
                let mut entries = Vec::with_capacity(n.min(r.size()));
                for _ in 0..n {
                    let key = self.body(key_type, depth)?;
                    entries.push((key, self.value(depth)?));
                }
                Value::Map(entries)
            }
            T_UNIFORM_MAP => {
                let key_type = r.packed_i32()?;
                let value_type = r.packed_i32()?;
                let n = read_size(r)?;
                let mut entries = Vec::with_capacity(n.min(r.size()));
                for _ in 0..n {
                    let key = self.body(key_type, depth)?;
                    entries.push((key, self.body(value_type, depth)?));
                }
                Value::Map(entries)
            }
            T_IDENTITY => {
                let id = r.packed_i32()?;
                let value = self.value(depth)?;
                self.register(id, value.clone())?;
                value
            }
            T_REFERENCE => {
                let id = r.packed_i32()?;
                self.identities
                    .get(&id)
                    .cloned()
                    .ok_or(PofError::UnresolvedReference(id))?
            }
            V_BOOLEAN_FALSE => Value::Bool(false),
            V_BOOLEAN_TRUE => Value::Bool(true),
            V_STRING_ZERO_LENGTH => Value::String(String::new()),
            V_COLLECTION_EMPTY => Value::Array(Vec::new()),
            V_REFERENCE_NULL => Value::Null,
            V_FP_POS_INFINITY => Value::Float64(f64::INFINITY),
            V_FP_NEG_INFINITY => Value::Float64(f64::NEG_INFINITY),
            V_FP_NAN => Value::Float64(f64::NAN),
            tag if is_tiny_int(tag) => Value::Int32(decode_tiny_int(tag)),
            T_FLOAT128 | T_YEAR_MONTH_INTERVAL | T_TIME_INTERVAL | T_DAY_TIME_INTERVAL => {
                return Err(PofError::UnsupportedType(type_id))
            }
            other => {
                return Err(PofError::malformed(
                    self.reader.x,
                    format!("unknown type identifier {other}"),
                ))
            }
        })
    }

    fn user(&mut self, type_id: i32, depth: usize) -> Result<UserValue> {
        self.ctx.type_for_id(type_id)?;
        let version = self.reader.packed_i32()?;
        let mut user = UserValue::new(type_id).with_version(version);
        let mut index = self.reader.packed_i32()?;
        while index >= 0 {
            let field = self.value(depth)?;
            user.fields.insert(index, field);
            index = self.reader.packed_i32()?;
        }
        Ok(user)
    }

    fn uniform_array(&mut self, element_type: i32, n: usize, depth: usize) -> Result<Value> {
        let cap = n.min(self.reader.size());
        let r = &mut self.reader;
        Ok(match element_type {
            T_BOOLEAN => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(r.packed_i32()? != 0);
                }
                Value::BoolArray(v)
            }
            T_INT32 => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(r.packed_i32()?);
                }
                Value::Int32Array(v)
            }
            T_INT64 => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(r.packed_i64()?);
                }
                Value::Int64Array(v)
            }
            T_FLOAT32 => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(r.f32()?);
                }
                Value::Float32Array(v)
            }
            T_FLOAT64 => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(r.f64()?);
                }
                Value::Float64Array(v)
            }
            _ => {
                let mut v = Vec::with_capacity(cap);
                for _ in 0..n {
                    v.push(self.body(element_type, depth)?);
                }
                Value::Array(v)
            }
        })
    }

    fn register(&mut self, id: i32, value: Value) -> Result<()> {
        match self.identities.get(&id) {
            Some(existing) if *existing != value => Err(PofError::DuplicateIdentity(id)),
            _ => {
                self.identities.insert(id, value);
                Ok(())
            }
        }
    }
}

fn read_char(r: &mut Reader<'_>) -> Result<char> {
    let start = r.x;
    let b = r.u8()? as u32;
    let code = match b & 0xf0 {
        0x00..=0x70 => b,
        0xc0 | 0xd0 => ((b & 0x1f) << 6) | (r.u8()? as u32 & 0x3f),
        0xe0 => {
            let b2 = r.u8()? as u32;
            let b3 = r.u8()? as u32;
            ((b & 0x0f) << 12) | ((b2 & 0x3f) << 6) | (b3 & 0x3f)
        }
        _ => return Err(PofError::malformed(start, "invalid char encoding")),
    };
    char::from_u32(code).ok_or_else(|| PofError::malformed(start, "char is not a scalar value"))
}

fn read_date(r: &mut Reader<'_>) -> Result<NaiveDate> {
    let start = r.x;
    let year = r.packed_i32()?;
    let month = r.packed_i32()?;
    let day = r.packed_i32()?;
    u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .ok_or_else(|| PofError::malformed(start, format!("invalid date {year}-{month}-{day}")))
}

fn read_time(r: &mut Reader<'_>) -> Result<PofTime> {
    let start = r.x;
    let hour = r.packed_i32()?;
    let minute = r.packed_i32()?;
    let second = r.packed_i32()?;
    // positive fractions are milliseconds, negative ones nanoseconds
    let fraction = r.packed_i32()?;
    let nanos = if fraction >= 0 {
        fraction.checked_mul(1_000_000)
    } else {
        fraction.checked_neg()
    };
    let zone = match r.packed_i32()? {
        0 => PofZone::Local,
        1 => PofZone::Utc,
        2 => PofZone::Offset {
            hours: r.packed_i32()?,
            minutes: r.packed_i32()?,
        },
        other => {
            return Err(PofError::malformed(
                start,
                format!("invalid time zone kind {other}"),
            ))
        }
    };
    let time = [hour, minute, second]
        .iter()
        .all(|n| *n >= 0)
        .then_some(())
        .and(nanos)
        .and_then(|nanos| {
            NaiveTime::from_hms_nano_opt(hour as u32, minute as u32, second as u32, nanos as u32)
        })
        .ok_or_else(|| PofError::malformed(start, "invalid time"))?;
    Ok(PofTime::new(time, zone))
}
