//! POF value encoder.

use chrono::{Datelike, NaiveDate, Timelike};
use pof_buffers::Writer;

use crate::constants::*;
use crate::context::PofContext;
use crate::error::{PofError, Result};
use crate::value::{PofDecimal, PofTime, PofType, PofZone, UserValue, Value};

/// Encodes native [`Value`]s into POF bytes.
///
/// Tagged values use the compact encodings wherever the format has one
/// (tiny ints, boolean and null tags, empty strings and collections,
/// floating point specials). Uniform values are written without a tag and
/// without compaction, as their container implies the type.
pub struct PofEncoder<'a> {
    pub writer: Writer,
    ctx: &'a dyn PofContext,
}

impl<'a> PofEncoder<'a> {
    pub fn new(ctx: &'a dyn PofContext) -> Self {
        Self {
            writer: Writer::with_capacity(64),
            ctx,
        }
    }

    /// Encodes `value` with its type tag and returns the bytes.
    pub fn encode(&mut self, value: &Value) -> Result<Vec<u8>> {
        self.writer.reset();
        self.write_value(value)?;
        Ok(self.writer.flush())
    }

    /// Writes a tagged value.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        let w = &mut self.writer;
        match value {
            Value::Null => w.packed_i32(V_REFERENCE_NULL),
            Value::Bool(b) => w.packed_i32(if *b { V_BOOLEAN_TRUE } else { V_BOOLEAN_FALSE }),
            Value::Int16(n) => self.write_int(T_INT16, *n as i64),
            Value::Int32(n) => self.write_int(T_INT32, *n as i64),
            Value::Int64(n) => self.write_int(T_INT64, *n),
            Value::Float32(f) if !f.is_finite() => w.packed_i32(float_special(*f as f64)),
            Value::Float64(f) if !f.is_finite() => w.packed_i32(float_special(*f)),
            Value::String(s) if s.is_empty() => w.packed_i32(V_STRING_ZERO_LENGTH),
            Value::Array(items) | Value::Collection(items) if items.is_empty() => {
                w.packed_i32(V_COLLECTION_EMPTY)
            }
            Value::Map(entries) if entries.is_empty() => w.packed_i32(V_COLLECTION_EMPTY),
            other => {
                let pof_type = PofType::of(other);
                w.packed_i32(pof_type.id());
                self.write_body(other, pof_type)?;
            }
        }
        Ok(())
    }

    /// Writes an untagged value of `element_type`, converting `value` to
    /// that type first.
    pub fn write_uniform(&mut self, value: &Value, element_type: i32) -> Result<()> {
        let pof_type = PofType::from_id(element_type).ok_or_else(|| {
            PofError::mismatch(format!("type {element_type}"), value.type_name())
        })?;
        let converted = value.clone().convert(pof_type)?;
        if converted.is_null() {
            match pof_type {
                PofType::CharString | PofType::OctetString => {
                    self.writer.packed_i32(V_REFERENCE_NULL);
                    return Ok(());
                }
                _ => return Err(PofError::mismatch(pof_type.to_string(), "null")),
            }
        }
        self.write_body(&converted, pof_type)
    }

    fn write_int(&mut self, type_id: i32, n: i64) {
        match encode_tiny_int(n) {
            Some(tag) => self.writer.packed_i32(tag),
            None => {
                self.writer.packed_i32(type_id);
                self.writer.packed_i64(n);
            }
        }
    }

    /// Writes the body of `value` as `pof_type`. `value` must already have
    /// that type.
    fn write_body(&mut self, value: &Value, pof_type: PofType) -> Result<()> {
        let w = &mut self.writer;
        match (value, pof_type) {
            (Value::Bool(b), _) => w.packed_i32(*b as i32),
            (Value::Octet(n), _) => w.u8(*n),
            (Value::Char(c), _) => write_char(w, *c)?,
            (Value::Int16(n), _) => w.packed_i32(*n as i32),
            (Value::Int32(n), _) => w.packed_i32(*n),
            (Value::Int64(n), _) => w.packed_i64(*n),
            (Value::Int128(n), _) => w.packed_i128(*n),
            (Value::Float32(f), _) => w.f32(*f),
            (Value::Float64(f), _) => w.f64(*f),
            (Value::Decimal(d), t) => write_decimal(w, d, t),
            (Value::String(s), _) => {
                w.packed_i32(s.len() as i32);
                w.utf8(s);
            }
            (Value::Binary(b), _) => {
                w.packed_i32(b.len() as i32);
                w.buf(b);
            }
            (Value::Date(d), _) => write_date(w, d),
            (Value::Time(t), _) => write_time(w, t),
            (Value::DateTime(dt), _) => {
                write_date(w, &dt.date);
                write_time(w, &dt.time);
            }
            (typed, PofType::Array) if typed.uniform_element_type().is_some() => {
                let items = typed.clone().into_elements().unwrap_or_default();
                w.packed_i32(items.len() as i32);
                for item in &items {
                    self.write_value(item)?;
                }
            }
            (Value::BoolArray(v), _) => {
                w.packed_i32(T_BOOLEAN);
                w.packed_i32(v.len() as i32);
                v.iter().for_each(|b| w.packed_i32(*b as i32));
            }
            (Value::Int32Array(v), _) => {
                w.packed_i32(T_INT32);
                w.packed_i32(v.len() as i32);
                v.iter().for_each(|n| w.packed_i32(*n));
            }
            (Value::Int64Array(v), _) => {
                w.packed_i32(T_INT64);
                w.packed_i32(v.len() as i32);
                v.iter().for_each(|n| w.packed_i64(*n));
            }
            (Value::Float32Array(v), _) => {
                w.packed_i32(T_FLOAT32);
                w.packed_i32(v.len() as i32);
                v.iter().for_each(|f| w.f32(*f));
            }
            (Value::Float64Array(v), _) => {
                w.packed_i32(T_FLOAT64);
                w.packed_i32(v.len() as i32);
                v.iter().for_each(|f| w.f64(*f));
            }
            (Value::Array(items), _) | (Value::Collection(items), _) => {
                w.packed_i32(items.len() as i32);
                for item in items {
                    self.write_value(item)?;
                }
            }
            (Value::SparseArray(sparse), _) => {
                w.packed_i32(sparse.size);
                for (index, item) in &sparse.entries {
                    self.writer.packed_i32(*index);
                    self.write_value(item)?;
                }
                self.writer.packed_i32(PROP_TERMINATOR);
            }
            (Value::Map(entries), _) => {
                w.packed_i32(entries.len() as i32);
                for (key, item) in entries {
                    self.write_value(key)?;
                    self.write_value(item)?;
                }
            }
            (Value::User(user), _) => self.write_user(user)?,
            (other, expected) => {
                return Err(PofError::mismatch(expected.to_string(), other.type_name()))
            }
        }
        Ok(())
    }

    fn write_user(&mut self, user: &UserValue) -> Result<()> {
        self.ctx.type_for_id(user.type_id)?;
        self.writer.packed_i32(user.version);
        for (index, field) in &user.fields {
            if *index < 0 {
                return Err(PofError::malformed(
                    self.writer.len(),
                    format!("negative property index {index}"),
                ));
            }
            self.writer.packed_i32(*index);
            self.write_value(field)?;
        }
        self.writer.packed_i32(PROP_TERMINATOR);
        Ok(())
    }
}

fn float_special(f: f64) -> i32 {
    if f.is_nan() {
        V_FP_NAN
    } else if f > 0.0 {
        V_FP_POS_INFINITY
    } else {
        V_FP_NEG_INFINITY
    }
}

fn write_char(w: &mut Writer, c: char) -> Result<()> {
    let code = c as u32;
    match code {
        0x0001..=0x007f => w.u8(code as u8),
        0x0000 | 0x0080..=0x07ff => {
            w.u8((0xc0 | ((code >> 6) & 0x1f)) as u8);
            w.u8((0x80 | (code & 0x3f)) as u8);
        }
        0x0800..=0xffff => {
            w.u8((0xe0 | ((code >> 12) & 0x0f)) as u8);
            w.u8((0x80 | ((code >> 6) & 0x3f)) as u8);
            w.u8((0x80 | (code & 0x3f)) as u8);
        }
        _ => return Err(PofError::mismatch("char", "supplementary code point")),
    }
    Ok(())
}

fn write_decimal(w: &mut Writer, d: &PofDecimal, pof_type: PofType) {
    let width = match pof_type {
        PofType::Decimal32 | PofType::Decimal64 | PofType::Decimal128 => pof_type,
        _ => d.pof_type(),
    };
    match width {
        PofType::Decimal32 => w.packed_i32(d.unscaled as i32),
        PofType::Decimal64 => w.packed_i64(d.unscaled as i64),
        _ => w.packed_i128(d.unscaled),
    }
    w.packed_i32(d.scale);
}

fn write_date(w: &mut Writer, d: &NaiveDate) {
    w.packed_i32(d.year());
    w.packed_i32(d.month() as i32);
    w.packed_i32(d.day() as i32);
}

fn write_time(w: &mut Writer, t: &PofTime) {
    w.packed_i32(t.time.hour() as i32);
    w.packed_i32(t.time.minute() as i32);
    w.packed_i32(t.time.second() as i32);
    let nanos = t.nanos() as i32;
    let fraction = if nanos % 1_000_000 == 0 {
        nanos / 1_000_000
    } else {
        -nanos
    };
    w.packed_i32(fraction);
    match t.zone {
        PofZone::Local => w.packed_i32(0),
        PofZone::Utc => w.packed_i32(1),
        PofZone::Offset { hours, minutes } => {
            w.packed_i32(2);
            w.packed_i32(hours);
            w.packed_i32(minutes);
        }
    }
}
