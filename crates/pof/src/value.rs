//! Native values and the closed set of POF type identifiers.
//!
//! [`Value`] is what a node decodes into and what `set` accepts. User
//! types have no reflective class table behind them; they decode into a
//! [`UserValue`] property bag keyed by property index.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::constants::*;
use crate::error::{PofError, Result};

/// A POF type identifier.
///
/// Intrinsic types map one-to-one onto the negative `T_*` identifiers;
/// any non-negative identifier is a user type resolved through a
/// [`PofContext`](crate::PofContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PofType {
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Float128,
    Decimal32,
    Decimal64,
    Decimal128,
    Boolean,
    Octet,
    OctetString,
    Char,
    CharString,
    Date,
    YearMonthInterval,
    Time,
    TimeInterval,
    DateTime,
    DayTimeInterval,
    Collection,
    UniformCollection,
    Array,
    UniformArray,
    SparseArray,
    UniformSparseArray,
    Map,
    UniformKeysMap,
    UniformMap,
    Identity,
    Reference,
    Unknown,
    User(i32),
}

impl PofType {
    /// Resolves a wire identifier. Compact value tags (`V_*`) are not
    /// types; use [`PofType::natural`] for those.
    pub fn from_id(id: i32) -> Option<PofType> {
        use PofType::*;
        Some(match id {
            id if id >= 0 => User(id),
            T_INT16 => Int16,
            T_INT32 => Int32,
            T_INT64 => Int64,
            T_INT128 => Int128,
            T_FLOAT32 => Float32,
            T_FLOAT64 => Float64,
            T_FLOAT128 => Float128,
            T_DECIMAL32 => Decimal32,
            T_DECIMAL64 => Decimal64,
            T_DECIMAL128 => Decimal128,
            T_BOOLEAN => Boolean,
            T_OCTET => Octet,
            T_OCTET_STRING => OctetString,
            T_CHAR => Char,
            T_CHAR_STRING => CharString,
            T_DATE => Date,
            T_YEAR_MONTH_INTERVAL => YearMonthInterval,
            T_TIME => Time,
            T_TIME_INTERVAL => TimeInterval,
            T_DATETIME => DateTime,
            T_DAY_TIME_INTERVAL => DayTimeInterval,
            T_COLLECTION => Collection,
            T_UNIFORM_COLLECTION => UniformCollection,
            T_ARRAY => Array,
            T_UNIFORM_ARRAY => UniformArray,
            T_SPARSE_ARRAY => SparseArray,
            T_UNIFORM_SPARSE_ARRAY => UniformSparseArray,
            T_MAP => Map,
            T_UNIFORM_KEYS_MAP => UniformKeysMap,
            T_UNIFORM_MAP => UniformMap,
            T_IDENTITY => Identity,
            T_REFERENCE => Reference,
            T_UNKNOWN => Unknown,
            _ => return None,
        })
    }

    /// The type a tag decodes to when no type is requested, covering both
    /// `T_*` identifiers and compact `V_*` tags.
    pub fn natural(tag: i32) -> Option<PofType> {
        match tag {
            V_BOOLEAN_FALSE | V_BOOLEAN_TRUE => Some(PofType::Boolean),
            V_STRING_ZERO_LENGTH => Some(PofType::CharString),
            V_COLLECTION_EMPTY => Some(PofType::Array),
            V_REFERENCE_NULL => Some(PofType::Unknown),
            V_FP_POS_INFINITY | V_FP_NEG_INFINITY | V_FP_NAN => Some(PofType::Float64),
            tag if is_tiny_int(tag) => Some(PofType::Int32),
            tag => PofType::from_id(tag),
        }
    }

    /// The wire identifier.
    pub fn id(self) -> i32 {
        use PofType::*;
        match self {
            Int16 => T_INT16,
            Int32 => T_INT32,
            Int64 => T_INT64,
            Int128 => T_INT128,
            Float32 => T_FLOAT32,
            Float64 => T_FLOAT64,
            Float128 => T_FLOAT128,
            Decimal32 => T_DECIMAL32,
            Decimal64 => T_DECIMAL64,
            Decimal128 => T_DECIMAL128,
            Boolean => T_BOOLEAN,
            Octet => T_OCTET,
            OctetString => T_OCTET_STRING,
            Char => T_CHAR,
            CharString => T_CHAR_STRING,
            Date => T_DATE,
            YearMonthInterval => T_YEAR_MONTH_INTERVAL,
            Time => T_TIME,
            TimeInterval => T_TIME_INTERVAL,
            DateTime => T_DATETIME,
            DayTimeInterval => T_DAY_TIME_INTERVAL,
            Collection => T_COLLECTION,
            UniformCollection => T_UNIFORM_COLLECTION,
            Array => T_ARRAY,
            UniformArray => T_UNIFORM_ARRAY,
            SparseArray => T_SPARSE_ARRAY,
            UniformSparseArray => T_UNIFORM_SPARSE_ARRAY,
            Map => T_MAP,
            UniformKeysMap => T_UNIFORM_KEYS_MAP,
            UniformMap => T_UNIFORM_MAP,
            Identity => T_IDENTITY,
            Reference => T_REFERENCE,
            Unknown => T_UNKNOWN,
            User(id) => id,
        }
    }

    /// The natural type of a native value. `Null` has no type of its own
    /// and reports [`PofType::Unknown`].
    pub fn of(value: &Value) -> PofType {
        match value {
            Value::Null => PofType::Unknown,
            Value::Bool(_) => PofType::Boolean,
            Value::Octet(_) => PofType::Octet,
            Value::Char(_) => PofType::Char,
            Value::Int16(_) => PofType::Int16,
            Value::Int32(_) => PofType::Int32,
            Value::Int64(_) => PofType::Int64,
            Value::Int128(_) => PofType::Int128,
            Value::Float32(_) => PofType::Float32,
            Value::Float64(_) => PofType::Float64,
            Value::Decimal(d) => d.pof_type(),
            Value::String(_) => PofType::CharString,
            Value::Binary(_) => PofType::OctetString,
            Value::Date(_) => PofType::Date,
            Value::Time(_) => PofType::Time,
            Value::DateTime(_) => PofType::DateTime,
            Value::BoolArray(_)
            | Value::Int32Array(_)
            | Value::Int64Array(_)
            | Value::Float32Array(_)
            | Value::Float64Array(_) => PofType::UniformArray,
            Value::Array(_) => PofType::Array,
            Value::Collection(_) => PofType::Collection,
            Value::SparseArray(_) => PofType::SparseArray,
            Value::Map(_) => PofType::Map,
            Value::User(u) => PofType::User(u.type_id),
        }
    }
}

impl fmt::Display for PofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PofType::*;
        let name = match self {
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Int128 => "int128",
            Float32 => "float32",
            Float64 => "float64",
            Float128 => "float128",
            Decimal32 => "decimal32",
            Decimal64 => "decimal64",
            Decimal128 => "decimal128",
            Boolean => "boolean",
            Octet => "octet",
            OctetString => "octet-string",
            Char => "char",
            CharString => "char-string",
            Date => "date",
            YearMonthInterval => "year-month-interval",
            Time => "time",
            TimeInterval => "time-interval",
            DateTime => "datetime",
            DayTimeInterval => "day-time-interval",
            Collection => "collection",
            UniformCollection => "uniform-collection",
            Array => "array",
            UniformArray => "uniform-array",
            SparseArray => "sparse-array",
            UniformSparseArray => "uniform-sparse-array",
            Map => "map",
            UniformKeysMap => "uniform-keys-map",
            UniformMap => "uniform-map",
            Identity => "identity",
            Reference => "reference",
            Unknown => "unknown",
            User(id) => return write!(f, "user-type({id})"),
        };
        f.write_str(name)
    }
}

/// Fixed-point decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PofDecimal {
    pub unscaled: i128,
    pub scale: i32,
}

impl PofDecimal {
    pub fn new(unscaled: i128, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    /// The narrowest decimal encoding able to carry the unscaled value.
    pub fn pof_type(&self) -> PofType {
        if i32::try_from(self.unscaled).is_ok() {
            PofType::Decimal32
        } else if i64::try_from(self.unscaled).is_ok() {
            PofType::Decimal64
        } else {
            PofType::Decimal128
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale)
    }
}

/// Time zone information carried by POF times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PofZone {
    /// No zone information.
    #[default]
    Local,
    Utc,
    Offset { hours: i32, minutes: i32 },
}

/// A time of day with optional zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PofTime {
    pub time: NaiveTime,
    pub zone: PofZone,
}

impl PofTime {
    pub fn new(time: NaiveTime, zone: PofZone) -> Self {
        Self { time, zone }
    }

    pub(crate) fn nanos(&self) -> u32 {
        self.time.nanosecond()
    }
}

/// A date and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PofDateTime {
    pub date: NaiveDate,
    pub time: PofTime,
}

/// A sparse array: a logical size plus the populated slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseArray {
    pub size: i32,
    pub entries: BTreeMap<i32, Value>,
}

impl SparseArray {
    pub fn new(size: i32) -> Self {
        Self {
            size,
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, index: i32, value: impl Into<Value>) -> Self {
        self.entries.insert(index, value.into());
        self
    }
}

/// Native form of any user-defined type: type identifier, version and the
/// populated properties by index.
#[derive(Debug, Clone, PartialEq)]
pub struct UserValue {
    pub type_id: i32,
    pub version: i32,
    pub fields: BTreeMap<i32, Value>,
}

impl UserValue {
    pub fn new(type_id: i32) -> Self {
        Self {
            type_id,
            version: 0,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Builder-style property setter.
    pub fn with(mut self, index: i32, value: impl Into<Value>) -> Self {
        self.fields.insert(index, value.into());
        self
    }

    pub fn field(&self, index: i32) -> Option<&Value> {
        self.fields.get(&index)
    }
}

/// A decoded POF value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Octet(u8),
    Char(char),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    Decimal(PofDecimal),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(PofTime),
    DateTime(PofDateTime),
    BoolArray(Vec<bool>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Float32Array(Vec<f32>),
    Float64Array(Vec<f64>),
    Array(Vec<Value>),
    Collection(Vec<Value>),
    SparseArray(SparseArray),
    Map(Vec<(Value, Value)>),
    User(UserValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the natural type, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            other => PofType::of(other).to_string(),
        }
    }

    /// The value a missing primitive reads as: zero, `false` or `'\0'`.
    /// Non-primitive types default to `Null`.
    pub fn default_for(pof_type: PofType) -> Value {
        match pof_type {
            PofType::Int16 => Value::Int16(0),
            PofType::Int32 => Value::Int32(0),
            PofType::Int64 => Value::Int64(0),
            PofType::Int128 => Value::Int128(0),
            PofType::Float32 => Value::Float32(0.0),
            PofType::Float64 => Value::Float64(0.0),
            PofType::Boolean => Value::Bool(false),
            PofType::Octet => Value::Octet(0),
            PofType::Char => Value::Char('\0'),
            _ => Value::Null,
        }
    }

    /// Element type of the typed primitive arrays.
    pub(crate) fn uniform_element_type(&self) -> Option<PofType> {
        match self {
            Value::BoolArray(_) => Some(PofType::Boolean),
            Value::Int32Array(_) => Some(PofType::Int32),
            Value::Int64Array(_) => Some(PofType::Int64),
            Value::Float32Array(_) => Some(PofType::Float32),
            Value::Float64Array(_) => Some(PofType::Float64),
            _ => None,
        }
    }

    /// The value as an exact integer, if it is one.
    pub fn as_integral(&self) -> Option<i128> {
        match self {
            Value::Octet(n) => Some(*n as i128),
            Value::Char(c) => Some(*c as u32 as i128),
            Value::Int16(n) => Some(*n as i128),
            Value::Int32(n) => Some(*n as i128),
            Value::Int64(n) => Some(*n as i128),
            Value::Int128(n) => Some(*n),
            Value::Float32(f) => float_integral(*f as f64),
            Value::Float64(f) => float_integral(*f),
            Value::Decimal(d) if d.scale == 0 => Some(d.unscaled),
            _ => None,
        }
    }

    /// The value as a float, if it is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float32(f) => Some(*f as f64),
            Value::Float64(f) => Some(*f),
            Value::Decimal(d) => Some(d.to_f64()),
            Value::Char(_) => None,
            other => other.as_integral().map(|n| n as f64),
        }
    }

    /// Elements of any array-like value, widened to generic values.
    pub fn into_elements(self) -> Option<Vec<Value>> {
        Some(match self {
            Value::Array(v) | Value::Collection(v) => v,
            Value::BoolArray(v) => v.into_iter().map(Value::Bool).collect(),
            Value::Int32Array(v) => v.into_iter().map(Value::Int32).collect(),
            Value::Int64Array(v) => v.into_iter().map(Value::Int64).collect(),
            Value::Float32Array(v) => v.into_iter().map(Value::Float32).collect(),
            Value::Float64Array(v) => v.into_iter().map(Value::Float64).collect(),
            _ => return None,
        })
    }

    /// Produces this value as `expected`, coercing where the format allows
    /// it (compact tags lose the width of integers and floats on the wire).
    pub fn convert(self, expected: PofType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::default_for(expected));
        }
        if expected == PofType::Unknown || PofType::of(&self) == expected {
            return Ok(self);
        }
        let mismatch = |v: &Value| PofError::mismatch(expected.to_string(), v.type_name());
        let integral = |v: &Value, min: i128, max: i128| match v.as_integral() {
            Some(n) if (min..=max).contains(&n) => Ok(n),
            _ => Err(mismatch(v)),
        };
        Ok(match expected {
            PofType::Boolean => match self.as_integral() {
                Some(n) if !matches!(self, Value::Char(_)) => Value::Bool(n != 0),
                _ => return Err(mismatch(&self)),
            },
            PofType::Int16 => {
                Value::Int16(integral(&self, i16::MIN as i128, i16::MAX as i128)? as i16)
            }
            PofType::Int32 => {
                Value::Int32(integral(&self, i32::MIN as i128, i32::MAX as i128)? as i32)
            }
            PofType::Int64 => {
                Value::Int64(integral(&self, i64::MIN as i128, i64::MAX as i128)? as i64)
            }
            PofType::Int128 => Value::Int128(integral(&self, i128::MIN, i128::MAX)?),
            PofType::Octet => Value::Octet(integral(&self, 0, u8::MAX as i128)? as u8),
            PofType::Char => match &self {
                Value::String(s) if s.chars().count() == 1 => {
                    Value::Char(s.chars().next().unwrap_or('\0'))
                }
                other => {
                    let n = integral(other, 0, u16::MAX as i128)? as u32;
                    Value::Char(char::from_u32(n).ok_or_else(|| mismatch(other))?)
                }
            },
            PofType::Float32 => Value::Float32(self.as_float().ok_or_else(|| mismatch(&self))? as f32),
            PofType::Float64 => Value::Float64(self.as_float().ok_or_else(|| mismatch(&self))?),
            PofType::Decimal32 | PofType::Decimal64 | PofType::Decimal128 => match self {
                Value::Decimal(_) => self,
                ref other => Value::Decimal(PofDecimal::new(
                    integral(other, i128::MIN, i128::MAX)?,
                    0,
                )),
            },
            PofType::CharString => match self {
                Value::Char(c) => Value::String(c.to_string()),
                other => return Err(mismatch(&other)),
            },
            PofType::Date => match self {
                Value::DateTime(dt) => Value::Date(dt.date),
                other => return Err(mismatch(&other)),
            },
            PofType::Time => match self {
                Value::DateTime(dt) => Value::Time(dt.time),
                other => return Err(mismatch(&other)),
            },
            PofType::Array | PofType::UniformArray => match self {
                Value::Map(_) | Value::SparseArray(_) => return Err(mismatch(&self)),
                other if other.uniform_element_type().is_some() => other,
                other => {
                    let name = other.type_name();
                    let elements = other
                        .into_elements()
                        .ok_or_else(|| PofError::mismatch(expected.to_string(), name))?;
                    Value::Array(elements)
                }
            },
            PofType::Collection | PofType::UniformCollection => {
                let name = self.type_name();
                let elements = self
                    .into_elements()
                    .ok_or_else(|| PofError::mismatch(expected.to_string(), name))?;
                Value::Collection(elements)
            }
            PofType::SparseArray | PofType::UniformSparseArray => match self {
                Value::SparseArray(_) => self,
                other => {
                    let name = other.type_name();
                    let elements = other
                        .into_elements()
                        .ok_or_else(|| PofError::mismatch(expected.to_string(), name))?;
                    let mut sparse = SparseArray::new(elements.len() as i32);
                    for (i, v) in elements.into_iter().enumerate() {
                        sparse.entries.insert(i as i32, v);
                    }
                    Value::SparseArray(sparse)
                }
            },
            PofType::Map | PofType::UniformKeysMap | PofType::UniformMap => match self {
                Value::Map(_) => self,
                Value::Array(ref v) | Value::Collection(ref v) if v.is_empty() => {
                    Value::Map(Vec::new())
                }
                other => return Err(mismatch(&other)),
            },
            _ => return Err(mismatch(&self)),
        })
    }
}

fn float_integral(f: f64) -> Option<i128> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1.7e38 {
        Some(f as i128)
    } else {
        None
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<UserValue> for Value {
    fn from(v: UserValue) -> Self {
        Value::User(v)
    }
}

impl From<SparseArray> for Value {
    fn from(v: SparseArray) -> Self {
        Value::SparseArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
