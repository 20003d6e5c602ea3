use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::data_type::DataType;
use crate::error::{Result, TableError};

/// Represents a single cell value read from or written to a table.
///
/// This enum is the engine's view of a cell: a type tag plus the payload.
/// Variable-size payloads are wrapped in [Arc] so reading a row does not copy
/// string and binary data more than once.
///
/// Equality follows the ordering: `Int32(3) == Int64(3)`, and text kinds
/// holding the same text are equal.
#[derive(Debug, Clone)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Pointer(u64),
    Guid([u8; 16]),
    Utf8(Arc<str>),
    Binary(Arc<[u8]>),
    Json(Arc<str>),
    Xml(Arc<str>),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since the unix epoch.
    DateTime(i64),
}

/// Inline little-endian encoding of a fixed-size value.
#[derive(Debug, Clone, Copy)]
pub struct FixedBytes {
    buf: [u8; 16],
    len: usize,
}

impl FixedBytes {
    fn new(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 16];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

macro_rules! read_le {
    ($ty:ty, $bytes:expr) => {
        <$ty>::from_le_bytes($bytes.get(..std::mem::size_of::<$ty>())?.try_into().ok()?)
    };
}

const MICROS_PER_DAY: i64 = 86_400_000_000;

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the logical [DataType] corresponding to this value.
    ///
    /// Returns `None` for [Value::Null]: a standalone null is untyped until it
    /// is placed in a column.
    pub fn data_type(&self) -> Option<DataType> {
        let data_type = match self {
            Self::Null => return None,
            Self::Bool(_) => DataType::Bool,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Pointer(_) => DataType::Pointer,
            Self::Guid(_) => DataType::Guid,
            Self::Utf8(_) => DataType::Utf8,
            Self::Binary(_) => DataType::Binary,
            Self::Json(_) => DataType::Json,
            Self::Xml(_) => DataType::Xml,
            Self::Date(_) => DataType::Date,
            Self::Time(_) => DataType::Time,
            Self::DateTime(_) => DataType::DateTime,
        };
        Some(data_type)
    }

    /// Returns true for values of a fixed-size type.
    pub fn is_primitive(&self) -> bool {
        self.data_type().is_some_and(DataType::is_fixed)
    }

    /// Returns true for fixed-size values that occupy exactly 64 bits.
    pub fn is_64(&self) -> bool {
        self.data_type().and_then(DataType::primitive_size) == Some(8)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64` for any integral variant that fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.integral().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => self.integral().map(|v| v as f64),
        }
    }

    /// Returns a reference to the text of [Value::Utf8], [Value::Json] or [Value::Xml].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) | Self::Json(s) | Self::Xml(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the payload bytes of variable-size values.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Utf8(s) | Self::Json(s) | Self::Xml(s) => Some(s.as_bytes()),
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Renders the value as text. Null renders as an empty string.
    pub fn as_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Int8(v) => v.to_string(),
            Self::Int16(v) => v.to_string(),
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::UInt8(v) => v.to_string(),
            Self::UInt16(v) => v.to_string(),
            Self::UInt32(v) => v.to_string(),
            Self::UInt64(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Pointer(v) => format!("{v:#x}"),
            Self::Guid(g) => format_guid(g),
            Self::Utf8(s) | Self::Json(s) | Self::Xml(s) => s.to_string(),
            Self::Binary(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
            Self::Date(v) => v.to_string(),
            Self::Time(v) => v.to_string(),
            Self::DateTime(v) => v.to_string(),
        }
    }

    /// Integral view used by conversions and mixed-width comparisons.
    fn integral(&self) -> Option<i128> {
        match self {
            Self::Bool(v) => Some(i128::from(*v)),
            Self::Int8(v) => Some(i128::from(*v)),
            Self::Int16(v) => Some(i128::from(*v)),
            Self::Int32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt8(v) => Some(i128::from(*v)),
            Self::UInt16(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::UInt64(v) | Self::Pointer(v) => Some(i128::from(*v)),
            Self::Date(v) => Some(i128::from(*v)),
            Self::Time(v) | Self::DateTime(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Converts the value to `target`.
    ///
    /// Numeric conversions are range-checked, text is parsed, and binary data
    /// converts to text only when it is valid UTF-8.
    ///
    /// # Errors
    /// Returns [TableError::Conversion] when no lossless conversion exists.
    pub fn convert_to(&self, target: DataType) -> Result<Value> {
        if self.data_type() == Some(target) {
            return Ok(self.clone());
        }
        self.try_convert(target).ok_or(TableError::Conversion {
            from: self.data_type(),
            to: target,
        })
    }

    fn try_convert(&self, target: DataType) -> Option<Value> {
        if self.is_null() {
            return None;
        }
        match target {
            DataType::Bool => match self {
                Self::Utf8(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(Self::Bool(true)),
                    "false" | "0" => Some(Self::Bool(false)),
                    _ => None,
                },
                _ => self.integral().map(|v| Self::Bool(v != 0)),
            },
            DataType::Int8 => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Int8),
            DataType::Int16 => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Int16),
            DataType::Int32 => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Int32),
            DataType::Int64 => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Int64),
            DataType::UInt8 => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::UInt8),
            DataType::UInt16 => self
                .to_integer()
                .and_then(|v| v.try_into().ok())
                .map(Self::UInt16),
            DataType::UInt32 => self
                .to_integer()
                .and_then(|v| v.try_into().ok())
                .map(Self::UInt32),
            DataType::UInt64 => self
                .to_integer()
                .and_then(|v| v.try_into().ok())
                .map(Self::UInt64),
            DataType::Pointer => self
                .to_integer()
                .and_then(|v| v.try_into().ok())
                .map(Self::Pointer),
            DataType::Float => self
                .to_float()
                .filter(|v| !v.is_finite() || v.abs() <= f64::from(f32::MAX))
                .map(|v| Self::Float(v as f32)),
            DataType::Double => self.to_float().map(Self::Double),
            DataType::Date => match self {
                Self::DateTime(us) => i32::try_from(us.div_euclid(MICROS_PER_DAY))
                    .ok()
                    .map(Self::Date),
                _ => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Date),
            },
            DataType::Time => match self {
                Self::DateTime(us) => Some(Self::Time(us.rem_euclid(MICROS_PER_DAY))),
                _ => self.to_integer().and_then(|v| v.try_into().ok()).map(Self::Time),
            },
            DataType::DateTime => match self {
                Self::Date(days) => i64::from(*days).checked_mul(MICROS_PER_DAY).map(Self::DateTime),
                _ => self
                    .to_integer()
                    .and_then(|v| v.try_into().ok())
                    .map(Self::DateTime),
            },
            DataType::Guid => match self {
                Self::Binary(b) => <[u8; 16]>::try_from(&b[..]).ok().map(Self::Guid),
                Self::Utf8(s) => parse_guid(s).map(Self::Guid),
                _ => None,
            },
            DataType::Utf8 | DataType::Json | DataType::Xml => {
                let text: Arc<str> = match self {
                    Self::Utf8(s) | Self::Json(s) | Self::Xml(s) => Arc::clone(s),
                    Self::Binary(b) => Arc::from(std::str::from_utf8(b).ok()?),
                    other => Arc::from(other.as_string()),
                };
                Some(match target {
                    DataType::Json => Self::Json(text),
                    DataType::Xml => Self::Xml(text),
                    _ => Self::Utf8(text),
                })
            }
            DataType::Binary => match self {
                Self::Utf8(s) | Self::Json(s) | Self::Xml(s) => Some(Self::Binary(Arc::from(s.as_bytes()))),
                Self::Guid(g) => Some(Self::Binary(Arc::from(&g[..]))),
                _ => None,
            },
        }
    }

    /// Integer view for integer targets: integral values as-is, integral floats,
    /// and parsed text.
    fn to_integer(&self) -> Option<i128> {
        match self {
            Self::Float(_) | Self::Double(_) => {
                let v = self.as_f64()?;
                (v.is_finite() && v.fract() == 0.0 && v.abs() < 1e38).then_some(v as i128)
            }
            Self::Utf8(s) => s.trim().parse::<i128>().ok(),
            _ => self.integral(),
        }
    }

    fn to_float(&self) -> Option<f64> {
        match self {
            Self::Utf8(s) => s.trim().parse::<f64>().ok(),
            _ => self.as_f64(),
        }
    }

    /// Encodes a fixed-size value as it is laid out inside a row slot.
    /// Returns `None` for null and variable-size values.
    pub fn to_fixed_bytes(&self) -> Option<FixedBytes> {
        let bytes = match self {
            Self::Bool(v) => FixedBytes::new(&[u8::from(*v)]),
            Self::Int8(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Int16(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Int32(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Int64(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::UInt8(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::UInt16(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::UInt32(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::UInt64(v) | Self::Pointer(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Float(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Double(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Guid(g) => FixedBytes::new(g),
            Self::Date(v) => FixedBytes::new(&v.to_le_bytes()),
            Self::Time(v) | Self::DateTime(v) => FixedBytes::new(&v.to_le_bytes()),
            _ => return None,
        };
        Some(bytes)
    }

    /// Decodes a fixed-size value from the front of `bytes`.
    pub fn from_fixed_bytes(data_type: DataType, bytes: &[u8]) -> Option<Value> {
        let value = match data_type {
            DataType::Bool => Self::Bool(*bytes.first()? != 0),
            DataType::Int8 => Self::Int8(read_le!(i8, bytes)),
            DataType::Int16 => Self::Int16(read_le!(i16, bytes)),
            DataType::Int32 => Self::Int32(read_le!(i32, bytes)),
            DataType::Int64 => Self::Int64(read_le!(i64, bytes)),
            DataType::UInt8 => Self::UInt8(read_le!(u8, bytes)),
            DataType::UInt16 => Self::UInt16(read_le!(u16, bytes)),
            DataType::UInt32 => Self::UInt32(read_le!(u32, bytes)),
            DataType::UInt64 => Self::UInt64(read_le!(u64, bytes)),
            DataType::Float => Self::Float(read_le!(f32, bytes)),
            DataType::Double => Self::Double(read_le!(f64, bytes)),
            DataType::Pointer => Self::Pointer(read_le!(u64, bytes)),
            DataType::Guid => Self::Guid(bytes.get(..16)?.try_into().ok()?),
            DataType::Date => Self::Date(read_le!(i32, bytes)),
            DataType::Time => Self::Time(read_le!(i64, bytes)),
            DataType::DateTime => Self::DateTime(read_le!(i64, bytes)),
            DataType::Utf8 | DataType::Binary | DataType::Json | DataType::Xml => return None,
        };
        Some(value)
    }

    /// Builds a variable-size value from its payload bytes.
    /// Returns `None` for fixed-size types.
    pub fn from_payload(data_type: DataType, bytes: &[u8]) -> Option<Value> {
        let text = || Arc::<str>::from(String::from_utf8_lossy(bytes).into_owned());
        match data_type {
            DataType::Utf8 => Some(Self::Utf8(text())),
            DataType::Json => Some(Self::Json(text())),
            DataType::Xml => Some(Self::Xml(text())),
            DataType::Binary => Some(Self::Binary(Arc::from(bytes))),
            _ => None,
        }
    }

    /// The empty value of a type, read back from a slot that was never written.
    pub fn empty(data_type: DataType) -> Value {
        Self::from_fixed_bytes(data_type, &[0u8; 16])
            .or_else(|| Self::from_payload(data_type, &[]))
            .unwrap_or(Self::Null)
    }
}

impl PartialOrd for Value {
    /// Null sorts first. Text kinds compare with each other, integral values
    /// compare exactly across widths, and any other numeric mix compares as `f64`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (
                Self::Utf8(a) | Self::Json(a) | Self::Xml(a),
                Self::Utf8(b) | Self::Json(b) | Self::Xml(b),
            ) => Some(a.cmp(b)),
            (Self::Binary(a), Self::Binary(b)) => Some(a.cmp(b)),
            (Self::Guid(a), Self::Guid(b)) => Some(a.cmp(b)),
            _ => match (self.integral(), other.integral()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Value {
    /// Ordering used by sorting and sorted search. Same as `partial_cmp`,
    /// except that floats fall back to IEEE total order, so NaN sorts after
    /// every number and equals itself.
    pub fn sort_cmp(&self, other: &Self) -> Option<Ordering> {
        self.partial_cmp(other)
            .or_else(|| match (self, other) {
                (Self::Float(_) | Self::Double(_), _) | (_, Self::Float(_) | Self::Double(_)) => {
                    Some(self.as_f64()?.total_cmp(&other.as_f64()?))
                }
                _ => None,
            })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            other => f.write_str(&other.as_string()),
        }
    }
}

fn format_guid(g: &[u8; 16]) -> String {
    let hex: String = g.iter().map(|byte| format!("{byte:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn parse_guid(s: &str) -> Option<[u8; 16]> {
    let digits: Vec<u8> = s
        .trim()
        .trim_matches(|c| c == '{' || c == '}')
        .bytes()
        .filter(|b| *b != b'-')
        .collect();
    if digits.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, pair) in digits.chunks(2).enumerate() {
        let text = std::str::from_utf8(pair).ok()?;
        out[i] = u8::from_str_radix(text, 16).ok()?;
    }
    Some(out)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(Arc::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Binary(Arc::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Arc::from(v))
    }
}
