use allocative::Allocative;
use serde::{Deserialize, Serialize};

/// Logical type tags understood by the engine.
/// A column's type decides how its cells are laid out inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Allocative)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// A boolean value stored as one byte.
    Bool,
    /// Signed integers.
    Int8,
    Int16,
    Int32,
    Int64,
    /// Unsigned integers.
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// A 32-bit floating-point number.
    Float,
    /// A 64-bit floating-point number.
    Double,
    /// An opaque pointer-sized handle, always stored as 64 bits.
    Pointer,
    /// A 16-byte globally unique identifier.
    Guid,
    /// A variable-length UTF-8 character string.
    Utf8,
    /// A variable-length byte sequence.
    Binary,
    /// JSON text.
    Json,
    /// XML text.
    Xml,
    /// Days since 1970-01-01.
    Date,
    /// Microseconds since midnight.
    Time,
    /// Microseconds since the unix epoch.
    DateTime,
}

impl DataType {
    /// Every logical type, in declaration order.
    pub const ALL: [DataType; 20] = [
        DataType::Bool,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Float,
        DataType::Double,
        DataType::Pointer,
        DataType::Guid,
        DataType::Utf8,
        DataType::Binary,
        DataType::Json,
        DataType::Xml,
        DataType::Date,
        DataType::Time,
        DataType::DateTime,
    ];

    /// Returns the inline byte size of fixed-size types, `None` for variable-size ones.
    pub const fn primitive_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float | Self::Date => Some(4),
            Self::Int64
            | Self::UInt64
            | Self::Double
            | Self::Pointer
            | Self::Time
            | Self::DateTime => Some(8),
            Self::Guid => Some(16),
            Self::Utf8 | Self::Binary | Self::Json | Self::Xml => None,
        }
    }

    /// Returns true for types with a fixed inline size.
    pub const fn is_fixed(self) -> bool {
        self.primitive_size().is_some()
    }

    /// Returns true for types whose payload is text.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Utf8 | Self::Json | Self::Xml)
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Canonical lowercase name, the same one [DataType::from_name] accepts.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Pointer => "pointer",
            Self::Guid => "guid",
            Self::Utf8 => "string",
            Self::Binary => "binary",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
        }
    }

    /// Resolves a type name case-insensitively. A few common aliases are accepted
    /// (`int`, `text`, `utf8`, `blob`, `f64`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let data_type = match lower.as_str() {
            "bool" | "boolean" => Self::Bool,
            "int8" | "i8" => Self::Int8,
            "int16" | "i16" => Self::Int16,
            "int32" | "i32" | "int" => Self::Int32,
            "int64" | "i64" | "bigint" => Self::Int64,
            "uint8" | "u8" => Self::UInt8,
            "uint16" | "u16" => Self::UInt16,
            "uint32" | "u32" => Self::UInt32,
            "uint64" | "u64" => Self::UInt64,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            "pointer" => Self::Pointer,
            "guid" | "uuid" => Self::Guid,
            "string" | "text" | "utf8" => Self::Utf8,
            "binary" | "blob" => Self::Binary,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" | "timestamp" => Self::DateTime,
            _ => return None,
        };
        Some(data_type)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
