//! Owned column values held by dynamic rows.

use crate::error::ConversionError;
use crate::exchange::IntoData;
use crate::types::DataType;
use chrono::NaiveDateTime;

/// One owned value of a dynamically described column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Double(f64),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Date(NaiveDateTime),
    Blob(Vec<u8>),
    Xml(String),
}

impl Value {
    /// Empty value of the given column type.
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::String => Value::String(String::new()),
            DataType::Double => Value::Double(0.0),
            DataType::Int8 => Value::Int8(0),
            DataType::UInt8 => Value::UInt8(0),
            DataType::Int16 => Value::Int16(0),
            DataType::UInt16 => Value::UInt16(0),
            DataType::Int32 => Value::Int32(0),
            DataType::UInt32 => Value::UInt32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::UInt64 => Value::UInt64(0),
            DataType::Date => Value::Date(NaiveDateTime::default()),
            DataType::Blob => Value::Blob(Vec::new()),
            DataType::Xml => Value::Xml(String::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Double(_) => DataType::Double,
            Value::Int8(_) => DataType::Int8,
            Value::UInt8(_) => DataType::UInt8,
            Value::Int16(_) => DataType::Int16,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt64(_) => DataType::UInt64,
            Value::Date(_) => DataType::Date,
            Value::Blob(_) => DataType::Blob,
            Value::Xml(_) => DataType::Xml,
        }
    }

    /// Target view for fetching into this value. BLOBs travel through a
    /// backend handle and have no direct view.
    pub(crate) fn into_data(&mut self) -> Option<IntoData<'_>> {
        Some(match self {
            Value::String(s) | Value::Xml(s) => IntoData::String(s),
            Value::Double(v) => IntoData::Double(v),
            Value::Int8(v) => IntoData::Int8(v),
            Value::UInt8(v) => IntoData::UInt8(v),
            Value::Int16(v) => IntoData::Int16(v),
            Value::UInt16(v) => IntoData::UInt16(v),
            Value::Int32(v) => IntoData::Int32(v),
            Value::UInt32(v) => IntoData::UInt32(v),
            Value::Int64(v) => IntoData::Int64(v),
            Value::UInt64(v) => IntoData::UInt64(v),
            Value::Date(v) => IntoData::DateTime(v),
            Value::Blob(_) => return None,
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::Int8(_) => "int8",
            Value::UInt8(_) => "uint8",
            Value::Int16(_) => "int16",
            Value::UInt16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Date(_) => "date",
            Value::Blob(_) => "blob",
            Value::Xml(_) => "xml",
        }
    }
}

/// Extraction of a typed value from a [`Value`].
///
/// Integer columns convert to any integer type that holds the value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::Int8(v) => Some(i128::from(*v)),
        Value::UInt8(v) => Some(i128::from(*v)),
        Value::Int16(v) => Some(i128::from(*v)),
        Value::UInt16(v) => Some(i128::from(*v)),
        Value::Int32(v) => Some(i128::from(*v)),
        Value::UInt32(v) => Some(i128::from(*v)),
        Value::Int64(v) => Some(i128::from(*v)),
        Value::UInt64(v) => Some(i128::from(*v)),
        _ => None,
    }
}

macro_rules! impl_from_value_integer {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let wide = integer_of(value).ok_or(ConversionError::TypeMismatch {
                        expected: $name,
                        found: value.kind(),
                    })?;
                    <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                        value: wide.to_string(),
                        target: $name,
                    })
                }
            }
        )*
    };
}

impl_from_value_integer!(
    i8 => "int8",
    u8 => "uint8",
    i16 => "int16",
    u16 => "uint16",
    i32 => "int32",
    u32 => "uint32",
    i64 => "int64",
    u64 => "uint64",
);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Double(v) => Ok(*v),
            other => match integer_of(other) {
                Some(i) => Ok(i as f64),
                None => Err(ConversionError::TypeMismatch {
                    expected: "double",
                    found: other.kind(),
                }),
            },
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) | Value::Xml(s) => Ok(s.clone()),
            other => Err(ConversionError::TypeMismatch {
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Date(v) => Ok(*v),
            other => Err(ConversionError::TypeMismatch {
                expected: "date",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            other => Err(ConversionError::TypeMismatch {
                expected: "blob",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}
