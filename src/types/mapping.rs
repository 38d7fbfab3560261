//! Type mapping between database column types and Apache Arrow data types.

use crate::exchange::ExchangeType;
use arrow_schema::{DataType as ArrowType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Field metadata key holding the serialized column type.
pub const TYPE_METADATA_KEY: &str = "sqlbridge:type";

/// Column type reported by a backend when describing a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Double,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Date,
    Blob,
    Xml,
}

impl DataType {
    /// Exchange type used to fetch a column of this type into a dynamic row.
    pub fn exchange_type(&self) -> ExchangeType {
        match self {
            DataType::String | DataType::Xml => ExchangeType::String,
            DataType::Double => ExchangeType::Double,
            DataType::Int8 => ExchangeType::Int8,
            DataType::UInt8 => ExchangeType::UInt8,
            DataType::Int16 => ExchangeType::Int16,
            DataType::UInt16 => ExchangeType::UInt16,
            DataType::Int32 => ExchangeType::Int32,
            DataType::UInt32 => ExchangeType::UInt32,
            DataType::Int64 => ExchangeType::Int64,
            DataType::UInt64 => ExchangeType::UInt64,
            DataType::Date => ExchangeType::DateTime,
            DataType::Blob => ExchangeType::Blob,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "STRING",
            DataType::Double => "DOUBLE",
            DataType::Int8 => "INT8",
            DataType::UInt8 => "UINT8",
            DataType::Int16 => "INT16",
            DataType::UInt16 => "UINT16",
            DataType::Int32 => "INT32",
            DataType::UInt32 => "UINT32",
            DataType::Int64 => "INT64",
            DataType::UInt64 => "UINT64",
            DataType::Date => "DATE",
            DataType::Blob => "BLOB",
            DataType::Xml => "XML",
        };
        write!(f, "{}", name)
    }
}

/// Type mapper for converting between column types and Arrow types.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert a column type to an Arrow DataType.
    ///
    /// Dates map to microsecond timestamps without a time zone, since the
    /// exchanged calendar value carries a time of day.
    pub fn to_arrow(data_type: &DataType) -> ArrowType {
        match data_type {
            DataType::String | DataType::Xml => ArrowType::Utf8,
            DataType::Double => ArrowType::Float64,
            DataType::Int8 => ArrowType::Int8,
            DataType::UInt8 => ArrowType::UInt8,
            DataType::Int16 => ArrowType::Int16,
            DataType::UInt16 => ArrowType::UInt16,
            DataType::Int32 => ArrowType::Int32,
            DataType::UInt32 => ArrowType::UInt32,
            DataType::Int64 => ArrowType::Int64,
            DataType::UInt64 => ArrowType::UInt64,
            DataType::Date => ArrowType::Timestamp(TimeUnit::Microsecond, None),
            DataType::Blob => ArrowType::Binary,
        }
    }

    /// Create Arrow field metadata preserving the column type.
    ///
    /// This keeps XML columns distinguishable from plain strings.
    pub fn create_field_metadata(data_type: &DataType) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        if let Ok(json) = serde_json::to_string(data_type) {
            metadata.insert(TYPE_METADATA_KEY.to_string(), json);
        }
        metadata
    }
}
