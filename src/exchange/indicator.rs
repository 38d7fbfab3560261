//! Indicator and exchange type tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single value crossing the application/database boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Value is present and complete
    #[default]
    Ok,
    /// Value is SQL NULL
    Null,
    /// No row was available
    NoData,
    /// Value did not fit in its fixed-capacity target
    Truncated,
}

impl Indicator {
    /// Check whether the indicator marks a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Indicator::Null)
    }
}

/// Closed set of application types that can be exchanged with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeType {
    Char,
    CString,
    String,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    DateTime,
    Blob,
    RowId,
    Statement,
}

impl ExchangeType {
    /// Check whether the type is one of the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ExchangeType::Int8
                | ExchangeType::UInt8
                | ExchangeType::Int16
                | ExchangeType::UInt16
                | ExchangeType::Int32
                | ExchangeType::UInt32
                | ExchangeType::Int64
                | ExchangeType::UInt64
        )
    }

    /// Check whether the type is a handle to a backend-owned object.
    pub fn is_handle(&self) -> bool {
        matches!(
            self,
            ExchangeType::Blob | ExchangeType::RowId | ExchangeType::Statement
        )
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeType::Char => "char",
            ExchangeType::CString => "cstring",
            ExchangeType::String => "string",
            ExchangeType::Int8 => "int8",
            ExchangeType::UInt8 => "uint8",
            ExchangeType::Int16 => "int16",
            ExchangeType::UInt16 => "uint16",
            ExchangeType::Int32 => "int32",
            ExchangeType::UInt32 => "uint32",
            ExchangeType::Int64 => "int64",
            ExchangeType::UInt64 => "uint64",
            ExchangeType::Double => "double",
            ExchangeType::DateTime => "datetime",
            ExchangeType::Blob => "blob",
            ExchangeType::RowId => "rowid",
            ExchangeType::Statement => "statement",
        };
        write!(f, "{}", name)
    }
}
