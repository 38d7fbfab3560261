//! Bundled SQLite backend built on `rusqlite`.
//!
//! Result sets are read in full when a query executes and handed to the into
//! binders batch by batch. Column types are derived from the declared type of
//! each column, falling back to the storage class of the first row.
//!
//! Connect strings are either a bare path (`app.db`, `:memory:`) or
//! `name=value` pairs:
//!
//! | option         | meaning                                   |
//! |----------------|-------------------------------------------|
//! | `db`, `dbname` | database path                             |
//! | `timeout`      | busy timeout in seconds                   |
//! | `readonly`     | open read-only                            |
//! | `synchronous`  | `PRAGMA synchronous` value                |
//! | `foreign_keys` | enable foreign key enforcement            |

mod binders;
mod factory;
mod handles;
mod session;
mod statement;

pub use factory::SqliteBackendFactory;
pub use handles::{SqliteBlobBackend, SqliteRowIdBackend};
pub use session::SqliteSessionBackend;
pub use statement::SqliteStatementBackend;

use crate::error::{BackendError, BridgeError, ErrorCategory};
use crate::exchange::convert::NativeValue;
use crate::types::DataType;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::ErrorCode;

/// Registry name of this backend.
pub const BACKEND_NAME: &str = "sqlite3";

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        match &err {
            rusqlite::Error::SqliteFailure(native, _) => BackendError::new(BACKEND_NAME, message)
                .with_code(native.extended_code)
                .with_category(category_of(native.code)),
            _ => BackendError::new(BACKEND_NAME, message),
        }
    }
}

impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        BridgeError::Backend(err.into())
    }
}

fn category_of(code: ErrorCode) -> ErrorCategory {
    match code {
        ErrorCode::ConstraintViolation => ErrorCategory::ConstraintViolation,
        ErrorCode::PermissionDenied | ErrorCode::ReadOnly | ErrorCode::AuthorizationForStatementDenied => {
            ErrorCategory::NoPrivilege
        }
        ErrorCode::CannotOpen | ErrorCode::NotADatabase => ErrorCategory::Connection,
        ErrorCode::SystemIoFailure | ErrorCode::OutOfMemory | ErrorCode::DiskFull => {
            ErrorCategory::System
        }
        _ => ErrorCategory::Unknown,
    }
}

/// Map a declared column type to a [`DataType`].
///
/// The declaration is lower-cased, stripped of spaces and cut at the first
/// character that is not alphanumeric, so `VARCHAR(20)` reads as `varchar`
/// and `UNSIGNED BIG INT` as `unsignedbigint`. Returns `None` for unknown
/// declarations.
pub(crate) fn data_type_from_decl(decl: &str) -> Option<DataType> {
    let normalized: String = decl
        .chars()
        .filter(|c| !c.is_whitespace())
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    let data_type = match normalized.as_str() {
        "blob" => DataType::Blob,
        "date" | "time" | "datetime" | "timestamp" => DataType::Date,
        "decimal" | "double" | "doubleprecision" | "float" | "number" | "numeric" | "real" => {
            DataType::Double
        }
        "tinyint" => DataType::Int8,
        "smallint" => DataType::Int16,
        "boolean" | "int" | "integer" | "int2" | "mediumint" => DataType::Int32,
        "bigint" | "int8" => DataType::Int64,
        "unsignedbigint" => DataType::UInt64,
        "char" | "character" | "clob" | "nativecharacter" | "nchar" | "nvarchar" | "text"
        | "varchar" | "varyingcharacter" => DataType::String,
        _ => return None,
    };
    Some(data_type)
}

/// Column type inferred from a stored value.
pub(crate) fn data_type_from_value(value: Option<&NativeValue>) -> DataType {
    match value {
        Some(NativeValue::Integer(_)) => DataType::Int64,
        Some(NativeValue::Real(_)) => DataType::Double,
        Some(NativeValue::Blob(_)) => DataType::Blob,
        _ => DataType::String,
    }
}

pub(crate) fn to_sql_value(value: &NativeValue) -> SqlValue {
    match value {
        NativeValue::Null => SqlValue::Null,
        NativeValue::Integer(i) => SqlValue::Integer(*i),
        NativeValue::Real(r) => SqlValue::Real(*r),
        NativeValue::Text(s) => SqlValue::Text(s.clone()),
        NativeValue::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

pub(crate) fn from_value_ref(value: ValueRef<'_>) -> NativeValue {
    match value {
        ValueRef::Null => NativeValue::Null,
        ValueRef::Integer(i) => NativeValue::Integer(i),
        ValueRef::Real(r) => NativeValue::Real(r),
        ValueRef::Text(bytes) => NativeValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => NativeValue::Blob(bytes.to_vec()),
    }
}
