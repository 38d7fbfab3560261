//! Error types for sqlbridge.
//!
//! This module defines domain-specific error types organized by functional area.

use crate::exchange::ExchangeType;
use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Connection and configuration errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol and programming errors raised by the exchange engine
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Value conversion errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Errors reported by a native client library
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Connection pool invariant violations
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// An error raised while a statement was being processed
    #[error("{source} while {operation} \"{query}\"")]
    InStatement {
        operation: &'static str,
        query: String,
        #[source]
        source: Box<BridgeError>,
    },
}

/// Errors related to backends, sessions and connection parameters.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No factory is registered under the requested name
    #[error("No such backend: '{name}'")]
    UnknownBackend { name: String },

    /// Connection string parsing error
    #[error("Failed to parse connection string: {0}")]
    ParseError(String),

    /// Invalid connection parameter
    #[error("Invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Session has no backend attached
    #[error("Session is not connected")]
    NotConnected,

    /// Session already has a backend attached
    #[error("Cannot open already connected session")]
    AlreadyConnected,

    /// Transaction control used out of order
    #[error("Transaction error: {0}")]
    TransactionError(String),
}

/// Protocol and programming errors detected by the exchange engine.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A null value arrived for a binding without an indicator slot
    #[error("Null value fetched and no indicator defined (position {position})")]
    NullWithoutIndicator { position: usize },

    /// A query returned no row for a binding without an indicator slot
    #[error("No data fetched and no indicator defined (position {position})")]
    NoDataWithoutIndicator { position: usize },

    /// The backend cannot exchange this type for the given operation
    #[error("Exchange type {exchange_type} is not supported for {operation}")]
    UnsupportedExchange {
        exchange_type: ExchangeType,
        operation: &'static str,
    },

    /// Positional and named use bindings in one statement
    #[error("Binding by name and by position cannot be mixed in one statement")]
    MixedBinding,

    /// Named binding that does not appear in the query text
    #[error("Parameter ':{0}' does not appear in the query")]
    UnknownParameter(String),

    /// Empty vector bound to a statement
    #[error("Vectors of size 0 are not allowed")]
    EmptyVector,

    /// Bound vectors disagree in length
    #[error("Bind variable size mismatch ({kind}[{index}] has size {size}, {kind}[0] has size {expected})")]
    VectorSizeMismatch {
        kind: &'static str,
        index: usize,
        size: usize,
        expected: usize,
    },

    /// Indicator sequence does not match its value sequence
    #[error("Indicator vector has size {indicators}, value vector has size {values}")]
    IndicatorSizeMismatch { values: usize, indicators: usize },

    /// Bulk use and bulk into in a single execution
    #[error("Bulk insert/update and bulk select not allowed in same query")]
    BulkInAndOut,

    /// Into vector grew between fetches
    #[error("Increasing the size of the output vector is not supported")]
    IntoVectorGrew,

    /// Fixed-capacity string overflow without an indicator
    #[error("Value truncated at position {position} (capacity {capacity}) and no indicator defined")]
    Truncated { position: usize, capacity: usize },

    /// Only one dynamic row per statement
    #[error("Only one row element allowed in a single statement")]
    DuplicateRow,

    /// Operation invoked in the wrong statement state
    #[error("Invalid statement state: {0}")]
    InvalidState(String),
}

/// Errors related to value conversion.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Text could not be parsed as a number of the requested type
    #[error("Cannot convert '{value}' to {target}")]
    InvalidNumber { value: String, target: &'static str },

    /// Numeric value does not fit in the target type
    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    /// Text could not be parsed as a date/time
    #[error("Cannot parse date/time from '{0}'")]
    InvalidDateTime(String),

    /// Value of a different kind than requested
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Column index or name not present in a row
    #[error("Column {0} not found")]
    ColumnNotFound(String),

    /// NULL column read without a default
    #[error("Null value not allowed for column '{0}'")]
    NullValue(String),

    /// Row layout differs from the batch schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Value conversion failed at a specific cell
    #[error("Failed to convert value at row {row}, column {column}: {message}")]
    ValueConversionFailed {
        row: usize,
        column: usize,
        message: String,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(String),
}

/// Basic classification of errors, independent of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection could not be established or was lost
    Connection,
    /// Statement is malformed or used incorrectly
    InvalidStatement,
    /// Insufficient privileges
    NoPrivilege,
    /// No data where data was required
    NoData,
    /// Constraint violation
    ConstraintViolation,
    /// Transaction outcome is unknown
    UnknownTransactionState,
    /// Operating system or resource error
    System,
    /// Anything else
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Connection => write!(f, "CONNECTION"),
            ErrorCategory::InvalidStatement => write!(f, "INVALID_STATEMENT"),
            ErrorCategory::NoPrivilege => write!(f, "NO_PRIVILEGE"),
            ErrorCategory::NoData => write!(f, "NO_DATA"),
            ErrorCategory::ConstraintViolation => write!(f, "CONSTRAINT_VIOLATION"),
            ErrorCategory::UnknownTransactionState => write!(f, "UNKNOWN_TRANSACTION_STATE"),
            ErrorCategory::System => write!(f, "SYSTEM"),
            ErrorCategory::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Failure reported by a native client library.
///
/// Carries the original message and, where the library provides them, the
/// native error code and SQLSTATE.
#[derive(Error, Debug, Clone)]
#[error("{backend}: {message}")]
pub struct BackendError {
    /// Name of the backend that raised the error
    pub backend: String,
    /// Native error message
    pub message: String,
    /// Native error code
    pub code: Option<i32>,
    /// Five character SQLSTATE
    pub sqlstate: Option<String>,
    /// Classification of the failure
    pub category: ErrorCategory,
}

impl BackendError {
    /// Create a backend error with unknown category and no native code.
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
            code: None,
            sqlstate: None,
            category: ErrorCategory::Unknown,
        }
    }

    /// Attach the native error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the SQLSTATE.
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }
}

/// Errors raised by the connection pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Pool created with zero entries
    #[error("Invalid pool size")]
    InvalidSize,

    /// Position outside the pool
    #[error("Invalid pool position {position} (pool size {size})")]
    InvalidPosition { position: usize, size: usize },

    /// Entry returned while already free
    #[error("Cannot release pool entry {position} (already free)")]
    DoubleRelease { position: usize },
}

impl BridgeError {
    /// Wrap an error with the statement operation and query that raised it.
    pub fn in_statement(self, operation: &'static str, query: &str) -> Self {
        if query.is_empty() {
            return self;
        }
        BridgeError::InStatement {
            operation,
            query: query.to_string(),
            source: Box::new(self),
        }
    }

    /// The error without any statement context.
    pub fn innermost(&self) -> &BridgeError {
        match self {
            BridgeError::InStatement { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// Map to an error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Connection(e) => e.category(),
            BridgeError::Query(QueryError::NoDataWithoutIndicator { .. }) => ErrorCategory::NoData,
            BridgeError::Query(_) => ErrorCategory::InvalidStatement,
            BridgeError::Conversion(_) => ErrorCategory::InvalidStatement,
            BridgeError::Backend(e) => e.category,
            BridgeError::Pool(_) => ErrorCategory::System,
            BridgeError::InStatement { source, .. } => source.category(),
        }
    }
}

impl ConnectionError {
    /// Map to an error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConnectionError::TransactionError(_) => ErrorCategory::UnknownTransactionState,
            _ => ErrorCategory::Connection,
        }
    }
}

// Conversions from external error types
impl From<arrow_schema::ArrowError> for ConversionError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        ConversionError::ArrowError(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for BridgeError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        BridgeError::Conversion(err.into())
    }
}
