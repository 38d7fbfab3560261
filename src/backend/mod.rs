//! Backend capability interface.
//!
//! A backend is a thin adapter over a vendor client library. The exchange
//! engine only talks to these traits and never names a concrete backend.
//! Every handle returned here is owned by the caller; `clean_up` releases
//! what the handle allocated and may be called more than once.

pub mod registry;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use registry::BackendRegistry;

use crate::connection::ConnectionParameters;
use crate::error::BridgeError;
use crate::exchange::{ExchangeType, Indicator, IntoData, UseData};
use crate::types::DataType;
use std::any::Any;

/// Result of an execute or fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecFetchResult {
    /// All requested rows were read
    Success,
    /// End of the rowset was reached; some rows may still have been read
    NoData,
}

/// How long a prepared statement is expected to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Executed once and discarded
    OneTimeQuery,
    /// Prepared once and executed many times
    Repeatable,
}

/// Parameter placeholder syntax understood by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`
    Question,
    /// `?1`, `?2`, ...
    NumberedQuestion,
    /// `$1`, `$2`, ...
    Dollar,
    /// `:1`, `:2`, ...
    NumberedColon,
}

impl PlaceholderStyle {
    /// Placeholder text for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::NumberedQuestion => format!("?{}", index),
            PlaceholderStyle::Dollar => format!("${}", index),
            PlaceholderStyle::NumberedColon => format!(":{}", index),
        }
    }
}

/// Query text after named-parameter rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparedQuery {
    /// Query with placeholders in the backend's syntax
    pub text: String,
    /// Parameter names, one per placeholder, in order of appearance
    pub names: Vec<String>,
}

/// Connection-level operations of a backend.
pub trait SessionBackend: Send + Sync {
    fn begin(&self) -> Result<(), BridgeError>;
    fn commit(&self) -> Result<(), BridgeError>;
    fn rollback(&self) -> Result<(), BridgeError>;

    /// Name of the backend, used in logs and errors.
    fn backend_name(&self) -> String;

    fn make_statement_backend(&self) -> Result<Box<dyn StatementBackend>, BridgeError>;
    fn make_rowid_backend(&self) -> Result<Box<dyn RowIdBackend>, BridgeError>;
    fn make_blob_backend(&self) -> Result<Box<dyn BlobBackend>, BridgeError>;
}

/// Statement-level operations of a backend.
pub trait StatementBackend {
    /// Allocate native statement resources.
    fn alloc(&mut self) -> Result<(), BridgeError>;

    /// Release native statement resources.
    fn clean_up(&mut self);

    fn placeholder_style(&self) -> PlaceholderStyle;

    fn prepare(&mut self, query: &PreparedQuery, kind: StatementKind) -> Result<(), BridgeError>;

    /// Execute the statement. With `rows > 0`, up to `rows` result rows are
    /// made available to the into binders.
    fn execute(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError>;

    /// Read the next batch of up to `rows` rows.
    fn fetch(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError>;

    /// Number of rows read by the last execute or fetch.
    fn number_of_rows(&self) -> usize;

    /// Rows changed by the last DML execution.
    fn affected_rows(&self) -> Result<u64, BridgeError>;

    /// Prepare for column description. Returns the number of columns.
    fn prepare_for_describe(&mut self) -> Result<usize, BridgeError>;

    /// Type and name of the 1-based column `index`.
    fn describe_column(&mut self, index: usize) -> Result<(DataType, String), BridgeError>;

    fn make_into_backend(&mut self) -> Result<Box<dyn StandardIntoBackend>, BridgeError>;
    fn make_vector_into_backend(&mut self) -> Result<Box<dyn VectorIntoBackend>, BridgeError>;
    fn make_use_backend(&mut self) -> Result<Box<dyn StandardUseBackend>, BridgeError>;
    fn make_vector_use_backend(&mut self) -> Result<Box<dyn VectorUseBackend>, BridgeError>;
}

/// Binder for a single output value.
pub trait StandardIntoBackend {
    /// Define the target at `*position` and advance it.
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError>;

    fn pre_fetch(&mut self) -> Result<(), BridgeError>;

    /// Move the fetched value into `target`.
    ///
    /// `got_data == false` together with `called_from_fetch` is the normal
    /// end of the rowset and must leave the target and indicator untouched.
    /// A NULL value with no indicator slot is an error.
    fn post_fetch(
        &mut self,
        got_data: bool,
        called_from_fetch: bool,
        target: IntoData<'_>,
        indicator: Option<&mut Indicator>,
    ) -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

/// Binder for a column of output values.
pub trait VectorIntoBackend {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError>;

    fn pre_fetch(&mut self) -> Result<(), BridgeError>;

    /// Move the rows read by the last execute or fetch into `targets`, one
    /// row per index.
    fn post_fetch(
        &mut self,
        got_data: bool,
        targets: &mut [IntoData<'_>],
        indicators: Option<&mut [Indicator]>,
    ) -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

/// Binder for a single input value.
pub trait StandardUseBackend {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError>;

    fn bind_by_name(&mut self, name: &str, exchange_type: ExchangeType)
        -> Result<(), BridgeError>;

    /// Serialize the value into native form before execution.
    fn pre_use(&mut self, value: UseData<'_>, indicator: Option<Indicator>)
        -> Result<(), BridgeError>;

    /// Update the indicator after execution.
    fn post_use(&mut self, got_data: bool, indicator: Option<&mut Indicator>)
        -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

/// Binder for a column of input values.
pub trait VectorUseBackend {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError>;

    fn bind_by_name(&mut self, name: &str, exchange_type: ExchangeType)
        -> Result<(), BridgeError>;

    fn pre_use(
        &mut self,
        values: &[UseData<'_>],
        indicators: Option<&[Indicator]>,
    ) -> Result<(), BridgeError>;

    fn clean_up(&mut self);
}

/// Opaque row identifier. Only its own backend can interpret it.
pub trait RowIdBackend {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Backend storage of a binary large object.
pub trait BlobBackend {
    fn len(&self) -> Result<usize, BridgeError>;

    /// Copy bytes starting at `offset` into `buf`. Returns the count copied.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BridgeError>;

    /// Overwrite bytes starting at `offset`, extending as needed.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BridgeError>;

    fn append(&mut self, data: &[u8]) -> Result<usize, BridgeError>;

    fn trim(&mut self, new_len: usize) -> Result<(), BridgeError>;
}

/// Creates session backends from connection parameters.
pub trait BackendFactory: Send + Sync {
    fn make_session(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Box<dyn SessionBackend>, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_styles() {
        assert_eq!(PlaceholderStyle::Question.placeholder(3), "?");
        assert_eq!(PlaceholderStyle::NumberedQuestion.placeholder(3), "?3");
        assert_eq!(PlaceholderStyle::Dollar.placeholder(1), "$1");
        assert_eq!(PlaceholderStyle::NumberedColon.placeholder(2), ":2");
    }
}
