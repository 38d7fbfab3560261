//! Array builders for converting fetched rows to Arrow arrays.
//!
//! Rows are collected column-major and turned into typed Arrow arrays with
//! NULLs taken from the row indicators.

use crate::error::ConversionError;
use crate::query::Row;
use crate::types::{ColumnProperties, DataType, SchemaBuilder, Value};
use arrow::array::{
    ArrayRef, BinaryBuilder, Float64Builder, Int16Builder, Int32Builder, Int64Builder,
    Int8Builder, RecordBatch, StringBuilder, TimestampMicrosecondBuilder, UInt16Builder,
    UInt32Builder, UInt64Builder, UInt8Builder,
};
use arrow::datatypes::Schema;
use std::sync::Arc;

/// Collects fetched [`Row`]s into Arrow record batches.
///
/// # Example
///
/// ```no_run
/// # use sqlbridge::{into_row, BackendRegistry, ConnectionParameters, Row, RowBatchBuilder, Session};
/// # use std::cell::RefCell;
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::connect(&BackendRegistry::with_builtin(),
/// #     &ConnectionParameters::new("sqlite3", ":memory:"))?;
/// let row = RefCell::new(Row::new());
/// let mut st = session.prepare("select id, name from person")?;
/// st.exchange(into_row(&row));
/// st.execute(true)?;
///
/// let mut builder = RowBatchBuilder::new(row.borrow().columns())?;
/// while st.got_data() {
///     builder.append_row(&row.borrow())?;
///     st.fetch()?;
/// }
/// let batch = builder.finish()?;
/// println!("{} rows", batch.num_rows());
/// # Ok(())
/// # }
/// ```
pub struct RowBatchBuilder {
    schema: Arc<Schema>,
    columns: Vec<ColumnProperties>,
    /// Column-major cells; `None` is NULL
    cells: Vec<Vec<Option<Value>>>,
    rows: usize,
}

impl RowBatchBuilder {
    /// Create a builder for rows with the given columns.
    ///
    /// # Errors
    /// Returns `ConversionError` if the schema cannot be built
    pub fn new(columns: &[ColumnProperties]) -> Result<Self, ConversionError> {
        let schema = SchemaBuilder::new()
            .add_columns(columns.iter().cloned())
            .build()?;
        Ok(Self {
            schema: Arc::new(schema),
            columns: columns.to_vec(),
            cells: vec![Vec::new(); columns.len()],
            rows: 0,
        })
    }

    /// Get the Arrow schema of the batches.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Number of rows collected since the last `finish`.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Copy the current content of `row`.
    ///
    /// # Errors
    /// Returns `ConversionError::SchemaMismatch` if the row's columns differ
    /// from the builder's
    pub fn append_row(&mut self, row: &Row) -> Result<(), ConversionError> {
        if row.columns() != self.columns.as_slice() {
            return Err(ConversionError::SchemaMismatch(format!(
                "Row has {} columns {:?}, expected {:?}",
                row.size(),
                row.columns().iter().map(|c| &c.name).collect::<Vec<_>>(),
                self.columns.iter().map(|c| &c.name).collect::<Vec<_>>()
            )));
        }

        for (index, cells) in self.cells.iter_mut().enumerate() {
            cells.push(row.value(index)?.cloned());
        }
        self.rows += 1;
        Ok(())
    }

    /// Build a record batch from the collected rows and start over.
    pub fn finish(&mut self) -> Result<RecordBatch, ConversionError> {
        if self.rows == 0 {
            return Ok(RecordBatch::new_empty(Arc::clone(&self.schema)));
        }

        let mut arrays = Vec::with_capacity(self.columns.len());
        for (index, (column, cells)) in self.columns.iter().zip(&self.cells).enumerate() {
            arrays.push(build_array(&column.data_type, cells, index)?);
        }
        for cells in &mut self.cells {
            cells.clear();
        }
        self.rows = 0;

        Ok(RecordBatch::try_new(Arc::clone(&self.schema), arrays)?)
    }
}

macro_rules! build_primitive {
    ($builder:ty, $cells:expr, $column:expr, $pattern:pat => $value:expr) => {{
        let mut builder = <$builder>::with_capacity($cells.len());
        for (row, cell) in $cells.iter().enumerate() {
            match cell {
                None => builder.append_null(),
                Some($pattern) => builder.append_value($value),
                Some(other) => return Err(unexpected(other, row, $column)),
            }
        }
        Ok(Arc::new(builder.finish()) as ArrayRef)
    }};
}

/// Build an Arrow array for one column of cells.
pub fn build_array(
    data_type: &DataType,
    cells: &[Option<Value>],
    column: usize,
) -> Result<ArrayRef, ConversionError> {
    match data_type {
        DataType::String | DataType::Xml => build_string_array(cells, column),
        DataType::Double => {
            build_primitive!(Float64Builder, cells, column, Value::Double(v) => *v)
        }
        DataType::Int8 => build_primitive!(Int8Builder, cells, column, Value::Int8(v) => *v),
        DataType::UInt8 => build_primitive!(UInt8Builder, cells, column, Value::UInt8(v) => *v),
        DataType::Int16 => build_primitive!(Int16Builder, cells, column, Value::Int16(v) => *v),
        DataType::UInt16 => {
            build_primitive!(UInt16Builder, cells, column, Value::UInt16(v) => *v)
        }
        DataType::Int32 => build_primitive!(Int32Builder, cells, column, Value::Int32(v) => *v),
        DataType::UInt32 => {
            build_primitive!(UInt32Builder, cells, column, Value::UInt32(v) => *v)
        }
        DataType::Int64 => build_primitive!(Int64Builder, cells, column, Value::Int64(v) => *v),
        DataType::UInt64 => {
            build_primitive!(UInt64Builder, cells, column, Value::UInt64(v) => *v)
        }
        DataType::Date => build_primitive!(
            TimestampMicrosecondBuilder,
            cells,
            column,
            Value::Date(v) => v.and_utc().timestamp_micros()
        ),
        DataType::Blob => build_binary_array(cells, column),
    }
}

fn unexpected(value: &Value, row: usize, column: usize) -> ConversionError {
    ConversionError::ValueConversionFailed {
        row,
        column,
        message: format!("Unexpected {} value", value.data_type()),
    }
}

fn build_string_array(cells: &[Option<Value>], column: usize) -> Result<ArrayRef, ConversionError> {
    let bytes = cells
        .iter()
        .map(|cell| match cell {
            Some(Value::String(s)) | Some(Value::Xml(s)) => s.len(),
            _ => 0,
        })
        .sum();
    let mut builder = StringBuilder::with_capacity(cells.len(), bytes);

    for (row, cell) in cells.iter().enumerate() {
        match cell {
            None => builder.append_null(),
            Some(Value::String(s)) | Some(Value::Xml(s)) => builder.append_value(s),
            Some(other) => return Err(unexpected(other, row, column)),
        }
    }

    Ok(Arc::new(builder.finish()))
}

fn build_binary_array(cells: &[Option<Value>], column: usize) -> Result<ArrayRef, ConversionError> {
    let bytes = cells
        .iter()
        .map(|cell| match cell {
            Some(Value::Blob(b)) => b.len(),
            _ => 0,
        })
        .sum();
    let mut builder = BinaryBuilder::with_capacity(cells.len(), bytes);

    for (row, cell) in cells.iter().enumerate() {
        match cell {
            None => builder.append_null(),
            Some(Value::Blob(b)) => builder.append_value(b),
            Some(other) => return Err(unexpected(other, row, column)),
        }
    }

    Ok(Arc::new(builder.finish()))
}
