//! Dynamically described result rows.

use crate::error::ConversionError;
use crate::exchange::Indicator;
use crate::types::{ColumnProperties, FromValue, Value};
use std::collections::HashMap;

/// One result row whose shape is discovered when the statement executes.
///
/// Bind with [`into_row`](crate::query::into_row); after each successful
/// fetch the row holds one value and one indicator per column.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<ColumnProperties>,
    values: Vec<Value>,
    indicators: Vec<Indicator>,
    index: HashMap<String, usize>,
    uppercase_names: bool,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of columns.
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnProperties] {
        &self.columns
    }

    /// Properties of the 0-based column `index`.
    pub fn properties(&self, index: usize) -> Result<&ColumnProperties, ConversionError> {
        self.columns
            .get(index)
            .ok_or_else(|| ConversionError::ColumnNotFound(index.to_string()))
    }

    pub fn properties_by_name(&self, name: &str) -> Result<&ColumnProperties, ConversionError> {
        self.properties(self.find_column(name)?)
    }

    /// Position of the column called `name`.
    pub fn find_column(&self, name: &str) -> Result<usize, ConversionError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ConversionError::ColumnNotFound(format!("'{}'", name)))
    }

    pub fn indicator(&self, index: usize) -> Result<Indicator, ConversionError> {
        self.indicators
            .get(index)
            .copied()
            .ok_or_else(|| ConversionError::ColumnNotFound(index.to_string()))
    }

    pub fn indicator_by_name(&self, name: &str) -> Result<Indicator, ConversionError> {
        self.indicator(self.find_column(name)?)
    }

    /// The value of column `index`, or `None` when it is NULL or no row was
    /// fetched.
    pub fn value(&self, index: usize) -> Result<Option<&Value>, ConversionError> {
        if matches!(self.indicator(index)?, Indicator::Null | Indicator::NoData) {
            return Ok(None);
        }
        Ok(self.values.get(index))
    }

    /// Typed value of column `index`.
    ///
    /// # Errors
    /// Returns `ConversionError::NullValue` for NULL columns; use
    /// [`Row::get_or`] to substitute a default.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, ConversionError> {
        match self.value(index)? {
            Some(value) => T::from_value(value),
            None => Err(ConversionError::NullValue(self.properties(index)?.name.clone())),
        }
    }

    /// Typed value of column `index`, or `default` when it has no value.
    pub fn get_or<T: FromValue>(&self, index: usize, default: T) -> Result<T, ConversionError> {
        match self.value(index)? {
            Some(value) => T::from_value(value),
            None => Ok(default),
        }
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, ConversionError> {
        self.get(self.find_column(name)?)
    }

    pub(crate) fn set_uppercase_names(&mut self, enabled: bool) {
        self.uppercase_names = enabled;
    }

    pub(crate) fn add_column(&mut self, mut properties: ColumnProperties) {
        if self.uppercase_names {
            properties.name = properties.name.to_uppercase();
        }
        self.index
            .insert(properties.name.clone(), self.columns.len());
        self.values.push(Value::default_for(properties.data_type));
        self.indicators.push(Indicator::Ok);
        self.columns.push(properties);
    }

    pub(crate) fn value_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    pub(crate) fn indicator_mut(&mut self, index: usize) -> Option<&mut Indicator> {
        self.indicators.get_mut(index)
    }

    pub(crate) fn clean_up(&mut self) {
        self.columns.clear();
        self.values.clear();
        self.indicators.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.add_column(ColumnProperties::new("id", DataType::Int32));
        row.add_column(ColumnProperties::new("name", DataType::String));
        *row.value_mut(0).unwrap() = Value::Int32(9);
        *row.value_mut(1).unwrap() = Value::String("Jane".into());
        row
    }

    #[test]
    fn test_row_access() {
        let row = sample_row();
        assert_eq!(row.size(), 2);
        assert_eq!(row.get::<i32>(0).unwrap(), 9);
        assert_eq!(row.get_by_name::<String>("name").unwrap(), "Jane");
        assert_eq!(row.properties(1).unwrap().data_type, DataType::String);
        assert!(row.get::<i32>(5).is_err());
        assert!(row.get_by_name::<i32>("missing").is_err());
    }

    #[test]
    fn test_row_null_handling() {
        let mut row = sample_row();
        *row.indicator_mut(1).unwrap() = Indicator::Null;

        assert_eq!(row.indicator_by_name("name").unwrap(), Indicator::Null);
        assert!(row.value(1).unwrap().is_none());
        assert!(matches!(
            row.get::<String>(1),
            Err(ConversionError::NullValue(name)) if name == "name"
        ));
        assert_eq!(row.get_or(1, "unknown".to_string()).unwrap(), "unknown");
    }

    #[test]
    fn test_row_without_data_has_no_values() {
        let mut row = sample_row();
        *row.indicator_mut(0).unwrap() = Indicator::NoData;

        assert!(row.value(0).unwrap().is_none());
        assert_eq!(row.get_or(0, -1i32).unwrap(), -1);
        assert!(row.get::<i32>(0).is_err());
    }

    #[test]
    fn test_uppercase_names() {
        let mut row = Row::new();
        row.set_uppercase_names(true);
        row.add_column(ColumnProperties::new("id", DataType::Int64));
        assert_eq!(row.find_column("ID").unwrap(), 0);
        assert!(row.find_column("id").is_err());
    }

    #[test]
    fn test_clean_up() {
        let mut row = sample_row();
        row.clean_up();
        assert!(row.is_empty());
        assert!(row.find_column("id").is_err());
    }
}
