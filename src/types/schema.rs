//! Column description and Arrow schema building.

use crate::error::ConversionError;
use crate::types::{DataType, TypeMapper};
use arrow_schema::{Field, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name and type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProperties {
    /// Column name as reported by the backend
    pub name: String,
    /// Column type
    pub data_type: DataType,
}

impl ColumnProperties {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Builder for constructing Arrow schemas from column descriptions.
pub struct SchemaBuilder {
    columns: Vec<ColumnProperties>,
}

impl SchemaBuilder {
    /// Create a new schema builder.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Add a column to the schema.
    pub fn add_column(mut self, column: ColumnProperties) -> Self {
        self.columns.push(column);
        self
    }

    /// Add multiple columns to the schema.
    pub fn add_columns(mut self, columns: impl IntoIterator<Item = ColumnProperties>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Build the Arrow schema.
    ///
    /// Every field is nullable; result columns carry their nullability in
    /// per-row indicators.
    ///
    /// # Errors
    /// Returns `ConversionError::ArrowError` on duplicate column names
    pub fn build(self) -> Result<Schema, ConversionError> {
        let mut seen = HashMap::new();
        let mut fields = Vec::with_capacity(self.columns.len());
        for (index, col) in self.columns.iter().enumerate() {
            if let Some(previous) = seen.insert(col.name.clone(), index) {
                return Err(ConversionError::ArrowError(format!(
                    "Duplicate column name '{}' at positions {} and {}",
                    col.name, previous, index
                )));
            }
            let metadata = TypeMapper::create_field_metadata(&col.data_type);
            fields.push(
                Field::new(&col.name, TypeMapper::to_arrow(&col.data_type), true)
                    .with_metadata(metadata),
            );
        }
        Ok(Schema::new(fields))
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder() {
        let schema = SchemaBuilder::new()
            .add_column(ColumnProperties::new("id", DataType::Int32))
            .add_column(ColumnProperties::new("name", DataType::String))
            .add_column(ColumnProperties::new("doc", DataType::Xml))
            .build()
            .unwrap();

        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(schema.field(1).name(), "name");
        assert!(schema.field(0).is_nullable());
        assert_eq!(
            schema.field(2).metadata().get(crate::types::TYPE_METADATA_KEY),
            Some(&"\"XML\"".to_string())
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = SchemaBuilder::new()
            .add_columns(vec![
                ColumnProperties::new("id", DataType::Int32),
                ColumnProperties::new("id", DataType::Int64),
            ])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_column_properties_serde() {
        let col = ColumnProperties::new("created", DataType::Date);
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["data_type"], "DATE");
    }
}
