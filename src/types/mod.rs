//! Column types, Arrow type mapping and dynamic row values.

mod mapping;
mod schema;
mod value;

pub use mapping::{DataType, TypeMapper, TYPE_METADATA_KEY};
pub use schema::{ColumnProperties, SchemaBuilder};
pub use value::{FromValue, Value};
