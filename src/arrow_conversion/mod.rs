//! Arrow data format conversion utilities.
//!
//! This module turns dynamically described rows fetched through the
//! statement engine into Apache Arrow record batches.

mod builders;

pub use builders::{build_array, RowBatchBuilder};
