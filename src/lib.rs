//! # sqlbridge
//!
//! Backend-agnostic SQL access with typed value exchange.
//!
//! Application variables are bound to statements as *into* targets (query
//! output) or *use* values (query input), one value or a whole vector at a
//! time, with optional [`Indicator`]s for NULL and truncation. Backends plug
//! in through the traits in [`backend`]; a SQLite backend is bundled.
//! Sessions can be shared between threads through a [`ConnectionPool`].
//!
//! ## Example
//!
//! ```no_run
//! use sqlbridge::*;
//! use std::cell::{Cell, RefCell};
//!
//! # fn example() -> Result<(), BridgeError> {
//! let registry = BackendRegistry::with_builtin();
//! let params = ConnectionParameters::new("sqlite3", "db=:memory:");
//! let session = Session::connect(&registry, &params)?;
//!
//! session.once("create table person(id integer, name varchar(20))", [])?;
//! let ids = vec![7, 9];
//! let names = vec!["John".to_string(), "Jane".to_string()];
//! session.once(
//!     "insert into person(id, name) values(:id, :name)",
//!     [
//!         use_vec(&ids).named("id").into(),
//!         use_vec(&names).named("name").into(),
//!     ],
//! )?;
//!
//! let id = RefCell::new(0i32);
//! let name = RefCell::new(String::new());
//! let ind = Cell::new(Indicator::Ok);
//! let min = 8i32;
//! let mut st = session.prepare("select id, name from person where id > :min")?;
//! st.exchange(into_value(&id))
//!     .exchange(into_value_ind(&name, &ind))
//!     .exchange(use_value(&min));
//! st.execute(true)?;
//! while st.got_data() {
//!     println!("{} {}", id.borrow(), name.borrow());
//!     st.fetch()?;
//! }
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod arrow_conversion;
pub mod backend;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod query;
pub mod types;

// Re-export public API
pub use arrow_conversion::RowBatchBuilder;
pub use backend::{BackendFactory, BackendRegistry};
pub use connection::{
    ConnectionParameters, ConnectionParametersBuilder, ConnectionPool, PooledSession, Session,
    Transaction,
};
pub use error::{
    BackendError, BridgeError, ConnectionError, ConversionError, ErrorCategory, PoolError,
    QueryError,
};
pub use exchange::{Blob, CharBuf, Exchange, ExchangeType, Indicator, RowId};
pub use query::{
    into_row, into_value, into_value_ind, into_vec, into_vec_ind, use_value, use_value_ind,
    use_vec, use_vec_ind, Row, Statement, StatementState,
};
pub use types::{ColumnProperties, DataType, FromValue, SchemaBuilder, TypeMapper, Value};
