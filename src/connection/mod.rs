//! Connection management: parameters, sessions and the session pool.
//!
//! # Example
//!
//! ```no_run
//! # use sqlbridge::connection::{ConnectionParameters, Session};
//! # use sqlbridge::BackendRegistry;
//! # use std::str::FromStr;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Using the builder
//! let params = ConnectionParameters::builder()
//!     .backend("sqlite3")
//!     .connect_string("db=app.db timeout=5")
//!     .uppercase_column_names(false)
//!     .build()?;
//!
//! // Or parse from a connection string
//! let params = ConnectionParameters::from_str("sqlite3://db=app.db timeout=5")?;
//!
//! let session = Session::connect(&BackendRegistry::with_builtin(), &params)?;
//! # Ok(())
//! # }
//! ```

pub mod params;
pub mod pool;
pub mod session;

pub use params::{extract_options, ConnectionParameters, ConnectionParametersBuilder};
pub use pool::{ConnectionPool, PooledSession};
pub use session::{Session, Transaction};
