//! Statements and value exchange.
//!
//! # Overview
//!
//! The query module is organized into:
//! - `binding` - into/use bindings between application storage and a statement
//! - `rewrite` - named-parameter rewriting
//! - `row` - dynamically described result rows
//! - `statement` - preparation and the execute/fetch protocol
//!
//! # Example
//!
//! ```no_run
//! use sqlbridge::query::{into_vec, use_value};
//! use sqlbridge::{BackendRegistry, ConnectionParameters, Session};
//! use std::cell::RefCell;
//!
//! # fn example() -> Result<(), sqlbridge::BridgeError> {
//! let params = ConnectionParameters::new("sqlite3", ":memory:");
//! let session = Session::connect(&BackendRegistry::with_builtin(), &params)?;
//!
//! let names = RefCell::new(vec![String::new(); 100]);
//! let mut st = session.prepare("select name from person")?;
//! st.exchange(into_vec(&names));
//! st.execute(true)?;
//! loop {
//!     for name in names.borrow().iter() {
//!         println!("{}", name);
//!     }
//!     if !st.fetch()? {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod binding;
pub mod rewrite;
mod row;
mod statement;

pub use binding::{
    into_row, into_value, into_value_ind, into_vec, into_vec_ind, use_value, use_value_ind,
    use_vec, use_vec_ind, Binding, IntoBinding, UseBinding,
};
pub use rewrite::rewrite_named_parameters;
pub use row::Row;
pub use statement::{Statement, StatementState};
