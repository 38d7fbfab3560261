//! Statement preparation, binding and the execute/fetch protocol.
//!
//! A statement owns one backend statement handle and the into/use bindings
//! attached to it. Execution drives the bindings through
//! `pre_use -> execute -> post_fetch -> post_use`, and every later fetch
//! through `pre_fetch -> fetch -> post_fetch`.

use crate::backend::{ExecFetchResult, PreparedQuery, StatementBackend, StatementKind};
use crate::connection::Session;
use crate::error::{BridgeError, QueryError};
use crate::query::binding::{Binding, IntoElement, IntoKind, RowColumnInto, RowMarker, UseElement};
use crate::query::rewrite::rewrite_named_parameters;
use crate::query::Row;
use crate::types::{ColumnProperties, DataType};
use std::cell::RefCell;
use tracing::{trace, warn};

/// Lifecycle of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// No query prepared yet
    Unprepared,
    /// Query prepared, bindings not yet defined
    Prepared,
    /// Bindings defined and bound
    Bound,
    /// Executed; rows may be pending
    Executed,
    /// At least one fetch returned data
    Fetching,
    /// The rowset is exhausted
    Exhausted,
}

/// A prepared SQL statement with its bindings.
///
/// # Example
///
/// ```no_run
/// # use sqlbridge::{into_value, use_value, BackendRegistry, ConnectionParameters, Session};
/// # use std::cell::RefCell;
/// # fn example() -> Result<(), sqlbridge::BridgeError> {
/// let params = ConnectionParameters::new("sqlite3", ":memory:");
/// let session = Session::connect(&BackendRegistry::with_builtin(), &params)?;
///
/// let id = RefCell::new(0i32);
/// let min = 5i32;
/// let mut st = session.prepare("select id from person where id > :min")?;
/// st.exchange(into_value(&id)).exchange(use_value(&min));
/// st.define_and_bind()?;
/// st.execute(true)?;
/// while st.got_data() {
///     println!("{}", id.borrow());
///     st.fetch()?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Statement<'a> {
    session: &'a Session,
    backend: Option<Box<dyn StatementBackend>>,
    query: String,
    prepared: PreparedQuery,
    state: StatementState,

    intos: Vec<Box<dyn IntoElement + 'a>>,
    intos_for_row: Vec<Box<dyn IntoElement + 'a>>,
    uses: Vec<Box<dyn UseElement + 'a>>,
    row: Option<&'a RefCell<Row>>,
    duplicate_row: bool,

    defined_intos: usize,
    bound_uses: usize,
    into_position: usize,
    use_position: usize,
    described: bool,

    initial_fetch_size: usize,
    fetch_size: usize,
    got_data: bool,
}

impl<'a> Statement<'a> {
    /// Create an unprepared statement on `session`.
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            backend: None,
            query: String::new(),
            prepared: PreparedQuery::default(),
            state: StatementState::Unprepared,
            intos: Vec::new(),
            intos_for_row: Vec::new(),
            uses: Vec::new(),
            row: None,
            duplicate_row: false,
            defined_intos: 0,
            bound_uses: 0,
            into_position: 1,
            use_position: 1,
            described: false,
            initial_fetch_size: 0,
            fetch_size: 0,
            got_data: false,
        }
    }

    /// Allocate a backend statement and prepare `query`.
    ///
    /// Named parameters (`:name`) are rewritten to the backend's placeholder
    /// syntax first.
    pub fn prepare(&mut self, query: &str, kind: StatementKind) -> Result<(), BridgeError> {
        if self.state != StatementState::Unprepared {
            return Err(QueryError::InvalidState("statement is already prepared".to_string()).into());
        }
        self.query = query.to_string();
        self.prepare_backend(kind)
            .map_err(|e| self.fail(e, "preparing"))
    }

    fn prepare_backend(&mut self, kind: StatementKind) -> Result<(), BridgeError> {
        let mut backend = self.session.make_statement_backend()?;
        backend.alloc()?;
        let prepared = rewrite_named_parameters(&self.query, backend.placeholder_style());
        self.session.log_query(&self.query);

        if let Err(e) = backend.prepare(&prepared, kind) {
            backend.clean_up();
            return Err(e);
        }

        self.prepared = prepared;
        self.backend = Some(backend);
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Attach an into or use binding. Bindings are defined on the next
    /// [`define_and_bind`](Self::define_and_bind) or execution.
    pub fn exchange(&mut self, binding: impl Into<Binding<'a>>) -> &mut Self {
        match binding.into() {
            Binding::Into(into) => match into.kind {
                IntoKind::Element(element) => self.intos.push(element),
                IntoKind::Row(row) => {
                    if self.row.is_some() {
                        self.duplicate_row = true;
                    } else {
                        self.row = Some(row);
                        self.intos.push(Box::new(RowMarker));
                    }
                }
            },
            Binding::Use(binding) => self.uses.push(binding.element),
        }
        self
    }

    /// Define all pending into bindings and bind all pending use bindings.
    pub fn define_and_bind(&mut self) -> Result<(), BridgeError> {
        self.bind_pending().map_err(|e| self.fail(e, "binding"))
    }

    fn bind_pending(&mut self) -> Result<(), BridgeError> {
        if self.duplicate_row {
            return Err(QueryError::DuplicateRow.into());
        }
        self.check_named_uses()?;

        let backend = self
            .backend
            .as_deref_mut()
            .ok_or_else(|| QueryError::InvalidState("statement is not prepared".to_string()))?;

        for element in &mut self.intos[self.defined_intos..] {
            element.define(backend, &mut self.into_position)?;
        }
        self.defined_intos = self.intos.len();

        for element in &mut self.uses[self.bound_uses..] {
            element.bind(backend, &mut self.use_position)?;
        }
        self.bound_uses = self.uses.len();

        if self.state == StatementState::Prepared {
            self.state = StatementState::Bound;
        }
        Ok(())
    }

    fn check_named_uses(&self) -> Result<(), BridgeError> {
        let named = self.uses.iter().filter(|u| u.name().is_some()).count();
        if named == 0 {
            return Ok(());
        }
        if named != self.uses.len() {
            return Err(QueryError::MixedBinding.into());
        }
        for name in self.uses.iter().filter_map(|u| u.name()) {
            if !self.prepared.names.iter().any(|n| n == name) {
                return Err(QueryError::UnknownParameter(name.to_string()).into());
            }
        }
        Ok(())
    }

    /// Execute the statement.
    ///
    /// With `with_data_exchange`, the first batch of rows is fetched into the
    /// into bindings immediately. Returns whether data was fetched.
    pub fn execute(&mut self, with_data_exchange: bool) -> Result<bool, BridgeError> {
        self.execute_inner(with_data_exchange)
            .map_err(|e| self.fail(e, "executing"))
    }

    fn execute_inner(&mut self, with_data_exchange: bool) -> Result<bool, BridgeError> {
        if self.state == StatementState::Unprepared {
            return Err(QueryError::InvalidState("statement is not prepared".to_string()).into());
        }
        self.bind_pending()?;

        self.initial_fetch_size = self.intos_size()?;
        if !self.intos.is_empty() && self.initial_fetch_size == 0 {
            return Err(QueryError::EmptyVector.into());
        }
        self.fetch_size = self.initial_fetch_size;

        self.pre_use()?;
        let bind_size = self.uses_size()?;
        if bind_size > 1 && self.fetch_size > 1 {
            return Err(QueryError::BulkInAndOut.into());
        }

        if self.row.is_some() && !self.described {
            self.describe()?;
        }

        let mut rows = 0;
        if with_data_exchange {
            rows = 1.max(self.fetch_size).max(bind_size);
            self.pre_fetch()?;
        }

        trace!(query = %self.query, rows, bind_size, "executing statement");
        let result = self.backend_mut()?.execute(rows)?;

        // Some backends only know their columns after execution.
        if self.row.is_some() && !self.described {
            self.describe()?;
            if with_data_exchange {
                for element in &mut self.intos_for_row {
                    element.pre_fetch()?;
                }
            }
        }

        let got_data = match result {
            ExecFetchResult::Success => {
                if rows > 0 {
                    self.resize_intos(rows)?;
                    true
                } else {
                    false
                }
            }
            ExecFetchResult::NoData => {
                if self.fetch_size > 1 {
                    self.resize_intos(0)?
                } else {
                    false
                }
            }
        };

        if rows > 0 {
            self.post_fetch(got_data, false)?;
        }
        self.post_use(got_data)?;

        self.got_data = got_data;
        self.session.set_got_data(got_data);
        self.state = StatementState::Executed;
        Ok(got_data)
    }

    /// Fetch the next batch of rows into the into bindings.
    ///
    /// Returns `false` once the rowset is exhausted. Into vectors are
    /// shortened to the rows read; they may shrink between fetches but never
    /// grow beyond the size they had at execution.
    pub fn fetch(&mut self) -> Result<bool, BridgeError> {
        self.fetch_inner().map_err(|e| self.fail(e, "fetching"))
    }

    fn fetch_inner(&mut self) -> Result<bool, BridgeError> {
        match self.state {
            StatementState::Executed | StatementState::Fetching => {}
            StatementState::Exhausted => {
                self.set_got_data(false);
                return Ok(false);
            }
            _ => {
                return Err(
                    QueryError::InvalidState("statement has not been executed".to_string()).into(),
                )
            }
        }

        if self.fetch_size == 0 {
            self.resize_intos_to(0)?;
            self.set_got_data(false);
            self.state = StatementState::Exhausted;
            return Ok(false);
        }

        let new_fetch_size = self.intos_size()?;
        if new_fetch_size > self.initial_fetch_size {
            return Err(QueryError::IntoVectorGrew.into());
        }
        if new_fetch_size == 0 {
            self.set_got_data(false);
            self.state = StatementState::Exhausted;
            return Ok(false);
        }
        self.fetch_size = new_fetch_size;

        self.pre_fetch()?;
        let fetch_size = self.fetch_size;
        let result = self.backend_mut()?.fetch(fetch_size)?;

        let got_data = match result {
            ExecFetchResult::Success => {
                self.resize_intos(fetch_size)?;
                true
            }
            ExecFetchResult::NoData => {
                if fetch_size > 1 {
                    let got_data = self.resize_intos(0)?;
                    self.fetch_size = 0;
                    got_data
                } else {
                    self.resize_intos_to(0)?;
                    false
                }
            }
        };

        self.post_fetch(got_data, true)?;
        self.set_got_data(got_data);
        self.state = if got_data {
            StatementState::Fetching
        } else {
            StatementState::Exhausted
        };
        Ok(got_data)
    }

    /// Whether the last execute or fetch delivered data.
    pub fn got_data(&self) -> bool {
        self.got_data
    }

    /// Rows changed by the last DML execution.
    pub fn affected_rows(&self) -> Result<u64, BridgeError> {
        let backend = self
            .backend
            .as_deref()
            .ok_or_else(|| QueryError::InvalidState("statement is not prepared".to_string()))?;
        backend
            .affected_rows()
            .map_err(|e| self.fail(e, "getting the number of rows affected by"))
    }

    /// Query text as given by the application.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Query text after named-parameter rewriting.
    pub fn prepared_query(&self) -> &PreparedQuery {
        &self.prepared
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Release all bindings and the backend statement. The statement can be
    /// prepared again afterwards. Calling this twice is harmless.
    pub fn clean_up(&mut self) {
        for element in self
            .intos
            .iter_mut()
            .chain(self.intos_for_row.iter_mut())
        {
            element.clean_up();
        }
        for element in &mut self.uses {
            element.clean_up();
        }
        self.intos.clear();
        self.intos_for_row.clear();
        self.uses.clear();
        self.row = None;
        self.duplicate_row = false;
        self.defined_intos = 0;
        self.bound_uses = 0;
        self.into_position = 1;
        self.use_position = 1;
        self.described = false;
        self.initial_fetch_size = 0;
        self.fetch_size = 0;
        self.got_data = false;

        if let Some(mut backend) = self.backend.take() {
            backend.clean_up();
        }
        self.prepared = PreparedQuery::default();
        self.state = StatementState::Unprepared;
    }

    fn backend_mut(&mut self) -> Result<&mut dyn StatementBackend, BridgeError> {
        match self.backend.as_deref_mut() {
            Some(backend) => Ok(backend),
            None => Err(QueryError::InvalidState("statement is not prepared".to_string()).into()),
        }
    }

    fn set_got_data(&mut self, got_data: bool) {
        self.got_data = got_data;
        self.session.set_got_data(got_data);
    }

    fn fail(&self, err: BridgeError, operation: &'static str) -> BridgeError {
        if matches!(err, BridgeError::Backend(_)) {
            warn!(query = %self.query, error = %err, "backend error while {}", operation);
        }
        err.in_statement(operation, &self.query)
    }

    fn intos_size(&self) -> Result<usize, BridgeError> {
        let mut expected = 0;
        for (index, element) in self.intos.iter().enumerate() {
            let size = element.size()?;
            if index == 0 {
                expected = size;
            } else if size != expected {
                return Err(QueryError::VectorSizeMismatch {
                    kind: "into",
                    index,
                    size,
                    expected,
                }
                .into());
            }
        }
        Ok(expected)
    }

    fn uses_size(&self) -> Result<usize, BridgeError> {
        let mut expected = 0;
        for (index, element) in self.uses.iter().enumerate() {
            let size = element.size();
            if index == 0 {
                if size == 0 {
                    return Err(QueryError::EmptyVector.into());
                }
                expected = size;
            } else if size != expected {
                return Err(QueryError::VectorSizeMismatch {
                    kind: "use",
                    index,
                    size,
                    expected,
                }
                .into());
            }
        }
        Ok(expected)
    }

    /// Shrink into vectors to the rows the backend read, capped at `upper`
    /// when it is non-zero. Returns whether any row was read.
    fn resize_intos(&mut self, upper: usize) -> Result<bool, BridgeError> {
        let mut rows = self.backend_mut()?.number_of_rows();
        if upper != 0 && upper < rows {
            rows = upper;
        }
        self.resize_intos_to(rows)?;
        Ok(rows > 0)
    }

    fn resize_intos_to(&mut self, rows: usize) -> Result<(), BridgeError> {
        for element in &mut self.intos {
            element.resize(rows)?;
        }
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        for element in self
            .intos
            .iter_mut()
            .chain(self.intos_for_row.iter_mut())
        {
            element.pre_fetch()?;
        }
        Ok(())
    }

    fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<(), BridgeError> {
        for element in self
            .intos_for_row
            .iter_mut()
            .chain(self.intos.iter_mut())
        {
            element.post_fetch(got_data, called_from_fetch)?;
        }
        Ok(())
    }

    fn pre_use(&mut self) -> Result<(), BridgeError> {
        for element in &mut self.uses {
            element.pre_use()?;
        }
        Ok(())
    }

    fn post_use(&mut self, got_data: bool) -> Result<(), BridgeError> {
        for element in self.uses.iter_mut().rev() {
            element.post_use(got_data)?;
        }
        Ok(())
    }

    /// Discover the result columns and define one row element per column.
    fn describe(&mut self) -> Result<(), BridgeError> {
        let Some(row) = self.row else {
            return Ok(());
        };
        {
            let mut row = row.try_borrow_mut().map_err(|_| {
                QueryError::InvalidState("row is borrowed elsewhere".to_string())
            })?;
            row.clean_up();
            row.set_uppercase_names(self.session.uppercase_column_names());
        }

        let session = self.session;
        let backend = self
            .backend
            .as_deref_mut()
            .ok_or_else(|| QueryError::InvalidState("statement is not prepared".to_string()))?;

        let columns = backend.prepare_for_describe()?;
        if columns == 0 {
            return Ok(());
        }

        let mut position = self.into_position;
        for index in 1..=columns {
            let (data_type, name) = backend.describe_column(index)?;
            let blob = if data_type == DataType::Blob {
                Some(session.make_blob()?)
            } else {
                None
            };

            row.try_borrow_mut()
                .map_err(|_| QueryError::InvalidState("row is borrowed elsewhere".to_string()))?
                .add_column(ColumnProperties::new(name, data_type));

            let mut element = RowColumnInto::new(row, index - 1, data_type.exchange_type(), blob);
            element.define(backend, &mut position)?;
            self.intos_for_row.push(Box::new(element));
        }

        self.described = true;
        Ok(())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.clean_up();
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query)
            .field("state", &self.state)
            .field("intos", &self.intos.len())
            .field("uses", &self.uses.len())
            .field("got_data", &self.got_data)
            .finish()
    }
}
