//! Sessions: one backend connection plus its statements.
//!
//! A session may be opened, closed and reopened. It is shareable between
//! threads only so the pool can hand out `&Session`; statements created from
//! it stay on the thread that created them.

use crate::backend::{
    BackendFactory, BackendRegistry, SessionBackend, StatementBackend, StatementKind,
};
use crate::connection::params::{ConnectionParameters, OPTION_UPPERCASE_COLUMN_NAMES};
use crate::error::{BridgeError, ConnectionError};
use crate::exchange::{Blob, RowId};
use crate::query::{Binding, Statement};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

struct Origin {
    factory: Arc<dyn BackendFactory>,
    params: ConnectionParameters,
}

/// Database session.
pub struct Session {
    /// Backend connection, `None` while closed
    backend: RwLock<Option<Box<dyn SessionBackend>>>,

    /// Factory and parameters of the last successful open, for reconnect
    origin: Mutex<Option<Origin>>,

    /// Upper-case column names of dynamic rows
    uppercase_column_names: AtomicBool,

    /// Transaction active flag
    in_transaction: AtomicBool,

    /// Outcome of the last execute or fetch
    got_data: AtomicBool,

    /// Query preparation counter
    query_count: AtomicU64,

    /// Text of the last prepared query
    last_query: Mutex<String>,
}

impl Session {
    /// Create a closed session.
    pub fn new() -> Self {
        Self {
            backend: RwLock::new(None),
            origin: Mutex::new(None),
            uppercase_column_names: AtomicBool::new(false),
            in_transaction: AtomicBool::new(false),
            got_data: AtomicBool::new(false),
            query_count: AtomicU64::new(0),
            last_query: Mutex::new(String::new()),
        }
    }

    /// Create a session and open it.
    pub fn connect(
        registry: &BackendRegistry,
        params: &ConnectionParameters,
    ) -> Result<Self, BridgeError> {
        let session = Self::new();
        session.open(registry, params)?;
        Ok(session)
    }

    /// Open the session with the backend named in `params`.
    pub fn open(
        &self,
        registry: &BackendRegistry,
        params: &ConnectionParameters,
    ) -> Result<(), BridgeError> {
        let factory = registry.get(params.backend_name())?;
        self.open_with_factory(factory, params)
    }

    /// Open the session with an explicit backend factory.
    pub fn open_with_factory(
        &self,
        factory: Arc<dyn BackendFactory>,
        params: &ConnectionParameters,
    ) -> Result<(), BridgeError> {
        let mut backend = self.backend.write();
        if backend.is_some() {
            return Err(ConnectionError::AlreadyConnected.into());
        }

        let session_backend = factory.make_session(params).map_err(|e| {
            warn!(backend = %params.backend_name(), error = %e, "failed to open session");
            e
        })?;
        debug!(
            backend = %session_backend.backend_name(),
            params = %params,
            "session opened"
        );

        *backend = Some(session_backend);
        self.in_transaction.store(false, Ordering::SeqCst);
        self.uppercase_column_names.store(
            params.is_option_on(OPTION_UPPERCASE_COLUMN_NAMES),
            Ordering::SeqCst,
        );
        *self.origin.lock() = Some(Origin {
            factory,
            params: params.clone(),
        });
        Ok(())
    }

    /// Drop the backend connection. Closing a closed session does nothing.
    pub fn close(&self) {
        if let Some(backend) = self.backend.write().take() {
            debug!(backend = %backend.backend_name(), "session closed");
        }
        self.in_transaction.store(false, Ordering::SeqCst);
    }

    /// Close and open again with the parameters of the last open.
    pub fn reconnect(&self) -> Result<(), BridgeError> {
        let (factory, params) = match &*self.origin.lock() {
            Some(origin) => (origin.factory.clone(), origin.params.clone()),
            None => return Err(ConnectionError::NotConnected.into()),
        };
        self.close();
        self.open_with_factory(factory, &params)
    }

    pub fn is_connected(&self) -> bool {
        self.backend.read().is_some()
    }

    /// Name of the connected backend.
    pub fn backend_name(&self) -> Option<String> {
        self.backend.read().as_deref().map(|b| b.backend_name())
    }

    /// Begin a transaction.
    pub fn begin(&self) -> Result<(), BridgeError> {
        if self.in_transaction() {
            return Err(
                ConnectionError::TransactionError("Transaction already active".to_string()).into(),
            );
        }
        self.with_backend(|backend| backend.begin())?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<(), BridgeError> {
        if !self.in_transaction() {
            return Err(
                ConnectionError::TransactionError("No active transaction".to_string()).into(),
            );
        }
        self.with_backend(|backend| backend.commit())?;
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Roll back the current transaction.
    pub fn rollback(&self) -> Result<(), BridgeError> {
        if !self.in_transaction() {
            return Err(
                ConnectionError::TransactionError("No active transaction".to_string()).into(),
            );
        }
        self.in_transaction.store(false, Ordering::SeqCst);
        self.with_backend(|backend| backend.rollback())
    }

    /// Begin a transaction that rolls back unless committed.
    pub fn transaction(&self) -> Result<Transaction<'_>, BridgeError> {
        Transaction::new(self)
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    /// Prepare a repeatable statement.
    pub fn prepare(&self, query: &str) -> Result<Statement<'_>, BridgeError> {
        let mut statement = Statement::new(self);
        statement.prepare(query, StatementKind::Repeatable)?;
        Ok(statement)
    }

    /// Create an unprepared statement.
    pub fn statement(&self) -> Statement<'_> {
        Statement::new(self)
    }

    /// Prepare, bind and execute `query` once, fetching at most the first
    /// batch into the into bindings. Returns whether data was fetched.
    ///
    /// ```no_run
    /// # use sqlbridge::{into_value, use_value, BackendRegistry, ConnectionParameters, Session};
    /// # use std::cell::RefCell;
    /// # fn example() -> Result<(), sqlbridge::BridgeError> {
    /// # let session = Session::connect(&BackendRegistry::with_builtin(),
    /// #     &ConnectionParameters::new("sqlite3", ":memory:"))?;
    /// let count = RefCell::new(0i64);
    /// let min = 18i32;
    /// session.once(
    ///     "select count(*) from person where age >= :min",
    ///     [into_value(&count).into(), use_value(&min).into()],
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn once<'a>(
        &'a self,
        query: &str,
        bindings: impl IntoIterator<Item = Binding<'a>>,
    ) -> Result<bool, BridgeError> {
        let mut statement = Statement::new(self);
        statement.prepare(query, StatementKind::OneTimeQuery)?;
        for binding in bindings {
            statement.exchange(binding);
        }
        statement.define_and_bind()?;
        statement.execute(true)
    }

    /// Create an empty BLOB owned by this session's backend.
    pub fn make_blob(&self) -> Result<Blob, BridgeError> {
        self.with_backend(|backend| Ok(Blob::from_backend(backend.make_blob_backend()?)))
    }

    /// Create an empty row identifier owned by this session's backend.
    pub fn make_rowid(&self) -> Result<RowId, BridgeError> {
        self.with_backend(|backend| Ok(RowId::from_backend(backend.make_rowid_backend()?)))
    }

    /// Text of the last query prepared on this session.
    pub fn last_query(&self) -> String {
        self.last_query.lock().clone()
    }

    /// Number of queries prepared on this session.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Whether the last execute or fetch on this session delivered data.
    pub fn got_data(&self) -> bool {
        self.got_data.load(Ordering::SeqCst)
    }

    pub fn uppercase_column_names(&self) -> bool {
        self.uppercase_column_names.load(Ordering::SeqCst)
    }

    pub fn set_uppercase_column_names(&self, enabled: bool) {
        self.uppercase_column_names.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn set_got_data(&self, got_data: bool) {
        self.got_data.store(got_data, Ordering::SeqCst);
    }

    pub(crate) fn log_query(&self, query: &str) {
        debug!(target: "sqlbridge::query", query, "preparing query");
        *self.last_query.lock() = query.to_string();
        self.query_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn make_statement_backend(&self) -> Result<Box<dyn StatementBackend>, BridgeError> {
        self.with_backend(|backend| backend.make_statement_backend())
    }

    fn with_backend<R>(
        &self,
        f: impl FnOnce(&dyn SessionBackend) -> Result<R, BridgeError>,
    ) -> Result<R, BridgeError> {
        let guard = self.backend.read();
        let backend = guard.as_deref().ok_or(ConnectionError::NotConnected)?;
        f(backend)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend_name())
            .field("in_transaction", &self.in_transaction())
            .field("query_count", &self.query_count())
            .finish()
    }
}

/// Transaction scope. Rolls back on drop unless committed or rolled back.
pub struct Transaction<'s> {
    session: &'s Session,
    handled: bool,
}

impl<'s> Transaction<'s> {
    /// Begin a transaction on `session`.
    pub fn new(session: &'s Session) -> Result<Self, BridgeError> {
        session.begin()?;
        Ok(Self {
            session,
            handled: false,
        })
    }

    pub fn commit(mut self) -> Result<(), BridgeError> {
        self.handled = true;
        self.session.commit()
    }

    pub fn rollback(mut self) -> Result<(), BridgeError> {
        self.handled = true;
        self.session.rollback()
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.handled && self.session.in_transaction() {
            if let Err(e) = self.session.rollback() {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}
