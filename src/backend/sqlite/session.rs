use super::handles::{SqliteBlobBackend, SqliteRowIdBackend};
use super::statement::SqliteStatementBackend;
use super::BACKEND_NAME;
use crate::backend::{BlobBackend, RowIdBackend, SessionBackend, StatementBackend};
use crate::error::BridgeError;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

/// One SQLite connection.
///
/// Statements share the connection and lock it for the duration of each
/// prepare and execute.
pub struct SqliteSessionBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionBackend {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with the locked connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.conn.lock())
    }
}

impl SessionBackend for SqliteSessionBackend {
    fn begin(&self) -> Result<(), BridgeError> {
        self.conn.lock().execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), BridgeError> {
        self.conn.lock().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), BridgeError> {
        self.conn.lock().execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn backend_name(&self) -> String {
        BACKEND_NAME.to_string()
    }

    fn make_statement_backend(&self) -> Result<Box<dyn StatementBackend>, BridgeError> {
        Ok(Box::new(SqliteStatementBackend::new(self.conn.clone())))
    }

    fn make_rowid_backend(&self) -> Result<Box<dyn RowIdBackend>, BridgeError> {
        Ok(Box::new(SqliteRowIdBackend::default()))
    }

    fn make_blob_backend(&self) -> Result<Box<dyn BlobBackend>, BridgeError> {
        Ok(Box::new(SqliteBlobBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_control() {
        let backend = SqliteSessionBackend::new(Connection::open_in_memory().unwrap());
        backend
            .with_connection(|c| c.execute_batch("create table t(i integer)"))
            .unwrap();

        backend.begin().unwrap();
        backend
            .with_connection(|c| c.execute_batch("insert into t values (1)"))
            .unwrap();
        backend.rollback().unwrap();

        let count: i64 = backend
            .with_connection(|c| c.query_row("select count(*) from t", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 0);

        assert!(backend.commit().is_err());
    }
}
