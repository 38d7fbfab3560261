use super::session::SqliteSessionBackend;
use super::BACKEND_NAME;
use crate::backend::{BackendFactory, SessionBackend};
use crate::connection::params::{extract_options, parse_bool};
use crate::connection::ConnectionParameters;
use crate::error::{BridgeError, ConnectionError};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const SYNCHRONOUS_VALUES: &[&str] = &["off", "normal", "full", "extra", "0", "1", "2", "3"];

/// Opens SQLite sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackendFactory;

impl BackendFactory for SqliteBackendFactory {
    fn make_session(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Box<dyn SessionBackend>, BridgeError> {
        let options = SqliteOptions::from_params(params)?;
        let conn = options.open()?;
        Ok(Box::new(SqliteSessionBackend::new(conn)))
    }
}

/// Parsed SQLite connect options.
#[derive(Debug, Clone, PartialEq)]
struct SqliteOptions {
    path: String,
    timeout: Option<Duration>,
    readonly: bool,
    synchronous: Option<String>,
    foreign_keys: Option<bool>,
}

impl SqliteOptions {
    fn from_params(params: &ConnectionParameters) -> Result<Self, ConnectionError> {
        let connect = params.connect_string().trim();
        let mut pairs = if connect.contains('=') {
            extract_options(connect)?
        } else {
            HashMap::new()
        };
        for (name, value) in params.options() {
            pairs.entry(name.clone()).or_insert_with(|| value.clone());
        }

        let path = if connect.is_empty() || connect.contains('=') {
            pairs
                .get("db")
                .or_else(|| pairs.get("dbname"))
                .cloned()
                .ok_or_else(|| ConnectionError::InvalidParameter {
                    parameter: "db".to_string(),
                    message: "No database file specified".to_string(),
                })?
        } else {
            connect.to_string()
        };

        let timeout = match pairs.get("timeout") {
            Some(value) => Some(Duration::from_secs(value.trim().parse::<u64>().map_err(
                |_| ConnectionError::InvalidParameter {
                    parameter: "timeout".to_string(),
                    message: format!("'{}' is not a number of seconds", value),
                },
            )?)),
            None => None,
        };

        let readonly = match pairs.get("readonly") {
            Some(value) => parse_bool(value)?,
            None => false,
        };

        let synchronous = match pairs.get("synchronous") {
            Some(value) => {
                let lowered = value.to_ascii_lowercase();
                if !SYNCHRONOUS_VALUES.contains(&lowered.as_str()) {
                    return Err(ConnectionError::InvalidParameter {
                        parameter: "synchronous".to_string(),
                        message: format!("'{}' is not a valid synchronous mode", value),
                    });
                }
                Some(lowered)
            }
            None => None,
        };

        let foreign_keys = pairs
            .get("foreign_keys")
            .map(|value| parse_bool(value))
            .transpose()?;

        Ok(Self {
            path,
            timeout,
            readonly,
            synchronous,
            foreign_keys,
        })
    }

    fn open(&self) -> Result<Connection, BridgeError> {
        let flags = if self.readonly {
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(&self.path, flags)?;

        if let Some(timeout) = self.timeout {
            conn.busy_timeout(timeout)?;
        }
        if let Some(mode) = &self.synchronous {
            conn.execute_batch(&format!("PRAGMA synchronous = {}", mode))?;
        }
        if let Some(enabled) = self.foreign_keys {
            conn.execute_batch(if enabled {
                "PRAGMA foreign_keys = ON"
            } else {
                "PRAGMA foreign_keys = OFF"
            })?;
        }

        debug!(backend = BACKEND_NAME, path = %self.path, readonly = self.readonly, "opened database");
        Ok(conn)
    }
}
