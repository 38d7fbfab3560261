//! Common test utilities for sqlbridge integration tests.
//!
//! # Scripted backend
//!
//! [`ScriptedFactory`] opens sessions whose statements serve a fixed result
//! set and record every backend call in a shared [`CallLog`]. Engine tests
//! use it to check the execute/fetch protocol without a database.
//!
//! # SQLite helpers
//!
//! [`sqlite_session`] opens a private in-memory SQLite database.

#![allow(dead_code)]

use parking_lot::Mutex;
use sqlbridge::backend::{
    BackendFactory, BlobBackend, ExecFetchResult, PlaceholderStyle, PreparedQuery, RowIdBackend,
    SessionBackend, StandardIntoBackend, StandardUseBackend, StatementBackend, StatementKind,
    VectorIntoBackend, VectorUseBackend,
};
use sqlbridge::backend::sqlite::BACKEND_NAME;
use sqlbridge::exchange::convert::{
    record_no_data, record_null, record_outcome, store, to_native, NativeValue,
};
use sqlbridge::exchange::{ExchangeType, Indicator, IntoData, UseData};
use sqlbridge::{BackendRegistry, BridgeError, ConnectionParameters, DataType, Session};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Backend calls in order of arrival.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Result set served by every statement of a scripted session.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub columns: Vec<(DataType, String)>,
    pub rows: Vec<Vec<NativeValue>>,
    /// Report no columns until the statement has executed
    pub describe_after_execute: bool,
    pub placeholder_style: Option<PlaceholderStyle>,
    pub affected_rows: u64,
}

impl Script {
    /// One integer column holding `values`.
    pub fn integers(name: &str, values: &[i64]) -> Self {
        Self {
            columns: vec![(DataType::Int64, name.to_string())],
            rows: values.iter().map(|v| vec![NativeValue::Integer(*v)]).collect(),
            ..Default::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<NativeValue>>) -> Self {
        self.rows = rows;
        self
    }
}

pub struct ScriptedFactory {
    script: Script,
    log: CallLog,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: CallLog::default(),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl BackendFactory for ScriptedFactory {
    fn make_session(
        &self,
        _params: &ConnectionParameters,
    ) -> Result<Box<dyn SessionBackend>, BridgeError> {
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            log: self.log.clone(),
        }))
    }
}

/// Open a session on a scripted backend. Returns the session and its log.
pub fn scripted_session(script: Script) -> (Session, CallLog) {
    let factory = Arc::new(ScriptedFactory::new(script));
    let log = factory.log();
    let session = Session::new();
    session
        .open_with_factory(factory, &ConnectionParameters::new("scripted", ""))
        .unwrap();
    (session, log)
}

/// Open a private in-memory SQLite session.
pub fn sqlite_session() -> Session {
    let params = ConnectionParameters::new(BACKEND_NAME, ":memory:");
    Session::connect(&BackendRegistry::with_builtin(), &params).unwrap()
}

/// Open an in-memory SQLite session and run the `;`-separated `setup`
/// statements on it.
pub fn sqlite_session_with(setup: &str) -> Session {
    let session = sqlite_session();
    for sql in setup.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        session.once(sql, []).unwrap();
    }
    session
}

/// Entries of `log` that start with `prefix`.
pub fn calls(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

struct ScriptedSession {
    script: Script,
    log: CallLog,
}

impl SessionBackend for ScriptedSession {
    fn begin(&self) -> Result<(), BridgeError> {
        self.log.lock().push("begin".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<(), BridgeError> {
        self.log.lock().push("commit".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<(), BridgeError> {
        self.log.lock().push("rollback".to_string());
        Ok(())
    }

    fn backend_name(&self) -> String {
        "scripted".to_string()
    }

    fn make_statement_backend(&self) -> Result<Box<dyn StatementBackend>, BridgeError> {
        Ok(Box::new(ScriptedStatement {
            script: self.script.clone(),
            log: self.log.clone(),
            state: Rc::new(RefCell::new(Cursor::default())),
            executed: false,
        }))
    }

    fn make_rowid_backend(&self) -> Result<Box<dyn RowIdBackend>, BridgeError> {
        Ok(Box::new(ScriptedRowId))
    }

    fn make_blob_backend(&self) -> Result<Box<dyn BlobBackend>, BridgeError> {
        Ok(Box::new(ScriptedBlob::default()))
    }
}

#[derive(Default)]
struct Cursor {
    rows: Vec<Vec<NativeValue>>,
    next: usize,
    start: usize,
    len: usize,
    used: Vec<Vec<NativeValue>>,
}

struct ScriptedStatement {
    script: Script,
    log: CallLog,
    state: Rc<RefCell<Cursor>>,
    executed: bool,
}

impl ScriptedStatement {
    fn record(&self, call: String) {
        self.log.lock().push(call);
    }

    fn deliver(&mut self, rows: usize) -> ExecFetchResult {
        let mut state = self.state.borrow_mut();
        let count = rows.min(state.rows.len() - state.next);
        state.start = state.next;
        state.len = count;
        state.next += count;
        if count == rows {
            ExecFetchResult::Success
        } else {
            ExecFetchResult::NoData
        }
    }
}

impl StatementBackend for ScriptedStatement {
    fn alloc(&mut self) -> Result<(), BridgeError> {
        self.record("alloc".to_string());
        Ok(())
    }

    fn clean_up(&mut self) {
        self.record("clean_up".to_string());
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.script
            .placeholder_style
            .unwrap_or(PlaceholderStyle::Question)
    }

    fn prepare(&mut self, query: &PreparedQuery, _kind: StatementKind) -> Result<(), BridgeError> {
        self.record(format!("prepare:{}", query.text));
        Ok(())
    }

    fn execute(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError> {
        self.record(format!("execute({})", rows));
        self.executed = true;
        {
            let mut state = self.state.borrow_mut();
            state.rows = self.script.rows.clone();
            state.next = 0;
            state.len = 0;
        }
        if rows == 0 {
            return Ok(if self.script.rows.is_empty() {
                ExecFetchResult::NoData
            } else {
                ExecFetchResult::Success
            });
        }
        Ok(self.deliver(rows))
    }

    fn fetch(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError> {
        self.record(format!("fetch({})", rows));
        Ok(self.deliver(rows))
    }

    fn number_of_rows(&self) -> usize {
        self.state.borrow().len
    }

    fn affected_rows(&self) -> Result<u64, BridgeError> {
        Ok(self.script.affected_rows)
    }

    fn prepare_for_describe(&mut self) -> Result<usize, BridgeError> {
        self.record("describe".to_string());
        if self.script.describe_after_execute && !self.executed {
            return Ok(0);
        }
        Ok(self.script.columns.len())
    }

    fn describe_column(&mut self, index: usize) -> Result<(DataType, String), BridgeError> {
        Ok(self.script.columns[index - 1].clone())
    }

    fn make_into_backend(&mut self) -> Result<Box<dyn StandardIntoBackend>, BridgeError> {
        Ok(Box::new(ScriptedInto {
            state: self.state.clone(),
            log: self.log.clone(),
            column: 0,
        }))
    }

    fn make_vector_into_backend(&mut self) -> Result<Box<dyn VectorIntoBackend>, BridgeError> {
        Ok(Box::new(ScriptedInto {
            state: self.state.clone(),
            log: self.log.clone(),
            column: 0,
        }))
    }

    fn make_use_backend(&mut self) -> Result<Box<dyn StandardUseBackend>, BridgeError> {
        Ok(Box::new(ScriptedUse {
            state: self.state.clone(),
            log: self.log.clone(),
            slot: 0,
        }))
    }

    fn make_vector_use_backend(&mut self) -> Result<Box<dyn VectorUseBackend>, BridgeError> {
        Ok(Box::new(ScriptedUse {
            state: self.state.clone(),
            log: self.log.clone(),
            slot: 0,
        }))
    }
}

struct ScriptedInto {
    state: Rc<RefCell<Cursor>>,
    log: CallLog,
    column: usize,
}

impl ScriptedInto {
    fn write(
        &self,
        offset: usize,
        mut target: IntoData<'_>,
        indicator: Option<&mut Indicator>,
    ) -> Result<(), BridgeError> {
        let state = self.state.borrow();
        let value = &state.rows[state.start + offset][self.column];
        if value.is_null() {
            return record_null(indicator, self.column + 1);
        }
        let stored = store(value, &mut target)?;
        record_outcome(stored, indicator, self.column + 1)
    }

    fn define(&mut self, position: &mut usize, exchange_type: ExchangeType) {
        self.log
            .lock()
            .push(format!("define:{}:{}", *position, exchange_type));
        self.column = *position - 1;
        *position += 1;
    }
}

impl StandardIntoBackend for ScriptedInto {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.define(position, exchange_type);
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn post_fetch(
        &mut self,
        got_data: bool,
        called_from_fetch: bool,
        target: IntoData<'_>,
        indicator: Option<&mut Indicator>,
    ) -> Result<(), BridgeError> {
        self.log
            .lock()
            .push(format!("post_fetch({},{})", got_data, called_from_fetch));
        if !got_data {
            if called_from_fetch {
                return Ok(());
            }
            return record_no_data(indicator, self.column + 1);
        }
        self.write(0, target, indicator)
    }

    fn clean_up(&mut self) {}
}

impl VectorIntoBackend for ScriptedInto {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.define(position, exchange_type);
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn post_fetch(
        &mut self,
        got_data: bool,
        targets: &mut [IntoData<'_>],
        mut indicators: Option<&mut [Indicator]>,
    ) -> Result<(), BridgeError> {
        self.log
            .lock()
            .push(format!("vector_post_fetch({},{})", got_data, targets.len()));
        if !got_data {
            return Ok(());
        }
        let rows = self.state.borrow().len;
        for offset in 0..rows.min(targets.len()) {
            let indicator = indicators
                .as_deref_mut()
                .and_then(|inds| inds.get_mut(offset));
            let target = reborrow(&mut targets[offset]);
            self.write(offset, target, indicator)?;
        }
        Ok(())
    }

    fn clean_up(&mut self) {}
}

fn reborrow<'t>(target: &'t mut IntoData<'_>) -> IntoData<'t> {
    match target {
        IntoData::Char(v) => IntoData::Char(v),
        IntoData::CString(v) => IntoData::CString(v),
        IntoData::String(v) => IntoData::String(v),
        IntoData::Int8(v) => IntoData::Int8(v),
        IntoData::UInt8(v) => IntoData::UInt8(v),
        IntoData::Int16(v) => IntoData::Int16(v),
        IntoData::UInt16(v) => IntoData::UInt16(v),
        IntoData::Int32(v) => IntoData::Int32(v),
        IntoData::UInt32(v) => IntoData::UInt32(v),
        IntoData::Int64(v) => IntoData::Int64(v),
        IntoData::UInt64(v) => IntoData::UInt64(v),
        IntoData::Double(v) => IntoData::Double(v),
        IntoData::DateTime(v) => IntoData::DateTime(v),
        IntoData::Blob(v) => IntoData::Blob(v),
        IntoData::RowId(v) => IntoData::RowId(v),
        IntoData::Statement(v) => IntoData::Statement(v),
    }
}

struct ScriptedUse {
    state: Rc<RefCell<Cursor>>,
    log: CallLog,
    slot: usize,
}

impl ScriptedUse {
    fn bind(&mut self, label: String) {
        self.log.lock().push(format!("bind:{}", label));
        let mut state = self.state.borrow_mut();
        state.used.push(Vec::new());
        self.slot = state.used.len() - 1;
    }

    fn capture(&self, values: Vec<NativeValue>) {
        self.log.lock().push("pre_use".to_string());
        self.state.borrow_mut().used[self.slot] = values;
    }
}

fn native(value: &UseData<'_>, indicator: Option<Indicator>) -> Result<NativeValue, BridgeError> {
    if indicator == Some(Indicator::Null) {
        Ok(NativeValue::Null)
    } else {
        to_native(value)
    }
}

impl StandardUseBackend for ScriptedUse {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        _exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.bind(position.to_string());
        *position += 1;
        Ok(())
    }

    fn bind_by_name(&mut self, name: &str, _exchange_type: ExchangeType) -> Result<(), BridgeError> {
        self.bind(name.to_string());
        Ok(())
    }

    fn pre_use(&mut self, value: UseData<'_>, indicator: Option<Indicator>) -> Result<(), BridgeError> {
        self.capture(vec![native(&value, indicator)?]);
        Ok(())
    }

    fn post_use(&mut self, got_data: bool, _indicator: Option<&mut Indicator>) -> Result<(), BridgeError> {
        self.log.lock().push(format!("post_use({})", got_data));
        Ok(())
    }

    fn clean_up(&mut self) {}
}

impl VectorUseBackend for ScriptedUse {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        _exchange_type: ExchangeType,
    ) -> Result<(), BridgeError> {
        self.bind(position.to_string());
        *position += 1;
        Ok(())
    }

    fn bind_by_name(&mut self, name: &str, _exchange_type: ExchangeType) -> Result<(), BridgeError> {
        self.bind(name.to_string());
        Ok(())
    }

    fn pre_use(
        &mut self,
        values: &[UseData<'_>],
        indicators: Option<&[Indicator]>,
    ) -> Result<(), BridgeError> {
        let natives = values
            .iter()
            .enumerate()
            .map(|(i, v)| native(v, indicators.map(|inds| inds[i])))
            .collect::<Result<Vec<_>, _>>()?;
        self.capture(natives);
        Ok(())
    }

    fn clean_up(&mut self) {}
}

struct ScriptedRowId;

impl RowIdBackend for ScriptedRowId {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct ScriptedBlob {
    data: Vec<u8>,
}

impl BlobBackend for ScriptedBlob {
    fn len(&self) -> Result<usize, BridgeError> {
        Ok(self.data.len())
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
        if offset >= self.data.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.data.len() - offset);
        buf[..count].copy_from_slice(&self.data[offset..offset + count]);
        Ok(count)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BridgeError> {
        if self.data.len() < offset + data.len() {
            self.data.resize(offset + data.len(), 0);
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn append(&mut self, data: &[u8]) -> Result<usize, BridgeError> {
        self.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn trim(&mut self, new_len: usize) -> Result<(), BridgeError> {
        self.data.truncate(new_len);
        Ok(())
    }
}
