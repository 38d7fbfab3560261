use super::binders::{
    SqliteIntoBackend, SqliteUseBackend, SqliteVectorIntoBackend, SqliteVectorUseBackend,
};
use super::{data_type_from_decl, data_type_from_value, from_value_ref, to_sql_value};
use crate::backend::{
    ExecFetchResult, PlaceholderStyle, PreparedQuery, StandardIntoBackend, StandardUseBackend,
    StatementBackend, StatementKind, VectorIntoBackend, VectorUseBackend,
};
use crate::error::{BridgeError, QueryError};
use crate::exchange::convert::NativeValue;
use crate::types::DataType;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(super) struct ColumnInfo {
    pub name: String,
    pub decl_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SlotKey {
    Position(usize),
    Name(String),
}

/// Values of one use binding, one per bulk row.
#[derive(Debug)]
pub(super) struct UseSlot {
    pub key: SlotKey,
    pub values: Vec<NativeValue>,
}

/// State shared between a statement and its binders.
#[derive(Debug, Default)]
pub(super) struct StatementData {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<NativeValue>>,
    /// Next unread row
    pub cursor: usize,
    /// First row of the current batch
    pub batch_start: usize,
    /// Rows in the current batch
    pub batch_len: usize,
    pub uses: Vec<UseSlot>,
}

impl StatementData {
    /// Value at `offset` within the current batch.
    pub fn value(&self, offset: usize, column: usize) -> Result<&NativeValue, BridgeError> {
        if offset >= self.batch_len {
            return Err(QueryError::InvalidState(format!(
                "row {} is outside the fetched batch",
                offset
            ))
            .into());
        }
        self.rows
            .get(self.batch_start + offset)
            .and_then(|row| row.get(column))
            .ok_or_else(|| {
                QueryError::InvalidState(format!("column {} is not in the result", column + 1))
                    .into()
            })
    }
}

/// Statement handle of the SQLite backend.
pub struct SqliteStatementBackend {
    conn: Arc<Mutex<Connection>>,
    query: PreparedQuery,
    kind: StatementKind,
    data: Rc<RefCell<StatementData>>,
    affected: u64,
    executed_for_describe: bool,
}

impl SqliteStatementBackend {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            query: PreparedQuery::default(),
            kind: StatementKind::Repeatable,
            data: Rc::new(RefCell::new(StatementData::default())),
            affected: 0,
            executed_for_describe: false,
        }
    }

    /// Run the query once per bulk row and keep the result of the last run.
    fn run(&mut self) -> Result<(), BridgeError> {
        let conn = self.conn.lock();
        let mut data = self.data.borrow_mut();
        let outcome = match self.kind {
            StatementKind::Repeatable => {
                let mut stmt = conn.prepare_cached(&self.query.text)?;
                run_statement(&mut stmt, &self.query.names, &data.uses)?
            }
            StatementKind::OneTimeQuery => {
                let mut stmt = conn.prepare(&self.query.text)?;
                run_statement(&mut stmt, &self.query.names, &data.uses)?
            }
        };

        data.columns = outcome.columns;
        data.rows = outcome.rows;
        data.cursor = 0;
        data.batch_start = 0;
        data.batch_len = 0;
        self.affected = outcome.affected;
        Ok(())
    }

    /// Hand out the next batch of up to `rows` rows.
    fn deliver(&mut self, rows: usize) -> ExecFetchResult {
        let mut data = self.data.borrow_mut();
        let available = data.rows.len() - data.cursor;
        let count = rows.min(available);
        data.batch_start = data.cursor;
        data.batch_len = count;
        data.cursor += count;
        if count == rows {
            ExecFetchResult::Success
        } else {
            ExecFetchResult::NoData
        }
    }
}

struct RunOutcome {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<NativeValue>>,
    affected: u64,
}

fn run_statement(
    stmt: &mut rusqlite::Statement<'_>,
    names: &[String],
    uses: &[UseSlot],
) -> Result<RunOutcome, BridgeError> {
    let columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            decl_type: c.decl_type().map(str::to_string),
        })
        .collect();

    let iterations = uses.iter().map(|u| u.values.len()).max().unwrap_or(1).max(1);
    let mut rows = Vec::new();
    let mut affected = 0u64;

    for iteration in 0..iterations {
        for slot in uses {
            let Some(value) = slot.values.get(iteration) else {
                continue;
            };
            match &slot.key {
                SlotKey::Position(position) => {
                    stmt.raw_bind_parameter(*position, to_sql_value(value))?;
                }
                SlotKey::Name(name) => {
                    for (index, _) in names.iter().enumerate().filter(|(_, n)| *n == name) {
                        stmt.raw_bind_parameter(index + 1, to_sql_value(value))?;
                    }
                }
            }
        }

        if columns.is_empty() {
            affected += stmt.raw_execute()? as u64;
        } else {
            rows.clear();
            let mut result = stmt.raw_query();
            while let Some(row) = result.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for index in 0..columns.len() {
                    values.push(from_value_ref(row.get_ref(index)?));
                }
                rows.push(values);
            }
        }
    }

    Ok(RunOutcome {
        columns,
        rows,
        affected,
    })
}

impl StatementBackend for SqliteStatementBackend {
    fn alloc(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn clean_up(&mut self) {
        let mut data = self.data.borrow_mut();
        data.columns.clear();
        data.rows.clear();
        data.uses.clear();
        data.cursor = 0;
        data.batch_start = 0;
        data.batch_len = 0;
        self.executed_for_describe = false;
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::NumberedQuestion
    }

    fn prepare(&mut self, query: &PreparedQuery, kind: StatementKind) -> Result<(), BridgeError> {
        {
            let conn = self.conn.lock();
            match kind {
                StatementKind::Repeatable => drop(conn.prepare_cached(&query.text)?),
                StatementKind::OneTimeQuery => drop(conn.prepare(&query.text)?),
            }
        }
        self.query = query.clone();
        self.kind = kind;
        Ok(())
    }

    fn execute(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError> {
        if self.executed_for_describe {
            self.executed_for_describe = false;
        } else {
            self.run()?;
        }

        if rows == 0 {
            let has_rows = !self.data.borrow().rows.is_empty();
            return Ok(if has_rows {
                ExecFetchResult::Success
            } else {
                ExecFetchResult::NoData
            });
        }
        Ok(self.deliver(rows))
    }

    fn fetch(&mut self, rows: usize) -> Result<ExecFetchResult, BridgeError> {
        Ok(self.deliver(rows))
    }

    fn number_of_rows(&self) -> usize {
        self.data.borrow().batch_len
    }

    fn affected_rows(&self) -> Result<u64, BridgeError> {
        Ok(self.affected)
    }

    fn prepare_for_describe(&mut self) -> Result<usize, BridgeError> {
        if !self.executed_for_describe {
            self.run()?;
            self.executed_for_describe = true;
        }
        Ok(self.data.borrow().columns.len())
    }

    fn describe_column(&mut self, index: usize) -> Result<(DataType, String), BridgeError> {
        let data = self.data.borrow();
        let column = data.columns.get(index.wrapping_sub(1)).ok_or_else(|| {
            QueryError::InvalidState(format!("column {} is not in the result", index))
        })?;

        let data_type = match column.decl_type.as_deref().and_then(data_type_from_decl) {
            Some(data_type) => data_type,
            None => data_type_from_value(data.rows.first().and_then(|row| row.get(index - 1))),
        };
        Ok((data_type, column.name.clone()))
    }

    fn make_into_backend(&mut self) -> Result<Box<dyn StandardIntoBackend>, BridgeError> {
        Ok(Box::new(SqliteIntoBackend::new(self.data.clone())))
    }

    fn make_vector_into_backend(&mut self) -> Result<Box<dyn VectorIntoBackend>, BridgeError> {
        Ok(Box::new(SqliteVectorIntoBackend::new(self.data.clone())))
    }

    fn make_use_backend(&mut self) -> Result<Box<dyn StandardUseBackend>, BridgeError> {
        Ok(Box::new(SqliteUseBackend::new(self.data.clone())))
    }

    fn make_vector_use_backend(&mut self) -> Result<Box<dyn VectorUseBackend>, BridgeError> {
        Ok(Box::new(SqliteVectorUseBackend::new(self.data.clone())))
    }
}
