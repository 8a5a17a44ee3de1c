//! Minimal row-store seam used by the record modules.
//!
//! Every query returns the same `Record` shape regardless of how the
//! statement was written, so callers read columns by name and get typed
//! values back instead of branching on driver-specific row types.

use crate::error::StorageError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Statement, Transaction};

pub trait RowStore {
    /// Run an insert/update/delete and return the affected row count.
    fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError>;

    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, StorageError>;

    /// All rows in the order the statement produced them.
    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StorageError>;

    /// Id assigned by the most recent successful insert.
    fn last_insert_id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Result<&Value, StorageError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| StorageError::Column {
                column: column.to_string(),
                message: "missing from result row".to_string(),
            })
    }

    pub fn i64(&self, column: &str) -> Result<i64, StorageError> {
        self.opt_i64(column)?
            .ok_or_else(|| type_mismatch(column, "expected integer, found NULL"))
    }

    pub fn opt_i64(&self, column: &str) -> Result<Option<i64>, StorageError> {
        match self.get(column)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            // Some legacy rows carry integral reals in integer columns.
            Value::Real(v) if v.fract() == 0.0 => Ok(Some(*v as i64)),
            _ => Err(type_mismatch(column, "expected integer")),
        }
    }

    /// Numeric column read as f64; integer storage is widened.
    pub fn opt_f64(&self, column: &str) -> Result<Option<f64>, StorageError> {
        match self.get(column)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v as f64)),
            Value::Real(v) => Ok(Some(*v)),
            _ => Err(type_mismatch(column, "expected number")),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, StorageError> {
        self.opt_text(column)?
            .ok_or_else(|| type_mismatch(column, "expected text, found NULL"))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StorageError> {
        match self.get(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            _ => Err(type_mismatch(column, "expected text")),
        }
    }
}

fn type_mismatch(column: &str, message: &str) -> StorageError {
    StorageError::Column {
        column: column.to_string(),
        message: message.to_string(),
    }
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn read_record(columns: &[String], row: &Row<'_>) -> rusqlite::Result<Record> {
    let values = (0..columns.len())
        .map(|i| row.get::<_, Value>(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Record::new(columns.to_vec(), values))
}

impl RowStore for Connection {
    fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError> {
        Ok(self.execute(sql, params_from_iter(params.iter()))?)
    }

    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, StorageError> {
        let mut stmt = self.prepare(sql)?;
        let columns = column_names(&stmt);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        match rows.next()? {
            Some(row) => Ok(Some(read_record(&columns, row)?)),
            None => Ok(None),
        }
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StorageError> {
        let mut stmt = self.prepare(sql)?;
        let columns = column_names(&stmt);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_record(&columns, row)?);
        }
        Ok(out)
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl RowStore for Transaction<'_> {
    fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError> {
        (**self).execute_sql(sql, params)
    }

    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, StorageError> {
        (**self).fetch_one(sql, params)
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StorageError> {
        (**self).fetch_all(sql, params)
    }

    fn last_insert_id(&self) -> i64 {
        (**self).last_insert_id()
    }
}

/// Text parameter.
pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
