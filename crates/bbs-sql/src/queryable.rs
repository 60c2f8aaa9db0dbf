//! Driver-neutral query handles.
//!
//! [`Queryable`] is anything statements can run against: a pooled
//! connection or an open [`Transaction`]. [`QueryableDb`] hands those out.
//! Values cross the boundary as [`SqlValue`] so the helpers stay
//! independent of the driver.

use async_trait::async_trait;

use crate::error::{DriverError, SqlResult};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Build a `Vec<SqlValue>` from heterogeneous arguments.
#[macro_export]
macro_rules! sql_args {
    () => { Vec::<$crate::SqlValue>::new() };
    ($($arg:expr),+ $(,)?) => { vec![$($crate::SqlValue::from($arg)),+] };
}

/// One result row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, SqlValue)>,
        S: Into<String>,
    {
        let (columns, values) = pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self { columns, values }
    }

    /// Look up a column; a `table.` prefix on the stored name is ignored.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        let bare = column.rsplit('.').next().unwrap_or(column);
        self.columns
            .iter()
            .position(|c| c == column || c.rsplit('.').next() == Some(bare))
            .map(|i| &self.values[i])
    }

    /// Replace a column's value, appending the column if absent.
    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.columns.iter().position(|c| c == column) {
            Some(i) => self.values[i] = value,
            None => {
                self.columns.push(column.to_string());
                self.values.push(value);
            }
        }
    }

    fn required(&self, column: &str) -> SqlResult<&SqlValue> {
        self.get(column)
            .ok_or_else(|| DriverError::Other(format!("missing column {column}")).into())
    }

    fn mismatch(column: &str, want: &str, got: &SqlValue) -> DriverError {
        DriverError::Other(format!("column {column}: expected {want}, got {got:?}"))
    }

    /// Text column; NULL reads as empty.
    pub fn string(&self, column: &str) -> SqlResult<String> {
        match self.required(column)? {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| DriverError::Other(format!("column {column}: {e}")).into()),
            other => Err(Self::mismatch(column, "text", other).into()),
        }
    }

    /// Integer column; NULL reads as zero, booleans as 0/1.
    pub fn int(&self, column: &str) -> SqlResult<i64> {
        match self.required(column)? {
            SqlValue::Null => Ok(0),
            SqlValue::Int(i) => Ok(*i),
            SqlValue::Bool(b) => Ok(i64::from(*b)),
            other => Err(Self::mismatch(column, "integer", other).into()),
        }
    }

    pub fn bool(&self, column: &str) -> SqlResult<bool> {
        match self.required(column)? {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(i) => Ok(*i != 0),
            other => Err(Self::mismatch(column, "boolean", other).into()),
        }
    }

    pub fn bytes(&self, column: &str) -> SqlResult<Vec<u8>> {
        match self.required(column)? {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::Bytes(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(Self::mismatch(column, "bytes", other).into()),
        }
    }
}

/// A handle statements can run against.
#[async_trait]
pub trait Queryable: Send {
    /// Run a statement and return the number of rows affected.
    async fn execute(&mut self, query: &str, args: &[SqlValue]) -> Result<u64, DriverError>;

    async fn fetch_all(&mut self, query: &str, args: &[SqlValue])
    -> Result<Vec<SqlRow>, DriverError>;
}

/// An open transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait Transaction: Queryable {
    async fn commit(self: Box<Self>) -> Result<(), DriverError>;

    async fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}

/// A database that can open transactions and lend connections.
#[async_trait]
pub trait QueryableDb: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DriverError>;

    async fn acquire(&self) -> Result<Box<dyn Queryable>, DriverError>;
}
