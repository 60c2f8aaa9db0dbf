//! sqlx backend over the `Any` driver, so one binary serves both MySQL and
//! Postgres. The data source must be a URL (`postgres://…`, `mysql://…`).

use std::sync::Arc;

use async_trait::async_trait;
use bbs_models::config::SqlConfig;
use bbs_models::{ModelResult, RetryPolicy};
use sqlx::any::{Any, AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{AnyPool, Column, Row};
use tracing::info;

use crate::error::{DriverError, convert_sql_error};
use crate::flavor::Flavor;
use crate::helpers::SqlHelper;
use crate::queryable::{Queryable, QueryableDb, SqlRow, SqlValue, Transaction};
use crate::sql_db::SqlDb;

#[derive(Clone)]
pub struct SqlxDb {
    pool: AnyPool,
}

impl SqlxDb {
    pub async fn connect(data_source: &str, max_open_connections: u32) -> Result<Self, DriverError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_open_connections)
            .connect(data_source)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// Connect with `config` and build the store on top.
pub async fn open(config: &SqlConfig, retry: RetryPolicy) -> ModelResult<SqlDb> {
    let flavor: Flavor = config.driver.parse()?;
    let db = SqlxDb::connect(&config.data_source, config.max_open_connections)
        .await
        .map_err(|err| convert_sql_error(flavor, &err.into()))?;
    info!(%flavor, max_open_connections = config.max_open_connections, "connected to sql");
    Ok(SqlDb::new(Arc::new(db), SqlHelper::new(flavor, retry)))
}

fn map_sqlx_error(err: sqlx::Error) -> DriverError {
    match err {
        sqlx::Error::RowNotFound => DriverError::NoRows,
        sqlx::Error::Database(db_error) => {
            // MySQL reports its numeric code separately from the SQLSTATE.
            let code = db_error
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .map(|mysql| mysql.number().to_string())
                .or_else(|| db_error.code().map(|code| code.into_owned()))
                .unwrap_or_default();
            DriverError::database(code, db_error.message())
        }
        sqlx::Error::Io(err) => DriverError::ConnectionLost(err.to_string()),
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            DriverError::ConnectionLost(err.to_string())
        }
        other => DriverError::Other(other.to_string()),
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[SqlValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
        };
    }
    query
}

fn decode_value(row: &AnyRow, index: usize) -> Result<SqlValue, DriverError> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return Ok(v.map(i64::from).into());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.into());
    }
    row.try_get::<Option<Vec<u8>>, _>(index)
        .map(Into::into)
        .map_err(map_sqlx_error)
}

fn decode_row(row: &AnyRow) -> Result<SqlRow, DriverError> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|i| decode_value(row, i))
        .collect::<Result<_, _>>()?;
    Ok(SqlRow::new(columns, values))
}

// ── Handles ────────────────────────────────────────────────────────

struct SqlxTransaction(sqlx::Transaction<'static, Any>);

struct SqlxConnection(PoolConnection<Any>);

#[async_trait]
impl Queryable for SqlxTransaction {
    async fn execute(&mut self, query: &str, args: &[SqlValue]) -> Result<u64, DriverError> {
        let result = bind_all(sqlx::query(query), args)
            .execute(&mut *self.0)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Vec<SqlRow>, DriverError> {
        let rows = bind_all(sqlx::query(query), args)
            .fetch_all(&mut *self.0)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }
}

#[async_trait]
impl Transaction for SqlxTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.0.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.0.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Queryable for SqlxConnection {
    async fn execute(&mut self, query: &str, args: &[SqlValue]) -> Result<u64, DriverError> {
        let result = bind_all(sqlx::query(query), args)
            .execute(&mut *self.0)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Vec<SqlRow>, DriverError> {
        let rows = bind_all(sqlx::query(query), args)
            .fetch_all(&mut *self.0)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }
}

#[async_trait]
impl QueryableDb for SqlxDb {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqlxTransaction(tx)))
    }

    async fn acquire(&self) -> Result<Box<dyn Queryable>, DriverError> {
        let conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqlxConnection(conn)))
    }
}
