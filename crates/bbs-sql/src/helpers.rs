//! Parameterized query builders and the retried transaction runner.
//!
//! Every builder takes any [`Queryable`] (a pooled connection or an open
//! transaction), writes its template with `?` placeholders, rebinds it for
//! the configured [`Flavor`], and runs it through the [`QueryMonitor`].
//!
//! # Transactions
//!
//! ```text
//! transact(f) ── begin ─→ f(tx) ─ ok ──→ commit
//!                  ↑          └─ err ─→ rollback ─→ retryable? ─ no ─→ Err
//!                  └──────── pause ←──────────────────────┘ yes (attempt < max)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use bbs_models::{Error, RetryPolicy};
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{DriverError, SqlResult, convert_sql_error};
use crate::flavor::Flavor;
use crate::monitor::QueryMonitor;
use crate::queryable::{Queryable, QueryableDb, SqlRow, SqlValue, Transaction};

/// Column name → value. Ordered so generated statements are deterministic.
pub type SqlAttributes = BTreeMap<&'static str, SqlValue>;

/// Build [`SqlAttributes`] from `"column" => value` pairs.
#[macro_export]
macro_rules! sql_attributes {
    ($($column:literal => $value:expr),* $(,)?) => {
        $crate::SqlAttributes::from([$(($column, $crate::SqlValue::from($value))),*])
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    NoLock,
    /// Append `FOR UPDATE`; only meaningful inside a transaction.
    Lock,
}

#[derive(Debug, Clone)]
pub struct SqlHelper {
    flavor: Flavor,
    monitor: Arc<QueryMonitor>,
    retry: RetryPolicy,
}

impl SqlHelper {
    pub fn new(flavor: Flavor, retry: RetryPolicy) -> Self {
        Self {
            flavor,
            monitor: Arc::new(QueryMonitor::new()),
            retry,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn monitor(&self) -> &Arc<QueryMonitor> {
        &self.monitor
    }

    pub fn rebind(&self, query: &str) -> String {
        self.flavor.rebind(query)
    }

    pub fn convert_sql_error(&self, err: &crate::error::SqlError) -> Error {
        convert_sql_error(self.flavor, err)
    }

    pub(crate) async fn exec<Q>(&self, q: &mut Q, query: &str, args: &[SqlValue]) -> SqlResult<u64>
    where
        Q: Queryable + ?Sized,
    {
        let query = self.rebind(query);
        debug!(%query, args = args.len(), "exec");
        Ok(self.monitor.observe(q.execute(&query, args)).await?)
    }

    async fn fetch<Q>(&self, q: &mut Q, query: &str, args: &[SqlValue]) -> SqlResult<Vec<SqlRow>>
    where
        Q: Queryable + ?Sized,
    {
        let query = self.rebind(query);
        debug!(%query, args = args.len(), "fetch");
        Ok(self.monitor.observe(q.fetch_all(&query, args)).await?)
    }

    // ── Builders ───────────────────────────────────────────────────

    /// `SELECT columns FROM table [WHERE ..] [FOR UPDATE]`.
    pub async fn query<Q>(
        &self,
        q: &mut Q,
        table: &str,
        columns: &[&str],
        lock: RowLock,
        where_clause: &str,
        args: &[SqlValue],
    ) -> SqlResult<Vec<SqlRow>>
    where
        Q: Queryable + ?Sized,
    {
        let query = select_statement(table, columns, lock, where_clause, false);
        self.fetch(q, &query, args).await
    }

    /// Like [`query`](Self::query) but limited to one row. Zero rows is
    /// always [`DriverError::NoRows`].
    pub async fn query_one<Q>(
        &self,
        q: &mut Q,
        table: &str,
        columns: &[&str],
        lock: RowLock,
        where_clause: &str,
        args: &[SqlValue],
    ) -> SqlResult<SqlRow>
    where
        Q: Queryable + ?Sized,
    {
        let query = select_statement(table, columns, lock, where_clause, true);
        self.fetch(q, &query, args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NoRows.into())
    }

    /// Insert one row. An empty attribute map does nothing.
    pub async fn insert<Q>(&self, q: &mut Q, table: &str, attributes: &SqlAttributes) -> SqlResult<u64>
    where
        Q: Queryable + ?Sized,
    {
        if attributes.is_empty() {
            return Ok(0);
        }

        let columns: Vec<&str> = attributes.keys().copied().collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let query = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        let args: Vec<SqlValue> = attributes.values().cloned().collect();
        self.exec(q, &query, &args).await
    }

    /// Update matching rows. An empty attribute map does nothing.
    pub async fn update<Q>(
        &self,
        q: &mut Q,
        table: &str,
        attributes: &SqlAttributes,
        where_clause: &str,
        where_args: &[SqlValue],
    ) -> SqlResult<u64>
    where
        Q: Queryable + ?Sized,
    {
        if attributes.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = attributes.keys().map(|c| format!("{c} = ?")).collect();
        let mut query = format!("UPDATE {table} SET {}", assignments.join(", "));
        push_where(&mut query, where_clause);

        let mut args: Vec<SqlValue> = attributes.values().cloned().collect();
        args.extend_from_slice(where_args);
        self.exec(q, &query, &args).await
    }

    /// Update, and insert when nothing matched. Returns whether a row was
    /// inserted.
    ///
    /// The two statements are not atomic: a concurrent writer running the
    /// same upsert between them makes the insert fail with a duplicate key
    /// (ResourceExists). Tables written this way carry a unique constraint
    /// and callers handle the conflict. The update count is the number of
    /// matched rows; the MySQL driver connects with found-rows reporting, so
    /// an update that writes identical values still counts as a match.
    pub async fn upsert<Q>(
        &self,
        q: &mut Q,
        table: &str,
        attributes: &SqlAttributes,
        where_clause: &str,
        where_args: &[SqlValue],
    ) -> SqlResult<bool>
    where
        Q: Queryable + ?Sized,
    {
        let updated = self.update(q, table, attributes, where_clause, where_args).await?;
        if updated > 0 {
            return Ok(false);
        }
        self.insert(q, table, attributes).await?;
        Ok(true)
    }

    pub async fn delete<Q>(
        &self,
        q: &mut Q,
        table: &str,
        where_clause: &str,
        where_args: &[SqlValue],
    ) -> SqlResult<u64>
    where
        Q: Queryable + ?Sized,
    {
        let mut query = format!("DELETE FROM {table}");
        push_where(&mut query, where_clause);
        self.exec(q, &query, where_args).await
    }

    pub async fn count<Q>(
        &self,
        q: &mut Q,
        table: &str,
        where_clause: &str,
        where_args: &[SqlValue],
    ) -> SqlResult<i64>
    where
        Q: Queryable + ?Sized,
    {
        let mut query = format!("SELECT COUNT(*) AS count FROM {table}");
        push_where(&mut query, where_clause);
        let rows = self.fetch(q, &query, where_args).await?;
        match rows.first() {
            Some(row) => row.int("count"),
            None => Ok(0),
        }
    }

    // ── Transact ───────────────────────────────────────────────────

    /// Run `body` in a transaction, retrying the whole body on deadlock or
    /// a severed connection as the retry policy allows.
    ///
    /// The body may run more than once, so it must not have side effects
    /// outside the transaction. A panic inside the body drops the open
    /// transaction, which rolls it back.
    pub async fn transact<T, F>(&self, db: &dyn QueryableDb, mut body: F) -> SqlResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn Transaction) -> BoxFuture<'t, SqlResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            match self.transact_once(db, &mut body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable(self.flavor) && self.retry.should_retry(attempt) => {
                    warn!(attempt, error = %err, "retrying transaction after deadlock");
                    tokio::time::sleep(self.retry.pause_after(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn transact_once<T, F>(&self, db: &dyn QueryableDb, body: &mut F) -> SqlResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn Transaction) -> BoxFuture<'t, SqlResult<T>> + Send,
        T: Send,
    {
        let mut tx = self.monitor.observe(db.begin()).await?;
        match body(tx.as_mut()).await {
            Ok(value) => {
                self.monitor.observe(tx.commit()).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.monitor.observe(tx.rollback()).await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn push_where(query: &mut String, where_clause: &str) {
    if !where_clause.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(where_clause);
    }
}

fn select_statement(
    table: &str,
    columns: &[&str],
    lock: RowLock,
    where_clause: &str,
    limit_one: bool,
) -> String {
    let mut query = format!("SELECT {} FROM {table}", columns.join(", "));
    push_where(&mut query, where_clause);
    if limit_one {
        query.push_str(" LIMIT 1");
    }
    if lock == RowLock::Lock {
        query.push_str(" FOR UPDATE");
    }
    query
}
