//! `SqlDb` — the SQL-backed store.
//!
//! Holds the shared pool handle, the query helper, and the clock. The
//! actual LRP and domain operations live in their own modules.

use std::sync::Arc;

use bbs_models::ModelResult;
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::clock::{Clock, SystemClock};
use crate::error::SqlResult;
use crate::helpers::SqlHelper;
use crate::queryable::{QueryableDb, Transaction};
use crate::tables::SCHEMA;

#[derive(Clone)]
pub struct SqlDb {
    pub(crate) db: Arc<dyn QueryableDb>,
    pub(crate) helper: SqlHelper,
    pub(crate) clock: Arc<dyn Clock>,
}

impl SqlDb {
    pub fn new(db: Arc<dyn QueryableDb>, helper: SqlHelper) -> Self {
        Self {
            db,
            helper,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn helper(&self) -> &SqlHelper {
        &self.helper
    }

    /// Create the tables if they do not exist yet.
    pub async fn create_tables(&self) -> ModelResult<()> {
        let result = self.apply_schema().await;
        self.classify(result)?;
        debug!(flavor = %self.helper.flavor(), "schema ensured");
        Ok(())
    }

    async fn apply_schema(&self) -> SqlResult<()> {
        let mut conn = self.db.acquire().await?;
        for ddl in SCHEMA {
            self.helper.exec(conn.as_mut(), ddl, &[]).await?;
        }
        Ok(())
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Surface a storage result as a canonical error.
    pub(crate) fn classify<T>(&self, result: SqlResult<T>) -> ModelResult<T> {
        result.map_err(|err| {
            let converted = self.helper.convert_sql_error(&err);
            error!(error = %err, kind = %converted.kind, "sql operation failed");
            converted
        })
    }

    pub(crate) async fn transact<T, F>(&self, body: F) -> ModelResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn Transaction) -> BoxFuture<'t, SqlResult<T>> + Send,
        T: Send,
    {
        let result = self.helper.transact(self.db.as_ref(), body).await;
        self.classify(result)
    }
}
