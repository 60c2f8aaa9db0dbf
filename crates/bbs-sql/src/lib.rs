//! bbs-sql — persistence for the BBS.
//!
//! Parameterized query builders over a driver-neutral [`Queryable`], per
//! dialect placeholder rebinding and error classification, a transaction
//! runner that retries deadlocks, and the SQL-backed actual LRP and domain
//! stores.
//!
//! # Architecture
//!
//! ```text
//! ActualLrpDb / DomainDb (traits)
//!        │
//!      SqlDb ── SqlHelper ── Flavor (rebind, classify)
//!        │          │
//!        │          └─ QueryMonitor
//!        │
//!   QueryableDb ── SqlxDb (sqlx Any pool: mysql, postgres)
//! ```

mod actual_lrp_db;
pub mod clock;
pub mod db;
mod domain_db;
pub mod error;
pub mod flavor;
pub mod helpers;
pub mod monitor;
pub mod queryable;
pub mod sql_db;
pub mod sqlx_db;
pub mod tables;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use db::{ActualLrpDb, ActualLrpFilter, CrashOutcome, DomainDb};
pub use error::{DriverError, SqlError, SqlResult, convert_sql_error};
pub use flavor::Flavor;
pub use helpers::{RowLock, SqlAttributes, SqlHelper};
pub use monitor::QueryMonitor;
pub use queryable::{Queryable, QueryableDb, SqlRow, SqlValue, Transaction};
pub use sql_db::SqlDb;
pub use sqlx_db::{SqlxDb, open};
