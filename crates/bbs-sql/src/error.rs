//! Storage error types.
//!
//! Driver failures keep their raw engine code until they are classified by
//! [`convert_sql_error`]; model errors raised inside a transaction body pass
//! through unchanged.

use bbs_models::{Error, ErrorKind};
use thiserror::Error;

use crate::flavor::Flavor;

/// Result type alias for persistence operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// What the database driver reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("no rows in result set")]
    NoRows,

    #[error("database error {code}: {message}")]
    Database { code: String, message: String },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("driver error: {0}")]
    Other(String),
}

impl DriverError {
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Model(#[from] Error),
}

impl SqlError {
    /// Deadlocks and connections severed mid-transaction are worth another
    /// attempt; everything else is surfaced.
    pub fn is_retryable(&self, flavor: Flavor) -> bool {
        match self {
            Self::Driver(DriverError::ConnectionLost(_)) => true,
            Self::Driver(err) => flavor.classify(err) == ErrorKind::Deadlock,
            Self::Model(err) => err.kind.is_transient(),
        }
    }
}

/// Map an engine-specific failure onto one of the canonical kinds:
/// ResourceExists, Deadlock, BadRequest, Unrecoverable, UnknownError or
/// ResourceNotFound.
pub fn convert_sql_error(flavor: Flavor, err: &SqlError) -> Error {
    match err {
        SqlError::Model(model) => model.clone(),
        SqlError::Driver(driver) => match flavor.classify(driver) {
            ErrorKind::ResourceNotFound => Error::resource_not_found(),
            ErrorKind::ResourceExists => Error::resource_exists(),
            ErrorKind::Deadlock => Error::deadlock(),
            ErrorKind::BadRequest => Error::bad_request(),
            ErrorKind::Unrecoverable => Error::unrecoverable(),
            _ => Error::new(ErrorKind::UnknownError, driver.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_not_found_for_every_flavor() {
        for flavor in [Flavor::MySql, Flavor::Postgres] {
            let err = convert_sql_error(flavor, &DriverError::NoRows.into());
            assert_eq!(err.kind, ErrorKind::ResourceNotFound);
        }
    }

    #[test]
    fn test_mysql_codes() {
        let cases = [
            ("1062", ErrorKind::ResourceExists),
            ("1213", ErrorKind::Deadlock),
            ("1406", ErrorKind::BadRequest),
            ("1146", ErrorKind::Unrecoverable),
            ("9999", ErrorKind::UnknownError),
        ];
        for (code, kind) in cases {
            let err = SqlError::from(DriverError::database(code, "boom"));
            assert_eq!(convert_sql_error(Flavor::MySql, &err).kind, kind, "code {code}");
        }
    }

    #[test]
    fn test_postgres_codes() {
        let cases = [
            ("22001", ErrorKind::BadRequest),
            ("23505", ErrorKind::ResourceExists),
            ("42P01", ErrorKind::Unrecoverable),
            ("40P01", ErrorKind::Deadlock),
            ("08006", ErrorKind::UnknownError),
        ];
        for (code, kind) in cases {
            let err = SqlError::from(DriverError::database(code, "boom"));
            assert_eq!(convert_sql_error(Flavor::Postgres, &err).kind, kind, "code {code}");
        }
    }

    #[test]
    fn test_codes_do_not_leak_across_dialects() {
        let err = SqlError::from(DriverError::database("1213", "deadlock found"));
        assert_eq!(convert_sql_error(Flavor::Postgres, &err).kind, ErrorKind::UnknownError);
    }

    #[test]
    fn test_unknown_keeps_driver_detail() {
        let err = SqlError::from(DriverError::Other("socket closed".into()));
        let converted = convert_sql_error(Flavor::MySql, &err);
        assert_eq!(converted.kind, ErrorKind::UnknownError);
        assert!(converted.message.contains("socket closed"));
    }

    #[test]
    fn test_model_errors_pass_through() {
        let err = SqlError::from(Error::cannot_be_claimed());
        assert_eq!(
            convert_sql_error(Flavor::Postgres, &err).kind,
            ErrorKind::ActualLrpCannotBeClaimed
        );
    }

    #[test]
    fn test_retryable() {
        assert!(SqlError::from(DriverError::database("40P01", "")).is_retryable(Flavor::Postgres));
        assert!(SqlError::from(DriverError::database("1213", "")).is_retryable(Flavor::MySql));
        assert!(SqlError::from(DriverError::ConnectionLost("eof".into())).is_retryable(Flavor::MySql));
        assert!(SqlError::from(Error::deadlock()).is_retryable(Flavor::MySql));
        assert!(!SqlError::from(DriverError::database("1062", "")).is_retryable(Flavor::MySql));
        assert!(!SqlError::from(DriverError::NoRows).is_retryable(Flavor::Postgres));
    }
}
