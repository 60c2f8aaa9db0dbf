//! SQL dialects.
//!
//! Query templates use `?` as the positional placeholder. Each flavor
//! rewrites placeholders for its engine and classifies its engine's error
//! codes. Both are exhaustive matches on `Flavor`, so adding a dialect
//! does not compile until it has a classifier.

use std::fmt;
use std::str::FromStr;

use bbs_models::{Error, ErrorKind};

use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    MySql,
    Postgres,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Rewrite `?` placeholders into this dialect's syntax.
    ///
    /// Postgres gets `$1, $2, …` left to right; MySQL is returned
    /// unchanged. A literal `?` inside a quoted string is rewritten too.
    pub fn rebind(&self, query: &str) -> String {
        match self {
            Self::MySql => query.to_string(),
            Self::Postgres => {
                let mut out = String::with_capacity(query.len() + 8);
                let mut n = 0;
                for ch in query.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }

    /// Canonical kind for a driver failure under this dialect.
    pub fn classify(&self, err: &DriverError) -> ErrorKind {
        match err {
            DriverError::NoRows => ErrorKind::ResourceNotFound,
            DriverError::Database { code, .. } => match self {
                Self::MySql => classify_mysql(code),
                Self::Postgres => classify_postgres(code),
            },
            DriverError::ConnectionLost(_) | DriverError::Other(_) => ErrorKind::UnknownError,
        }
    }
}

fn classify_mysql(code: &str) -> ErrorKind {
    match code {
        "1062" => ErrorKind::ResourceExists,
        "1213" => ErrorKind::Deadlock,
        "1406" => ErrorKind::BadRequest,
        "1146" => ErrorKind::Unrecoverable,
        _ => ErrorKind::UnknownError,
    }
}

fn classify_postgres(code: &str) -> ErrorKind {
    match code {
        "22001" => ErrorKind::BadRequest,
        "23505" => ErrorKind::ResourceExists,
        "42P01" => ErrorKind::Unrecoverable,
        "40P01" => ErrorKind::Deadlock,
        _ => ErrorKind::UnknownError,
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::MySql),
            "postgres" => Ok(Self::Postgres),
            other => Err(Error::new(
                ErrorKind::InvalidRequest,
                format!("unsupported sql flavor: {other}"),
            )),
        }
    }
}
