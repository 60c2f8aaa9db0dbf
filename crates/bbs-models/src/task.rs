//! One-off task records, as carried on the task event stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TaskState {
    #[default]
    Invalid,
    Pending,
    Running,
    Completed,
    Resolving,
}

impl TaskState {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Invalid => 0,
            Self::Pending => 1,
            Self::Running => 2,
            Self::Completed => 3,
            Self::Resolving => 4,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Invalid),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Running),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Resolving),
            other => Err(Error::new(
                ErrorKind::InvalidRecord,
                format!("unknown task state: {other}"),
            )),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_guid: String,
    pub domain: String,
    pub state: TaskState,
    pub cell_id: String,
    pub result: String,
    pub failed: bool,
    pub failure_reason: String,
    pub created_at: i64,
    pub updated_at: i64,
}
