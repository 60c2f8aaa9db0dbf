//! bbs-models — the shared vocabulary of the BBS.
//!
//! Actual LRP records and their group resolution, the events derived from
//! them, the canonical error kinds, the retry policy, the route table, the
//! protobuf wire messages, and configuration.
//!
//! # Architecture
//!
//! ```text
//! actual_lrp ── ActualLrp, ActualLrpGroup, resolve_group(s), RestartCalculator
//! events     ── Event (group, instance, and task channels)
//! error      ── Error { kind: ErrorKind, message }
//! retry      ── RetryPolicy (Transact, doRequest)
//! routes     ── RouteTable::bbs()
//! proto      ── prost messages + model conversions
//! config     ── BbsConfig (toml)
//! ```

pub mod actual_lrp;
pub mod config;
pub mod error;
pub mod events;
pub mod proto;
pub mod retry;
pub mod routes;
pub mod task;

pub use actual_lrp::{
    ActualLrp, ActualLrpGroup, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo,
    ActualLrpState, CRASH_RESET_TIMEOUT, ModificationTag, PortMapping, Presence,
    RestartCalculator, resolve_group, resolve_groups,
};
pub use config::BbsConfig;
pub use error::{Error, ErrorKind, ModelResult};
pub use events::{ActualLrpCrashed, Event};
pub use retry::RetryPolicy;
pub use routes::{Route, RouteTable};
pub use task::{Task, TaskState};
