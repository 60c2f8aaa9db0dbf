//! Events published to subscribers of the group, instance and task channels.

use serde::Serialize;

use crate::actual_lrp::{ActualLrp, ActualLrpGroup, ActualLrpInstanceKey, ActualLrpKey};
use crate::task::Task;

pub const ACTUAL_LRP_CREATED: &str = "actual_lrp_created";
pub const ACTUAL_LRP_CHANGED: &str = "actual_lrp_changed";
pub const ACTUAL_LRP_REMOVED: &str = "actual_lrp_removed";
pub const ACTUAL_LRP_CRASHED: &str = "actual_lrp_crashed";
pub const ACTUAL_LRP_INSTANCE_CREATED: &str = "actual_lrp_instance_created";
pub const ACTUAL_LRP_INSTANCE_CHANGED: &str = "actual_lrp_instance_changed";
pub const ACTUAL_LRP_INSTANCE_REMOVED: &str = "actual_lrp_instance_removed";
pub const TASK_CREATED: &str = "task_created";
pub const TASK_CHANGED: &str = "task_changed";
pub const TASK_REMOVED: &str = "task_removed";

/// Every event name a subscriber may receive.
pub const EVENT_TYPES: [&str; 10] = [
    ACTUAL_LRP_CREATED,
    ACTUAL_LRP_CHANGED,
    ACTUAL_LRP_REMOVED,
    ACTUAL_LRP_CRASHED,
    ACTUAL_LRP_INSTANCE_CREATED,
    ACTUAL_LRP_INSTANCE_CHANGED,
    ACTUAL_LRP_INSTANCE_REMOVED,
    TASK_CREATED,
    TASK_CHANGED,
    TASK_REMOVED,
];

/// Details of an observed crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActualLrpCrashed {
    pub key: ActualLrpKey,
    pub instance_key: ActualLrpInstanceKey,
    pub crash_count: i32,
    pub crash_reason: String,
    pub since: i64,
}

impl ActualLrpCrashed {
    /// Built from the pre-crash record (for the instance identity that was
    /// lost) and the post-crash record (for the counters).
    pub fn new(before: &ActualLrp, after: &ActualLrp) -> Self {
        Self {
            key: after.key.clone(),
            instance_key: before.instance_key.clone(),
            crash_count: after.crash_count,
            crash_reason: after.crash_reason.clone(),
            since: after.since,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ActualLrpCreated { group: ActualLrpGroup },
    ActualLrpChanged { before: ActualLrpGroup, after: ActualLrpGroup },
    ActualLrpRemoved { group: ActualLrpGroup },
    ActualLrpCrashed(ActualLrpCrashed),
    ActualLrpInstanceCreated { lrp: ActualLrp },
    ActualLrpInstanceChanged { before: ActualLrp, after: ActualLrp },
    ActualLrpInstanceRemoved { lrp: ActualLrp },
    TaskCreated { task: Task },
    TaskChanged { before: Task, after: Task },
    TaskRemoved { task: Task },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ActualLrpCreated { .. } => ACTUAL_LRP_CREATED,
            Self::ActualLrpChanged { .. } => ACTUAL_LRP_CHANGED,
            Self::ActualLrpRemoved { .. } => ACTUAL_LRP_REMOVED,
            Self::ActualLrpCrashed(_) => ACTUAL_LRP_CRASHED,
            Self::ActualLrpInstanceCreated { .. } => ACTUAL_LRP_INSTANCE_CREATED,
            Self::ActualLrpInstanceChanged { .. } => ACTUAL_LRP_INSTANCE_CHANGED,
            Self::ActualLrpInstanceRemoved { .. } => ACTUAL_LRP_INSTANCE_REMOVED,
            Self::TaskCreated { .. } => TASK_CREATED,
            Self::TaskChanged { .. } => TASK_CHANGED,
            Self::TaskRemoved { .. } => TASK_REMOVED,
        }
    }

    /// Subscriber-facing identity: the instance guid for LRP events, the
    /// task guid for task events.
    pub fn key(&self) -> String {
        let guid = |group: &ActualLrpGroup| {
            group
                .resolve()
                .map(|lrp| lrp.instance_key.instance_guid.clone())
                .unwrap_or_default()
        };
        match self {
            Self::ActualLrpCreated { group } | Self::ActualLrpRemoved { group } => guid(group),
            Self::ActualLrpChanged { before, .. } => guid(before),
            Self::ActualLrpCrashed(crashed) => crashed.instance_key.instance_guid.clone(),
            Self::ActualLrpInstanceCreated { lrp } | Self::ActualLrpInstanceRemoved { lrp } => {
                lrp.instance_key.instance_guid.clone()
            }
            Self::ActualLrpInstanceChanged { after, .. } => after.instance_key.instance_guid.clone(),
            Self::TaskCreated { task } | Self::TaskRemoved { task } => task.task_guid.clone(),
            Self::TaskChanged { before, .. } => before.task_guid.clone(),
        }
    }

    /// The LRP an observer ends up with after this event: the created
    /// record, or the after side of a change. `None` for removals and crashes.
    pub fn resulting_lrp(&self) -> Option<&ActualLrp> {
        match self {
            Self::ActualLrpCreated { group } => group.resolve(),
            Self::ActualLrpChanged { after, .. } => after.resolve(),
            Self::ActualLrpInstanceCreated { lrp } => Some(lrp),
            Self::ActualLrpInstanceChanged { after, .. } => Some(after),
            _ => None,
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Self::ActualLrpCrashed(_))
    }
}
