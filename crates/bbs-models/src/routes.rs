//! The BBS v1 route table.
//!
//! Built once with [`RouteTable::bbs`] and shared by reference; there is no
//! global registry. Deprecated revisions stay dispatchable but are flagged
//! so new callers can avoid them.

use http::Method;

// ── Route names ────────────────────────────────────────────────────

pub const PING: &str = "Ping";

pub const DOMAINS: &str = "Domains";
pub const UPSERT_DOMAIN: &str = "UpsertDomain";

pub const ACTUAL_LRP_GROUPS: &str = "ActualLRPGroups";
pub const ACTUAL_LRP_GROUPS_BY_PROCESS_GUID: &str = "ActualLRPGroupsByProcessGuid";
pub const ACTUAL_LRP_GROUP_BY_PROCESS_GUID_AND_INDEX: &str = "ActualLRPGroupsByProcessGuidAndIndex";

pub const CLAIM_ACTUAL_LRP: &str = "ClaimActualLRP";
pub const START_ACTUAL_LRP: &str = "StartActualLRP";
pub const CRASH_ACTUAL_LRP: &str = "CrashActualLRP";
pub const FAIL_ACTUAL_LRP: &str = "FailActualLRP";
pub const REMOVE_ACTUAL_LRP: &str = "RemoveActualLRP";
pub const RETIRE_ACTUAL_LRP: &str = "RetireActualLRP";

pub const REMOVE_EVACUATING_ACTUAL_LRP: &str = "RemoveEvacuatingActualLRP";
pub const EVACUATE_CLAIMED_ACTUAL_LRP: &str = "EvacuateClaimedActualLRP";
pub const EVACUATE_CRASHED_ACTUAL_LRP: &str = "EvacuateCrashedActualLRP";
pub const EVACUATE_STOPPED_ACTUAL_LRP: &str = "EvacuateStoppedActualLRP";
pub const EVACUATE_RUNNING_ACTUAL_LRP: &str = "EvacuateRunningActualLRP";

pub const DESIRED_LRPS: &str = "DesiredLRPs_r2";
pub const DESIRED_LRP_SCHEDULING_INFOS: &str = "DesiredLRPSchedulingInfos";
pub const DESIRED_LRP_BY_PROCESS_GUID: &str = "DesiredLRPByProcessGuid_r2";
pub const DESIRED_LRPS_R1: &str = "DesiredLRPs_r1";
pub const DESIRED_LRP_BY_PROCESS_GUID_R1: &str = "DesiredLRPByProcessGuid_r1";
pub const DESIRED_LRPS_R0: &str = "DesiredLRPs";
pub const DESIRED_LRP_BY_PROCESS_GUID_R0: &str = "DesiredLRPByProcessGuid";

pub const DESIRE_DESIRED_LRP: &str = "DesireDesiredLRP_r2";
pub const UPDATE_DESIRED_LRP: &str = "UpdateDesireLRP";
pub const REMOVE_DESIRED_LRP: &str = "RemoveDesiredLRP";
pub const DESIRE_DESIRED_LRP_R1: &str = "DesireDesiredLRP_r1";
pub const DESIRE_DESIRED_LRP_R0: &str = "DesireDesiredLRP";

pub const TASKS: &str = "Tasks_r2";
pub const TASK_BY_GUID: &str = "TaskByGuid_r2";
pub const DESIRE_TASK: &str = "DesireTask_r2";
pub const START_TASK: &str = "StartTask";
pub const CANCEL_TASK: &str = "CancelTask";
pub const FAIL_TASK: &str = "FailTask";
pub const COMPLETE_TASK: &str = "CompleteTask";
pub const RESOLVING_TASK: &str = "ResolvingTask";
pub const DELETE_TASK: &str = "DeleteTask";
pub const TASKS_R1: &str = "Tasks_r1";
pub const TASK_BY_GUID_R1: &str = "TaskByGuid_r1";
pub const DESIRE_TASK_R1: &str = "DesireTask_r1";
pub const TASKS_R0: &str = "Tasks";
pub const TASK_BY_GUID_R0: &str = "TaskByGuid";
pub const DESIRE_TASK_R0: &str = "DesireTask";

pub const EVENT_STREAM_R0: &str = "EventStream_r0";
pub const LRP_INSTANCE_EVENT_STREAM_R1: &str = "LrpInstanceEventStream_r1";
pub const TASK_EVENT_STREAM_R0: &str = "TaskEventStream_r0";

pub const CELLS: &str = "Cells_r2";
pub const CELLS_R1: &str = "Cells_r1";

/// One logical operation's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub method: Method,
    pub deprecated: bool,
}

impl Route {
    fn post(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            method: Method::POST,
            deprecated: false,
        }
    }

    fn get(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            method: Method::GET,
            deprecated: false,
        }
    }

    fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Immutable name → route mapping.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The full BBS v1 route set.
    pub fn bbs() -> Self {
        Self::new(vec![
            Route::post(PING, "/v1/ping"),
            // Domains
            Route::post(DOMAINS, "/v1/domains/list"),
            Route::post(UPSERT_DOMAIN, "/v1/domains/upsert"),
            // Actual LRP groups
            Route::post(ACTUAL_LRP_GROUPS, "/v1/actual_lrp_groups/list"),
            Route::post(
                ACTUAL_LRP_GROUPS_BY_PROCESS_GUID,
                "/v1/actual_lrp_groups/list_by_process_guid",
            ),
            Route::post(
                ACTUAL_LRP_GROUP_BY_PROCESS_GUID_AND_INDEX,
                "/v1/actual_lrp_groups/get_by_process_guid_and_index",
            ),
            // Actual LRP lifecycle
            Route::post(CLAIM_ACTUAL_LRP, "/v1/actual_lrps/claim"),
            Route::post(START_ACTUAL_LRP, "/v1/actual_lrps/start"),
            Route::post(CRASH_ACTUAL_LRP, "/v1/actual_lrps/crash"),
            Route::post(FAIL_ACTUAL_LRP, "/v1/actual_lrps/fail"),
            Route::post(REMOVE_ACTUAL_LRP, "/v1/actual_lrps/remove"),
            Route::post(RETIRE_ACTUAL_LRP, "/v1/actual_lrps/retire"),
            // Evacuation
            Route::post(REMOVE_EVACUATING_ACTUAL_LRP, "/v1/actual_lrps/remove_evacuating"),
            Route::post(EVACUATE_CLAIMED_ACTUAL_LRP, "/v1/actual_lrps/evacuate_claimed"),
            Route::post(EVACUATE_CRASHED_ACTUAL_LRP, "/v1/actual_lrps/evacuate_crashed"),
            Route::post(EVACUATE_STOPPED_ACTUAL_LRP, "/v1/actual_lrps/evacuate_stopped"),
            Route::post(EVACUATE_RUNNING_ACTUAL_LRP, "/v1/actual_lrps/evacuate_running"),
            // Desired LRPs
            Route::post(
                DESIRED_LRP_SCHEDULING_INFOS,
                "/v1/desired_lrp_scheduling_infos/list",
            ),
            Route::post(DESIRED_LRPS, "/v1/desired_lrps/list.r2"),
            Route::post(
                DESIRED_LRP_BY_PROCESS_GUID,
                "/v1/desired_lrps/get_by_process_guid.r2",
            ),
            Route::post(DESIRED_LRPS_R1, "/v1/desired_lrps/list.r1").deprecated(),
            Route::post(
                DESIRED_LRP_BY_PROCESS_GUID_R1,
                "/v1/desired_lrps/get_by_process_guid.r1",
            )
            .deprecated(),
            Route::post(DESIRED_LRPS_R0, "/v1/desired_lrps/list").deprecated(),
            Route::post(
                DESIRED_LRP_BY_PROCESS_GUID_R0,
                "/v1/desired_lrps/get_by_process_guid",
            )
            .deprecated(),
            // Desired LRP lifecycle
            Route::post(DESIRE_DESIRED_LRP, "/v1/desired_lrp/desire.r2"),
            Route::post(DESIRE_DESIRED_LRP_R1, "/v1/desired_lrp/desire.r1").deprecated(),
            Route::post(UPDATE_DESIRED_LRP, "/v1/desired_lrp/update"),
            Route::post(REMOVE_DESIRED_LRP, "/v1/desired_lrp/remove"),
            Route::post(DESIRE_DESIRED_LRP_R0, "/v1/desired_lrp/desire").deprecated(),
            // Tasks
            Route::post(TASKS, "/v1/tasks/list.r2"),
            Route::post(TASK_BY_GUID, "/v1/tasks/get_by_task_guid.r2"),
            Route::post(TASKS_R1, "/v1/tasks/list.r1").deprecated(),
            Route::post(TASK_BY_GUID_R1, "/v1/tasks/get_by_task_guid.r1").deprecated(),
            Route::post(TASKS_R0, "/v1/tasks/list").deprecated(),
            Route::get(TASK_BY_GUID_R0, "/v1/tasks/get_by_task_guid").deprecated(),
            // Task lifecycle
            Route::post(DESIRE_TASK, "/v1/tasks/desire.r2"),
            Route::post(DESIRE_TASK_R1, "/v1/tasks/desire.r1").deprecated(),
            Route::post(START_TASK, "/v1/tasks/start"),
            Route::post(CANCEL_TASK, "/v1/tasks/cancel"),
            Route::post(FAIL_TASK, "/v1/tasks/fail"),
            Route::post(COMPLETE_TASK, "/v1/tasks/complete"),
            Route::post(RESOLVING_TASK, "/v1/tasks/resolving"),
            Route::post(DELETE_TASK, "/v1/tasks/delete"),
            Route::post(DESIRE_TASK_R0, "/v1/tasks/desire").deprecated(),
            // Event streaming
            Route::get(EVENT_STREAM_R0, "/v1/events"),
            Route::post(LRP_INSTANCE_EVENT_STREAM_R1, "/v1/events/lrp_instances.r1"),
            Route::post(TASK_EVENT_STREAM_R0, "/v1/events/tasks"),
            // Cells
            Route::post(CELLS, "/v1/cells/list.r1"),
            Route::get(CELLS_R1, "/v1/cells/list.r1").deprecated(),
        ])
    }

    pub fn lookup(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Routes intended for new traffic.
    pub fn current(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|route| !route.deprecated)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
