//! Protobuf wire messages for the BBS v1 API.
//!
//! Messages are declared with `prost` derives and kept separate from the
//! domain types in [`crate::actual_lrp`]; `From`/`TryFrom` impls convert at
//! the boundary. Event payloads travel as protobuf bytes tagged by event
//! name, see [`encode_event`] and [`decode_event`].

use prost::Message;

use crate::actual_lrp as model;
use crate::error::{Error, ErrorKind};
use crate::events::{self, ActualLrpCrashed, Event};
use crate::task as task_model;

pub const CONTENT_TYPE: &str = "application/x-protobuf";

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct WireError {
    #[prost(enumeration = "ErrorKind", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl From<&Error> for WireError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind as i32,
            message: err.message.clone(),
        }
    }
}

impl From<WireError> for Error {
    fn from(wire: WireError) -> Self {
        let kind = ErrorKind::try_from(wire.kind).unwrap_or(ErrorKind::UnknownError);
        Error::new(kind, wire.message)
    }
}

/// Responses that embed a logical error next to their payload.
pub trait EmbeddedError {
    fn embedded_error(&self) -> Option<Error>;
}

macro_rules! embedded_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EmbeddedError for $ty {
                fn embedded_error(&self) -> Option<Error> {
                    self.error.clone().map(Error::from)
                }
            }
        )*
    };
}

// ── Actual LRPs ────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpKey {
    #[prost(string, tag = "1")]
    pub process_guid: String,
    #[prost(int32, tag = "2")]
    pub index: i32,
    #[prost(string, tag = "3")]
    pub domain: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpInstanceKey {
    #[prost(string, tag = "1")]
    pub instance_guid: String,
    #[prost(string, tag = "2")]
    pub cell_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct PortMapping {
    #[prost(uint32, tag = "1")]
    pub container_port: u32,
    #[prost(uint32, tag = "2")]
    pub host_port: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpNetInfo {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, repeated, tag = "2")]
    pub ports: Vec<PortMapping>,
    #[prost(string, tag = "3")]
    pub instance_address: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModificationTag {
    #[prost(string, tag = "1")]
    pub epoch: String,
    #[prost(uint32, tag = "2")]
    pub index: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrp {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(message, optional, tag = "3")]
    pub actual_lrp_net_info: Option<ActualLrpNetInfo>,
    #[prost(int32, tag = "4")]
    pub crash_count: i32,
    #[prost(string, tag = "5")]
    pub crash_reason: String,
    #[prost(string, tag = "6")]
    pub state: String,
    #[prost(string, tag = "7")]
    pub placement_error: String,
    #[prost(int64, tag = "8")]
    pub since: i64,
    #[prost(message, optional, tag = "9")]
    pub modification_tag: Option<ModificationTag>,
    #[prost(int32, tag = "10")]
    pub presence: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroup {
    #[prost(message, optional, tag = "1")]
    pub instance: Option<ActualLrp>,
    #[prost(message, optional, tag = "2")]
    pub evacuating: Option<ActualLrp>,
}

impl From<&model::ActualLrpKey> for ActualLrpKey {
    fn from(key: &model::ActualLrpKey) -> Self {
        Self {
            process_guid: key.process_guid.clone(),
            index: key.index,
            domain: key.domain.clone(),
        }
    }
}

impl From<ActualLrpKey> for model::ActualLrpKey {
    fn from(key: ActualLrpKey) -> Self {
        Self::new(key.process_guid, key.index, key.domain)
    }
}

impl From<&model::ActualLrpInstanceKey> for ActualLrpInstanceKey {
    fn from(key: &model::ActualLrpInstanceKey) -> Self {
        Self {
            instance_guid: key.instance_guid.clone(),
            cell_id: key.cell_id.clone(),
        }
    }
}

impl From<ActualLrpInstanceKey> for model::ActualLrpInstanceKey {
    fn from(key: ActualLrpInstanceKey) -> Self {
        Self::new(key.instance_guid, key.cell_id)
    }
}

impl From<&model::ActualLrpNetInfo> for ActualLrpNetInfo {
    fn from(info: &model::ActualLrpNetInfo) -> Self {
        Self {
            address: info.address.clone(),
            ports: info
                .ports
                .iter()
                .map(|p| PortMapping {
                    container_port: p.container_port,
                    host_port: p.host_port,
                })
                .collect(),
            instance_address: info.instance_address.clone(),
        }
    }
}

impl From<ActualLrpNetInfo> for model::ActualLrpNetInfo {
    fn from(info: ActualLrpNetInfo) -> Self {
        Self {
            address: info.address,
            ports: info
                .ports
                .into_iter()
                .map(|p| model::PortMapping {
                    container_port: p.container_port,
                    host_port: p.host_port,
                })
                .collect(),
            instance_address: info.instance_address,
        }
    }
}

impl From<&model::ActualLrp> for ActualLrp {
    fn from(lrp: &model::ActualLrp) -> Self {
        Self {
            actual_lrp_key: Some((&lrp.key).into()),
            actual_lrp_instance_key: Some((&lrp.instance_key).into()),
            actual_lrp_net_info: Some((&lrp.net_info).into()),
            crash_count: lrp.crash_count,
            crash_reason: lrp.crash_reason.clone(),
            state: lrp.state.as_str().to_string(),
            placement_error: lrp.placement_error.clone(),
            since: lrp.since,
            modification_tag: Some(ModificationTag {
                epoch: lrp.modification_tag.epoch.clone(),
                index: lrp.modification_tag.index,
            }),
            presence: lrp.presence.as_i32(),
        }
    }
}

impl TryFrom<ActualLrp> for model::ActualLrp {
    type Error = Error;

    fn try_from(lrp: ActualLrp) -> Result<Self, Self::Error> {
        let key = lrp.actual_lrp_key.ok_or_else(|| {
            Error::new(ErrorKind::InvalidRecord, "actual lrp is missing its key")
        })?;
        let tag = lrp.modification_tag.unwrap_or_default();
        Ok(Self {
            key: key.into(),
            instance_key: lrp.actual_lrp_instance_key.map(Into::into).unwrap_or_default(),
            net_info: lrp.actual_lrp_net_info.map(Into::into).unwrap_or_default(),
            state: lrp.state.parse()?,
            presence: model::Presence::from_i32(lrp.presence)?,
            crash_count: lrp.crash_count,
            crash_reason: lrp.crash_reason,
            placement_error: lrp.placement_error,
            since: lrp.since,
            modification_tag: model::ModificationTag::new(tag.epoch, tag.index),
        })
    }
}

impl From<&model::ActualLrpGroup> for ActualLrpGroup {
    fn from(group: &model::ActualLrpGroup) -> Self {
        Self {
            instance: group.instance.as_ref().map(Into::into),
            evacuating: group.evacuating.as_ref().map(Into::into),
        }
    }
}

impl TryFrom<ActualLrpGroup> for model::ActualLrpGroup {
    type Error = Error;

    fn try_from(group: ActualLrpGroup) -> Result<Self, Self::Error> {
        Ok(Self {
            instance: group.instance.map(TryInto::try_into).transpose()?,
            evacuating: group.evacuating.map(TryInto::try_into).transpose()?,
        })
    }
}

// ── Tasks ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct Task {
    #[prost(string, tag = "1")]
    pub task_guid: String,
    #[prost(string, tag = "2")]
    pub domain: String,
    #[prost(int32, tag = "3")]
    pub state: i32,
    #[prost(string, tag = "4")]
    pub cell_id: String,
    #[prost(string, tag = "5")]
    pub result: String,
    #[prost(bool, tag = "6")]
    pub failed: bool,
    #[prost(string, tag = "7")]
    pub failure_reason: String,
    #[prost(int64, tag = "8")]
    pub created_at: i64,
    #[prost(int64, tag = "9")]
    pub updated_at: i64,
}

impl From<&task_model::Task> for Task {
    fn from(task: &task_model::Task) -> Self {
        Self {
            task_guid: task.task_guid.clone(),
            domain: task.domain.clone(),
            state: task.state.as_i32(),
            cell_id: task.cell_id.clone(),
            result: task.result.clone(),
            failed: task.failed,
            failure_reason: task.failure_reason.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

impl TryFrom<Task> for task_model::Task {
    type Error = Error;

    fn try_from(task: Task) -> Result<Self, Self::Error> {
        Ok(Self {
            task_guid: task.task_guid,
            domain: task.domain,
            state: task_model::TaskState::from_i32(task.state)?,
            cell_id: task.cell_id,
            result: task.result,
            failed: task.failed,
            failure_reason: task.failure_reason,
            created_at: task.created_at,
            updated_at: task.updated_at,
        })
    }
}

// ── Requests and responses ─────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct PingResponse {
    #[prost(bool, tag = "1")]
    pub available: bool,
}

impl EmbeddedError for PingResponse {
    fn embedded_error(&self) -> Option<Error> {
        None
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct DomainsResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
    #[prost(string, repeated, tag = "2")]
    pub domains: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpsertDomainRequest {
    #[prost(string, tag = "1")]
    pub domain: String,
    #[prost(uint32, tag = "2")]
    pub ttl: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpsertDomainResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupsRequest {
    #[prost(string, tag = "1")]
    pub domain: String,
    #[prost(string, tag = "2")]
    pub cell_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupsResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
    #[prost(message, repeated, tag = "2")]
    pub actual_lrp_groups: Vec<ActualLrpGroup>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupsByProcessGuidRequest {
    #[prost(string, tag = "1")]
    pub process_guid: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupByProcessGuidAndIndexRequest {
    #[prost(string, tag = "1")]
    pub process_guid: String,
    #[prost(int32, tag = "2")]
    pub index: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_group: Option<ActualLrpGroup>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimActualLrpRequest {
    #[prost(string, tag = "1")]
    pub process_guid: String,
    #[prost(int32, tag = "2")]
    pub index: i32,
    #[prost(message, optional, tag = "3")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(message, optional, tag = "3")]
    pub actual_lrp_net_info: Option<ActualLrpNetInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CrashActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(string, tag = "3")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FailActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(string, tag = "2")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RemoveActualLrpRequest {
    #[prost(string, tag = "1")]
    pub process_guid: String,
    #[prost(int32, tag = "2")]
    pub index: i32,
    #[prost(message, optional, tag = "3")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RetireActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpLifecycleResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EvacuateClaimedActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EvacuateRunningActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(message, optional, tag = "3")]
    pub actual_lrp_net_info: Option<ActualLrpNetInfo>,
    #[prost(uint64, tag = "4")]
    pub ttl: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct EvacuateStoppedActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EvacuateCrashedActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(string, tag = "3")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RemoveEvacuatingActualLrpRequest {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EvacuationResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
    #[prost(bool, tag = "2")]
    pub keep_container: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartTaskRequest {
    #[prost(string, tag = "1")]
    pub task_guid: String,
    #[prost(string, tag = "2")]
    pub cell_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartTaskResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
    #[prost(bool, tag = "2")]
    pub should_start: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskGuidRequest {
    #[prost(string, tag = "1")]
    pub task_guid: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FailTaskRequest {
    #[prost(string, tag = "1")]
    pub task_guid: String,
    #[prost(string, tag = "2")]
    pub failure_reason: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CompleteTaskRequest {
    #[prost(string, tag = "1")]
    pub task_guid: String,
    #[prost(string, tag = "2")]
    pub cell_id: String,
    #[prost(bool, tag = "3")]
    pub failed: bool,
    #[prost(string, tag = "4")]
    pub failure_reason: String,
    #[prost(string, tag = "5")]
    pub result: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskLifecycleResponse {
    #[prost(message, optional, tag = "1")]
    pub error: Option<WireError>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EventsByCellId {
    #[prost(string, tag = "1")]
    pub cell_id: String,
}

embedded_error!(
    DomainsResponse,
    UpsertDomainResponse,
    ActualLrpGroupsResponse,
    ActualLrpGroupResponse,
    ActualLrpLifecycleResponse,
    EvacuationResponse,
    StartTaskResponse,
    TaskLifecycleResponse,
);

// ── Event payloads ─────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpGroupEvent {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_group: Option<ActualLrpGroup>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpChangedEvent {
    #[prost(message, optional, tag = "1")]
    pub before: Option<ActualLrpGroup>,
    #[prost(message, optional, tag = "2")]
    pub after: Option<ActualLrpGroup>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpCrashedEvent {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp_key: Option<ActualLrpKey>,
    #[prost(message, optional, tag = "2")]
    pub actual_lrp_instance_key: Option<ActualLrpInstanceKey>,
    #[prost(int32, tag = "3")]
    pub crash_count: i32,
    #[prost(string, tag = "4")]
    pub crash_reason: String,
    #[prost(int64, tag = "5")]
    pub since: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpInstanceEvent {
    #[prost(message, optional, tag = "1")]
    pub actual_lrp: Option<ActualLrp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActualLrpInstanceChangedEvent {
    #[prost(message, optional, tag = "1")]
    pub before: Option<ActualLrp>,
    #[prost(message, optional, tag = "2")]
    pub after: Option<ActualLrp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskEvent {
    #[prost(message, optional, tag = "1")]
    pub task: Option<Task>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskChangedEvent {
    #[prost(message, optional, tag = "1")]
    pub before: Option<Task>,
    #[prost(message, optional, tag = "2")]
    pub after: Option<Task>,
}

fn missing(field: &str) -> Error {
    Error::new(
        ErrorKind::InvalidProtobufMessage,
        format!("event payload is missing {field}"),
    )
}

fn group_of(group: Option<ActualLrpGroup>, field: &str) -> Result<model::ActualLrpGroup, Error> {
    group.ok_or_else(|| missing(field))?.try_into()
}

fn lrp_of(lrp: Option<ActualLrp>, field: &str) -> Result<model::ActualLrp, Error> {
    lrp.ok_or_else(|| missing(field))?.try_into()
}

fn task_of(task: Option<Task>, field: &str) -> Result<task_model::Task, Error> {
    task.ok_or_else(|| missing(field))?.try_into()
}

/// Serialize an event's payload; the event name travels separately.
pub fn encode_event(event: &Event) -> Vec<u8> {
    match event {
        Event::ActualLrpCreated { group } | Event::ActualLrpRemoved { group } => {
            ActualLrpGroupEvent {
                actual_lrp_group: Some(group.into()),
            }
            .encode_to_vec()
        }
        Event::ActualLrpChanged { before, after } => ActualLrpChangedEvent {
            before: Some(before.into()),
            after: Some(after.into()),
        }
        .encode_to_vec(),
        Event::ActualLrpCrashed(crashed) => ActualLrpCrashedEvent {
            actual_lrp_key: Some((&crashed.key).into()),
            actual_lrp_instance_key: Some((&crashed.instance_key).into()),
            crash_count: crashed.crash_count,
            crash_reason: crashed.crash_reason.clone(),
            since: crashed.since,
        }
        .encode_to_vec(),
        Event::ActualLrpInstanceCreated { lrp } | Event::ActualLrpInstanceRemoved { lrp } => {
            ActualLrpInstanceEvent {
                actual_lrp: Some(lrp.into()),
            }
            .encode_to_vec()
        }
        Event::ActualLrpInstanceChanged { before, after } => ActualLrpInstanceChangedEvent {
            before: Some(before.into()),
            after: Some(after.into()),
        }
        .encode_to_vec(),
        Event::TaskCreated { task } | Event::TaskRemoved { task } => TaskEvent {
            task: Some(task.into()),
        }
        .encode_to_vec(),
        Event::TaskChanged { before, after } => TaskChangedEvent {
            before: Some(before.into()),
            after: Some(after.into()),
        }
        .encode_to_vec(),
    }
}

fn decode<M: Message + Default>(data: &[u8]) -> Result<M, Error> {
    M::decode(data).map_err(|e| {
        Error::new(
            ErrorKind::InvalidProtobufMessage,
            format!("failed to unmarshal proto: {e}"),
        )
    })
}

/// Rebuild a typed event from its name and protobuf payload.
pub fn decode_event(event_type: &str, data: &[u8]) -> Result<Event, Error> {
    let event = match event_type {
        events::ACTUAL_LRP_CREATED => Event::ActualLrpCreated {
            group: group_of(decode::<ActualLrpGroupEvent>(data)?.actual_lrp_group, "group")?,
        },
        events::ACTUAL_LRP_REMOVED => Event::ActualLrpRemoved {
            group: group_of(decode::<ActualLrpGroupEvent>(data)?.actual_lrp_group, "group")?,
        },
        events::ACTUAL_LRP_CHANGED => {
            let payload = decode::<ActualLrpChangedEvent>(data)?;
            Event::ActualLrpChanged {
                before: group_of(payload.before, "before")?,
                after: group_of(payload.after, "after")?,
            }
        }
        events::ACTUAL_LRP_CRASHED => {
            let payload = decode::<ActualLrpCrashedEvent>(data)?;
            Event::ActualLrpCrashed(ActualLrpCrashed {
                key: payload.actual_lrp_key.ok_or_else(|| missing("key"))?.into(),
                instance_key: payload.actual_lrp_instance_key.unwrap_or_default().into(),
                crash_count: payload.crash_count,
                crash_reason: payload.crash_reason,
                since: payload.since,
            })
        }
        events::ACTUAL_LRP_INSTANCE_CREATED => Event::ActualLrpInstanceCreated {
            lrp: lrp_of(decode::<ActualLrpInstanceEvent>(data)?.actual_lrp, "actual_lrp")?,
        },
        events::ACTUAL_LRP_INSTANCE_REMOVED => Event::ActualLrpInstanceRemoved {
            lrp: lrp_of(decode::<ActualLrpInstanceEvent>(data)?.actual_lrp, "actual_lrp")?,
        },
        events::ACTUAL_LRP_INSTANCE_CHANGED => {
            let payload = decode::<ActualLrpInstanceChangedEvent>(data)?;
            Event::ActualLrpInstanceChanged {
                before: lrp_of(payload.before, "before")?,
                after: lrp_of(payload.after, "after")?,
            }
        }
        events::TASK_CREATED => Event::TaskCreated {
            task: task_of(decode::<TaskEvent>(data)?.task, "task")?,
        },
        events::TASK_REMOVED => Event::TaskRemoved {
            task: task_of(decode::<TaskEvent>(data)?.task, "task")?,
        },
        events::TASK_CHANGED => {
            let payload = decode::<TaskChangedEvent>(data)?;
            Event::TaskChanged {
                before: task_of(payload.before, "before")?,
                after: task_of(payload.after, "after")?,
            }
        }
        other => {
            return Err(Error::new(
                ErrorKind::InvalidRecord,
                format!("unknown event type: {other}"),
            ));
        }
    };
    Ok(event)
}
