//! Actual LRP records and group resolution.
//!
//! One scheduling slot (`ActualLrpKey`) can be backed by up to three rows,
//! one per [`Presence`]. The group view used by legacy consumers combines
//! the instance-position row with the evacuating row.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Time after which a running LRP's crash count starts over.
pub const CRASH_RESET_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// ── Keys ───────────────────────────────────────────────────────────

/// Identifies a scheduling slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActualLrpKey {
    pub process_guid: String,
    pub index: i32,
    pub domain: String,
}

impl ActualLrpKey {
    pub fn new(process_guid: impl Into<String>, index: i32, domain: impl Into<String>) -> Self {
        Self {
            process_guid: process_guid.into(),
            index,
            domain: domain.into(),
        }
    }
}

impl fmt::Display for ActualLrpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process_guid, self.index)
    }
}

/// Identifies the physical instance occupying a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActualLrpInstanceKey {
    pub instance_guid: String,
    pub cell_id: String,
}

impl ActualLrpInstanceKey {
    pub fn new(instance_guid: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self {
            instance_guid: instance_guid.into(),
            cell_id: cell_id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instance_guid.is_empty() && self.cell_id.is_empty()
    }
}

// ── Net info ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u32,
    pub host_port: u32,
}

/// Addressing for a running instance. Persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpNetInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub instance_address: String,
}

impl ActualLrpNetInfo {
    pub fn new(address: impl Into<String>, ports: Vec<PortMapping>) -> Self {
        Self {
            address: address.into(),
            ports,
            instance_address: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.ports.is_empty() && self.instance_address.is_empty()
    }
}

// ── State and presence ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActualLrpState {
    #[default]
    Unclaimed,
    Claimed,
    Running,
    Crashed,
}

impl ActualLrpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "UNCLAIMED",
            Self::Claimed => "CLAIMED",
            Self::Running => "RUNNING",
            Self::Crashed => "CRASHED",
        }
    }
}

impl fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActualLrpState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNCLAIMED" => Ok(Self::Unclaimed),
            "CLAIMED" => Ok(Self::Claimed),
            "RUNNING" => Ok(Self::Running),
            "CRASHED" => Ok(Self::Crashed),
            other => Err(Error::new(
                ErrorKind::InvalidRecord,
                format!("unknown actual lrp state: {other}"),
            )),
        }
    }
}

/// Which of the slot's physical rows a record is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    #[default]
    Ordinary,
    Evacuating,
    Suspect,
}

impl Presence {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ordinary => 0,
            Self::Evacuating => 1,
            Self::Suspect => 2,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Ordinary),
            1 => Ok(Self::Evacuating),
            2 => Ok(Self::Suspect),
            other => Err(Error::new(
                ErrorKind::InvalidRecord,
                format!("unknown actual lrp presence: {other}"),
            )),
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ordinary => "ORDINARY",
            Self::Evacuating => "EVACUATING",
            Self::Suspect => "SUSPECT",
        })
    }
}

/// Optimistic-concurrency tag bumped on every mutation of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationTag {
    pub epoch: String,
    pub index: u32,
}

impl ModificationTag {
    pub fn new(epoch: impl Into<String>, index: u32) -> Self {
        Self {
            epoch: epoch.into(),
            index,
        }
    }

    pub fn increment(&mut self) {
        self.index += 1;
    }
}

// ── ActualLrp ──────────────────────────────────────────────────────

/// The full actual LRP record. Equality covers every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrp {
    pub key: ActualLrpKey,
    pub instance_key: ActualLrpInstanceKey,
    pub net_info: ActualLrpNetInfo,
    pub state: ActualLrpState,
    pub presence: Presence,
    pub crash_count: i32,
    pub crash_reason: String,
    pub placement_error: String,
    /// Unix nanoseconds of the last state change.
    pub since: i64,
    pub modification_tag: ModificationTag,
}

impl ActualLrp {
    /// An unclaimed placeholder for a slot.
    pub fn unclaimed(key: ActualLrpKey, since: i64) -> Self {
        Self {
            key,
            since,
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ActualLrpState::Running
    }

    /// Whether moving to `new_state` with `instance_key` is a legal lifecycle
    /// transition from this record.
    pub fn allows_transition_to(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        new_state: ActualLrpState,
    ) -> bool {
        use ActualLrpState::*;

        if &self.key != key {
            return false;
        }

        let same_instance = &self.instance_key == instance_key;
        match (self.state, new_state) {
            (Unclaimed, Unclaimed | Claimed | Running) => true,
            (Unclaimed, Crashed) => false,

            (Claimed, Unclaimed) => instance_key.is_empty(),
            (Claimed, Claimed) => same_instance,
            (Claimed, Running) => true,
            (Claimed, Crashed) => same_instance,

            (Running, Unclaimed) => instance_key.is_empty(),
            (Running, Claimed | Running | Crashed) => same_instance,

            (Crashed, Unclaimed) => instance_key.is_empty(),
            (Crashed, Claimed | Running) => same_instance,
            (Crashed, Crashed) => false,
        }
    }

    pub fn should_restart_immediately(&self, calculator: &RestartCalculator) -> bool {
        calculator.should_restart(0, 0, self.crash_count)
    }

    /// Whether a crashed LRP has waited out its backoff at `now` (unix nanos).
    pub fn should_restart_crash(&self, now: i64, calculator: &RestartCalculator) -> bool {
        self.state == ActualLrpState::Crashed
            && calculator.should_restart(now, self.since, self.crash_count)
    }

    /// Wrap this record into a single-slot group according to its presence.
    pub fn to_group(&self) -> ActualLrpGroup {
        match self.presence {
            Presence::Evacuating => ActualLrpGroup {
                instance: None,
                evacuating: Some(self.clone()),
            },
            Presence::Ordinary | Presence::Suspect => ActualLrpGroup {
                instance: Some(self.clone()),
                evacuating: None,
            },
        }
    }
}

// ── Restart policy ─────────────────────────────────────────────────

/// Crash-restart policy: a few immediate restarts, then exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartCalculator {
    pub immediate_restarts: i32,
    pub max_backoff_count: i32,
    pub max_restart_attempts: i32,
}

impl RestartCalculator {
    pub const DEFAULT_IMMEDIATE_RESTARTS: i32 = 3;
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(16 * 60);
    pub const DEFAULT_MAX_RESTARTS: i32 = 200;
    pub const MIN_BACKOFF: Duration = Duration::from_secs(30);

    pub fn new(immediate_restarts: i32, max_backoff: Duration, max_restart_attempts: i32) -> Self {
        let steps = max_backoff.as_nanos() / Self::MIN_BACKOFF.as_nanos();
        let max_backoff_count = if steps == 0 { 0 } else { steps.ilog2() as i32 };
        Self {
            immediate_restarts,
            max_backoff_count,
            max_restart_attempts,
        }
    }

    pub fn backoff_for(&self, crash_count: i32) -> Duration {
        let exponent = (crash_count - self.immediate_restarts).clamp(0, self.max_backoff_count);
        Self::MIN_BACKOFF * (1u32 << exponent)
    }

    pub fn should_restart(&self, now: i64, crashed_at: i64, crash_count: i32) -> bool {
        if crash_count < self.immediate_restarts {
            return true;
        }
        if crash_count < self.max_restart_attempts {
            let backoff = self.backoff_for(crash_count).as_nanos() as i64;
            return now.saturating_sub(crashed_at) >= backoff;
        }
        false
    }
}

impl Default for RestartCalculator {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_IMMEDIATE_RESTARTS,
            Self::DEFAULT_MAX_BACKOFF,
            Self::DEFAULT_MAX_RESTARTS,
        )
    }
}

// ── Groups ─────────────────────────────────────────────────────────

/// Resolved view of one slot: the instance position plus the evacuating row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpGroup {
    pub instance: Option<ActualLrp>,
    pub evacuating: Option<ActualLrp>,
}

impl ActualLrpGroup {
    pub fn is_empty(&self) -> bool {
        self.instance.is_none() && self.evacuating.is_none()
    }

    /// The authoritative record: the instance if present, else the
    /// evacuating one.
    pub fn resolve(&self) -> Option<&ActualLrp> {
        self.instance.as_ref().or(self.evacuating.as_ref())
    }

    fn place(&mut self, lrp: &ActualLrp) {
        match lrp.presence {
            Presence::Evacuating => self.evacuating = Some(lrp.clone()),
            Presence::Ordinary | Presence::Suspect => {
                if instance_rank(lrp) > self.instance.as_ref().map_or(0, instance_rank) {
                    self.instance = Some(lrp.clone());
                }
            }
        }
    }
}

/// Precedence for the instance position. A running ordinary row replaces a
/// suspect; a suspect shadows an ordinary row that is not yet running.
fn instance_rank(lrp: &ActualLrp) -> u8 {
    match (lrp.presence, lrp.state) {
        (Presence::Ordinary, ActualLrpState::Running) => 3,
        (Presence::Suspect, _) => 2,
        (Presence::Ordinary, _) => 1,
        (Presence::Evacuating, _) => 0,
    }
}

/// Resolve the group for candidates sharing one `ActualLrpKey`.
///
/// Empty input resolves to an empty group. Candidates for more than one key
/// are a caller error; only the first key's group is returned.
pub fn resolve_group(candidates: &[ActualLrp]) -> ActualLrpGroup {
    resolve_groups(candidates).into_iter().next().unwrap_or_default()
}

/// Partition records into one group per `ActualLrpKey`, in first-seen order.
pub fn resolve_groups(lrps: &[ActualLrp]) -> Vec<ActualLrpGroup> {
    let mut positions: HashMap<&ActualLrpKey, usize> = HashMap::new();
    let mut groups: Vec<ActualLrpGroup> = Vec::new();

    for lrp in lrps {
        let position = *positions.entry(&lrp.key).or_insert_with(|| {
            groups.push(ActualLrpGroup::default());
            groups.len() - 1
        });
        groups[position].place(lrp);
    }

    groups
}
