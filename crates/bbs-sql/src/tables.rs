//! Table names, column lists, and schema for the BBS store.
//!
//! Actual LRP rows are keyed by `(process_guid, instance_index, presence)`,
//! so each slot holds at most one ordinary, one evacuating, and one suspect
//! row. `net_info` is JSON text.

pub const ACTUAL_LRPS: &str = "actual_lrps";
pub const DOMAINS: &str = "domains";

pub const ACTUAL_LRP_COLUMNS: [&str; 14] = [
    "actual_lrps.process_guid",
    "actual_lrps.instance_index",
    "actual_lrps.presence",
    "actual_lrps.domain",
    "actual_lrps.state",
    "actual_lrps.instance_guid",
    "actual_lrps.cell_id",
    "actual_lrps.placement_error",
    "actual_lrps.since",
    "actual_lrps.net_info",
    "actual_lrps.modification_tag_epoch",
    "actual_lrps.modification_tag_index",
    "actual_lrps.crash_count",
    "actual_lrps.crash_reason",
];

pub const DOMAIN_COLUMNS: [&str; 1] = ["domains.domain"];

/// Longest stored `crash_reason` / `placement_error`.
pub const MAX_REASON_LEN: usize = 1024;

/// Matches one row of a slot.
pub const SLOT_WHERE: &str = "process_guid = ? AND instance_index = ? AND presence = ?";

pub const CREATE_ACTUAL_LRPS: &str = "CREATE TABLE IF NOT EXISTS actual_lrps (
    process_guid VARCHAR(255) NOT NULL,
    instance_index INTEGER NOT NULL,
    presence INTEGER NOT NULL DEFAULT 0,
    domain VARCHAR(255) NOT NULL,
    state VARCHAR(255) NOT NULL,
    instance_guid VARCHAR(255) NOT NULL DEFAULT '',
    cell_id VARCHAR(255) NOT NULL DEFAULT '',
    placement_error VARCHAR(1024) NOT NULL DEFAULT '',
    since BIGINT DEFAULT 0,
    net_info TEXT NOT NULL,
    modification_tag_epoch VARCHAR(255) NOT NULL,
    modification_tag_index INTEGER,
    crash_count INTEGER NOT NULL DEFAULT 0,
    crash_reason VARCHAR(1024) NOT NULL DEFAULT '',
    PRIMARY KEY (process_guid, instance_index, presence)
)";

pub const CREATE_DOMAINS: &str = "CREATE TABLE IF NOT EXISTS domains (
    domain VARCHAR(255) PRIMARY KEY,
    expire_time BIGINT DEFAULT 0
)";

pub const SCHEMA: [&str; 2] = [CREATE_ACTUAL_LRPS, CREATE_DOMAINS];
