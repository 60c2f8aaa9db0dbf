//! bbs-events — turning actual LRP mutations into subscriber events.
//!
//! The calculator compares the records of one scheduling slot before and
//! after a lifecycle call and publishes two views of the change: group
//! events for legacy consumers and instance events keyed by instance.
//!
//! # Architecture
//!
//! ```text
//! controller ── record_change ──► after set
//!      │
//!      └─ emit_events(before, after)
//!             ├─ group_events    ──► group hub
//!             └─ instance_events ──► instance hub
//!                                      │
//!                              BroadcastHub ──► subscribers
//! ```

pub mod calculator;
pub mod hub;

pub use calculator::{
    ActualLrpEventCalculator, align, event_score, group_events, instance_events, record_change,
};
pub use hub::{BroadcastHub, Hub};
