//! bbs-controllers — lifecycle orchestration.
//!
//! Each controller call reads the slot, applies the mutation through the
//! store, records the change against the slot snapshot, and hands both sets
//! to the event calculator.
//!
//! # Architecture
//!
//! ```text
//! ActualLrpLifecycleController   create / claim / start / crash / fail / remove
//! EvacuationController           evacuate claimed / running / stopped / crashed
//!        │
//!        ├─ ActualLrpDb::actual_lrps(slot)   before set
//!        ├─ ActualLrpDb mutation
//!        ├─ record_change(before, after)     after set
//!        └─ emit_events(before set, after set) ──► group hub, instance hub
//! ```

pub mod actual_lrp_lifecycle;
pub mod evacuation;
mod slot;

#[cfg(test)]
mod testing;

pub use actual_lrp_lifecycle::ActualLrpLifecycleController;
pub use evacuation::EvacuationController;
