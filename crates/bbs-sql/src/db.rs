//! Store traits consumed by the lifecycle controller.
//!
//! Errors at this boundary are already classified into
//! [`bbs_models::Error`]; callers never see raw driver failures.

use async_trait::async_trait;
use bbs_models::{ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, ModelResult};

/// Narrows an actual LRP listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualLrpFilter {
    pub domain: Option<String>,
    pub cell_id: Option<String>,
    pub process_guid: Option<String>,
    pub index: Option<i32>,
}

impl ActualLrpFilter {
    /// Every row of one slot, whatever its presence.
    pub fn slot(process_guid: impl Into<String>, index: i32) -> Self {
        Self {
            process_guid: Some(process_guid.into()),
            index: Some(index),
            ..Self::default()
        }
    }
}

/// Result of a crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashOutcome {
    pub before: ActualLrp,
    pub after: ActualLrp,
    /// The crash was within the immediate-restart budget and the slot went
    /// straight back to Unclaimed.
    pub should_restart: bool,
}

#[async_trait]
pub trait ActualLrpDb: Send + Sync {
    async fn actual_lrps(&self, filter: &ActualLrpFilter) -> ModelResult<Vec<ActualLrp>>;

    async fn create_unclaimed_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp>;

    async fn unclaim_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<(ActualLrp, ActualLrp)>;

    async fn claim_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<(ActualLrp, ActualLrp)>;

    /// `before` is `None` when the slot had no ordinary row and one was
    /// created in the Running state.
    async fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<(Option<ActualLrp>, ActualLrp)>;

    async fn crash_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> ModelResult<CrashOutcome>;

    async fn fail_actual_lrp(
        &self,
        key: &ActualLrpKey,
        placement_error: &str,
    ) -> ModelResult<(ActualLrp, ActualLrp)>;

    /// Delete the ordinary row, optionally only if it belongs to
    /// `instance_key`. Nothing deleted is ResourceNotFound.
    async fn remove_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> ModelResult<()>;

    async fn evacuate_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<ActualLrp>;

    /// Returns the removed row, or `None` when there was nothing to remove.
    async fn remove_evacuating_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<Option<ActualLrp>>;

    async fn remove_suspect_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp>;
}

#[async_trait]
pub trait DomainDb: Send + Sync {
    /// Domains whose expiry is still in the future.
    async fn domains(&self) -> ModelResult<Vec<String>>;

    /// Create or refresh a domain. A `ttl` of zero never expires.
    async fn upsert_domain(&self, domain: &str, ttl_secs: u32) -> ModelResult<()>;
}
