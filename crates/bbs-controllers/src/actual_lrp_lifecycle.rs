//! Claim, start, crash, fail and remove for actual LRPs.

use std::sync::Arc;

use bbs_events::{ActualLrpEventCalculator, Hub};
use bbs_models::{
    ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, Error, ErrorKind,
    ModelResult, Presence,
};
use bbs_sql::{ActualLrpDb, ActualLrpFilter};
use tracing::{error, info, warn};

use crate::slot::{find_instance, find_with_presence, snapshot};

#[derive(Clone)]
pub struct ActualLrpLifecycleController {
    db: Arc<dyn ActualLrpDb>,
    events: ActualLrpEventCalculator,
}

impl ActualLrpLifecycleController {
    pub fn new(db: Arc<dyn ActualLrpDb>, group_hub: Arc<dyn Hub>, instance_hub: Arc<dyn Hub>) -> Self {
        Self {
            db,
            events: ActualLrpEventCalculator::new(group_hub, instance_hub),
        }
    }

    async fn slot(&self, process_guid: &str, index: i32) -> ModelResult<Vec<ActualLrp>> {
        self.db
            .actual_lrps(&ActualLrpFilter::slot(process_guid, index))
            .await
    }

    /// Create the unclaimed record for a new slot.
    pub async fn create_unclaimed_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<()> {
        let lrp = self.db.create_unclaimed_actual_lrp(key).await?;
        let after_set = self.events.record_change(None, Some(&lrp), &[]);
        self.events.emit_events(&[], &after_set);
        Ok(())
    }

    pub async fn claim_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<()> {
        let lrps = self.slot(process_guid, index).await?;
        let (before, after) = self
            .db
            .claim_actual_lrp(process_guid, index, instance_key)
            .await?;

        let before_set = snapshot(&lrps);
        let after_set = self.events.record_change(Some(&before), Some(&after), &before_set);
        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    /// Start `instance_key` in the slot. A start reported by a suspect
    /// instance is ignored. Once the ordinary row is running, any evacuating
    /// or suspect row left in the slot is removed.
    pub async fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<()> {
        let lrps = match self.slot(&key.process_guid, key.index).await {
            Err(err) if err.is(ErrorKind::ResourceNotFound) => Vec::new(),
            other => other?,
        };

        if let Some(lrp) = find_instance(&lrps, instance_key) {
            if lrp.presence == Presence::Suspect {
                info!(
                    process_guid = %key.process_guid,
                    index = key.index,
                    instance_guid = %instance_key.instance_guid,
                    state = %lrp.state,
                    "ignored start request from suspect"
                );
                return Ok(());
            }
        }

        let (before, after) = self
            .db
            .start_actual_lrp(key, instance_key, net_info)
            .await?;

        let before_set = snapshot(&lrps);
        let mut after_set = self
            .events
            .record_change(before.as_ref(), Some(&after), &before_set);

        if let Some(evacuating) = find_with_presence(&lrps, Presence::Evacuating) {
            match self
                .db
                .remove_evacuating_actual_lrp(&evacuating.key, &evacuating.instance_key)
                .await
            {
                Ok(_) => {
                    after_set = self.events.record_change(Some(evacuating), None, &after_set);
                }
                Err(err) => {
                    warn!(error = %err, process_guid = %key.process_guid, index = key.index, "failed to remove evacuating lrp")
                }
            }
        }

        if find_with_presence(&lrps, Presence::Suspect).is_some() {
            match self.db.remove_suspect_actual_lrp(key).await {
                Ok(suspect) => {
                    after_set = self.events.record_change(Some(&suspect), None, &after_set);
                }
                Err(err) => {
                    error!(error = %err, process_guid = %key.process_guid, index = key.index, "failed to remove suspect lrp")
                }
            }
        }

        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    /// Report a crash. A crash from the suspect instance only removes the
    /// suspect row; the ordinary row is left to its own lifecycle.
    pub async fn crash_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> ModelResult<()> {
        let lrps = self.slot(&key.process_guid, key.index).await?;
        let before_set = snapshot(&lrps);

        if find_instance(&lrps, instance_key).is_some_and(|lrp| lrp.presence == Presence::Suspect) {
            let suspect = self.db.remove_suspect_actual_lrp(key).await?;
            info!(
                process_guid = %key.process_guid,
                index = key.index,
                instance_guid = %suspect.instance_key.instance_guid,
                "removing suspect lrp"
            );
            let after_set = self.events.record_change(Some(&suspect), None, &before_set);
            self.events.emit_events(&before_set, &after_set);
            return Ok(());
        }

        let outcome = self
            .db
            .crash_actual_lrp(key, instance_key, crash_reason)
            .await?;
        let after_set = self
            .events
            .record_change(Some(&outcome.before), Some(&outcome.after), &before_set);
        self.events.emit_events(&before_set, &after_set);

        if outcome.should_restart {
            info!(
                process_guid = %key.process_guid,
                index = key.index,
                crash_count = outcome.after.crash_count,
                "crashed lrp awaiting placement"
            );
        }
        Ok(())
    }

    /// Record a placement failure. A slot that no longer exists is not an
    /// error.
    pub async fn fail_actual_lrp(&self, key: &ActualLrpKey, placement_error: &str) -> ModelResult<()> {
        let lrps = self.slot(&key.process_guid, key.index).await?;

        let (before, after) = match self.db.fail_actual_lrp(key, placement_error).await {
            Ok(changed) => changed,
            Err(err) if err.is(ErrorKind::ResourceNotFound) => {
                info!(process_guid = %key.process_guid, index = key.index, "failed lrp no longer exists");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let before_set = snapshot(&lrps);
        let after_set = self.events.record_change(Some(&before), Some(&after), &before_set);
        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    /// Remove the ordinary row of a slot.
    pub async fn remove_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> ModelResult<()> {
        let lrps = self.slot(process_guid, index).await?;
        let Some(lrp) = find_with_presence(&lrps, Presence::Ordinary) else {
            return Err(Error::resource_not_found());
        };

        self.db
            .remove_actual_lrp(process_guid, index, instance_key)
            .await?;

        let before_set = snapshot(&lrps);
        let after_set = self.events.record_change(Some(lrp), None, &before_set);
        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }
}
