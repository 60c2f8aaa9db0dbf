//! Evacuation of actual LRPs off a draining cell.
//!
//! A cell that is shutting down reports each of its instances here. A
//! running instance keeps serving as an evacuating record while its ordinary
//! row goes back to unclaimed for placement elsewhere; the evacuating record
//! is dropped once the replacement runs. Every call answers whether the cell
//! should keep the container.

use std::sync::Arc;

use bbs_events::{ActualLrpEventCalculator, Hub};
use bbs_models::{
    ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, ActualLrpState, Error,
    ErrorKind, ModelResult, Presence,
};
use bbs_sql::{ActualLrpDb, ActualLrpFilter};
use tracing::{debug, error, info};

use crate::slot::{find_instance, find_with_presence, snapshot};

#[derive(Clone)]
pub struct EvacuationController {
    db: Arc<dyn ActualLrpDb>,
    events: ActualLrpEventCalculator,
}

impl EvacuationController {
    pub fn new(db: Arc<dyn ActualLrpDb>, group_hub: Arc<dyn Hub>, instance_hub: Arc<dyn Hub>) -> Self {
        Self {
            db,
            events: ActualLrpEventCalculator::new(group_hub, instance_hub),
        }
    }

    async fn slot(&self, key: &ActualLrpKey) -> ModelResult<Vec<ActualLrp>> {
        self.db
            .actual_lrps(&ActualLrpFilter::slot(&key.process_guid, key.index))
            .await
    }

    /// Drop the evacuating record held by `instance_key`.
    pub async fn remove_evacuating_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<()> {
        let lrps = self.slot(key).await?;
        let Some(lrp) = find_instance(&lrps, instance_key) else {
            debug!(process_guid = %key.process_guid, index = key.index, "actual lrp not found");
            return Err(Error::resource_not_found());
        };
        if lrp.presence != Presence::Evacuating {
            info!(process_guid = %key.process_guid, index = key.index, "no evacuating lrp for instance");
            return Err(Error::resource_not_found());
        }

        let replacement = find_with_presence(&lrps, Presence::Ordinary);
        info!(
            process_guid = %key.process_guid,
            index = key.index,
            instance_guid = %instance_key.instance_guid,
            replacement_instance_guid = replacement.map(|lrp| lrp.instance_key.instance_guid.as_str()),
            replacement_state = replacement.map(|lrp| lrp.state.as_str()),
            "removing stranded evacuating lrp"
        );

        self.db.remove_evacuating_actual_lrp(key, instance_key).await?;

        let before_set = snapshot(&lrps);
        let after_set = self.events.record_change(Some(lrp), None, &before_set);
        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    /// A claimed instance never started serving, so the slot simply goes back
    /// to unclaimed. The container is never kept.
    pub async fn evacuate_claimed_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<bool> {
        let lrps = self.slot(key).await?;
        let before_set = snapshot(&lrps);
        let mut after_set = before_set.clone();

        if self
            .remove_evacuating_or_suspect(&lrps, key, instance_key, &mut after_set)
            .await?
        {
            self.events.emit_events(&before_set, &after_set);
            return Ok(false);
        }

        match self.db.unclaim_actual_lrp(key).await {
            Ok((before, after)) => {
                after_set = self.events.record_change(Some(&before), Some(&after), &after_set);
                info!(process_guid = %key.process_guid, index = key.index, "evacuated claimed lrp awaiting placement");
            }
            Err(err) if err.is(ErrorKind::ResourceNotFound) => {}
            Err(err) => return Err(err),
        }

        self.events.emit_events(&before_set, &after_set);
        Ok(false)
    }

    /// Returns whether the cell should keep the container running.
    ///
    /// The instance becomes (or stays) the evacuating record until its
    /// replacement runs. Once the replacement runs or crashes, or the
    /// ordinary row is gone, the evacuating record is removed instead.
    pub async fn evacuate_running_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<bool> {
        let lrps = self.slot(key).await?;
        if lrps.is_empty() {
            return Ok(false);
        }

        let target = find_instance(&lrps, instance_key);
        let ordinary = find_with_presence(&lrps, Presence::Ordinary);
        let replacement_running = ordinary.is_some_and(|lrp| {
            Some(lrp) != target
                && matches!(lrp.state, ActualLrpState::Running | ActualLrpState::Crashed)
        });

        if ordinary.is_none() || replacement_running {
            return self.drop_evacuating(&lrps, target).await.map(|()| false);
        }

        match target {
            None => self.upsert_evacuating(&lrps, None, key, instance_key, net_info).await,
            Some(lrp) if lrp.presence == Presence::Evacuating => {
                self.upsert_evacuating(&lrps, Some(lrp), key, instance_key, net_info)
                    .await
            }
            Some(lrp) if matches!(lrp.state, ActualLrpState::Running | ActualLrpState::Claimed) => {
                self.evacuate_instance(&lrps, lrp).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// The instance stopped; its record leaves the slot.
    pub async fn evacuate_stopped_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<()> {
        let lrps = self.slot(key).await?;
        let before_set = snapshot(&lrps);
        let mut after_set = before_set.clone();

        if !self
            .remove_evacuating_or_suspect(&lrps, key, instance_key, &mut after_set)
            .await?
        {
            self.db
                .remove_actual_lrp(&key.process_guid, key.index, Some(instance_key))
                .await
                .inspect_err(|err| error!(error = %err, %key, "failed to remove actual lrp"))?;
            after_set = self
                .events
                .record_change(find_instance(&lrps, instance_key), None, &after_set);
        }

        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    pub async fn evacuate_crashed_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> ModelResult<()> {
        let lrps = self.slot(key).await?;
        let before_set = snapshot(&lrps);
        let mut after_set = before_set.clone();

        if !self
            .remove_evacuating_or_suspect(&lrps, key, instance_key, &mut after_set)
            .await?
        {
            let outcome = self
                .db
                .crash_actual_lrp(key, instance_key, crash_reason)
                .await
                .inspect_err(|err| error!(error = %err, %key, "failed to crash actual lrp"))?;
            after_set = self.events.record_change(
                Some(&outcome.before),
                Some(&outcome.after),
                &after_set,
            );
        }

        self.events.emit_events(&before_set, &after_set);
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────────

    /// Remove the record held by `instance_key` when it is evacuating or
    /// suspect. Returns `false` for an ordinary record, which the caller
    /// transitions itself.
    async fn remove_evacuating_or_suspect(
        &self,
        lrps: &[ActualLrp],
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        after_set: &mut Vec<Option<ActualLrp>>,
    ) -> ModelResult<bool> {
        let Some(lrp) = find_instance(lrps, instance_key) else {
            debug!(process_guid = %key.process_guid, index = key.index, "actual lrp not found");
            return Err(Error::resource_not_found());
        };

        match lrp.presence {
            Presence::Evacuating => {
                self.db
                    .remove_evacuating_actual_lrp(key, instance_key)
                    .await
                    .inspect_err(|err| error!(error = %err, %key, "failed to remove evacuating lrp"))?;
            }
            Presence::Suspect => {
                self.db
                    .remove_suspect_actual_lrp(key)
                    .await
                    .inspect_err(|err| error!(error = %err, %key, "failed to remove suspect lrp"))?;
            }
            Presence::Ordinary => return Ok(false),
        }

        *after_set = self.events.record_change(Some(lrp), None, after_set);
        Ok(true)
    }

    async fn drop_evacuating(&self, lrps: &[ActualLrp], target: Option<&ActualLrp>) -> ModelResult<()> {
        let Some(target) = target else {
            return Ok(());
        };

        let before_set = snapshot(lrps);
        match self
            .db
            .remove_evacuating_actual_lrp(&target.key, &target.instance_key)
            .await
        {
            Ok(Some(removed)) => {
                let after_set = self.events.record_change(Some(&removed), None, &before_set);
                self.events.emit_events(&before_set, &after_set);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) if err.is(ErrorKind::ActualLrpCannotBeRemoved) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Create the evacuating record, or refresh the one this instance holds.
    /// An evacuating record owned by another cell wins.
    async fn upsert_evacuating(
        &self,
        lrps: &[ActualLrp],
        existing: Option<&ActualLrp>,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<bool> {
        if find_with_presence(lrps, Presence::Evacuating).is_some_and(|lrp| Some(lrp) != existing) {
            info!(process_guid = %key.process_guid, index = key.index, "already evacuated by a different cell");
            return Ok(false);
        }

        let evacuating = match self.db.evacuate_actual_lrp(key, instance_key, net_info).await {
            Ok(lrp) => lrp,
            Err(err) if err.is(ErrorKind::ResourceExists) => return Ok(true),
            Err(err) => {
                error!(error = %err, %key, "failed to evacuate actual lrp");
                return Err(err);
            }
        };

        let before_set = snapshot(lrps);
        let after_set = self.events.record_change(existing, Some(&evacuating), &before_set);
        self.events.emit_events(&before_set, &after_set);
        Ok(true)
    }

    /// Move a serving instance to the evacuating position and put its slot
    /// back up for placement.
    async fn evacuate_instance(&self, lrps: &[ActualLrp], lrp: &ActualLrp) -> ModelResult<()> {
        let evacuating = self
            .db
            .evacuate_actual_lrp(&lrp.key, &lrp.instance_key, &lrp.net_info)
            .await?;

        // Same instance guid on both sides, so this reads as one change.
        let before_set = snapshot(lrps);
        let mut after_set = self.events.record_change(Some(lrp), Some(&evacuating), &before_set);

        let result = if lrp.presence == Presence::Suspect {
            self.db
                .remove_suspect_actual_lrp(&lrp.key)
                .await
                .map(|_| ())
                .inspect_err(|err| error!(error = %err, key = %lrp.key, "failed to remove suspect lrp"))
        } else {
            self.db.unclaim_actual_lrp(&lrp.key).await.map(|(_, unclaimed)| {
                // The ordinary row lost its instance, so it arrives as new.
                after_set = self.events.record_change(None, Some(&unclaimed), &after_set);
                info!(
                    process_guid = %lrp.key.process_guid,
                    index = lrp.key.index,
                    instance_guid = %lrp.instance_key.instance_guid,
                    "evacuated lrp awaiting placement"
                );
            })
        };

        self.events.emit_events(&before_set, &after_set);
        result
    }
}

#[cfg(test)]
mod tests {
    use bbs_events::BroadcastHub;
    use bbs_models::Event;
    use tokio::sync::broadcast::Receiver;

    use super::*;
    use crate::testing::InMemoryActualLrpDb;

    fn key() -> ActualLrpKey {
        ActualLrpKey::new("some-process-guid", 0, "some-domain")
    }

    fn instance(guid: &str) -> ActualLrpInstanceKey {
        ActualLrpInstanceKey::new(guid, "cell-1")
    }

    fn net_info() -> ActualLrpNetInfo {
        ActualLrpNetInfo::new("10.0.0.1", Vec::new())
    }

    fn unclaimed() -> ActualLrp {
        ActualLrp::unclaimed(key(), 1)
    }

    fn with(guid: &str, state: ActualLrpState, presence: Presence) -> ActualLrp {
        ActualLrp {
            instance_key: instance(guid),
            net_info: net_info(),
            state,
            presence,
            ..unclaimed()
        }
    }

    struct Fixture {
        db: Arc<InMemoryActualLrpDb>,
        controller: EvacuationController,
        group: Receiver<Event>,
        instance: Receiver<Event>,
    }

    impl Fixture {
        fn new(lrps: Vec<ActualLrp>) -> Self {
            let db = Arc::new(InMemoryActualLrpDb::new(lrps));
            let group_hub = Arc::new(BroadcastHub::new("group", 32));
            let instance_hub = Arc::new(BroadcastHub::new("instance", 32));
            let group = group_hub.subscribe();
            let instance = instance_hub.subscribe();
            Self {
                controller: EvacuationController::new(db.clone(), group_hub, instance_hub),
                db,
                group,
                instance,
            }
        }

        fn group_events(&mut self) -> Vec<&'static str> {
            drain(&mut self.group)
        }

        fn instance_events(&mut self) -> Vec<&'static str> {
            drain(&mut self.instance)
        }

        fn with_presence(&self, presence: Presence) -> Option<ActualLrp> {
            self.db.rows().into_iter().find(|lrp| lrp.presence == presence)
        }
    }

    fn drain(rx: &mut Receiver<Event>) -> Vec<&'static str> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.event_type())
            .collect()
    }

    // ── Running ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_evacuate_running_moves_instance_to_evacuating() {
        let mut fx = Fixture::new(vec![with("ig-1", ActualLrpState::Running, Presence::Ordinary)]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(keep);
        assert_eq!(fx.group_events(), ["actual_lrp_created", "actual_lrp_changed"]);
        assert_eq!(
            fx.instance_events(),
            ["actual_lrp_instance_changed", "actual_lrp_instance_created"]
        );
        let evacuating = fx.with_presence(Presence::Evacuating).unwrap();
        assert_eq!(evacuating.instance_key, instance("ig-1"));
        assert_eq!(evacuating.state, ActualLrpState::Running);
        let ordinary = fx.with_presence(Presence::Ordinary).unwrap();
        assert_eq!(ordinary.state, ActualLrpState::Unclaimed);
        assert!(ordinary.instance_key.is_empty());
    }

    #[tokio::test]
    async fn test_evacuate_running_again_keeps_container_quietly() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let mut fx = Fixture::new(vec![evacuating.clone(), unclaimed()]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(keep);
        assert!(fx.group_events().is_empty());
        assert!(fx.instance_events().is_empty());
        assert_eq!(fx.db.rows(), vec![evacuating, unclaimed()]);
    }

    #[tokio::test]
    async fn test_evacuate_running_without_record_creates_evacuating() {
        let claimed = with("ig-2", ActualLrpState::Claimed, Presence::Ordinary);
        let mut fx = Fixture::new(vec![claimed]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(keep);
        assert_eq!(fx.group_events(), ["actual_lrp_created"]);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_created"]);
        assert_eq!(
            fx.with_presence(Presence::Evacuating).unwrap().instance_key,
            instance("ig-1")
        );
    }

    #[tokio::test]
    async fn test_evacuate_running_defers_to_other_evacuating_cell() {
        let other = with("ig-3", ActualLrpState::Running, Presence::Evacuating);
        let mut fx = Fixture::new(vec![other.clone(), unclaimed()]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(!keep);
        assert!(fx.group_events().is_empty());
        assert_eq!(fx.db.rows(), vec![other, unclaimed()]);
    }

    #[tokio::test]
    async fn test_evacuate_running_drops_evacuating_once_replacement_runs() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let replacement = with("ig-2", ActualLrpState::Running, Presence::Ordinary);
        let mut fx = Fixture::new(vec![evacuating, replacement.clone()]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(!keep);
        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_removed"]);
        assert_eq!(fx.db.rows(), vec![replacement]);
    }

    #[tokio::test]
    async fn test_evacuate_running_drops_evacuating_without_ordinary() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let mut fx = Fixture::new(vec![evacuating]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(!keep);
        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert!(fx.db.rows().is_empty());
    }

    #[tokio::test]
    async fn test_evacuate_running_empty_slot_discards_container() {
        let mut fx = Fixture::new(Vec::new());

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(!keep);
        assert!(fx.group_events().is_empty());
    }

    #[tokio::test]
    async fn test_evacuate_running_suspect_removes_suspect() {
        let suspect = with("ig-1", ActualLrpState::Running, Presence::Suspect);
        let claimed = with("ig-2", ActualLrpState::Claimed, Presence::Ordinary);
        let mut fx = Fixture::new(vec![suspect, claimed.clone()]);

        let keep = fx
            .controller
            .evacuate_running_actual_lrp(&key(), &instance("ig-1"), &net_info())
            .await
            .unwrap();

        assert!(keep);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_changed"]);
        assert!(fx.with_presence(Presence::Suspect).is_none());
        assert_eq!(fx.with_presence(Presence::Ordinary), Some(claimed));
        assert!(fx.with_presence(Presence::Evacuating).is_some());
    }

    // ── Claimed, stopped, crashed ──────────────────────────────────

    #[tokio::test]
    async fn test_evacuate_claimed_unclaims_slot() {
        let mut fx = Fixture::new(vec![with("ig-1", ActualLrpState::Claimed, Presence::Ordinary)]);

        let keep = fx
            .controller
            .evacuate_claimed_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap();

        assert!(!keep);
        assert_eq!(fx.group_events(), ["actual_lrp_changed"]);
        assert_eq!(
            fx.instance_events(),
            ["actual_lrp_instance_created", "actual_lrp_instance_removed"]
        );
        assert_eq!(fx.db.rows()[0].state, ActualLrpState::Unclaimed);
    }

    #[tokio::test]
    async fn test_evacuate_claimed_removes_evacuating_record() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let mut fx = Fixture::new(vec![evacuating, unclaimed()]);

        let keep = fx
            .controller
            .evacuate_claimed_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap();

        assert!(!keep);
        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_removed"]);
        assert_eq!(fx.db.rows(), vec![unclaimed()]);
    }

    #[tokio::test]
    async fn test_evacuate_claimed_unknown_instance_is_not_found() {
        let mut fx = Fixture::new(vec![unclaimed()]);

        let err = fx
            .controller
            .evacuate_claimed_actual_lrp(&key(), &instance("ig-9"))
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::ResourceNotFound));
        assert!(fx.group_events().is_empty());
    }

    #[tokio::test]
    async fn test_evacuate_stopped_removes_ordinary_record() {
        let mut fx = Fixture::new(vec![with("ig-1", ActualLrpState::Running, Presence::Ordinary)]);

        fx.controller
            .evacuate_stopped_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap();

        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_removed"]);
        assert!(fx.db.rows().is_empty());
    }

    #[tokio::test]
    async fn test_evacuate_stopped_suspect_leaves_ordinary() {
        let suspect = with("ig-1", ActualLrpState::Running, Presence::Suspect);
        let claimed = with("ig-2", ActualLrpState::Claimed, Presence::Ordinary);
        let mut fx = Fixture::new(vec![suspect, claimed.clone()]);

        fx.controller
            .evacuate_stopped_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap();

        assert_eq!(fx.instance_events(), ["actual_lrp_instance_removed"]);
        assert_eq!(fx.db.rows(), vec![claimed]);
    }

    #[tokio::test]
    async fn test_evacuate_crashed_crashes_ordinary_record() {
        let mut fx = Fixture::new(vec![with("ig-1", ActualLrpState::Running, Presence::Ordinary)]);

        fx.controller
            .evacuate_crashed_actual_lrp(&key(), &instance("ig-1"), "oom")
            .await
            .unwrap();

        assert_eq!(fx.group_events(), ["actual_lrp_crashed", "actual_lrp_changed"]);
        let row = &fx.db.rows()[0];
        assert_eq!(row.crash_count, 1);
        assert_eq!(row.crash_reason, "oom");
    }

    #[tokio::test]
    async fn test_evacuate_crashed_evacuating_record_is_removed() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let mut fx = Fixture::new(vec![evacuating, unclaimed()]);

        fx.controller
            .evacuate_crashed_actual_lrp(&key(), &instance("ig-1"), "oom")
            .await
            .unwrap();

        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert_eq!(fx.db.rows(), vec![unclaimed()]);
    }

    // ── Remove evacuating ──────────────────────────────────────────

    #[tokio::test]
    async fn test_remove_evacuating_emits_removed() {
        let evacuating = with("ig-1", ActualLrpState::Running, Presence::Evacuating);
        let claimed = with("ig-2", ActualLrpState::Claimed, Presence::Ordinary);
        let mut fx = Fixture::new(vec![evacuating, claimed.clone()]);

        fx.controller
            .remove_evacuating_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap();

        assert_eq!(fx.group_events(), ["actual_lrp_removed"]);
        assert_eq!(fx.instance_events(), ["actual_lrp_instance_removed"]);
        assert_eq!(fx.db.rows(), vec![claimed]);
    }

    #[tokio::test]
    async fn test_remove_evacuating_requires_evacuating_record() {
        let running = with("ig-1", ActualLrpState::Running, Presence::Ordinary);
        let mut fx = Fixture::new(vec![running.clone()]);

        let err = fx
            .controller
            .remove_evacuating_actual_lrp(&key(), &instance("ig-1"))
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::ResourceNotFound));
        assert!(fx.group_events().is_empty());
        assert_eq!(fx.db.rows(), vec![running]);
    }
}
