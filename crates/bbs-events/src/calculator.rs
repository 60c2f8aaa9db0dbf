//! Actual LRP event calculation.
//!
//! Both inputs to [`ActualLrpEventCalculator::emit_events`] describe one
//! scheduling slot. A `None` entry marks a record removed by an earlier
//! [`record_change`] and keeps the two sets positionally aligned.
//!
//! Group rules, per position of the resolved group:
//!
//! ```text
//! None      → lrp       Created
//! lrp       → None      Removed
//! *         → Crashed   Crashed, Changed
//! *         → Unclaimed [Crashed if crash count grew], Changed
//! k1        → k2        Created(k2), Removed(k1)   k1 non-empty, k1 != k2
//! *         → *         Changed
//! ```
//!
//! Instance rules differ only for Unclaimed: entering it from another state
//! loses the instance identity, so it is reported as Created + Removed.

use std::cmp::Reverse;
use std::sync::Arc;

use bbs_models::{
    ActualLrp, ActualLrpCrashed, ActualLrpGroup, ActualLrpState, Event, resolve_group,
};
use tracing::debug;

use crate::hub::Hub;

#[derive(Clone)]
pub struct ActualLrpEventCalculator {
    group_hub: Arc<dyn Hub>,
    instance_hub: Arc<dyn Hub>,
}

impl ActualLrpEventCalculator {
    pub fn new(group_hub: Arc<dyn Hub>, instance_hub: Arc<dyn Hub>) -> Self {
        Self {
            group_hub,
            instance_hub,
        }
    }

    /// Publish the events that take `before` to `after`.
    ///
    /// Group events are computed on the resolved groups of the unpadded sets
    /// and go out first; instance events are computed pairwise after
    /// alignment. Each batch is ordered by [`event_score`], highest first.
    pub fn emit_events(&self, before: &[Option<ActualLrp>], after: &[Option<ActualLrp>]) {
        let before_group = resolve_group(&present(before));
        let after_group = resolve_group(&present(after));

        let group = group_events(&before_group, &after_group);
        let instance = instance_events(before, after);
        debug!(
            group_events = group.len(),
            instance_events = instance.len(),
            "emitting actual lrp events"
        );

        for event in group {
            self.group_hub.emit(event);
        }
        for event in instance {
            self.instance_hub.emit(event);
        }
    }

    /// See [`record_change`].
    pub fn record_change(
        &self,
        before: Option<&ActualLrp>,
        after: Option<&ActualLrp>,
        lrps: &[Option<ActualLrp>],
    ) -> Vec<Option<ActualLrp>> {
        record_change(before, after, lrps)
    }
}

/// Replace the entry of `lrps` holding `before`'s instance key with `after`.
///
/// Existing `None` entries stay where they are. When nothing matches (a new
/// record, `before` is `None`) `after` is appended. A removal leaves a
/// `None` in place of the removed record.
pub fn record_change(
    before: Option<&ActualLrp>,
    after: Option<&ActualLrp>,
    lrps: &[Option<ActualLrp>],
) -> Vec<Option<ActualLrp>> {
    let mut found = false;
    let mut recorded: Vec<Option<ActualLrp>> = lrps
        .iter()
        .map(|entry| match (entry, before) {
            (Some(lrp), Some(before)) if lrp.instance_key == before.instance_key => {
                found = true;
                after.cloned()
            }
            _ => entry.clone(),
        })
        .collect();

    if !found {
        recorded.push(after.cloned());
    }
    recorded
}

/// Pad the shorter set with `None` so both have the same length.
pub fn align(
    before: &[Option<ActualLrp>],
    after: &[Option<ActualLrp>],
) -> (Vec<Option<ActualLrp>>, Vec<Option<ActualLrp>>) {
    let len = before.len().max(after.len());
    let pad = |set: &[Option<ActualLrp>]| {
        let mut padded = set.to_vec();
        padded.resize(len, None);
        padded
    };
    (pad(before), pad(after))
}

/// Emission priority: crashes first, then arrivals of running records, then
/// everything that costs routability.
pub fn event_score(event: &Event) -> u8 {
    if event.is_crash() {
        return 2;
    }
    match event.resulting_lrp() {
        Some(lrp) if lrp.is_running() => 1,
        _ => 0,
    }
}

fn sort_by_score(events: &mut [Event]) {
    // Stable: ties keep generation order.
    events.sort_by_key(|event| Reverse(event_score(event)));
}

fn present(set: &[Option<ActualLrp>]) -> Vec<ActualLrp> {
    set.iter().flatten().cloned().collect()
}

// ── Group channel ──────────────────────────────────────────────────

/// Events for the group channel, instance position then evacuating
/// position, ordered by score.
pub fn group_events(before: &ActualLrpGroup, after: &ActualLrpGroup) -> Vec<Event> {
    let mut events = slot_group_events(before.instance.as_ref(), after.instance.as_ref());
    events.extend(slot_group_events(
        before.evacuating.as_ref(),
        after.evacuating.as_ref(),
    ));
    sort_by_score(&mut events);
    events
}

fn slot_group_events(before: Option<&ActualLrp>, after: Option<&ActualLrp>) -> Vec<Event> {
    let (before, after) = match (before, after) {
        (None, None) => return Vec::new(),
        (Some(before), Some(after)) if before == after => return Vec::new(),
        (Some(before), None) => {
            return vec![Event::ActualLrpRemoved {
                group: before.to_group(),
            }];
        }
        (None, Some(after)) => {
            return vec![Event::ActualLrpCreated {
                group: after.to_group(),
            }];
        }
        (Some(before), Some(after)) => (before, after),
    };

    let changed = || Event::ActualLrpChanged {
        before: before.to_group(),
        after: after.to_group(),
    };

    match after.state {
        ActualLrpState::Crashed => vec![crashed(before, after), changed()],
        ActualLrpState::Unclaimed => {
            let mut events = crash_count_grew(before, after);
            events.push(changed());
            events
        }
        ActualLrpState::Claimed | ActualLrpState::Running => {
            if !before.instance_key.is_empty() && after.instance_key != before.instance_key {
                vec![
                    Event::ActualLrpCreated {
                        group: after.to_group(),
                    },
                    Event::ActualLrpRemoved {
                        group: before.to_group(),
                    },
                ]
            } else {
                vec![changed()]
            }
        }
    }
}

// ── Instance channel ───────────────────────────────────────────────

/// Events for the instance channel, computed pairwise over the aligned
/// sets and ordered by score.
pub fn instance_events(before: &[Option<ActualLrp>], after: &[Option<ActualLrp>]) -> Vec<Event> {
    let (before, after) = align(before, after);
    let mut events: Vec<Event> = before
        .iter()
        .zip(&after)
        .flat_map(|(before, after)| pair_instance_events(before.as_ref(), after.as_ref()))
        .collect();
    sort_by_score(&mut events);
    events
}

fn pair_instance_events(before: Option<&ActualLrp>, after: Option<&ActualLrp>) -> Vec<Event> {
    let (before, after) = match (before, after) {
        (None, None) => return Vec::new(),
        (Some(before), Some(after)) if before == after => return Vec::new(),
        (Some(before), None) => {
            return vec![Event::ActualLrpInstanceRemoved {
                lrp: before.clone(),
            }];
        }
        (None, Some(after)) => {
            return vec![Event::ActualLrpInstanceCreated { lrp: after.clone() }];
        }
        (Some(before), Some(after)) => (before, after),
    };

    let changed = || Event::ActualLrpInstanceChanged {
        before: before.clone(),
        after: after.clone(),
    };

    match after.state {
        ActualLrpState::Crashed => vec![crashed(before, after), changed()],
        ActualLrpState::Unclaimed => {
            let mut events = crash_count_grew(before, after);
            if before.state != ActualLrpState::Unclaimed {
                events.push(Event::ActualLrpInstanceCreated { lrp: after.clone() });
                events.push(Event::ActualLrpInstanceRemoved {
                    lrp: before.clone(),
                });
            } else if !events.is_empty() {
                events.push(changed());
            }
            events
        }
        ActualLrpState::Claimed | ActualLrpState::Running => vec![changed()],
    }
}

fn crashed(before: &ActualLrp, after: &ActualLrp) -> Event {
    Event::ActualLrpCrashed(ActualLrpCrashed::new(before, after))
}

/// A crash observed as a restart straight back to Unclaimed.
fn crash_count_grew(before: &ActualLrp, after: &ActualLrp) -> Vec<Event> {
    if after.crash_count > before.crash_count {
        vec![crashed(before, after)]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use bbs_models::{ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, Presence};
    use tokio::sync::broadcast::Receiver;

    use super::*;
    use crate::hub::BroadcastHub;

    fn lrp(guid: &str, state: ActualLrpState) -> ActualLrp {
        ActualLrp {
            key: ActualLrpKey::new("some-guid", 0, "some-domain"),
            instance_key: ActualLrpInstanceKey::new(guid, "cell-1"),
            net_info: ActualLrpNetInfo::new("1.2.3.4", Vec::new()),
            state,
            since: 1138,
            ..ActualLrp::default()
        }
    }

    fn unclaimed() -> ActualLrp {
        ActualLrp {
            instance_key: ActualLrpInstanceKey::default(),
            net_info: ActualLrpNetInfo::default(),
            ..lrp("", ActualLrpState::Unclaimed)
        }
    }

    fn suspect(guid: &str, state: ActualLrpState) -> ActualLrp {
        ActualLrp {
            presence: Presence::Suspect,
            ..lrp(guid, state)
        }
    }

    struct Harness {
        calculator: ActualLrpEventCalculator,
        group: Receiver<Event>,
        instance: Receiver<Event>,
    }

    impl Harness {
        fn new() -> Self {
            let group_hub = BroadcastHub::new("group", 64);
            let instance_hub = BroadcastHub::new("instance", 64);
            let group = group_hub.subscribe();
            let instance = instance_hub.subscribe();
            Self {
                calculator: ActualLrpEventCalculator::new(Arc::new(group_hub), Arc::new(instance_hub)),
                group,
                instance,
            }
        }

        fn emit(mut self, before: &[Option<ActualLrp>], after: &[Option<ActualLrp>]) -> (Vec<Event>, Vec<Event>) {
            self.calculator.emit_events(before, after);
            (drain(&mut self.group), drain(&mut self.instance))
        }
    }

    fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn types(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::event_type).collect()
    }

    #[test]
    fn test_identical_sets_emit_nothing() {
        let set = vec![Some(lrp("ig-1", ActualLrpState::Running))];
        let (group, instance) = Harness::new().emit(&set, &set);
        assert!(group.is_empty());
        assert!(instance.is_empty());
    }

    #[test]
    fn test_new_lrp_is_created_on_both_channels() {
        let created = unclaimed();
        let (group, instance) = Harness::new().emit(&[], &[Some(created.clone())]);
        assert_eq!(group, vec![Event::ActualLrpCreated { group: created.to_group() }]);
        assert_eq!(instance, vec![Event::ActualLrpInstanceCreated { lrp: created }]);
    }

    #[test]
    fn test_removed_lrp_is_removed_on_both_channels() {
        let removed = lrp("ig-1", ActualLrpState::Running);
        let (group, instance) = Harness::new().emit(&[Some(removed.clone())], &[None]);
        assert_eq!(group, vec![Event::ActualLrpRemoved { group: removed.to_group() }]);
        assert_eq!(instance, vec![Event::ActualLrpInstanceRemoved { lrp: removed }]);
    }

    #[test]
    fn test_claimed_to_running_is_changed() {
        let before = lrp("ig-1", ActualLrpState::Claimed);
        let after = lrp("ig-1", ActualLrpState::Running);
        let (group, instance) = Harness::new().emit(&[Some(before.clone())], &[Some(after.clone())]);
        assert_eq!(
            group,
            vec![Event::ActualLrpChanged { before: before.to_group(), after: after.to_group() }]
        );
        assert_eq!(instance, vec![Event::ActualLrpInstanceChanged { before, after }]);
    }

    #[test]
    fn test_unclaimed_to_claimed_is_changed() {
        let before = unclaimed();
        let after = lrp("ig-1", ActualLrpState::Claimed);
        let (group, instance) = Harness::new().emit(&[Some(before)], &[Some(after)]);
        assert_eq!(types(&group), ["actual_lrp_changed"]);
        assert_eq!(types(&instance), ["actual_lrp_instance_changed"]);
    }

    #[test]
    fn test_claimed_to_crashed_emits_crashed_then_changed() {
        let before = lrp("ig-1", ActualLrpState::Claimed);
        let after = ActualLrp {
            crash_count: 1,
            crash_reason: "oom".into(),
            ..lrp("ig-1", ActualLrpState::Crashed)
        };
        let (group, instance) = Harness::new().emit(&[Some(before.clone())], &[Some(after.clone())]);
        assert_eq!(types(&group), ["actual_lrp_crashed", "actual_lrp_changed"]);
        assert_eq!(types(&instance), ["actual_lrp_crashed", "actual_lrp_instance_changed"]);
        assert_eq!(
            instance[0],
            Event::ActualLrpCrashed(ActualLrpCrashed::new(&before, &after))
        );
    }

    #[test]
    fn test_running_to_unclaimed_loses_instance_identity() {
        let before = lrp("ig-1", ActualLrpState::Running);
        let after = unclaimed();
        let (group, instance) = Harness::new().emit(&[Some(before.clone())], &[Some(after.clone())]);
        assert_eq!(
            group,
            vec![Event::ActualLrpChanged { before: before.to_group(), after: after.to_group() }]
        );
        assert_eq!(
            instance,
            vec![
                Event::ActualLrpInstanceCreated { lrp: after },
                Event::ActualLrpInstanceRemoved { lrp: before },
            ]
        );
    }

    #[test]
    fn test_claimed_crash_restarted_as_unclaimed() {
        let before = lrp("ig-1", ActualLrpState::Claimed);
        let after = ActualLrp { crash_count: 1, ..unclaimed() };
        let (group, instance) = Harness::new().emit(&[Some(before)], &[Some(after)]);
        assert_eq!(types(&group), ["actual_lrp_crashed", "actual_lrp_changed"]);
        assert_eq!(
            types(&instance),
            [
                "actual_lrp_crashed",
                "actual_lrp_instance_created",
                "actual_lrp_instance_removed"
            ]
        );
    }

    #[test]
    fn test_unclaimed_placement_error_only_changes_group() {
        let before = unclaimed();
        let after = ActualLrp {
            placement_error: "insufficient resources".into(),
            ..unclaimed()
        };
        let (group, instance) = Harness::new().emit(&[Some(before)], &[Some(after)]);
        assert_eq!(types(&group), ["actual_lrp_changed"]);
        assert!(instance.is_empty());
    }

    #[test]
    fn test_unclaimed_with_incremented_crash_count() {
        let before = unclaimed();
        let after = ActualLrp { crash_count: 2, ..unclaimed() };
        let (group, instance) = Harness::new().emit(&[Some(before)], &[Some(after)]);
        assert_eq!(types(&group), ["actual_lrp_crashed", "actual_lrp_changed"]);
        assert_eq!(types(&instance), ["actual_lrp_crashed", "actual_lrp_instance_changed"]);
    }

    #[test]
    fn test_ordinary_running_replaces_suspect() {
        let old = suspect("ig-1", ActualLrpState::Running);
        let replacement = lrp("ig-2", ActualLrpState::Running);
        let before = vec![Some(old.clone())];
        let after = vec![Some(old.clone()), Some(replacement.clone())];

        let (group, instance) = Harness::new().emit(&before, &after);

        assert_eq!(
            group,
            vec![
                Event::ActualLrpCreated { group: replacement.to_group() },
                Event::ActualLrpRemoved { group: old.to_group() },
            ]
        );
        assert_eq!(instance, vec![Event::ActualLrpInstanceCreated { lrp: replacement }]);
    }

    #[test]
    fn test_claimed_replacement_of_suspect_emits_no_group_events() {
        let old = suspect("ig-1", ActualLrpState::Running);
        let replacement = lrp("ig-2", ActualLrpState::Claimed);
        let (group, instance) =
            Harness::new().emit(&[Some(old.clone())], &[Some(old), Some(replacement)]);
        assert!(group.is_empty());
        assert_eq!(types(&instance), ["actual_lrp_instance_created"]);
    }

    #[test]
    fn test_evacuation_emits_running_arrival_first() {
        let original = lrp("ig-1", ActualLrpState::Running);
        let evacuating = ActualLrp {
            presence: Presence::Evacuating,
            ..original.clone()
        };
        let replacement = unclaimed();

        let (group, instance) = Harness::new().emit(
            &[Some(original.clone())],
            &[Some(evacuating.clone()), Some(replacement.clone())],
        );

        assert_eq!(
            group,
            vec![
                Event::ActualLrpCreated { group: evacuating.to_group() },
                Event::ActualLrpChanged { before: original.to_group(), after: replacement.to_group() },
            ]
        );
        assert_eq!(
            instance,
            vec![
                Event::ActualLrpInstanceChanged { before: original, after: evacuating },
                Event::ActualLrpInstanceCreated { lrp: replacement },
            ]
        );
    }

    #[test]
    fn test_emitted_batches_are_score_ordered() {
        let running = lrp("ig-1", ActualLrpState::Running);
        let crashing = lrp("ig-2", ActualLrpState::Running);
        let crashed = ActualLrp {
            crash_count: 1,
            ..lrp("ig-2", ActualLrpState::Crashed)
        };
        let arriving = lrp("ig-3", ActualLrpState::Running);

        let (_, instance) = Harness::new().emit(
            &[Some(running), Some(crashing)],
            &[None, Some(crashed), Some(arriving)],
        );

        let scores: Vec<u8> = instance.iter().map(event_score).collect();
        assert_eq!(scores, [2, 1, 0, 0]);
        assert_eq!(
            types(&instance),
            [
                "actual_lrp_crashed",
                "actual_lrp_instance_created",
                "actual_lrp_instance_removed",
                "actual_lrp_instance_changed"
            ]
        );
    }

    #[test]
    fn test_event_score() {
        let running = lrp("ig-1", ActualLrpState::Running);
        let claimed = lrp("ig-1", ActualLrpState::Claimed);
        let cases = [
            (Event::ActualLrpCrashed(ActualLrpCrashed::new(&running, &claimed)), 2),
            (Event::ActualLrpCreated { group: running.to_group() }, 1),
            (Event::ActualLrpCreated { group: claimed.to_group() }, 0),
            (Event::ActualLrpChanged { before: claimed.to_group(), after: running.to_group() }, 1),
            (Event::ActualLrpChanged { before: running.to_group(), after: claimed.to_group() }, 0),
            (Event::ActualLrpRemoved { group: running.to_group() }, 0),
            (Event::ActualLrpInstanceCreated { lrp: running.clone() }, 1),
            (Event::ActualLrpInstanceChanged { before: running.clone(), after: claimed.clone() }, 0),
            (Event::ActualLrpInstanceRemoved { lrp: running }, 0),
        ];
        for (event, score) in cases {
            assert_eq!(event_score(&event), score, "{}", event.event_type());
        }
    }

    #[test]
    fn test_record_change_replaces_matching_lrp() {
        let before = lrp("ig-1", ActualLrpState::Claimed);
        let after = lrp("ig-1", ActualLrpState::Running);
        let other = lrp("ig-2", ActualLrpState::Running);

        let recorded = record_change(
            Some(&before),
            Some(&after),
            &[Some(other.clone()), Some(before.clone())],
        );
        assert_eq!(recorded, vec![Some(other), Some(after)]);
    }

    #[test]
    fn test_record_change_appends_new_lrp() {
        let existing = lrp("ig-1", ActualLrpState::Running);
        let created = lrp("ig-2", ActualLrpState::Running);
        let recorded = record_change(None, Some(&created), &[Some(existing.clone())]);
        assert_eq!(recorded, vec![Some(existing), Some(created)]);
    }

    #[test]
    fn test_record_change_marks_removal_and_keeps_markers() {
        let first = lrp("ig-1", ActualLrpState::Running);
        let second = lrp("ig-2", ActualLrpState::Running);

        let once = record_change(Some(&first), None, &[Some(first.clone()), Some(second.clone())]);
        assert_eq!(once, vec![None, Some(second.clone())]);

        let twice = record_change(Some(&second), None, &once);
        assert_eq!(twice, vec![None, None]);
    }

    #[test]
    fn test_align_pads_shorter_side() {
        let one = Some(lrp("ig-1", ActualLrpState::Running));
        let (before, after) = align(&[one.clone()], &[one.clone(), None, one.clone()]);
        assert_eq!(before, vec![one.clone(), None, None]);
        assert_eq!(after.len(), 3);

        let (before, after) = align(&[one.clone(), one.clone()], &[]);
        assert_eq!(before.len(), 2);
        assert_eq!(after, vec![None, None]);
    }

    fn crashed_row() -> ActualLrp {
        ActualLrp {
            state: ActualLrpState::Crashed,
            crash_count: 1,
            crash_reason: "oom".into(),
            ..unclaimed()
        }
    }

    fn evacuating(guid: &str) -> ActualLrp {
        ActualLrp {
            presence: Presence::Evacuating,
            ..lrp(guid, ActualLrpState::Running)
        }
    }

    fn moved(lrp: ActualLrp, address: &str) -> ActualLrp {
        ActualLrp {
            net_info: ActualLrpNetInfo::new(address, Vec::new()),
            ..lrp
        }
    }

    #[test]
    fn test_transition_matrix_events() {
        use ActualLrpState::*;

        let none = ActualLrpInstanceKey::default();
        let ig1 = ActualLrpInstanceKey::new("ig-1", "cell-1");
        let ig2 = ActualLrpInstanceKey::new("ig-2", "cell-1");
        let changed = &["actual_lrp_changed"][..];
        let instance_changed = &["actual_lrp_instance_changed"][..];
        let replaced = &["actual_lrp_instance_created", "actual_lrp_instance_removed"][..];
        let nothing: &[&str] = &[];

        // (name, before, requesting instance, after, group events, instance events)
        let cases: Vec<(&str, ActualLrp, &ActualLrpInstanceKey, ActualLrp, &[&str], &[&str])> = vec![
            (
                "unclaimed to unclaimed",
                unclaimed(),
                &none,
                ActualLrp { placement_error: "no cells".into(), ..unclaimed() },
                changed,
                nothing,
            ),
            ("unclaimed to claimed", unclaimed(), &ig1, lrp("ig-1", Claimed), changed, instance_changed),
            ("unclaimed to running", unclaimed(), &ig1, lrp("ig-1", Running), changed, instance_changed),
            ("claimed to unclaimed", lrp("ig-1", Claimed), &none, unclaimed(), changed, replaced),
            (
                "claimed to claimed",
                lrp("ig-1", Claimed),
                &ig1,
                ActualLrp { since: 2000, ..lrp("ig-1", Claimed) },
                changed,
                instance_changed,
            ),
            ("claimed to running", lrp("ig-1", Claimed), &ig1, lrp("ig-1", Running), changed, instance_changed),
            (
                "claimed to running on another instance",
                lrp("ig-1", Claimed),
                &ig2,
                lrp("ig-2", Running),
                &["actual_lrp_created", "actual_lrp_removed"][..],
                instance_changed,
            ),
            (
                "claimed to crashed",
                lrp("ig-1", Claimed),
                &ig1,
                crashed_row(),
                &["actual_lrp_crashed", "actual_lrp_changed"][..],
                &["actual_lrp_crashed", "actual_lrp_instance_changed"][..],
            ),
            ("running to unclaimed", lrp("ig-1", Running), &none, unclaimed(), changed, replaced),
            ("running to claimed", lrp("ig-1", Running), &ig1, lrp("ig-1", Claimed), changed, instance_changed),
            (
                "running net info change",
                lrp("ig-1", Running),
                &ig1,
                moved(lrp("ig-1", Running), "5.6.7.8"),
                changed,
                instance_changed,
            ),
            (
                "running to crashed",
                lrp("ig-1", Running),
                &ig1,
                crashed_row(),
                &["actual_lrp_crashed", "actual_lrp_changed"][..],
                &["actual_lrp_crashed", "actual_lrp_instance_changed"][..],
            ),
            (
                "crashed to unclaimed",
                crashed_row(),
                &none,
                ActualLrp { crash_count: 1, ..unclaimed() },
                changed,
                replaced,
            ),
            (
                "crashed to claimed",
                ActualLrp { crash_count: 1, ..lrp("ig-1", Crashed) },
                &ig1,
                ActualLrp { crash_count: 1, ..lrp("ig-1", Claimed) },
                changed,
                instance_changed,
            ),
            (
                "crashed to running",
                ActualLrp { crash_count: 1, ..lrp("ig-1", Crashed) },
                &ig1,
                ActualLrp { crash_count: 1, ..lrp("ig-1", Running) },
                changed,
                instance_changed,
            ),
        ];

        for (name, before, requester, after, group_types, instance_types) in cases {
            assert!(
                before.allows_transition_to(&after.key, requester, after.state),
                "{name}: transition not allowed"
            );
            let (group, instance) = Harness::new().emit(&[Some(before)], &[Some(after)]);
            assert_eq!(types(&group), group_types, "{name}: group events");
            assert_eq!(types(&instance), instance_types, "{name}: instance events");
        }
    }

    #[test]
    fn test_transition_matrix_rejections() {
        use ActualLrpState::*;

        let none = ActualLrpInstanceKey::default();
        let ig1 = ActualLrpInstanceKey::new("ig-1", "cell-1");
        let ig2 = ActualLrpInstanceKey::new("ig-2", "cell-1");
        let cases = [
            ("unclaimed to crashed", unclaimed(), &ig1, Crashed),
            ("claimed by another instance", lrp("ig-1", Claimed), &ig2, Claimed),
            ("claimed crashed by another instance", lrp("ig-1", Claimed), &ig2, Crashed),
            ("running on another instance", lrp("ig-1", Running), &ig2, Running),
            ("running unclaimed with an instance", lrp("ig-1", Running), &ig1, Unclaimed),
            ("crashed to crashed", crashed_row(), &none, Crashed),
        ];

        for (name, before, requester, state) in cases {
            assert!(
                !before.allows_transition_to(&before.key, requester, state),
                "{name}: transition allowed"
            );
        }
    }

    #[test]
    fn test_evacuating_position_events() {
        let ordinary = lrp("ig-2", ActualLrpState::Running);

        let cases: Vec<(&str, Vec<Option<ActualLrp>>, Vec<Option<ActualLrp>>, &[&str], &[&str])> = vec![
            (
                "evacuating created beside ordinary",
                vec![Some(unclaimed())],
                vec![Some(unclaimed()), Some(evacuating("ig-1"))],
                &["actual_lrp_created"][..],
                &["actual_lrp_instance_created"][..],
            ),
            (
                "evacuating net info change",
                vec![Some(ordinary.clone()), Some(evacuating("ig-1"))],
                vec![Some(ordinary.clone()), Some(moved(evacuating("ig-1"), "5.6.7.8"))],
                &["actual_lrp_changed"][..],
                &["actual_lrp_instance_changed"][..],
            ),
            (
                "evacuating removed beside ordinary",
                vec![Some(ordinary.clone()), Some(evacuating("ig-1"))],
                vec![Some(ordinary.clone()), None],
                &["actual_lrp_removed"][..],
                &["actual_lrp_instance_removed"][..],
            ),
            (
                "lone evacuating removed",
                vec![Some(evacuating("ig-1"))],
                vec![None],
                &["actual_lrp_removed"][..],
                &["actual_lrp_instance_removed"][..],
            ),
            (
                "evacuating moved to another instance",
                vec![Some(evacuating("ig-1"))],
                vec![Some(evacuating("ig-3"))],
                &["actual_lrp_created", "actual_lrp_removed"][..],
                &["actual_lrp_instance_changed"][..],
            ),
        ];

        for (name, before, after, group_types, instance_types) in cases {
            let (group, instance) = Harness::new().emit(&before, &after);
            assert_eq!(types(&group), group_types, "{name}: group events");
            assert_eq!(types(&instance), instance_types, "{name}: instance events");
            let expected_evacuating = after.iter().flatten().find(|lrp| lrp.presence == Presence::Evacuating);
            if let Some(Event::ActualLrpCreated { group }) = group.first() {
                assert_eq!(group.evacuating.as_ref(), expected_evacuating, "{name}");
                assert!(group.instance.is_none(), "{name}");
            }
        }
    }
}
