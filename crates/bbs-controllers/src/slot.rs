//! Lookups over the records of one scheduling slot.

use bbs_models::{ActualLrp, ActualLrpInstanceKey, Presence};

pub(crate) fn find_with_presence(lrps: &[ActualLrp], presence: Presence) -> Option<&ActualLrp> {
    lrps.iter().find(|lrp| lrp.presence == presence)
}

pub(crate) fn find_instance<'a>(
    lrps: &'a [ActualLrp],
    instance_key: &ActualLrpInstanceKey,
) -> Option<&'a ActualLrp> {
    lrps.iter().find(|lrp| &lrp.instance_key == instance_key)
}

/// The slot as the event calculator's before set.
pub(crate) fn snapshot(lrps: &[ActualLrp]) -> Vec<Option<ActualLrp>> {
    lrps.iter().cloned().map(Some).collect()
}
