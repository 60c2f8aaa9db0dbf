//! A minimal in-memory actual LRP store for controller tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bbs_models::{
    ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, ActualLrpState, Error,
    ErrorKind, ModelResult, Presence,
};
use bbs_sql::{ActualLrpDb, ActualLrpFilter, CrashOutcome};

const IMMEDIATE_RESTARTS: i32 = 3;

pub(crate) struct InMemoryActualLrpDb {
    rows: Mutex<Vec<ActualLrp>>,
}

impl InMemoryActualLrpDb {
    pub(crate) fn new(rows: Vec<ActualLrp>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub(crate) fn rows(&self) -> Vec<ActualLrp> {
        self.rows.lock().unwrap().clone()
    }

    fn update<T>(
        &self,
        process_guid: &str,
        index: i32,
        presence: Presence,
        f: impl FnOnce(&mut ActualLrp) -> ModelResult<T>,
    ) -> ModelResult<T> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|lrp| {
                lrp.key.process_guid == process_guid
                    && lrp.key.index == index
                    && lrp.presence == presence
            })
            .ok_or_else(Error::resource_not_found)?;
        f(row)
    }

    fn take(&self, process_guid: &str, index: i32, presence: Presence) -> Option<ActualLrp> {
        let mut rows = self.rows.lock().unwrap();
        let position = rows.iter().position(|lrp| {
            lrp.key.process_guid == process_guid && lrp.key.index == index && lrp.presence == presence
        })?;
        Some(rows.remove(position))
    }
}

#[async_trait]
impl ActualLrpDb for InMemoryActualLrpDb {
    async fn actual_lrps(&self, filter: &ActualLrpFilter) -> ModelResult<Vec<ActualLrp>> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|lrp| {
                filter.process_guid.as_deref().is_none_or(|guid| guid == lrp.key.process_guid)
                    && filter.index.is_none_or(|index| index == lrp.key.index)
            })
            .collect())
    }

    async fn create_unclaimed_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|lrp| &lrp.key == key && lrp.presence == Presence::Ordinary) {
            return Err(Error::resource_exists());
        }
        let lrp = ActualLrp::unclaimed(key.clone(), 1);
        rows.push(lrp.clone());
        Ok(lrp)
    }

    async fn unclaim_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<(ActualLrp, ActualLrp)> {
        self.update(&key.process_guid, key.index, Presence::Ordinary, |row| {
            if row.state == ActualLrpState::Unclaimed {
                return Err(Error::cannot_be_unclaimed());
            }
            let before = row.clone();
            row.state = ActualLrpState::Unclaimed;
            row.instance_key = ActualLrpInstanceKey::default();
            row.net_info = ActualLrpNetInfo::default();
            Ok((before, row.clone()))
        })
    }

    async fn claim_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<(ActualLrp, ActualLrp)> {
        self.update(process_guid, index, Presence::Ordinary, |row| {
            let before = row.clone();
            row.state = ActualLrpState::Claimed;
            row.instance_key = instance_key.clone();
            Ok((before, row.clone()))
        })
    }

    async fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<(Option<ActualLrp>, ActualLrp)> {
        let start = |row: &mut ActualLrp| {
            row.state = ActualLrpState::Running;
            row.instance_key = instance_key.clone();
            row.net_info = net_info.clone();
        };
        let existing = self.update(&key.process_guid, key.index, Presence::Ordinary, |row| {
            let before = row.clone();
            start(row);
            Ok((Some(before), row.clone()))
        });
        match existing {
            Err(err) if err.is(ErrorKind::ResourceNotFound) => {
                let mut lrp = ActualLrp::unclaimed(key.clone(), 1);
                start(&mut lrp);
                self.rows.lock().unwrap().push(lrp.clone());
                Ok((None, lrp))
            }
            other => other,
        }
    }

    async fn crash_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> ModelResult<CrashOutcome> {
        self.update(&key.process_guid, key.index, Presence::Ordinary, |row| {
            if &row.instance_key != instance_key {
                return Err(Error::cannot_be_crashed());
            }
            let before = row.clone();
            row.crash_count += 1;
            row.crash_reason = crash_reason.to_string();
            let should_restart = row.crash_count < IMMEDIATE_RESTARTS;
            row.state = if should_restart {
                ActualLrpState::Unclaimed
            } else {
                ActualLrpState::Crashed
            };
            row.instance_key = ActualLrpInstanceKey::default();
            row.net_info = ActualLrpNetInfo::default();
            Ok(CrashOutcome {
                before,
                after: row.clone(),
                should_restart,
            })
        })
    }

    async fn fail_actual_lrp(
        &self,
        key: &ActualLrpKey,
        placement_error: &str,
    ) -> ModelResult<(ActualLrp, ActualLrp)> {
        self.update(&key.process_guid, key.index, Presence::Ordinary, |row| {
            let before = row.clone();
            row.placement_error = placement_error.to_string();
            Ok((before, row.clone()))
        })
    }

    async fn remove_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> ModelResult<()> {
        let owned = self.rows().iter().any(|lrp| {
            lrp.key.process_guid == process_guid
                && lrp.key.index == index
                && lrp.presence == Presence::Ordinary
                && instance_key.is_none_or(|key| &lrp.instance_key == key)
        });
        if !owned {
            return Err(Error::resource_not_found());
        }
        self.take(process_guid, index, Presence::Ordinary)
            .map(|_| ())
            .ok_or_else(Error::resource_not_found)
    }

    async fn evacuate_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<ActualLrp> {
        let existing = self.update(&key.process_guid, key.index, Presence::Evacuating, |row| {
            row.instance_key = instance_key.clone();
            row.net_info = net_info.clone();
            Ok(row.clone())
        });
        match existing {
            Err(err) if err.is(ErrorKind::ResourceNotFound) => {
                let lrp = ActualLrp {
                    key: key.clone(),
                    instance_key: instance_key.clone(),
                    net_info: net_info.clone(),
                    state: ActualLrpState::Running,
                    presence: Presence::Evacuating,
                    ..ActualLrp::default()
                };
                self.rows.lock().unwrap().push(lrp.clone());
                Ok(lrp)
            }
            other => other,
        }
    }

    async fn remove_evacuating_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<Option<ActualLrp>> {
        let mismatch = self.rows().iter().any(|lrp| {
            lrp.key == *key && lrp.presence == Presence::Evacuating && &lrp.instance_key != instance_key
        });
        if mismatch {
            return Err(Error::cannot_be_removed());
        }
        Ok(self.take(&key.process_guid, key.index, Presence::Evacuating))
    }

    async fn remove_suspect_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp> {
        self.take(&key.process_guid, key.index, Presence::Suspect)
            .ok_or_else(Error::resource_not_found)
    }
}
