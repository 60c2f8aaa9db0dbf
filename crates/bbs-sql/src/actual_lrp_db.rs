//! Actual LRP lifecycle persistence.
//!
//! Every mutation runs inside a retried transaction: lock the slot's row,
//! check the transition, bump the modification tag, write the changed
//! columns, and hand back the before and after records.

use async_trait::async_trait;
use bbs_models::{
    ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpNetInfo, ActualLrpState,
    CRASH_RESET_TIMEOUT, Error, ErrorKind, ModelResult, ModificationTag, Presence,
    RestartCalculator,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::{ActualLrpDb, ActualLrpFilter, CrashOutcome};
use crate::error::{DriverError, SqlError, SqlResult};
use crate::helpers::{RowLock, SqlAttributes};
use crate::queryable::{SqlRow, SqlValue, Transaction};
use crate::sql_db::SqlDb;
use crate::tables::{ACTUAL_LRP_COLUMNS, ACTUAL_LRPS, MAX_REASON_LEN, SLOT_WHERE};
use crate::{sql_args, sql_attributes};

// ── Row mapping ────────────────────────────────────────────────────

enum ScannedRow {
    Valid(ActualLrp),
    /// The row's net info could not be decoded; it is deleted on sight.
    Invalid { key: ActualLrpKey, presence: Presence },
}

fn narrow<T: TryFrom<i64>>(row: &SqlRow, column: &str) -> SqlResult<T> {
    let value = row.int(column)?;
    T::try_from(value)
        .map_err(|_| DriverError::Other(format!("column {column}: {value} out of range")).into())
}

fn scan_actual_lrp(row: &SqlRow) -> SqlResult<ScannedRow> {
    let key = ActualLrpKey::new(
        row.string("process_guid")?,
        narrow(row, "instance_index")?,
        row.string("domain")?,
    );
    let presence = Presence::from_i32(narrow(row, "presence")?)?;

    let net_info_data = row.string("net_info")?;
    let net_info = if net_info_data.is_empty() {
        ActualLrpNetInfo::default()
    } else {
        match serde_json::from_str(&net_info_data) {
            Ok(net_info) => net_info,
            Err(err) => {
                error!(%key, %presence, error = %err, "failed to decode net info");
                return Ok(ScannedRow::Invalid { key, presence });
            }
        }
    };

    Ok(ScannedRow::Valid(ActualLrp {
        key,
        instance_key: ActualLrpInstanceKey::new(row.string("instance_guid")?, row.string("cell_id")?),
        net_info,
        state: row.string("state")?.parse()?,
        presence,
        crash_count: narrow(row, "crash_count")?,
        crash_reason: row.string("crash_reason")?,
        placement_error: row.string("placement_error")?,
        since: row.int("since")?,
        modification_tag: ModificationTag::new(
            row.string("modification_tag_epoch")?,
            narrow(row, "modification_tag_index")?,
        ),
    }))
}

fn serialize_net_info(net_info: &ActualLrpNetInfo) -> SqlResult<String> {
    serde_json::to_string(net_info)
        .map_err(|err| Error::new(ErrorKind::InvalidRecord, err.to_string()).into())
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn slot_args(key: &ActualLrpKey, presence: Presence) -> Vec<SqlValue> {
    sql_args![key.process_guid.as_str(), key.index, presence.as_i32()]
}

fn row_attributes(lrp: &ActualLrp) -> SqlResult<SqlAttributes> {
    Ok(sql_attributes! {
        "process_guid" => lrp.key.process_guid.as_str(),
        "instance_index" => lrp.key.index,
        "presence" => lrp.presence.as_i32(),
        "domain" => lrp.key.domain.as_str(),
        "state" => lrp.state.as_str(),
        "instance_guid" => lrp.instance_key.instance_guid.as_str(),
        "cell_id" => lrp.instance_key.cell_id.as_str(),
        "placement_error" => lrp.placement_error.as_str(),
        "since" => lrp.since,
        "net_info" => serialize_net_info(&lrp.net_info)?,
        "modification_tag_epoch" => lrp.modification_tag.epoch.as_str(),
        "modification_tag_index" => lrp.modification_tag.index,
        "crash_count" => lrp.crash_count,
        "crash_reason" => lrp.crash_reason.as_str(),
    })
}

fn is_not_found(err: &SqlError) -> bool {
    matches!(err, SqlError::Model(model) if model.is(ErrorKind::ResourceNotFound))
}

fn new_epoch() -> String {
    Uuid::new_v4().to_string()
}

// ── Transaction bodies ─────────────────────────────────────────────

impl SqlDb {
    async fn scan_and_cleanup(
        &self,
        tx: &mut dyn Transaction,
        rows: Vec<SqlRow>,
    ) -> SqlResult<Vec<ActualLrp>> {
        let mut lrps = Vec::with_capacity(rows.len());
        let mut invalid = Vec::new();
        for row in &rows {
            match scan_actual_lrp(row)? {
                ScannedRow::Valid(lrp) => lrps.push(lrp),
                ScannedRow::Invalid { key, presence } => invalid.push((key, presence)),
            }
        }

        for (key, presence) in invalid {
            let deleted = self
                .helper
                .delete(tx, ACTUAL_LRPS, SLOT_WHERE, &slot_args(&key, presence))
                .await;
            if let Err(err) = deleted {
                error!(%key, %presence, error = %err, "failed to clean up invalid actual lrp");
            }
        }

        Ok(lrps)
    }

    async fn fetch_for_update(
        &self,
        tx: &mut dyn Transaction,
        process_guid: &str,
        index: i32,
        presence: Presence,
    ) -> SqlResult<ActualLrp> {
        let rows = self
            .helper
            .query(
                tx,
                ACTUAL_LRPS,
                &ACTUAL_LRP_COLUMNS,
                RowLock::Lock,
                SLOT_WHERE,
                &sql_args![process_guid, index, presence.as_i32()],
            )
            .await?;
        self.scan_and_cleanup(tx, rows)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::resource_not_found().into())
    }

    async fn update_row(
        &self,
        tx: &mut dyn Transaction,
        lrp: &ActualLrp,
        attributes: SqlAttributes,
    ) -> SqlResult<()> {
        self.helper
            .update(tx, ACTUAL_LRPS, &attributes, SLOT_WHERE, &slot_args(&lrp.key, lrp.presence))
            .await?;
        Ok(())
    }

    async fn list_tx(
        &self,
        tx: &mut dyn Transaction,
        filter: &ActualLrpFilter,
    ) -> SqlResult<Vec<ActualLrp>> {
        let mut wheres = Vec::new();
        let mut args = Vec::new();
        if let Some(domain) = &filter.domain {
            wheres.push("domain = ?");
            args.push(SqlValue::from(domain));
        }
        if let Some(cell_id) = &filter.cell_id {
            wheres.push("cell_id = ?");
            args.push(SqlValue::from(cell_id));
        }
        if let Some(process_guid) = &filter.process_guid {
            wheres.push("process_guid = ?");
            args.push(SqlValue::from(process_guid));
        }
        if let Some(index) = filter.index {
            wheres.push("instance_index = ?");
            args.push(SqlValue::from(index));
        }

        let rows = self
            .helper
            .query(tx, ACTUAL_LRPS, &ACTUAL_LRP_COLUMNS, RowLock::NoLock, &wheres.join(" AND "), &args)
            .await?;
        self.scan_and_cleanup(tx, rows).await
    }

    async fn create_unclaimed_tx(
        &self,
        tx: &mut dyn Transaction,
        lrp: &ActualLrp,
    ) -> SqlResult<()> {
        self.helper.insert(tx, ACTUAL_LRPS, &row_attributes(lrp)?).await?;
        Ok(())
    }

    async fn unclaim_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
    ) -> SqlResult<(ActualLrp, ActualLrp)> {
        let mut lrp = self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Ordinary)
            .await?;
        let before = lrp.clone();

        if lrp.state == ActualLrpState::Unclaimed {
            debug!(%key, "already unclaimed");
            return Err(Error::cannot_be_unclaimed().into());
        }

        lrp.modification_tag.increment();
        lrp.state = ActualLrpState::Unclaimed;
        lrp.instance_key = ActualLrpInstanceKey::default();
        lrp.net_info = ActualLrpNetInfo::default();
        lrp.since = self.now();

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "state" => lrp.state.as_str(),
                "cell_id" => "",
                "instance_guid" => "",
                "modification_tag_index" => lrp.modification_tag.index,
                "since" => lrp.since,
                "net_info" => serialize_net_info(&lrp.net_info)?,
            },
        )
        .await?;
        Ok((before, lrp))
    }

    async fn claim_tx(
        &self,
        tx: &mut dyn Transaction,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> SqlResult<(ActualLrp, ActualLrp)> {
        let mut lrp = self
            .fetch_for_update(tx, process_guid, index, Presence::Ordinary)
            .await?;
        let before = lrp.clone();

        if !lrp.allows_transition_to(&before.key, instance_key, ActualLrpState::Claimed) {
            error!(
                key = %lrp.key,
                from_state = %lrp.state,
                same_instance_key = (&lrp.instance_key == instance_key),
                "cannot transition to claimed"
            );
            return Err(Error::cannot_be_claimed().into());
        }

        if lrp.state == ActualLrpState::Claimed && &lrp.instance_key == instance_key {
            return Ok((before, lrp));
        }

        lrp.modification_tag.increment();
        lrp.state = ActualLrpState::Claimed;
        lrp.instance_key = instance_key.clone();
        lrp.placement_error.clear();
        lrp.net_info = ActualLrpNetInfo::default();
        lrp.since = self.now();

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "state" => lrp.state.as_str(),
                "cell_id" => lrp.instance_key.cell_id.as_str(),
                "instance_guid" => lrp.instance_key.instance_guid.as_str(),
                "modification_tag_index" => lrp.modification_tag.index,
                "placement_error" => "",
                "since" => lrp.since,
                "net_info" => serialize_net_info(&lrp.net_info)?,
            },
        )
        .await?;
        Ok((before, lrp))
    }

    async fn start_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> SqlResult<(Option<ActualLrp>, ActualLrp)> {
        let mut lrp = match self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Ordinary)
            .await
        {
            Ok(lrp) => lrp,
            Err(err) if is_not_found(&err) => {
                let lrp = ActualLrp {
                    key: key.clone(),
                    instance_key: instance_key.clone(),
                    net_info: net_info.clone(),
                    state: ActualLrpState::Running,
                    since: self.now(),
                    modification_tag: ModificationTag::new(new_epoch(), 0),
                    ..ActualLrp::default()
                };
                self.helper.insert(tx, ACTUAL_LRPS, &row_attributes(&lrp)?).await?;
                return Ok((None, lrp));
            }
            Err(err) => return Err(err),
        };
        let before = lrp.clone();

        if &lrp.key == key
            && &lrp.instance_key == instance_key
            && &lrp.net_info == net_info
            && lrp.is_running()
        {
            debug!(%key, "nothing to change");
            return Ok((Some(before), lrp));
        }

        if !lrp.allows_transition_to(key, instance_key, ActualLrpState::Running) {
            error!(%key, from_state = %lrp.state, "cannot transition to running");
            return Err(Error::cannot_be_started().into());
        }

        lrp.instance_key = instance_key.clone();
        lrp.net_info = net_info.clone();
        lrp.state = ActualLrpState::Running;
        lrp.since = self.now();
        lrp.modification_tag.increment();
        lrp.placement_error.clear();

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "state" => lrp.state.as_str(),
                "cell_id" => lrp.instance_key.cell_id.as_str(),
                "instance_guid" => lrp.instance_key.instance_guid.as_str(),
                "modification_tag_index" => lrp.modification_tag.index,
                "placement_error" => "",
                "since" => lrp.since,
                "net_info" => serialize_net_info(&lrp.net_info)?,
            },
        )
        .await?;
        Ok((Some(before), lrp))
    }

    async fn crash_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> SqlResult<CrashOutcome> {
        let mut lrp = self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Ordinary)
            .await?;
        let before = lrp.clone();

        let now = self.now();
        let since_last_change = now.saturating_sub(lrp.since);
        let crash_count = if since_last_change > CRASH_RESET_TIMEOUT.as_nanos() as i64
            && lrp.is_running()
        {
            1
        } else {
            lrp.crash_count + 1
        };

        if !lrp.allows_transition_to(&before.key, instance_key, ActualLrpState::Crashed) {
            error!(
                %key,
                from_state = %lrp.state,
                same_instance_key = (&lrp.instance_key == instance_key),
                "cannot transition to crashed"
            );
            return Err(Error::cannot_be_crashed().into());
        }

        lrp.modification_tag.increment();
        lrp.state = ActualLrpState::Crashed;
        lrp.instance_key = ActualLrpInstanceKey::default();
        lrp.net_info = ActualLrpNetInfo::default();
        lrp.crash_count = crash_count;
        lrp.crash_reason = truncate(crash_reason, MAX_REASON_LEN);

        let should_restart = lrp.should_restart_immediately(&RestartCalculator::default());
        if should_restart {
            lrp.state = ActualLrpState::Unclaimed;
        }
        lrp.since = now;

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "state" => lrp.state.as_str(),
                "cell_id" => "",
                "instance_guid" => "",
                "modification_tag_index" => lrp.modification_tag.index,
                "crash_count" => lrp.crash_count,
                "crash_reason" => lrp.crash_reason.as_str(),
                "since" => lrp.since,
                "net_info" => serialize_net_info(&lrp.net_info)?,
            },
        )
        .await?;
        Ok(CrashOutcome {
            before,
            after: lrp,
            should_restart,
        })
    }

    async fn fail_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
        placement_error: &str,
    ) -> SqlResult<(ActualLrp, ActualLrp)> {
        let mut lrp = self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Ordinary)
            .await?;
        let before = lrp.clone();

        if lrp.state != ActualLrpState::Unclaimed {
            error!(%key, from_state = %lrp.state, "cannot fail actual lrp");
            return Err(Error::cannot_be_failed().into());
        }

        lrp.modification_tag.increment();
        lrp.placement_error = truncate(placement_error, MAX_REASON_LEN);
        lrp.since = self.now();

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "modification_tag_index" => lrp.modification_tag.index,
                "placement_error" => lrp.placement_error.as_str(),
                "since" => lrp.since,
            },
        )
        .await?;
        Ok((before, lrp))
    }

    async fn remove_tx(
        &self,
        tx: &mut dyn Transaction,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> SqlResult<()> {
        let ordinary = Presence::Ordinary.as_i32();
        let removed = match instance_key {
            None => {
                self.helper
                    .delete(tx, ACTUAL_LRPS, SLOT_WHERE, &sql_args![process_guid, index, ordinary])
                    .await?
            }
            Some(instance_key) => {
                self.helper
                    .delete(
                        tx,
                        ACTUAL_LRPS,
                        "process_guid = ? AND instance_index = ? AND presence = ? AND instance_guid = ? AND cell_id = ?",
                        &sql_args![
                            process_guid,
                            index,
                            ordinary,
                            instance_key.instance_guid.as_str(),
                            instance_key.cell_id.as_str()
                        ],
                    )
                    .await?
            }
        };

        if removed == 0 {
            debug!(process_guid, index, "actual lrp not found");
            return Err(Error::resource_not_found().into());
        }
        Ok(())
    }

    async fn evacuate_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> SqlResult<ActualLrp> {
        let mut lrp = match self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Evacuating)
            .await
        {
            Ok(lrp) => lrp,
            Err(err) if is_not_found(&err) => {
                debug!(%key, "creating evacuating lrp");
                let lrp = ActualLrp {
                    key: key.clone(),
                    instance_key: instance_key.clone(),
                    net_info: net_info.clone(),
                    state: ActualLrpState::Running,
                    presence: Presence::Evacuating,
                    since: self.now(),
                    modification_tag: ModificationTag::new(new_epoch(), 0),
                    ..ActualLrp::default()
                };
                self.helper
                    .upsert(
                        tx,
                        ACTUAL_LRPS,
                        &row_attributes(&lrp)?,
                        SLOT_WHERE,
                        &slot_args(key, Presence::Evacuating),
                    )
                    .await?;
                return Ok(lrp);
            }
            Err(err) => return Err(err),
        };

        if &lrp.key == key && &lrp.instance_key == instance_key && &lrp.net_info == net_info {
            debug!(%key, "evacuating lrp already exists");
            return Ok(lrp);
        }

        lrp.modification_tag.increment();
        lrp.key = key.clone();
        lrp.instance_key = instance_key.clone();
        lrp.net_info = net_info.clone();
        lrp.since = self.now();

        self.update_row(
            tx,
            &lrp,
            sql_attributes! {
                "domain" => lrp.key.domain.as_str(),
                "instance_guid" => lrp.instance_key.instance_guid.as_str(),
                "cell_id" => lrp.instance_key.cell_id.as_str(),
                "net_info" => serialize_net_info(&lrp.net_info)?,
                "state" => lrp.state.as_str(),
                "since" => lrp.since,
                "modification_tag_index" => lrp.modification_tag.index,
            },
        )
        .await?;
        Ok(lrp)
    }

    async fn remove_evacuating_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> SqlResult<Option<ActualLrp>> {
        let lrp = match self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Evacuating)
            .await
        {
            Ok(lrp) => lrp,
            Err(err) if is_not_found(&err) => {
                debug!(%key, "evacuating lrp does not exist");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if &lrp.instance_key != instance_key {
            debug!(%key, "evacuating lrp instance key mismatch");
            return Err(Error::cannot_be_removed().into());
        }

        if let Err(err) = self
            .helper
            .delete(tx, ACTUAL_LRPS, SLOT_WHERE, &slot_args(key, Presence::Evacuating))
            .await
        {
            error!(%key, error = %err, "failed to delete evacuating lrp");
            return Err(Error::cannot_be_removed().into());
        }
        Ok(Some(lrp))
    }

    async fn remove_suspect_tx(
        &self,
        tx: &mut dyn Transaction,
        key: &ActualLrpKey,
    ) -> SqlResult<ActualLrp> {
        let lrp = self
            .fetch_for_update(tx, &key.process_guid, key.index, Presence::Suspect)
            .await?;
        self.helper
            .delete(tx, ACTUAL_LRPS, SLOT_WHERE, &slot_args(key, Presence::Suspect))
            .await?;
        Ok(lrp)
    }
}

// ── ActualLrpDb ────────────────────────────────────────────────────

#[async_trait]
impl ActualLrpDb for SqlDb {
    async fn actual_lrps(&self, filter: &ActualLrpFilter) -> ModelResult<Vec<ActualLrp>> {
        debug!(?filter, "listing actual lrps");
        self.transact(|tx| {
            let this = self.clone();
            let filter = filter.clone();
            Box::pin(async move { this.list_tx(tx, &filter).await })
        })
        .await
    }

    async fn create_unclaimed_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp> {
        info!(%key, "creating unclaimed actual lrp");
        let mut lrp = ActualLrp::unclaimed(key.clone(), self.now());
        lrp.modification_tag = ModificationTag::new(new_epoch(), 0);

        self.transact(|tx| {
            let this = self.clone();
            let lrp = lrp.clone();
            Box::pin(async move { this.create_unclaimed_tx(tx, &lrp).await })
        })
        .await?;
        Ok(lrp)
    }

    async fn unclaim_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<(ActualLrp, ActualLrp)> {
        info!(%key, "unclaiming actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            Box::pin(async move { this.unclaim_tx(tx, &key).await })
        })
        .await
    }

    async fn claim_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<(ActualLrp, ActualLrp)> {
        info!(
            process_guid,
            index,
            instance_guid = %instance_key.instance_guid,
            cell_id = %instance_key.cell_id,
            "claiming actual lrp"
        );
        self.transact(|tx| {
            let this = self.clone();
            let process_guid = process_guid.to_string();
            let instance_key = instance_key.clone();
            Box::pin(async move { this.claim_tx(tx, &process_guid, index, &instance_key).await })
        })
        .await
    }

    async fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<(Option<ActualLrp>, ActualLrp)> {
        info!(%key, instance_guid = %instance_key.instance_guid, "starting actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            let instance_key = instance_key.clone();
            let net_info = net_info.clone();
            Box::pin(async move { this.start_tx(tx, &key, &instance_key, &net_info).await })
        })
        .await
    }

    async fn crash_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        crash_reason: &str,
    ) -> ModelResult<CrashOutcome> {
        info!(%key, instance_guid = %instance_key.instance_guid, crash_reason, "crashing actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            let instance_key = instance_key.clone();
            let crash_reason = crash_reason.to_string();
            Box::pin(async move { this.crash_tx(tx, &key, &instance_key, &crash_reason).await })
        })
        .await
    }

    async fn fail_actual_lrp(
        &self,
        key: &ActualLrpKey,
        placement_error: &str,
    ) -> ModelResult<(ActualLrp, ActualLrp)> {
        info!(%key, placement_error, "failing actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            let placement_error = placement_error.to_string();
            Box::pin(async move { this.fail_tx(tx, &key, &placement_error).await })
        })
        .await
    }

    async fn remove_actual_lrp(
        &self,
        process_guid: &str,
        index: i32,
        instance_key: Option<&ActualLrpInstanceKey>,
    ) -> ModelResult<()> {
        info!(process_guid, index, "removing actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let process_guid = process_guid.to_string();
            let instance_key = instance_key.cloned();
            Box::pin(async move {
                this.remove_tx(tx, &process_guid, index, instance_key.as_ref())
                    .await
            })
        })
        .await
    }

    async fn evacuate_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
        net_info: &ActualLrpNetInfo,
    ) -> ModelResult<ActualLrp> {
        debug!(%key, instance_guid = %instance_key.instance_guid, "evacuating actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            let instance_key = instance_key.clone();
            let net_info = net_info.clone();
            Box::pin(async move { this.evacuate_tx(tx, &key, &instance_key, &net_info).await })
        })
        .await
    }

    async fn remove_evacuating_actual_lrp(
        &self,
        key: &ActualLrpKey,
        instance_key: &ActualLrpInstanceKey,
    ) -> ModelResult<Option<ActualLrp>> {
        debug!(%key, instance_guid = %instance_key.instance_guid, "removing evacuating actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            let instance_key = instance_key.clone();
            Box::pin(async move { this.remove_evacuating_tx(tx, &key, &instance_key).await })
        })
        .await
    }

    async fn remove_suspect_actual_lrp(&self, key: &ActualLrpKey) -> ModelResult<ActualLrp> {
        info!(%key, "removing suspect actual lrp");
        self.transact(|tx| {
            let this = self.clone();
            let key = key.clone();
            Box::pin(async move { this.remove_suspect_tx(tx, &key).await })
        })
        .await
    }
}
