//! Scripted in-memory database for unit tests.
//!
//! Every statement is logged with its arguments and answered from a FIFO of
//! [`Reply`] values. An empty queue answers zero rows / zero affected.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bbs_models::ActualLrp;

use crate::clock::Clock;
use crate::error::DriverError;
use crate::queryable::{Queryable, QueryableDb, SqlRow, SqlValue, Transaction};

pub(crate) enum Reply {
    Rows(Vec<SqlRow>),
    Affected(u64),
    Fail(DriverError),
}

#[derive(Default)]
struct FakeState {
    log: Vec<(String, Vec<SqlValue>)>,
    replies: VecDeque<Reply>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

#[derive(Clone, Default)]
pub(crate) struct FakeDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDb {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.state().replies.push_back(reply);
    }

    pub(crate) fn log(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.state().log.clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.state().log.iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub(crate) fn begins(&self) -> usize {
        self.state().begins
    }

    pub(crate) fn commits(&self) -> usize {
        self.state().commits
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.state().rollbacks
    }

    fn answer(&self, query: &str, args: &[SqlValue]) -> Option<Reply> {
        let mut state = self.state();
        state.log.push((query.to_string(), args.to_vec()));
        state.replies.pop_front()
    }
}

#[async_trait]
impl Queryable for FakeDb {
    async fn execute(&mut self, query: &str, args: &[SqlValue]) -> Result<u64, DriverError> {
        match self.answer(query, args) {
            None => Ok(0),
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Rows(rows)) => Ok(rows.len() as u64),
            Some(Reply::Fail(err)) => Err(err),
        }
    }

    async fn fetch_all(
        &mut self,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Vec<SqlRow>, DriverError> {
        match self.answer(query, args) {
            None | Some(Reply::Affected(_)) => Ok(Vec::new()),
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(err)) => Err(err),
        }
    }
}

#[async_trait]
impl Transaction for FakeDb {
    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.state().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.state().rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl QueryableDb for FakeDb {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        self.state().begins += 1;
        Ok(Box::new(self.clone()))
    }

    async fn acquire(&self) -> Result<Box<dyn Queryable>, DriverError> {
        Ok(Box::new(self.clone()))
    }
}

pub(crate) struct FakeClock(pub i64);

impl Clock for FakeClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// The row the store would read back for `lrp`.
pub(crate) fn actual_lrp_row(lrp: &ActualLrp) -> SqlRow {
    SqlRow::from_pairs([
        ("process_guid", SqlValue::from(lrp.key.process_guid.as_str())),
        ("instance_index", SqlValue::from(lrp.key.index)),
        ("presence", SqlValue::from(lrp.presence.as_i32())),
        ("domain", SqlValue::from(lrp.key.domain.as_str())),
        ("state", SqlValue::from(lrp.state.as_str())),
        ("instance_guid", SqlValue::from(lrp.instance_key.instance_guid.as_str())),
        ("cell_id", SqlValue::from(lrp.instance_key.cell_id.as_str())),
        ("placement_error", SqlValue::from(lrp.placement_error.as_str())),
        ("since", SqlValue::from(lrp.since)),
        ("net_info", SqlValue::from(serde_json::to_string(&lrp.net_info).unwrap())),
        ("modification_tag_epoch", SqlValue::from(lrp.modification_tag.epoch.as_str())),
        ("modification_tag_index", SqlValue::from(lrp.modification_tag.index)),
        ("crash_count", SqlValue::from(lrp.crash_count)),
        ("crash_reason", SqlValue::from(lrp.crash_reason.as_str())),
    ])
}
