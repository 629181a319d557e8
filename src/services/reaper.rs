//! Background task expiring parties whose time budget elapsed.
//!
//! Each cycle drains expired parties from the registry, closes their streams, then
//! marks them `over` and their creator and joined players `idle` in the store. Durable
//! writes that fail stay in a backlog retried on every following cycle.

use std::{
    collections::BTreeSet,
    future::Future,
    time::{Duration, SystemTime},
};

use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::{
    dao::{models::UserStatus, storage::StorageResult},
    dto::format_system_time,
    state::{
        SharedState,
        party::{PartyId, PartyStatus, UserId},
    },
};

/// Outcome of a single reaper cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Parties taken out of the registry during this cycle.
    pub expired: Vec<PartyId>,
    /// Parties still waiting for their durable `over` status.
    pub pending_parties: usize,
    /// Users still waiting for their durable `idle` status.
    pub pending_users: usize,
}

pub struct Reaper {
    state: SharedState,
    pending_parties: BTreeSet<PartyId>,
    pending_users: BTreeSet<UserId>,
}

impl Reaper {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            pending_parties: BTreeSet::new(),
            pending_users: BTreeSet::new(),
        }
    }

    /// Reap forever on the given period; the first cycle runs immediately.
    pub async fn run(mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "party reaper started");

        loop {
            ticker.tick().await;
            let report = self.run_once(SystemTime::now()).await;
            if !report.expired.is_empty() || report.pending_parties > 0 || report.pending_users > 0
            {
                debug!(?report, "reaper cycle finished");
            }
        }
    }

    pub async fn run_once(&mut self, now: SystemTime) -> ReapReport {
        let expired = self.state.registry().collect_expired(now).await;
        let mut report = ReapReport::default();

        for party in &expired {
            info!(
                party_id = %party.id,
                start_time = %format_system_time(party.start_time),
                ttl_secs = party.ttl.as_secs(),
                now = %format_system_time(now),
                "party is over"
            );
            self.state.hub().close_party(party.id);

            self.pending_parties.insert(party.id);
            self.pending_users.insert(party.created_by.clone());
            self.pending_users
                .extend(party.joined_members().cloned());
            report.expired.push(party.id);
        }

        self.flush_parties().await;
        self.flush_users().await;

        report.pending_parties = self.pending_parties.len();
        report.pending_users = self.pending_users.len();
        report
    }

    async fn flush_parties(&mut self) {
        if self.pending_parties.is_empty() {
            return;
        }
        let party_ids: Vec<PartyId> = self.pending_parties.iter().copied().collect();
        let write = self
            .state
            .store()
            .update_party_status(party_ids, PartyStatus::Over);

        let outcome = self.durable(write).await;
        match outcome {
            Ok(()) => self.pending_parties.clear(),
            Err(message) => warn!(
                pending = self.pending_parties.len(),
                error = %message,
                "failed to mark parties over; will retry next cycle"
            ),
        }
    }

    async fn flush_users(&mut self) {
        if self.pending_users.is_empty() {
            return;
        }
        let user_ids: Vec<UserId> = self.pending_users.iter().cloned().collect();
        let write = self
            .state
            .store()
            .update_user_status(user_ids, UserStatus::Idle);

        let outcome = self.durable(write).await;
        match outcome {
            Ok(_) => self.pending_users.clear(),
            Err(message) => warn!(
                pending = self.pending_users.len(),
                error = %message,
                "failed to mark players idle; will retry next cycle"
            ),
        }
    }

    async fn durable<T>(&self, write: impl Future<Output = StorageResult<T>>) -> Result<T, String> {
        match self.state.config().store_timeout() {
            Some(limit) => match timeout(limit, write).await {
                Ok(result) => result.map_err(|err| err.to_string()),
                Err(_) => Err(format!("storage did not answer within {limit:?}")),
            },
            None => write.await.map_err(|err| err.to_string()),
        }
    }
}
