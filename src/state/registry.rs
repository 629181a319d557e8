use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime},
};

use thiserror::Error;
use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        party_store::PartyStore,
        storage::{StorageError, StorageResult},
    },
    state::{
        party::{Party, PartyId, UserId},
        player_status::{Decision, InvalidTransition, PlayerStatus, check_transition},
    },
};

/// Unique identifier for a planned membership change.
pub type PlanId = Uuid;

/// Errors surfaced by [`PartyRegistry`] operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The party is unknown or no longer active.
    #[error("party {0} not found")]
    NotFound(PartyId),
    /// The actor lacks the relationship required for the operation.
    #[error("{0}")]
    Unauthorized(String),
    /// A member status change violates the player status machine.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The party changed between validation and apply; the caller should retry.
    #[error("party {0} changed while the update was in flight, please retry")]
    Conflict(PartyId),
    /// The durable write failed; nothing was applied in memory.
    #[error(transparent)]
    Persistence(#[from] StorageError),
    /// The durable store did not answer in time.
    #[error("storage did not answer within {0:?}")]
    Unavailable(Duration),
    /// The background task carrying the update stopped before completing.
    #[error("party update was interrupted")]
    Interrupted,
}

/// Membership change validated against a snapshot of the table, awaiting its durable write.
#[derive(Debug, Clone)]
pub struct MembershipPlan {
    pub id: PlanId,
    pub party_id: PartyId,
    /// Status each target held when the plan was made.
    pub expected: Vec<(UserId, Option<PlayerStatus>)>,
    pub to: PlayerStatus,
}

impl MembershipPlan {
    pub fn targets(&self) -> Vec<UserId> {
        self.expected.iter().map(|(user_id, _)| user_id.clone()).collect()
    }
}

/// Who is allowed to drive a membership change.
enum Actor<'a> {
    /// Only the party creator may act on the targets.
    Creator(&'a str),
    /// Members act on their own entry.
    Member,
}

#[derive(Default)]
struct PartyTable {
    parties: HashMap<PartyId, Party>,
    /// Parties found expired by a regular operation, waiting for the reaper's durable teardown.
    evicted: Vec<Party>,
}

impl PartyTable {
    fn live(&mut self, party_id: PartyId, now: SystemTime) -> Result<&Party, RegistryError> {
        let expired = match self.parties.get(&party_id) {
            Some(party) => party.is_expired(now),
            None => return Err(RegistryError::NotFound(party_id)),
        };

        if expired {
            if let Some(party) = self.parties.remove(&party_id) {
                info!(party_id = %party_id, "evicting expired party");
                self.evicted.push(party);
            }
            return Err(RegistryError::NotFound(party_id));
        }

        self.parties
            .get(&party_id)
            .ok_or(RegistryError::NotFound(party_id))
    }

    fn plan(
        &mut self,
        party_id: PartyId,
        actor: Actor<'_>,
        targets: &[UserId],
        to: PlayerStatus,
        now: SystemTime,
    ) -> Result<MembershipPlan, RegistryError> {
        let party = self.live(party_id, now)?;

        if let Actor::Creator(user_id) = actor {
            if !party.is_creator(user_id) {
                return Err(RegistryError::Unauthorized(format!(
                    "user {user_id} is not the creator of party {party_id}"
                )));
            }
        }

        let mut expected = Vec::with_capacity(targets.len());
        for user_id in targets {
            let current = party.status_of(user_id);
            check_transition(user_id, current, to)?;
            expected.push((user_id.clone(), current));
        }

        Ok(MembershipPlan {
            id: Uuid::new_v4(),
            party_id,
            expected,
            to,
        })
    }

    fn apply(&mut self, plan: &MembershipPlan) -> Result<(), RegistryError> {
        let Some(party) = self.parties.get_mut(&plan.party_id) else {
            return Err(RegistryError::Conflict(plan.party_id));
        };

        let unchanged = plan
            .expected
            .iter()
            .all(|(user_id, status)| party.status_of(user_id) == *status);
        if !unchanged {
            return Err(RegistryError::Conflict(plan.party_id));
        }

        for (user_id, _) in &plan.expected {
            party.members.insert(user_id.clone(), plan.to);
        }
        Ok(())
    }
}

struct RegistryInner {
    table: Mutex<PartyTable>,
    store: Arc<dyn PartyStore>,
    store_timeout: Option<Duration>,
}

impl RegistryInner {
    async fn durable<T>(
        &self,
        write: impl Future<Output = StorageResult<T>>,
    ) -> Result<T, RegistryError> {
        let outcome = match self.store_timeout {
            Some(limit) => timeout(limit, write)
                .await
                .map_err(|_| RegistryError::Unavailable(limit))?,
            None => write.await,
        };
        outcome.map_err(RegistryError::from)
    }

    /// Overwrite the durable write of a rejected plan with the statuses the table holds.
    ///
    /// Runs with the table locked, so no other apply can interleave with the repair.
    async fn restore(&self, table: &mut PartyTable, plan: &MembershipPlan) {
        let Some(party) = table.parties.get_mut(&plan.party_id) else {
            debug!(party_id = %plan.party_id, "party left the table, member statuses not restored");
            return;
        };

        let mut rewrites: HashMap<PlayerStatus, Vec<UserId>> = HashMap::new();
        for user_id in plan.targets() {
            // a new member cannot be taken out of the store again; adopt the invitation
            let current = *party.members.entry(user_id.clone()).or_insert(plan.to);
            if current != plan.to {
                rewrites.entry(current).or_default().push(user_id);
            }
        }

        for (status, user_ids) in rewrites {
            let write = self
                .store
                .update_player_status(plan.party_id, user_ids.clone(), status);
            match self.durable(write).await {
                Ok(()) => debug!(
                    party_id = %plan.party_id,
                    users = ?user_ids,
                    status = %status,
                    "member statuses restored after a conflict"
                ),
                Err(err) => warn!(
                    party_id = %plan.party_id,
                    users = ?user_ids,
                    status = %status,
                    error = %err,
                    "failed to restore member statuses after a conflict"
                ),
            }
        }
    }
}

/// Authoritative in-process table of active parties.
///
/// Every mutation validates against the table under a single lock, releases it for the
/// durable write, then re-locks and re-checks before applying. The write and the apply
/// run on a spawned task so that an apply always follows a successful write, even if the
/// caller goes away.
#[derive(Clone)]
pub struct PartyRegistry {
    inner: Arc<RegistryInner>,
}

impl PartyRegistry {
    pub fn new(store: Arc<dyn PartyStore>, store_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(PartyTable::default()),
                store,
                store_timeout,
            }),
        }
    }

    /// Allocate a fresh active party owned by `creator`.
    pub async fn create(&self, creator: UserId, ttl: Duration) -> Result<Party, RegistryError> {
        let party = Party::new(creator, ttl, SystemTime::now());
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            inner
                .durable(inner.store.create_party(party.clone().into()))
                .await?;
            inner
                .table
                .lock()
                .await
                .parties
                .insert(party.id, party.clone());
            info!(party_id = %party.id, created_by = %party.created_by, "party created");
            Ok::<_, RegistryError>(party)
        });

        task.await.map_err(|_| RegistryError::Interrupted)?
    }

    pub async fn get(&self, party_id: PartyId) -> Result<Party, RegistryError> {
        let mut table = self.inner.table.lock().await;
        table.live(party_id, SystemTime::now()).cloned()
    }

    /// Run `f` against the live party while holding the table lock.
    pub async fn with_party<R>(
        &self,
        party_id: PartyId,
        f: impl FnOnce(&Party) -> R,
    ) -> Result<R, RegistryError> {
        let mut table = self.inner.table.lock().await;
        let party = table.live(party_id, SystemTime::now())?;
        Ok(f(party))
    }

    /// Invite `targets` to the party on behalf of its creator.
    pub async fn invite(
        &self,
        party_id: PartyId,
        inviter: &str,
        targets: Vec<UserId>,
    ) -> Result<(), RegistryError> {
        let plan = self
            .plan(party_id, Actor::Creator(inviter), &targets, PlayerStatus::Invited)
            .await?;

        let friends = self
            .inner
            .durable(
                self.inner
                    .store
                    .check_friendship(inviter.to_owned(), targets.clone()),
            )
            .await?;
        if !friends {
            return Err(RegistryError::Unauthorized(format!(
                "players {} are not all friends of {inviter}",
                targets.join(", ")
            )));
        }

        let write = self.inner.store.invite_players(party_id, targets);
        self.commit(plan, write).await
    }

    /// Accept or reject the invitation `user_id` holds for the party.
    pub async fn decide(
        &self,
        party_id: PartyId,
        user_id: &str,
        decision: Decision,
    ) -> Result<(), RegistryError> {
        self.transition_self(party_id, user_id, decision.into()).await
    }

    pub async fn join(&self, party_id: PartyId, user_id: &str) -> Result<(), RegistryError> {
        self.transition_self(party_id, user_id, PlayerStatus::Joined)
            .await
    }

    pub async fn exit(&self, party_id: PartyId, user_id: &str) -> Result<(), RegistryError> {
        self.transition_self(party_id, user_id, PlayerStatus::Exited)
            .await
    }

    /// Remove joined `targets` from the party on behalf of its creator.
    pub async fn remove(
        &self,
        party_id: PartyId,
        remover: &str,
        targets: Vec<UserId>,
    ) -> Result<(), RegistryError> {
        let plan = self
            .plan(party_id, Actor::Creator(remover), &targets, PlayerStatus::Removed)
            .await?;
        let write = self
            .inner
            .store
            .update_player_status(party_id, targets, PlayerStatus::Removed);
        self.commit(plan, write).await
    }

    /// Load parties read back from the store at startup.
    pub async fn rehydrate(&self, parties: impl IntoIterator<Item = Party>) -> usize {
        let mut table = self.inner.table.lock().await;
        let before = table.parties.len();
        for party in parties {
            table.parties.insert(party.id, party);
        }
        table.parties.len() - before
    }

    /// Remove and return every party expired at `now`, plus the ones evicted since the last call.
    pub async fn collect_expired(&self, now: SystemTime) -> Vec<Party> {
        let mut table = self.inner.table.lock().await;
        let mut expired = std::mem::take(&mut table.evicted);

        let ids: Vec<PartyId> = table
            .parties
            .values()
            .filter(|party| party.is_expired(now))
            .map(|party| party.id)
            .collect();
        for party_id in ids {
            if let Some(party) = table.parties.remove(&party_id) {
                expired.push(party);
            }
        }
        expired
    }

    pub async fn active_count(&self) -> usize {
        self.inner.table.lock().await.parties.len()
    }

    async fn transition_self(
        &self,
        party_id: PartyId,
        user_id: &str,
        to: PlayerStatus,
    ) -> Result<(), RegistryError> {
        let targets = vec![user_id.to_owned()];
        let plan = self.plan(party_id, Actor::Member, &targets, to).await?;
        let write = self.inner.store.update_player_status(party_id, targets, to);
        self.commit(plan, write).await
    }

    async fn plan(
        &self,
        party_id: PartyId,
        actor: Actor<'_>,
        targets: &[UserId],
        to: PlayerStatus,
    ) -> Result<MembershipPlan, RegistryError> {
        let mut table = self.inner.table.lock().await;
        table.plan(party_id, actor, targets, to, SystemTime::now())
    }

    async fn commit<W>(&self, plan: MembershipPlan, write: W) -> Result<(), RegistryError>
    where
        W: Future<Output = StorageResult<()>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            inner.durable(write).await?;
            let mut table = inner.table.lock().await;
            if let Err(err) = table.apply(&plan) {
                inner.restore(&mut table, &plan).await;
                return Err(err);
            }
            drop(table);
            debug!(
                plan_id = %plan.id,
                party_id = %plan.party_id,
                status = %plan.to,
                targets = ?plan.targets(),
                "membership change applied"
            );
            Ok::<_, RegistryError>(())
        });

        task.await.map_err(|_| RegistryError::Interrupted)?
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::dao::party_store::MemoryPartyStore;

    const TTL: Duration = Duration::from_secs(600);

    async fn setup() -> (MemoryPartyStore, PartyRegistry) {
        let store = MemoryPartyStore::new();
        for user in ["u1", "u2", "u3", "u4"] {
            store.add_user(user, "pw").await;
        }
        store.befriend("u1", "u2").await;
        store.befriend("u1", "u3").await;
        let registry = PartyRegistry::new(Arc::new(store.clone()), Some(Duration::from_secs(2)));
        (store, registry)
    }

    fn ids(users: &[&str]) -> Vec<UserId> {
        users.iter().map(|user| user.to_string()).collect()
    }

    #[tokio::test]
    async fn create_writes_through_before_inserting() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();

        assert_eq!(registry.get(party.id).await.unwrap(), party);
        assert_eq!(store.party(party.id).await, Some(party.into()));
    }

    #[tokio::test]
    async fn failed_create_leaves_no_party_behind() {
        let (store, registry) = setup().await;
        store.fail_next_writes(1);

        let err = registry.create("u1".into(), TTL).await.unwrap_err();
        assert!(matches!(err, RegistryError::Persistence(_)));
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn only_the_creator_may_invite() {
        let (_, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();

        let err = registry
            .invite(party.id, "u2", ids(&["u3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        let err = registry
            .invite(party.id, "u2", ids(&["u1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn inviting_a_stranger_writes_nothing() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();

        let err = registry
            .invite(party.id, "u1", ids(&["u2", "u4"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
        assert_eq!(store.member_writes(), 0);
        assert!(registry.get(party.id).await.unwrap().members.is_empty());
    }

    #[tokio::test]
    async fn deciding_twice_is_an_invalid_transition() {
        let (_, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();

        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();
        let err = registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn joining_requires_an_accepted_invitation() {
        let (_, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();

        let err = registry.join(party.id, "u2").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition(_)));
        let err = registry.join(party.id, "u3").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn failed_durable_write_is_not_applied() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();
        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();

        store.fail_next_writes(1);
        let err = registry.join(party.id, "u2").await.unwrap_err();
        assert!(matches!(err, RegistryError::Persistence(_)));

        let party = registry.get(party.id).await.unwrap();
        assert_eq!(party.status_of("u2"), Some(PlayerStatus::Accepted));
    }

    #[tokio::test]
    async fn slow_store_surfaces_unavailable() {
        let store = MemoryPartyStore::new();
        let registry = PartyRegistry::new(Arc::new(store.clone()), Some(Duration::from_millis(10)));
        store.set_write_delay(Duration::from_millis(200));

        let err = registry.create("u1".into(), TTL).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_joins_succeed_exactly_once() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();
        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();

        store.set_write_delay(Duration::from_millis(50));
        let (first, second) = tokio::join!(
            registry.join(party.id, "u2"),
            registry.join(party.id, "u2")
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().any(|result| matches!(
            result,
            Err(RegistryError::Conflict(_) | RegistryError::InvalidTransition(_))
        )));
        let party = registry.get(party.id).await.unwrap();
        assert_eq!(party.status_of("u2"), Some(PlayerStatus::Joined));
    }

    #[tokio::test]
    async fn losing_write_is_rolled_back_in_the_store() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();
        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();
        registry.join(party.id, "u2").await.unwrap();

        store.set_write_delay(Duration::from_millis(50));
        let (exited, removed) = tokio::join!(
            registry.exit(party.id, "u2"),
            registry.remove(party.id, "u1", ids(&["u2"]))
        );

        assert!(exited.is_ok() != removed.is_ok());
        assert!(
            matches!(exited, Err(RegistryError::Conflict(_)))
                || matches!(removed, Err(RegistryError::Conflict(_)))
        );
        let in_memory = registry.get(party.id).await.unwrap().status_of("u2");
        let durable = store
            .party(party.id)
            .await
            .and_then(|stored| stored.members.get("u2").copied());
        assert!(matches!(
            in_memory,
            Some(PlayerStatus::Exited | PlayerStatus::Removed)
        ));
        assert_eq!(durable, in_memory);
    }

    #[tokio::test]
    async fn teardown_during_write_yields_conflict() {
        let (store, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();

        store.set_write_delay(Duration::from_millis(50));
        let pending = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.decide(party.id, "u2", Decision::Rejected).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let reaped = registry
            .collect_expired(SystemTime::now() + Duration::from_secs(3600))
            .await;
        assert_eq!(reaped.len(), 1);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_party_is_evicted_on_access() {
        let (_, registry) = setup().await;
        let party = registry
            .create("u1".into(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = registry.join(party.id, "u2").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(registry.active_count().await, 0);

        let reaped = registry.collect_expired(SystemTime::now()).await;
        assert_eq!(reaped.iter().map(|p| p.id).collect::<Vec<_>>(), vec![party.id]);
    }

    #[tokio::test]
    async fn only_joined_players_can_be_removed() {
        let (_, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        registry
            .invite(party.id, "u1", ids(&["u2", "u3"]))
            .await
            .unwrap();
        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();
        registry.join(party.id, "u2").await.unwrap();

        let err = registry
            .remove(party.id, "u1", ids(&["u2", "u3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition(_)));

        let err = registry
            .remove(party.id, "u2", ids(&["u2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        registry.remove(party.id, "u1", ids(&["u2"])).await.unwrap();
        registry.invite(party.id, "u1", ids(&["u2"])).await.unwrap();
        let party = registry.get(party.id).await.unwrap();
        assert_eq!(party.status_of("u2"), Some(PlayerStatus::Invited));
    }

    #[tokio::test]
    async fn random_operations_never_produce_an_illegal_transition() {
        let (_, registry) = setup().await;
        let party = registry.create("u1".into(), TTL).await.unwrap();
        let players = ["u2", "u3"];
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..300 {
            let before = registry.get(party.id).await.unwrap();
            let player = players[rng.random_range(0..players.len())];
            let _ = match rng.random_range(0..6) {
                0 => registry.invite(party.id, "u1", ids(&[player])).await,
                1 => registry.decide(party.id, player, Decision::Accepted).await,
                2 => registry.decide(party.id, player, Decision::Rejected).await,
                3 => registry.join(party.id, player).await,
                4 => registry.exit(party.id, player).await,
                _ => registry.remove(party.id, "u1", ids(&[player])).await,
            };
            let after = registry.get(party.id).await.unwrap();

            for (user_id, status) in &after.members {
                let previous = before.status_of(user_id);
                if previous != Some(*status) {
                    assert!(
                        crate::state::player_status::is_transition_allowed(previous, *status),
                        "{user_id}: {previous:?} -> {status}"
                    );
                }
            }
            assert!(after.members.len() >= before.members.len());
        }
    }
}
