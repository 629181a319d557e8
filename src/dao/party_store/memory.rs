//! Process-local [`PartyStore`] used by the test suite and by `STORAGE_BACKEND=memory`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::{sync::Mutex, time::sleep};

use super::PartyStore;
use crate::dao::{
    models::{FriendStatus, PartyEntity, UpdateCounts, UserEntity, UserStatus},
    storage::{StorageError, StorageResult},
};
use crate::state::{
    party::{PartyId, PartyStatus, UserId},
    player_status::PlayerStatus,
};

#[derive(Debug, Error)]
#[error("injected storage failure")]
struct InjectedFailure;

#[derive(Clone, Default)]
pub struct MemoryPartyStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    data: Mutex<MemoryData>,
    pending_failures: AtomicUsize,
    write_delay_ms: AtomicU64,
    member_writes: AtomicUsize,
}

#[derive(Default)]
struct MemoryData {
    users: IndexMap<UserId, StoredUser>,
    friends: Vec<FriendEdge>,
    parties: IndexMap<PartyId, PartyEntity>,
}

struct StoredUser {
    profile: UserEntity,
    password: String,
}

struct FriendEdge {
    user_id: UserId,
    friend_id: UserId,
    status: FriendStatus,
    requested_by: UserId,
}

impl FriendEdge {
    fn links(&self, a: &str, b: &str) -> bool {
        (self.user_id == a && self.friend_id == b) || (self.user_id == b && self.friend_id == a)
    }
}

impl MemoryPartyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an offline user account.
    pub async fn add_user(&self, user_id: &str, password: &str) {
        let mut data = self.inner.data.lock().await;
        data.users.insert(
            user_id.to_owned(),
            StoredUser {
                profile: UserEntity {
                    id: user_id.to_owned(),
                    name: user_id.to_owned(),
                    email: format!("{user_id}@example.com"),
                    level: "amateur".into(),
                    status: UserStatus::Offline,
                },
                password: password.to_owned(),
            },
        );
    }

    /// Record an accepted friendship in both directions.
    pub async fn befriend(&self, a: &str, b: &str) {
        let mut data = self.inner.data.lock().await;
        for (user_id, friend_id) in [(a, b), (b, a)] {
            data.friends.push(FriendEdge {
                user_id: user_id.to_owned(),
                friend_id: friend_id.to_owned(),
                status: FriendStatus::Accepted,
                requested_by: a.to_owned(),
            });
        }
    }

    /// Make the next `count` write operations fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Delay every write operation by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner
            .write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful writes touching party member statuses.
    pub fn member_writes(&self) -> usize {
        self.inner.member_writes.load(Ordering::SeqCst)
    }

    pub async fn party(&self, party_id: PartyId) -> Option<PartyEntity> {
        self.inner.data.lock().await.parties.get(&party_id).cloned()
    }

    pub async fn user_status(&self, user_id: &str) -> Option<UserStatus> {
        let data = self.inner.data.lock().await;
        data.users.get(user_id).map(|user| user.profile.status)
    }

    pub async fn friend_status(&self, user_id: &str, friend_id: &str) -> Option<FriendStatus> {
        let data = self.inner.data.lock().await;
        data.friends
            .iter()
            .find(|edge| edge.user_id == user_id && edge.friend_id == friend_id)
            .map(|edge| edge.status)
    }
}

impl MemoryInner {
    async fn before_write(&self) -> StorageResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }

        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::unavailable(
                "memory store write failed".into(),
                InjectedFailure,
            ));
        }
        Ok(())
    }

    async fn create_party(&self, party: PartyEntity) -> StorageResult<()> {
        self.before_write().await?;
        self.data.lock().await.parties.insert(party.id, party);
        Ok(())
    }

    async fn update_party_status(
        &self,
        party_ids: Vec<PartyId>,
        status: PartyStatus,
    ) -> StorageResult<()> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        for party_id in party_ids {
            if let Some(party) = data.parties.get_mut(&party_id) {
                party.status = status;
            }
        }
        Ok(())
    }

    async fn invite_players(&self, party_id: PartyId, user_ids: Vec<UserId>) -> StorageResult<()> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        if let Some(party) = data.parties.get_mut(&party_id) {
            for user_id in user_ids {
                party.members.insert(user_id, PlayerStatus::Invited);
            }
        }
        self.member_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_player_status(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
        status: PlayerStatus,
    ) -> StorageResult<()> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        let Some(party) = data.parties.get_mut(&party_id) else {
            return Err(StorageError::NotAMember { party_id, user_ids });
        };

        let missing: Vec<UserId> = user_ids
            .iter()
            .filter(|user_id| !party.members.contains_key(*user_id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(StorageError::NotAMember {
                party_id,
                user_ids: missing,
            });
        }

        for user_id in user_ids {
            party.members.insert(user_id, status);
        }
        self.member_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_user_status(
        &self,
        user_ids: Vec<UserId>,
        status: UserStatus,
    ) -> StorageResult<UpdateCounts> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        let mut counts = UpdateCounts::default();
        for user_id in user_ids {
            if let Some(user) = data.users.get_mut(&user_id) {
                counts.matched += 1;
                if user.profile.status != status {
                    user.profile.status = status;
                    counts.modified += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn store_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> StorageResult<()> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        data.friends
            .retain(|edge| !friend_ids.iter().any(|friend_id| edge.links(&user_id, friend_id)));
        for friend_id in friend_ids {
            for (from, to) in [(&user_id, &friend_id), (&friend_id, &user_id)] {
                data.friends.push(FriendEdge {
                    user_id: from.clone(),
                    friend_id: to.clone(),
                    status: FriendStatus::Pending,
                    requested_by: user_id.clone(),
                });
            }
        }
        Ok(())
    }

    async fn answer_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
        status: FriendStatus,
    ) -> StorageResult<UpdateCounts> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        let mut counts = UpdateCounts::default();
        for edge in data.friends.iter_mut() {
            let answerable = edge.status == FriendStatus::Pending
                && edge.requested_by != user_id
                && friend_ids.iter().any(|friend_id| edge.links(&user_id, friend_id));
            if answerable {
                counts.matched += 1;
                counts.modified += 1;
                edge.status = status;
            }
        }
        Ok(counts)
    }

    async fn remove_friends(&self, user_id: UserId, friend_ids: Vec<UserId>) -> StorageResult<u64> {
        self.before_write().await?;
        let mut data = self.data.lock().await;
        let before = data.friends.len();
        data.friends
            .retain(|edge| !friend_ids.iter().any(|friend_id| edge.links(&user_id, friend_id)));
        Ok((before - data.friends.len()) as u64)
    }
}

impl PartyStore for MemoryPartyStore {
    fn create_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.create_party(party).await })
    }

    fn update_party_status(
        &self,
        party_ids: Vec<PartyId>,
        status: PartyStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.update_party_status(party_ids, status).await })
    }

    fn invite_players(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.invite_players(party_id, user_ids).await })
    }

    fn update_player_status(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.update_player_status(party_id, user_ids, status).await })
    }

    fn fetch_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            Ok(data
                .parties
                .values()
                .filter(|party| party.status == PartyStatus::Active)
                .cloned()
                .collect())
        })
    }

    fn update_user_status(
        &self,
        user_ids: Vec<UserId>,
        status: UserStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.update_user_status(user_ids, status).await })
    }

    fn check_friendship(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            let all_friends = candidate_ids.iter().all(|candidate| {
                data.friends.iter().any(|edge| {
                    edge.user_id == user_id
                        && &edge.friend_id == candidate
                        && edge.status == FriendStatus::Accepted
                })
            });
            Ok(!candidate_ids.is_empty() && all_friends)
        })
    }

    fn check_credentials(
        &self,
        user_id: UserId,
        password: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            Ok(data
                .users
                .get(&user_id)
                .is_some_and(|user| user.password == password))
        })
    }

    fn find_users(
        &self,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            Ok(user_ids
                .iter()
                .filter_map(|user_id| data.users.get(user_id))
                .map(|user| user.profile.clone())
                .collect())
        })
    }

    fn friend_ids(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            Ok(data
                .friends
                .iter()
                .filter(|edge| edge.user_id == user_id && edge.status == FriendStatus::Accepted)
                .map(|edge| edge.friend_id.clone())
                .collect())
        })
    }

    fn friendship_statuses(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<(UserId, FriendStatus)>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let data = inner.data.lock().await;
            Ok(data
                .friends
                .iter()
                .filter(|edge| edge.user_id == user_id && candidate_ids.contains(&edge.friend_id))
                .map(|edge| (edge.friend_id.clone(), edge.status))
                .collect())
        })
    }

    fn store_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.store_friend_requests(user_id, friend_ids).await })
    }

    fn answer_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
        status: FriendStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.answer_friend_requests(user_id, friend_ids, status).await })
    }

    fn remove_friends(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.remove_friends(user_id, friend_ids).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
