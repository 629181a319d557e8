pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{FriendStatus, PartyEntity, UpdateCounts, UserEntity, UserStatus};
use crate::dao::storage::StorageResult;
use crate::state::{
    party::{PartyId, PartyStatus, UserId},
    player_status::PlayerStatus,
};

pub use memory::MemoryPartyStore;

/// Abstraction over the system of record for users, friendships and parties.
pub trait PartyStore: Send + Sync {
    fn create_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_party_status(
        &self,
        party_ids: Vec<PartyId>,
        status: PartyStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Mark every user as `invited`, adding the ones that are not members yet.
    fn invite_players(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Set the status of existing members; fails with `NotAMember` otherwise.
    fn update_player_status(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn fetch_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>>;
    fn update_user_status(
        &self,
        user_ids: Vec<UserId>,
        status: UserStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>>;
    /// True only when every candidate is an accepted friend of `user_id`.
    fn check_friendship(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn check_credentials(
        &self,
        user_id: UserId,
        password: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Profiles of the requested users that exist.
    fn find_users(
        &self,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Ids of the accepted friends of `user_id`.
    fn friend_ids(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<Vec<UserId>>>;
    /// Status of every existing edge from `user_id` to one of `candidate_ids`.
    fn friendship_statuses(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<(UserId, FriendStatus)>>>;
    /// Open a pending request in both directions, replacing any earlier edge of the pair.
    fn store_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Settle pending requests that were sent *to* `user_id` by `friend_ids`.
    fn answer_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
        status: FriendStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>>;
    /// Delete friendship edges in both directions, returning the number deleted.
    fn remove_friends(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
