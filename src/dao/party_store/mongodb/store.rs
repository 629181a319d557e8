use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoFriendDocument, MongoPartyDocument, MongoUserDocument, friend_edges, party_id},
};
use crate::dao::{
    models::{FriendStatus, PartyEntity, UpdateCounts, UserEntity, UserStatus},
    party_store::PartyStore,
    storage::{StorageError, StorageResult},
};
use crate::state::{
    party::{PartyId, PartyStatus, UserId},
    player_status::PlayerStatus,
};

const PARTY_COLLECTION_NAME: &str = "parties";
const USER_COLLECTION_NAME: &str = "users";
const FRIEND_COLLECTION_NAME: &str = "friends";

#[derive(Clone)]
pub struct MongoPartyStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) = establish_connection(&self.config).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoPartyStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let friends = database.collection::<Document>(FRIEND_COLLECTION_NAME);
        let friend_index = IndexModel::builder()
            .keys(doc! {"userId": 1, "friendId": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("friend_pair_idx".to_owned()))
                    .unique(true)
                    .build(),
            )
            .build();
        friends
            .create_index(friend_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: FRIEND_COLLECTION_NAME,
                index: "userId,friendId",
                source,
            })?;

        let parties = database.collection::<Document>(PARTY_COLLECTION_NAME);
        let party_index = IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("party_status_idx".to_owned()))
                    .build(),
            )
            .build();
        parties
            .create_index(party_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTY_COLLECTION_NAME,
                index: "status",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.database.read().await.clone()
    }

    async fn parties(&self) -> Collection<MongoPartyDocument> {
        self.database().await.collection(PARTY_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<Document> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn friends(&self) -> Collection<MongoFriendDocument> {
        self.database().await.collection(FRIEND_COLLECTION_NAME)
    }

    async fn create_party(&self, party: PartyEntity) -> MongoResult<()> {
        let id = party.id;
        let document: MongoPartyDocument = party.into();
        self.parties()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertParty { id, source })?;
        Ok(())
    }

    async fn update_party_status(
        &self,
        party_ids: Vec<PartyId>,
        status: PartyStatus,
    ) -> MongoResult<()> {
        let count = party_ids.len();
        let ids: Vec<String> = party_ids.iter().map(ToString::to_string).collect();
        self.parties()
            .await
            .update_many(
                doc! {"_id": {"$in": ids}},
                doc! {"$set": {"status": status.as_str()}},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateParties { count, source })?;
        Ok(())
    }

    async fn invite_players(&self, party: PartyId, user_ids: Vec<UserId>) -> MongoResult<()> {
        let mut fields = Document::new();
        for user_id in &user_ids {
            fields.insert(format!("players.{user_id}"), PlayerStatus::Invited.as_str());
        }
        self.parties()
            .await
            .update_one(party_id(party), doc! {"$set": fields})
            .await
            .map_err(|source| MongoDaoError::UpdateParty { id: party, source })?;
        Ok(())
    }

    /// Returns the number of matched parties: 0 when any user is not a member.
    async fn update_player_status(
        &self,
        party: PartyId,
        user_ids: &[UserId],
        status: PlayerStatus,
    ) -> MongoResult<u64> {
        let mut filter = party_id(party);
        let mut fields = Document::new();
        for user_id in user_ids {
            let key = format!("players.{user_id}");
            filter.insert(key.clone(), doc! {"$exists": true});
            fields.insert(key, status.as_str());
        }
        let result = self
            .parties()
            .await
            .update_one(filter, doc! {"$set": fields})
            .await
            .map_err(|source| MongoDaoError::UpdateParty { id: party, source })?;
        Ok(result.matched_count)
    }

    async fn fetch_active_parties(&self) -> MongoResult<Vec<PartyEntity>> {
        let documents: Vec<MongoPartyDocument> = self
            .parties()
            .await
            .find(doc! {"status": PartyStatus::Active.as_str()})
            .await
            .map_err(|source| MongoDaoError::ListParties { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListParties { source })?;

        documents
            .into_iter()
            .map(|document| {
                let id = document.raw_id().to_owned();
                PartyEntity::try_from(document)
                    .map_err(|source| MongoDaoError::CorruptParty { id, source })
            })
            .collect()
    }

    async fn update_user_status(
        &self,
        user_ids: Vec<UserId>,
        status: UserStatus,
    ) -> MongoResult<UpdateCounts> {
        let result = self
            .users()
            .await
            .update_many(
                doc! {"_id": {"$in": user_ids}},
                doc! {"$set": {"status": status.as_str()}},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateUsers { source })?;
        Ok(UpdateCounts {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn check_friendship(
        &self,
        user_id: UserId,
        candidates: Vec<UserId>,
    ) -> MongoResult<bool> {
        let mut expected = candidates;
        expected.sort();
        expected.dedup();
        if expected.is_empty() {
            return Ok(false);
        }
        // distinct ids, so a duplicated edge cannot stand in for a missing friend
        let found = self
            .friends()
            .await
            .distinct(
                "friendId",
                doc! {
                    "userId": user_id.as_str(),
                    "friendId": {"$in": expected.clone()},
                    "status": FriendStatus::Accepted.as_str(),
                },
            )
            .await
            .map_err(|source| MongoDaoError::LoadFriends { user_id, source })?;
        Ok(found.len() == expected.len())
    }

    async fn check_credentials(&self, user_id: UserId, password: String) -> MongoResult<bool> {
        let found = self
            .users()
            .await
            .count_documents(doc! {"_id": user_id, "password": password})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;
        Ok(found > 0)
    }

    async fn find_users(&self, user_ids: Vec<UserId>) -> MongoResult<Vec<UserEntity>> {
        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .clone_with_type::<MongoUserDocument>()
            .find(doc! {"_id": {"$in": user_ids}})
            .projection(doc! {"password": 0})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn friend_ids(&self, user_id: UserId) -> MongoResult<Vec<UserId>> {
        let documents: Vec<MongoFriendDocument> = self
            .friends()
            .await
            .find(doc! {"userId": user_id.as_str(), "status": FriendStatus::Accepted.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadFriends {
                user_id: user_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadFriends { user_id, source })?;
        Ok(documents.into_iter().map(|edge| edge.friend_id).collect())
    }

    async fn friendship_statuses(
        &self,
        user_id: UserId,
        candidates: Vec<UserId>,
    ) -> MongoResult<Vec<(UserId, FriendStatus)>> {
        let documents: Vec<MongoFriendDocument> = self
            .friends()
            .await
            .find(doc! {"userId": user_id.as_str(), "friendId": {"$in": candidates}})
            .await
            .map_err(|source| MongoDaoError::LoadFriends {
                user_id: user_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadFriends { user_id, source })?;
        Ok(documents
            .into_iter()
            .map(|edge| (edge.friend_id, edge.status))
            .collect())
    }

    async fn store_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> MongoResult<()> {
        let friends = self.friends().await;
        friends
            .delete_many(friend_edges(&user_id, &friend_ids))
            .await
            .map_err(|source| MongoDaoError::WriteFriends {
                user_id: user_id.clone(),
                source,
            })?;

        let edges: Vec<MongoFriendDocument> = friend_ids
            .iter()
            .flat_map(|friend_id| {
                [
                    MongoFriendDocument::pending(&user_id, friend_id, &user_id),
                    MongoFriendDocument::pending(friend_id, &user_id, &user_id),
                ]
            })
            .collect();
        friends
            .insert_many(edges)
            .await
            .map_err(|source| MongoDaoError::WriteFriends { user_id, source })?;
        Ok(())
    }

    async fn answer_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
        status: FriendStatus,
    ) -> MongoResult<UpdateCounts> {
        let mut filter = friend_edges(&user_id, &friend_ids);
        filter.insert("status", FriendStatus::Pending.as_str());
        filter.insert("requestedBy", doc! {"$ne": user_id.as_str()});
        let result = self
            .friends()
            .await
            .update_many(filter, doc! {"$set": {"status": status.as_str()}})
            .await
            .map_err(|source| MongoDaoError::WriteFriends { user_id, source })?;
        Ok(UpdateCounts {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn remove_friends(&self, user_id: UserId, friend_ids: Vec<UserId>) -> MongoResult<u64> {
        let result = self
            .friends()
            .await
            .delete_many(friend_edges(&user_id, &friend_ids))
            .await
            .map_err(|source| MongoDaoError::WriteFriends { user_id, source })?;
        Ok(result.deleted_count)
    }
}

impl PartyStore for MongoPartyStore {
    fn create_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_party(party).await.map_err(Into::into) })
    }

    fn update_party_status(
        &self,
        party_ids: Vec<PartyId>,
        status: PartyStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_party_status(party_ids, status)
                .await
                .map_err(Into::into)
        })
    }

    fn invite_players(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .invite_players(party_id, user_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn update_player_status(
        &self,
        party_id: PartyId,
        user_ids: Vec<UserId>,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let matched = store
                .update_player_status(party_id, &user_ids, status)
                .await?;
            if matched == 0 {
                return Err(StorageError::NotAMember { party_id, user_ids });
            }
            Ok(())
        })
    }

    fn fetch_active_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_active_parties().await.map_err(Into::into) })
    }

    fn update_user_status(
        &self,
        user_ids: Vec<UserId>,
        status: UserStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_user_status(user_ids, status)
                .await
                .map_err(Into::into)
        })
    }

    fn check_friendship(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .check_friendship(user_id, candidate_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn check_credentials(
        &self,
        user_id: UserId,
        password: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .check_credentials(user_id, password)
                .await
                .map_err(Into::into)
        })
    }

    fn find_users(
        &self,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_users(user_ids).await.map_err(Into::into) })
    }

    fn friend_ids(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        let store = self.clone();
        Box::pin(async move { store.friend_ids(user_id).await.map_err(Into::into) })
    }

    fn friendship_statuses(
        &self,
        user_id: UserId,
        candidate_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<Vec<(UserId, FriendStatus)>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .friendship_statuses(user_id, candidate_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn store_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .store_friend_requests(user_id, friend_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn answer_friend_requests(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
        status: FriendStatus,
    ) -> BoxFuture<'static, StorageResult<UpdateCounts>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .answer_friend_requests(user_id, friend_ids, status)
                .await
                .map_err(Into::into)
        })
    }

    fn remove_friends(
        &self,
        user_id: UserId,
        friend_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_friends(user_id, friend_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store.inner.ping().await.is_ok() {
                return Ok(());
            }
            store.inner.reconnect().await?;
            store.inner.ping().await.map_err(Into::into)
        })
    }
}
