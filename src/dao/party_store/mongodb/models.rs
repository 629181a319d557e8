use std::time::Duration;

use indexmap::IndexMap;
use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{FriendStatus, PartyEntity, UserEntity, UserStatus};
use crate::state::{party::PartyStatus, player_status::PlayerStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPartyDocument {
    #[serde(rename = "_id")]
    id: String,
    created_by: String,
    start_time: DateTime,
    /// Time budget in nanoseconds.
    duration: i64,
    #[serde(default)]
    players: IndexMap<String, PlayerStatus>,
    status: PartyStatus,
}

impl MongoPartyDocument {
    pub fn raw_id(&self) -> &str {
        &self.id
    }
}

impl From<PartyEntity> for MongoPartyDocument {
    fn from(value: PartyEntity) -> Self {
        Self {
            id: value.id.to_string(),
            created_by: value.created_by,
            start_time: DateTime::from_system_time(value.start_time),
            duration: i64::try_from(value.ttl.as_nanos()).unwrap_or(i64::MAX),
            players: value.members,
            status: value.status,
        }
    }
}

impl TryFrom<MongoPartyDocument> for PartyEntity {
    type Error = uuid::Error;

    fn try_from(value: MongoPartyDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            created_by: value.created_by,
            start_time: value.start_time.to_system_time(),
            ttl: Duration::from_nanos(value.duration.max(0) as u64),
            status: value.status,
            members: value.players,
        })
    }
}

/// User profile as stored; the password is projected out before decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    level: String,
    status: UserStatus,
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            level: value.level,
            status: value.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoFriendDocument {
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendStatus,
    pub requested_by: String,
    pub requested_on: DateTime,
}

impl MongoFriendDocument {
    /// Pending edge from `user_id` to `friend_id`, requested by `requested_by`.
    pub fn pending(user_id: &str, friend_id: &str, requested_by: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            friend_id: friend_id.to_owned(),
            status: FriendStatus::Pending,
            requested_by: requested_by.to_owned(),
            requested_on: DateTime::now(),
        }
    }
}

pub fn party_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Matches every edge between `user_id` and one of `friend_ids`, in either direction.
pub fn friend_edges(user_id: &str, friend_ids: &[String]) -> Document {
    doc! {
        "$or": [
            { "userId": user_id, "friendId": { "$in": friend_ids.to_vec() } },
            { "friendId": user_id, "userId": { "$in": friend_ids.to_vec() } },
        ]
    }
}
