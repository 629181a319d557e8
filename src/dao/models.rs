use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    party::{Party, PartyStatus, UserId},
    player_status::PlayerStatus,
};

/// Durable representation of a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyEntity {
    /// Stable identifier for the party.
    pub id: Uuid,
    /// User that created the party.
    pub created_by: UserId,
    /// Moment the party was created.
    pub start_time: SystemTime,
    /// Time budget after which the party is over.
    pub ttl: Duration,
    /// Lifecycle status.
    pub status: PartyStatus,
    /// Member status keyed by user id.
    pub members: IndexMap<UserId, PlayerStatus>,
}

impl From<Party> for PartyEntity {
    fn from(value: Party) -> Self {
        Self {
            id: value.id,
            created_by: value.created_by,
            start_time: value.start_time,
            ttl: value.ttl,
            status: value.status,
            members: value.members,
        }
    }
}

impl From<PartyEntity> for Party {
    fn from(value: PartyEntity) -> Self {
        Self {
            id: value.id,
            created_by: value.created_by,
            start_time: value.start_time,
            ttl: value.ttl,
            status: value.status,
            members: value.members,
        }
    }
}

/// Account-level presence status stored with the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum UserStatus {
    /// Logged out.
    Offline,
    /// Online but not playing in any party.
    Idle,
    /// Playing in a party.
    InGame,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Idle => "idle",
            Self::InGame => "in-game",
        }
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Free-form level label shown next to the player.
    pub level: String,
    pub status: UserStatus,
}

/// Status of a friendship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Outcome of a bulk update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    /// Records selected by the filter.
    pub matched: u64,
    /// Records whose content actually changed.
    pub modified: u64,
}
