use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::player_status::PlayerStatus;

/// Identifier of a user account.
pub type UserId = String;
/// Identifier of a party.
pub type PartyId = Uuid;

/// Lifecycle status of a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    /// The party is live and present in the registry.
    Active,
    /// The party's time budget elapsed; it is gone from the registry.
    Over,
}

impl PartyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Over => "over",
        }
    }
}

/// A short-lived game party as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub id: PartyId,
    pub created_by: UserId,
    pub start_time: SystemTime,
    pub ttl: Duration,
    pub status: PartyStatus,
    /// Every user ever invited to the party, in first-invitation order.
    pub members: IndexMap<UserId, PlayerStatus>,
}

impl Party {
    /// Fresh active party with an empty roster.
    pub fn new(created_by: UserId, ttl: Duration, start_time: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_by,
            start_time,
            ttl,
            status: PartyStatus::Active,
            members: IndexMap::new(),
        }
    }

    pub fn status_of(&self, user_id: &str) -> Option<PlayerStatus> {
        self.members.get(user_id).copied()
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    /// Only the creator and currently joined players may watch the party stream.
    pub fn can_view(&self, user_id: &str) -> bool {
        self.is_creator(user_id) || self.status_of(user_id) == Some(PlayerStatus::Joined)
    }

    /// True once strictly more than `ttl` has elapsed since `start_time`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now.duration_since(self.start_time)
            .map(|elapsed| elapsed > self.ttl)
            .unwrap_or(false)
    }

    pub fn joined_members(&self) -> impl Iterator<Item = &UserId> {
        self.members
            .iter()
            .filter(|(_, status)| **status == PlayerStatus::Joined)
            .map(|(user_id, _)| user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party() -> Party {
        Party::new(
            "u1".into(),
            Duration::from_secs(600),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
        )
    }

    #[test]
    fn expiry_is_strictly_after_the_budget() {
        let party = party();
        assert!(!party.is_expired(party.start_time + Duration::from_secs(600)));
        assert!(party.is_expired(party.start_time + Duration::from_secs(601)));
        assert!(!party.is_expired(party.start_time - Duration::from_secs(5)));
    }

    #[test]
    fn viewers_are_creator_and_joined_players() {
        let mut party = party();
        party.members.insert("u2".into(), PlayerStatus::Joined);
        party.members.insert("u3".into(), PlayerStatus::Invited);

        assert!(party.can_view("u1"));
        assert!(party.can_view("u2"));
        assert!(!party.can_view("u3"));
        assert!(!party.can_view("u4"));
        assert_eq!(party.joined_members().collect::<Vec<_>>(), vec!["u2"]);
    }
}
