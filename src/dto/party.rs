use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_user_id, validate_user_ids},
    },
    state::{
        party::{Party, PartyStatus, UserId},
        player_status::{Decision, PlayerStatus},
    },
};

/// Payload used to open a new party.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    /// Creator of the party.
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: UserId,
    /// Time budget in seconds; the server default applies when omitted.
    #[serde(default)]
    #[validate(range(min = 1, message = "ttl must be at least one second"))]
    pub ttl_secs: Option<u64>,
}

/// Creator acting on a set of players (invite, remove).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartyPlayersRequest {
    /// Creator of the party.
    pub user_id: UserId,
    pub party_id: Uuid,
    /// Players to invite or remove.
    pub friend_ids: Vec<UserId>,
}

impl Validate for PartyPlayersRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_id(&self.user_id) {
            errors.add("userId", e);
        }
        if let Err(e) = validate_user_ids(&self.friend_ids) {
            errors.add("friendIds", e);
        }
        if self.friend_ids.contains(&self.user_id) {
            let mut e = ValidationError::new("self_target");
            e.message = Some("the party creator cannot target themselves".into());
            errors.add("friendIds", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A player acting on their own membership (join, exit).
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PartyMemberRequest {
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: UserId,
    pub party_id: Uuid,
}

/// A player answering an invitation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PartyDecisionRequest {
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: UserId,
    pub party_id: Uuid,
    /// `accepted` or `rejected`.
    pub status: Decision,
}

/// Returned once a party has been created.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyResponse {
    pub success: bool,
    pub party_id: Uuid,
}

/// Public projection of a party.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub party_id: Uuid,
    pub created_by: UserId,
    /// RFC 3339 creation time.
    pub start_time: String,
    pub ttl_secs: u64,
    pub status: PartyStatus,
    /// Member statuses in first-invitation order.
    #[schema(value_type = Object)]
    pub members: IndexMap<UserId, PlayerStatus>,
}

impl From<Party> for PartySummary {
    fn from(value: Party) -> Self {
        Self {
            party_id: value.id,
            created_by: value.created_by,
            start_time: format_system_time(value.start_time),
            ttl_secs: value.ttl.as_secs(),
            status: value.status,
            members: value.members,
        }
    }
}
