use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::FriendStatus,
    dto::{
        user::UserProfile,
        validation::{validate_user_id, validate_user_ids},
    },
    state::party::UserId,
};

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct FriendsQuery {
    /// User whose accepted friends are listed.
    #[validate(custom(function = "validate_user_id"))]
    pub id: UserId,
}

/// A user acting on a set of other users (send request, remove).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendsRequest {
    pub user_id: UserId,
    pub friend_ids: Vec<UserId>,
}

impl Validate for FriendsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_pair(&self.user_id, &self.friend_ids)
    }
}

/// Answer given to pending friend requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendAnswer {
    Accepted,
    Rejected,
}

impl From<FriendAnswer> for FriendStatus {
    fn from(value: FriendAnswer) -> Self {
        match value {
            FriendAnswer::Accepted => FriendStatus::Accepted,
            FriendAnswer::Rejected => FriendStatus::Rejected,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFriendsRequest {
    pub user_id: UserId,
    /// Users whose requests are answered.
    pub friend_ids: Vec<UserId>,
    pub status: FriendAnswer,
}

impl Validate for AnswerFriendsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_pair(&self.user_id, &self.friend_ids)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendsResponse {
    pub success: bool,
    pub friends: Vec<UserProfile>,
}

fn validate_pair(user_id: &str, friend_ids: &[UserId]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Err(e) = validate_user_id(user_id) {
        errors.add("userId", e);
    }
    if let Err(e) = validate_user_ids(friend_ids) {
        errors.add("friendIds", e);
    }
    if friend_ids.iter().any(|id| id == user_id) {
        let mut e = ValidationError::new("self_target");
        e.message = Some("a user cannot befriend themselves".into());
        errors.add("friendIds", e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
