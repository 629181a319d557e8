use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{UserEntity, UserStatus},
    dto::validation::validate_user_id,
    state::party::UserId,
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: UserId,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: UserId,
}

/// Public user profile; never carries the password.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub level: String,
    pub status: UserStatus,
}

impl From<UserEntity> for UserProfile {
    fn from(value: UserEntity) -> Self {
        Self {
            user_id: value.id,
            name: value.name,
            email: value.email,
            level: value.level,
            status: value.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user_details: UserProfile,
}
