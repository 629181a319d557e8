//! Login and logout, and the presence announcements that follow a login.

use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dao::models::UserStatus,
    dto::{
        stream::Notification,
        user::{LoginRequest, LoginResponse, LogoutRequest, UserProfile},
    },
    error::ServiceError,
    state::{SharedState, party::UserId},
};

/// Check credentials, mark the user idle and announce them to their online friends.
pub async fn login(
    state: &SharedState,
    payload: LoginRequest,
) -> Result<LoginResponse, ServiceError> {
    payload.validate()?;
    let LoginRequest { user_id, password } = payload;

    if !state
        .store()
        .check_credentials(user_id.clone(), password)
        .await?
    {
        return Err(ServiceError::Unauthorized(
            "invalid user id or password".into(),
        ));
    }

    let counts = state
        .store()
        .update_user_status(vec![user_id.clone()], UserStatus::Idle)
        .await?;
    if counts.matched == 0 {
        return Err(ServiceError::NotFound(format!("user {user_id} not found")));
    }

    let profile = state
        .store()
        .find_users(vec![user_id.clone()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("user {user_id} not found")))?;

    info!(user_id = %user_id, "user logged in");
    tokio::spawn(announce_online(state.clone(), user_id));

    Ok(LoginResponse {
        success: true,
        user_details: UserProfile::from(profile),
    })
}

/// Mark the user offline and close their presence stream.
pub async fn logout(state: &SharedState, payload: LogoutRequest) -> Result<(), ServiceError> {
    payload.validate()?;
    let user_id = payload.user_id;

    let counts = state
        .store()
        .update_user_status(vec![user_id.clone()], UserStatus::Offline)
        .await?;
    if counts.matched == 0 {
        return Err(ServiceError::NotFound(format!("user {user_id} not found")));
    }

    if state.hub().close_presence(&user_id) {
        debug!(user_id = %user_id, "presence stream closed");
    }
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Push "`user_id` is now online" to every accepted friend with an open presence stream.
pub async fn announce_online(state: SharedState, user_id: UserId) -> usize {
    let friends = match state.store().friend_ids(user_id.clone()).await {
        Ok(friends) => friends,
        Err(err) => {
            warn!(
                user_id = %user_id,
                error = %err,
                "failed to load friends for presence announcement"
            );
            return 0;
        }
    };

    let mut delivered = 0;
    for friend_id in friends {
        if state
            .hub()
            .push_presence(&friend_id, Notification::online(&user_id))
            .await
        {
            delivered += 1;
        }
    }
    delivered
}
