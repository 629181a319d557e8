//! Party operations: registry mutation first, then user status and party stream side effects.

use std::time::Duration;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::UserStatus,
    dto::{
        party::{
            CreatePartyRequest, CreatePartyResponse, PartyDecisionRequest, PartyMemberRequest,
            PartyPlayersRequest, PartySummary,
        },
        stream::Notification,
    },
    error::ServiceError,
    state::{
        SharedState,
        party::{PartyId, UserId},
    },
};

/// Open a new party owned by the requesting user.
pub async fn create_party(
    state: &SharedState,
    payload: CreatePartyRequest,
) -> Result<CreatePartyResponse, ServiceError> {
    payload.validate()?;
    ensure_users_exist(state, vec![payload.user_id.clone()]).await?;

    let ttl = payload
        .ttl_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.config().party_ttl());
    let party = state.registry().create(payload.user_id, ttl).await?;

    mark_users(state, vec![party.created_by.clone()], UserStatus::InGame).await;
    Ok(CreatePartyResponse {
        success: true,
        party_id: party.id,
    })
}

pub async fn get_party(
    state: &SharedState,
    party_id: PartyId,
) -> Result<PartySummary, ServiceError> {
    let party = state.registry().get(party_id).await?;
    Ok(party.into())
}

/// Invite accepted friends of the creator to the party.
pub async fn invite_players(
    state: &SharedState,
    payload: PartyPlayersRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    state
        .registry()
        .invite(payload.party_id, &payload.user_id, payload.friend_ids.clone())
        .await?;

    info!(
        party_id = %payload.party_id,
        invited = ?payload.friend_ids,
        "players invited"
    );
    Ok(())
}

/// Accept or reject an invitation.
pub async fn decide_invitation(
    state: &SharedState,
    payload: PartyDecisionRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    state
        .registry()
        .decide(payload.party_id, &payload.user_id, payload.status)
        .await?;
    Ok(())
}

pub async fn join_party(
    state: &SharedState,
    payload: PartyMemberRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    state
        .registry()
        .join(payload.party_id, &payload.user_id)
        .await?;

    mark_users(state, vec![payload.user_id.clone()], UserStatus::InGame).await;
    state
        .hub()
        .publish_party(payload.party_id, Notification::joined(&payload.user_id));
    Ok(())
}

pub async fn exit_party(
    state: &SharedState,
    payload: PartyMemberRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    state
        .registry()
        .exit(payload.party_id, &payload.user_id)
        .await?;

    mark_users(state, vec![payload.user_id.clone()], UserStatus::Idle).await;
    state
        .hub()
        .publish_party(payload.party_id, Notification::exited(&payload.user_id));
    Ok(())
}

/// Remove joined players from the party on behalf of its creator.
pub async fn remove_players(
    state: &SharedState,
    payload: PartyPlayersRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    state
        .registry()
        .remove(payload.party_id, &payload.user_id, payload.friend_ids.clone())
        .await?;

    for user_id in &payload.friend_ids {
        state
            .hub()
            .publish_party(payload.party_id, Notification::removed(user_id));
    }
    mark_users(state, payload.friend_ids, UserStatus::Idle).await;
    Ok(())
}

/// Fail with `NotFound` naming every id the store does not know.
pub(crate) async fn ensure_users_exist(
    state: &SharedState,
    user_ids: Vec<UserId>,
) -> Result<(), ServiceError> {
    let found = state.store().find_users(user_ids.clone()).await?;
    let missing: Vec<UserId> = user_ids
        .into_iter()
        .filter(|user_id| !found.iter().any(|user| &user.id == user_id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!(
            "users {} not found",
            missing.join(", ")
        )))
    }
}

/// Best-effort user status update following a party change; never fails the caller.
pub(crate) async fn mark_users(state: &SharedState, user_ids: Vec<UserId>, status: UserStatus) {
    if let Err(err) = state
        .store()
        .update_user_status(user_ids.clone(), status)
        .await
    {
        warn!(
            users = ?user_ids,
            status = status.as_str(),
            error = %err,
            "failed to update user status"
        );
    }
}
