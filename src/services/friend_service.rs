//! Friend requests and friend lists.

use tracing::info;
use validator::Validate;

use crate::{
    dao::models::FriendStatus,
    dto::{
        friend::{AnswerFriendsRequest, FriendsQuery, FriendsRequest, FriendsResponse},
        user::UserProfile,
    },
    error::ServiceError,
    services::party_service::ensure_users_exist,
    state::SharedState,
};

/// Accepted friends of the requested user.
pub async fn list_friends(
    state: &SharedState,
    query: FriendsQuery,
) -> Result<FriendsResponse, ServiceError> {
    query.validate()?;
    ensure_users_exist(state, vec![query.id.clone()]).await?;

    let friend_ids = state.store().friend_ids(query.id).await?;
    let friends = if friend_ids.is_empty() {
        Vec::new()
    } else {
        state.store().find_users(friend_ids).await?
    };

    Ok(FriendsResponse {
        success: true,
        friends: friends.into_iter().map(UserProfile::from).collect(),
    })
}

/// Record pending friend requests from `user_id` to each of `friend_ids`.
pub async fn send_requests(
    state: &SharedState,
    payload: FriendsRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    let mut everyone = payload.friend_ids.clone();
    everyone.push(payload.user_id.clone());
    ensure_users_exist(state, everyone).await?;

    let open: Vec<String> = state
        .store()
        .friendship_statuses(payload.user_id.clone(), payload.friend_ids.clone())
        .await?
        .into_iter()
        .filter(|(_, status)| *status != FriendStatus::Rejected)
        .map(|(friend_id, status)| format!("{friend_id} ({})", status.as_str()))
        .collect();
    if !open.is_empty() {
        return Err(ServiceError::Conflict(format!(
            "{} already has a friendship or a pending request with {}",
            payload.user_id,
            open.join(", ")
        )));
    }

    state
        .store()
        .store_friend_requests(payload.user_id.clone(), payload.friend_ids.clone())
        .await?;
    info!(
        user_id = %payload.user_id,
        friends = ?payload.friend_ids,
        "friend requests sent"
    );
    Ok(())
}

/// Accept or reject requests received by `user_id`.
pub async fn answer_requests(
    state: &SharedState,
    payload: AnswerFriendsRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    let counts = state
        .store()
        .answer_friend_requests(
            payload.user_id.clone(),
            payload.friend_ids.clone(),
            payload.status.into(),
        )
        .await?;

    if counts.matched == 0 {
        return Err(ServiceError::NotFound(format!(
            "no pending friend request for {} from {}",
            payload.user_id,
            payload.friend_ids.join(", ")
        )));
    }
    Ok(())
}

pub async fn remove_friends(
    state: &SharedState,
    payload: FriendsRequest,
) -> Result<(), ServiceError> {
    payload.validate()?;
    let deleted = state
        .store()
        .remove_friends(payload.user_id.clone(), payload.friend_ids.clone())
        .await?;

    if deleted == 0 {
        return Err(ServiceError::NotFound(format!(
            "{} has no friendship with {}",
            payload.user_id,
            payload.friend_ids.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::party_store::{MemoryPartyStore, PartyStore},
        dto::friend::FriendAnswer,
        state::AppState,
    };

    async fn setup() -> (MemoryPartyStore, SharedState) {
        let store = MemoryPartyStore::new();
        for user in ["u1", "u2", "u3"] {
            store.add_user(user, "pw").await;
        }
        let state = AppState::new(Arc::new(store.clone()), AppConfig::default());
        (store, state)
    }

    fn request(user_id: &str, friend_ids: &[&str]) -> FriendsRequest {
        FriendsRequest {
            user_id: user_id.into(),
            friend_ids: friend_ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn request_answer_and_list() {
        let (store, state) = setup().await;
        send_requests(&state, request("u1", &["u2"])).await.unwrap();
        assert_eq!(store.friend_status("u2", "u1").await, Some(FriendStatus::Pending));

        let err = answer_requests(
            &state,
            AnswerFriendsRequest {
                user_id: "u1".into(),
                friend_ids: vec!["u2".into()],
                status: FriendAnswer::Accepted,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        answer_requests(
            &state,
            AnswerFriendsRequest {
                user_id: "u2".into(),
                friend_ids: vec!["u1".into()],
                status: FriendAnswer::Accepted,
            },
        )
        .await
        .unwrap();

        let listed = list_friends(&state, FriendsQuery { id: "u1".into() })
            .await
            .unwrap();
        let ids: Vec<_> = listed.friends.iter().map(|f| f.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2"]);
    }

    #[tokio::test]
    async fn requests_to_unknown_users_are_rejected() {
        let (_, state) = setup().await;
        let err = send_requests(&state, request("u1", &["u2", "ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(message) if message.contains("ghost")));
    }

    #[tokio::test]
    async fn befriending_yourself_is_invalid() {
        let (_, state) = setup().await;
        let err = send_requests(&state, request("u1", &["u1"])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn removal_drops_both_directions() {
        let (store, state) = setup().await;
        store.befriend("u1", "u3").await;

        remove_friends(&state, request("u3", &["u1"])).await.unwrap();
        assert_eq!(store.friend_status("u1", "u3").await, None);
        assert!(matches!(
            remove_friends(&state, request("u3", &["u1"])).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    fn answer(user_id: &str, friend_id: &str, status: FriendAnswer) -> AnswerFriendsRequest {
        AnswerFriendsRequest {
            user_id: user_id.into(),
            friend_ids: vec![friend_id.into()],
            status,
        }
    }

    #[tokio::test]
    async fn repeated_request_conflicts_and_friend_stays_invitable() {
        let (store, state) = setup().await;
        send_requests(&state, request("u1", &["u2"])).await.unwrap();
        let err = send_requests(&state, request("u1", &["u2"])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err = send_requests(&state, request("u2", &["u1"])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        answer_requests(&state, answer("u2", "u1", FriendAnswer::Accepted))
            .await
            .unwrap();
        assert!(matches!(
            send_requests(&state, request("u1", &["u2"])).await,
            Err(ServiceError::Conflict(_))
        ));

        let registry = state.registry();
        let party = registry
            .create("u1".into(), std::time::Duration::from_secs(600))
            .await
            .unwrap();
        registry
            .invite(party.id, "u1", vec!["u2".into()])
            .await
            .unwrap();
        assert!(
            store
                .check_friendship("u1".into(), vec!["u2".into(), "u2".into()])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn rejected_request_can_be_sent_again() {
        let (store, state) = setup().await;
        send_requests(&state, request("u1", &["u3"])).await.unwrap();
        answer_requests(&state, answer("u3", "u1", FriendAnswer::Rejected))
            .await
            .unwrap();

        send_requests(&state, request("u1", &["u3"])).await.unwrap();
        assert_eq!(store.friend_status("u3", "u1").await, Some(FriendStatus::Pending));
        let counts = store
            .answer_friend_requests("u3".into(), vec!["u1".into()], FriendStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(counts.matched, 2);
    }
}
