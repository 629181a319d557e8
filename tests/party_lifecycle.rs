use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use axum::{http::StatusCode, response::IntoResponse};
use social_presence::{
    config::{AppConfig, StorageBackend},
    dao::{
        models::UserStatus,
        party_store::{MemoryPartyStore, PartyStore},
    },
    dto::{
        party::{CreatePartyRequest, PartyDecisionRequest, PartyMemberRequest, PartyPlayersRequest},
        stream::Notification,
        user::LoginRequest,
    },
    error::{AppError, ServiceError},
    services::{party_service, reaper::Reaper, stream_service, user_service},
    state::{
        AppState, SharedState,
        party::{PartyId, PartyStatus},
        player_status::{Decision, PlayerStatus},
    },
};
use tokio::time::timeout;

async fn world() -> (MemoryPartyStore, SharedState) {
    let store = MemoryPartyStore::new();
    for user in ["u1", "u2", "u3", "u4", "u5"] {
        store.add_user(user, "secret").await;
    }
    for friend in ["u2", "u3", "u4"] {
        store.befriend("u1", friend).await;
    }
    let config = AppConfig {
        storage_backend: StorageBackend::Memory,
        ..AppConfig::default()
    };
    let state = AppState::new(Arc::new(store.clone()), config);
    (store, state)
}

async fn login(state: &SharedState, user_id: &str) {
    user_service::login(
        state,
        LoginRequest {
            user_id: user_id.into(),
            password: "secret".into(),
        },
    )
    .await
    .unwrap();
}

async fn open_party(state: &SharedState, ttl_secs: u64) -> PartyId {
    party_service::create_party(
        state,
        CreatePartyRequest {
            user_id: "u1".into(),
            ttl_secs: Some(ttl_secs),
        },
    )
    .await
    .unwrap()
    .party_id
}

async fn invite(
    state: &SharedState,
    party_id: PartyId,
    friends: &[&str],
) -> Result<(), ServiceError> {
    party_service::invite_players(
        state,
        PartyPlayersRequest {
            user_id: "u1".into(),
            party_id,
            friend_ids: friends.iter().map(|f| f.to_string()).collect(),
        },
    )
    .await
}

async fn decide(
    state: &SharedState,
    party_id: PartyId,
    user_id: &str,
    status: Decision,
) -> Result<(), ServiceError> {
    party_service::decide_invitation(
        state,
        PartyDecisionRequest {
            user_id: user_id.into(),
            party_id,
            status,
        },
    )
    .await
}

async fn join(state: &SharedState, party_id: PartyId, user_id: &str) {
    party_service::join_party(
        state,
        PartyMemberRequest {
            user_id: user_id.into(),
            party_id,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn party_runs_its_course_and_is_reaped() {
    let (store, state) = world().await;
    for user in ["u1", "u2", "u3"] {
        login(&state, user).await;
    }

    let party_id = open_party(&state, 600).await;
    invite(&state, party_id, &["u2", "u3"]).await.unwrap();
    decide(&state, party_id, "u2", Decision::Accepted).await.unwrap();
    decide(&state, party_id, "u3", Decision::Rejected).await.unwrap();
    join(&state, party_id, "u2").await;

    let mut viewer = stream_service::subscribe_party(&state, party_id, "u2")
        .await
        .unwrap();

    let mut reaper = Reaper::new(state.clone());
    let report = reaper
        .run_once(SystemTime::now() + Duration::from_secs(601))
        .await;
    assert_eq!(report.expired, vec![party_id]);

    let stored = store.party(party_id).await.unwrap();
    assert_eq!(stored.status, PartyStatus::Over);
    assert_eq!(stored.members["u2"], PlayerStatus::Joined);
    assert_eq!(stored.members["u3"], PlayerStatus::Rejected);
    assert_eq!(store.user_status("u1").await, Some(UserStatus::Idle));
    assert_eq!(store.user_status("u2").await, Some(UserStatus::Idle));
    assert_eq!(store.user_status("u3").await, Some(UserStatus::Idle));

    assert_eq!(
        viewer.recv().await.unwrap(),
        Notification::party_over(party_id)
    );
    let err = party_service::get_party(&state, party_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn reaper_leaves_users_outside_the_party_alone() {
    let (store, state) = world().await;
    login(&state, "u3").await;
    store
        .update_user_status(vec!["u3".into()], UserStatus::InGame)
        .await
        .unwrap();

    let party_id = open_party(&state, 60).await;
    invite(&state, party_id, &["u3"]).await.unwrap();
    decide(&state, party_id, "u3", Decision::Rejected).await.unwrap();

    Reaper::new(state.clone())
        .run_once(SystemTime::now() + Duration::from_secs(120))
        .await;

    assert_eq!(store.user_status("u3").await, Some(UserStatus::InGame));
    assert_eq!(store.user_status("u1").await, Some(UserStatus::Idle));
}

#[tokio::test]
async fn inviting_a_stranger_writes_nothing() {
    let (store, state) = world().await;
    let party_id = open_party(&state, 600).await;

    let err = invite(&state, party_id, &["u5"]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert_eq!(store.member_writes(), 0);
    assert!(store.party(party_id).await.unwrap().members.is_empty());

    let response = AppError::from(err).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invited_players_cannot_watch_the_party() {
    let (_, state) = world().await;
    let party_id = open_party(&state, 600).await;
    invite(&state, party_id, &["u4"]).await.unwrap();

    let err = stream_service::subscribe_party(&state, party_id, "u4")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert_eq!(state.hub().viewer_count(party_id), 0);

    assert!(
        stream_service::subscribe_party(&state, party_id, "u1")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn answering_an_invitation_twice_conflicts() {
    let (_, state) = world().await;
    let party_id = open_party(&state, 600).await;
    invite(&state, party_id, &["u2"]).await.unwrap();
    decide(&state, party_id, "u2", Decision::Accepted).await.unwrap();

    let err = decide(&state, party_id, "u2", Decision::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
    assert_eq!(
        AppError::from(err).into_response().status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn only_the_creator_invites() {
    let (_, state) = world().await;
    let party_id = open_party(&state, 600).await;

    let err = party_service::invite_players(
        &state,
        PartyPlayersRequest {
            user_id: "u2".into(),
            party_id,
            friend_ids: vec!["u3".into()],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn friends_hear_about_a_login() {
    let (_, state) = world().await;
    login(&state, "u2").await;
    let mut subscription = match stream_service::subscribe_presence(&state, "u2").await {
        Ok(subscription) => subscription,
        Err(err) => panic!("presence subscription refused: {err}"),
    };

    login(&state, "u1").await;

    let notification = timeout(Duration::from_secs(1), subscription.receiver.recv())
        .await
        .unwrap();
    assert_eq!(notification, Some(Notification::online("u1")));
}

#[tokio::test]
async fn offline_users_cannot_open_a_presence_stream() {
    let (_, state) = world().await;
    let result = stream_service::subscribe_presence(&state, "u2").await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
}
