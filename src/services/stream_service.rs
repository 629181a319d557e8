//! Server-sent event streams for presence and party notifications.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dao::models::UserStatus,
    dto::stream::Notification,
    error::ServiceError,
    state::{
        PresenceSubscription, SharedState,
        party::{PartyId, UserId},
    },
};

/// Open the presence slot of a logged-in user.
pub async fn subscribe_presence(
    state: &SharedState,
    user_id: &str,
) -> Result<PresenceSubscription, ServiceError> {
    let online = state
        .store()
        .find_users(vec![user_id.to_owned()])
        .await?
        .iter()
        .any(|user| user.status != UserStatus::Offline);
    if !online {
        return Err(ServiceError::Unauthorized(format!(
            "user {user_id} is not logged in"
        )));
    }

    Ok(state.hub().open_presence(user_id))
}

/// Attach to the party slot; only the creator and joined players may watch.
///
/// The check and the attach happen under the registry lock, so a party torn down
/// concurrently is either reported missing or closes the returned receiver.
pub async fn subscribe_party(
    state: &SharedState,
    party_id: PartyId,
    user_id: &str,
) -> Result<broadcast::Receiver<Notification>, ServiceError> {
    let hub = state.hub();
    state
        .registry()
        .with_party(party_id, |party| {
            party
                .can_view(user_id)
                .then(|| hub.attach_party(party_id))
        })
        .await?
        .ok_or_else(|| {
            ServiceError::Unauthorized(format!(
                "user {user_id} is neither the creator nor a joined player of party {party_id}"
            ))
        })
}

fn to_event(notification: &Notification) -> Option<Event> {
    match Event::default().json_data(notification) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to encode notification");
            None
        }
    }
}

fn into_sse(
    rx: mpsc::Receiver<Result<Event, Infallible>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Forward a presence slot to the client, releasing the slot once the client goes away.
pub fn presence_stream(
    state: SharedState,
    user_id: UserId,
    subscription: PresenceSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let PresenceSubscription {
        session,
        mut receiver,
    } = subscription;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = receiver.recv() => {
                    // None: logged out, or replaced by a newer stream
                    let Some(notification) = next else { break };
                    let Some(event) = to_event(&notification) else { continue };
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        state.hub().release_presence(&user_id, session);
        info!(user_id = %user_id, "presence stream disconnected");
    });

    into_sse(rx)
}

/// Forward a party slot to the client until the party is over or the client leaves.
pub fn party_stream(
    mut receiver: broadcast::Receiver<Notification>,
    party_id: PartyId,
    user_id: UserId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(notification) => {
                            let Some(event) = to_event(&notification) else { continue };
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(party_id = %party_id, skipped, "party viewer lagged behind");
                            continue;
                        }
                    }
                }
            }
        }

        info!(party_id = %party_id, user_id = %user_id, "party stream disconnected");
    });

    into_sse(rx)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::party_store::{MemoryPartyStore, PartyStore},
        state::{AppState, player_status::Decision},
    };

    async fn setup() -> (MemoryPartyStore, SharedState) {
        let store = MemoryPartyStore::new();
        for user in ["u1", "u2", "u3"] {
            store.add_user(user, "pw").await;
        }
        store.befriend("u1", "u2").await;
        store.befriend("u1", "u3").await;
        let state = AppState::new(Arc::new(store.clone()), AppConfig::default());
        (store, state)
    }

    #[tokio::test]
    async fn offline_users_cannot_open_presence() {
        let (store, state) = setup().await;
        let err = subscribe_presence(&state, "u1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        store
            .update_user_status(vec!["u1".into()], UserStatus::Idle)
            .await
            .unwrap();
        assert!(subscribe_presence(&state, "u1").await.is_ok());
        assert!(state.hub().is_online("u1"));
    }

    #[tokio::test]
    async fn only_creator_and_joined_players_watch_a_party() {
        let (_, state) = setup().await;
        let registry = state.registry();
        let party = registry
            .create("u1".into(), Duration::from_secs(600))
            .await
            .unwrap();
        registry
            .invite(party.id, "u1", vec!["u2".into(), "u3".into()])
            .await
            .unwrap();
        registry
            .decide(party.id, "u2", Decision::Accepted)
            .await
            .unwrap();
        registry.join(party.id, "u2").await.unwrap();

        let _creator = subscribe_party(&state, party.id, "u1").await.unwrap();
        let _player = subscribe_party(&state, party.id, "u2").await.unwrap();
        let err = subscribe_party(&state, party.id, "u3").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(state.hub().viewer_count(party.id), 2);
    }

    #[tokio::test]
    async fn missing_party_cannot_be_watched() {
        let (_, state) = setup().await;
        let err = subscribe_party(&state, uuid::Uuid::new_v4(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
