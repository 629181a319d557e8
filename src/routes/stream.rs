use std::convert::Infallible;

use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::stream::PartyStreamQuery,
    error::{AppError, ErrorBody},
    services::stream_service,
    state::{
        SharedState,
        party::{PartyId, UserId},
    },
};

/// Server-sent event endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/streams/presence/{user_id}", get(presence_stream))
        .route("/streams/party/{party_id}", get(party_stream))
}

#[utoipa::path(
    get,
    path = "/streams/presence/{user_id}",
    tag = "streams",
    params(("user_id" = String, Path, description = "Logged-in user opening their presence stream")),
    responses(
        (status = 200, description = "Friends coming online", content_type = "text/event-stream", body = String),
        (status = 401, description = "User is not logged in", body = ErrorBody)
    )
)]
/// Stream notifications about friends coming online. A newer stream replaces an older one.
pub async fn presence_stream(
    State(state): State<SharedState>,
    user_id: Result<Path<UserId>, PathRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Path(user_id) = user_id?;
    let subscription = stream_service::subscribe_presence(&state, &user_id).await?;
    info!(user_id = %user_id, "presence stream connected");
    Ok(stream_service::presence_stream(state, user_id, subscription))
}

#[utoipa::path(
    get,
    path = "/streams/party/{party_id}",
    tag = "streams",
    params(
        ("party_id" = String, Path, description = "Party to watch"),
        PartyStreamQuery
    ),
    responses(
        (status = 200, description = "Party events", content_type = "text/event-stream", body = String),
        (status = 401, description = "Viewer is neither the creator nor a joined player", body = ErrorBody),
        (status = 404, description = "Unknown or expired party", body = ErrorBody)
    )
)]
/// Stream join, exit and removal events of a party until it is over.
pub async fn party_stream(
    State(state): State<SharedState>,
    party_id: Result<Path<PartyId>, PathRejection>,
    query: Result<Query<PartyStreamQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Path(party_id) = party_id?;
    let Query(PartyStreamQuery { user_id }) = query?;
    let receiver = stream_service::subscribe_party(&state, party_id, &user_id).await?;
    info!(party_id = %party_id, user_id = %user_id, "party stream connected");
    Ok(stream_service::party_stream(receiver, party_id, user_id))
}
