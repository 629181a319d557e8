use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{delete, get, patch},
};

use crate::{
    dto::{
        common::SuccessResponse,
        friend::{AnswerFriendsRequest, FriendsQuery, FriendsRequest, FriendsResponse},
    },
    error::{AppError, ErrorBody},
    services::friend_service,
    state::SharedState,
};

/// Friend list and friend request endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/friends", get(list_friends))
        .route("/game/friends/request", patch(send_requests))
        .route("/game/friends/handle-request", patch(answer_requests))
        .route("/game/friends/remove", delete(remove_friends))
}

#[utoipa::path(
    get,
    path = "/game/friends",
    tag = "friends",
    params(FriendsQuery),
    responses(
        (status = 200, description = "Accepted friends", body = FriendsResponse),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
/// List the accepted friends of a user.
pub async fn list_friends(
    State(state): State<SharedState>,
    query: Result<Query<FriendsQuery>, QueryRejection>,
) -> Result<Json<FriendsResponse>, AppError> {
    let Query(query) = query?;
    Ok(Json(friend_service::list_friends(&state, query).await?))
}

#[utoipa::path(
    patch,
    path = "/game/friends/request",
    tag = "friends",
    request_body = FriendsRequest,
    responses(
        (status = 200, description = "Requests recorded", body = SuccessResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
/// Send friend requests to a set of users.
pub async fn send_requests(
    State(state): State<SharedState>,
    payload: Result<Json<FriendsRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    friend_service::send_requests(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/game/friends/handle-request",
    tag = "friends",
    request_body = AnswerFriendsRequest,
    responses(
        (status = 200, description = "Requests answered", body = SuccessResponse),
        (status = 404, description = "No pending request", body = ErrorBody)
    )
)]
/// Accept or reject pending friend requests.
pub async fn answer_requests(
    State(state): State<SharedState>,
    payload: Result<Json<AnswerFriendsRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    friend_service::answer_requests(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/game/friends/remove",
    tag = "friends",
    request_body = FriendsRequest,
    responses(
        (status = 200, description = "Friendships removed", body = SuccessResponse),
        (status = 404, description = "No such friendship", body = ErrorBody)
    )
)]
/// Remove friendships in both directions.
pub async fn remove_friends(
    State(state): State<SharedState>,
    payload: Result<Json<FriendsRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    friend_service::remove_friends(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}
