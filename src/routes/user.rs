use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::patch,
};

use crate::{
    dto::{
        common::SuccessResponse,
        user::{LoginRequest, LoginResponse, LogoutRequest},
    },
    error::{AppError, ErrorBody},
    services::user_service,
    state::SharedState,
};

/// Login and logout endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/user/login", patch(login))
        .route("/user/logout", patch(logout))
}

#[utoipa::path(
    patch,
    path = "/user/login",
    tag = "user",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "User logged in", body = LoginResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
/// Check the credentials, mark the user idle and notify their online friends.
pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    Ok(Json(user_service::login(&state, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/user/logout",
    tag = "user",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "User logged out", body = SuccessResponse),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
/// Mark the user offline and close their presence stream.
pub async fn logout(
    State(state): State<SharedState>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    user_service::logout(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}
