use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{get, patch, post},
};

use crate::{
    dto::{
        common::SuccessResponse,
        party::{
            CreatePartyRequest, CreatePartyResponse, PartyDecisionRequest, PartyMemberRequest,
            PartyPlayersRequest, PartySummary,
        },
    },
    error::{AppError, ErrorBody},
    services::party_service,
    state::{SharedState, party::PartyId},
};

/// Party lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/party/create", post(create_party))
        .route("/game/party/invite", patch(invite_players))
        .route("/game/party/handle", patch(decide_invitation))
        .route("/game/party/join", patch(join_party))
        .route("/game/party/exit", patch(exit_party))
        .route("/game/party/remove", patch(remove_players))
        .route("/game/party/{party_id}", get(get_party))
}

#[utoipa::path(
    post,
    path = "/game/party/create",
    tag = "party",
    request_body = CreatePartyRequest,
    responses(
        (status = 200, description = "Party created", body = CreatePartyResponse),
        (status = 404, description = "Unknown creator", body = ErrorBody),
        (status = 503, description = "Storage did not answer in time", body = ErrorBody)
    )
)]
/// Open a new party owned by the requesting user.
pub async fn create_party(
    State(state): State<SharedState>,
    payload: Result<Json<CreatePartyRequest>, JsonRejection>,
) -> Result<Json<CreatePartyResponse>, AppError> {
    let Json(payload) = payload?;
    Ok(Json(party_service::create_party(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/game/party/{party_id}",
    tag = "party",
    params(("party_id" = String, Path, description = "Identifier of the party")),
    responses(
        (status = 200, description = "Party snapshot", body = PartySummary),
        (status = 404, description = "Unknown or expired party", body = ErrorBody)
    )
)]
pub async fn get_party(
    State(state): State<SharedState>,
    party_id: Result<Path<PartyId>, PathRejection>,
) -> Result<Json<PartySummary>, AppError> {
    let Path(party_id) = party_id?;
    Ok(Json(party_service::get_party(&state, party_id).await?))
}

#[utoipa::path(
    patch,
    path = "/game/party/invite",
    tag = "party",
    request_body = PartyPlayersRequest,
    responses(
        (status = 200, description = "Players invited", body = SuccessResponse),
        (status = 401, description = "Not the creator, or not friends", body = ErrorBody),
        (status = 409, description = "Invalid transition or concurrent change", body = ErrorBody)
    )
)]
/// Invite accepted friends of the creator.
pub async fn invite_players(
    State(state): State<SharedState>,
    payload: Result<Json<PartyPlayersRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    party_service::invite_players(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/game/party/handle",
    tag = "party",
    request_body = PartyDecisionRequest,
    responses(
        (status = 200, description = "Invitation answered", body = SuccessResponse),
        (status = 409, description = "Invalid transition or concurrent change", body = ErrorBody)
    )
)]
/// Accept or reject an invitation.
pub async fn decide_invitation(
    State(state): State<SharedState>,
    payload: Result<Json<PartyDecisionRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    party_service::decide_invitation(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/game/party/join",
    tag = "party",
    request_body = PartyMemberRequest,
    responses(
        (status = 200, description = "Player joined", body = SuccessResponse),
        (status = 409, description = "Invalid transition or concurrent change", body = ErrorBody)
    )
)]
pub async fn join_party(
    State(state): State<SharedState>,
    payload: Result<Json<PartyMemberRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    party_service::join_party(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/game/party/exit",
    tag = "party",
    request_body = PartyMemberRequest,
    responses(
        (status = 200, description = "Player exited", body = SuccessResponse),
        (status = 409, description = "Invalid transition or concurrent change", body = ErrorBody)
    )
)]
pub async fn exit_party(
    State(state): State<SharedState>,
    payload: Result<Json<PartyMemberRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    party_service::exit_party(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/game/party/remove",
    tag = "party",
    request_body = PartyPlayersRequest,
    responses(
        (status = 200, description = "Players removed", body = SuccessResponse),
        (status = 401, description = "Not the creator", body = ErrorBody),
        (status = 409, description = "Invalid transition or concurrent change", body = ErrorBody)
    )
)]
/// Remove joined players on behalf of the creator.
pub async fn remove_players(
    State(state): State<SharedState>,
    payload: Result<Json<PartyPlayersRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    party_service::remove_players(&state, payload).await?;
    Ok(Json(SuccessResponse::ok()))
}
