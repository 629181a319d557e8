use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the social presence service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::user::login,
        crate::routes::user::logout,
        crate::routes::friend::list_friends,
        crate::routes::friend::send_requests,
        crate::routes::friend::answer_requests,
        crate::routes::friend::remove_friends,
        crate::routes::party::create_party,
        crate::routes::party::get_party,
        crate::routes::party::invite_players,
        crate::routes::party::decide_invitation,
        crate::routes::party::join_party,
        crate::routes::party::exit_party,
        crate::routes::party::remove_players,
        crate::routes::stream::presence_stream,
        crate::routes::stream::party_stream,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::common::SuccessResponse,
            crate::dto::health::HealthResponse,
            crate::dto::user::LoginRequest,
            crate::dto::user::LogoutRequest,
            crate::dto::user::LoginResponse,
            crate::dto::user::UserProfile,
            crate::dto::friend::FriendsRequest,
            crate::dto::friend::AnswerFriendsRequest,
            crate::dto::friend::FriendAnswer,
            crate::dto::friend::FriendsResponse,
            crate::dto::party::CreatePartyRequest,
            crate::dto::party::CreatePartyResponse,
            crate::dto::party::PartyPlayersRequest,
            crate::dto::party::PartyMemberRequest,
            crate::dto::party::PartyDecisionRequest,
            crate::dto::party::PartySummary,
            crate::dto::stream::Notification,
            crate::dao::models::UserStatus,
            crate::state::party::PartyStatus,
            crate::state::player_status::PlayerStatus,
            crate::state::player_status::Decision,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "user", description = "Login and logout"),
        (name = "friends", description = "Friend requests and friend lists"),
        (name = "party", description = "Game party lifecycle"),
        (name = "streams", description = "Server-sent presence and party events"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_ids_are_documented_as_uuids() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &doc["components"]["schemas"];
        for request in [
            "PartyPlayersRequest",
            "PartyMemberRequest",
            "PartyDecisionRequest",
        ] {
            let party_id = &schemas[request]["properties"]["partyId"];
            assert_eq!(party_id["type"], "string", "{request}");
            assert_eq!(party_id["format"], "uuid", "{request}");
        }
    }
}
