/// OpenAPI documentation generation.
pub mod documentation;
/// Friend requests and friend lists.
pub mod friend_service;
/// Health check service.
pub mod health_service;
/// Party lifecycle operations.
pub mod party_service;
/// Periodic expiry of parties.
pub mod reaper;
/// Presence and party event streams.
pub mod stream_service;
/// Login and logout.
pub mod user_service;
