use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Parties currently held in memory.
    pub active_parties: usize,
}

impl HealthResponse {
    /// Create a health response indicating the store answered its ping.
    pub fn ok(active_parties: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_parties,
        }
    }

    /// Create a health response indicating the store could not be reached.
    pub fn degraded(active_parties: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_parties,
        }
    }
}
