use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report how many parties are held in memory.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let active_parties = state.registry().active_count().await;

    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(active_parties),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(active_parties)
        }
    }
}
