use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod friend;
pub mod health;
pub mod party;
pub mod stream;
pub mod user;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(user::router())
        .merge(friend::router())
        .merge(party::router())
        .merge(stream::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
