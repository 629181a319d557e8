use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::state::party::{PartyId, UserId};

/// Payload carried by every presence and party stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notification {
    pub message: String,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn online(user_id: &str) -> Self {
        Self::new(format!("{user_id} is now online"))
    }

    pub fn joined(user_id: &str) -> Self {
        Self::new(format!("{user_id} has joined the party"))
    }

    pub fn exited(user_id: &str) -> Self {
        Self::new(format!("{user_id} has exited the party"))
    }

    pub fn removed(user_id: &str) -> Self {
        Self::new(format!("{user_id} has been removed from the party"))
    }

    pub fn party_over(party_id: PartyId) -> Self {
        Self::new(format!("party {party_id} is over"))
    }
}

/// Identifies the viewer attaching to a party stream.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PartyStreamQuery {
    /// User requesting the stream; must be the creator or a joined player.
    pub user_id: UserId,
}
