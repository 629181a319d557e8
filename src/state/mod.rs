pub mod notifications;
pub mod party;
pub mod player_status;
pub mod registry;

use std::sync::Arc;

use crate::{config::AppConfig, dao::party_store::PartyStore};

pub use self::notifications::{NotificationHub, PresenceSubscription};
pub use self::registry::{PartyRegistry, RegistryError};

pub type SharedState = Arc<AppState>;

/// Central application state: the store handle, the party table and the live streams.
pub struct AppState {
    store: Arc<dyn PartyStore>,
    registry: PartyRegistry,
    hub: NotificationHub,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<dyn PartyStore>, config: AppConfig) -> SharedState {
        let registry = PartyRegistry::new(store.clone(), config.store_timeout());
        let hub = NotificationHub::new(
            config.notification_timeout(),
            config.party_stream_capacity(),
        );
        Arc::new(Self {
            store,
            registry,
            hub,
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn PartyStore> {
        &self.store
    }

    pub fn registry(&self) -> &PartyRegistry {
        &self.registry
    }

    /// Presence and party streams.
    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
