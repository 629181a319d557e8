//! Social presence binary entrypoint wiring the store, the party registry, the reaper and HTTP routes.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_presence::{
    config::{AppConfig, StorageBackend},
    dao::party_store::{MemoryPartyStore, PartyStore},
    routes,
    services::reaper::Reaper,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = build_store(&config).await?;
    let port = config.port;
    let reaper_interval = config.reaper_interval();

    let app_state = AppState::new(store, config);
    rehydrate(&app_state).await?;

    // The first reaper cycle runs immediately and expires parties that ran out while we were down.
    tokio::spawn(Reaper::new(app_state.clone()).run(reaper_interval));

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PartyStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("using the in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryPartyStore::new()))
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use social_presence::dao::party_store::mongodb::{MongoConfig, MongoPartyStore};

            let mongo_config = MongoConfig::from_uri(&config.mongo_uri, config.mongo_db.as_deref())
                .await
                .context("parsing MongoDB configuration")?
                .with_store_timeout(config.store_timeout());
            let store = MongoPartyStore::connect(mongo_config)
                .await
                .context("connecting to MongoDB")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo-store"))]
        StorageBackend::Mongo => {
            anyhow::bail!("MongoDB backend requested but the `mongo-store` feature is disabled")
        }
    }
}

/// Load parties still active in the store back into the registry.
async fn rehydrate(state: &SharedState) -> anyhow::Result<()> {
    let parties = state
        .store()
        .fetch_active_parties()
        .await
        .context("loading active parties")?;
    let restored = state
        .registry()
        .rehydrate(parties.into_iter().map(Into::into))
        .await;
    info!(restored, "restored active parties");
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
