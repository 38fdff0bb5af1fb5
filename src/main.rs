//! Jukebox Back binary entrypoint wiring REST, WebSocket, SSE and the reconciliation loop.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use jukebox_back::{
    config::AppConfig,
    dao::{room_store::MemoryRoomStore, vote_cache::MemoryVoteCache},
    routes,
    services::{
        metadata::{LinkOnlyResolver, MetadataResolver},
        reconciliation,
    },
    state::{AppState, SharedState},
};
use tokio::{net::TcpListener, sync::watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(
        config.clone(),
        Arc::new(MemoryRoomStore::new()),
        Arc::new(MemoryVoteCache::new()),
        select_resolver(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = tokio::spawn(reconciliation::run(
        app_state.votes().clone(),
        config.reconcile_interval(),
        shutdown_rx,
    ));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    let _ = shutdown_tx.send(true);
    reconciler.await.context("joining reconciliation task")?;
    info!("server stopped");

    Ok(())
}

/// Use the YouTube Data API when a key is configured, link parsing otherwise.
fn select_resolver() -> Arc<dyn MetadataResolver> {
    #[cfg(feature = "youtube-resolver")]
    {
        match jukebox_back::services::metadata::YouTubeResolver::from_env() {
            Some(Ok(resolver)) => {
                info!("resolving song metadata with the YouTube Data API");
                return Arc::new(resolver);
            }
            Some(Err(err)) => {
                warn!(error = %err, "failed to build YouTube resolver; falling back to link parsing")
            }
            None => {}
        }
    }

    info!("resolving song metadata from links only");
    Arc::new(LinkOnlyResolver)
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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
