//! Hive Mind Back binary entrypoint wiring REST, the store, the spectrum
//! catalog, and the lifecycle scheduler.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use catalog::SpectrumCatalog;
use config::AppConfig;
use dao::kv::MemoryKvStore;
#[cfg(feature = "http-publisher")]
use services::publisher::HttpPostPublisher;
use services::publisher::{LocalPostPublisher, PostPublisher};
use services::scoring::NullSocialSignal;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let catalog = Arc::new(SpectrumCatalog::new(
        config.catalog_path.clone(),
        config.catalog_ttl(),
    ));
    let publisher = build_publisher(&config)?;

    let app_state = AppState::new(config, catalog, publisher, Arc::new(NullSocialSignal));
    app_state.install_store(Arc::new(MemoryKvStore::new())).await;
    info!("in-memory store installed");

    tokio::spawn(services::scheduler::run_scheduler_loop(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
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

    Ok(())
}

/// Pick the post publisher implementation from configuration.
fn build_publisher(config: &AppConfig) -> anyhow::Result<Arc<dyn PostPublisher>> {
    #[cfg(feature = "http-publisher")]
    if let Some(base_url) = config.publisher_base_url.clone() {
        info!(%base_url, "using HTTP post publisher");
        return Ok(Arc::new(HttpPostPublisher::new(base_url)?));
    }

    #[cfg(not(feature = "http-publisher"))]
    if config.publisher_base_url.is_some() {
        tracing::warn!(
            "publisher_base_url is set but the http-publisher feature is disabled; using local refs"
        );
    }

    info!("using local post publisher");
    Ok(Arc::new(LocalPostPublisher))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
