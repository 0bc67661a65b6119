mod api;

use anyhow::Context;
use axum::extract::MatchedPath;
use axum::http::Request;
use souschef_core::{
    spawn_narrator, Clock, Config, HostPolicy, HttpClient, LogSpeaker, SessionActor,
    SessionHandle, SessionStore, SystemClock,
};
use std::env;
use std::sync::Arc;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Fetches recipe pages
    pub client: Arc<dyn HttpClient>,
    pub hosts: Arc<HostPolicy>,
    /// Backs `/api/session-store` and the live session
    pub store: Arc<dyn SessionStore>,
    pub live: SessionHandle,
    pub clock: Arc<dyn Clock>,
}

fn init_telemetry() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Check for --openapi flag to dump spec and exit
    if env::args().any(|arg| arg == "--openapi") {
        println!("{}", api::openapi().to_pretty_json()?);
        return Ok(());
    }

    init_telemetry();

    let config = Config::from_env().context("Invalid SOUSCHEF_* configuration")?;
    let client = config
        .fetch_client()
        .context("Failed to build HTTP client")?;
    let store = config.store.open();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (live, actor_task) =
        SessionActor::spawn(Some(store.clone()), clock.clone(), config.actor_config());
    let narrator = spawn_narrator(live.subscribe(), Arc::new(LogSpeaker));

    let state = AppState {
        client: Arc::new(client),
        hosts: Arc::new(config.allowed_hosts.clone()),
        store: store.clone(),
        live: live.clone(),
        clock,
    };

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let path = request
                .extensions()
                .get::<MatchedPath>()
                .map_or(request.uri().path(), MatchedPath::as_str);
            tracing::info_span!("http_request", method = %request.method(), path = %path)
        })
        .on_request(())
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );
    let app = api::router(state).layer(trace);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!("Server listening on {}", listener.local_addr()?);
    tracing::info!("Session store: {}", store.describe());
    if config.allowed_hosts.is_unrestricted() {
        tracing::info!("Recipe URLs may point at any host");
    }
    tracing::info!(
        "OpenAPI spec available at http://{}/api-docs/openapi.json",
        config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down session");
    live.shutdown().await;
    actor_task.await.context("Session task panicked")?;
    narrator.abort();
    Ok(())
}
