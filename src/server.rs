use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    trace::TraceLayer,
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    cors::{AllowOrigin, Any, CorsLayer},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::handlers::{app_js, health_check, index, progress_events, upload_file};
use crate::middleware::add_security_headers;
use crate::state::AppState;
use crate::utils::shutdown_signal;
use crate::config::Config;

// static upload page
pub fn build_page_router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .layer(axum::middleware::from_fn(add_security_headers))
        .layer(CompressionLayer::new()
            .gzip(true)
            .br(true)
            .zstd(true)
        )
}

/// upload, progress stream and health endpoints
pub fn build_api_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!("Building api router with max upload size: {} bytes", config.max_upload_size);

    // axum's default multipart limit is replaced by the configured one
    let uploads = Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size));

    // configure rate limiting, per client ip. a zero burst or period turns it off
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(config.rate_limit_replenish_ms)
        .burst_size(config.rate_limit_burst)
        .finish();
    let uploads = match governor_conf {
        Some(conf) => uploads.layer(GovernorLayer { config: Arc::new(conf) }),
        None => {
            tracing::warn!("Upload rate limiting disabled");
            uploads
        }
    };

    // the event stream is long lived, so it stays out of the rate limiter
    Router::new()
        .merge(uploads)
        .route("/events", get(progress_events))
        .route("/health", get(health_check))
        .with_state(state)
}

/// full application router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .merge(build_page_router())
        .merge(build_api_router(state, config))
        .layer(build_cors(config))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    if config.cors_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// serve until a shutdown signal, then give open connections `config.shutdown_timeout`
/// to finish. progress streams never end on their own, so they are cut off there.
pub async fn start_server(app: Router, addr: SocketAddr, config: &Config) -> std::io::Result<()> {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!("Listener bound to {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Server running and ready to accept connections");
    let shutdown_timeout = config.shutdown_timeout;
    tokio::select! {
        result = async { server.await } => result,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!("Connections still open after {:?}, shutting down anyway", shutdown_timeout);
            Ok(())
        }
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("upload-progress starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 UPLOAD SERVER: http://{}:{}", config.host, config.port);
    tracing::info!("📁 Writing uploads to: {:?}", config.files_dir.canonicalize().unwrap_or(config.files_dir.clone()));
    tracing::info!("⏱️  Progress every {:?}, finished uploads kept {:?}", config.tick_interval, config.grace_period);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
