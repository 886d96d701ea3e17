//! API server for the gated task collection
//!
//! Binary entry point: wires configuration, shared state, and the HTTP
//! router. Mutating routes sit behind the admission gates in gt-core.

mod config;
mod routes;
mod state;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=debug,gt_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Using data directory: {:?}", config.data_dir);
    tracing::info!(
        create_gate_capacity = config.create_gate_capacity,
        worker_pool_size = config.worker_pool_size,
        "Admission layer configured"
    );

    let app_state = AppState::new(&config)
        .await
        .expect("Failed to initialize application state");

    // Credentials are allowed, so the origin must be explicit and the
    // headers mirrored; tower-http rejects wildcards here
    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .expect("GT_ALLOWED_ORIGIN is not a valid header value");
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::tasks::router())
        .merge(routes::singlethread::router())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("REST API listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
