use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        http::{HeaderName, HeaderValue},
        routing::{any, get},
    },
    snare_config::ServerConfig,
    snare_resolver::StreamResolver,
    tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer},
    tracing::{info, warn},
};

use crate::handlers::{health_handler, resolve_handler};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<StreamResolver>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(resolver: StreamResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Permissive CORS headers sent on every response.
pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("access-control-allow-credentials", "true"),
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET,OPTIONS,PATCH,DELETE,POST,PUT",
    ),
    (
        "access-control-allow-headers",
        "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, \
         Content-Type, Date, X-Api-Version",
    ),
];

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState, request_logs: bool) -> Router {
    let mut router = Router::new()
        .route("/", any(resolve_handler))
        .route("/api/stream", any(resolve_handler))
        .route("/health", get(health_handler));

    for (name, value) in CORS_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        ));
    }
    if request_logs {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

/// Serve until ctrl-c.
pub async fn start_gateway(config: &ServerConfig, resolver: StreamResolver) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let app = build_app(AppState::new(resolver), config.http_request_logs);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "snare gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("snare gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
