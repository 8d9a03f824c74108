//! Stateless HTTP transport: `POST /mcp` creates an isolated per-request
//! protocol session bound to the shared registry, so internal correlation
//! ids from distinct clients can never route to the wrong connection.
//! `GET /health` and `GET /metrics` sit next to it.

use crate::settings::{AuthMode, AuthSettings};
use crate::tools::{McpServer, ToolDeps};
use crate::Settings;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing, BoxError, Json, Router};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub type HttpJoinHandle = JoinHandle<Result<(), ApiError>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP transport needs `http_port` to be configured")]
    PortNotConfigured,

    #[error("failed joining with server task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}

#[derive(Clone)]
struct HttpState {
    deps: Arc<ToolDeps>,
    auth_mode: AuthMode,
    api_key: Option<Arc<str>>,
}

pub struct Server {
    port: u16,
    server_handle: HttpJoinHandle,
}

impl Server {
    #[instrument(level = "debug", skip(deps, settings))]
    pub async fn build(deps: Arc<ToolDeps>, settings: &Settings) -> Result<Self, ApiError> {
        let port = settings.http_port.ok_or(ApiError::PortNotConfigured)?;
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();
        info!(port, "HTTP transport listening");

        let server_handle = run_http_server(listener, deps, &settings.auth);
        Ok(Self { port, server_handle })
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), ApiError> {
        self.server_handle.await?
    }
}

fn run_http_server(
    listener: tokio::net::TcpListener, deps: Arc<ToolDeps>, auth: &AuthSettings,
) -> HttpJoinHandle {
    if auth.mode == AuthMode::Jwt {
        warn!("auth mode `jwt` only checks for a bearer token in this build");
    }
    let state = HttpState {
        deps: deps.clone(),
        auth_mode: auth.mode,
        api_key: auth.api_key.as_ref().map(|secret| Arc::from(secret.expose_secret().as_str())),
    };

    let session_deps = deps.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(McpServer::new(session_deps.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig { stateful_mode: false, ..Default::default() },
    );

    let protected = Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let middleware_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .timeout(HTTP_REQUEST_TIMEOUT)
        .layer(TraceLayer::new_for_http());

    let app = Router::new()
        .route("/health", routing::get(serve_health))
        .route("/metrics", routing::get(serve_metrics))
        .merge(protected)
        .with_state(state)
        .layer(middleware_stack);

    tokio::spawn(async move {
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        info!("HTTP transport shut down");
        Ok(())
    })
}

async fn serve_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "transport": "http" }))
}

async fn serve_metrics(State(state): State<HttpState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.deps.metrics.render(),
    )
}

/// Single header check in front of `/mcp`; `/health` and `/metrics` stay
/// open.
async fn require_auth(
    State(state): State<HttpState>, request: Request, next: Next,
) -> Response {
    let authorized = match state.auth_mode {
        AuthMode::None => true,
        AuthMode::ApiKey => {
            let presented =
                request.headers().get("x-api-key").and_then(|value| value.to_str().ok());
            match (&state.api_key, presented) {
                (Some(expected), Some(presented)) => presented == expected.as_ref(),
                _ => false,
            }
        },
        AuthMode::Jwt => request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.strip_prefix("Bearer ").is_some_and(|token| !token.is_empty()))
            .unwrap_or(false),
    };

    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })))
            .into_response();
    }
    next.run(request).await
}

async fn handle_middleware_error(error: BoxError) -> Response {
    if error.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, format!("REQUEST TIMEOUT: {error}")).into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("INTERNAL SERVER ERROR: {error}"))
            .into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
