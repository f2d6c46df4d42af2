//! HTTP adapter for constrained generation.
//!
//! Exposes [`generate_constrained`] over a small JSON API. The server holds
//! no decoder state: every request constructs its own grammar state inside
//! the driver, so concurrent requests are fully independent.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/generate` | Generate a JSON value from a prompt |
//! | `GET`  | `/health` | Health check (returns version and model) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "prompt must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `provider_disabled` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::driver::{generate_constrained, DriverOptions};
use crate::models::Generation;
use crate::provider::{create_source, TokenSource};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    source: Arc<dyn TokenSource>,
}

/// Starts the generation server.
///
/// Builds the token source from configuration and binds to the address in
/// `[server].bind`. The server runs indefinitely until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let source: Arc<dyn TokenSource> = Arc::from(create_source(&config.provider)?);
    run_server_with_source(config, source).await
}

/// Starts the generation server with an explicit token source.
///
/// Like [`run_server`], but accepts any [`TokenSource`] — useful for custom
/// binaries that wire in their own model client.
pub async fn run_server_with_source(
    config: &Config,
    source: Arc<dyn TokenSource>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let model = source.model_name().to_string();

    let state = AppState {
        config: Arc::new(config.clone()),
        source,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/generate", post(handle_generate))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Generation server listening on http://{}", bind_addr);
    println!("  model: {}", model);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 400 error for requests against a disabled provider.
fn provider_disabled(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "provider_disabled".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// The configured model identifier.
    model: String,
}

/// Handler for `GET /health`.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.source.model_name().to_string(),
    })
}

// ============ POST /generate ============

/// JSON request body for `POST /generate`.
#[derive(Deserialize)]
struct GenerateRequest {
    prompt: String,
    /// Accepted-token budget; overrides `generation.max_tokens`.
    #[serde(default)]
    max_tokens: Option<usize>,
}

/// Handler for `POST /generate`.
///
/// Runs one constrained generation request to completion and returns the
/// accumulated text with its terminal status (`complete`, `exhausted`, or
/// `failed`). Partial text is returned for every status; only invalid
/// requests and configuration problems produce error responses.
async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Generation>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    if req.max_tokens == Some(0) {
        return Err(bad_request("max_tokens must be > 0"));
    }

    if !state.config.provider.is_enabled() {
        return Err(provider_disabled(
            "Token provider is disabled. Set [provider] provider in config.",
        ));
    }

    let opts = DriverOptions::from_config(&state.config, req.max_tokens);
    let generation = generate_constrained(state.source.as_ref(), &req.prompt, &opts)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(generation))
}
