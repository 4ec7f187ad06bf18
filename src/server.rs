//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/train` | Rebuild and publish the index |
//! | `GET`  | `/search?q=&top_k=` | Ranked endpoint search |
//! | `POST` | `/add-endpoint` | Import a Postman collection |
//! | `GET`  | `/export-endpoint/{id}` | Download an endpoint's Postman item |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "q must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_endpoints` (400), `not_found` (404),
//! `not_trained` (409), `internal` (500).
//!
//! `POST /train` is the exception: it always answers `200` with
//! `{"success": bool, "message": string}`.
//!
//! # CORS
//!
//! Origins come from `[server].allowed_origins`; `"*"` allows any origin.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{Config, RetrievalConfig};
use crate::error::SearchError;
use crate::export::export_endpoint;
use crate::hub::Hub;
use crate::import::import_collection;
use crate::models::QueryResult;
use crate::postman::ImportMeta;
use crate::search::QueryEngine;
use crate::store::DocumentStore;
use crate::train::IndexTrainer;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn DocumentStore>,
    trainer: Arc<IndexTrainer>,
    engine: Arc<QueryEngine>,
    retrieval: RetrievalConfig,
}

/// Build the router over an opened [`Hub`].
pub fn router(hub: &Hub, config: &Config) -> anyhow::Result<Router> {
    let state = AppState {
        store: hub.store.clone(),
        trainer: hub.trainer.clone(),
        engine: hub.engine.clone(),
        retrieval: config.retrieval.clone(),
    };

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/train", post(handle_train))
        .route("/search", get(handle_search))
        .route("/add-endpoint", post(handle_add_endpoint))
        .route("/export-endpoint/{id}", get(handle_export))
        .layer(cors_layer(&config.server.allowed_origins)?)
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind`. When `[server].train_on_startup` is set and no
/// generation is published yet, trains once before accepting requests.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let hub = Hub::open(config).await?;

    if config.server.train_on_startup && !config.embedding.is_enabled() {
        tracing::warn!("embedding provider is disabled; skipping startup training");
    } else if config.server.train_on_startup && !hub.trainer.artifacts().exists() {
        tracing::info!("no trained index found; training before serving");
        match hub.trainer.train().await {
            Ok(report) if report.success => tracing::info!("{}", report.message),
            Ok(report) => tracing::warn!("startup training skipped: {}", report.message),
            Err(e) => tracing::error!(error = %format!("{:#}", e), "startup training failed"),
        }
    }

    let app = router(&hub, config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    hub.close().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotTrained(message) => AppError {
                status: StatusCode::CONFLICT,
                code: "not_trained",
                message,
            },
            SearchError::InvalidTopK => bad_request("top_k must be at least 1"),
            SearchError::Other(e) => internal(e),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /train ============

#[derive(Serialize)]
struct TrainResponse {
    success: bool,
    message: String,
}

/// Failures are reported in the body, never as an HTTP error.
async fn handle_train(State(state): State<AppState>) -> Json<TrainResponse> {
    match state.trainer.train().await {
        Ok(report) => Json(TrainResponse {
            success: report.success,
            message: report.message,
        }),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "training failed");
            Json(TrainResponse {
                success: false,
                message: e.to_string(),
            })
        }
    }
}

// ============ GET /search ============

/// Both parameters arrive as raw strings so malformed values get the
/// standard error shape instead of Axum's plain-text rejection.
#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    top_k: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<QueryResult>>, AppError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }

    let top_k = match params.top_k.as_deref().map(str::trim) {
        None | Some("") => state.retrieval.default_top_k,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| bad_request(format!("top_k must be a positive integer, got {:?}", raw)))?,
    };
    if top_k > state.retrieval.max_top_k {
        return Err(bad_request(format!(
            "top_k must be at most {}",
            state.retrieval.max_top_k
        )));
    }

    let results = state.engine.search(&query, top_k).await?;
    Ok(Json(results))
}

// ============ POST /add-endpoint ============

#[derive(Deserialize)]
struct AddEndpointRequest {
    metadata: ImportMeta,
    collection: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddEndpointResponse {
    message: String,
    total: usize,
    module_id: String,
    metadata: ImportMeta,
}

async fn handle_add_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<AddEndpointRequest>, JsonRejection>,
) -> Result<Json<AddEndpointResponse>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    if request.metadata.module.trim().is_empty() {
        return Err(bad_request("metadata.module must not be empty"));
    }

    let summary = import_collection(state.store.as_ref(), &request.collection, &request.metadata)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError {
            status: StatusCode::BAD_REQUEST,
            code: "no_endpoints",
            message: "No endpoints extracted.".to_string(),
        })?;

    Ok(Json(AddEndpointResponse {
        message: "Endpoints saved successfully".to_string(),
        total: summary.total,
        module_id: summary.module_id,
        metadata: request.metadata,
    }))
}

// ============ GET /export-endpoint/{id} ============

async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let exported = export_endpoint(state.store.as_ref(), &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("endpoint not found: {}", id)))?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        exported.filename
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"endpoint.json\""));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.json,
    )
        .into_response())
}
