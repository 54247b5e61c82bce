//! HTTP surface of the dev server.
//!
//! Every handler reads the published generation through
//! [`RebuildPipeline::current`]; none of them waits on an in-flight run.

use std::sync::Arc;

use axum::{Json, Router};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::error::{DevError, DevResult};
use crate::pipeline::{RebuildPipeline, RebuildResult};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RebuildPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub collection: Option<String>,
}

pub fn router(pipeline: Arc<RebuildPipeline>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/graphql", get(graphql_info))
        .route("/graphql/schema", get(graphql_schema))
        .route("/documents", get(list_documents))
        .route("/documents/{*path}", get(get_document))
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

/// Bind the dev server address.
pub async fn bind(addr: &str) -> DevResult<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| DevError::Server(format!("cannot bind {addr}: {e}")))?;
    if let Ok(local) = listener.local_addr() {
        crate::log_event!("server", "listening", "http://{local}");
    }
    Ok(listener)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    pipeline: Arc<RebuildPipeline>,
    shutdown: CancellationToken,
) -> DevResult<()> {
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| DevError::Server(e.to_string()))?;

    crate::debug_event!("server", "stopped");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

fn not_ready() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "no generation has been built yet" })),
    )
        .into_response()
}

fn current(state: &AppState) -> Result<Arc<RebuildResult>, Response> {
    state.pipeline.current().ok_or_else(not_ready)
}

async fn graphql_info(State(state): State<AppState>) -> Response {
    let result = match current(&state) {
        Ok(result) => result,
        Err(response) => return response,
    };
    Json(json!({
        "apiURL": result.api_url,
        "generation": result.generation,
        "collections": result
            .settings
            .collections
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>(),
        "documents": result.index.reader().document_count(),
        "rebuilding": state.pipeline.is_running(),
    }))
    .into_response()
}

async fn graphql_schema(State(state): State<AppState>) -> Response {
    match current(&state) {
        Ok(result) => Json(result.snapshot.as_ref().clone()).into_response(),
        Err(response) => response,
    }
}

async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match current(&state) {
        Ok(result) => {
            Json(result.index.reader().list(query.collection.as_deref())).into_response()
        }
        Err(response) => response,
    }
}

async fn get_document(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let result = match current(&state) {
        Ok(result) => result,
        Err(response) => return response,
    };
    match result.index.reader().get(&path) {
        Some(document) => Json(document).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no document at {path}") })),
        )
            .into_response(),
    }
}
