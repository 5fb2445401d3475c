//! Read API: `GET /search`, `POST /setup`, `GET /health`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use shopsearch_core::error::Error;
use shopsearch_pipeline::api::{HealthResponse, SearchResponse, SetupResponse};
use shopsearch_pipeline::SearchEngine;

use crate::AppContext;

#[derive(Clone)]
struct ApiState {
    ctx: Arc<AppContext>,
    engine: Arc<SearchEngine>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    /// A missing `q` is answered like an empty one.
    #[serde(default)]
    q: String,
    k: Option<usize>,
    min_score: Option<f32>,
    expand: Option<bool>,
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    let engine = Arc::new(ctx.search_engine());
    Router::new()
        .route("/search", get(search))
        .route("/setup", post(setup))
        .route("/health", get(health))
        .with_state(ApiState { ctx, engine })
}

async fn search(State(state): State<ApiState>, Query(params): Query<SearchParams>) -> (StatusCode, Json<SearchResponse>) {
    let k = params.k.unwrap_or(state.ctx.config.search.k);
    let min_score = params.min_score.unwrap_or(state.ctx.config.search.min_score);
    let expand = params.expand.unwrap_or(true);
    match state.engine.search_with(&params.q, k, min_score, expand).await {
        Ok(outcome) => (StatusCode::OK, Json(SearchResponse::from_outcome(params.q.trim(), outcome))),
        Err(e @ Error::InvalidQuery(_)) => (StatusCode::BAD_REQUEST, Json(SearchResponse::from_error(&params.q, &e))),
        Err(e) => {
            error!(query = %params.q, error = %e, "search failed");
            (StatusCode::OK, Json(SearchResponse::from_error(&params.q, &e)))
        }
    }
}

async fn setup(State(state): State<ApiState>) -> Result<Json<SetupResponse>, (StatusCode, Json<serde_json::Value>)> {
    let name = &state.ctx.config.store.index_name;
    let dimension = state.ctx.embedder.dim();
    match state.ctx.schema_manager().reset_index(name, dimension, state.ctx.config.ann.clone()).await {
        Ok(schema) => {
            info!(index = %schema.name, dimension, "index reset via API");
            Ok(Json(SetupResponse { msg: "index reset".to_string(), index: schema.name, dimension }))
        }
        Err(e) => {
            error!(error = %e, "index reset failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
        }
    }
}

async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let store = &state.ctx.store;
    let ready = store.ping().await.unwrap_or(false);
    let index_exists = ready && store.index_exists(&state.ctx.config.store.index_name).await.unwrap_or(false);
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse { status: if ready { "ok" } else { "unavailable" }.to_string(), index_exists };
    (status, Json(body))
}
