// src/api.rs
//! Read-only inspection endpoints over the collector.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::merge::find_duplicate_ids;
use crate::message::Message;
use crate::store::CollectorState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<CollectorState>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/messages", get(list_messages))
        .route("/stats", get(stats))
        .route("/validate", get(validate))
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_messages(State(st): State<AppState>, Query(q): Query<ListQuery>) -> Json<Vec<Message>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let snap = st.collector.snapshot();
    Json(snap.iter().take(limit).cloned().collect())
}

#[derive(Serialize)]
struct Stats {
    total: usize,
    revision: u64,
    per_day: BTreeMap<String, usize>,
}

async fn stats(State(st): State<AppState>) -> Json<Stats> {
    let snap = st.collector.snapshot();
    let mut per_day = BTreeMap::new();
    for m in snap.iter() {
        *per_day.entry(m.date().to_string()).or_insert(0) += 1;
    }
    Json(Stats {
        total: snap.len(),
        revision: st.collector.revision(),
        per_day,
    })
}

#[derive(Serialize)]
struct Validation {
    ok: bool,
    duplicates: Vec<i64>,
}

async fn validate(State(st): State<AppState>) -> Json<Validation> {
    let duplicates = find_duplicate_ids(st.collector.snapshot().as_slice());
    if !duplicates.is_empty() {
        tracing::error!(count = duplicates.len(), "duplicate records in collector");
    }
    Json(Validation {
        ok: duplicates.is_empty(),
        duplicates,
    })
}

async fn render_metrics(State(st): State<AppState>) -> impl IntoResponse {
    match &st.metrics {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
