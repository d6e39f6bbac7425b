/**
 * API HTTP PALJU - Relais WebSocket et historique des chauffes
 *
 * RÔLE :
 * Point d'entrée unique du process : upgrade WebSocket du relais et
 * requêtes JSON sur l'historique, sur le même port.
 *
 * ROUTES :
 * - GET /                              → upgrade WebSocket (aussi /ws)
 * - GET /sessions                      → [{start, end}]
 * - GET /samples?after=..&before=..    → [Sample], bornes incluses
 * - GET /instances, /instances/{after}/{before} → alias historiques
 * - GET /health, /system/health        → vivacité et état du relais
 *
 * Pas d'authentification : les clients du relais ne sont pas authentifiés.
 */

use crate::config::RelayConfig;
use crate::health::{HealthTracker, RelayHealth};
use crate::models::{Sample, Session};
use crate::query::QueryService;
use crate::registry::ConnectionRegistry;
use crate::router::RelayRouter;
use crate::ws::relay_socket;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub registry: ConnectionRegistry,
    pub router: Arc<RelayRouter>,
    pub queries: Arc<QueryService>,
    pub health_tracker: HealthTracker,
}

#[derive(Debug, Deserialize)]
struct SampleRange {
    after: i64,
    before: i64,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(relay_socket))
        .route("/ws", get(relay_socket))
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/sessions", get(list_sessions))
        .route("/samples", get(list_samples))
        .route("/instances", get(list_sessions))
        .route("/instances/{after}/{before}", get(list_samples_by_path))
        .with_state(app_state)
}

// GET /sessions
async fn list_sessions(State(app): State<AppState>) -> Result<Json<Vec<Session>>, StatusCode> {
    app.queries.list_sessions().map(Json).map_err(|e| {
        log::error!("[http] sessions query failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// GET /samples?after=..&before=..
async fn list_samples(
    State(app): State<AppState>,
    Query(range): Query<SampleRange>,
) -> Result<Json<Vec<Sample>>, StatusCode> {
    samples_between(&app, range)
}

// GET /instances/{after}/{before}
async fn list_samples_by_path(
    State(app): State<AppState>,
    Path((after, before)): Path<(i64, i64)>,
) -> Result<Json<Vec<Sample>>, StatusCode> {
    samples_between(&app, SampleRange { after, before })
}

fn samples_between(app: &AppState, range: SampleRange) -> Result<Json<Vec<Sample>>, StatusCode> {
    app.queries.list_samples(range.after, range.before).map(Json).map_err(|e| {
        log::error!("[http] samples query {:?} failed: {}", range, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<RelayHealth> {
    Json(app.health_tracker.get_health(&app.registry, &app.queries))
}

/// État applicatif sur stockage mémoire, pré-rempli aux timestamps donnés
#[cfg(test)]
pub(crate) fn test_state(timestamps: &[i64]) -> AppState {
    use crate::clock::SystemClock;
    use crate::segment::SessionPolicy;
    use crate::store::{sample_at, MemoryStore, SampleStore};

    let store = Arc::new(MemoryStore::new());
    for ts in timestamps {
        store.append(&sample_at(*ts)).unwrap();
    }
    let store: Arc<dyn SampleStore> = store;
    let registry = ConnectionRegistry::new();
    let queries = Arc::new(QueryService::new(store.clone(), SessionPolicy::default()));
    let router = Arc::new(RelayRouter::new(registry.clone(), store, queries.clone(), Arc::new(SystemClock)));
    AppState {
        config: Arc::new(RelayConfig::default()),
        registry,
        router,
        queries,
        health_tracker: HealthTracker::new(),
    }
}
