/**
 * PALJU RELAY - Point d'entrée principal du relais de télémétrie
 *
 * RÔLE : Orchestration de tous les modules : config, stockage, registre des
 * connexions, superviseur de vivacité, routeur, HTTP.
 *
 * ARCHITECTURE : relais WebSocket device ↔ observer + historique HTTP sur le même port.
 * Seul un échec d'ouverture du stockage (ou du port d'écoute) arrête le process.
 */

mod clock;
mod config;
mod error;
mod health;
mod http;
mod liveness;
mod models;
mod query;
mod registry;
mod router;
mod segment;
mod store;
mod ws;

use crate::clock::SystemClock;
use crate::config::load_config;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::liveness::LivenessSupervisor;
use crate::query::QueryService;
use crate::registry::ConnectionRegistry;
use crate::router::RelayRouter;
use crate::store::{JsonLinesStore, SampleStore};

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Arc::new(load_config().await);

    // stockage : fatal s'il ne s'ouvre pas
    let journal = JsonLinesStore::open(&cfg.data_file)
        .with_context(|| format!("failed to open sample store at {:?}", cfg.data_file))?;
    log::info!("[relay] sample store at {:?}", journal.path());
    let store: Arc<dyn SampleStore> = Arc::new(journal);

    let registry = ConnectionRegistry::new();
    let queries = Arc::new(QueryService::new(store.clone(), cfg.session_policy()));
    let router = Arc::new(
        RelayRouter::new(registry.clone(), store, queries.clone(), Arc::new(SystemClock))
            .with_settings(cfg.router_settings()),
    );

    let liveness = LivenessSupervisor::new(registry.clone(), cfg.heartbeat_interval()).spawn();

    let app_state = AppState {
        config: cfg.clone(),
        registry: registry.clone(),
        router,
        queries,
        health_tracker: HealthTracker::new(),
    };
    let app = http::build_router(app_state);

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("[relay] listening on http://{addr} (observer token: {:?})", cfg.observer_protocol);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    liveness.abort();
    log::info!("[relay] stopped");
    Ok(())
}

async fn shutdown_signal(registry: ConnectionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[relay] failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    let closed = registry.close_all();
    log::info!("[relay] shutting down, closed {} connections", closed);
}
