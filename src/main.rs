//! Feed harvester binary.
//! Restores the collector, starts the refresh and autosave timers and serves
//! the inspection API until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use feed_harvester::{
    api::{self, AppState},
    config::{rules::build_pipeline, CollectorConfig},
    fetch::{PageFetcher, ReqwestTransport},
    persist::{self, FileSnapshotStore, SnapshotStore},
    CollectorState, RefreshScheduler,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact text logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_harvester=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real env wins.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = CollectorConfig::load_default()?;
    tracing::info!(
        feed = ?cfg.source.kind,
        page_size = cfg.page_size,
        initial_target = cfg.initial_target_count,
        look_back = cfg.look_back,
        rules = cfg.rules.len(),
        "configuration loaded"
    );

    let metrics = match feed_harvester::metrics::install() {
        Ok(h) => Some(h),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let file_store = FileSnapshotStore::new(cfg.state_path.clone());
    let state = match persist::restore(&file_store, cfg.store_settings()).await {
        Ok(s) => s,
        Err(e) => {
            match file_store.quarantine().await {
                Ok(moved) => tracing::error!(
                    error = %e,
                    moved_to = %moved.display(),
                    "snapshot unreadable, moved aside and starting empty"
                ),
                Err(mv) => tracing::error!(
                    error = %e,
                    rename_error = %mv,
                    path = %cfg.state_path.display(),
                    "snapshot unreadable and could not be moved aside, starting empty"
                ),
            }
            CollectorState::new(cfg.store_settings())
        }
    };
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(file_store);
    let state = Arc::new(state);

    let transport = Arc::new(ReqwestTransport::new(cfg.http_timeout())?);
    let fetcher = Arc::new(PageFetcher::for_kind(cfg.source.kind, cfg.source.url_template(), transport));
    let pipeline = Arc::new(build_pipeline(&cfg)?);

    let scheduler = Arc::new(
        RefreshScheduler::new(fetcher, Arc::clone(&state), pipeline, cfg.policy())
            .look_back(cfg.look_back)
            .alert_on_backfill(cfg.alert_on_backfill),
    );
    let refresh = Arc::clone(&scheduler).spawn(cfg.refresh_interval());
    let autosave = persist::spawn_autosave(Arc::clone(&snapshots), Arc::clone(&state), cfg.persist_interval());

    let app = api::create_router(AppState {
        collector: Arc::clone(&state),
        metrics,
    });
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "inspection api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving inspection api")?;

    refresh.abort();
    autosave.abort();
    scheduler.wait_idle().await;

    match persist::save_once(snapshots.as_ref(), &state).await {
        Ok(()) => tracing::info!(total = state.len(), "final snapshot saved"),
        Err(e) => tracing::warn!(error = %e, "final snapshot failed"),
    }
    Ok(())
}
