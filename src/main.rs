use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bus;
mod config;
mod dashboard;
mod db;
mod engine;
mod live_scores;
mod metrics;

use bus::BroadcastBus;
use config::Config;
use dashboard::AppState;
use db::SqliteScoreStore;
use engine::{PollLoop, Publisher, ScoreEngine, StoreWatcher, TeamFilter};
use live_scores::EspnScoreboard;
use metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let metrics = Arc::new(Metrics::new());

    // Open score store
    let store = Arc::new(SqliteScoreStore::open(
        &config.database_path,
        config.store_history,
        config.watch_poll(),
    )?);
    info!("Score store opened: {}", config.database_path);

    let bus = Arc::new(BroadcastBus::new(config.bus_capacity));

    let feed = Arc::new(EspnScoreboard::new(
        &config.feed_url,
        config.feed_dates.as_deref(),
    )?);
    info!("Scoreboard feed: {}", feed.url());

    let publisher = Publisher::new(
        store.clone(),
        bus.clone(),
        config.update_topic.clone(),
        metrics.clone(),
    );
    info!("Publishing score changes on '{}'", publisher.topic());
    let engine = Arc::new(ScoreEngine::new(
        store.clone(),
        publisher,
        TeamFilter::new(&config.team_filter),
        metrics.clone(),
    ));

    // Bind before any task is spawned
    let listener = dashboard::bind(&config.http_addr).await?;
    info!("HTTP listening on http://{}", listener.local_addr()?);

    let shutdown = CancellationToken::new();

    // Start watching the store before the first poll so its writes are seen
    let watcher = StoreWatcher::subscribe(store.as_ref(), metrics.clone())?.spawn(shutdown.clone());

    let poller = PollLoop::new(
        feed,
        engine,
        metrics.clone(),
        config.poll_interval(),
        config.fetch_timeout(),
    )
    .spawn(shutdown.clone());

    // Metrics / API / WebSocket server
    let app = dashboard::router(AppState {
        store,
        bus,
        metrics,
        topic: config.update_topic.clone(),
    });

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown requested");
        server_shutdown.cancel();
    });

    let serve_shutdown = shutdown.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await
    {
        error!("HTTP server failed: {}", e);
        shutdown.cancel();
    }

    if let Err(e) = poller.await {
        error!("Poll loop task failed: {}", e);
    }
    match watcher.await {
        Ok(seen) => info!("Observed {} store mutation(s) this run", seen),
        Err(e) => error!("Store watcher task failed: {}", e),
    }

    Ok(())
}
