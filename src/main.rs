//! Binance Market Bot
//!
//! Mirrors one Binance spot order book, publishes its depth to a local viewer
//! and runs the naive market maker on every best ask/bid change.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use binance_market_bot::sync::{ReconnectPolicy, SequencePolicy};
use binance_market_bot::{
    AppState, BookSynchronizer, Config, DepthStreamClient, MarketMakerBot, MarketMakerStrategy,
    Metrics, OrderBook, Publisher, RestClient,
};

/// Quotes waiting for the execution boundary
const QUOTE_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Binance Market Bot");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(
        symbol = %config.symbol,
        strict_sequencing = config.strict_sequencing,
        "Configuration loaded"
    );

    let metrics = Arc::new(Metrics::new()?);
    let book = Arc::new(OrderBook::new(&config.symbol)?);

    let state = AppState {
        book: book.clone(),
        metrics: metrics.clone(),
        config: config.clone(),
    };

    // Start health check server
    let health_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state).await {
            warn!(error = %e, "Health server error");
        }
    });

    // Depth feed for the viewer
    let publisher = Publisher::new(&config.ipc_socket_path, config.depth_levels).await?;
    let depth_events = book.subscribe_depth();
    tokio::spawn(async move {
        publisher.run(depth_events).await;
    });

    // Strategy
    let (quote_tx, mut quote_rx) = mpsc::channel(QUOTE_CHANNEL_CAPACITY);
    let bot = MarketMakerBot::new(MarketMakerStrategy::new(Arc::new(config.strategy.clone())))
        .with_metrics(metrics.clone());
    let best_pairs = book.subscribe_best_pair();
    tokio::spawn(async move {
        bot.run(best_pairs, quote_tx).await;
    });

    // Order placement is out of scope; quotes end here
    tokio::spawn(async move {
        while let Some(quote) = quote_rx.recv().await {
            debug!(quote = %quote, "Quote reached execution boundary");
        }
    });

    let sequence = if config.strict_sequencing {
        SequencePolicy::Strict
    } else {
        SequencePolicy::Lenient
    };
    let synchronizer = BookSynchronizer::new(
        RestClient::new(&config.rest_endpoint)?,
        DepthStreamClient::new(&config.ws_endpoint),
    )
    .with_snapshot_limit(config.snapshot_limit)
    .with_sequence_policy(sequence)
    .with_reconnect_policy(ReconnectPolicy {
        base_delay: Duration::from_millis(config.reconnect_delay_ms),
        max_attempts: config.max_reconnect_attempts,
    })
    .with_metrics(metrics);

    tokio::select! {
        result = synchronizer.run(&book) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!(
        symbol = %book.symbol(),
        last_update_id = ?book.last_update_id(),
        "Binance Market Bot stopped"
    );
    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.health_port));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let best_pair = state.book.best_pair();
    let status = if state.book.is_initialized() {
        "healthy"
    } else {
        "syncing"
    };

    Json(serde_json::json!({
        "status": status,
        "component": "market-bot",
        "symbol": state.book.symbol(),
        "last_update_id": state.book.last_update_id(),
        "best_pair_complete": best_pair.map_or(false, |pair| pair.is_complete()),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    state
        .metrics
        .encode()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
