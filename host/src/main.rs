//! ==============================================================================
//! main.rs - sigeta telemetry host entry point
//! ==============================================================================
//!
//! purpose:
//!     receives readings from the odor sensor node (mq gas value, temperature,
//!     humidity), decides whether the deodorizer spray should run, and keeps
//!     the latest reading for the web dashboard.
//!
//! responsibilities:
//!     - load host.toml (or defaults) and set up logging
//!     - train the odor classifier once at startup
//!     - serve the device endpoint, dashboard api and dashboard page
//!
//! relationships:
//!     - uses: classifier.rs (startup training)
//!     - uses: ingest.rs (POST /data pipeline), state.rs (latest reading)
//!     - uses: server.rs (routes, cors, static page)
//!
//! architecture:
//!
//!     ┌──────────────┐  POST /data   ┌──────────────────────────────────┐
//!     │ sensor node  │ ────────────▶ │ ingest: parse → classify → commit │
//!     │ (esp32 + mq) │ ◀──────────── │          │            │          │
//!     └──────────────┘  spray reply  │   ┌──────┴─────┐  ┌───┴───────┐  │
//!                                    │   │ OdorModel  │  │ StateCell │  │
//!     ┌──────────────┐  GET /latest  │   │ (Arc, ro)  │  │ (RwLock)  │  │
//!     │  dashboard   │ ────────────▶ │   └────────────┘  └───────────┘  │
//!     └──────────────┘               └──────────────────────────────────┘
//!
//! ==============================================================================

mod classifier;
mod config;
mod decision;
mod domain;
mod error;
mod ingest;
mod server;
mod state;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ingest::IngestEngine;
use crate::server::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    // logging is not up yet: fatal problems go to stderr via the returned error,
    // an unreadable file is kept as a warning for log_summary
    let config = config::HostConfig::load_or_default()?;

    // step 2: logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("===========================================================");
    tracing::info!("  {} - odor detection telemetry host", config.server.service_name);
    tracing::info!("===========================================================");
    config.log_summary();

    // step 3: train the classifier
    let model = classifier::build_model(&config.classifier);

    // step 4: shared state + decision engine
    let engine = IngestEngine::new(model, config.threshold_table())
        .with_sensor_logging(config.logging.show_sensor_data);
    let ctx = AppContext::new(engine, &config.server.service_name);

    // step 5: web server
    let addr = config.socket_addr()?;
    if let Err(e) = server::serve(ctx, &config.static_dir(), addr).await {
        tracing::error!("[ERROR] Web server error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
