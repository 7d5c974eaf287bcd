use std::sync::Arc;

use gtpv2_config::{load_config, EngineConfig};
use gtpv2_engine::{reference_handlers, Connection};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration; fall back to defaults without a file
    let config = match std::env::var("GTPV2_CONFIG") {
        Ok(path) => match load_config::<EngineConfig>(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid configuration {path}: {e}");
                std::process::exit(1);
            }
        },
        Err(_) => EngineConfig::default(),
    };

    // Initialize logging
    gtpv2_logging::init_with(&config.log_level, config.log_format);

    // Register metrics
    gtpv2_metrics::register_metrics();

    info!(
        service = "gtpv2-engine",
        version = env!("CARGO_PKG_VERSION"),
        local_addr = %config.local_addr,
        "Starting GTPv2-C engine"
    );

    let conn = Arc::new(Connection::from_config(&config));
    conn.add_handlers(reference_handlers());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    if let Err(e) = conn.listen_and_serve(cancel).await {
        error!("Engine error: {}", e);
    }
    conn.close();
}
