//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and the optional metrics exporter
//! - Bind listeners, mark the gateway ready and run the reactor
//!
//! # Design Decisions
//! - Fail fast: config and bind errors are fatal
//! - A metrics exporter that fails to start is logged, not fatal
//! - Must be driven inside a `LocalSet` on a current-thread runtime

use std::path::Path;
use std::rc::Rc;

use crate::config::{load_config, GatewayConfig};
use crate::gateway::{Gateway, GatewayError, TaskManager};
use crate::lifecycle::signals;
use crate::net::reactor::Reactor;
use crate::observability::{logging, metrics};

/// Read the config file, or use defaults when no path is given.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, GatewayError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(GatewayConfig::default()),
    }
}

/// Bring the gateway up and serve until `/root/exit` or a termination signal.
pub async fn run(config: GatewayConfig) -> Result<(), GatewayError> {
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        http_address = %config.server.http_address,
        coap_address = %config.server.coap_address,
        upstream = %config.upstream.address,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Rc::new(Gateway::new(config, Reactor::with_tokio()));
    let addresses = gateway.bind()?;
    gateway.set_ready();
    tracing::info!(http = %addresses.http, coap = %addresses.coap, "Gateway ready");

    let watcher = {
        let gateway = Rc::clone(&gateway);
        tokio::task::spawn_local(async move {
            signals::wait_for_termination().await;
            gateway.stop();
        })
    };

    gateway.run().await;
    watcher.abort();

    tracing::info!("Gateway stopped");
    Ok(())
}
