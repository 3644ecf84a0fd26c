//! RPC Gateway
//!
//! Accepts HTTP and CoAP requests, matches them against configured routes
//! and answers either directly or by relaying one call to an upstream
//! JSON-RPC service.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client ──▶ net::listener ──▶ http::manager ──┐
//!                                                     ├──▶ routing::Router
//!   CoAP client ──▶ net::listener ──▶ coap::manager ──┘          │
//!                                                                ▼
//!                                                     gateway::Gateway (tasks)
//!                                                                │
//!                                                                ▼
//!                                   gateway::upstream ──▶ net::client ──▶ upstream
//!
//!   net::reactor drives all of it: one thread, serial dispatch,
//!   per-connection timers, deferred close.
//! ```

use std::path::PathBuf;

use clap::Parser;

use rpc_gateway::lifecycle::startup;

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "HTTP and CoAP front end for a JSON-RPC service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::load(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, startup::run(config))?;
    Ok(())
}
