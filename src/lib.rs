//! Dual-protocol RPC gateway library.

pub mod coap;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

#[cfg(test)]
pub(crate) mod testing;

pub use config::schema::GatewayConfig;
pub use gateway::{Gateway, TaskManager};
pub use lifecycle::Shutdown;
pub use net::reactor::Reactor;
