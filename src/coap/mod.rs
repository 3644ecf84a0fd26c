//! CoAP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! UDP datagram
//!     → net::listener (coap-lite decode, code pre-validation)
//!     → manager.rs (ack, Uri-Path rebuild, method table, route match, task)
//!     → message.rs (separate response with the request token)
//! ```

pub mod manager;
pub mod message;

pub use manager::CoapConnectionManager;
