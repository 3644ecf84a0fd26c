//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging, metrics → Bind listeners → Ready → Run reactor
//!
//! Shutdown (shutdown.rs):
//!     /root/exit or signal → Gateway::stop → reactor loop exits → listeners aborted
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Gateway::stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then listeners
//! - Listeners bind before the gateway is marked ready
//! - Shutdown is immediate: in-flight requests are dropped with their connections

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
