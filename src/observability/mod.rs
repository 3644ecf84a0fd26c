//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! reactor, managers, tasks, upstream senders
//!     → tracing macros → logging.rs (fmt subscriber)
//!     → metrics.rs helpers → Prometheus exporter (optional)
//! ```

pub mod logging;
pub mod metrics;
