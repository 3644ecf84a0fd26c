//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Rc to the task manager and both connection managers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded and set before any listener binds
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::LimitsConfig;
pub use schema::ObservabilityConfig;
pub use schema::RouteAction;
pub use schema::RouteConfig;
pub use schema::ServerConfig;
pub use schema::UpstreamConfig;
