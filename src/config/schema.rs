//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener addresses and client connection timeout.
    pub server: ServerConfig,

    /// Upstream RPC service settings.
    pub upstream: UpstreamConfig,

    /// Request admission limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route definitions.
    pub routes: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Idle time allowed before a client must have sent a full request.
    pub fn http_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.server.http_connection_timeout)
    }

    /// Time an upstream call may remain outstanding.
    pub fn upstream_request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address (e.g., "0.0.0.0:28690").
    pub http_address: String,

    /// CoAP (UDP) bind address.
    pub coap_address: String,

    /// Seconds a client connection may stay idle before a request arrives.
    pub http_connection_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:28690".to_string(),
            coap_address: "0.0.0.0:18991".to_string(),
            http_connection_timeout: 360,
        }
    }
}

/// Upstream RPC service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Default URL for relayed calls when a task names none.
    pub address: String,

    /// Seconds an upstream call may remain outstanding.
    pub request_timeout: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:28881/json_rpc".to_string(),
            request_timeout: 10,
        }
    }
}

/// Admission limits applied before a task runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Maximum number of tasks in flight.
    pub max_tasks: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_tasks: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// What a matched route does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    /// Reply with the request body.
    Echo,
    /// Forward the request body to the upstream and reply with its answer.
    Relay,
}

/// Route configuration mapping a path and verbs to an action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path to match.
    pub path: String,

    /// Treat `path` as a prefix instead of an exact path.
    #[serde(default)]
    pub prefix: bool,

    /// Accepted verbs (e.g., ["GET", "POST"]). Empty accepts any verb.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Action executed for matching requests.
    pub action: RouteAction,

    /// Relay target: absolute URL or a path on the default upstream.
    #[serde(default)]
    pub upstream: Option<String>,
}
