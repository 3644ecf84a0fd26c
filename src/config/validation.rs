//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check routes are well formed and uniquely named
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, RouteAction};
use crate::routing::Method;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("upstream.address: invalid http url {0:?}")]
    InvalidUpstream(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("duplicate route name {0:?}")]
    DuplicateRoute(String),
    #[error("route {route:?}: path {path:?} must start with '/'")]
    InvalidPath { route: String, path: String },
    #[error("route {route:?}: unknown method {method:?}")]
    UnknownMethod { route: String, method: String },
    #[error("route {route:?}: invalid upstream {value:?}")]
    InvalidRouteUpstream { route: String, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "server.http_address", &config.server.http_address);
    check_address(&mut errors, "server.coap_address", &config.server.coap_address);

    match Url::parse(&config.upstream.address) {
        Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
        _ => errors.push(ValidationError::InvalidUpstream(config.upstream.address.clone())),
    }

    if config.server.http_connection_timeout == 0 {
        errors.push(ValidationError::Zero("server.http_connection_timeout"));
    }
    if config.upstream.request_timeout == 0 {
        errors.push(ValidationError::Zero("upstream.request_timeout"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero("limits.max_body_size"));
    }
    if config.limits.max_tasks == 0 {
        errors.push(ValidationError::Zero("limits.max_tasks"));
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if !route.path.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        }
        for method in &route.methods {
            if Method::from_token(method).is_none() {
                errors.push(ValidationError::UnknownMethod {
                    route: route.name.clone(),
                    method: method.clone(),
                });
            }
        }
        if let (RouteAction::Relay, Some(upstream)) = (route.action, &route.upstream) {
            if !upstream.starts_with('/') && Url::parse(upstream).is_err() {
                errors.push(ValidationError::InvalidRouteUpstream {
                    route: route.name.clone(),
                    value: upstream.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
