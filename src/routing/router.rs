//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a (uri path, method) pair
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction
//! - O(n) scan in declaration order (acceptable for typical route counts)
//! - Explicit no-match rather than silent default

use std::rc::Rc;

use axum::body::Bytes;

use crate::config::{RouteAction, RouteConfig};
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathMatcher, PathPrefixMatcher};
use crate::routing::Method;

/// Handler descriptor attached to a matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHandler {
    pub name: String,
    pub action: RouteAction,
    pub upstream: Option<String>,
}

/// Result of a route lookup.
#[derive(Debug, Clone, Default)]
pub struct RouteMatch {
    pub matched: bool,
    /// Request payload, filled in by the connection manager after a match.
    pub input: Bytes,
    pub handler: Option<Rc<RouteHandler>>,
}

impl RouteMatch {
    fn miss() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct CompiledRoute {
    matcher: AndMatcher,
    handler: Rc<RouteHandler>,
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile routes from configuration. Unknown verbs are skipped; config
    /// validation rejects them before this point.
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let routes = routes
            .iter()
            .map(|route| {
                let path: Box<dyn Matcher> = if route.prefix {
                    Box::new(PathPrefixMatcher::new(route.path.clone()))
                } else {
                    Box::new(PathMatcher::new(route.path.clone()))
                };
                let methods: Vec<Method> = route
                    .methods
                    .iter()
                    .filter_map(|m| Method::from_token(m))
                    .collect();

                CompiledRoute {
                    matcher: AndMatcher::new(vec![path, Box::new(MethodMatcher::new(&methods))]),
                    handler: Rc::new(RouteHandler {
                        name: route.name.clone(),
                        action: route.action,
                        upstream: route.upstream.clone(),
                    }),
                }
            })
            .collect();

        Self { routes }
    }

    /// Look up the first route matching the path and verb.
    pub fn match_route(&self, path: &str, method: Method) -> RouteMatch {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(path, method))
            .map(|route| RouteMatch {
                matched: true,
                input: Bytes::new(),
                handler: Some(Rc::clone(&route.handler)),
            })
            .unwrap_or_else(RouteMatch::miss)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
