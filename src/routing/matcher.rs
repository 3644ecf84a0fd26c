//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request path (exact or prefix, case-sensitive)
//! - Match the verb against a route's method mask
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Empty method mask = any verb (wildcard)
//! - No regex to guarantee O(n) matching

use crate::routing::Method;

/// Trait for matching a request against conditions.
pub trait Matcher: std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, path: &str, method: Method) -> bool;
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, path: &str, _method: Method) -> bool {
        path == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str, _method: Method) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches verbs whose code is set in the mask.
#[derive(Debug, Clone, Copy)]
pub struct MethodMatcher {
    mask: u32,
}

impl MethodMatcher {
    pub fn new(methods: &[Method]) -> Self {
        Self {
            mask: methods.iter().fold(0, |acc, m| acc | m.code()),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, _path: &str, method: Method) -> bool {
        self.mask == 0 || self.mask & method.code() != 0
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, path: &str, method: Method) -> bool {
        self.matchers.iter().all(|m| m.matches(path, method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathMatcher::new("/json_rpc");
        assert!(matcher.matches("/json_rpc", Method::Post));
        assert!(!matcher.matches("/json_rpc/x", Method::Post));
        assert!(!matcher.matches("/JSON_RPC", Method::Post)); // Case sensitive
    }

    #[test]
    fn test_prefix_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert!(matcher.matches("/api/v1", Method::Get));
        assert!(!matcher.matches("/images", Method::Get));
    }

    #[test]
    fn test_method_matcher() {
        let matcher = MethodMatcher::new(&[Method::Get, Method::Post]);
        assert!(matcher.matches("/", Method::Get));
        assert!(matcher.matches("/", Method::Post));
        assert!(!matcher.matches("/", Method::Delete));

        let any = MethodMatcher::new(&[]);
        assert!(any.matches("/", Method::Options));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(PathPrefixMatcher::new("/a")),
            Box::new(MethodMatcher::new(&[Method::Put])),
        ]);
        assert!(matcher.matches("/a/b", Method::Put));
        assert!(!matcher.matches("/a/b", Method::Get));
        assert!(!matcher.matches("/b", Method::Put));
    }
}
