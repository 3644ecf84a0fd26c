//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (uri path, method code)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteMatch { matched, input, handler }
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers (exact path, prefix, method mask)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod method;
pub mod router;

pub use method::Method;
pub use router::{RouteHandler, RouteMatch, Router};
