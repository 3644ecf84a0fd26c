//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → net::listener (hyper http1 framing, one request per connection)
//!     → request.rs (HttpMessage handed to the reactor)
//!     → manager.rs (exit route, verb table, route match, task creation)
//!     → response.rs (success / standard error rendering)
//!     → Send to client, then close
//! ```

pub mod manager;
pub mod request;
pub mod response;

pub use manager::{HttpConnectionManager, EXIT_URI};
pub use request::{HttpMessage, UpstreamRequest};
pub use response::HttpResponse;
