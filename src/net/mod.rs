//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection / UDP datagram
//!     → listener.rs (bind, accept, hyper / coap-lite framing)
//!     → reactor.rs (connection table, serial dispatch, timers, reaping)
//!     → owner bound in connection.rs (manager, task or upstream sender)
//!
//! Outbound HTTP exchange
//!     → client.rs (connect, one request, one reply)
//!     → reactor.rs
//! ```
//!
//! # Design Decisions
//! - I/O runs in local tasks; all protocol logic runs inside the reactor
//! - One request per connection in both directions
//! - Ownership of a connection is a single `Binding` value

pub mod client;
pub mod connection;
pub mod listener;
pub mod reactor;

pub use connection::{Binding, CloseMode, ConnectionId, Event, Link};
pub use listener::{Listener, ListenerError};
pub use reactor::{Connector, EventSender, Reactor};
