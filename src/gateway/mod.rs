//! Request gateway core.
//!
//! # Data Flow
//! ```text
//! listener accept
//!     → http::manager / coap::manager (parse, translate verb, rebuild uri)
//!     → connection_manager.rs (route match)
//!     → task.rs (Task bound to the client connection)
//!     → task_manager.rs (Gateway schedules and runs the route action)
//!         → upstream.rs (optional single relay call, reports back once)
//!     → connection_manager.rs respond (status table, render, neutralize)
//! ```
//!
//! # Design Decisions
//! - Everything runs on the reactor thread; shared state is `Rc` + `Cell`/`RefCell`
//! - A task lives while either its client connection binding or the
//!   gateway's schedule holds it
//! - An upstream sender lives exactly as long as its connection binding

pub mod connection_manager;
pub mod task;
pub mod task_manager;
pub mod upstream;

use std::fmt;

pub use connection_manager::ConnectionManager;
pub use task::{Input, Output, Status, Task, TaskHandle};
pub use task_manager::{BoundAddresses, Gateway, TaskManager};
pub use upstream::{SenderState, UpstreamSender};

use crate::net::listener::ListenerError;

/// Wire protocol a connection manager speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Coap,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Coap => "coap",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ways a request can fail inside the gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayFailure {
    #[error("upstream connect failed: {0}")]
    ConnectFailed(String),
    #[error("upstream request timeout")]
    UpstreamTimeout,
    #[error("upstream connection unexpectedly closed")]
    UpstreamUnexpectedClose,
    #[error("invalid parameter")]
    NoRouteMatch,
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    #[error("client request timeout")]
    ClientRequestTimeout,
}

/// Errors surfaced while starting or running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
