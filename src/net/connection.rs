//! Connection identity, ownership bindings and events.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Describe the events the reactor delivers to a connection's owner
//! - Pair a connection's logical owner with its event handler (`Binding`)
//! - Abstract the write side of a connection (`Link`)

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use coap_lite::Packet;

use crate::gateway::{ConnectionManager, TaskHandle, UpstreamSender};
use crate::http::{HttpMessage, HttpResponse};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something the reactor delivers to a connection's current binding.
#[derive(Debug)]
pub enum Event {
    /// An inbound connection was accepted.
    Accept,
    /// A complete inbound HTTP request.
    HttpRequest(HttpMessage),
    /// A complete HTTP reply on an outbound connection.
    HttpReply(HttpMessage),
    /// Outcome of an outbound connect attempt.
    Connect(Result<(), String>),
    /// An inbound CoAP message.
    Coap(Packet),
    /// The connection's deadline passed.
    Timer,
    /// The connection is gone.
    Close,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Accept => "accept",
            Event::HttpRequest(_) => "http_request",
            Event::HttpReply(_) => "http_reply",
            Event::Connect(_) => "connect",
            Event::Coap(_) => "coap",
            Event::Timer => "timer",
            Event::Close => "close",
        }
    }
}

/// Who owns a connection and therefore handles its next event.
///
/// Owner and handler are one value: rebinding a connection is a single
/// assignment, so they can never disagree.
#[derive(Clone, Default)]
pub enum Binding {
    /// Neutralized: events are dropped.
    #[default]
    Empty,
    /// Accepted connection still owned by its protocol manager.
    Listener(Rc<dyn ConnectionManager>),
    /// Client connection handed to a task.
    Client(TaskHandle),
    /// Outbound connection driven by an upstream sender.
    Upstream(Rc<UpstreamSender>),
}

impl Binding {
    pub fn is_empty(&self) -> bool {
        matches!(self, Binding::Empty)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Empty => f.write_str("Empty"),
            Binding::Listener(manager) => write!(f, "Listener({})", manager.protocol()),
            Binding::Client(task) => write!(f, "Client({})", task.id()),
            Binding::Upstream(sender) => write!(f, "Upstream({})", sender.task().id()),
        }
    }
}

/// How a connection flagged for closing is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Flush what was written, then close.
    AfterFlush,
    /// Drop the connection without flushing.
    Immediately,
}

/// Write side of a connection.
pub trait Link {
    /// Queue an HTTP response.
    fn send_response(&self, response: HttpResponse) {
        tracing::warn!(status = response.status, "HTTP response on a non-HTTP link dropped");
    }

    /// Queue a datagram to the peer.
    fn send_datagram(&self, datagram: Vec<u8>) {
        tracing::warn!(len = datagram.len(), "Datagram on a non-datagram link dropped");
    }

    /// Tear the connection down.
    fn close(&self, mode: CloseMode);
}
