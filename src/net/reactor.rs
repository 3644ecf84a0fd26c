//! Single-threaded event reactor.
//!
//! # Responsibilities
//! - Own every live connection: its binding, link, timer and close flag
//! - Deliver events to bindings strictly one at a time
//! - Fire per-connection timers
//! - Tear down connections flagged for closing and tell their owner
//!
//! # Design Decisions
//! - I/O tasks never touch bindings; they only push `(ConnectionId, Event)`
//!   onto the event channel and the loop dispatches them serially
//! - Handlers run synchronously; the connection table is never borrowed
//!   while a handler runs, so handlers may freely rebind, arm timers and
//!   open new connections
//! - Closing is deferred to the end of the current dispatch (reaping), and
//!   the owner still bound at that point receives `Event::Close`

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::gateway::TaskManager;
use crate::http::{HttpResponse, UpstreamRequest};
use crate::net::client::TokioConnector;
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event, Link};
use crate::observability::metrics;

/// Channel handle used by I/O tasks to feed the reactor.
pub type EventSender = mpsc::UnboundedSender<(ConnectionId, Event)>;
type EventReceiver = mpsc::UnboundedReceiver<(ConnectionId, Event)>;

/// Opens outbound connections on behalf of the reactor.
pub trait Connector {
    /// Start an outbound HTTP exchange. Progress is reported through `events`
    /// tagged with `id`; the returned link tears the exchange down.
    fn connect(&self, id: ConnectionId, request: UpstreamRequest, events: EventSender) -> Box<dyn Link>;
}

struct Connection {
    binding: Binding,
    link: Box<dyn Link>,
    deadline: Option<Instant>,
    close: Option<CloseMode>,
}

/// The event loop and its connection table.
pub struct Reactor {
    connections: RefCell<HashMap<ConnectionId, Connection>>,
    closing: RefCell<Vec<ConnectionId>>,
    events_tx: EventSender,
    events_rx: RefCell<Option<EventReceiver>>,
    connector: Box<dyn Connector>,
}

impl Reactor {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connections: RefCell::new(HashMap::new()),
            closing: RefCell::new(Vec::new()),
            events_tx,
            events_rx: RefCell::new(Some(events_rx)),
            connector,
        }
    }

    /// Reactor whose outbound connections use real sockets.
    pub fn with_tokio() -> Rc<Self> {
        Rc::new(Self::new(Box::new(TokioConnector)))
    }

    /// Handle for I/O tasks to report events.
    pub fn events(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Add a connection to the table.
    pub fn register(&self, id: ConnectionId, link: Box<dyn Link>, binding: Binding) {
        tracing::trace!(connection_id = %id, binding = ?binding, "Connection registered");
        self.connections.borrow_mut().insert(
            id,
            Connection {
                binding,
                link,
                deadline: None,
                close: None,
            },
        );
        metrics::set_active_connections(self.len());
    }

    /// Open an outbound HTTP connection owned by `binding`.
    pub fn connect_http(&self, request: UpstreamRequest, binding: Binding) -> ConnectionId {
        let id = ConnectionId::new();
        tracing::debug!(connection_id = %id, url = %request.url, method = request.method(), "Opening outbound connection");
        let link = self.connector.connect(id, request, self.events());
        self.register(id, link, binding);
        id
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.borrow().is_empty()
    }

    /// Current binding of a connection.
    pub fn binding(&self, id: ConnectionId) -> Option<Binding> {
        self.connections.borrow().get(&id).map(|c| c.binding.clone())
    }

    /// Transfer a connection to a new owner. The previous binding is
    /// dropped after the table borrow is released.
    pub fn rebind(&self, id: ConnectionId, binding: Binding) {
        let previous = self
            .connections
            .borrow_mut()
            .get_mut(&id)
            .map(|c| std::mem::replace(&mut c.binding, binding));
        drop(previous);
    }

    /// Replace the connection's handler with a no-op.
    pub fn neutralize(&self, id: ConnectionId) {
        self.rebind(id, Binding::Empty);
    }

    /// Recover the protocol manager owning an accepted connection.
    ///
    /// # Panics
    /// If the connection is not bound to a listener; managers only call this
    /// for connections they accepted themselves.
    pub fn resolve_owner(&self, id: ConnectionId) -> Rc<dyn crate::gateway::ConnectionManager> {
        match self.binding(id) {
            Some(Binding::Listener(owner)) => owner,
            other => panic!("connection {id} has no listener owner (bound to {other:?})"),
        }
    }

    /// Arm (`Some`) or disarm (`None`) the connection's timer.
    pub fn set_timer(&self, id: ConnectionId, deadline: Option<Instant>) {
        if let Some(conn) = self.connections.borrow_mut().get_mut(&id) {
            conn.deadline = deadline;
        }
    }

    pub fn deadline(&self, id: ConnectionId) -> Option<Instant> {
        self.connections.borrow().get(&id).and_then(|c| c.deadline)
    }

    /// Flag the connection to be torn down at the end of the current dispatch.
    /// An immediate close always wins over a flushing one.
    pub fn mark_close(&self, id: ConnectionId, mode: CloseMode) {
        let mut connections = self.connections.borrow_mut();
        let Some(conn) = connections.get_mut(&id) else {
            return;
        };
        conn.close = match (conn.close, mode) {
            (Some(CloseMode::Immediately), _) => Some(CloseMode::Immediately),
            _ => Some(mode),
        };
        self.closing.borrow_mut().push(id);
    }

    pub fn close_mode(&self, id: ConnectionId) -> Option<CloseMode> {
        self.connections.borrow().get(&id).and_then(|c| c.close)
    }

    pub fn send_response(&self, id: ConnectionId, response: HttpResponse) {
        match self.connections.borrow().get(&id) {
            Some(conn) => conn.link.send_response(response),
            None => tracing::debug!(connection_id = %id, "Response for closed connection dropped"),
        }
    }

    pub fn send_datagram(&self, id: ConnectionId, datagram: Vec<u8>) {
        match self.connections.borrow().get(&id) {
            Some(conn) => conn.link.send_datagram(datagram),
            None => tracing::debug!(connection_id = %id, "Datagram for closed connection dropped"),
        }
    }

    /// Deliver one event to the connection's current binding, then reap
    /// every connection flagged for closing.
    pub fn dispatch(&self, manager: &dyn TaskManager, id: ConnectionId, event: Event) {
        let Some(binding) = self.binding(id) else {
            tracing::trace!(connection_id = %id, event = event.kind(), "Event for unknown connection dropped");
            return;
        };
        let peer_closed = matches!(event, Event::Close);

        tracing::trace!(connection_id = %id, event = event.kind(), binding = ?binding, "Dispatching");
        Self::deliver(manager, id, binding, event);

        if peer_closed {
            let removed = self.connections.borrow_mut().remove(&id);
            drop(removed);
            metrics::set_active_connections(self.len());
        }
        self.reap(manager);
    }

    fn deliver(manager: &dyn TaskManager, id: ConnectionId, binding: Binding, event: Event) {
        match binding {
            Binding::Empty => {}
            Binding::Listener(owner) => owner.on_event(manager, id, event),
            Binding::Client(task) => task.on_client_event(id, event),
            Binding::Upstream(sender) => sender.on_event(manager, id, event),
        }
    }

    fn reap(&self, manager: &dyn TaskManager) {
        loop {
            let Some(id) = self.closing.borrow_mut().pop() else {
                break;
            };
            let removed = {
                let mut connections = self.connections.borrow_mut();
                match connections.get(&id) {
                    Some(conn) if conn.close.is_some() => connections.remove(&id),
                    _ => None,
                }
            };
            let Some(conn) = removed else {
                continue;
            };

            let mode = conn.close.unwrap_or(CloseMode::Immediately);
            tracing::trace!(connection_id = %id, mode = ?mode, "Closing connection");
            conn.link.close(mode);
            metrics::set_active_connections(self.len());
            Self::deliver(manager, id, conn.binding, Event::Close);
        }
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.connections.borrow().values().filter_map(|c| c.deadline).min()
    }

    /// Deliver `Event::Timer` to every connection whose deadline is at or
    /// before `now`. Timers left on neutralized connections are disarmed.
    pub fn expire_timers(&self, manager: &dyn TaskManager, now: Instant) {
        let due: Vec<ConnectionId> = self
            .connections
            .borrow()
            .iter()
            .filter(|(_, c)| c.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            if !self.deadline(id).is_some_and(|d| d <= now) {
                continue;
            }
            if self.binding(id).is_some_and(|b| b.is_empty()) {
                self.set_timer(id, None);
                continue;
            }
            self.dispatch(manager, id, Event::Timer);
        }
    }

    /// Run until the manager stops being ready or a shutdown is broadcast.
    ///
    /// # Panics
    /// If the reactor is already running.
    pub async fn run(&self, manager: &dyn TaskManager, mut shutdown: broadcast::Receiver<()>) {
        let mut events = self
            .events_rx
            .borrow_mut()
            .take()
            .expect("reactor is already running");

        tracing::info!("Reactor running");
        while manager.is_ready() {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                received = events.recv() => match received {
                    Some((id, event)) => self.dispatch(manager, id, event),
                    None => break,
                },
                _ = wait_until(deadline) => self.expire_timers(manager, Instant::now()),
            }
        }

        self.close_all(manager);
        *self.events_rx.borrow_mut() = Some(events);
        tracing::info!("Reactor stopped");
    }

    /// Close every connection immediately and deliver `Event::Close` to
    /// each binding, so in-flight upstream calls still reach a terminal state.
    pub fn close_all(&self, manager: &dyn TaskManager) {
        let connections: Vec<_> = self.connections.borrow_mut().drain().collect();
        self.closing.borrow_mut().clear();
        metrics::set_active_connections(0);

        for (id, conn) in connections {
            conn.link.close(CloseMode::Immediately);
            Self::deliver(manager, id, conn.binding, Event::Close);
        }
        self.closing.borrow_mut().clear();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
