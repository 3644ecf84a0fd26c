//! CoAP connection manager.
//!
//! Every inbound datagram is its own pseudo-connection. Confirmable
//! requests are acknowledged first, then follow the same path as
//! non-confirmable ones: rebuild the URI from Uri-Path options, translate
//! the code detail through the method table, match a route and hand a new
//! task to the task manager. Anything not turned into a task is released
//! without a response.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use axum::body::Bytes;
use coap_lite::{MessageType, Packet};

use crate::coap::message;
use crate::gateway::connection_manager::log_rejection;
use crate::gateway::{ConnectionManager, GatewayFailure, Protocol, Status, Task, TaskManager};
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event};
use crate::net::listener::{self, Listener, ListenerError};
use crate::net::reactor::Reactor;
use crate::routing::{Method, Router};

/// Verbs by code detail minus one.
const COAP_METHODS: [(&str, Method); 4] = [
    ("GET", Method::Get),
    ("POST", Method::Post),
    ("PUT", Method::Put),
    ("DELETE", Method::Delete),
];

pub struct CoapConnectionManager {
    router: Rc<Router>,
    /// Request tokens of clients awaiting a response.
    tokens: RefCell<HashMap<ConnectionId, Vec<u8>>>,
    next_message_id: Cell<u16>,
}

impl CoapConnectionManager {
    pub fn new(router: Rc<Router>) -> Rc<Self> {
        Rc::new(Self {
            router,
            tokens: RefCell::new(HashMap::new()),
            next_message_id: Cell::new(1),
        })
    }

    /// Listen on `server.coap_address`.
    ///
    /// # Panics
    /// If the task manager is already ready.
    pub fn bind(self: &Rc<Self>, manager: &dyn TaskManager) -> Result<Listener, ListenerError> {
        assert!(!manager.is_ready(), "CoAP listener bound after the gateway became ready");
        let owner: Rc<dyn ConnectionManager> = self.clone();
        listener::listen_coap(manager.reactor(), &manager.config().server.coap_address, Binding::Listener(owner))
    }

    /// Method for a table index (code detail minus one).
    ///
    /// # Panics
    /// If the index is outside the table; the transport discards such
    /// requests before they reach the manager.
    pub fn translate_method(index: usize) -> Method {
        assert!(index < COAP_METHODS.len(), "CoAP method index {index} out of range");
        COAP_METHODS[index].1
    }

    /// Whether the transport should hand this packet to the manager.
    pub fn accepts(packet: &Packet) -> bool {
        match message::request_detail(packet) {
            Some(detail) => (1..=COAP_METHODS.len()).contains(&usize::from(detail)),
            None => true,
        }
    }

    /// Returns true when a task took ownership of the connection.
    fn on_message(&self, manager: &dyn TaskManager, id: ConnectionId, packet: Packet) -> bool {
        let Some(detail) = message::request_detail(&packet) else {
            return false;
        };
        let reactor = manager.reactor();

        match packet.header.get_type() {
            MessageType::Confirmable => {
                match message::acknowledgement(packet.header.message_id).to_bytes() {
                    Ok(ack) => reactor.send_datagram(id, ack),
                    Err(e) => tracing::warn!(connection_id = %id, error = ?e, "Failed to encode CoAP ack"),
                }
            }
            MessageType::NonConfirmable => {}
            MessageType::Acknowledgement | MessageType::Reset => return false,
        }

        let uri = message::request_uri(&packet);
        let method = Self::translate_method(usize::from(detail).wrapping_sub(1));

        let owner = reactor.resolve_owner(id);
        let mut route = self.match_route(&uri, method);
        if !route.matched {
            log_rejection(Protocol::Coap, id, &GatewayFailure::NoRouteMatch);
            return false;
        }

        self.tokens.borrow_mut().insert(id, packet.get_token().to_vec());
        route.input = Bytes::from(packet.payload);

        let task = Task::create(owner, id, route);
        tracing::debug!(connection_id = %id, task_id = %task.id(), method = %method, uri = %uri, "CoAP request dispatched");
        reactor.rebind(id, Binding::Client(Rc::clone(&task)));
        manager.on_new_client(task.self_handle());
        true
    }

    fn message_id(&self) -> u16 {
        let id = self.next_message_id.get();
        self.next_message_id.set(id.wrapping_add(1));
        id
    }
}

impl ConnectionManager for CoapConnectionManager {
    fn protocol(&self) -> Protocol {
        Protocol::Coap
    }

    fn router(&self) -> &Router {
        &self.router
    }

    fn on_event(&self, manager: &dyn TaskManager, id: ConnectionId, event: Event) {
        match event {
            Event::Coap(packet) => {
                if !self.on_message(manager, id, packet) {
                    manager.reactor().mark_close(id, CloseMode::Immediately);
                }
            }
            Event::Close => {
                self.tokens.borrow_mut().remove(&id);
            }
            _ => {}
        }
    }

    fn render(&self, reactor: &Reactor, client: ConnectionId, code: u16, status: Status, payload: &[u8]) {
        let token = self.tokens.borrow_mut().remove(&client).unwrap_or_default();
        let packet = message::response(code, self.message_id(), token, status == Status::Ok, payload);
        match packet.to_bytes() {
            Ok(bytes) => reactor.send_datagram(client, bytes),
            Err(e) => tracing::warn!(connection_id = %client, error = ?e, "Failed to encode CoAP response"),
        }
    }
}
