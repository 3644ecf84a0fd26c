//! In-process doubles for the reactor's I/O edge.
//!
//! `Harness` wires a real `Gateway` and `Reactor` to recording links and a
//! recording connector, so connection managers, tasks and upstream senders
//! can be driven event by event without sockets.

use std::cell::RefCell;
use std::rc::Rc;

use coap_lite::Packet;

use crate::coap::CoapConnectionManager;
use crate::config::{GatewayConfig, RouteAction, RouteConfig};
use crate::gateway::{ConnectionManager, Gateway, TaskManager};
use crate::http::{HttpConnectionManager, HttpMessage, HttpResponse, UpstreamRequest};
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event, Link};
use crate::net::reactor::{Connector, EventSender, Reactor};

/// Everything written to or closed on any recording link.
#[derive(Debug, Default)]
pub struct LinkLog {
    pub responses: Vec<(ConnectionId, HttpResponse)>,
    pub datagrams: Vec<(ConnectionId, Vec<u8>)>,
    pub closes: Vec<(ConnectionId, CloseMode)>,
    pub upstream: Vec<(ConnectionId, UpstreamRequest)>,
}

pub type SharedLog = Rc<RefCell<LinkLog>>;

pub struct RecordingLink {
    pub id: ConnectionId,
    pub log: SharedLog,
}

impl Link for RecordingLink {
    fn send_response(&self, response: HttpResponse) {
        self.log.borrow_mut().responses.push((self.id, response));
    }

    fn send_datagram(&self, datagram: Vec<u8>) {
        self.log.borrow_mut().datagrams.push((self.id, datagram));
    }

    fn close(&self, mode: CloseMode) {
        self.log.borrow_mut().closes.push((self.id, mode));
    }
}

/// Connector that records the request and never touches the network.
pub struct RecordingConnector {
    pub log: SharedLog,
}

impl Connector for RecordingConnector {
    fn connect(&self, id: ConnectionId, request: UpstreamRequest, _events: EventSender) -> Box<dyn Link> {
        self.log.borrow_mut().upstream.push((id, request));
        Box::new(RecordingLink {
            id,
            log: Rc::clone(&self.log),
        })
    }
}

pub fn route(name: &str, path: &str, methods: &[&str], action: RouteAction) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        path: path.to_string(),
        prefix: false,
        methods: methods.iter().map(|m| m.to_string()).collect(),
        action,
        upstream: None,
    }
}

/// Config with an echo route at `/echo` and a relay route at `/rpc`.
pub fn config() -> GatewayConfig {
    GatewayConfig {
        routes: vec![
            route("echo", "/echo", &["POST", "PUT"], RouteAction::Echo),
            route("rpc", "/rpc", &[], RouteAction::Relay),
        ],
        ..GatewayConfig::default()
    }
}

pub struct Harness {
    pub gateway: Gateway,
    pub log: SharedLog,
    pub http: Rc<HttpConnectionManager>,
    pub coap: Rc<CoapConnectionManager>,
}

impl Harness {
    pub fn new(config: GatewayConfig) -> Self {
        let log = SharedLog::default();
        let reactor = Rc::new(Reactor::new(Box::new(RecordingConnector { log: Rc::clone(&log) })));
        let gateway = Gateway::new(config, reactor);
        let http = HttpConnectionManager::new(Rc::clone(gateway.router()));
        let coap = CoapConnectionManager::new(Rc::clone(gateway.router()));
        Self {
            gateway,
            log,
            http,
            coap,
        }
    }

    pub fn reactor(&self) -> &Rc<Reactor> {
        self.gateway.reactor()
    }

    fn register(&self, owner: Rc<dyn ConnectionManager>) -> ConnectionId {
        let id = ConnectionId::new();
        let link = RecordingLink {
            id,
            log: Rc::clone(&self.log),
        };
        self.reactor().register(id, Box::new(link), Binding::Listener(owner));
        id
    }

    pub fn dispatch(&self, id: ConnectionId, event: Event) {
        self.reactor().dispatch(&self.gateway, id, event);
    }

    /// Accept an HTTP connection, which arms its idle timer.
    pub fn accept_http(&self) -> ConnectionId {
        let id = self.register(self.http.clone());
        self.dispatch(id, Event::Accept);
        id
    }

    /// Accept an HTTP connection and deliver one request on it.
    pub fn http_request(&self, method: &str, uri: &str, body: &'static str) -> ConnectionId {
        let id = self.accept_http();
        self.dispatch(id, Event::HttpRequest(HttpMessage::request(method, uri, body)));
        id
    }

    /// Deliver one datagram on a fresh CoAP pseudo-connection.
    pub fn coap_message(&self, packet: Packet) -> ConnectionId {
        let id = self.register(self.coap.clone());
        self.dispatch(id, Event::Coap(packet));
        id
    }

    pub fn responses(&self) -> Vec<(ConnectionId, HttpResponse)> {
        self.log.borrow().responses.clone()
    }

    pub fn response_for(&self, id: ConnectionId) -> Option<HttpResponse> {
        self.log
            .borrow()
            .responses
            .iter()
            .find(|(conn, _)| *conn == id)
            .map(|(_, response)| response.clone())
    }

    pub fn datagrams_for(&self, id: ConnectionId) -> Vec<Packet> {
        self.log
            .borrow()
            .datagrams
            .iter()
            .filter(|(conn, _)| *conn == id)
            .filter_map(|(_, bytes)| Packet::from_bytes(bytes).ok())
            .collect()
    }

    pub fn close_of(&self, id: ConnectionId) -> Option<CloseMode> {
        self.log
            .borrow()
            .closes
            .iter()
            .find(|(conn, _)| *conn == id)
            .map(|(_, mode)| *mode)
    }

    /// The most recent outbound connection and its request.
    pub fn last_upstream(&self) -> Option<(ConnectionId, UpstreamRequest)> {
        self.log.borrow().upstream.last().cloned()
    }
}
