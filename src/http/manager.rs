//! HTTP connection manager.
//!
//! # Connection States
//! ```text
//! Accepted → AwaitingRequest → { Dispatched | Rejected | ClosedOnTimeout }
//! ```
//! - Accept arms the idle timer (`server.http_connection_timeout`)
//! - A full request disarms it and is dispatched to a task, answered with
//!   500 "invalid parameter", or dropped without a response
//! - The timer firing first neutralizes the connection and closes it

use std::rc::Rc;

use tokio::time::Instant;

use crate::gateway::connection_manager::log_rejection;
use crate::gateway::{ConnectionManager, GatewayFailure, Protocol, Status, Task, TaskManager};
use crate::http::{HttpMessage, HttpResponse};
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event};
use crate::net::listener::{self, Listener, ListenerError};
use crate::net::reactor::Reactor;
use crate::observability::metrics;
use crate::routing::{Method, Router};

/// Administrative path that stops the process.
pub const EXIT_URI: &str = "/root/exit";

pub struct HttpConnectionManager {
    router: Rc<Router>,
}

impl HttpConnectionManager {
    pub fn new(router: Rc<Router>) -> Rc<Self> {
        Rc::new(Self { router })
    }

    /// Listen on `server.http_address`.
    ///
    /// # Panics
    /// If the task manager is already ready.
    pub fn bind(self: &Rc<Self>, manager: &dyn TaskManager) -> Result<Listener, ListenerError> {
        assert!(!manager.is_ready(), "HTTP listener bound after the gateway became ready");
        let owner: Rc<dyn ConnectionManager> = self.clone();
        listener::listen_http(manager.reactor(), &manager.config().server.http_address, Binding::Listener(owner))
    }

    /// Exact lookup of a verb token; `None` means the request is dropped.
    pub fn translate_method(token: &str) -> Option<Method> {
        Method::from_token(token)
    }

    fn on_request(&self, manager: &dyn TaskManager, id: ConnectionId, request: HttpMessage) {
        let reactor = manager.reactor();
        let idle_deadline = reactor.deadline(id);
        reactor.set_timer(id, None);

        if request.uri == EXIT_URI {
            tracing::info!(connection_id = %id, "Exit requested over HTTP");
            manager.stop();
            return;
        }

        let Some(method) = Self::translate_method(&request.method) else {
            // Left for the idle timer to close.
            reactor.set_timer(id, idle_deadline);
            log_rejection(Protocol::Http, id, &GatewayFailure::UnknownVerb(request.method));
            return;
        };

        let owner = reactor.resolve_owner(id);
        let mut route = self.match_route(&request.uri, method);
        if !route.matched {
            let failure = GatewayFailure::NoRouteMatch;
            log_rejection(Protocol::Http, id, &failure);
            reactor.send_response(id, HttpResponse::error(500, failure.to_string()));
            reactor.mark_close(id, CloseMode::AfterFlush);
            metrics::record_request(Protocol::Http.as_str(), 500);
            return;
        }

        route.input = request.body;
        let task = Task::create(owner, id, route);
        tracing::debug!(connection_id = %id, task_id = %task.id(), method = %method, uri = %request.uri, "HTTP request dispatched");
        reactor.rebind(id, Binding::Client(Rc::clone(&task)));
        manager.on_new_client(task.self_handle());
    }
}

impl ConnectionManager for HttpConnectionManager {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn router(&self) -> &Router {
        &self.router
    }

    fn on_event(&self, manager: &dyn TaskManager, id: ConnectionId, event: Event) {
        let reactor = manager.reactor();
        match event {
            Event::Accept => {
                let deadline = Instant::now() + manager.config().http_connection_timeout();
                reactor.set_timer(id, Some(deadline));
            }
            Event::HttpRequest(request) => self.on_request(manager, id, request),
            Event::Timer => {
                reactor.set_timer(id, None);
                reactor.neutralize(id);
                reactor.mark_close(id, CloseMode::Immediately);
                log_rejection(Protocol::Http, id, &GatewayFailure::ClientRequestTimeout);
            }
            _ => {}
        }
    }

    fn render(&self, reactor: &Reactor, client: ConnectionId, code: u16, status: Status, payload: &[u8]) {
        let response = if status == Status::Ok {
            HttpResponse::json(payload.to_vec())
        } else {
            HttpResponse::error(code, payload.to_vec())
        };
        reactor.send_response(client, response);
    }
}
