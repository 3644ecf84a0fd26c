//! Protocol-independent half of the inbound side.
//!
//! # Responsibilities
//! - Delegate route lookups to the router
//! - Map a task's final status onto a response code
//! - Hand the rendered response to the protocol, then give the client
//!   connection back to the reactor for teardown

use crate::gateway::{GatewayFailure, Protocol, Status, Task, TaskManager};
use crate::net::connection::{CloseMode, ConnectionId, Event};
use crate::net::reactor::Reactor;
use crate::observability::metrics;
use crate::routing::{Method, RouteMatch, Router};

/// A listening endpoint for one protocol.
pub trait ConnectionManager {
    fn protocol(&self) -> Protocol;

    fn router(&self) -> &Router;

    /// Handle an event on a connection this manager still owns.
    fn on_event(&self, manager: &dyn TaskManager, id: ConnectionId, event: Event);

    /// Write the final response for `status` on the client connection.
    fn render(&self, reactor: &Reactor, client: ConnectionId, code: u16, status: Status, payload: &[u8]);

    /// Pure route lookup.
    fn match_route(&self, path: &str, method: Method) -> RouteMatch {
        self.router().match_route(path, method)
    }

    /// Send the task's final response and relinquish its client connection.
    ///
    /// The connection is flagged to close once the response is flushed and
    /// its handler is neutralized, so nothing else reaches the task through
    /// it. A task whose client already went away sends nothing.
    fn respond(&self, reactor: &Reactor, task: &Task, payload: &[u8]) {
        let status = task.last_status();
        let code = status.response_code();

        let Some(client) = task.take_client() else {
            tracing::debug!(task_id = %task.id(), status = %status, "No client left to respond to");
            return;
        };

        tracing::debug!(
            task_id = %task.id(),
            connection_id = %client,
            protocol = %self.protocol(),
            status = %status,
            code,
            "Responding"
        );
        self.render(reactor, client, code, status, payload);
        reactor.mark_close(client, CloseMode::AfterFlush);
        reactor.neutralize(client);
        metrics::record_request(self.protocol().as_str(), code);
    }
}

/// Log a request the manager decided not to dispatch.
pub(crate) fn log_rejection(protocol: Protocol, id: ConnectionId, failure: &GatewayFailure) {
    tracing::debug!(connection_id = %id, protocol = %protocol, reason = %failure, "Request not dispatched");
    if matches!(failure, GatewayFailure::NoRouteMatch) {
        metrics::record_route_miss(protocol.as_str());
    }
}
