//! Single relay call to the upstream RPC service.
//!
//! # States
//! ```text
//! Connecting → Sent → { Replied | TimedOut | Closed | ConnectFailed }
//! ```
//! Exactly one terminal state is reached per sender. Every terminal
//! transition records the outcome on the task, notifies the task manager,
//! then neutralizes the connection, which drops the binding's reference to
//! the sender once the current dispatch returns.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::time::Instant;

use crate::gateway::{GatewayFailure, Input, Status, TaskHandle, TaskManager};
use crate::http::UpstreamRequest;
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event};
use crate::observability::metrics;

/// Progress of an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Connecting,
    Sent,
    Replied,
    TimedOut,
    Closed,
    ConnectFailed,
}

impl SenderState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SenderState::Connecting | SenderState::Sent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SenderState::Connecting => "connecting",
            SenderState::Sent => "sent",
            SenderState::Replied => "replied",
            SenderState::TimedOut => "timed_out",
            SenderState::Closed => "closed",
            SenderState::ConnectFailed => "connect_failed",
        }
    }
}

/// Drives one outbound call on behalf of a task.
pub struct UpstreamSender {
    task: TaskHandle,
    connection: Cell<Option<ConnectionId>>,
    state: Cell<SenderState>,
    status: Cell<Status>,
    error: RefCell<Option<String>>,
}

impl UpstreamSender {
    /// Start the relay call described by the task's output.
    ///
    /// The request goes to the task's URI (or the configured upstream), as
    /// a GET when the output body is empty and a POST otherwise, with
    /// `Content-Type: application/json` unless the task set headers. The
    /// deadline timer is armed before returning.
    pub fn send(manager: &dyn TaskManager, task: TaskHandle) -> Result<Rc<UpstreamSender>, GatewayFailure> {
        let config = manager.config();
        let reactor = manager.reactor();

        let request = {
            let output = task.output();
            let url = output
                .make_uri(&config.upstream.address)
                .map_err(|e| GatewayFailure::ConnectFailed(format!("invalid upstream url: {e}")))?;
            let mut headers = output.combine_headers();
            if headers.is_empty() {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            UpstreamRequest {
                url,
                headers,
                body: output.body.clone(),
            }
        };

        let sender = Rc::new(UpstreamSender {
            task,
            connection: Cell::new(None),
            state: Cell::new(SenderState::Connecting),
            status: Cell::new(Status::Ok),
            error: RefCell::new(None),
        });

        let id = reactor.connect_http(request, Binding::Upstream(Rc::clone(&sender)));
        sender.connection.set(Some(id));
        reactor.set_timer(id, Some(Instant::now() + config.upstream_request_timeout()));

        tracing::debug!(task_id = %sender.task.id(), connection_id = %id, "Upstream call started");
        Ok(sender)
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection.get()
    }

    pub fn state(&self) -> SenderState {
        self.state.get()
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// Events on the upstream connection.
    ///
    /// # Panics
    /// If the event belongs to a connection this sender does not own.
    pub fn on_event(&self, manager: &dyn TaskManager, id: ConnectionId, event: Event) {
        assert_eq!(
            self.connection.get(),
            Some(id),
            "upstream sender received an event for a foreign connection"
        );
        if self.state.get().is_terminal() {
            tracing::warn!(connection_id = %id, event = event.kind(), "Event after terminal state ignored");
            return;
        }

        let reactor = manager.reactor();
        match event {
            Event::Connect(Ok(())) => {
                self.state.set(SenderState::Sent);
            }
            Event::Connect(Err(reason)) => {
                let failure = GatewayFailure::ConnectFailed(reason);
                self.finish(manager, id, SenderState::ConnectFailed, Err(failure));
            }
            Event::HttpReply(reply) => {
                reactor.set_timer(id, None);
                *self.task.input_mut() = Input::from_reply(reply);
                reactor.mark_close(id, CloseMode::Immediately);
                self.finish(manager, id, SenderState::Replied, Ok(()));
            }
            Event::Close => {
                reactor.set_timer(id, None);
                self.finish(manager, id, SenderState::Closed, Err(GatewayFailure::UpstreamUnexpectedClose));
            }
            Event::Timer => {
                reactor.set_timer(id, None);
                reactor.mark_close(id, CloseMode::Immediately);
                self.finish(manager, id, SenderState::TimedOut, Err(GatewayFailure::UpstreamTimeout));
            }
            other => {
                tracing::trace!(connection_id = %id, event = other.kind(), "Upstream event ignored");
            }
        }
    }

    fn finish(
        &self,
        manager: &dyn TaskManager,
        id: ConnectionId,
        state: SenderState,
        outcome: Result<(), GatewayFailure>,
    ) {
        let (status, error) = match outcome {
            Ok(()) => (Status::Ok, None),
            Err(failure) => (Status::Error, Some(failure.to_string())),
        };

        self.state.set(state);
        self.status.set(status);
        *self.error.borrow_mut() = error.clone();
        self.task.set_status(status, error.clone());

        match &error {
            Some(reason) => tracing::warn!(task_id = %self.task.id(), connection_id = %id, outcome = state.as_str(), reason = %reason, "Upstream call failed"),
            None => tracing::debug!(task_id = %self.task.id(), connection_id = %id, outcome = state.as_str(), "Upstream call finished"),
        }
        metrics::record_upstream(state.as_str());

        manager.on_upstream_done(self);
        manager.reactor().neutralize(id);
    }
}
