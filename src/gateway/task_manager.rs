//! Task scheduling and process state.
//!
//! # Responsibilities
//! - Accept new tasks from the connection managers and run their route action
//! - Resume tasks when their upstream call finishes
//! - Own the ready/stop state and the listeners
//!
//! # Design Decisions
//! - Admission limits are checked before a task is scheduled; rejected tasks
//!   respond immediately with Busy or Drop
//! - The gateway drops its reference to a task right after it responds

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::Rc;

use uuid::Uuid;

use crate::coap::CoapConnectionManager;
use crate::config::{GatewayConfig, RouteAction};
use crate::gateway::{GatewayError, Status, TaskHandle, UpstreamSender};
use crate::http::HttpConnectionManager;
use crate::lifecycle::Shutdown;
use crate::net::listener::Listener;
use crate::net::reactor::Reactor;
use crate::routing::Router;

/// Scheduler contract consumed by connection managers and upstream senders.
pub trait TaskManager {
    fn config(&self) -> &GatewayConfig;

    fn reactor(&self) -> &Rc<Reactor>;

    /// A task was created for an inbound request.
    fn on_new_client(&self, task: TaskHandle);

    /// An upstream call reached its terminal state. Called exactly once per
    /// sender, before the sender is dropped.
    fn on_upstream_done(&self, sender: &UpstreamSender);

    /// Request process shutdown.
    fn stop(&self);

    fn is_ready(&self) -> bool;
}

/// Addresses the listeners ended up bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddresses {
    pub http: SocketAddr,
    pub coap: SocketAddr,
}

/// Production task manager.
pub struct Gateway {
    config: Rc<GatewayConfig>,
    reactor: Rc<Reactor>,
    router: Rc<Router>,
    tasks: RefCell<HashMap<Uuid, TaskHandle>>,
    listeners: RefCell<Vec<Listener>>,
    ready: Cell<bool>,
    shutdown: Shutdown,
}

impl Gateway {
    pub fn new(config: GatewayConfig, reactor: Rc<Reactor>) -> Self {
        let router = Rc::new(Router::from_config(&config.routes));
        tracing::info!(routes = router.len(), "Routes compiled");
        Self {
            config: Rc::new(config),
            reactor,
            router,
            tasks: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            ready: Cell::new(false),
            shutdown: Shutdown::new(),
        }
    }

    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    /// Bind the HTTP and CoAP listeners. Must run before `set_ready`.
    pub fn bind(&self) -> Result<BoundAddresses, GatewayError> {
        let http = HttpConnectionManager::new(Rc::clone(&self.router)).bind(self)?;
        let coap = CoapConnectionManager::new(Rc::clone(&self.router)).bind(self)?;

        let addresses = BoundAddresses {
            http: http.local_addr(),
            coap: coap.local_addr(),
        };
        self.listeners.borrow_mut().extend([http, coap]);
        Ok(addresses)
    }

    pub fn set_ready(&self) {
        self.ready.set(true);
    }

    /// Run the reactor until `stop`.
    pub async fn run(&self) {
        let shutdown = self.shutdown.subscribe();
        let reactor = Rc::clone(&self.reactor);
        reactor.run(self, shutdown).await;
        for listener in self.listeners.borrow_mut().drain(..) {
            listener.abort();
        }
        self.tasks.borrow_mut().clear();
    }

    /// Number of scheduled tasks.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn reject(&self, task: &TaskHandle, status: Status, message: &str) {
        tracing::debug!(task_id = %task.id(), status = %status, reason = message, "Task rejected");
        task.set_status(status, Some(message.to_string()));
        task.manager().respond(&self.reactor, task, message.as_bytes());
    }

    fn run_action(&self, task: &TaskHandle) {
        let Some(handler) = task.handler().cloned() else {
            task.set_status(Status::InternalError, Some("route has no handler".to_string()));
            self.finish(task);
            return;
        };

        match handler.action {
            RouteAction::Echo => {
                let body = task.input().body.clone();
                task.output_mut().body = body;
                task.set_status(Status::Ok, None);
                self.finish(task);
            }
            RouteAction::Relay => {
                let body = task.input().body.clone();
                {
                    let mut output = task.output_mut();
                    output.body = body;
                    output.uri = handler.upstream.clone();
                }
                if let Err(failure) = UpstreamSender::send(self, Rc::clone(task)) {
                    task.set_status(Status::Error, Some(failure.to_string()));
                    self.finish(task);
                }
            }
        }
    }

    /// Respond with the task's output (or error message) and unschedule it.
    fn finish(&self, task: &TaskHandle) {
        let payload = match task.last_status() {
            Status::Ok => task.output().body.clone(),
            _ => task.last_error().unwrap_or_default().into(),
        };
        task.manager().respond(&self.reactor, task, &payload);
        self.tasks.borrow_mut().remove(&task.id());
    }
}

impl TaskManager for Gateway {
    fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn reactor(&self) -> &Rc<Reactor> {
        &self.reactor
    }

    fn on_new_client(&self, task: TaskHandle) {
        let in_flight = self.tasks.borrow().len();
        if in_flight >= self.config.limits.max_tasks {
            self.reject(&task, Status::Busy, "server busy");
            return;
        }
        let size = task.input().body.len();
        if size > self.config.limits.max_body_size {
            self.reject(&task, Status::Drop, "request body too large");
            return;
        }

        tracing::debug!(
            task_id = %task.id(),
            route = task.handler().map(|h| h.name.as_str()).unwrap_or("none"),
            in_flight,
            "Task scheduled"
        );
        self.tasks.borrow_mut().insert(task.id(), Rc::clone(&task));
        self.run_action(&task);
    }

    fn on_upstream_done(&self, sender: &UpstreamSender) {
        let task = Rc::clone(sender.task());
        if task.last_status() == Status::Ok {
            let body = task.input().body.clone();
            task.output_mut().body = body;
        }
        self.finish(&task);
    }

    fn stop(&self) {
        tracing::info!("Stop requested");
        self.ready.set(false);
        self.shutdown.trigger();
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }
}
