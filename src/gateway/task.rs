//! Unit of client work.
//!
//! A task is created when a request matches a route. It is bound to the
//! client connection it came from, records the last status of its work and
//! carries an input buffer (request body, later the upstream reply) and an
//! output description (reply body, or the upstream call to make).

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use axum::body::Bytes;
use url::Url;
use uuid::Uuid;

use crate::gateway::ConnectionManager;
use crate::http::HttpMessage;
use crate::net::connection::{ConnectionId, Event};
use crate::routing::{RouteHandler, RouteMatch};

/// Shared handle to a task.
pub type TaskHandle = Rc<Task>;

/// Outcome of a task's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ok,
    Error,
    InternalError,
    Busy,
    Drop,
}

impl Status {
    /// Response code for this status.
    pub fn response_code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Error | Status::InternalError => 500,
            Status::Busy => 503,
            Status::Drop => 400,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "ok",
            Status::Error => "error",
            Status::InternalError => "internal_error",
            Status::Busy => "busy",
            Status::Drop => "drop",
        };
        f.write_str(name)
    }
}

/// Data flowing into the task: the request body, then the upstream reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    pub body: Bytes,
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
}

impl Input {
    pub fn from_reply(reply: HttpMessage) -> Self {
        Self {
            body: reply.body,
            status: reply.status,
            headers: reply.headers,
        }
    }
}

/// Data flowing out of the task: reply body or upstream call description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Absolute URL, or a path on the default upstream.
    pub uri: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Output {
    /// Resolve the upstream URL, falling back to `default` when unset.
    pub fn make_uri(&self, default: &str) -> Result<Url, url::ParseError> {
        match self.uri.as_deref() {
            None | Some("") => Url::parse(default),
            Some(path) if path.starts_with('/') => Url::parse(default)?.join(path),
            Some(url) => Url::parse(url),
        }
    }

    pub fn combine_headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }
}

#[derive(Debug, Default)]
struct TaskContext {
    status: Status,
    error: Option<String>,
    input: Input,
    output: Output,
}

/// A unit of work bound to one client connection.
pub struct Task {
    id: Uuid,
    manager: Rc<dyn ConnectionManager>,
    client: Cell<Option<ConnectionId>>,
    handler: Option<Rc<RouteHandler>>,
    context: RefCell<TaskContext>,
    this: Weak<Task>,
}

impl Task {
    /// Create a task for a matched route. The route's input becomes the
    /// task's input buffer.
    pub fn create(manager: Rc<dyn ConnectionManager>, client: ConnectionId, route: RouteMatch) -> TaskHandle {
        Rc::new_cyclic(|this| Task {
            id: Uuid::new_v4(),
            manager,
            client: Cell::new(Some(client)),
            handler: route.handler,
            context: RefCell::new(TaskContext {
                input: Input {
                    body: route.input,
                    ..Input::default()
                },
                ..TaskContext::default()
            }),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Strong reference to this task, so it can outlive the frame that
    /// created it.
    ///
    /// # Panics
    /// If called while the task is being dropped.
    pub fn self_handle(&self) -> TaskHandle {
        self.this.upgrade().expect("task handle requested during drop")
    }

    /// Connection manager the task's client arrived through.
    pub fn manager(&self) -> &Rc<dyn ConnectionManager> {
        &self.manager
    }

    pub fn handler(&self) -> Option<&RouteHandler> {
        self.handler.as_deref()
    }

    /// Client connection, if it has not been released or closed.
    pub fn client(&self) -> Option<ConnectionId> {
        self.client.get()
    }

    /// Release the client connection; later calls return `None`.
    pub fn take_client(&self) -> Option<ConnectionId> {
        self.client.take()
    }

    pub fn last_status(&self) -> Status {
        self.context.borrow().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.context.borrow().error.clone()
    }

    pub fn set_status(&self, status: Status, error: Option<String>) {
        let mut context = self.context.borrow_mut();
        context.status = status;
        context.error = error;
    }

    pub fn input(&self) -> Ref<'_, Input> {
        Ref::map(self.context.borrow(), |c| &c.input)
    }

    pub fn input_mut(&self) -> RefMut<'_, Input> {
        RefMut::map(self.context.borrow_mut(), |c| &mut c.input)
    }

    pub fn output(&self) -> Ref<'_, Output> {
        Ref::map(self.context.borrow(), |c| &c.output)
    }

    pub fn output_mut(&self) -> RefMut<'_, Output> {
        RefMut::map(self.context.borrow_mut(), |c| &mut c.output)
    }

    /// Events on the client connection once the task owns it.
    pub fn on_client_event(&self, id: ConnectionId, event: Event) {
        match event {
            Event::Close if self.client.get() == Some(id) => {
                tracing::debug!(task_id = %self.id, connection_id = %id, "Client went away before the response");
                self.client.set(None);
            }
            other => {
                tracing::trace!(task_id = %self.id, connection_id = %id, event = other.kind(), "Client event ignored");
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("protocol", &self.manager.protocol())
            .field("client", &self.client.get())
            .field("status", &self.last_status())
            .finish()
    }
}
