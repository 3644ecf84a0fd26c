//! Inbound transports.
//!
//! # Responsibilities
//! - Bind HTTP (TCP) and CoAP (UDP) endpoints
//! - Register each accepted connection / datagram with the reactor
//! - Frame requests with hyper or coap-lite and report them as events
//! - Provide the write side (`Link`) the reactor uses to answer
//!
//! # Design Decisions
//! - Binding is synchronous so startup errors surface before the loop runs
//! - HTTP keep-alive is off: one request per connection
//! - Malformed datagrams and unsupported CoAP codes never reach the reactor

use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use axum::body::Body;
use axum::http::{Request, Response};
use coap_lite::Packet;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::coap::CoapConnectionManager;
use crate::http::{HttpMessage, HttpResponse};
use crate::net::connection::{Binding, CloseMode, ConnectionId, Event, Link};
use crate::net::reactor::{EventSender, Reactor};

/// Largest request body the transport buffers.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Largest CoAP datagram accepted.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(io::Error),
}

/// A bound endpoint and the task feeding it into the reactor.
#[derive(Debug)]
pub struct Listener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Listener {
    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting.
    pub fn abort(&self) {
        self.task.abort();
    }
}

fn parse_address(address: &str) -> Result<SocketAddr, ListenerError> {
    address.parse().map_err(|e| ListenerError::Bind {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })
}

fn bind_error(address: &str) -> impl FnOnce(io::Error) -> ListenerError + '_ {
    move |source| ListenerError::Bind {
        address: address.to_string(),
        source,
    }
}

/// Bind an HTTP endpoint whose accepted connections start out owned by `binding`.
pub fn listen_http(reactor: &Rc<Reactor>, address: &str, binding: Binding) -> Result<Listener, ListenerError> {
    let addr = parse_address(address)?;
    let std_listener = std::net::TcpListener::bind(addr).map_err(bind_error(address))?;
    std_listener.set_nonblocking(true).map_err(bind_error(address))?;
    let listener = TcpListener::from_std(std_listener).map_err(bind_error(address))?;
    let local_addr = listener.local_addr().map_err(bind_error(address))?;

    tracing::info!(address = %local_addr, "HTTP listener bound");

    let task = tokio::task::spawn_local(accept_loop(listener, Rc::clone(reactor), binding));
    Ok(Listener { local_addr, task })
}

async fn accept_loop(listener: TcpListener, reactor: Rc<Reactor>, binding: Binding) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %ListenerError::Accept(e), "Accept failed");
                continue;
            }
        };

        let id = ConnectionId::new();
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let closed = Rc::new(Notify::new());
        let link = HttpLink {
            responses: responses_tx,
            closed: Rc::clone(&closed),
        };

        tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection accepted");
        reactor.register(id, Box::new(link), binding.clone());

        let events = reactor.events();
        let _ = events.send((id, Event::Accept));
        tokio::task::spawn_local(serve_client(id, stream, events, responses_rx, closed));
    }
}

async fn serve_client(
    id: ConnectionId,
    stream: TcpStream,
    events: EventSender,
    responses: mpsc::UnboundedReceiver<HttpResponse>,
    closed: Rc<Notify>,
) {
    let responses = Rc::new(RefCell::new(Some(responses)));
    let request_events = events.clone();

    let service = service_fn(move |request: Request<Incoming>| {
        let events = request_events.clone();
        let responses = Rc::clone(&responses);
        async move {
            let (parts, body) = request.into_parts();
            let body = match axum::body::to_bytes(Body::new(body), MAX_REQUEST_BODY).await {
                Ok(body) => body,
                Err(e) => {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
                }
            };
            let message = HttpMessage::from_request_parts(&Request::from_parts(parts, ()), body);

            let Some(mut responses) = responses.borrow_mut().take() else {
                return Err(io::Error::new(io::ErrorKind::Unsupported, "one request per connection"));
            };
            if events.send((id, Event::HttpRequest(message))).is_err() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reactor stopped"));
            }

            match responses.recv().await {
                Some(response) => Ok::<Response<Body>, io::Error>(response.into_hyper()),
                None => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed without a response")),
            }
        }
    });

    let connection = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service);

    tokio::select! {
        result = connection => {
            if let Err(e) = result {
                tracing::debug!(connection_id = %id, error = %e, "Client connection ended with error");
            }
        }
        _ = closed.notified() => {
            tracing::trace!(connection_id = %id, "Client connection dropped by reactor");
        }
    }

    let _ = events.send((id, Event::Close));
}

/// Write side of an accepted HTTP connection.
struct HttpLink {
    responses: mpsc::UnboundedSender<HttpResponse>,
    closed: Rc<Notify>,
}

impl Link for HttpLink {
    fn send_response(&self, response: HttpResponse) {
        if self.responses.send(response).is_err() {
            tracing::debug!("Client connection gone before response");
        }
    }

    fn close(&self, mode: CloseMode) {
        // With keep-alive off hyper closes after the queued response.
        if mode == CloseMode::Immediately {
            self.closed.notify_one();
        }
    }
}

/// Bind a CoAP endpoint; each datagram becomes a connection owned by `binding`.
pub fn listen_coap(reactor: &Rc<Reactor>, address: &str, binding: Binding) -> Result<Listener, ListenerError> {
    let addr = parse_address(address)?;
    let std_socket = std::net::UdpSocket::bind(addr).map_err(bind_error(address))?;
    std_socket.set_nonblocking(true).map_err(bind_error(address))?;
    let socket = UdpSocket::from_std(std_socket).map_err(bind_error(address))?;
    let local_addr = socket.local_addr().map_err(bind_error(address))?;

    tracing::info!(address = %local_addr, "CoAP listener bound");

    let task = tokio::task::spawn_local(receive_loop(Rc::new(socket), Rc::clone(reactor), binding));
    Ok(Listener { local_addr, task })
}

async fn receive_loop(socket: Rc<UdpSocket>, reactor: Rc<Reactor>, binding: Binding) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "CoAP receive failed");
                continue;
            }
        };

        let packet = match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(peer_addr = %peer, error = ?e, "Malformed CoAP datagram dropped");
                continue;
            }
        };
        if !CoapConnectionManager::accepts(&packet) {
            tracing::debug!(peer_addr = %peer, code = ?packet.header.code, "Unsupported CoAP request code dropped");
            continue;
        }

        let id = ConnectionId::new();
        let link = CoapLink {
            socket: Rc::clone(&socket),
            peer,
        };
        reactor.register(id, Box::new(link), binding.clone());
        let _ = reactor.events().send((id, Event::Coap(packet)));
    }
}

/// Write side of one CoAP exchange.
struct CoapLink {
    socket: Rc<UdpSocket>,
    peer: SocketAddr,
}

impl Link for CoapLink {
    fn send_datagram(&self, datagram: Vec<u8>) {
        if let Err(e) = self.socket.try_send_to(&datagram, self.peer) {
            tracing::warn!(peer_addr = %self.peer, error = %e, "CoAP send failed");
        }
    }

    fn close(&self, _mode: CloseMode) {}
}
