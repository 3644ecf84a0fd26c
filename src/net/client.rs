//! Outbound HTTP exchanges.
//!
//! Each exchange runs as its own local task: connect, report the outcome,
//! send one request over an HTTP/1.1 connection, report the reply and
//! finally report the close. The reactor decides what each event means.

use axum::body::Body;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::http::{HttpMessage, UpstreamRequest};
use crate::net::connection::{CloseMode, ConnectionId, Event, Link};
use crate::net::reactor::{Connector, EventSender};

/// Largest upstream reply body buffered.
const MAX_REPLY_BODY: usize = 16 * 1024 * 1024;

/// Connector backed by tokio sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioConnector;

impl Connector for TokioConnector {
    fn connect(&self, id: ConnectionId, request: UpstreamRequest, events: EventSender) -> Box<dyn Link> {
        let task = tokio::task::spawn_local(exchange(id, request, events));
        Box::new(UpstreamLink { task })
    }
}

#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error("request build failed: {0}")]
    Build(#[from] axum::http::Error),
    #[error("{0}")]
    Http(#[from] hyper::Error),
    #[error("reply body: {0}")]
    Body(#[from] axum::Error),
}

async fn exchange(id: ConnectionId, request: UpstreamRequest, events: EventSender) {
    let Some(authority) = request.authority() else {
        let _ = events.send((id, Event::Connect(Err(format!("no host in {}", request.url)))));
        let _ = events.send((id, Event::Close));
        return;
    };

    let stream = match TcpStream::connect(&authority).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(connection_id = %id, authority = %authority, error = %e, "Upstream connect failed");
            let _ = events.send((id, Event::Connect(Err(e.to_string()))));
            let _ = events.send((id, Event::Close));
            return;
        }
    };
    let _ = events.send((id, Event::Connect(Ok(()))));

    match round_trip(stream, &request).await {
        Ok(reply) => {
            let _ = events.send((id, Event::HttpReply(reply)));
        }
        Err(e) => {
            tracing::debug!(connection_id = %id, error = %e, "Upstream exchange failed");
        }
    }

    let _ = events.send((id, Event::Close));
}

async fn round_trip(stream: TcpStream, request: &UpstreamRequest) -> Result<HttpMessage, ExchangeError> {
    let (mut sender, connection) = http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
    tokio::task::spawn_local(async move {
        if let Err(e) = connection.await {
            tracing::trace!(error = %e, "Upstream connection driver ended");
        }
    });

    let response = sender.send_request(request.to_hyper()?).await?;
    let (parts, body) = response.into_parts();
    let body = axum::body::to_bytes(Body::new(body), MAX_REPLY_BODY).await?;
    Ok(HttpMessage::from_response_parts(
        &axum::http::Response::from_parts(parts, ()),
        body,
    ))
}

/// Handle to an in-flight exchange.
struct UpstreamLink {
    task: JoinHandle<()>,
}

impl Link for UpstreamLink {
    fn close(&self, mode: CloseMode) {
        if mode == CloseMode::Immediately {
            self.task.abort();
        }
    }
}

impl Drop for UpstreamLink {
    fn drop(&mut self) {
        self.task.abort();
    }
}
