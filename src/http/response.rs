//! Response rendering.
//!
//! # Responsibilities
//! - Build the success response (JSON body, `Connection: close`)
//! - Build the transport's standard error response for a status code
//! - Convert to a hyper response at the I/O edge

use axum::body::{Body, Bytes};
use axum::http::{Response, StatusCode};

/// A response queued on a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    /// 200 with a JSON body; the connection closes after it.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Connection".into(), "close".into()),
            ],
            body: body.into(),
        }
    }

    /// Standard error response: the message text as a plain body.
    pub fn error(status: u16, message: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type".into(), "text/plain".into()),
                ("Connection".into(), "close".into()),
            ],
            body: message.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn into_hyper(self) -> Response<Body> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::from(self.body)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }
}
