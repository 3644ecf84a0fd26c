//! HTTP messages as the reactor sees them.
//!
//! # Responsibilities
//! - Carry a fully received request or reply (head + buffered body)
//! - Describe one outbound upstream request
//! - Convert between hyper types and these plain structs at the I/O edge

use axum::body::{Body, Bytes};
use axum::http::{header, Request, Response};
use url::Url;

/// A complete inbound request or upstream reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpMessage {
    /// Verb token as received (requests only).
    pub method: String,
    /// Request path without query (requests only).
    pub uri: String,
    /// Status code (replies only).
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpMessage {
    /// A request with the given verb token, path and body.
    pub fn request(method: impl Into<String>, uri: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// A reply with the given status and body.
    pub fn reply(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Capture an inbound request head; the body is collected separately.
    pub fn from_request_parts<B>(request: &Request<B>, body: Bytes) -> Self {
        Self {
            method: request.method().as_str().to_string(),
            uri: request.uri().path().to_string(),
            status: None,
            headers: collect_headers(request.headers()),
            body,
        }
    }

    /// Capture an upstream reply head; the body is collected separately.
    pub fn from_response_parts<B>(response: &Response<B>, body: Bytes) -> Self {
        Self {
            method: String::new(),
            uri: String::new(),
            status: Some(response.status().as_u16()),
            headers: collect_headers(response.headers()),
            body,
        }
    }
}

fn collect_headers(headers: &axum::http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

/// One outbound call to the upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Empty body means GET, otherwise POST.
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn method(&self) -> &'static str {
        if self.body.is_empty() {
            "GET"
        } else {
            "POST"
        }
    }

    /// `host[:port]` to open a TCP connection to.
    pub fn authority(&self) -> Option<String> {
        let host = self.url.host_str()?;
        let port = self.url.port_or_known_default()?;
        Some(format!("{host}:{port}"))
    }

    /// Build the hyper request sent over an established connection.
    pub fn to_hyper(&self) -> Result<Request<Body>, axum::http::Error> {
        let mut path = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut builder = Request::builder().method(self.method()).uri(path);
        if let Some(host) = self.url.host_str() {
            let host = match self.url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            builder = builder.header(header::HOST, host);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::from(self.body.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(url: &str, body: &'static str) -> UpstreamRequest {
        UpstreamRequest {
            url: Url::parse(url).unwrap(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn empty_body_is_get() {
        assert_eq!(upstream("http://127.0.0.1:1/x", "").method(), "GET");
        assert_eq!(upstream("http://127.0.0.1:1/x", "{}").method(), "POST");
    }

    #[test]
    fn authority_uses_default_port() {
        assert_eq!(upstream("http://example.com/x", "").authority().unwrap(), "example.com:80");
        assert_eq!(upstream("http://10.0.0.1:8545/", "").authority().unwrap(), "10.0.0.1:8545");
    }

    #[test]
    fn hyper_request_keeps_path_query_and_headers() {
        let request = upstream("http://10.0.0.1:8545/json_rpc?id=1", "{}").to_hyper().unwrap();
        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri(), "/json_rpc?id=1");
        assert_eq!(request.headers()["host"], "10.0.0.1:8545");
        assert_eq!(request.headers()["content-type"], "application/json");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut message = HttpMessage::reply(200, "ok");
        message.headers.push(("Content-Type".into(), "text/plain".into()));
        assert_eq!(message.header("content-type"), Some("text/plain"));
        assert_eq!(message.header("x-missing"), None);
    }
}
