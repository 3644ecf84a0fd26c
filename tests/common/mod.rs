//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rpc_gateway::config::{GatewayConfig, RouteAction, RouteConfig};
use rpc_gateway::gateway::BoundAddresses;
use rpc_gateway::{Gateway, Reactor};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Received {
    pub head: String,
    pub body: Vec<u8>,
}

/// Read one HTTP/1.1 request (head plus Content-Length body).
async fn read_request(socket: &mut TcpStream) -> Option<Received> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(Received {
        head,
        body: buf[head_end..].to_vec(),
    })
}

/// Start a mock backend that answers every request with `response` and
/// reports what it received.
pub async fn start_mock_backend(response: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(received) = read_request(&mut socket).await {
                    let _ = tx.send(received);
                }
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn route(name: &str, path: &str, methods: &[&str], action: RouteAction) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        path: path.into(),
        prefix: false,
        methods: methods.iter().map(|m| m.to_string()).collect(),
        action,
        upstream: None,
    }
}

/// Gateway config on ephemeral ports with `/echo` and `/rpc` routes.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.http_address = "127.0.0.1:0".into();
    config.server.coap_address = "127.0.0.1:0".into();
    config.upstream.address = format!("http://{upstream}/json_rpc");
    config.routes = vec![
        route("echo", "/echo", &["POST"], RouteAction::Echo),
        route("coap-echo", "/a/b", &["GET"], RouteAction::Echo),
        route("rpc", "/rpc", &[], RouteAction::Relay),
    ];
    config
}

pub struct RunningGateway {
    pub gateway: Rc<Gateway>,
    pub addresses: BoundAddresses,
    pub task: JoinHandle<()>,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addresses.http, path)
    }
}

/// Bind and run a gateway on the current `LocalSet`.
pub fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let gateway = Rc::new(Gateway::new(config, Reactor::with_tokio()));
    let addresses = gateway.bind().unwrap();
    gateway.set_ready();

    let task = {
        let gateway = Rc::clone(&gateway);
        tokio::task::spawn_local(async move { gateway.run().await })
    };

    RunningGateway {
        gateway,
        addresses,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
