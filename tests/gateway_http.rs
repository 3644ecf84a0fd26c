//! End-to-end HTTP tests against a gateway on ephemeral ports.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::LocalSet;

mod common;

#[tokio::test]
async fn test_echo_route() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let res = common::client()
                .post(gw.url("/echo"))
                .body(r#"{"jsonrpc":"2.0","id":1}"#)
                .send()
                .await
                .unwrap();

            assert_eq!(res.status(), 200);
            assert_eq!(res.headers()["content-type"], "application/json");
            assert_eq!(res.text().await.unwrap(), r#"{"jsonrpc":"2.0","id":1}"#);
        })
        .await;
}

#[tokio::test]
async fn test_unmatched_route_is_invalid_parameter() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let res = common::client().post(gw.url("/nowhere")).body("{}").send().await.unwrap();
            assert_eq!(res.status(), 500);
            assert_eq!(res.text().await.unwrap(), "invalid parameter");
        })
        .await;
}

#[tokio::test]
async fn test_relay_to_upstream() {
    LocalSet::new()
        .run_until(async {
            let (upstream, mut received) = common::start_mock_backend(r#"{"result":"pong"}"#).await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let res = common::client()
                .post(gw.url("/rpc"))
                .body(r#"{"method":"ping"}"#)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(res.text().await.unwrap(), r#"{"result":"pong"}"#);

            let request = received.recv().await.unwrap();
            assert!(request.head.starts_with("POST /json_rpc HTTP/1.1"));
            assert!(request.head.to_ascii_lowercase().contains("content-type: application/json"));
            assert_eq!(request.body, br#"{"method":"ping"}"#);
        })
        .await;
}

#[tokio::test]
async fn test_relay_connect_failure() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let res = common::client().post(gw.url("/rpc")).body("{}").send().await.unwrap();
            assert_eq!(res.status(), 500);
            assert!(res.text().await.unwrap().starts_with("upstream connect failed"));
        })
        .await;
}

#[tokio::test]
async fn test_relay_timeout() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::start_silent_backend().await;
            let mut config = common::gateway_config(upstream);
            config.upstream.request_timeout = 1;
            let gw = common::start_gateway(config);

            let res = common::client().post(gw.url("/rpc")).body("{}").send().await.unwrap();
            assert_eq!(res.status(), 500);
            assert_eq!(res.text().await.unwrap(), "upstream request timeout");
        })
        .await;
}

#[tokio::test]
async fn test_idle_connection_closed_without_response() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let mut config = common::gateway_config(upstream);
            config.server.http_connection_timeout = 1;
            let gw = common::start_gateway(config);

            let mut stream = TcpStream::connect(gw.addresses.http).await.unwrap();
            let mut buf = Vec::new();
            let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
                .await
                .expect("connection was not closed by the idle timeout");

            assert!(read.is_err() || buf.is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_exit_route_stops_gateway() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let result = common::client().get(gw.url("/root/exit")).send().await;
            assert!(result.is_err());

            tokio::time::timeout(Duration::from_secs(5), gw.task)
                .await
                .expect("gateway did not stop")
                .unwrap();
            assert!(!rpc_gateway::TaskManager::is_ready(gw.gateway.as_ref()));
        })
        .await;
}
