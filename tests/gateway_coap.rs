//! End-to-end CoAP tests over UDP.

use std::net::SocketAddr;
use std::time::Duration;

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType, ResponseType};
use tokio::net::UdpSocket;
use tokio::task::LocalSet;

mod common;

fn request(kind: MessageType, method: RequestType, path: &str, payload: &str) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(kind);
    packet.header.code = MessageClass::Request(method);
    packet.header.message_id = 77;
    packet.set_token(vec![0xca, 0xfe]);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
    }
    packet.payload = payload.as_bytes().to_vec();
    packet
}

async fn exchange(gateway: SocketAddr, packet: Packet) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(&packet.to_bytes().unwrap(), gateway).await.unwrap();
    socket
}

async fn receive(socket: &UdpSocket, wait: Duration) -> Option<Packet> {
    let mut buf = vec![0u8; 64 * 1024];
    let (len, _) = tokio::time::timeout(wait, socket.recv_from(&mut buf)).await.ok()?.ok()?;
    Packet::from_bytes(&buf[..len]).ok()
}

#[tokio::test]
async fn test_confirmable_echo() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let socket = exchange(
                gw.addresses.coap,
                request(MessageType::Confirmable, RequestType::Get, "/a/b", "hello"),
            )
            .await;

            let ack = receive(&socket, Duration::from_secs(5)).await.unwrap();
            assert_eq!(ack.header.get_type(), MessageType::Acknowledgement);
            assert_eq!(ack.header.message_id, 77);

            let reply = receive(&socket, Duration::from_secs(5)).await.unwrap();
            assert_eq!(reply.header.code, MessageClass::Response(ResponseType::Content));
            assert_eq!(reply.get_token(), &[0xca, 0xfe]);
            assert_eq!(reply.payload, b"hello");
        })
        .await;
}

#[tokio::test]
async fn test_unmatched_request_only_acked() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let socket = exchange(
                gw.addresses.coap,
                request(MessageType::Confirmable, RequestType::Delete, "/a/b", ""),
            )
            .await;

            let ack = receive(&socket, Duration::from_secs(5)).await.unwrap();
            assert_eq!(ack.header.get_type(), MessageType::Acknowledgement);
            assert!(receive(&socket, Duration::from_millis(300)).await.is_none());
        })
        .await;
}

#[tokio::test]
async fn test_unsupported_code_dropped_by_transport() {
    LocalSet::new()
        .run_until(async {
            let upstream = common::closed_port().await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let socket = exchange(
                gw.addresses.coap,
                request(MessageType::Confirmable, RequestType::Fetch, "/a/b", ""),
            )
            .await;
            assert!(receive(&socket, Duration::from_millis(300)).await.is_none());
        })
        .await;
}

#[tokio::test]
async fn test_relay_over_coap() {
    LocalSet::new()
        .run_until(async {
            let (upstream, mut received) = common::start_mock_backend(r#"{"result":42}"#).await;
            let gw = common::start_gateway(common::gateway_config(upstream));

            let socket = exchange(
                gw.addresses.coap,
                request(MessageType::NonConfirmable, RequestType::Post, "/rpc", r#"{"method":"answer"}"#),
            )
            .await;

            let reply = receive(&socket, Duration::from_secs(5)).await.unwrap();
            assert_eq!(reply.header.code, MessageClass::Response(ResponseType::Content));
            assert_eq!(reply.payload, br#"{"result":42}"#);
            assert_eq!(received.recv().await.unwrap().body, br#"{"method":"answer"}"#);
        })
        .await;
}
