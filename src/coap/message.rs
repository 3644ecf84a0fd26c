//! CoAP message helpers on top of `coap-lite` packets.

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, ResponseType};

/// Content-Format registry value for application/json.
const CONTENT_FORMAT_JSON: u8 = 50;

/// Rebuild the request path from every Uri-Path option, in message order.
pub fn request_uri(packet: &Packet) -> String {
    let mut uri = String::new();
    if let Some(segments) = packet.get_option(CoapOption::UriPath) {
        for segment in segments {
            uri.push('/');
            uri.push_str(&String::from_utf8_lossy(segment));
        }
    }
    uri
}

/// Code detail of a request (`0.01` GET → 1); `None` for non-requests.
pub fn request_detail(packet: &Packet) -> Option<u8> {
    match packet.header.code {
        MessageClass::Request(_) => Some(u8::from(packet.header.code) & 0x1f),
        _ => None,
    }
}

/// Empty acknowledgement for a confirmable message.
pub fn acknowledgement(message_id: u16) -> Packet {
    let mut ack = Packet::new();
    ack.header.set_type(MessageType::Acknowledgement);
    ack.header.code = MessageClass::Empty;
    ack.header.message_id = message_id;
    ack
}

/// Response class for a gateway response code.
pub fn response_type(code: u16) -> ResponseType {
    match code {
        200 => ResponseType::Content,
        400 => ResponseType::BadRequest,
        503 => ResponseType::ServiceUnavailable,
        _ => ResponseType::InternalServerError,
    }
}

/// Separate (non-confirmable) response carrying the request token.
pub fn response(code: u16, message_id: u16, token: Vec<u8>, json: bool, payload: &[u8]) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::NonConfirmable);
    packet.header.code = MessageClass::Response(response_type(code));
    packet.header.message_id = message_id;
    packet.set_token(token);
    if json {
        packet.add_option(CoapOption::ContentFormat, vec![CONTENT_FORMAT_JSON]);
    }
    packet.payload = payload.to_vec();
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use coap_lite::RequestType;

    fn request(segments: &[&str]) -> Packet {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(RequestType::Put);
        for segment in segments {
            packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        packet
    }

    #[test]
    fn uri_keeps_segment_order() {
        assert_eq!(request_uri(&request(&["a", "b", "c"])), "/a/b/c");
        assert_eq!(request_uri(&request(&[])), "");
    }

    #[test]
    fn uri_ignores_other_options() {
        let mut packet = request(&["x"]);
        packet.add_option(CoapOption::UriQuery, b"k=v".to_vec());
        assert_eq!(request_uri(&packet), "/x");
    }

    #[test]
    fn detail_only_for_requests() {
        assert_eq!(request_detail(&request(&[])), Some(3));
        assert_eq!(request_detail(&acknowledgement(7)), None);
    }

    #[test]
    fn acknowledgement_echoes_message_id() {
        let ack = acknowledgement(42);
        assert_eq!(ack.header.get_type(), MessageType::Acknowledgement);
        assert_eq!(ack.header.message_id, 42);
        assert_eq!(ack.header.code, MessageClass::Empty);
    }

    #[test]
    fn response_round_trips_through_bytes() {
        let packet = response(503, 9, vec![1, 2], false, b"server busy");
        let decoded = Packet::from_bytes(&packet.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.header.code, MessageClass::Response(ResponseType::ServiceUnavailable));
        assert_eq!(decoded.get_token(), &[1, 2]);
        assert_eq!(decoded.payload, b"server busy");
    }
}
