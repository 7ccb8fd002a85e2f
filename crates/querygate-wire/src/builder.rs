//! Construction of protocol messages the proxy sends on its own behalf.

use bytes::{BufMut, Bytes, BytesMut};

/// Single-byte reply accepting an SSLRequest.
pub const SSL_ACCEPT: u8 = b'S';

/// Single-byte reply denying an SSLRequest.
pub const SSL_DENY: u8 = b'N';

/// SQLSTATE reported on proxy-generated errors (insufficient_privilege).
const PROXY_SQLSTATE: &str = "42501";

/// Build an ErrorResponse (`'E'`) message carrying a human-readable reason.
///
/// Fields: severity (`S` and the non-localized `V`), SQLSTATE (`C`), message
/// (`M`), followed by the field-list terminator.
pub fn error_response(message: &str) -> Bytes {
    let mut body = BytesMut::new();
    put_field(&mut body, b'S', "ERROR");
    put_field(&mut body, b'V', "ERROR");
    put_field(&mut body, b'C', PROXY_SQLSTATE);
    put_field(&mut body, b'M', message);
    body.put_u8(0);

    let mut buf = BytesMut::with_capacity(5 + body.len());
    buf.put_u8(b'E');
    buf.put_i32(4 + body.len() as i32);
    buf.put_slice(&body);
    buf.freeze()
}

/// Build a ReadyForQuery (`'Z'`) message with idle transaction status.
pub fn ready_for_query() -> Bytes {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_u8(b'Z');
    buf.put_i32(5);
    buf.put_u8(b'I');
    buf.freeze()
}

/// Encode a Simple Query (`'Q'`) message.
pub fn simple_query(sql: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + sql.len() + 1);
    buf.put_u8(b'Q');
    buf.put_i32(4 + sql.len() as i32 + 1);
    buf.put_slice(sql.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

fn put_field(buf: &mut BytesMut, code: u8, value: &str) {
    buf.put_u8(code);
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{message_frame_len, Decoded};

    #[test]
    fn test_error_response_framing() {
        let msg = error_response("query rejected");
        assert_eq!(msg[0], b'E');
        let declared = i32::from_be_bytes([msg[1], msg[2], msg[3], msg[4]]);
        assert_eq!(declared as usize, msg.len() - 1);
        // Field list ends with a lone NUL terminator.
        assert_eq!(msg[msg.len() - 1], 0);
        assert_eq!(message_frame_len(&msg), Decoded::Complete(msg.len()));
    }

    #[test]
    fn test_error_response_carries_message() {
        let msg = error_response("no means no");
        let text: Vec<u8> = msg.to_vec();
        let needle = b"Mno means no\0";
        assert!(text.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_ready_for_query_bytes() {
        let msg = ready_for_query();
        assert_eq!(&msg[..], &[b'Z', 0, 0, 0, 5, b'I']);
    }

    #[test]
    fn test_simple_query_length() {
        let msg = simple_query("SELECT 1");
        assert_eq!(msg[0], b'Q');
        let declared = i32::from_be_bytes([msg[1], msg[2], msg[3], msg[4]]);
        assert_eq!(declared, 4 + 8 + 1);
        assert_eq!(msg[msg.len() - 1], 0);
    }
}
