//! Parsing functions for the wire protocol subset.
//!
//! Every parser distinguishes "not enough bytes yet" ([`Decoded::Partial`],
//! retry after the next read) from "malformed with the length fully known"
//! ([`Decoded::Invalid`], the message will never parse). Partial results
//! must not consume input; all functions here read from a plain slice and
//! leave buffer management to the caller.

use crate::SSL_REQUEST_CODE;

/// Outcome of parsing a protocol message from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A complete, well-formed message.
    Complete(T),
    /// Not enough bytes yet; wait for more input.
    Partial,
    /// The message is malformed and will never parse.
    Invalid,
}

impl<T> Decoded<T> {
    /// The parsed value, if complete.
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            _ => None,
        }
    }
}

fn read_i32_be(buf: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Total length of the next tagged frame (tag byte + self-counting i32
/// length), once it is fully buffered.
pub fn message_frame_len(buf: &[u8]) -> Decoded<usize> {
    if buf.len() < 5 {
        return Decoded::Partial;
    }
    let length = read_i32_be(buf, 1);
    if length < 4 {
        return Decoded::Invalid;
    }
    let total = 1 + length as usize;
    if buf.len() < total {
        Decoded::Partial
    } else {
        Decoded::Complete(total)
    }
}

/// Total length of the next untagged startup-phase frame (the i32 length
/// counts itself), once it is fully buffered.
pub fn startup_frame_len(buf: &[u8]) -> Decoded<usize> {
    if buf.len() < 4 {
        return Decoded::Partial;
    }
    let length = read_i32_be(buf, 0);
    if length < 4 {
        return Decoded::Invalid;
    }
    let total = length as usize;
    if buf.len() < total {
        Decoded::Partial
    } else {
        Decoded::Complete(total)
    }
}

/// Whether a complete startup-phase frame is the SSLRequest probe:
/// exactly 8 declared bytes with the reserved request code.
pub fn is_ssl_request(frame: &[u8]) -> bool {
    frame.len() >= 8 && read_i32_be(frame, 0) == 8 && read_i32_be(frame, 4) == SSL_REQUEST_CODE
}

/// Parse a Simple Query (`'Q'`) message and extract the SQL text.
///
/// Format: `'Q'` (1 byte) + length (4 bytes, counts itself but not the tag)
/// + query text + NUL. Embedded NUL bytes inside the declared length are
/// kept as-is; only the single trailing terminator is stripped.
pub fn parse_simple_query(buf: &[u8]) -> Decoded<String> {
    if buf.len() < 5 {
        return Decoded::Partial;
    }
    if buf[0] != b'Q' {
        return Decoded::Invalid;
    }

    let length = read_i32_be(buf, 1);
    // Length covers itself plus at least the trailing terminator.
    if length < 5 {
        return Decoded::Invalid;
    }
    let query_len = (length - 4 - 1) as usize;

    if buf.len() < 5 + query_len + 1 {
        return Decoded::Partial;
    }

    let text = String::from_utf8_lossy(&buf[5..5 + query_len]).into_owned();
    Decoded::Complete(text)
}

/// Parse a Parse (`'P'`) message and extract the SQL text.
///
/// Format: `'P'` (1 byte) + length (4 bytes) + statement name (C-string) +
/// query (C-string) + parameter fields (opaque). Both C-string scans are
/// bounded by the declared message end; a missing terminator inside a fully
/// buffered message is malformed, not inconclusive.
pub fn parse_extended_query(buf: &[u8]) -> Decoded<String> {
    if buf.len() < 5 {
        return Decoded::Partial;
    }
    if buf[0] != b'P' {
        return Decoded::Invalid;
    }

    let length = read_i32_be(buf, 1);
    if length < 4 {
        return Decoded::Invalid;
    }
    let body_len = (length - 4) as usize;
    if buf.len() < 5 + body_len {
        return Decoded::Partial;
    }
    let end = 5 + body_len;

    // Skip the statement name.
    let Some(name_nul) = find_nul(buf, 5, end) else {
        return Decoded::Invalid;
    };

    // Read the query text.
    let sql_start = name_nul + 1;
    let Some(sql_nul) = find_nul(buf, sql_start, end) else {
        return Decoded::Invalid;
    };

    let text = String::from_utf8_lossy(&buf[sql_start..sql_nul]).into_owned();
    Decoded::Complete(text)
}

/// Position of the next NUL byte in `buf[start..end)`, never scanning past
/// `end`.
fn find_nul(buf: &[u8], start: usize, end: usize) -> Option<usize> {
    buf[start..end].iter().position(|&b| b == 0).map(|p| start + p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::simple_query;
    use bytes::{BufMut, BytesMut};

    fn parse_message(name: &str, sql: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(b'P');
        let body_len = 4 + name.len() + 1 + sql.len() + 1 + 2;
        buf.put_i32(body_len as i32);
        buf.put_slice(name.as_bytes());
        buf.put_u8(0);
        buf.put_slice(sql.as_bytes());
        buf.put_u8(0);
        buf.put_i16(0); // no parameter types
        buf.to_vec()
    }

    #[test]
    fn test_simple_query_roundtrip() {
        let sql = "SELECT * FROM users WHERE name = 'héllo'";
        let encoded = simple_query(sql);
        assert_eq!(parse_simple_query(&encoded), Decoded::Complete(sql.to_string()));
    }

    #[test]
    fn test_simple_query_partial_does_not_consume() {
        let encoded = simple_query("SELECT 1");
        for cut in 0..encoded.len() {
            let truncated = &encoded[..cut];
            assert_eq!(
                parse_simple_query(truncated),
                Decoded::Partial,
                "cut at {cut} should be inconclusive"
            );
        }
    }

    #[test]
    fn test_simple_query_wrong_tag() {
        let mut encoded = simple_query("SELECT 1").to_vec();
        encoded[0] = b'X';
        assert_eq!(parse_simple_query(&encoded), Decoded::Invalid);
    }

    #[test]
    fn test_simple_query_embedded_nul_kept() {
        // Declared length wins over embedded NULs.
        let mut buf = BytesMut::new();
        buf.put_u8(b'Q');
        let text = b"SELECT\0 1";
        buf.put_i32(4 + text.len() as i32 + 1);
        buf.put_slice(text);
        buf.put_u8(0);
        assert_eq!(
            parse_simple_query(&buf),
            Decoded::Complete("SELECT\u{0} 1".to_string())
        );
    }

    #[test]
    fn test_extended_query_roundtrip() {
        let msg = parse_message("stmt1", "INSERT INTO t VALUES ($1)");
        assert_eq!(
            parse_extended_query(&msg),
            Decoded::Complete("INSERT INTO t VALUES ($1)".to_string())
        );
    }

    #[test]
    fn test_extended_query_unnamed_statement() {
        let msg = parse_message("", "SELECT $1");
        assert_eq!(parse_extended_query(&msg), Decoded::Complete("SELECT $1".to_string()));
    }

    #[test]
    fn test_extended_query_truncated_is_partial() {
        let msg = parse_message("stmt1", "SELECT 1");
        for cut in 0..msg.len() {
            assert_eq!(parse_extended_query(&msg[..cut]), Decoded::Partial);
        }
    }

    #[test]
    fn test_extended_query_missing_terminator_is_invalid() {
        // Full declared length present, but no NUL anywhere inside it.
        let mut buf = BytesMut::new();
        buf.put_u8(b'P');
        buf.put_i32(4 + 6);
        buf.put_slice(b"abcdef");
        assert_eq!(parse_extended_query(&buf), Decoded::Invalid);
    }

    #[test]
    fn test_extended_query_missing_sql_terminator_is_invalid() {
        // Statement name terminates but the query string does not.
        let mut buf = BytesMut::new();
        buf.put_u8(b'P');
        buf.put_i32(4 + 2 + 4);
        buf.put_slice(b"s\0");
        buf.put_slice(b"SELE");
        assert_eq!(parse_extended_query(&buf), Decoded::Invalid);
    }

    #[test]
    fn test_extended_query_scan_bounded_by_declared_end() {
        // A NUL after the declared end must not rescue the parse.
        let mut buf = BytesMut::new();
        buf.put_u8(b'P');
        buf.put_i32(4 + 4);
        buf.put_slice(b"s\0ab");
        buf.put_u8(0); // belongs to the next message
        assert_eq!(parse_extended_query(&buf), Decoded::Invalid);
    }

    #[test]
    fn test_message_frame_len() {
        let encoded = simple_query("SELECT 1");
        assert_eq!(message_frame_len(&encoded), Decoded::Complete(encoded.len()));
        assert_eq!(message_frame_len(&encoded[..4]), Decoded::Partial);
        assert_eq!(message_frame_len(&encoded[..encoded.len() - 1]), Decoded::Partial);
    }

    #[test]
    fn test_message_frame_len_bogus_length() {
        let buf = [b'Q', 0, 0, 0, 2];
        assert_eq!(message_frame_len(&buf), Decoded::Invalid);
    }

    #[test]
    fn test_startup_frame_len() {
        let mut buf = BytesMut::new();
        buf.put_i32(16);
        buf.put_slice(&[0u8; 12]);
        assert_eq!(startup_frame_len(&buf), Decoded::Complete(16));
        assert_eq!(startup_frame_len(&buf[..10]), Decoded::Partial);
        assert_eq!(startup_frame_len(&buf[..3]), Decoded::Partial);
    }

    #[test]
    fn test_ssl_request_detection() {
        let mut buf = BytesMut::new();
        buf.put_i32(8);
        buf.put_i32(SSL_REQUEST_CODE);
        assert!(is_ssl_request(&buf));

        // A startup message is not an SSLRequest.
        let mut startup = BytesMut::new();
        startup.put_i32(16);
        startup.put_i32(196608); // protocol 3.0
        startup.put_slice(&[0u8; 8]);
        assert!(!is_ssl_request(&startup));
    }
}
