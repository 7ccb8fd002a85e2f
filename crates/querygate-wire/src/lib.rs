//! # querygate-wire
//!
//! Stateless codec for the subset of the Postgres wire protocol the proxy
//! understands: startup / SSLRequest negotiation, Simple Query, and the
//! Parse/Bind/Describe/Execute/Sync extended-query messages. Everything else
//! is opaque and passed through by tag.
//!
//! All functions here are pure buffer-in/result-out. They never consume
//! input: callers split frames off their own buffers once a parse reports
//! [`Decoded::Complete`].

pub mod builder;
pub mod codec;
pub mod message;

pub use builder::{error_response, ready_for_query, simple_query, SSL_ACCEPT, SSL_DENY};
pub use codec::{
    is_ssl_request, message_frame_len, parse_extended_query, parse_simple_query,
    startup_frame_len, Decoded,
};
pub use message::FrontendMessage;

/// Magic request code carried by an SSLRequest frame.
pub const SSL_REQUEST_CODE: i32 = 80877103;
