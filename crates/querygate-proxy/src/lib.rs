//! # querygate-proxy
//!
//! The intercepting proxy: a TCP listener speaking just enough of the
//! Postgres wire protocol to negotiate startup (including the optional TLS
//! upgrade), classify client statements, and relay everything else
//! unchanged.
//!
//! Statements matching a block pattern are handed to the admission registry
//! and withheld from the backend until a resolution arrives; everything the
//! proxy cannot parse is forwarded as-is, so a codec gap degrades to plain
//! relaying rather than an outage.

pub mod classifier;
pub mod connection;
pub mod error;
pub mod server;
pub mod tls;

pub use classifier::{RegexClassifier, SqlClassifier};
pub use connection::{Connection, SessionCommand};
pub use error::ProxyError;
pub use server::ProxyServer;
pub use tls::build_acceptor;
