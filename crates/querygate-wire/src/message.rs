//! Frontend message discrimination.

/// The kinds of client-to-server messages the proxy distinguishes.
///
/// Tagged messages are recognized by their leading byte only; payloads stay
/// opaque unless a specific parser is invoked. `SslRequest` and `Startup`
/// are untagged startup-phase frames and are produced by the negotiation
/// logic rather than [`FrontendMessage::from_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendMessage {
    /// `'Q'`: single-statement query carrying raw SQL text.
    SimpleQuery,
    /// `'P'`: extended-protocol Parse message.
    Parse,
    /// `'B'`: extended-protocol Bind message.
    Bind,
    /// `'D'`: extended-protocol Describe message.
    Describe,
    /// `'E'`: extended-protocol Execute message.
    Execute,
    /// `'S'`: extended-protocol Sync message.
    Sync,
    /// Untagged 8-byte SSL negotiation probe.
    SslRequest,
    /// Untagged session startup message.
    Startup,
    /// Any other tagged message; forwarded verbatim.
    Other(u8),
}

impl FrontendMessage {
    /// Classify a tagged message by its leading byte.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b'Q' => Self::SimpleQuery,
            b'P' => Self::Parse,
            b'B' => Self::Bind,
            b'D' => Self::Describe,
            b'E' => Self::Execute,
            b'S' => Self::Sync,
            other => Self::Other(other),
        }
    }

    /// Whether this message is part of an extended-query batch that should
    /// be buffered while a blocked batch is open.
    pub fn buffers_in_batch(&self) -> bool {
        matches!(self, Self::Bind | Self::Describe | Self::Execute)
    }
}
