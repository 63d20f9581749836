//! Transport layer for GateMCP.
//!
//! A [`Transport`] delivers complete raw message frames to the dispatcher
//! and writes response frames back; it never parses JSON. Provided
//! implementations cover stdio (for subprocess servers) and TCP streams.
//! Each transport also reports a client identity string used for rate
//! limiting (peer IP for TCP, a fixed label for stdio).

#![forbid(unsafe_code)]

mod codec;
mod framed;

pub use codec::{Codec, CodecError};
pub use framed::{FramedTransport, stdio, tcp};

/// Transport error types.
#[derive(Debug)]
pub enum TransportError {
    /// The peer closed the connection cleanly.
    Closed,
    /// An I/O failure.
    Io(std::io::Error),
    /// An incoming frame exceeded the transport's size limit.
    FrameTooLarge(usize),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
            TransportError::FrameTooLarge(size) => write!(f, "frame too large: {size} bytes"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::Closed | TransportError::FrameTooLarge(_) => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::FrameTooLarge(size) => TransportError::FrameTooLarge(size),
        }
    }
}

/// A bidirectional message transport.
///
/// Implementations deliver one complete message frame per `recv` call and
/// accept a response frame to send back.
pub trait Transport: Send {
    /// Receives the next complete message frame.
    fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Sends one response frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Returns the client identity used for rate limiting.
    fn client_identity(&self) -> &str;
}
