//! Framed stream transports.
//!
//! [`FramedTransport`] pairs any reader/writer with a [`Codec`] to turn a
//! byte stream into message frames. Constructors cover stdio and TCP.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpStream;

use gatemcp_core::logging::{targets, trace};

use crate::codec::Codec;
use crate::{Transport, TransportError};

/// Read chunk size for the underlying stream.
const READ_CHUNK: usize = 8 * 1024;

/// A transport over a raw reader/writer pair.
pub struct FramedTransport<R, W> {
    reader: R,
    writer: W,
    codec: Codec,
    pending: VecDeque<Vec<u8>>,
    identity: String,
}

impl<R: Read, W: Write> FramedTransport<R, W> {
    /// Creates a transport over the given streams.
    #[must_use]
    pub fn new(reader: R, writer: W, identity: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            codec: Codec::new(),
            pending: VecDeque::new(),
            identity: identity.into(),
        }
    }

    /// Replaces the codec (to adjust the frame size limit).
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

impl<R: Read + Send, W: Write + Send> Transport for FramedTransport<R, W> {
    fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                trace!(target: targets::TRANSPORT, "recv frame ({} bytes)", frame.len());
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            for frame in self.codec.decode(&chunk[..n])? {
                self.pending.push_back(frame);
            }
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        trace!(target: targets::TRANSPORT, "send frame ({} bytes)", frame.len());
        let encoded = self.codec.encode(frame);
        self.writer.write_all(&encoded)?;
        self.writer.flush()?;
        Ok(())
    }

    fn client_identity(&self) -> &str {
        &self.identity
    }
}

/// Creates a transport over stdin/stdout.
///
/// This is the standard way to run an MCP server as a subprocess.
#[must_use]
pub fn stdio() -> FramedTransport<std::io::Stdin, std::io::Stdout> {
    FramedTransport::new(std::io::stdin(), std::io::stdout(), "stdio")
}

/// Creates a transport over a connected TCP stream.
///
/// The client identity is the peer's IP address.
///
/// # Errors
///
/// Fails when the stream cannot be cloned for the read half.
pub fn tcp(stream: TcpStream) -> std::io::Result<FramedTransport<TcpStream, TcpStream>> {
    let identity = stream
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    let reader = stream.try_clone()?;
    Ok(FramedTransport::new(reader, stream, identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn recv_returns_frames_in_order() {
        let input = Cursor::new(b"first\nsecond\n".to_vec());
        let mut transport = FramedTransport::new(input, Vec::new(), "test");
        assert_eq!(transport.recv().unwrap(), b"first");
        assert_eq!(transport.recv().unwrap(), b"second");
        assert!(matches!(transport.recv(), Err(TransportError::Closed)));
    }

    #[test]
    fn send_frames_are_newline_delimited() {
        let input = Cursor::new(Vec::new());
        let mut transport = FramedTransport::new(input, Vec::new(), "test");
        transport.send(b"{\"ok\":true}").unwrap();
        transport.send(b"{}").unwrap();
        assert_eq!(transport.writer, b"{\"ok\":true}\n{}\n");
    }

    #[test]
    fn frames_split_across_reads_assemble() {
        struct Chunked(Vec<Vec<u8>>);
        impl Read for Chunked {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                let chunk = self.0.remove(0);
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }

        let reader = Chunked(vec![b"par".to_vec(), b"tial\n".to_vec()]);
        let mut transport = FramedTransport::new(reader, Vec::new(), "test");
        assert_eq!(transport.recv().unwrap(), b"partial");
    }

    #[test]
    fn identity_is_reported() {
        let transport = FramedTransport::new(Cursor::new(Vec::new()), Vec::new(), "10.0.0.1");
        assert_eq!(transport.client_identity(), "10.0.0.1");
    }
}
