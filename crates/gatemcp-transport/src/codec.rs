//! Message codec for framing raw JSON-RPC payloads.
//!
//! Messages are newline-delimited (NDJSON). The codec assembles complete
//! frames out of arbitrary read chunks and hands the raw bytes to the
//! dispatcher, which owns parsing; the codec never interprets JSON.

/// Threshold for compacting the buffer (consumed prefix length).
const COMPACT_THRESHOLD: usize = 4096;

/// Default maximum frame size (10MB).
const DEFAULT_MAX_FRAME: usize = 10 * 1024 * 1024;

/// Codec for assembling newline-delimited frames.
#[derive(Debug)]
pub struct Codec {
    /// Buffer for incomplete frames.
    buffer: Vec<u8>,
    /// Read position in buffer (data before this has been consumed).
    read_pos: usize,
    /// Maximum allowed frame size in bytes.
    max_frame_size: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// Creates a new codec with the default 10MB frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME)
    }

    /// Creates a codec with an explicit frame limit.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            read_pos: 0,
            max_frame_size,
        }
    }

    /// Returns the maximum allowed frame size in bytes.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encodes a payload into a frame (payload + newline).
    #[must_use]
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.extend_from_slice(payload);
        bytes.push(b'\n');
        bytes
    }

    /// Feeds read bytes in and returns any complete frames.
    ///
    /// Incomplete data is buffered for the next call. Empty lines are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] when buffered data would
    /// exceed the frame limit; the buffer is reset so the connection can
    /// fail cleanly.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
        // Check projected size BEFORE extending to bound memory use.
        let unread_len = self.buffer.len() - self.read_pos;
        let projected = unread_len.saturating_add(data.len());
        if projected > self.max_frame_size {
            self.reset();
            return Err(CodecError::FrameTooLarge(projected));
        }

        // Compact once the consumed prefix grows large.
        if self.read_pos >= COMPACT_THRESHOLD {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }

        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        let mut start = self.read_pos;
        let mut cursor = start;
        while cursor < self.buffer.len() {
            if self.buffer[cursor] == b'\n' {
                if cursor > start {
                    frames.push(self.buffer[start..cursor].to_vec());
                }
                start = cursor + 1;
            }
            cursor += 1;
        }
        self.read_pos = start;

        Ok(frames)
    }

    /// Discards all buffered data.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

/// Codec error types.
#[derive(Debug)]
pub enum CodecError {
    /// A frame exceeded the configured size limit.
    FrameTooLarge(usize),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::FrameTooLarge(size) => write!(f, "frame too large: {size} bytes"),
        }
    }
}

impl std::error::Error for CodecError {}
