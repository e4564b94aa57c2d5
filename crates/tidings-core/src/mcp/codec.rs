//! Newline-delimited frame codec
//!
//! Outbound frames are serialized as `<json>\n`. Inbound bytes arrive in
//! arbitrary chunks, so the decoder keeps the trailing incomplete fragment
//! and only parses segments that end in a newline. Segments that are not
//! valid protocol frames are dropped: a provider that writes log text to
//! stdout must not bring the bridge down.

use super::error::McpError;
use super::protocol::McpMessage;
use tracing::debug;

/// Stateful decoder holding the not-yet-terminated tail of the stream
#[derive(Debug, Default)]
pub struct FrameCodec {
    buffer: Vec<u8>,
}

impl FrameCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a frame as a single newline-terminated line
    pub fn encode(message: &McpMessage) -> Result<Vec<u8>, McpError> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Feed a chunk and return every frame it completes
    pub fn decode_chunk(&mut self, chunk: &[u8]) -> Vec<McpMessage> {
        if !chunk.contains(&b'\n') {
            self.buffer.extend_from_slice(chunk);
            return Vec::new();
        }

        let (frames, remainder) = decode(&self.buffer, chunk);
        self.buffer = remainder;
        frames
    }

    /// Bytes waiting for their terminating newline
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether no partial frame is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Pure decode step: append `chunk` to `buffer`, parse every complete line,
/// and return the frames together with the new trailing fragment.
pub fn decode(buffer: &[u8], chunk: &[u8]) -> (Vec<McpMessage>, Vec<u8>) {
    let mut pending = Vec::with_capacity(buffer.len() + chunk.len());
    pending.extend_from_slice(buffer);
    pending.extend_from_slice(chunk);

    let Some(last_newline) = pending.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), pending);
    };

    let remainder = pending.split_off(last_newline + 1);
    let frames = pending
        .split(|&b| b == b'\n')
        .filter_map(parse_line)
        .collect();

    (frames, remainder)
}

fn parse_line(line: &[u8]) -> Option<McpMessage> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<McpMessage>(line) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(
                error = %e,
                line = %String::from_utf8_lossy(line),
                "discarding non-protocol line from provider"
            );
            None
        }
    }
}
