//! Decoder for event-formatted streaming responses.
//!
//! Events are separated by a blank line; within an event block only the
//! lines carrying the `data:` prefix are significant. Transport chunks
//! rarely align with event boundaries, so incomplete trailing data is
//! held across reads and prefixed to the next chunk. Malformed JSON in a
//! data line is dropped rather than aborting the stream, so partial
//! progress survives one bad frame.

use crate::error::ClientError;
use crate::protocol::AgentEvent;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::debug;
use std::collections::VecDeque;
use std::pin::Pin;

const DATA_PREFIX: &str = "data:";

/// Incremental frame decoder: push transport chunks in, take decoded
/// events out. One decoder per request; it is never reused across
/// responses.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((content_end, block_end)) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..block_end).collect();
            events.extend(decode_block(&block[..content_end]));
        }
        events
    }

    /// Flush a trailing unterminated frame at end of stream.
    pub fn finish(&mut self) -> Vec<AgentEvent> {
        let block = std::mem::take(&mut self.buffer);
        decode_block(&block)
    }
}

/// Find the first blank-line separator. Returns the end of the block
/// content and the end of the separator, handling both LF and CRLF
/// line endings.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let mut j = i + 1;
        if buf.get(j) == Some(&b'\r') {
            j += 1;
        }
        if buf.get(j) == Some(&b'\n') {
            return Some((i, j + 1));
        }
    }
    None
}

/// Decode one event block: parse each `data:` line as JSON, skipping
/// anything else (comments, event names, retry hints).
fn decode_block(block: &[u8]) -> Vec<AgentEvent> {
    let text = String::from_utf8_lossy(block);
    let mut events = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            continue;
        }
        match serde_json::from_str::<AgentEvent>(payload) {
            Ok(event) => events.push(event),
            Err(e) => debug!("[stream] dropping malformed frame: {e}"),
        }
    }
    events
}

/// A lazy, finite, non-restartable sequence of decoded agent events
/// backed by a streaming HTTP response.
pub struct EventStream {
    body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    decoder: FrameDecoder,
    ready: VecDeque<AgentEvent>,
    finished: bool,
}

impl EventStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            body: Box::pin(response.bytes_stream()),
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next decoded event, or `Ok(None)` once the stream is exhausted.
    ///
    /// A transport error mid-read surfaces as `Err` and ends the stream;
    /// events decoded before it have already been delivered.
    pub async fn next_event(&mut self) -> Result<Option<AgentEvent>, ClientError> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(ClientError::ConnectionFailed(e));
                }
                None => {
                    self.finished = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }
}
