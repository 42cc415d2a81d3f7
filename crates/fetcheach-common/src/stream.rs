//! Progress stream wire format
//!
//! A stream is a sequence of text frames:
//!
//! ```text
//! event: update
//! data: {"type":"update","status":{"200":3},"done":3}
//!
//! event: result
//! data: {"type":"result","array":[...]}
//!
//! ```
//!
//! The connection closes after the `result` frame. [`FrameParser`] accepts the
//! body in arbitrary chunks, as they arrive from the network.

use crate::error::{FetchEachError, Result};
use crate::types::StreamFrame;

/// Content type of a progress stream
pub const EVENT_STREAM: &str = "text/event-stream";

/// Response header naming the job a submission created
pub const JOB_ID_HEADER: &str = "x-job-id";

/// Leading text of the error carried by a `result` frame when a job timed out
pub const TIMEOUT_PREFIX: &str = "Timeout exceeded";

/// Render one frame in wire form, including the blank-line terminator
pub fn encode_frame(frame: &StreamFrame) -> Result<String> {
    let data = serde_json::to_string(frame)?;
    Ok(format!("event: {}\ndata: {}\n\n", frame.event_name(), data))
}

/// A frame as read off the wire, before its payload is decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    /// Decode the payload according to the event name
    pub fn decode(&self) -> Result<StreamFrame> {
        match self.event.as_deref() {
            Some("update") | Some("result") | None => {
                let frame: StreamFrame = serde_json::from_str(&self.data)?;
                if let Some(event) = self.event.as_deref() {
                    if event != frame.event_name() {
                        return Err(FetchEachError::MalformedFrame(format!(
                            "event '{}' carries a '{}' payload",
                            event,
                            frame.event_name()
                        )));
                    }
                }
                Ok(frame)
            }
            Some(other) => Err(FetchEachError::UnknownEvent(other.to_string())),
        }
    }
}

/// Incremental parser for the progress stream
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a frame terminator
    scanned: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        // A terminator may straddle the previous chunk boundary
        let mut from = self.scanned.saturating_sub(1);
        while let Some(end) = find_blank_line(&self.buffer[from..]).map(|at| from + at) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                frames.push(frame);
            }
            from = 0;
        }
        self.scanned = self.buffer.len();
        frames
    }

    /// Bytes received that do not yet form a complete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<RawFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        // Comment lines are keep-alives
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(RawFrame {
        event,
        data: data.join("\n"),
    })
}
