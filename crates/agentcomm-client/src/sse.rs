use agentcomm_types::AgentEvent;
use bytes::Bytes;
use futures_core::Stream;

use crate::error::ClientError;

/// Maximum buffer size for SSE line accumulation (10 MB).
const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// SSE frame parser state machine.
///
/// Accumulates raw bytes into complete lines, concatenates `data:` field
/// remainders within a frame, and decodes one event per frame at the
/// empty-line boundary. A frame with malformed JSON is logged and dropped —
/// a single bad frame never terminates the subscription.
struct SseParser {
    /// Incomplete line carried across chunk boundaries.
    line_buffer: String,
    /// Accumulated `data:` field value for the current frame.
    data_buffer: String,
}

impl SseParser {
    fn new() -> Self {
        Self {
            line_buffer: String::new(),
            data_buffer: String::new(),
        }
    }

    /// Feed a raw byte chunk and return all fully-decoded events.
    fn feed(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        let text = match std::str::from_utf8(chunk) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Dropping non-UTF-8 SSE chunk: {e}");
                return Vec::new();
            }
        };

        let mut events = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                if let Some(event) = self.process_line(&line) {
                    events.push(event);
                }
            } else if ch == '\r' {
                // Ignore carriage return; the newline that follows triggers
                // line processing.
            } else {
                self.line_buffer.push(ch);
                if self.line_buffer.len() > MAX_BUFFER_SIZE {
                    tracing::warn!("SSE line buffer exceeded 10 MB; resetting");
                    self.line_buffer.clear();
                    self.data_buffer.clear();
                    return events;
                }
            }
        }

        events
    }

    /// Process a single complete SSE line. Returns `Some` when an empty line
    /// ends the frame and the accumulated data decodes to an event.
    fn process_line(&mut self, line: &str) -> Option<AgentEvent> {
        // Empty line = frame boundary.
        if line.is_empty() {
            if self.data_buffer.is_empty() {
                return None;
            }
            let data = std::mem::take(&mut self.data_buffer);
            return decode_frame(&data);
        }

        // SSE comment
        if line.starts_with(':') {
            return None;
        }

        // "data:" field — with or without leading space after the colon.
        // Multiple data lines in one frame are concatenated.
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data_buffer.push_str(value);
            if self.data_buffer.len() > MAX_BUFFER_SIZE {
                tracing::warn!("SSE data buffer exceeded 10 MB; dropping frame");
                self.data_buffer.clear();
            }
            return None;
        }

        // Other fields (id:, event:, retry:, unknown) are not significant.
        None
    }

    /// Flush trailing unterminated data at end of stream.
    fn finish(&mut self) -> Option<AgentEvent> {
        if self.data_buffer.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_buffer);
        decode_frame(&data)
    }
}

/// Decode one frame's payload: either a JSON-RPC envelope wrapping the
/// event, or a bare event object. Malformed payloads are logged and
/// dropped.
fn decode_frame(data: &str) -> Option<AgentEvent> {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Dropping malformed SSE frame: {e}");
            return None;
        }
    };

    // Envelope form: an error member becomes an Error event; otherwise the
    // result payload (or the bare object) is decoded by kind.
    if let Some(error) = value.get("error") {
        return match serde_json::from_value(error.clone()) {
            Ok(rpc_error) => Some(AgentEvent::Error(rpc_error)),
            Err(e) => {
                tracing::warn!("Dropping undecodable SSE error frame: {e}");
                None
            }
        };
    }

    let payload = match value.get("result") {
        Some(result) => result.clone(),
        None => value,
    };

    match AgentEvent::from_result(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Dropping undecodable SSE frame: {e}");
            None
        }
    }
}

/// Wraps an inner byte stream and an `SseParser` to produce events.
struct SseStream<S> {
    inner: std::pin::Pin<Box<S>>,
    parser: SseParser,
    /// Events decoded from the current chunk that haven't been yielded yet.
    pending: std::collections::VecDeque<AgentEvent>,
    done: bool,
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send,
{
    type Item = Result<AgentEvent, ClientError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        // All fields are Unpin; the inner stream is already boxed and pinned.
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return std::task::Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return std::task::Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed(&bytes));
                }
                std::task::Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return std::task::Poll::Ready(Some(Err(ClientError::Http(e))));
                }
                std::task::Poll::Ready(None) => {
                    this.done = true;
                    this.pending.extend(this.parser.finish());
                }
                std::task::Poll::Pending => {
                    return std::task::Poll::Pending;
                }
            }
        }
    }
}

/// Create a stream that decodes SSE-framed bytes into protocol events.
pub fn parse_sse_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> std::pin::Pin<Box<dyn Stream<Item = Result<AgentEvent, ClientError>> + Send>> {
    Box::pin(SseStream {
        inner: Box::pin(byte_stream),
        parser: SseParser::new(),
        pending: std::collections::VecDeque::new(),
        done: false,
    })
}
