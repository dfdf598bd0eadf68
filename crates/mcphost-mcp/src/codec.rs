//! Newline-delimited JSON-RPC framing.
//!
//! Servers write one JSON message per line, but the pipe hands us arbitrary
//! chunks. [`LineCodec::feed`] accepts chunks and yields only complete,
//! JSON-RPC shaped messages.
//!
//! A complete line whose JSON ends prematurely is carried over and joined
//! with the following lines (some servers pretty-print). A line that is not
//! valid JSON at all is discarded. Carried data beyond [`MAX_BUFFER_BYTES`]
//! is dropped and reported as [`Decoded::Overflow`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::{RequestId, RpcError};

/// Largest amount of unterminated or incomplete data kept between chunks.
pub const MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// A message received from a server.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Response to one of our requests.
    Response {
        id: RequestId,
        outcome: Result<Value, RpcError>,
    },
    /// Request issued by the server (e.g. `ping`).
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    /// Notification from the server.
    Notification {
        method: String,
        params: Option<Value>,
    },
}

/// One item produced by [`LineCodec::feed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(IncomingMessage),
    /// A line was dropped; `reason` is for diagnostics only.
    Discarded { reason: String },
    /// Carried data exceeded the buffer limit and was dropped.
    Overflow { dropped: usize },
}

/// Incremental decoder for one server's stdout.
#[derive(Debug)]
pub struct LineCodec {
    /// Bytes after the last newline.
    partial: Vec<u8>,
    /// Complete lines whose JSON has not closed yet.
    carry: String,
    max_buffer: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    pub const fn new() -> Self {
        Self::with_max_buffer(MAX_BUFFER_BYTES)
    }

    pub const fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            partial: Vec::new(),
            carry: String::new(),
            max_buffer,
        }
    }

    /// Number of bytes currently held back.
    pub fn buffered(&self) -> usize {
        self.partial.len() + self.carry.len()
    }

    /// Append a chunk and return everything it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        // `partial` never holds a newline, so only the new bytes are scanned.
        let scan_from = self.partial.len();
        self.partial.extend_from_slice(chunk);

        if let Some(last) = self.partial[scan_from..].iter().rposition(|&b| b == b'\n') {
            let rest = self.partial.split_off(scan_from + last + 1);
            let mut complete = std::mem::replace(&mut self.partial, rest);
            complete.pop();
            for raw in complete.split(|&b| b == b'\n') {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let line = String::from_utf8_lossy(raw);
                self.accept_line(&line, &mut out);
            }
        }

        if self.buffered() > self.max_buffer {
            let dropped = self.buffered();
            self.partial.clear();
            self.carry.clear();
            out.push(Decoded::Overflow { dropped });
        }

        out
    }

    fn accept_line(&mut self, line: &str, out: &mut Vec<Decoded>) {
        if self.carry.is_empty() {
            if line.trim().is_empty() {
                return;
            }
            self.parse_candidate(line.to_string(), out);
            return;
        }

        // A line that is a JSON-RPC message on its own starts fresh.
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) {
            if obj.contains_key("jsonrpc") {
                let stale = std::mem::take(&mut self.carry);
                out.push(Decoded::Discarded {
                    reason: format!("incomplete message superseded: {}", preview(&stale)),
                });
                out.push(classify(Value::Object(obj)));
                return;
            }
        }

        let mut candidate = std::mem::take(&mut self.carry);
        candidate.push('\n');
        candidate.push_str(line);

        if !self.parse_candidate(candidate, out) && self.carry.is_empty() && !line.trim().is_empty()
        {
            // The carried prefix was garbage; the new line may still stand alone.
            self.parse_candidate(line.to_string(), out);
        }
    }

    /// Returns false when the candidate was discarded as invalid JSON.
    fn parse_candidate(&mut self, candidate: String, out: &mut Vec<Decoded>) -> bool {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => {
                out.push(classify(value));
                true
            }
            Err(e) if e.is_eof() => {
                self.carry = candidate;
                true
            }
            Err(e) => {
                out.push(Decoded::Discarded {
                    reason: format!("invalid JSON ({e}): {}", preview(&candidate)),
                });
                false
            }
        }
    }
}

/// Serialize one message as a newline-terminated frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    Ok(frame)
}

fn classify(value: Value) -> Decoded {
    let Value::Object(mut obj) = value else {
        return discarded("not a JSON object");
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<RequestId>(raw) {
            Ok(id) => Some(id),
            Err(_) => return discarded("id is neither a number nor a string"),
        },
    };

    if let Some(method) = obj.get("method").and_then(Value::as_str).map(str::to_string) {
        let params = obj.remove("params");
        let message = match id {
            Some(id) => IncomingMessage::Request { id, method, params },
            None => IncomingMessage::Notification { method, params },
        };
        return Decoded::Message(message);
    }

    let Some(id) = id else {
        return discarded("message has neither method nor id");
    };

    match response_outcome(&mut obj) {
        Some(outcome) => Decoded::Message(IncomingMessage::Response { id, outcome }),
        None => discarded("response has neither result nor error"),
    }
}

fn response_outcome(obj: &mut Map<String, Value>) -> Option<Result<Value, RpcError>> {
    if let Some(error) = obj.remove("error").filter(|e| !e.is_null()) {
        let error = serde_json::from_value::<RpcError>(error.clone()).unwrap_or_else(|_| RpcError {
            code: crate::protocol::INTERNAL_ERROR,
            message: error.to_string(),
            data: None,
        });
        return Some(Err(error));
    }
    obj.remove("result").map(Ok)
}

fn discarded(reason: &str) -> Decoded {
    Decoded::Discarded {
        reason: reason.to_string(),
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages(items: Vec<Decoded>) -> Vec<IncomingMessage> {
        items
            .into_iter()
            .filter_map(|d| match d {
                Decoded::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    const STREAM: &str = concat!(
        r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#,
        "\r\n",
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"bad"}}"#,
        "\n",
    );

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let whole = messages(LineCodec::new().feed(STREAM.as_bytes()));
        assert_eq!(whole.len(), 3);

        for split in 1..STREAM.len() {
            let mut codec = LineCodec::new();
            let (a, b) = STREAM.as_bytes().split_at(split);
            let mut got = messages(codec.feed(a));
            got.extend(messages(codec.feed(b)));
            assert_eq!(got, whole, "split at {split}");
            assert_eq!(codec.buffered(), 0);
        }

        let mut codec = LineCodec::new();
        let mut got = Vec::new();
        for byte in STREAM.as_bytes() {
            got.extend(messages(codec.feed(std::slice::from_ref(byte))));
        }
        assert_eq!(got, whole);
    }

    #[test]
    fn test_large_message_in_small_chunks() {
        let text = "y".repeat(2 * 1024 * 1024);
        let mut stream = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "id": 5,
            "result": { "content": [{ "type": "text", "text": text }] }
        }))
        .unwrap();
        stream.extend_from_slice(b"\n{\"jsonrpc\":\"2.0\",\"id\":6,\"result\":null}\n");

        let mut codec = LineCodec::new();
        let mut got = Vec::new();
        for chunk in stream.chunks(4096) {
            got.extend(messages(codec.feed(chunk)));
        }
        assert_eq!(got.len(), 2);
        assert_eq!(codec.buffered(), 0);
    }

    #[test]
    fn test_classifies_messages() {
        let got = messages(LineCodec::new().feed(STREAM.as_bytes()));
        assert_eq!(
            got[0],
            IncomingMessage::Response {
                id: RequestId::Number(1),
                outcome: Ok(json!({"ok": true}))
            }
        );
        assert!(matches!(
            &got[1],
            IncomingMessage::Notification { method, .. } if method == "notifications/tools/list_changed"
        ));
        match &got[2] {
            IncomingMessage::Response { outcome: Err(e), .. } => {
                assert_eq!(e.code, -32602);
                assert_eq!(e.message, "bad");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_server_request_is_recognised() {
        let got = messages(
            LineCodec::new().feed(b"{\"jsonrpc\":\"2.0\",\"id\":\"s1\",\"method\":\"ping\"}\n"),
        );
        assert_eq!(
            got,
            vec![IncomingMessage::Request {
                id: RequestId::String("s1".into()),
                method: "ping".into(),
                params: None
            }]
        );
    }

    #[test]
    fn test_multi_line_json_is_carried_over() {
        let mut codec = LineCodec::new();
        assert!(codec.feed(b"{\"jsonrpc\":\"2.0\",\n\"id\":5,\n").is_empty());
        assert!(codec.buffered() > 0);
        let got = messages(codec.feed(b"\"result\":{}}\n"));
        assert_eq!(got.len(), 1);
        assert_eq!(codec.buffered(), 0);
    }

    #[test]
    fn test_garbage_line_is_discarded_without_blocking_next() {
        let mut codec = LineCodec::new();
        let out = codec.feed(b"Starting server on stdio...\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":1}\n");
        assert!(matches!(out[0], Decoded::Discarded { .. }));
        assert_eq!(messages(out).len(), 1);
    }

    #[test]
    fn test_non_rpc_json_is_discarded() {
        let out = LineCodec::new().feed(b"[1,2,3]\n{\"hello\":\"world\"}\n");
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| matches!(d, Decoded::Discarded { .. })));
    }

    #[test]
    fn test_carried_garbage_then_valid_line() {
        let mut codec = LineCodec::new();
        assert!(codec.feed(b"{\"unterminated\": \n").is_empty());
        let out = codec.feed(b"]\n");
        assert!(matches!(out[0], Decoded::Discarded { .. }));
        assert_eq!(codec.buffered(), 0);

        let out = codec.feed(b"{\"a\":\n");
        assert!(out.is_empty());
        let out = codec.feed(b"{\"jsonrpc\":\"2.0\",\"id\":9,\"result\":null}\n");
        assert_eq!(messages(out).len(), 1);
    }

    #[test]
    fn test_overflow_drops_partial_data() {
        let mut codec = LineCodec::with_max_buffer(16);
        let out = codec.feed(b"{\"this line never ends");
        assert_eq!(out, vec![Decoded::Overflow { dropped: 22 }]);
        assert_eq!(codec.buffered(), 0);

        let got = messages(codec.feed(b"{\"id\":1,\"result\":2}\n"));
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn test_encode_appends_newline() {
        let frame = encode(&json!({"jsonrpc": "2.0", "method": "x"})).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
    }
}
