//! Incremental decoding of `text/event-stream` chat-completion bodies.
//!
//! Network reads do not respect line or UTF-8 boundaries, so [`SseLineBuffer`]
//! keeps the trailing partial line (and any partial multi-byte sequence) until
//! the next read completes it. Only complete lines reach [`parse_line`].

use serde::Deserialize;

use super::LlmError;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseLineBuffer {
    text: String,
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw body bytes and drains every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        self.decode_pending();

        let mut lines = Vec::new();
        while let Some(pos) = self.text.find('\n') {
            let mut line: String = self.text.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Returns the unterminated last line once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.text.push_str(&String::from_utf8_lossy(&rest));
        }
        let mut line = std::mem::take(&mut self.text);
        if line.ends_with('\r') {
            line.pop();
        }
        if line.is_empty() { None } else { Some(line) }
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // Prefix up to `valid_up_to` is valid UTF-8.
                    self.text.push_str(
                        std::str::from_utf8(&self.pending[..valid_up_to]).unwrap_or_default()
                    );
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return;
                        }
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    /// A decoded frame that carried no text (role announcements, finish frames).
    Empty,
    Done,
}

#[derive(Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Decodes one complete line. Lines without a `data:` field yield `None`.
pub fn parse_line(line: &str) -> Result<Option<SseEvent>, LlmError> {
    let data = match line.strip_prefix("data:") {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => return Ok(None),
    };

    if data.trim() == DONE_SENTINEL {
        return Ok(Some(SseEvent::Done));
    }

    let frame: StreamFrame = serde_json
        ::from_str(data)
        .map_err(|e| LlmError::MalformedPayload(format!("{}: {}", e, data)))?;

    let content = frame.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());

    Ok(Some(match content {
        Some(text) => SseEvent::Delta(text),
        None => SseEvent::Empty,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": text } }] })
        )
    }

    #[test]
    fn keeps_partial_line_for_next_read() {
        let body = frame("Olá");
        let (head, tail) = body.split_at(17);
        let mut buffer = SseLineBuffer::new();

        assert!(buffer.push(head.as_bytes()).is_empty());
        let lines = buffer.push(tail.as_bytes());
        assert_eq!(lines.len(), 2);
        assert_eq!(parse_line(&lines[0]).unwrap(), Some(SseEvent::Delta("Olá".into())));
        assert_eq!(parse_line(&lines[1]).unwrap(), None);
    }

    #[test]
    fn rejoins_multibyte_characters_split_across_reads() {
        let body = frame("estratégia");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;
        let mut buffer = SseLineBuffer::new();

        assert!(buffer.push(&bytes[..split]).is_empty());
        let lines = buffer.push(&bytes[split..]);
        assert_eq!(parse_line(&lines[0]).unwrap(), Some(SseEvent::Delta("estratégia".into())));
    }

    #[test]
    fn strips_carriage_returns() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push(b"data: [DONE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert_eq!(parse_line(&lines[0]).unwrap(), Some(SseEvent::Done));
    }

    #[test]
    fn finish_returns_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn ignores_non_data_fields() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line(": keep-alive").unwrap(), None);
        assert_eq!(parse_line("event: message").unwrap(), None);
    }

    #[test]
    fn frames_without_text_are_empty() {
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        let finish = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let no_choices = r#"data: {"id":"x"}"#;
        assert_eq!(parse_line(role_only).unwrap(), Some(SseEvent::Empty));
        assert_eq!(parse_line(finish).unwrap(), Some(SseEvent::Empty));
        assert_eq!(parse_line(no_choices).unwrap(), Some(SseEvent::Empty));
    }

    #[test]
    fn accepts_data_field_without_space() {
        let line = r#"data:{"choices":[{"delta":{"content":"x"}}]}"#;
        assert_eq!(parse_line(line).unwrap(), Some(SseEvent::Delta("x".into())));
    }

    #[test]
    fn complete_line_with_bad_json_is_malformed() {
        let err = parse_line(r#"data: {"choices": [{"delta""#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedPayload(_)));
    }
}
