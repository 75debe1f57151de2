//! SSE (Server-Sent Events) decoding for chat-completion streams
//!
//! Upstream bytes arrive in arbitrary chunks; the decoder buffers partial
//! lines and yields complete `data:` frames.

use serde::de::DeserializeOwned;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Cap on buffered bytes without a newline, so a malformed stream can't grow it forever
    const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Push a chunk of bytes and extract every complete frame.
    ///
    /// Bytes are buffered until a newline, so multi-byte UTF-8 sequences
    /// split across chunks decode correctly.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                frames.push(SseFrame {
                    data: data.trim_start().to_string(),
                });
            }
            // event:, id:, retry: carry nothing chat completions need
        }

        if self.buffer.len() > Self::MAX_BUFFER_SIZE {
            tracing::warn!(
                "SSE buffer exceeded {}KB without a line break, discarding",
                Self::MAX_BUFFER_SIZE / 1024
            );
            self.buffer.clear();
        }

        frames
    }

    #[cfg(test)]
    fn push_str(&mut self, s: &str) -> Vec<SseFrame> {
        self.push(s.as_bytes())
    }

    /// Flush a trailing line that arrived without a newline at end of stream.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.push(b"\n")
    }

    #[cfg(test)]
    fn has_remaining(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// A complete SSE `data:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub data: String,
}

impl SseFrame {
    /// `[DONE]` sentinel that ends OpenAI-style streams
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }

    pub fn try_parse<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.data).ok()
    }

    /// First 200 chars, for log lines
    pub fn preview(&self) -> String {
        if self.data.chars().count() > 200 {
            let head: String = self.data.chars().take(200).collect();
            format!("{head}...")
        } else {
            self.data.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_decode() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_str("data: {\"text\": \"hello\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"text\": \"hello\"}");
    }

    #[test]
    fn test_done_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_str("data: [DONE]\n");
        assert!(frames[0].is_done());
    }

    #[test]
    fn test_partial_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push_str("data: {\"part\":").is_empty());
        assert!(decoder.has_remaining());

        let frames = decoder.push_str(" 1}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"part\": 1}");
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: §1983\n".as_bytes();
        // '§' is two bytes; split between them
        let split = "data: ".len() + 1;

        assert!(decoder.push(&bytes[..split]).is_empty());
        let frames = decoder.push(&bytes[split..]);
        assert_eq!(frames[0].data, "§1983");
    }

    #[test]
    fn test_comments_and_events_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_str(": keep-alive\nevent: message\ndata: content\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "content");
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push_str("data: [DONE]").is_empty());
        let frames = decoder.finish();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_done());
        assert!(decoder.finish().is_empty());
    }
}
