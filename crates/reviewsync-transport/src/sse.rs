use reviewsync_protocol::{LiveEvent, SyncError};

/// Incremental decoder for `text/event-stream` bytes.
///
/// Collects `data:` lines until the blank line that terminates a frame and
/// yields the joined payload. Comment lines and the `event:`/`id:`/`retry:`
/// fields the backend never uses are skipped.
#[derive(Debug, Default)]
pub(crate) struct SseFrameDecoder {
    line_buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameDecoder {
    /// Feed one chunk from the byte stream; returns every payload whose
    /// terminating blank line arrived inside this chunk.
    pub(crate) fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.line_buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.line_buffer.drain(..=newline_index).collect::<Vec<_>>();
            if matches!(line.last(), Some(b'\n')) {
                line.pop();
            }
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }

            if line.is_empty() {
                if let Some(payload) = self.take_frame() {
                    payloads.push(payload);
                }
                continue;
            }

            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(data) = line.strip_prefix("data:") {
                self.data_lines.push(data.strip_prefix(' ').unwrap_or(data).to_owned());
            }
        }
        payloads
    }

    /// Flush a frame left unterminated when the stream ends.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.line_buffer.is_empty() {
            let trailing = std::mem::take(&mut self.line_buffer);
            let trailing = String::from_utf8_lossy(&trailing);
            if let Some(data) = trailing.strip_prefix("data:") {
                self.data_lines
                    .push(data.strip_prefix(' ').unwrap_or(data).to_owned());
            }
        }
        self.take_frame()
    }

    fn take_frame(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data_lines).join("\n"))
    }
}

/// Decode one frame payload into the closed event union.
pub(crate) fn parse_event_frame(payload: &str) -> Result<LiveEvent, SyncError> {
    serde_json::from_str(payload)
        .map_err(|error| SyncError::MalformedEvent(format!("{error}: {payload}")))
}

#[cfg(test)]
mod tests {
    use reviewsync_protocol::LiveEvent;

    use super::{parse_event_frame, SseFrameDecoder};

    #[test]
    fn single_frame_decodes_in_one_chunk() {
        let mut decoder = SseFrameDecoder::default();
        let payloads = decoder.push_chunk(b"data: {\"type\": \"heartbeat\"}\n\n");
        assert_eq!(payloads, vec!["{\"type\": \"heartbeat\"}".to_owned()]);
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut decoder = SseFrameDecoder::default();
        assert!(decoder.push_chunk(b"data: {\"type\": \"heart").is_empty());
        assert!(decoder.push_chunk(b"beat\"}\r\n").is_empty());
        let payloads = decoder.push_chunk(b"\n");
        assert_eq!(payloads, vec!["{\"type\": \"heartbeat\"}".to_owned()]);
    }

    #[test]
    fn multiple_frames_in_one_chunk_all_decode() {
        let mut decoder = SseFrameDecoder::default();
        let payloads = decoder.push_chunk(b"data: one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn comment_and_non_data_fields_are_skipped() {
        let mut decoder = SseFrameDecoder::default();
        let payloads = decoder.push_chunk(b": keepalive\nid: 7\nretry: 3000\ndata: payload\n\n");
        assert_eq!(payloads, vec!["payload".to_owned()]);
    }

    #[test]
    fn finish_flushes_an_unterminated_frame() {
        let mut decoder = SseFrameDecoder::default();
        assert!(decoder.push_chunk(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_owned()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn valid_frames_parse_and_malformed_frames_error() {
        let event = parse_event_frame(
            r#"{"type": "connected", "review_id": "rev-1", "timestamp": "2025-06-01T12:00:00"}"#,
        )
        .expect("parse connected");
        assert!(matches!(event, LiveEvent::Connected(_)));

        assert!(parse_event_frame("not json").is_err());
        assert!(parse_event_frame(r#"{"type": "mystery_event"}"#).is_err());
    }
}
