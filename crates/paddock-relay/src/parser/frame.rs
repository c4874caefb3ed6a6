/// One meaningful line of an SSE body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Payload of a `data:` line
    Data(String),
    /// Line that is neither data nor a known SSE field
    Invalid(String),
}

/// Byte-level line buffer
///
/// Bytes are held until a `\n` arrives and only then decoded, so a
/// multi-byte character split across network chunks survives intact.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Append a chunk and return every line it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            lines.extend(classify(&raw[..end]));
        }
        lines
    }

    /// Treat whatever is left as a final unterminated line
    pub fn finish(&mut self) -> Option<SseLine> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        classify(&raw)
    }
}

fn classify(raw: &[u8]) -> Option<SseLine> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    let Ok(line) = std::str::from_utf8(raw) else {
        return Some(SseLine::Invalid(String::from_utf8_lossy(raw).into_owned()));
    };

    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(payload) = line.strip_prefix("data:") {
        // One optional space after the colon belongs to the framing
        let payload = payload.strip_prefix(' ').unwrap_or(payload);
        return Some(SseLine::Data(payload.to_owned()));
    }

    if ["event:", "id:", "retry:"].iter().any(|field| line.starts_with(field)) {
        return None;
    }

    Some(SseLine::Invalid(line.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_across_chunks() {
        let mut framer = LineFramer::default();
        assert!(framer.feed(b"data: {\"a\"").is_empty());
        assert_eq!(framer.feed(b":1}\r\n\r\ndata: [DONE]\n"), vec![
            SseLine::Data("{\"a\":1}".to_owned()),
            SseLine::Data("[DONE]".to_owned()),
        ]);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn sse_fields_and_comments_are_skipped() {
        let mut framer = LineFramer::default();
        let lines = framer.feed(b": ping\nevent: message_stop\nid: 7\nretry: 100\n\ndata:{}\n");
        assert_eq!(lines, vec![SseLine::Data("{}".to_owned())]);
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let text = "data: héllo 🦀\n".as_bytes();
        let crab = text.len() - 3;

        let mut framer = LineFramer::default();
        assert!(framer.feed(&text[..crab]).is_empty());
        assert_eq!(framer.feed(&text[crab..]), vec![SseLine::Data("héllo 🦀".to_owned())]);
    }

    #[test]
    fn leftover_bytes_form_a_last_line() {
        let mut framer = LineFramer::default();
        assert!(framer.feed(b"data: tail").is_empty());
        assert_eq!(framer.finish(), Some(SseLine::Data("tail".to_owned())));
    }

    #[test]
    fn garbage_is_reported() {
        let mut framer = LineFramer::default();
        assert_eq!(framer.feed(b"<html>\n"), vec![SseLine::Invalid("<html>".to_owned())]);
        assert!(matches!(framer.feed(&[0xff, 0xfe, b'\n'])[0], SseLine::Invalid(_)));
    }
}
