/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// Event name; unnamed events are `message`.
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental parser for `text/event-stream` bodies.
///
/// Bytes are buffered until a blank line closes a frame, so chunk
/// boundaries may fall anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Last byte fed was CR; an LF right after it belongs to the same break.
    after_cr: bool,
}

impl SseParser {
    /// Feed arbitrary bytes and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        // CRLF, lone CR and LF all end a line.
        for &b in bytes {
            match b {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(b);
                    self.after_cr = false;
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(split) = find_blank_line(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..split + 2).collect();
            let text = String::from_utf8_lossy(&raw[..split]);
            if let Some(frame) = parse_frame(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "data" => data.push(value),
            "event" if !value.is_empty() => frame.event = Some(value.to_string()),
            "id" => frame.id = Some(value.to_string()),
            // retry: the session owns reconnect timing
            _ => {}
        }
    }

    if data.is_empty() && frame.event.is_none() {
        return None;
    }
    frame.data = data.join("\n");
    Some(frame)
}
