use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  RecordBatch
// ════════════════════════════════════════════════════════════════

/// Lines delivered by one transport event, in log order.
///
/// `next_url` is the continuation the polling endpoint returned with the
/// batch. `resume_offset` is where reading continues after this batch, when
/// the transport can tell (continuation URL path, SSE `id:` field).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    pub lines: Vec<String>,
    pub next_url: Option<String>,
    pub resume_offset: Option<i64>,
}

impl RecordBatch {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    /// Build from a polling payload. Each entry loses one trailing line break.
    pub fn from_payload(payload: Vec<String>) -> Self {
        let lines = payload
            .into_iter()
            .map(|mut line| {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                line
            })
            .collect();
        Self::new(lines)
    }

    pub fn with_next_url(mut self, next_url: impl Into<String>) -> Self {
        self.next_url = Some(next_url.into());
        self
    }

    pub fn with_resume_offset(mut self, offset: Option<i64>) -> Self {
        self.resume_offset = offset;
        self
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════
//  PollResponse: wire format of the polling endpoint
// ════════════════════════════════════════════════════════════════

/// `{"payload": [...], "next_url": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub payload: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
}

impl PollResponse {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_lines_drop_one_trailing_newline() {
        let batch = RecordBatch::from_payload(vec![
            "a\n".into(),
            "b\r\n".into(),
            "c".into(),
            "d\n\n".into(),
        ]);
        assert_eq!(batch.lines, vec!["a", "b", "c", "d\n"]);
    }

    #[test]
    fn poll_response_tolerates_missing_fields() {
        let r = PollResponse::parse(br#"{}"#).unwrap();
        assert!(r.payload.is_empty());
        assert!(r.next_url.is_none());

        let r = PollResponse::parse(br#"{"payload":["x"],"next_url":"http://h/t/logs/4/3"}"#).unwrap();
        assert_eq!(r.payload, vec!["x"]);
        assert_eq!(r.next_url.as_deref(), Some("http://h/t/logs/4/3"));

        assert!(PollResponse::parse(b"not json").is_err());
    }
}
