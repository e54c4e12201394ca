use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Offset sentinel: let the server pick the starting position.
pub const SERVER_DEFAULT_OFFSET: i64 = -1;

/// Page size and window capacity used when nothing else is configured.
pub const DEFAULT_COUNT: usize = 100;

// ════════════════════════════════════════════════════════════════
//  Cursor
// ════════════════════════════════════════════════════════════════

/// Resumable read position in a topic log: `(topic, offset, count)`.
///
/// Immutable once built. Moving forward produces a new cursor through
/// [`Cursor::advanced_to`], which refuses to go backwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Cursor {
    topic: String,
    offset: i64,
    count: usize,
}

impl Cursor {
    pub fn new(topic: impl Into<String>, offset: i64, count: usize) -> Result<Self, ConfigError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(ConfigError::NoTopic);
        }
        if topic.contains('/') {
            return Err(ConfigError::InvalidTopic(topic));
        }
        if offset < SERVER_DEFAULT_OFFSET {
            return Err(ConfigError::InvalidOffset(offset));
        }
        if count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        Ok(Self { topic, offset, count })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// True when the server chooses where reading starts.
    pub fn is_server_default(&self) -> bool {
        self.offset == SERVER_DEFAULT_OFFSET
    }

    /// Cursor at `offset`, or `None` when that would not move forward.
    pub fn advanced_to(&self, offset: i64) -> Option<Cursor> {
        if offset <= self.offset {
            return None;
        }
        Some(Cursor {
            topic: self.topic.clone(),
            offset,
            count: self.count,
        })
    }

    /// Same topic and page size; offsets may differ.
    pub fn same_stream(&self, other: &Cursor) -> bool {
        self.topic == other.topic && self.count == other.count
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.topic, self.offset, self.count)
    }
}

// ════════════════════════════════════════════════════════════════
//  CursorRequest: caller-supplied, possibly partial
// ════════════════════════════════════════════════════════════════

/// Partially specified cursor. Missing fields fall back to defaults
/// (another request, then the built-in constants) before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CursorRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl CursorRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: &CursorRequest) -> CursorRequest {
        CursorRequest {
            topic: self.topic.or_else(|| defaults.topic.clone()),
            offset: self.offset.or(defaults.offset),
            count: self.count.or(defaults.count),
        }
    }

    /// Window capacity this request will produce, even if it turns out invalid.
    pub fn effective_count(&self) -> usize {
        self.count.unwrap_or(DEFAULT_COUNT).max(1)
    }

    pub fn resolve(&self) -> Result<Cursor, ConfigError> {
        Cursor::new(
            self.topic.clone().unwrap_or_default(),
            self.offset.unwrap_or(SERVER_DEFAULT_OFFSET),
            self.count.unwrap_or(DEFAULT_COUNT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_and_blank_topic() {
        assert_eq!(CursorRequest::default().resolve(), Err(ConfigError::NoTopic));
        assert_eq!(Cursor::new("  ", 0, 1), Err(ConfigError::NoTopic));
    }

    #[test]
    fn rejects_bad_offset_and_count() {
        assert_eq!(Cursor::new("logs", -2, 1), Err(ConfigError::InvalidOffset(-2)));
        assert_eq!(Cursor::new("logs", 0, 0), Err(ConfigError::ZeroCount));
        assert!(matches!(Cursor::new("a/b", 0, 1), Err(ConfigError::InvalidTopic(_))));
    }

    #[test]
    fn advance_never_regresses() {
        let c = Cursor::new("logs", 10, 5).unwrap();
        assert!(c.advanced_to(10).is_none());
        assert!(c.advanced_to(3).is_none());
        let next = c.advanced_to(12).unwrap();
        assert_eq!(next.offset(), 12);
        assert_eq!(next.count(), 5);
        assert_eq!(c.offset(), 10);
        assert!(c.same_stream(&next));
    }

    #[test]
    fn request_falls_back_to_defaults() {
        let defaults = CursorRequest::new("logs").offset(0).count(3);
        let merged = CursorRequest::default().count(7).or(&defaults);
        let cursor = merged.resolve().unwrap();
        assert_eq!(cursor.topic(), "logs");
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.count(), 7);

        let bare = CursorRequest::new("logs").resolve().unwrap();
        assert!(bare.is_server_default());
        assert_eq!(bare.count(), DEFAULT_COUNT);
    }
}
