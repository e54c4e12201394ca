use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ProtocolError};

// ════════════════════════════════════════════════════════════════
//  Query model
// ════════════════════════════════════════════════════════════════

/// Comparison applied to an index. `keys` lists distinct index values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOp {
    Keys,
    Eq,
    Ne,
    Re,
    Nr,
    Ge,
    Le,
}

impl QueryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryOp::Keys => "keys",
            QueryOp::Eq => "eq",
            QueryOp::Ne => "ne",
            QueryOp::Re => "re",
            QueryOp::Nr => "nr",
            QueryOp::Ge => "ge",
            QueryOp::Le => "le",
        }
    }
}

impl std::fmt::Display for QueryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryOp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keys" => Ok(QueryOp::Keys),
            "eq" => Ok(QueryOp::Eq),
            "ne" => Ok(QueryOp::Ne),
            "re" => Ok(QueryOp::Re),
            "nr" => Ok(QueryOp::Nr),
            "ge" => Ok(QueryOp::Ge),
            "le" => Ok(QueryOp::Le),
            other => Err(ConfigError::UnknownOp(other.to_string())),
        }
    }
}

/// Index field name as the query service spells it: `<topic>.<index>:index`.
pub fn index_field(topic: &str, index: &str) -> String {
    format!("{topic}.{index}:index")
}

/// One `{field, op, key}` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClause {
    pub field: String,
    pub op: QueryOp,
    #[serde(default)]
    pub key: String,
}

impl QueryClause {
    pub fn new(field: impl Into<String>, op: QueryOp, key: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            key: key.into(),
        }
    }
}

/// `FIELD,OP[,KEY]`. The key keeps any further commas.
impl FromStr for QueryClause {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ',');
        let field = parts.next().unwrap_or_default().trim();
        let op = parts
            .next()
            .ok_or_else(|| ConfigError::BadClause(s.to_string()))?;
        if field.is_empty() {
            return Err(ConfigError::BadClause(s.to_string()));
        }
        let op: QueryOp = op.parse()?;
        let key = parts.next().unwrap_or_default();
        Ok(QueryClause::new(field, op, key))
    }
}

/// Whether a query lists index values or returns matching records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Keys,
    Filter,
}

/// Body of a query POST: one clause as an object, several as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryRequest {
    Single(QueryClause),
    Compound(Vec<QueryClause>),
}

impl QueryRequest {
    /// `eq` lookup when a key is given, `keys` listing otherwise.
    pub fn lookup(field: impl Into<String>, key: Option<&str>) -> Self {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => QueryRequest::Single(QueryClause::new(field, QueryOp::Eq, key)),
            None => QueryRequest::Single(QueryClause::new(field, QueryOp::Keys, "")),
        }
    }

    pub fn compound(mut clauses: Vec<QueryClause>) -> Result<Self, ConfigError> {
        match clauses.len() {
            0 => Err(ConfigError::EmptyQuery),
            1 => Ok(QueryRequest::Single(clauses.remove(0))),
            _ => Ok(QueryRequest::Compound(clauses)),
        }
    }

    pub fn clauses(&self) -> &[QueryClause] {
        match self {
            QueryRequest::Single(clause) => std::slice::from_ref(clause),
            QueryRequest::Compound(clauses) => clauses,
        }
    }

    /// Decided by the first clause.
    pub fn mode(&self) -> QueryMode {
        match self.clauses().first() {
            Some(clause) if clause.op == QueryOp::Keys => QueryMode::Keys,
            _ => QueryMode::Filter,
        }
    }

    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ════════════════════════════════════════════════════════════════
//  Query results
// ════════════════════════════════════════════════════════════════

/// Event type carried in `value.type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    TaskBegin,
    TaskOutput,
    TaskError,
    TaskComplete,
    MsgCanceled,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::TaskBegin => "TASK_BEGIN",
            EventKind::TaskOutput => "TASK_OUTPUT",
            EventKind::TaskError => "TASK_ERROR",
            EventKind::TaskComplete => "TASK_COMPLETE",
            EventKind::MsgCanceled => "MSG_CANCELED",
            EventKind::Other(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "TASK_BEGIN" => EventKind::TaskBegin,
            "TASK_OUTPUT" => EventKind::TaskOutput,
            "TASK_ERROR" => EventKind::TaskError,
            "TASK_COMPLETE" => EventKind::TaskComplete,
            "MSG_CANCELED" => EventKind::MsgCanceled,
            _ => EventKind::Other(s),
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        EventKind::from(s.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `value` half of a query record. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventValue {
    /// Epoch seconds.
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Accept integer or fractional epoch seconds.
fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("timestamp: {e}"))),
        _ => Err(serde::de::Error::custom("timestamp must be a number")),
    }
}

/// One `{key, value}` row of a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub key: String,
    pub value: EventValue,
}

impl QueryRecord {
    pub fn timestamp(&self) -> i64 {
        self.value.timestamp
    }

    pub fn kind(&self) -> &EventKind {
        &self.value.kind
    }

    /// Text to show for the record: `payload`, else `value`, else empty.
    pub fn text(&self) -> String {
        match self.value.payload.as_ref().or(self.value.value.as_ref()) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Validated query response.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    /// Empty body, `[]`, or a null first element.
    Empty,
    /// Distinct index values (keys mode).
    Keys(Vec<String>),
    /// Matching records in wire order, with an optional continuation.
    Records {
        records: Vec<QueryRecord>,
        next_url: Option<String>,
    },
    /// `[{"error": "..."}]`.
    ServerError(String),
}

impl QueryResponse {
    /// Accepts the plain array form and the paged envelope
    /// `{"payload": [...], "next_url": "..."}`.
    pub fn parse(body: &str, mode: QueryMode) -> Result<Self, ProtocolError> {
        if body.trim().is_empty() {
            return Ok(QueryResponse::Empty);
        }
        match serde_json::from_str::<Value>(body)? {
            Value::Array(items) => Self::from_items(items, None, mode),
            Value::Object(mut map) if map.contains_key("payload") => {
                let next_url = match map.remove("next_url") {
                    Some(Value::String(s)) if !s.is_empty() => Some(s),
                    _ => None,
                };
                match map.remove("payload") {
                    Some(Value::Array(items)) => Self::from_items(items, next_url, mode),
                    Some(Value::Null) | None => Ok(QueryResponse::Empty),
                    Some(_) => Err(ProtocolError::Shape("payload is not an array".into())),
                }
            }
            other => Err(ProtocolError::Shape(format!(
                "expected an array, got {}",
                value_kind(&other)
            ))),
        }
    }

    fn from_items(
        items: Vec<Value>,
        next_url: Option<String>,
        mode: QueryMode,
    ) -> Result<Self, ProtocolError> {
        let first = match items.first() {
            None | Some(Value::Null) | Some(Value::Bool(false)) => return Ok(QueryResponse::Empty),
            Some(first) => first,
        };

        if let Some(err) = first.get("error") {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(QueryResponse::ServerError(message));
        }

        match mode {
            QueryMode::Keys => match first {
                Value::Object(map) => Ok(QueryResponse::Keys(map.keys().cloned().collect())),
                other => Err(ProtocolError::Shape(format!(
                    "keys listing must be an object, got {}",
                    value_kind(other)
                ))),
            },
            QueryMode::Filter => {
                let records: Vec<QueryRecord> = serde_json::from_value(Value::Array(items))?;
                Ok(QueryResponse::Records { records, next_url })
            }
        }
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
