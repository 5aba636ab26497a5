use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::agents::AgentId;

/// Lifecycle events broadcast by the orchestrator over `/ws/events`.
///
/// The recognized set is closed, but the stream is append-only and the
/// backend may grow it; unrecognized kinds are preserved verbatim so they
/// still show up in the raw event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentStart,
    AgentEnd,
    Token,
    CodeWritten,
    FileCreated,
    Execution,
    ExecutionStep,
    Error,
    Complete,
    PlanCreated,
    WorkspaceReset,
    Retry,
    CodeReviewed,
    #[serde(untagged)]
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AgentStart => "agent_start",
            Self::AgentEnd => "agent_end",
            Self::Token => "token",
            Self::CodeWritten => "code_written",
            Self::FileCreated => "file_created",
            Self::Execution => "execution",
            Self::ExecutionStep => "execution_step",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::PlanCreated => "plan_created",
            Self::WorkspaceReset => "workspace_reset",
            Self::Retry => "retry",
            Self::CodeReviewed => "code_reviewed",
            Self::Other(kind) => kind.as_str(),
        }
    }

    /// True for kinds outside the recognized set; the reducer skips them.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds since the Unix epoch. The backend emits a float, but RFC 3339
/// strings from older builds are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EventTimestamp(pub f64);

impl Serialize for EventTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for EventTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EventTimestampVisitor;

        impl<'de> Visitor<'de> for EventTimestampVisitor {
            type Value = EventTimestamp;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an epoch timestamp as number or RFC 3339 string")
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(EventTimestamp(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(EventTimestamp(value as f64))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(EventTimestamp(value as f64))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
                    let millis = parsed.timestamp_millis() as f64;
                    return Ok(EventTimestamp(millis / 1000.0));
                }
                let seconds = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|err| E::custom(format!("invalid timestamp '{value}': {err}")))?;
                Ok(EventTimestamp(seconds))
            }
        }

        deserializer.deserialize_any(EventTimestampVisitor)
    }
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One lifecycle notification from the event stream. Immutable once
/// received; `data` carries the kind-specific payload as loose JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub agent: String,
    #[serde(default)]
    pub timestamp: Option<EventTimestamp>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl AgentEvent {
    pub fn parse(text: &str) -> Result<Self, EventParseError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The roster slot this event addresses, if the agent id is known.
    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent.parse().ok()
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }
}
