//! Task record and its persisted representation.
//!
//! # Responsibility
//! - Define the to-do record owned by one identity.
//! - Define the textual timestamp format used in persisted task lists.
//!
//! # Invariants
//! - `title` is trimmed and never blank once validated.
//! - `owner` equals the email of the identity the task is stored under.
//! - Timestamps survive encode/decode unchanged because they are kept at
//!   millisecond precision.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Task identifier, unique within one owner's collection.
///
/// Generated from the creation instant in epoch milliseconds.
pub type TaskId = String;

/// Task urgency. Serialized as `Low`, `Medium`, `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Parses a label case-insensitively (`low`, `Medium`, `HIGH`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Validation failures for task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankId,
    BlankTitle,
    BlankOwner,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "task id cannot be blank"),
            Self::BlankTitle => write!(f, "task title cannot be blank"),
            Self::BlankOwner => write!(f, "task owner cannot be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// One to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp_format")]
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    /// Owner email. Serialized as `userEmail`.
    #[serde(rename = "userEmail")]
    pub owner: String,
}

impl Task {
    /// Creates an open `Medium` task whose creation time and deadline are `now`.
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            created_at: now,
            deadline: now,
            priority: Priority::default(),
            completed: false,
            owner: owner.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.trim().is_empty() {
            return Err(TaskValidationError::BlankId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if self.owner.trim().is_empty() {
            return Err(TaskValidationError::BlankOwner);
        }
        Ok(())
    }

    /// Whether the deadline has passed for an open task.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.deadline < now
    }
}

/// Applies the interactive deadline policy: past instants become `now`.
pub fn clamp_deadline(selected: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if selected < now {
        now
    } else {
        selected
    }
}

/// RFC 3339 UTC with `Z` suffix, e.g. `2024-05-01T09:30:00.123Z`.
///
/// Millisecond-aligned instants always carry exactly three fraction digits.
/// Finer instants keep their micro- or nanosecond digits so decoding returns
/// the same value.
pub mod timestamp_format {
    use chrono::{DateTime, SecondsFormat, Timelike, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(value: &DateTime<Utc>) -> String {
        let format = if value.nanosecond() % 1_000_000 == 0 {
            SecondsFormat::Millis
        } else {
            SecondsFormat::AutoSi
        };
        value.to_rfc3339_opts(format, true)
    }

    /// Accepts any RFC 3339 offset and normalizes to UTC.
    pub fn decode(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value.trim()).map(|parsed| parsed.with_timezone(&Utc))
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        decode(&raw).map_err(|err| {
            serde::de::Error::custom(format!("invalid timestamp `{raw}`: {err}"))
        })
    }
}
