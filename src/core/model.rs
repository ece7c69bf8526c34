// LogTrail - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies. These types are the shared vocabulary across
// all layers.

use crate::util::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Raw message (output of segmentation)
// =============================================================================

/// One logical unit of input: the line that started the message plus any
/// continuation lines collected before the next start line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    /// Line that matched the start-of-message pattern.
    pub head: String,

    /// Continuation lines, in file order.
    pub extras: Vec<String>,
}

impl RawMessage {
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            extras: Vec::new(),
        }
    }

    /// Whether any continuation lines were folded into this message.
    pub fn has_extras(&self) -> bool {
        !self.extras.is_empty()
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// A value stored in an entry's metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Time(DateTime<Utc>),
    Text(String),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

/// Metadata attached to an entry. Keys are unique; ordering is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

// =============================================================================
// Log Entry (normalised output of decoding)
// =============================================================================

/// A single decoded log event.
///
/// Built by the field mapper, mutated only while it is being built (and by the
/// classifier downstream of the sink), then handed on as an owned value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Free-text classification such as "DEBUG" or "ERROR".
    #[serde(rename = "Type")]
    pub entry_type: String,

    /// Timestamp of the logged event, in UTC.
    #[serde(rename = "DateTime")]
    pub date_time: DateTime<Utc>,

    /// Message body. Multi-line messages are newline-joined.
    #[serde(rename = "Description")]
    pub description: String,

    /// Logger or component that produced the event.
    #[serde(rename = "Source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Machine or subsystem the event came from.
    #[serde(rename = "System", skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Thread identifier.
    #[serde(rename = "Thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,

    /// Anything that does not fit the fields above.
    #[serde(rename = "Metadata", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl LogEntry {
    /// Blank entry stamped with `now`, ready for the field mapper.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entry_type: constants::DEFAULT_ENTRY_TYPE.to_string(),
            date_time: now,
            description: String::new(),
            source: None,
            system: None,
            thread: None,
            metadata: Metadata::new(),
        }
    }

    /// Whether the exception heuristic flagged this entry.
    pub fn has_exception(&self) -> bool {
        self.metadata
            .get(constants::META_EXCEPTION)
            .and_then(MetadataValue::as_flag)
            .unwrap_or(false)
    }

    /// Text of the field a classifier rule looks at.
    ///
    /// Fields that are unset, and the fields with no textual target
    /// (`None`, `Host`, `Classification`), read as the empty string.
    pub fn field_text(&self, field: LogEntryField) -> &str {
        match field {
            LogEntryField::Type => &self.entry_type,
            LogEntryField::System => self.system.as_deref().unwrap_or(""),
            LogEntryField::Thread => self.thread.as_deref().unwrap_or(""),
            LogEntryField::Source => self.source.as_deref().unwrap_or(""),
            LogEntryField::Description => &self.description,
            LogEntryField::None | LogEntryField::Host | LogEntryField::Classification => "",
        }
    }
}

// =============================================================================
// Entry fields (classifier targets)
// =============================================================================

/// Entry field a classifier rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogEntryField {
    #[default]
    None,
    Type,
    System,
    Thread,
    Source,
    Description,
    Host,
    Classification,
}

impl LogEntryField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Type => "Type",
            Self::System => "System",
            Self::Thread => "Thread",
            Self::Source => "Source",
            Self::Description => "Description",
            Self::Host => "Host",
            Self::Classification => "Classification",
        }
    }
}

impl std::fmt::Display for LogEntryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Multiline mode
// =============================================================================

/// How lines that do not match the start-of-message pattern are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MultilineMode {
    /// Fold non-matching lines into the preceding message.
    #[default]
    Continuation,

    /// Decode each line on its own; non-matching lines are skipped.
    Individual,
}

impl std::str::FromStr for MultilineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continuation" | "append" => Ok(Self::Continuation),
            "individual" => Ok(Self::Individual),
            other => Err(format!(
                "unknown multiline mode '{other}' (expected 'continuation' or 'individual')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_defaults() {
        let now = Utc::now();
        let entry = LogEntry::new(now);
        assert_eq!(entry.entry_type, "INFO");
        assert_eq!(entry.date_time, now);
        assert!(entry.metadata.is_empty());
        assert!(!entry.has_exception());
    }

    #[test]
    fn test_field_text_for_unset_fields_is_empty() {
        let mut entry = LogEntry::new(Utc::now());
        entry.description = "boom".to_string();
        assert_eq!(entry.field_text(LogEntryField::Description), "boom");
        assert_eq!(entry.field_text(LogEntryField::Thread), "");
        assert_eq!(entry.field_text(LogEntryField::Host), "");
    }

    #[test]
    fn test_entry_serialises_with_field_names() {
        let mut entry = LogEntry::new(Utc::now());
        entry.description = "hello".to_string();
        entry
            .metadata
            .insert("Exception".to_string(), MetadataValue::Flag(true));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"Type\":\"INFO\""));
        assert!(json.contains("\"Description\":\"hello\""));
        assert!(json.contains("\"Exception\":true"));
        assert!(!json.contains("\"Thread\""));
    }

    #[test]
    fn test_multiline_mode_from_str() {
        assert_eq!(
            "Individual".parse::<MultilineMode>().unwrap(),
            MultilineMode::Individual
        );
        assert!("sideways".parse::<MultilineMode>().is_err());
    }
}
