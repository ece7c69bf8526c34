// LogTrail - core/mapper.rs
//
// Builds a `LogEntry` from a matched message.
//
// The mapping table is derived once from the compiled pattern: one entry per
// field the pattern captures (Description is always mapped so a pattern
// without a Description group still yields the message text), plus the fixed
// metadata mappings. The table is immutable afterwards and shared between
// threads.
//
// Logger is the entry's source. It also stands in for System when the pattern
// has no System group; fields are applied in `FieldName` order, so a System
// capture written later always wins.

use crate::core::datetime::parse_date_time;
use crate::core::model::{LogEntry, Metadata, MetadataValue, RawMessage};
use crate::core::pattern::{CompiledPattern, FieldCaptures, FieldName};
use crate::util::constants;
use chrono::{DateTime, Utc};

/// Writes one captured value into an entry.
pub type EntryWriter = fn(Option<&str>, &mut LogEntry, &RawMessage);

/// Writes one metadata value. Receives the key, the value and the decode time.
pub type MetadataWriter = fn(&str, Option<&str>, &mut Metadata, DateTime<Utc>);

/// Capture group to entry field.
#[derive(Clone, Copy)]
pub struct FieldMapping {
    pub field: FieldName,
    /// Used when the pattern has no group for `field`.
    pub default: Option<&'static str>,
    pub write: EntryWriter,
}

/// Source of a metadata value.
#[derive(Clone)]
pub struct MetadataMapping {
    pub key: &'static str,
    pub field: Option<FieldName>,
    pub default: Option<String>,
    pub write: MetadataWriter,
}

/// Immutable field-mapping table for one pattern.
#[derive(Clone)]
pub struct FieldMapper {
    fields: Vec<FieldMapping>,
    metadata: Vec<MetadataMapping>,
}

impl std::fmt::Debug for FieldMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMapper")
            .field(
                "fields",
                &self.fields.iter().map(|m| m.field).collect::<Vec<_>>(),
            )
            .field(
                "metadata",
                &self.metadata.iter().map(|m| m.key).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl FieldMapper {
    /// Build the mapping table for `pattern`. `host` is the monitored file's
    /// name, recorded on every entry.
    pub fn for_pattern(pattern: &CompiledPattern, host: &str) -> Self {
        let fields = FieldName::ALL
            .iter()
            .filter(|f| **f == FieldName::Description || pattern.uses(**f))
            .map(|f| field_mapping(*f))
            .collect();

        let metadata = vec![
            MetadataMapping {
                key: constants::META_CLASSIFICATION,
                field: None,
                default: Some(String::new()),
                write: write_text_metadata,
            },
            MetadataMapping {
                key: constants::META_HOST,
                field: None,
                default: Some(host.to_string()),
                write: write_text_metadata,
            },
            MetadataMapping {
                key: constants::META_RECEIVED_TIME,
                field: None,
                default: None,
                write: write_received_time,
            },
        ];

        Self { fields, metadata }
    }

    /// Build an entry from a message and its captured values.
    pub fn apply(&self, message: RawMessage, captures: &FieldCaptures, now: DateTime<Utc>) -> LogEntry {
        let mut entry = LogEntry::new(now);

        for mapping in &self.fields {
            let value = captures.get(mapping.field).or(mapping.default);
            (mapping.write)(value, &mut entry, &message);
        }

        for mapping in &self.metadata {
            let captured = mapping.field.and_then(|f| captures.get(f));
            let value = captured.or(mapping.default.as_deref());
            (mapping.write)(mapping.key, value, &mut entry.metadata, now);
        }

        if entry
            .description
            .to_uppercase()
            .contains(constants::EXCEPTION_MARKER)
        {
            entry.metadata.insert(
                constants::META_EXCEPTION.to_string(),
                MetadataValue::Flag(true),
            );
        }

        entry
    }
}

fn field_mapping(field: FieldName) -> FieldMapping {
    let (default, write): (Option<&'static str>, EntryWriter) = match field {
        FieldName::Description => (None, write_description),
        FieldName::DateTime => (None, write_date_time),
        FieldName::Type => (Some(constants::DEFAULT_ENTRY_TYPE), write_type),
        FieldName::Logger => (None, write_logger),
        FieldName::System => (None, write_system),
        FieldName::Thread => (None, write_thread),
    };
    FieldMapping {
        field,
        default,
        write,
    }
}

// =============================================================================
// Writers
// =============================================================================

fn write_type(value: Option<&str>, entry: &mut LogEntry, _: &RawMessage) {
    if let Some(v) = value {
        entry.entry_type = if v.trim().is_empty() {
            constants::EMPTY_TYPE_SENTINEL.to_string()
        } else {
            v.to_string()
        };
    }
}

fn write_description(value: Option<&str>, entry: &mut LogEntry, message: &RawMessage) {
    let base = value.unwrap_or(&message.head);
    if message.has_extras() {
        let mut text = String::with_capacity(
            base.len() + message.extras.iter().map(|e| e.len() + 1).sum::<usize>(),
        );
        text.push_str(base);
        for extra in &message.extras {
            text.push('\n');
            text.push_str(extra);
        }
        entry.description = text;
    } else {
        entry.description = base.to_string();
    }
}

fn write_date_time(value: Option<&str>, entry: &mut LogEntry, _: &RawMessage) {
    if let Some(v) = value {
        entry.date_time = parse_date_time(v, entry.date_time);
    }
}

fn write_logger(value: Option<&str>, entry: &mut LogEntry, _: &RawMessage) {
    entry.source = value.map(str::to_string);
    if entry.system.is_none() {
        entry.system = entry.source.clone();
    }
}

fn write_system(value: Option<&str>, entry: &mut LogEntry, _: &RawMessage) {
    entry.system = value.map(str::to_string);
}

fn write_thread(value: Option<&str>, entry: &mut LogEntry, _: &RawMessage) {
    entry.thread = value.map(str::to_string);
}

fn write_text_metadata(key: &str, value: Option<&str>, metadata: &mut Metadata, _: DateTime<Utc>) {
    if let Some(v) = value {
        metadata.insert(key.to_string(), MetadataValue::Text(v.to_string()));
    }
}

fn write_received_time(key: &str, _: Option<&str>, metadata: &mut Metadata, now: DateTime<Utc>) {
    metadata.insert(key.to_string(), MetadataValue::Time(now));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn compile(pattern: &str) -> CompiledPattern {
        CompiledPattern::compile(pattern, Duration::from_secs(1)).unwrap()
    }

    fn decode(pattern: &CompiledPattern, message: RawMessage) -> LogEntry {
        let mapper = FieldMapper::for_pattern(pattern, "app.log");
        let captures = pattern.captures(&message.head).unwrap();
        mapper.apply(message, &captures, Utc::now())
    }

    #[test]
    fn test_full_mapping() {
        let p = compile(
            r"^(?<DateTime>\S+ \S+) \[(?<Thread>\d+)\] (?<Type>\w*) (?<Logger>\S+) (?<System>\S+) (?<Description>.*)$",
        );
        let entry = decode(
            &p,
            RawMessage::new("2024-01-02 03:04:05,678 [7] WARN App.Db host1 slow query"),
        );
        assert_eq!(entry.entry_type, "WARN");
        assert_eq!(entry.thread.as_deref(), Some("7"));
        assert_eq!(entry.source.as_deref(), Some("App.Db"));
        assert_eq!(entry.system.as_deref(), Some("host1"));
        assert_eq!(entry.description, "slow query");
        assert_eq!(
            entry.date_time,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(678)
        );
        assert_eq!(
            entry.metadata.get("Host").and_then(MetadataValue::as_text),
            Some("app.log")
        );
        assert_eq!(
            entry.metadata.get("Classification").and_then(MetadataValue::as_text),
            Some("")
        );
        assert!(matches!(
            entry.metadata.get("ReceivedTime"),
            Some(MetadataValue::Time(_))
        ));
    }

    #[test]
    fn test_logger_fills_system_without_system_group() {
        let p = compile(r"^(?<Type>\w+) (?<Logger>\S+) (?<Description>.*)$");
        let entry = decode(&p, RawMessage::new("INFO App.Web request done"));
        assert_eq!(entry.source.as_deref(), Some("App.Web"));
        assert_eq!(entry.system.as_deref(), Some("App.Web"));
    }

    #[test]
    fn test_extras_joined_into_description() {
        let p = compile(r"^(?<Type>\w+): (?<Description>.*)$");
        let mut message = RawMessage::new("ERROR: failed");
        message.extras = vec!["  at Foo()".to_string(), "  at Bar()".to_string()];
        let entry = decode(&p, message);
        assert_eq!(entry.description, "failed\n  at Foo()\n  at Bar()");
    }

    #[test]
    fn test_description_falls_back_to_head_line() {
        let p = compile(r"^(?<Type>[A-Z]+) ");
        let entry = decode(&p, RawMessage::new("INFO started ok"));
        assert_eq!(entry.description, "INFO started ok");
    }

    #[test]
    fn test_empty_type_becomes_debug() {
        let p = compile(r"^\[(?<Type>[^\]]*)\] (?<Description>.*)$");
        let entry = decode(&p, RawMessage::new("[ ] hello"));
        assert_eq!(entry.entry_type, "DEBUG");
    }

    #[test]
    fn test_absent_type_defaults_to_info() {
        let p = compile(r"^(?<Description>.*)$");
        let entry = decode(&p, RawMessage::new("hello"));
        assert_eq!(entry.entry_type, "INFO");
        assert!(entry.source.is_none());
        assert!(entry.thread.is_none());
    }

    #[test]
    fn test_exception_flag_any_case() {
        let p = compile(r"^(?<Description>.*)$");
        for text in ["System.NullReferenceException thrown", "an exception", "EXCEPTION"] {
            let entry = decode(&p, RawMessage::new(text));
            assert!(entry.has_exception(), "{text}");
        }
        let entry = decode(&p, RawMessage::new("all good"));
        assert!(!entry.metadata.contains_key("Exception"));
    }

    #[test]
    fn test_exception_in_extras_is_flagged() {
        let p = compile(r"^(?<Description>ERR.*)$");
        let mut message = RawMessage::new("ERR boom");
        message.extras = vec!["System.IO.IOException: disk".to_string()];
        assert!(decode(&p, message).has_exception());
    }

    #[test]
    fn test_bad_date_uses_now() {
        let p = compile(r"^(?<DateTime>\S+) (?<Description>.*)$");
        let before = Utc::now();
        let entry = decode(&p, RawMessage::new("garbage message"));
        assert!(entry.date_time >= before);
    }
}
