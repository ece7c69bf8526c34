// LogTrail - core/pattern.rs
//
// Decoder pattern compilation and validation.
// A decoder pattern is a regular expression whose named groups identify the
// semantic fields of a log line. Group names are matched case-insensitively
// against a fixed vocabulary; at least one core field must be present.
//
// Matching runs with `.` NOT matching newlines (multi-line reassembly is the
// segmenter's job) and under a time budget. The regex crate matches in linear
// time, so the budget is enforced by capping the input size and by checking
// the elapsed time of each match afterwards.

use crate::util::constants;
use crate::util::error::{ConfigurationError, DecodeError, PatternError};
use crate::util::logging::preview;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

// =============================================================================
// Field vocabulary
// =============================================================================

/// Semantic fields a decoder pattern can capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    Description,
    DateTime,
    Type,
    Logger,
    System,
    Thread,
}

impl FieldName {
    /// Every recognised field, in mapping order.
    pub const ALL: [FieldName; 6] = [
        FieldName::Description,
        FieldName::DateTime,
        FieldName::Type,
        FieldName::Logger,
        FieldName::System,
        FieldName::Thread,
    ];

    /// Canonical capture-group name.
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Description => "Description",
            Self::DateTime => "DateTime",
            Self::Type => "Type",
            Self::Logger => "Logger",
            Self::System => "System",
            Self::Thread => "Thread",
        }
    }

    /// Core fields: a pattern must capture at least one of these.
    pub fn is_core(&self) -> bool {
        matches!(self, Self::Description | Self::DateTime | Self::Type)
    }

    /// Case-insensitive lookup of a capture-group name.
    pub fn from_group_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.group_name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.group_name())
    }
}

// =============================================================================
// Compiled pattern
// =============================================================================

/// A validated decoder pattern, ready for matching.
///
/// Immutable after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
    /// Recognised fields present in the pattern, with the group name exactly
    /// as written (the lookup is case-insensitive, the regex is not).
    used: Vec<(FieldName, String)>,
    match_budget: Duration,
}

impl CompiledPattern {
    /// Compile and validate `pattern`.
    pub fn compile(pattern: &str, match_budget: Duration) -> Result<Self, PatternError> {
        if pattern.trim().is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
            return Err(PatternError::TooLong {
                length: pattern.len(),
                max_length: constants::MAX_REGEX_PATTERN_LENGTH,
            });
        }

        let regex = RegexBuilder::new(pattern)
            .dot_matches_new_line(false)
            .size_limit(constants::MAX_REGEX_COMPILED_SIZE)
            .build()
            .map_err(|e| PatternError::InvalidSyntax {
                pattern: pattern.to_string(),
                source: e,
            })?;

        let mut used: Vec<(FieldName, String)> = Vec::new();
        for name in regex.capture_names().flatten() {
            if let Some(field) = FieldName::from_group_name(name) {
                if !used.iter().any(|(f, _)| *f == field) {
                    used.push((field, name.to_string()));
                }
            }
        }
        used.sort_by_key(|(f, _)| *f);

        if !used.iter().any(|(f, _)| f.is_core()) {
            return Err(PatternError::MissingCoreFields {
                pattern: pattern.to_string(),
            });
        }

        tracing::debug!(
            pattern = %preview(pattern),
            fields = ?used.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
            "Decoder pattern compiled"
        );

        Ok(Self {
            source: pattern.to_string(),
            regex,
            used,
            match_budget,
        })
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The underlying regex, used by the segmenter as its start pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn match_budget(&self) -> Duration {
        self.match_budget
    }

    /// Recognised fields present in the pattern.
    pub fn used_fields(&self) -> Vec<FieldName> {
        self.used.iter().map(|(f, _)| *f).collect()
    }

    pub fn uses(&self, field: FieldName) -> bool {
        self.used.iter().any(|(f, _)| *f == field)
    }

    /// Does `line` start a new message?
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Match `text` and collect the values of every used field.
    ///
    /// A field whose group did not participate in the match captures the
    /// empty string; fields not in the pattern are absent.
    pub fn captures(&self, text: &str) -> Result<FieldCaptures, DecodeError> {
        if text.len() > constants::MAX_MATCH_INPUT_BYTES {
            return Err(DecodeError::MatchTimeout {
                elapsed: Duration::ZERO,
                budget: self.match_budget,
            });
        }

        let started = Instant::now();
        let caps = self.regex.captures(text);
        let elapsed = started.elapsed();
        if elapsed > self.match_budget {
            return Err(DecodeError::MatchTimeout {
                elapsed,
                budget: self.match_budget,
            });
        }

        let caps = caps.ok_or_else(|| DecodeError::MatchFailure {
            line: preview(text).to_string(),
        })?;

        let values = self
            .used
            .iter()
            .map(|(field, group)| {
                let value = caps.name(group).map_or("", |m| m.as_str());
                (*field, value.to_string())
            })
            .collect();

        Ok(FieldCaptures { values })
    }
}

/// Validate a candidate pattern without keeping the compiled result.
///
/// This is what an interactive pattern tester calls on every edit: `Ok(())`
/// or the reason the pattern is rejected (see `PatternError`'s `Display`).
pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    CompiledPattern::compile(
        pattern,
        Duration::from_millis(constants::DEFAULT_MATCH_BUDGET_MS),
    )
    .map(|_| ())
}

// =============================================================================
// Match result
// =============================================================================

/// Values captured for the fields of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCaptures {
    values: HashMap<FieldName, String>,
}

impl FieldCaptures {
    /// Captured value, or `None` when the field is not in the pattern.
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(FieldName, S)> for FieldCaptures {
    fn from_iter<I: IntoIterator<Item = (FieldName, S)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(f, v)| (f, v.into())).collect(),
        }
    }
}

// =============================================================================
// Presets
// =============================================================================

/// A named, built-in decoder pattern.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: &'static str,
}

/// Built-in decoder presets.
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "nlog-default",
        description: "NLog default layout: ${longdate}|${level}|${logger}|${message}",
        pattern: r"^(?<DateTime>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{4})\|(?<Type>[^|]*)\|(?<Logger>[^|]*)\|(?<Description>.*)$",
    },
    Preset {
        name: "log4net-default",
        description: "log4net default layout: %date [%thread] %-5level %logger - %message",
        pattern: r"^(?<DateTime>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) \[(?<Thread>[^\]]*)\] (?<Type>\S+)\s+(?<Logger>\S+) - (?<Description>.*)$",
    },
];

/// Look up a preset by name. Case, `-` and `_` are ignored, so
/// "NLogDefault", "nlog_default" and "nlog-default" are the same preset.
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    let wanted = normalise_preset_name(name);
    PRESETS
        .iter()
        .find(|p| normalise_preset_name(p.name) == wanted)
}

fn normalise_preset_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where a provider's decoder pattern comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderSpec {
    /// One of the built-in `PRESETS`, by name.
    Preset(String),
    /// A user-supplied pattern.
    Custom(String),
}

impl Default for DecoderSpec {
    fn default() -> Self {
        Self::Preset(PRESETS[0].name.to_string())
    }
}

impl DecoderSpec {
    /// The pattern text to compile.
    pub fn pattern(&self) -> Result<&str, ConfigurationError> {
        match self {
            Self::Preset(name) => find_preset(name)
                .map(|p| p.pattern)
                .ok_or_else(|| ConfigurationError::UnknownPreset { name: name.clone() }),
            Self::Custom(pattern) => Ok(pattern),
        }
    }
}
