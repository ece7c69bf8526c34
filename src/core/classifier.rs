// LogTrail - core/classifier.rs
//
// Rule-based classification of decoded entries.
//
// A classifier looks at one entry field and, when its pattern matches,
// rewrites the entry's Type and records the classification in metadata.
// Enabled classifiers are tried in order; the first match wins.
// Core layer: pure logic, no I/O.

use crate::core::model::{LogEntry, LogEntryField, MetadataValue};
use crate::util::constants;
use crate::util::error::ClassifierError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a classifier's pattern is compared with the target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Whole field equals the pattern.
    #[default]
    Exact,
    /// Field contains the pattern.
    CaseSensitive,
    /// Field contains the pattern, ignoring case.
    CaseInsensitive,
    /// Pattern is a regular expression searched in the field.
    #[serde(alias = "regex")]
    RegularExpression,
}

impl MatchMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exact => "Exact",
            Self::CaseSensitive => "Case sensitive",
            Self::CaseInsensitive => "Case insensitive",
            Self::RegularExpression => "RegEx",
        }
    }
}

/// Serializable definition of a classifier, as read from config.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub field: LogEntryField,
    #[serde(default)]
    pub mode: MatchMode,
    pub pattern: String,
    /// Type assigned to matching entries.
    #[serde(rename = "type")]
    pub entry_type: String,
}

fn default_enabled() -> bool {
    true
}

/// A compiled classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    rule: ClassifierRule,
    /// Compiled only for `MatchMode::RegularExpression`.
    regex: Option<Regex>,
}

impl Classifier {
    pub fn new(rule: ClassifierRule) -> Result<Self, ClassifierError> {
        let regex = if rule.mode == MatchMode::RegularExpression {
            let re = Regex::new(&rule.pattern).map_err(|e| ClassifierError::InvalidRegex {
                name: rule.name.clone(),
                pattern: rule.pattern.clone(),
                source: e,
            })?;
            Some(re)
        } else {
            None
        };
        Ok(Self { rule, regex })
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn enabled(&self) -> bool {
        self.rule.enabled
    }

    pub fn rule(&self) -> &ClassifierRule {
        &self.rule
    }

    /// Human-readable summary, e.g. "RegEx match of ^E in the Type field".
    pub fn description(&self) -> String {
        format!(
            "{} match of {} in the {} field",
            self.rule.mode.label(),
            self.rule.pattern,
            self.rule.field
        )
    }

    /// Does this classifier's pattern match `entry`? A blank pattern never
    /// matches.
    pub fn is_match(&self, entry: &LogEntry) -> bool {
        let pattern = self.rule.pattern.as_str();
        if pattern.trim().is_empty() {
            return false;
        }
        let target = entry.field_text(self.rule.field);
        match self.rule.mode {
            MatchMode::Exact => target == pattern,
            MatchMode::CaseSensitive => target.contains(pattern),
            MatchMode::CaseInsensitive => target.to_lowercase().contains(&pattern.to_lowercase()),
            MatchMode::RegularExpression => self.regex.as_ref().is_some_and(|re| re.is_match(target)),
        }
    }

    /// Apply this classifier to `entry`. Returns whether it matched.
    pub fn classify(&self, entry: &mut LogEntry) -> bool {
        if !self.rule.enabled || !self.is_match(entry) {
            return false;
        }
        entry.entry_type = self.rule.entry_type.clone();
        entry.metadata.insert(
            constants::META_CLASSIFICATION.to_string(),
            MetadataValue::Text(self.rule.entry_type.clone()),
        );
        true
    }
}

/// Ordered set of classifiers applied to each entry.
#[derive(Debug, Clone, Default)]
pub struct ClassifyingService {
    classifiers: Vec<Classifier>,
}

impl ClassifyingService {
    pub fn new(classifiers: Vec<Classifier>) -> Self {
        Self { classifiers }
    }

    /// Compile every rule, failing on the first invalid one.
    pub fn from_rules(rules: impl IntoIterator<Item = ClassifierRule>) -> Result<Self, ClassifierError> {
        let classifiers = rules
            .into_iter()
            .map(Classifier::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { classifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn classifiers(&self) -> &[Classifier] {
        &self.classifiers
    }

    /// Classify one entry. Returns the name of the classifier that matched.
    pub fn classify<'a>(&'a self, entry: &mut LogEntry) -> Option<&'a str> {
        self.classifiers
            .iter()
            .find(|c| c.classify(entry))
            .map(Classifier::name)
    }

    /// Classify a batch in place.
    pub fn classify_all(&self, entries: &mut [LogEntry]) {
        if self.classifiers.is_empty() {
            return;
        }
        for entry in entries.iter_mut() {
            self.classify(entry);
        }
    }
}
