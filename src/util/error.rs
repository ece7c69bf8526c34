// LogTrail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Configuration and pattern errors are fatal to the caller that constructs a
// provider; decode, I/O-per-cycle and sink errors are reported to the loop that
// hit them and never bring the process down.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all LogTrail operations.
#[derive(Debug)]
pub enum LogTrailError {
    /// Provider configuration is invalid or incomplete.
    Configuration(ConfigurationError),

    /// A decoder pattern failed to compile or validate.
    Pattern(PatternError),

    /// A classifier rule could not be built.
    Classifier(ClassifierError),

    /// The downstream sink refused a batch.
    Sink(SinkError),

    /// An operation was requested in a lifecycle state that does not allow it.
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LogTrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "Configuration error: {e}"),
            Self::Pattern(e) => write!(f, "Pattern error: {e}"),
            Self::Classifier(e) => write!(f, "Classifier error: {e}"),
            Self::Sink(e) => write!(f, "Sink error: {e}"),
            Self::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} a provider that is {state}")
            }
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LogTrailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Pattern(e) => Some(e),
            Self::Classifier(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::InvalidState { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while validating provider settings or loading config.
#[derive(Debug)]
pub enum ConfigurationError {
    /// No file to monitor was given.
    MissingFileName,

    /// The refresh interval is outside the accepted range.
    RefreshIntervalOutOfRange { value: u64, min: u64, max: u64 },

    /// The match budget is outside the accepted range.
    MatchBudgetOutOfRange { value: u64, min: u64, max: u64 },

    /// A named decoder preset does not exist.
    UnknownPreset { name: String },

    /// A provider constructor received settings meant for another kind.
    UnsupportedSettings { expected: &'static str, found: String },

    /// The registry has no constructor for the requested provider kind.
    UnknownProviderKind { kind: String },

    /// `start` was called before a sink was attached.
    MissingSink,

    /// A worker thread could not be spawned.
    WorkerSpawn { worker: &'static str, source: io::Error },

    /// config.toml could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading a config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFileName => write!(f, "no file name specified"),
            Self::RefreshIntervalOutOfRange { value, min, max } => write!(
                f,
                "refresh interval {value} ms is out of range (expected {min}-{max} ms)"
            ),
            Self::MatchBudgetOutOfRange { value, min, max } => write!(
                f,
                "match budget {value} ms is out of range (expected {min}-{max} ms)"
            ),
            Self::UnknownPreset { name } => write!(f, "unknown decoder preset '{name}'"),
            Self::UnsupportedSettings { expected, found } => write!(
                f,
                "provider expects {expected} settings but was given {found} settings"
            ),
            Self::UnknownProviderKind { kind } => {
                write!(f, "no provider registered for kind '{kind}'")
            }
            Self::MissingSink => write!(
                f,
                "no sink has been attached; one is required before starting a provider"
            ),
            Self::WorkerSpawn { worker, source } => {
                write!(f, "failed to spawn {worker} worker: {source}")
            }
            Self::TomlParse { path, source } => {
                write!(f, "config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn { source, .. } => Some(source),
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for LogTrailError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

/// Reasons a decoder pattern is rejected.
///
/// The `Display` text is what the interactive pattern tester shows the user.
#[derive(Debug)]
pub enum PatternError {
    /// The pattern is empty.
    Empty,

    /// The pattern exceeds the maximum allowed length.
    TooLong { length: usize, max_length: usize },

    /// The pattern is not a valid regular expression.
    InvalidSyntax {
        pattern: String,
        source: regex::Error,
    },

    /// None of Description, Type or DateTime is captured.
    MissingCoreFields { pattern: String },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Pattern can not be empty"),
            Self::TooLong { length, max_length } => write!(
                f,
                "Pattern is {length} characters long, exceeds maximum of {max_length}"
            ),
            Self::InvalidSyntax { .. } => write!(
                f,
                "The custom pattern does not equate to a valid regular expression"
            ),
            Self::MissingCoreFields { .. } => write!(
                f,
                "The pattern does not define any of the core fields, Description, Type or \
                 DateTime. At least one of these should be defined."
            ),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidSyntax { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PatternError> for LogTrailError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors (per message, non-fatal)
// ---------------------------------------------------------------------------

/// Why a single message produced no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The message does not match the decoder pattern.
    MatchFailure { line: String },

    /// Evaluating the pattern exceeded its time budget.
    MatchTimeout { elapsed: Duration, budget: Duration },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchFailure { line } => {
                write!(f, "message does not match the decoder pattern: {line}")
            }
            Self::MatchTimeout { elapsed, budget } => write!(
                f,
                "pattern evaluation took {} ms, budget is {} ms",
                elapsed.as_millis(),
                budget.as_millis()
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

// ---------------------------------------------------------------------------
// Classifier errors
// ---------------------------------------------------------------------------

/// Errors building a classifier rule.
#[derive(Debug)]
pub enum ClassifierError {
    /// A regular-expression rule has an invalid pattern.
    InvalidRegex {
        name: String,
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegex {
                name,
                pattern,
                source,
            } => write!(f, "classifier '{name}': invalid regex '{pattern}': {source}"),
        }
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
        }
    }
}

impl From<ClassifierError> for LogTrailError {
    fn from(e: ClassifierError) -> Self {
        Self::Classifier(e)
    }
}

// ---------------------------------------------------------------------------
// Sink errors
// ---------------------------------------------------------------------------

/// Errors returned by a `LogSink` when it cannot accept a batch.
#[derive(Debug)]
pub enum SinkError {
    /// The sink refused the batch.
    Rejected { reason: String },

    /// Writing the batch failed.
    Io { source: io::Error },

    /// CSV serialisation error.
    Csv { source: csv::Error },

    /// JSON serialisation error.
    Json { source: serde_json::Error },

    /// The destination is gone (e.g. the reader of a pipe exited). Nothing
    /// will be delivered again.
    Closed,
}

impl SinkError {
    /// Whether retrying can never succeed.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io { source } => source.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "batch rejected: {reason}"),
            Self::Io { source } => write!(f, "write failed: {source}"),
            Self::Csv { source } => write!(f, "CSV output error: {source}"),
            Self::Json { source } => write!(f, "JSON output error: {source}"),
            Self::Closed => write!(f, "output closed"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected { .. } | Self::Closed => None,
            Self::Io { source } => Some(source),
            Self::Csv { source } => Some(source),
            Self::Json { source } => Some(source),
        }
    }
}

impl From<SinkError> for LogTrailError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

/// Convenience type alias for LogTrail results.
pub type Result<T> = std::result::Result<T, LogTrailError>;
