// LogTrail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTrail";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTrail";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Tailing
// =============================================================================

/// Default pause between two tailing cycles (and two dispatch cycles), in ms.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 250;

/// Minimum user-configurable refresh interval (ms).
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;

/// Maximum user-configurable refresh interval (ms).
pub const MAX_REFRESH_INTERVAL_MS: u64 = 60_000;

/// How often a sleeping worker wakes up to look at its cancel flag (ms).
/// Bounds shutdown latency independently of the refresh interval.
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 25;

/// Maximum size of the carried-over (newline-less) tail of a read.
///
/// A file that never writes a newline would otherwise grow this buffer without
/// bound. When exceeded the fragment is discarded with a warning.
pub const MAX_PARTIAL_LINE_BYTES: usize = 8 * 1024 * 1024; // 8 MiB

// =============================================================================
// Dispatch
// =============================================================================

/// Consecutive failed dispatch cycles after which the queued entries are
/// dropped instead of retried.
pub const MAX_DISPATCH_RETRIES: u32 = 20;

/// Queue length above which a failing sink's backlog is dropped at once.
pub const MAX_PENDING_ENTRIES: usize = 100_000;

// =============================================================================
// Pattern matching
// =============================================================================

/// Maximum length of a decoder pattern.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Upper bound on the compiled size of a decoder pattern (bytes).
pub const MAX_REGEX_COMPILED_SIZE: usize = 2 * 1024 * 1024;

/// Default time budget for a single message match (ms).
pub const DEFAULT_MATCH_BUDGET_MS: u64 = 1_000;

/// Smallest accepted match budget (ms).
pub const MIN_MATCH_BUDGET_MS: u64 = 1;

/// Largest accepted match budget (ms).
pub const MAX_MATCH_BUDGET_MS: u64 = 60_000;

/// Messages longer than this are not handed to the matcher at all and are
/// reported as a match timeout.
pub const MAX_MATCH_INPUT_BYTES: usize = 1024 * 1024; // 1 MiB

// =============================================================================
// Entry defaults
// =============================================================================

/// Type given to an entry whose pattern has no `Type` group.
pub const DEFAULT_ENTRY_TYPE: &str = "INFO";

/// Type given to an entry whose captured `Type` is empty or whitespace.
pub const EMPTY_TYPE_SENTINEL: &str = "DEBUG";

/// Case-insensitive marker that flags an entry as carrying an exception.
pub const EXCEPTION_MARKER: &str = "EXCEPTION";

/// Metadata key: monitored file the entry came from.
pub const META_HOST: &str = "Host";

/// Metadata key: UTC time the entry was decoded.
pub const META_RECEIVED_TIME: &str = "ReceivedTime";

/// Metadata key: classification assigned by the classifier service.
pub const META_CLASSIFICATION: &str = "Classification";

/// Metadata key: exception heuristic flag.
pub const META_EXCEPTION: &str = "Exception";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in warning output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Maximum number of classifier rules read from config.toml.
pub const MAX_CLASSIFIERS: usize = 256;
