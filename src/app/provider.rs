// LogTrail - app/provider.rs
//
// Log providers: long-running sources of decoded entries.
//
// The file-monitoring provider runs two workers that share one pending queue:
//   - the tailing worker reads and decodes appended bytes (producer);
//   - the dispatch worker hands queued entries to the sink (consumer).
// Both run at the configured refresh interval and can be stopped and joined
// independently. Disposal stops the tailing worker first so the dispatcher's
// final flush sees everything that was decoded.
//
// Lifecycle: Idle -> Running -> Stopped -> Running ...; any state -> Disposed.
// A restarted provider resumes at the byte where the previous run stopped.

use crate::app::dispatch::run_purge_loop;
use crate::app::queue::PendingQueue;
use crate::app::sink::LogSink;
use crate::app::tail::{TailEngine, TailState};
use crate::app::worker::Worker;
use crate::core::decoder::MessageDecoder;
use crate::core::model::MultilineMode;
use crate::core::pattern::{CompiledPattern, DecoderSpec};
use crate::util::constants;
use crate::util::error::{ConfigurationError, LogTrailError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Settings
// =============================================================================

/// Configuration of a file-monitoring provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMonitorSettings {
    /// Display name. Empty means "use the file name".
    pub name: String,
    pub file_name: PathBuf,
    pub refresh_interval_ms: u64,
    /// Read the file from the start (true) or only what is appended after
    /// the provider starts (false).
    pub load_existing_content: bool,
    pub decoder: DecoderSpec,
    pub multiline_mode: MultilineMode,
    pub match_budget_ms: u64,
}

impl Default for FileMonitorSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            file_name: PathBuf::new(),
            refresh_interval_ms: constants::DEFAULT_REFRESH_INTERVAL_MS,
            load_existing_content: true,
            decoder: DecoderSpec::default(),
            multiline_mode: MultilineMode::default(),
            match_budget_ms: constants::DEFAULT_MATCH_BUDGET_MS,
        }
    }
}

impl FileMonitorSettings {
    /// Default settings for `file_name`.
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn match_budget(&self) -> Duration {
        Duration::from_millis(self.match_budget_ms)
    }

    /// The display name, falling back to the file name.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.file_name.display().to_string()
        } else {
            self.name.clone()
        }
    }

    /// Check the settings without building anything.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.file_name.as_os_str().is_empty() {
            return Err(ConfigurationError::MissingFileName);
        }
        if !(constants::MIN_REFRESH_INTERVAL_MS..=constants::MAX_REFRESH_INTERVAL_MS)
            .contains(&self.refresh_interval_ms)
        {
            return Err(ConfigurationError::RefreshIntervalOutOfRange {
                value: self.refresh_interval_ms,
                min: constants::MIN_REFRESH_INTERVAL_MS,
                max: constants::MAX_REFRESH_INTERVAL_MS,
            });
        }
        if !(constants::MIN_MATCH_BUDGET_MS..=constants::MAX_MATCH_BUDGET_MS)
            .contains(&self.match_budget_ms)
        {
            return Err(ConfigurationError::MatchBudgetOutOfRange {
                value: self.match_budget_ms,
                min: constants::MIN_MATCH_BUDGET_MS,
                max: constants::MAX_MATCH_BUDGET_MS,
            });
        }
        self.decoder.pattern()?;
        Ok(())
    }
}

/// Settings for any provider kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderSettings {
    FileMonitor(FileMonitorSettings),
    /// Settings for a provider kind registered outside this crate, passed
    /// through untyped.
    Custom { kind: String, values: toml::Table },
}

impl ProviderSettings {
    /// Registry key of the provider kind these settings configure.
    pub fn kind(&self) -> &str {
        match self {
            Self::FileMonitor(_) => FILE_MONITOR_INFO.kind,
            Self::Custom { kind, .. } => kind,
        }
    }
}

// =============================================================================
// Provider contract
// =============================================================================

/// Static description of a provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Stable unique identifier.
    pub identifier: &'static str,
    /// Registry key.
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const FILE_MONITOR_INFO: ProviderInfo = ProviderInfo {
    identifier: "1a2f8249-b390-4baa-ba5e-3d67804ba1ed",
    kind: "file-monitor",
    name: "Simple file monitoring provider",
    description: "Monitor a text file for new log entries.",
};

/// Lifecycle state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Idle,
    Running,
    Stopped,
    Disposed,
}

impl ProviderState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        }
    }
}

/// A source of log entries with a start/stop lifecycle.
pub trait LogProvider: Send {
    fn info(&self) -> ProviderInfo;

    fn name(&self) -> &str;

    /// Attach the sink batches are delivered to. Required before `start`.
    fn set_sink(&mut self, sink: Arc<dyn LogSink>);

    fn start(&mut self) -> Result<()>;

    /// Stop both workers and wait for them. Idempotent.
    fn stop(&mut self);

    fn pause(&mut self);

    fn is_active(&self) -> bool;

    fn state(&self) -> ProviderState;

    /// Stop, join and discard anything still queued. Terminal.
    fn dispose(&mut self);
}

// =============================================================================
// FileMonitoringProvider
// =============================================================================

/// Tails one file and delivers decoded entries to a sink.
pub struct FileMonitoringProvider {
    name: String,
    settings: FileMonitorSettings,
    decoder: Arc<MessageDecoder>,
    queue: PendingQueue,
    sink: Option<Arc<dyn LogSink>>,
    state: ProviderState,
    tail_worker: Option<Worker>,
    dispatch_worker: Option<Worker>,
    position: Arc<AtomicU64>,
    /// Where the last tailing run stopped. Filled when its worker exits.
    resume: Arc<Mutex<Option<TailState>>>,
}

impl FileMonitoringProvider {
    /// Validate `settings` and compile the decoder pattern.
    pub fn new(settings: FileMonitorSettings) -> Result<Self> {
        settings.validate()?;
        let pattern = CompiledPattern::compile(settings.decoder.pattern()?, settings.match_budget())?;
        let host = host_name(&settings.file_name);
        let decoder = Arc::new(MessageDecoder::new(pattern, &host, settings.multiline_mode));

        tracing::debug!(
            file = %settings.file_name.display(),
            refresh_ms = settings.refresh_interval_ms,
            load_existing = settings.load_existing_content,
            mode = ?settings.multiline_mode,
            "Provider created"
        );

        Ok(Self {
            name: settings.display_name(),
            settings,
            decoder,
            queue: PendingQueue::new(),
            sink: None,
            state: ProviderState::Idle,
            tail_worker: None,
            dispatch_worker: None,
            position: Arc::new(AtomicU64::new(0)),
            resume: Arc::new(Mutex::new(None)),
        })
    }

    /// Registry constructor.
    pub fn from_settings(settings: ProviderSettings) -> Result<Box<dyn LogProvider>> {
        match settings {
            ProviderSettings::FileMonitor(s) => Ok(Box::new(Self::new(s)?)),
            other => Err(ConfigurationError::UnsupportedSettings {
                expected: FILE_MONITOR_INFO.kind,
                found: other.kind().to_string(),
            }
            .into()),
        }
    }

    pub fn settings(&self) -> &FileMonitorSettings {
        &self.settings
    }

    /// Bytes of the file consumed so far.
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Entries decoded but not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stop and join the tailing worker only.
    pub fn stop_tailing(&mut self) {
        if let Some(mut worker) = self.tail_worker.take() {
            worker.stop();
        }
    }

    /// Stop and join the dispatch worker only. Its final flush runs first.
    pub fn stop_dispatch(&mut self) {
        if let Some(mut worker) = self.dispatch_worker.take() {
            worker.stop();
        }
    }
}

impl LogProvider for FileMonitoringProvider {
    fn info(&self) -> ProviderInfo {
        FILE_MONITOR_INFO
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sink = Some(sink);
    }

    fn start(&mut self) -> Result<()> {
        if !matches!(self.state, ProviderState::Idle | ProviderState::Stopped) {
            return Err(LogTrailError::InvalidState {
                operation: "start",
                state: self.state.label(),
            });
        }
        let sink = self.sink.clone().ok_or(ConfigurationError::MissingSink)?;
        let interval = self.settings.refresh_interval();

        let previous = self
            .resume
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let engine = match previous {
            Some(state) => TailEngine::resume(state, Arc::clone(&self.decoder), self.queue.clone()),
            None => TailEngine::new(
                self.settings.file_name.clone(),
                Arc::clone(&self.decoder),
                self.queue.clone(),
                self.settings.load_existing_content,
            ),
        };
        self.position = engine.position_handle();

        let slot = Arc::clone(&self.resume);
        let tail_worker = Worker::spawn("tail", move |cancel| {
            let state = engine.run(cancel, interval);
            *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(state);
        })?;
        let producer = tail_worker.token();
        self.tail_worker = Some(tail_worker);

        let queue = self.queue.clone();
        match Worker::spawn("dispatch", move |cancel| {
            run_purge_loop(queue, sink, cancel, producer, interval);
        }) {
            Ok(worker) => self.dispatch_worker = Some(worker),
            Err(e) => {
                self.stop_tailing();
                return Err(e.into());
            }
        }

        self.state = ProviderState::Running;
        tracing::info!(
            provider = %self.name,
            file = %self.settings.file_name.display(),
            "Provider started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.tail_worker.is_none() && self.dispatch_worker.is_none() {
            return;
        }
        self.stop_tailing();
        self.stop_dispatch();
        if self.state == ProviderState::Running {
            self.state = ProviderState::Stopped;
        }
        tracing::info!(provider = %self.name, position = self.position(), "Provider stopped");
    }

    fn pause(&mut self) {
        self.stop();
    }

    fn is_active(&self) -> bool {
        self.state == ProviderState::Running
            && self.tail_worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    fn state(&self) -> ProviderState {
        self.state
    }

    fn dispose(&mut self) {
        if self.state == ProviderState::Disposed {
            return;
        }
        self.stop();
        let discarded = self.queue.clear();
        if discarded > 0 {
            tracing::warn!(provider = %self.name, discarded, "Undelivered entries discarded");
        }
        self.sink = None;
        self.state = ProviderState::Disposed;
        tracing::debug!(provider = %self.name, "Provider disposed");
    }
}

impl Drop for FileMonitoringProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Value recorded as each entry's Host: the file's name without directories.
fn host_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sink::MemorySink;
    use crate::util::error::PatternError;

    #[test]
    fn test_missing_file_name_rejected() {
        let err = FileMonitoringProvider::new(FileMonitorSettings::default()).err().unwrap();
        assert!(matches!(
            err,
            LogTrailError::Configuration(ConfigurationError::MissingFileName)
        ));
    }

    #[test]
    fn test_refresh_interval_range_checked() {
        let mut settings = FileMonitorSettings::new("app.log");
        settings.refresh_interval_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::RefreshIntervalOutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_custom_pattern_rejected() {
        let mut settings = FileMonitorSettings::new("app.log");
        settings.decoder = DecoderSpec::Custom(r"(?<Thread>\d+)".to_string());
        let err = FileMonitoringProvider::new(settings).err().unwrap();
        assert!(matches!(
            err,
            LogTrailError::Pattern(PatternError::MissingCoreFields { .. })
        ));
    }

    #[test]
    fn test_start_requires_sink() {
        let mut provider = FileMonitoringProvider::new(FileMonitorSettings::new("app.log")).unwrap();
        let err = provider.start().unwrap_err();
        assert!(matches!(
            err,
            LogTrailError::Configuration(ConfigurationError::MissingSink)
        ));
        assert_eq!(provider.state(), ProviderState::Idle);
    }

    #[test]
    fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = FileMonitorSettings::new(dir.path().join("app.log"));
        settings.refresh_interval_ms = 20;
        let mut provider = FileMonitoringProvider::new(settings).unwrap();
        assert_eq!(provider.name(), dir.path().join("app.log").display().to_string());
        provider.set_sink(Arc::new(MemorySink::new()));

        provider.start().unwrap();
        assert_eq!(provider.state(), ProviderState::Running);
        assert!(provider.is_active());
        assert!(matches!(
            provider.start(),
            Err(LogTrailError::InvalidState { operation: "start", .. })
        ));

        provider.pause();
        assert_eq!(provider.state(), ProviderState::Stopped);
        assert!(!provider.is_active());

        provider.start().unwrap();
        assert_eq!(provider.state(), ProviderState::Running);

        provider.dispose();
        assert_eq!(provider.state(), ProviderState::Disposed);
        assert!(matches!(
            provider.start(),
            Err(LogTrailError::InvalidState { operation: "start", .. })
        ));
        provider.dispose();
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let started = std::time::Instant::now();
        while !cond() && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_resume_after_pause_delivers_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "INFO one\n").unwrap();
        let mut settings = FileMonitorSettings::new(&path);
        settings.refresh_interval_ms = 10;
        settings.decoder = DecoderSpec::Custom(r"^(?<Type>[A-Z]+) (?<Description>.*)$".to_string());
        let sink = Arc::new(MemorySink::new());
        let mut provider = FileMonitoringProvider::new(settings).unwrap();
        provider.set_sink(sink.clone());

        provider.start().unwrap();
        assert!(wait_until(|| sink.len() == 1));
        provider.pause();
        assert_eq!(provider.position(), 9);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"WARN two\n").unwrap();
        drop(file);

        provider.start().unwrap();
        assert!(wait_until(|| sink.len() >= 2));
        provider.dispose();

        let got: Vec<String> = sink.entries().into_iter().map(|e| e.description).collect();
        assert_eq!(got, vec!["one", "two"]);
        assert_eq!(provider.position(), 18);
    }

    #[test]
    fn test_foreign_settings_rejected() {
        let settings = ProviderSettings::Custom {
            kind: "udp".to_string(),
            values: toml::Table::new(),
        };
        let err = FileMonitoringProvider::from_settings(settings).err().unwrap();
        assert!(matches!(
            err,
            LogTrailError::Configuration(ConfigurationError::UnsupportedSettings { .. })
        ));
    }

    #[test]
    fn test_host_name_is_file_name() {
        assert_eq!(host_name(Path::new("/var/log/app.log")), "app.log");
    }
}
