// LogTrail - platform/config.rs
//
// Platform configuration directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::classifier::{Classifier, ClassifierRule};
use crate::core::model::MultilineMode;
use crate::core::pattern::{find_preset, validate_pattern, DecoderSpec, PRESETS};
use crate::util::constants;
use crate::util::error::ConfigurationError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogTrail configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtrail/ or %APPDATA%\LogTrail\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[monitor]` section.
    pub monitor: MonitorSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
    /// `[[classifier]]` tables.
    #[serde(rename = "classifier")]
    pub classifiers: Vec<toml::Value>,
}

/// `[monitor]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub refresh_interval_ms: Option<u64>,
    pub load_existing_content: Option<bool>,
    /// Name of a built-in decoder preset.
    pub decoder: Option<String>,
    /// A custom decoder pattern; takes precedence over `decoder`.
    pub custom_pattern: Option<String>,
    pub multiline_mode: Option<String>,
    pub match_budget_ms: Option<u64>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Monitor --
    pub refresh_interval_ms: u64,
    pub load_existing_content: bool,
    pub decoder: DecoderSpec,
    pub multiline_mode: MultilineMode,
    pub match_budget_ms: u64,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,

    // -- Classification --
    /// Classifier rules, each already checked to compile.
    pub classifiers: Vec<ClassifierRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: constants::DEFAULT_REFRESH_INTERVAL_MS,
            load_existing_content: true,
            decoder: DecoderSpec::default(),
            multiline_mode: MultilineMode::default(),
            match_budget_ms: constants::DEFAULT_MATCH_BUDGET_MS,
            log_level: None,
            classifiers: Vec::new(),
        }
    }
}

/// Load and validate `config.toml` from the given config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first run).
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }
    load_config_file(&config_path)
}

/// Load and validate a specific config file. A missing or unreadable file is
/// reported as a warning and defaults are used.
pub fn load_config_file(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigurationError::Io {
                path: config_path.to_path_buf(),
                source: e,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let (config, parse_warnings) = parse_config(&content, config_path);
    warnings.extend(parse_warnings);
    (config, warnings)
}

/// Validate config text. `origin` is only used in messages.
pub fn parse_config(content: &str, origin: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let raw: RawConfig = match toml::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            let err = ConfigurationError::TomlParse {
                path: origin.to_path_buf(),
                source: e,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %origin.display(), "Loaded config.toml");

    let mut config = AppConfig::default();
    let monitor = &raw.monitor;

    // -- Monitor: refresh_interval_ms --
    if let Some(ms) = monitor.refresh_interval_ms {
        if (constants::MIN_REFRESH_INTERVAL_MS..=constants::MAX_REFRESH_INTERVAL_MS).contains(&ms) {
            config.refresh_interval_ms = ms;
        } else {
            warnings.push(format!(
                "[monitor] refresh_interval_ms = {ms} is out of range ({}-{}). Using default ({}).",
                constants::MIN_REFRESH_INTERVAL_MS,
                constants::MAX_REFRESH_INTERVAL_MS,
                constants::DEFAULT_REFRESH_INTERVAL_MS,
            ));
        }
    }

    // -- Monitor: load_existing_content --
    if let Some(load) = monitor.load_existing_content {
        config.load_existing_content = load;
    }

    // -- Monitor: decoder / custom_pattern --
    if let Some(ref name) = monitor.decoder {
        match find_preset(name) {
            Some(preset) => config.decoder = DecoderSpec::Preset(preset.name.to_string()),
            None => warnings.push(format!(
                "[monitor] decoder = \"{name}\" is not a known preset. Using default ({}).",
                PRESETS[0].name,
            )),
        }
    }
    if let Some(ref pattern) = monitor.custom_pattern {
        if monitor.decoder.is_some() {
            warnings.push(
                "[monitor] both decoder and custom_pattern are set; custom_pattern wins."
                    .to_string(),
            );
        }
        match validate_pattern(pattern) {
            Ok(()) => config.decoder = DecoderSpec::Custom(pattern.clone()),
            Err(e) => warnings.push(format!(
                "[monitor] custom_pattern is invalid: {e}. Using {}.",
                match &config.decoder {
                    DecoderSpec::Preset(name) => name.as_str(),
                    DecoderSpec::Custom(_) => "the default",
                }
            )),
        }
    }

    // -- Monitor: multiline_mode --
    if let Some(ref mode) = monitor.multiline_mode {
        match mode.parse::<MultilineMode>() {
            Ok(m) => config.multiline_mode = m,
            Err(e) => warnings.push(format!("[monitor] multiline_mode: {e}. Using default (continuation).")),
        }
    }

    // -- Monitor: match_budget_ms --
    if let Some(ms) = monitor.match_budget_ms {
        if (constants::MIN_MATCH_BUDGET_MS..=constants::MAX_MATCH_BUDGET_MS).contains(&ms) {
            config.match_budget_ms = ms;
        } else {
            warnings.push(format!(
                "[monitor] match_budget_ms = {ms} is out of range ({}-{}). Using default ({}).",
                constants::MIN_MATCH_BUDGET_MS,
                constants::MAX_MATCH_BUDGET_MS,
                constants::DEFAULT_MATCH_BUDGET_MS,
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Classifiers --
    if raw.classifiers.len() > constants::MAX_CLASSIFIERS {
        warnings.push(format!(
            "{} [[classifier]] entries found; only the first {} are used.",
            raw.classifiers.len(),
            constants::MAX_CLASSIFIERS,
        ));
    }
    for (index, value) in raw
        .classifiers
        .into_iter()
        .take(constants::MAX_CLASSIFIERS)
        .enumerate()
    {
        let rule: ClassifierRule = match value.try_into() {
            Ok(r) => r,
            Err(e) => {
                warnings.push(format!("[[classifier]] #{}: {e}. Skipped.", index + 1));
                continue;
            }
        };
        match Classifier::new(rule.clone()) {
            Ok(_) => config.classifiers.push(rule),
            Err(e) => warnings.push(format!("[[classifier]] #{}: {e}. Skipped.", index + 1)),
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::MatchMode;

    fn parse(text: &str) -> (AppConfig, Vec<String>) {
        parse_config(text, Path::new("config.toml"))
    }

    #[test]
    fn test_empty_config_gives_defaults() {
        let (config, warnings) = parse("");
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_full_config() {
        let (config, warnings) = parse(
            r#"
[monitor]
refresh_interval_ms = 500
load_existing_content = false
decoder = "log4net-default"
multiline_mode = "individual"
match_budget_ms = 200

[logging]
level = "DEBUG"

[[classifier]]
name = "errors"
field = "type"
mode = "case-insensitive"
pattern = "error"
type = "ERROR"
"#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.refresh_interval_ms, 500);
        assert!(!config.load_existing_content);
        assert_eq!(config.decoder, DecoderSpec::Preset("log4net-default".to_string()));
        assert_eq!(config.multiline_mode, MultilineMode::Individual);
        assert_eq!(config.match_budget_ms, 200);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.classifiers.len(), 1);
        assert_eq!(config.classifiers[0].mode, MatchMode::CaseInsensitive);
    }

    #[test]
    fn test_out_of_range_values_warn_and_default() {
        let (config, warnings) = parse(
            r#"
[monitor]
refresh_interval_ms = 1
match_budget_ms = 0
multiline_mode = "sideways"
decoder = "nope"
"#,
        );
        assert_eq!(warnings.len(), 4);
        assert_eq!(config.refresh_interval_ms, constants::DEFAULT_REFRESH_INTERVAL_MS);
        assert_eq!(config.match_budget_ms, constants::DEFAULT_MATCH_BUDGET_MS);
        assert_eq!(config.decoder, DecoderSpec::default());
    }

    #[test]
    fn test_custom_pattern_validated() {
        let (config, warnings) = parse("[monitor]\ncustom_pattern = '(?<Thread>\\d+)'\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("core fields"));
        assert_eq!(config.decoder, DecoderSpec::default());

        let (config, warnings) = parse("[monitor]\ncustom_pattern = '^(?<Description>.*)$'\n");
        assert!(warnings.is_empty());
        assert_eq!(config.decoder, DecoderSpec::Custom("^(?<Description>.*)$".to_string()));
    }

    #[test]
    fn test_bad_classifier_skipped() {
        let (config, warnings) = parse(
            r#"
[[classifier]]
name = "broken"
mode = "regular-expression"
pattern = "("
type = "X"

[[classifier]]
name = "missing-type"
pattern = "x"
"#,
        );
        assert!(config.classifiers.is_empty());
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_unparseable_file_warns() {
        let (config, warnings) = parse("[monitor\n");
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("config parse error"));
    }

    #[test]
    fn test_unreadable_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let (config, warnings) = load_config_file(dir.path());
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("config I/O error"));
    }

    #[test]
    fn test_missing_file_in_dir_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[monitor]\nrefresh_interval_ms = 1000\n",
        )
        .unwrap();
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(config.refresh_interval_ms, 1000);
    }
}
