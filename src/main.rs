// LogTrail - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Interactive pattern testing (--test-pattern)
// 4. One file-monitoring provider per input file, writing to stdout
// 5. Ctrl-C shutdown: every provider is stopped, flushed and disposed

use clap::Parser;
use logtrail::app::provider::{FileMonitorSettings, LogProvider, ProviderSettings};
use logtrail::app::registry::ProviderRegistry;
use logtrail::app::sink::{ClassifyingSink, LogSink, WriterSink};
use logtrail::core::classifier::ClassifyingService;
use logtrail::core::export::OutputFormat;
use logtrail::core::model::MultilineMode;
use logtrail::core::pattern::{CompiledPattern, DecoderSpec};
use logtrail::platform::config::{self, AppConfig, PlatformPaths};
use logtrail::util;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// LogTrail - tail log files and decode multi-line messages into structured
/// entries.
///
/// Each FILE is monitored for appended content. Lines are grouped into
/// messages with the decoder pattern and printed to stdout until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "logtrail", version, about)]
struct Cli {
    /// Files to monitor. Glob patterns are expanded.
    #[arg(value_name = "FILE", required_unless_present = "test_pattern")]
    files: Vec<String>,

    /// Refresh interval in milliseconds.
    #[arg(short = 'r', long = "refresh")]
    refresh: Option<u64>,

    /// Read existing file content before tailing (true) or only new content (false).
    #[arg(short = 'l', long = "load", action = clap::ArgAction::Set)]
    load: Option<bool>,

    /// Built-in decoder preset: nlog-default, log4net-default.
    #[arg(short = 'd', long = "decoder", conflicts_with = "custom")]
    decoder: Option<String>,

    /// Custom decoder pattern with named groups (Description, DateTime, Type,
    /// Logger, System, Thread).
    #[arg(long = "custom")]
    custom: Option<String>,

    /// Treatment of lines that do not start a message: continuation or individual.
    #[arg(long = "multiline")]
    multiline: Option<MultilineMode>,

    /// Output format: text, json or csv.
    #[arg(long = "format", default_value = "text")]
    format: OutputFormat,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Check a decoder pattern and exit.
    #[arg(long = "test-pattern", value_name = "PATTERN")]
    test_pattern: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (app_config, config_warnings) = match cli.config {
        Some(ref path) => config::load_config_file(path),
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    util::logging::init(cli.debug, app_config.log_level.as_deref());
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "LogTrail starting"
    );

    if let Some(ref pattern) = cli.test_pattern {
        return test_pattern(pattern);
    }

    let files = expand_files(&cli.files);
    if files.is_empty() {
        eprintln!("Error: no files to monitor");
        return ExitCode::FAILURE;
    }

    let sink = match build_sink(&app_config, cli.format) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Invalid classifier configuration");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let registry = ProviderRegistry::with_builtin();
    let mut providers: Vec<Box<dyn LogProvider>> = Vec::with_capacity(files.len());
    for file in files {
        let settings = monitor_settings(&cli, &app_config, file);
        let started = registry
            .create(ProviderSettings::FileMonitor(settings))
            .and_then(|mut provider| {
                provider.set_sink(Arc::clone(&sink));
                provider.start()?;
                Ok(provider)
            });
        match started {
            Ok(provider) => providers.push(provider),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start provider");
                eprintln!("Error: {e}");
                shutdown(providers);
                return ExitCode::FAILURE;
            }
        }
    }

    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        eprintln!("Error: {e}");
        shutdown(providers);
        return ExitCode::FAILURE;
    }

    tracing::info!(providers = providers.len(), "Monitoring; press Ctrl-C to stop");
    // A closed channel also ends the wait.
    let _ = rx.recv();

    tracing::info!("Shutting down");
    shutdown(providers);
    ExitCode::SUCCESS
}

/// Stop every provider and release it. Each dispatcher flushes what is
/// still queued before it exits.
fn shutdown(providers: Vec<Box<dyn LogProvider>>) {
    for mut provider in providers {
        provider.dispose();
    }
}

/// Validate a decoder pattern and report the outcome on stdout.
fn test_pattern(pattern: &str) -> ExitCode {
    let budget = Duration::from_millis(util::constants::DEFAULT_MATCH_BUDGET_MS);
    match CompiledPattern::compile(pattern, budget) {
        Ok(compiled) => {
            let fields: Vec<String> = compiled.used_fields().iter().map(|f| f.to_string()).collect();
            println!("Pattern is valid. Fields: {}", fields.join(", "));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Invalid pattern: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Expand glob patterns. Plain paths are kept even if the file does not exist
/// yet; the provider waits for it to appear.
fn expand_files(args: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for arg in args {
        if !arg.contains(['*', '?', '[']) {
            files.push(PathBuf::from(arg));
            continue;
        }
        match glob::glob(arg) {
            Ok(paths) => {
                let before = files.len();
                for entry in paths {
                    match entry {
                        Ok(path) if path.is_file() => files.push(path),
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "Skipping unreadable glob match"),
                    }
                }
                if files.len() == before {
                    tracing::warn!(pattern = %arg, "Glob pattern matched no files");
                }
            }
            Err(e) => {
                tracing::warn!(pattern = %arg, error = %e, "Invalid glob pattern");
            }
        }
    }
    files
}

/// Build the stdout sink, with classification when rules are configured.
fn build_sink(
    app_config: &AppConfig,
    format: OutputFormat,
) -> Result<Arc<dyn LogSink>, util::error::ClassifierError> {
    let writer = WriterSink::new(std::io::stdout(), format);
    if app_config.classifiers.is_empty() {
        return Ok(Arc::new(writer));
    }
    let service = ClassifyingService::from_rules(app_config.classifiers.iter().cloned())?;
    tracing::info!(classifiers = service.len(), "Classification enabled");
    Ok(Arc::new(ClassifyingSink::new(service, writer)))
}

/// Provider settings for `file`: CLI flags override config.toml.
fn monitor_settings(cli: &Cli, app_config: &AppConfig, file: PathBuf) -> FileMonitorSettings {
    let decoder = match (&cli.custom, &cli.decoder) {
        (Some(pattern), _) => DecoderSpec::Custom(pattern.clone()),
        (None, Some(name)) => DecoderSpec::Preset(name.clone()),
        (None, None) => app_config.decoder.clone(),
    };
    FileMonitorSettings {
        name: file.display().to_string(),
        file_name: file,
        refresh_interval_ms: cli.refresh.unwrap_or(app_config.refresh_interval_ms),
        load_existing_content: cli.load.unwrap_or(app_config.load_existing_content),
        decoder,
        multiline_mode: cli.multiline.unwrap_or(app_config.multiline_mode),
        match_budget_ms: app_config.match_budget_ms,
    }
}
