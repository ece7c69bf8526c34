// LogTrail - core/export.rs
//
// Text, JSON-lines and CSV rendering of entry batches.
// Core layer: writes to any Write implementation.

use crate::core::model::{LogEntry, MetadataValue};
use crate::util::constants;
use crate::util::error::SinkError;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Output format for rendered entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!(
                "unknown output format '{other}' (expected 'text', 'json' or 'csv')"
            )),
        }
    }
}

/// CSV column headings, in column order.
pub const CSV_HEADER: [&str; 8] = [
    "DateTime",
    "Type",
    "Source",
    "System",
    "Thread",
    "Host",
    "Exception",
    "Description",
];

/// Render `entries` in `format`. Returns the number written.
pub fn write_entries<W: Write>(
    entries: &[LogEntry],
    format: OutputFormat,
    writer: &mut W,
    csv_header: bool,
) -> Result<usize, SinkError> {
    match format {
        OutputFormat::Text => write_text(entries, writer),
        OutputFormat::Json => write_json_lines(entries, writer),
        OutputFormat::Csv => write_csv(entries, writer, csv_header),
    }
}

/// One line per entry: `timestamp [TYPE] source: description`.
/// Continuation lines of multi-line descriptions are indented.
pub fn write_text<W: Write>(entries: &[LogEntry], writer: &mut W) -> Result<usize, SinkError> {
    for entry in entries {
        let source = entry.source.as_deref().unwrap_or("-");
        let mut lines = entry.description.lines();
        let first = lines.next().unwrap_or("");
        writeln!(
            writer,
            "{} [{}] {}: {}",
            entry.date_time.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.entry_type,
            source,
            first
        )
        .map_err(|e| SinkError::Io { source: e })?;
        for line in lines {
            writeln!(writer, "    {line}").map_err(|e| SinkError::Io { source: e })?;
        }
    }
    writer.flush().map_err(|e| SinkError::Io { source: e })?;
    Ok(entries.len())
}

/// One JSON object per line.
pub fn write_json_lines<W: Write>(entries: &[LogEntry], writer: &mut W) -> Result<usize, SinkError> {
    for entry in entries {
        serde_json::to_writer(&mut *writer, entry).map_err(|e| SinkError::Json { source: e })?;
        writer
            .write_all(b"\n")
            .map_err(|e| SinkError::Io { source: e })?;
    }
    writer.flush().map_err(|e| SinkError::Io { source: e })?;
    Ok(entries.len())
}

/// CSV rows, optionally preceded by the header row.
pub fn write_csv<W: Write>(
    entries: &[LogEntry],
    writer: &mut W,
    include_header: bool,
) -> Result<usize, SinkError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    if include_header {
        csv_writer
            .write_record(CSV_HEADER)
            .map_err(|e| SinkError::Csv { source: e })?;
    }

    for entry in entries {
        let host = entry
            .metadata
            .get(constants::META_HOST)
            .and_then(MetadataValue::as_text)
            .unwrap_or("");
        let exception = if entry.has_exception() { "true" } else { "false" };
        csv_writer
            .write_record([
                entry.date_time.to_rfc3339().as_str(),
                entry.entry_type.as_str(),
                entry.source.as_deref().unwrap_or(""),
                entry.system.as_deref().unwrap_or(""),
                entry.thread.as_deref().unwrap_or(""),
                host,
                exception,
                entry.description.as_str(),
            ])
            .map_err(|e| SinkError::Csv { source: e })?;
    }

    csv_writer
        .flush()
        .map_err(|e| SinkError::Io { source: e })?;
    Ok(entries.len())
}
