// LogTrail - core/decoder.rs
//
// One decode pass: text -> messages -> entries.
//
// The decoder owns the compiled pattern and its field mapper. It is immutable
// once built and is shared with the tailing worker behind an `Arc`.

use crate::core::mapper::FieldMapper;
use crate::core::model::{LogEntry, MultilineMode};
use crate::core::pattern::CompiledPattern;
use crate::core::segmenter::Segments;
use crate::util::error::DecodeError;
use chrono::Utc;
use std::io::Cursor;

/// Outcome of decoding one buffer.
#[derive(Debug, Default)]
pub struct DecodeResult {
    /// Entries in source order.
    pub entries: Vec<LogEntry>,
    /// Lines or messages dropped because they did not match.
    pub skipped: usize,
    /// Messages dropped because matching exceeded the time budget.
    pub timeouts: usize,
}

/// Decodes raw text into log entries.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    pattern: CompiledPattern,
    mapper: FieldMapper,
    mode: MultilineMode,
}

impl MessageDecoder {
    /// `host` is recorded in each entry's metadata (normally the file name).
    pub fn new(pattern: CompiledPattern, host: &str, mode: MultilineMode) -> Self {
        let mapper = FieldMapper::for_pattern(&pattern, host);
        Self {
            pattern,
            mapper,
            mode,
        }
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn mode(&self) -> MultilineMode {
        self.mode
    }

    /// Decode every complete message in `text`.
    pub fn decode(&self, text: &str) -> DecodeResult {
        let mut result = DecodeResult::default();
        let mut segments = Segments::new(Cursor::new(text.as_bytes()), self.pattern.regex(), self.mode);

        for message in segments.by_ref() {
            // Reading from an in-memory cursor cannot fail.
            let Ok(message) = message else { break };

            match self.pattern.captures(&message.head) {
                Ok(captures) => {
                    let entry = self.mapper.apply(message, &captures, Utc::now());
                    result.entries.push(entry);
                }
                Err(e @ DecodeError::MatchTimeout { .. }) => {
                    result.timeouts += 1;
                    tracing::warn!(error = %e, "Message dropped");
                }
                Err(e @ DecodeError::MatchFailure { .. }) => {
                    result.skipped += 1;
                    tracing::warn!(error = %e, "Message dropped");
                }
            }
        }
        result.skipped += segments.orphans();

        tracing::debug!(
            entries = result.entries.len(),
            skipped = result.skipped,
            timeouts = result.timeouts,
            "Decode pass complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pattern::{DecoderSpec, PRESETS};
    use crate::util::constants;
    use std::time::Duration;

    fn decoder(pattern: &str, mode: MultilineMode) -> MessageDecoder {
        let p = CompiledPattern::compile(pattern, Duration::from_secs(1)).unwrap();
        MessageDecoder::new(p, "test.log", mode)
    }

    #[test]
    fn test_decode_nlog_sample() {
        let spec = DecoderSpec::Preset(PRESETS[0].name.to_string());
        let d = decoder(spec.pattern().unwrap(), MultilineMode::Continuation);
        let text = "\
2024-03-01 10:15:30.1234|INFO|App.Main|Starting
2024-03-01 10:15:31.0000|ERROR|App.Worker|Job failed
System.InvalidOperationException: bad state
   at App.Worker.Run()
2024-03-01 10:15:32.5000|WARN|App.Main|Retrying
";
        let result = d.decode(text);
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.skipped, 0);

        let failed = &result.entries[1];
        assert_eq!(failed.entry_type, "ERROR");
        assert_eq!(failed.source.as_deref(), Some("App.Worker"));
        assert_eq!(
            failed.description,
            "Job failed\nSystem.InvalidOperationException: bad state\n   at App.Worker.Run()"
        );
        assert!(failed.has_exception());
        assert!(!result.entries[0].has_exception());
    }

    #[test]
    fn test_orphans_counted_as_skipped() {
        let d = decoder(r"^(?<Type>[A-Z]+) (?<Description>.*)$", MultilineMode::Continuation);
        let result = d.decode("leftover\nINFO one\n");
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_individual_mode_drops_continuations() {
        let d = decoder(r"^(?<Type>[A-Z]+) (?<Description>.*)$", MultilineMode::Individual);
        let result = d.decode("INFO one\n  detail\nWARN two\n");
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].description, "one");
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_oversized_message_times_out_and_decoding_continues() {
        let d = decoder(r"^(?<Type>[A-Z]+) (?<Description>.*)$", MultilineMode::Continuation);
        let huge = "x".repeat(constants::MAX_MATCH_INPUT_BYTES + 1);
        let text = format!("INFO one\nINFO {huge}\nWARN two\n");
        let result = d.decode(&text);
        assert_eq!(result.timeouts, 1);
        assert_eq!(result.skipped, 0);
        let got: Vec<&str> = result.entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(got, vec!["one", "two"]);
    }

    #[test]
    fn test_empty_text() {
        let d = decoder(r"(?<Description>.+)", MultilineMode::Continuation);
        let result = d.decode("");
        assert!(result.entries.is_empty());
        assert_eq!(result.skipped, 0);
    }
}
