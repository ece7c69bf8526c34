// LogTrail - app/sink.rs
//
// Downstream consumers of decoded entry batches.
//
// `add_batch` is called from the dispatcher thread once per non-empty drain,
// with entries in file order. Implementations must be thread-safe; the
// provider holds its sink as `Arc<dyn LogSink>`.
//
// An `Err` from `add_batch` means no entry of the batch was delivered: the
// dispatcher re-queues all of it. A sink that can fail halfway through a
// batch keeps the undelivered remainder itself and pushes it out in `flush`.

use crate::core::classifier::ClassifyingService;
use crate::core::export::{self, OutputFormat};
use crate::core::model::LogEntry;
use crate::util::error::SinkError;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives batches of decoded entries.
pub trait LogSink: Send + Sync {
    /// Accept a batch, all or nothing. An error hands the batch back to the
    /// dispatcher, which re-queues it for the next cycle.
    fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError>;

    /// Deliver anything still buffered from batches already accepted.
    /// Called by the dispatcher before every drain.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        (**self).add_batch(entries)
    }

    fn flush(&self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// MemorySink
// =============================================================================

/// Collects every entry it receives. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
    batches: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far, in delivery order.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock_recovering(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `add_batch` calls received.
    pub fn batch_count(&self) -> usize {
        *lock_recovering(&self.batches)
    }
}

impl LogSink for MemorySink {
    fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        lock_recovering(&self.entries).extend_from_slice(entries);
        *lock_recovering(&self.batches) += 1;
        Ok(())
    }
}

// =============================================================================
// ClassifyingSink
// =============================================================================

/// Runs the classifier service over each batch, then forwards it.
pub struct ClassifyingSink<S> {
    service: ClassifyingService,
    inner: S,
}

impl<S: LogSink> ClassifyingSink<S> {
    pub fn new(service: ClassifyingService, inner: S) -> Self {
        Self { service, inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LogSink> LogSink for ClassifyingSink<S> {
    fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        if self.service.is_empty() {
            return self.inner.add_batch(entries);
        }
        let mut classified = entries.to_vec();
        self.service.classify_all(&mut classified);
        self.inner.add_batch(&classified)
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush()
    }
}

// =============================================================================
// WriterSink
// =============================================================================

/// Renders batches to a writer (stdout for the CLI).
///
/// Each batch is rendered in memory before anything is written. If the writer
/// fails before taking any byte the batch is refused; if it fails partway, the
/// batch counts as delivered and the bytes it did not take are written first
/// on the next call. Either way every entry reaches the writer exactly once.
/// A broken pipe closes the sink for good.
pub struct WriterSink<W> {
    state: Mutex<WriterState<W>>,
    format: OutputFormat,
}

struct WriterState<W> {
    writer: W,
    header_written: bool,
    /// Rendered bytes of accepted batches the writer has not taken yet.
    unwritten: Vec<u8>,
    closed: bool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            state: Mutex::new(WriterState {
                writer,
                header_written: false,
                unwritten: Vec::new(),
                closed: false,
            }),
            format,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Bytes accepted but not yet written.
    pub fn backlog(&self) -> usize {
        lock_recovering(&self.state).unwritten.len()
    }

    /// Recover the writer, e.g. to inspect a buffer in tests.
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .writer
    }
}

impl<W: Write> WriterState<W> {
    /// Write `buf` and return how many bytes the writer took, with the error
    /// that stopped it early if any.
    fn write_counted(&mut self, buf: &[u8]) -> (usize, io::Result<()>) {
        let mut written = 0;
        while written < buf.len() {
            match self.writer.write(&buf[written..]) {
                Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return (written, Err(e)),
            }
        }
        (written, self.writer.flush())
    }

    fn fail(&mut self, source: io::Error) -> SinkError {
        if source.kind() == io::ErrorKind::BrokenPipe {
            self.closed = true;
            self.unwritten.clear();
            return SinkError::Closed;
        }
        SinkError::Io { source }
    }

    fn write_unwritten(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.unwritten.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.unwritten);
        let (written, result) = self.write_counted(&pending);
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.unwritten = pending[written..].to_vec();
                Err(self.fail(e))
            }
        }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        let mut state = lock_recovering(&self.state);
        state.write_unwritten()?;

        let mut rendered = Vec::new();
        export::write_entries(entries, self.format, &mut rendered, !state.header_written)?;

        let (written, result) = state.write_counted(&rendered);
        match result {
            Ok(()) => {
                state.header_written = true;
                Ok(())
            }
            Err(e) if written == 0 => Err(state.fail(e)),
            Err(e) => {
                state.header_written = true;
                let err = state.fail(e);
                if !state.closed {
                    state.unwritten = rendered[written..].to_vec();
                }
                tracing::warn!(
                    error = %err,
                    written,
                    remaining = rendered.len() - written,
                    "Sink: batch partly written, remainder kept for the next flush"
                );
                Ok(())
            }
        }
    }

    fn flush(&self) -> Result<(), SinkError> {
        lock_recovering(&self.state).write_unwritten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::{ClassifierRule, MatchMode};
    use crate::core::model::LogEntryField;
    use chrono::Utc;

    fn entry(description: &str) -> LogEntry {
        let mut e = LogEntry::new(Utc::now());
        e.description = description.to_string();
        e
    }

    #[test]
    fn test_memory_sink_collects_batches() {
        let sink = MemorySink::new();
        sink.add_batch(&[entry("a"), entry("b")]).unwrap();
        sink.add_batch(&[entry("c")]).unwrap();
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.batch_count(), 2);
    }

    #[test]
    fn test_classifying_sink_rewrites_type() {
        let service = ClassifyingService::from_rules([ClassifierRule {
            name: "timeouts".to_string(),
            enabled: true,
            field: LogEntryField::Description,
            mode: MatchMode::CaseInsensitive,
            pattern: "timeout".to_string(),
            entry_type: "TIMEOUT".to_string(),
        }])
        .unwrap();
        let sink = ClassifyingSink::new(service, Arc::new(MemorySink::new()));
        sink.add_batch(&[entry("Timeout talking to db"), entry("ok")])
            .unwrap();

        let received = sink.inner().entries();
        assert_eq!(received[0].entry_type, "TIMEOUT");
        assert_eq!(received[1].entry_type, "INFO");
    }

    #[test]
    fn test_writer_sink_writes_csv_header_once() {
        let sink = WriterSink::new(Vec::new(), OutputFormat::Csv);
        sink.add_batch(&[entry("one")]).unwrap();
        sink.add_batch(&[entry("two")]).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.matches("DateTime,Type").count(), 1);
        assert_eq!(out.lines().count(), 3);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_closes_on_broken_pipe() {
        let sink = WriterSink::new(BrokenPipe, OutputFormat::Text);
        assert!(matches!(sink.add_batch(&[entry("a")]), Err(SinkError::Closed)));
        assert!(matches!(sink.flush(), Err(SinkError::Closed)));
        assert!(matches!(sink.add_batch(&[entry("b")]), Err(SinkError::Closed)));
    }
}
