// LogTrail - app/dispatch.rs
//
// Batch dispatcher ("purge loop"): periodically drains the pending queue and
// hands the batch to the sink.
//
// The drain takes everything queued, in order, under the queue lock; the sink
// is called after the lock is released. A sink failure puts the batch back at
// the front of the queue so ordering is kept. Retries are bounded: after
// MAX_DISPATCH_RETRIES consecutive failures, or once the queue outgrows
// MAX_PENDING_ENTRIES, the backlog is dropped and logged. A sink that reports
// a terminal error ends the loop and stops the producer with it.

use crate::app::queue::PendingQueue;
use crate::app::sink::LogSink;
use crate::app::worker::CancelToken;
use crate::util::constants::{MAX_DISPATCH_RETRIES, MAX_PENDING_ENTRIES};
use crate::util::error::SinkError;
use std::sync::Arc;
use std::time::Duration;

/// Deliver everything currently queued as one batch.
///
/// The sink's own backlog is flushed first; if that fails nothing is drained.
/// Returns the number of entries delivered (0 when the queue was empty and
/// the sink was not called). On error the batch has been re-queued.
pub fn dispatch_once(queue: &PendingQueue, sink: &dyn LogSink) -> Result<usize, SinkError> {
    sink.flush()?;

    let batch = queue.drain();
    if batch.is_empty() {
        return Ok(0);
    }

    match sink.add_batch(&batch) {
        Ok(()) => Ok(batch.len()),
        Err(e) => {
            queue.requeue_front(batch);
            Err(e)
        }
    }
}

/// What one dispatch cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was queued.
    Idle,
    Delivered(usize),
    /// The sink failed; the entries stay queued for the next cycle.
    Retrying { pending: usize, failures: u32 },
    /// The sink kept failing and the queued entries were discarded.
    Dropped { count: usize },
}

/// Dispatch cycles for one queue and sink, with a bounded retry policy.
pub struct Dispatcher {
    queue: PendingQueue,
    sink: Arc<dyn LogSink>,
    failures: u32,
}

impl Dispatcher {
    pub fn new(queue: PendingQueue, sink: Arc<dyn LogSink>) -> Self {
        Self {
            queue,
            sink,
            failures: 0,
        }
    }

    /// Consecutive failed cycles so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run one cycle.
    ///
    /// `Err` means the sink will never accept entries again; everything that
    /// was queued has been discarded.
    pub fn cycle(&mut self) -> Result<DispatchOutcome, SinkError> {
        match dispatch_once(&self.queue, self.sink.as_ref()) {
            Ok(0) => {
                self.failures = 0;
                Ok(DispatchOutcome::Idle)
            }
            Ok(count) => {
                self.failures = 0;
                tracing::debug!(count, "Dispatch: batch delivered");
                Ok(DispatchOutcome::Delivered(count))
            }
            Err(e) if e.is_terminal() => {
                let dropped = self.queue.clear();
                tracing::error!(error = %e, dropped, "Dispatch: sink closed, queued entries discarded");
                Err(e)
            }
            Err(e) => {
                self.failures += 1;
                let pending = self.queue.len();
                if self.failures >= MAX_DISPATCH_RETRIES || pending > MAX_PENDING_ENTRIES {
                    let count = self.queue.clear();
                    tracing::error!(
                        error = %e,
                        dropped = count,
                        failures = self.failures,
                        "Dispatch: sink keeps failing, queued entries dropped"
                    );
                    self.failures = 0;
                    return Ok(DispatchOutcome::Dropped { count });
                }
                tracing::warn!(
                    error = %e,
                    pending,
                    failures = self.failures,
                    "Dispatch: sink rejected batch, will retry"
                );
                Ok(DispatchOutcome::Retrying {
                    pending,
                    failures: self.failures,
                })
            }
        }
    }
}

/// Dispatch every `interval` until `cancel` fires, then flush once more so
/// entries decoded before the stop still reach the sink.
///
/// A terminal sink error cancels `producer` and ends the loop.
pub fn run_purge_loop(
    queue: PendingQueue,
    sink: Arc<dyn LogSink>,
    cancel: CancelToken,
    producer: CancelToken,
    interval: Duration,
) {
    tracing::debug!("Dispatch: started");
    let mut dispatcher = Dispatcher::new(queue, sink);
    loop {
        if cancel.sleep(interval) {
            break;
        }
        if dispatcher.cycle().is_err() {
            producer.cancel();
            tracing::warn!("Dispatch: stopped, sink is closed");
            return;
        }
    }

    if dispatcher.cycle().is_err() {
        producer.cancel();
    }
    tracing::debug!(pending = dispatcher.pending(), "Dispatch: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sink::{MemorySink, WriterSink};
    use crate::app::worker::Worker;
    use crate::core::export::{self, OutputFormat};
    use crate::core::model::LogEntry;
    use chrono::Utc;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    fn entries(descriptions: &[&str]) -> Vec<LogEntry> {
        descriptions
            .iter()
            .map(|d| {
                let mut e = LogEntry::new(Utc::now());
                e.description = d.to_string();
                e
            })
            .collect()
    }

    /// Fails until `healthy` is set, then records into `inner`.
    struct FlakySink {
        healthy: AtomicBool,
        inner: MemorySink,
    }

    impl LogSink for FlakySink {
        fn add_batch(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(SinkError::Rejected {
                    reason: "not ready".to_string(),
                });
            }
            self.inner.add_batch(entries)
        }
    }

    /// Always fails with a terminal error.
    struct ClosedSink;

    impl LogSink for ClosedSink {
        fn add_batch(&self, _: &[LogEntry]) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    /// In-memory writer that accepts only `budget` more bytes, then errors.
    #[derive(Clone)]
    struct BudgetWriter {
        inner: Arc<Mutex<(Vec<u8>, usize)>>,
    }

    impl BudgetWriter {
        fn new(budget: usize) -> Self {
            Self {
                inner: Arc::new(Mutex::new((Vec::new(), budget))),
            }
        }

        fn set_budget(&self, budget: usize) {
            self.inner.lock().unwrap().1 = budget;
        }

        fn output(&self) -> String {
            String::from_utf8(self.inner.lock().unwrap().0.clone()).unwrap()
        }
    }

    impl Write for BudgetWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut inner = self.inner.lock().unwrap();
            if inner.1 == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(inner.1);
            inner.0.extend_from_slice(&buf[..n]);
            inner.1 -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn rendered(batch: &[LogEntry], format: OutputFormat) -> String {
        let mut out = Vec::new();
        export::write_entries(batch, format, &mut out, true).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_queue_does_not_call_sink() {
        let queue = PendingQueue::new();
        let sink = MemorySink::new();
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 0);
        assert_eq!(sink.batch_count(), 0);
    }

    #[test]
    fn test_whole_queue_delivered_as_one_batch() {
        let queue = PendingQueue::new();
        queue.push_all(entries(&["a", "b", "c"]));
        let sink = MemorySink::new();
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 3);
        assert!(queue.is_empty());
        assert_eq!(sink.batch_count(), 1);
    }

    #[test]
    fn test_failed_batch_requeued_in_order() {
        let queue = PendingQueue::new();
        let sink = FlakySink {
            healthy: AtomicBool::new(false),
            inner: MemorySink::new(),
        };
        queue.push_all(entries(&["a", "b"]));
        assert!(dispatch_once(&queue, &sink).is_err());
        assert_eq!(queue.len(), 2);

        queue.push_all(entries(&["c"]));
        sink.healthy.store(true, Ordering::SeqCst);
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 3);
        let got: Vec<String> = sink
            .inner
            .entries()
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_write_failing_midway_delivers_each_entry_once() {
        let writer = BudgetWriter::new(40);
        let sink = WriterSink::new(writer.clone(), OutputFormat::Text);
        let queue = PendingQueue::new();
        let first = entries(&["a", "b"]);
        queue.push_all(first.clone());

        // The writer takes 40 bytes: all of "a" and the start of "b".
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 2);
        assert!(queue.is_empty());
        assert!(sink.backlog() > 0);

        writer.set_budget(usize::MAX);
        let second = entries(&["c"]);
        queue.push_all(second.clone());
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 1);
        assert_eq!(sink.backlog(), 0);

        let expected = rendered(&first, OutputFormat::Text) + &rendered(&second, OutputFormat::Text);
        let out = writer.output();
        assert_eq!(out, expected);
        assert_eq!(out.lines().filter(|l| l.ends_with(": a")).count(), 1);
    }

    #[test]
    fn test_write_failing_before_any_byte_requeues_without_fragments() {
        let writer = BudgetWriter::new(0);
        let sink = WriterSink::new(writer.clone(), OutputFormat::Json);
        let queue = PendingQueue::new();
        let batch = entries(&["a", "b"]);
        queue.push_all(batch.clone());

        assert!(dispatch_once(&queue, &sink).is_err());
        assert_eq!(queue.len(), 2);
        assert!(writer.output().is_empty());

        writer.set_budget(usize::MAX);
        assert_eq!(dispatch_once(&queue, &sink).unwrap(), 2);
        let out = writer.output();
        assert_eq!(out, rendered(&batch, OutputFormat::Json));
        for line in out.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn test_backlog_dropped_after_retry_limit() {
        let queue = PendingQueue::new();
        let sink = Arc::new(FlakySink {
            healthy: AtomicBool::new(false),
            inner: MemorySink::new(),
        });
        let mut dispatcher = Dispatcher::new(queue.clone(), sink.clone());
        queue.push_all(entries(&["a", "b"]));

        for attempt in 1..MAX_DISPATCH_RETRIES {
            assert_eq!(
                dispatcher.cycle().unwrap(),
                DispatchOutcome::Retrying {
                    pending: 2,
                    failures: attempt
                }
            );
        }
        assert_eq!(dispatcher.cycle().unwrap(), DispatchOutcome::Dropped { count: 2 });
        assert!(queue.is_empty());
        assert_eq!(dispatcher.failures(), 0);

        sink.healthy.store(true, Ordering::SeqCst);
        queue.push_all(entries(&["c"]));
        assert_eq!(dispatcher.cycle().unwrap(), DispatchOutcome::Delivered(1));
        assert_eq!(sink.inner.len(), 1);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let queue = PendingQueue::new();
        let sink = Arc::new(FlakySink {
            healthy: AtomicBool::new(false),
            inner: MemorySink::new(),
        });
        let mut dispatcher = Dispatcher::new(queue.clone(), sink.clone());
        queue.push_all(entries(&["a"]));
        dispatcher.cycle().unwrap();
        dispatcher.cycle().unwrap();
        assert_eq!(dispatcher.failures(), 2);

        sink.healthy.store(true, Ordering::SeqCst);
        assert_eq!(dispatcher.cycle().unwrap(), DispatchOutcome::Delivered(1));
        assert_eq!(dispatcher.failures(), 0);
    }

    #[test]
    fn test_closed_sink_discards_queue() {
        let queue = PendingQueue::new();
        let mut dispatcher = Dispatcher::new(queue.clone(), Arc::new(ClosedSink));
        queue.push_all(entries(&["a", "b"]));
        assert!(matches!(dispatcher.cycle(), Err(SinkError::Closed)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closed_sink_stops_loop_and_producer() {
        let producer = Worker::spawn("producer", |cancel| {
            while !cancel.sleep(Duration::from_secs(60)) {}
        })
        .unwrap();
        let producer_token = producer.token();

        let queue = PendingQueue::new();
        queue.push_all(entries(&["a"]));
        let loop_queue = queue.clone();
        let dispatch = Worker::spawn("dispatch", move |cancel| {
            run_purge_loop(
                loop_queue,
                Arc::new(ClosedSink),
                cancel,
                producer_token,
                Duration::from_millis(10),
            );
        })
        .unwrap();

        let started = Instant::now();
        while !(dispatch.is_finished() && producer.is_finished())
            && started.elapsed() < Duration::from_secs(5)
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(dispatch.is_finished());
        assert!(producer.is_finished());
        assert!(queue.is_empty());
    }
}
