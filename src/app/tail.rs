// LogTrail - app/tail.rs
//
// File tailing engine: watches one file for appended bytes, decodes them and
// queues the resulting entries for the dispatcher.
//
// Each cycle:
//   1. Stat the file. A missing file is transient; try again next cycle.
//   2. Size below the read position means the file was truncated or rotated:
//      restart from byte 0 and drop any carried-over partial line.
//   3. Read exactly the bytes between the read position and the current size.
//   4. Split at the last newline. Complete lines are decoded; the bytes after
//      the last newline are an in-progress line and carried to the next cycle.
//      Splitting on the raw bytes keeps multi-byte UTF-8 sequences intact.
//   5. Queue the entries. The queue lock is held only for the push.
//
// Errors during a cycle are logged by the loop and the cycle is retried after
// the refresh interval; they never end the loop.

use crate::app::queue::PendingQueue;
use crate::app::worker::CancelToken;
use crate::core::decoder::MessageDecoder;
use crate::util::constants::MAX_PARTIAL_LINE_BYTES;
use crate::util::error::LogTrailError;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Public types
// =============================================================================

/// Read progress through one monitored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailState {
    pub file_name: PathBuf,
    /// Bytes of the file consumed so far.
    pub position_read_to: u64,
    /// Bytes after the last newline of the previous read.
    pub partial: Vec<u8>,
}

/// What one tailing cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The file does not exist right now.
    FileMissing,
    /// No new bytes.
    Unchanged,
    /// The file shrank to the read position or below and has nothing new.
    Truncated,
    /// New bytes were read.
    Read {
        bytes: u64,
        entries: usize,
        /// The file was truncated first and reading restarted at 0.
        truncated: bool,
    },
}

// =============================================================================
// TailEngine
// =============================================================================

/// Owns the tail state for one file. Runs on the tailing worker thread.
pub struct TailEngine {
    state: TailState,
    decoder: Arc<MessageDecoder>,
    queue: PendingQueue,
    /// Mirror of `state.position_read_to` for observers on other threads.
    position: Arc<AtomicU64>,
}

impl TailEngine {
    /// Create an engine for `file_name`.
    ///
    /// With `load_existing_content` the first cycle reads the whole file;
    /// otherwise reading starts at the current end of file (0 if the file
    /// does not exist yet).
    pub fn new(
        file_name: impl Into<PathBuf>,
        decoder: Arc<MessageDecoder>,
        queue: PendingQueue,
        load_existing_content: bool,
    ) -> Self {
        let file_name = file_name.into();
        let start = if load_existing_content {
            0
        } else {
            std::fs::metadata(&file_name).map(|m| m.len()).unwrap_or(0)
        };
        tracing::debug!(
            file = %file_name.display(),
            offset = start,
            load_existing_content,
            "Tail: seeding initial offset"
        );
        Self {
            state: TailState {
                file_name,
                position_read_to: start,
                partial: Vec::new(),
            },
            decoder,
            queue,
            position: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Continue from a state left by an earlier engine, e.g. after the
    /// provider was paused. Nothing before `state.position_read_to` is read
    /// again.
    pub fn resume(state: TailState, decoder: Arc<MessageDecoder>, queue: PendingQueue) -> Self {
        tracing::debug!(
            file = %state.file_name.display(),
            offset = state.position_read_to,
            partial = state.partial.len(),
            "Tail: resuming"
        );
        let position = Arc::new(AtomicU64::new(state.position_read_to));
        Self {
            state,
            decoder,
            queue,
            position,
        }
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn position(&self) -> u64 {
        self.state.position_read_to
    }

    /// Shared handle to the read position, updated after every read.
    pub fn position_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.position)
    }

    fn set_position(&mut self, position: u64) {
        self.state.position_read_to = position;
        self.position.store(position, Ordering::SeqCst);
    }

    /// Run one tailing cycle.
    pub fn poll_once(&mut self) -> Result<CycleOutcome, LogTrailError> {
        let path = self.state.file_name.clone();

        let length = match std::fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CycleOutcome::FileMissing);
            }
            Err(e) => {
                return Err(LogTrailError::Io {
                    path,
                    operation: "stat",
                    source: e,
                });
            }
        };

        let mut truncated = false;
        if length < self.state.position_read_to {
            tracing::info!(
                file = %path.display(),
                old_offset = self.state.position_read_to,
                new_size = length,
                "Tail: file truncated or rotated, resetting offset to 0"
            );
            self.set_position(0);
            self.state.partial.clear();
            truncated = true;
        }

        if length == self.state.position_read_to {
            return Ok(if truncated {
                CycleOutcome::Truncated
            } else {
                CycleOutcome::Unchanged
            });
        }

        let start = self.state.position_read_to;
        let new_bytes = read_range(&path, start, length - start).map_err(|e| LogTrailError::Io {
            path: path.clone(),
            operation: "read",
            source: e,
        })?;

        let n = new_bytes.len() as u64;
        if n == 0 {
            return Ok(CycleOutcome::Unchanged);
        }
        self.set_position(start + n);

        self.state.partial.extend_from_slice(&new_bytes);
        let Some(last_newline) = self.state.partial.iter().rposition(|b| *b == b'\n') else {
            if self.state.partial.len() > MAX_PARTIAL_LINE_BYTES {
                tracing::warn!(
                    file = %path.display(),
                    bytes = self.state.partial.len(),
                    "Tail: unterminated line exceeds limit, discarding"
                );
                self.state.partial.clear();
            }
            return Ok(CycleOutcome::Read {
                bytes: n,
                entries: 0,
                truncated,
            });
        };

        let remainder = self.state.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.state.partial, remainder);
        let text = String::from_utf8_lossy(&complete);

        let result = self.decoder.decode(&text);
        let entries = result.entries.len();
        if entries > 0 {
            tracing::debug!(file = %path.display(), count = entries, "Tail: new entries");
        }
        self.queue.push_all(result.entries);

        Ok(CycleOutcome::Read {
            bytes: n,
            entries,
            truncated,
        })
    }

    /// Poll until `cancel` fires, sleeping `interval` between cycles.
    /// Returns the final state so a later engine can resume from it.
    pub fn run(mut self, cancel: CancelToken, interval: Duration) -> TailState {
        let file = self.state.file_name.clone();
        tracing::info!(file = %file.display(), "Tail: started");

        let mut missing_reported = false;
        loop {
            match self.poll_once() {
                Ok(CycleOutcome::FileMissing) => {
                    if !missing_reported {
                        tracing::warn!(file = %file.display(), "Tail: file not found, waiting");
                        missing_reported = true;
                    }
                }
                Ok(_) => missing_reported = false,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "Tail: cycle failed");
                }
            }

            if cancel.sleep(interval) {
                break;
            }
        }

        tracing::info!(
            file = %file.display(),
            position = self.state.position_read_to,
            "Tail: stopped"
        );
        self.state
    }
}

/// Read up to `len` bytes of `path` starting at `offset`.
///
/// Opens a fresh handle each cycle so writers and rotators are never blocked.
fn read_range(path: &Path, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}
