// LogTrail - core/segmenter.rs
//
// Reassembles physical lines into logical messages.
//
// A line matching the start-of-message pattern opens a message. In
// continuation mode the lines after it that do not match (stack traces,
// wrapped text) are folded into that message until the next matching line or
// end of stream. Lines that appear before any message head have nothing to
// attach to; they are logged and dropped.

use crate::core::model::{MultilineMode, RawMessage};
use crate::core::reader::PeekLineReader;
use crate::util::logging::preview;
use regex::Regex;
use std::io::{self, BufRead};

/// Iterator over the messages in one read cycle's text.
pub struct Segments<'p, R> {
    reader: PeekLineReader<R>,
    start: &'p Regex,
    mode: MultilineMode,
    orphans: usize,
    done: bool,
}

impl<'p, R: BufRead> Segments<'p, R> {
    pub fn new(source: R, start: &'p Regex, mode: MultilineMode) -> Self {
        Self {
            reader: PeekLineReader::new(source),
            start,
            mode,
            orphans: 0,
            done: false,
        }
    }

    /// Lines dropped so far because no message head preceded them.
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    fn next_message(&mut self) -> io::Result<Option<RawMessage>> {
        loop {
            let Some(line) = self.reader.read_line()? else {
                return Ok(None);
            };

            if !self.start.is_match(&line) {
                self.orphans += 1;
                tracing::warn!(
                    line = %preview(&line),
                    "Line does not start a message and has no message to join, skipping"
                );
                continue;
            }

            let mut message = RawMessage::new(line);
            if self.mode == MultilineMode::Continuation {
                while let Some(next) = self.reader.peek_next_line_only()? {
                    if self.start.is_match(&next) {
                        break;
                    }
                    // Consume the line we just looked at.
                    if let Some(extra) = self.reader.read_line()? {
                        message.extras.push(extra);
                    }
                }
            }
            return Ok(Some(message));
        }
    }
}

impl<R: BufRead> Iterator for Segments<'_, R> {
    type Item = io::Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
