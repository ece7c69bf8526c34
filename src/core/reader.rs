// LogTrail - core/reader.rs
//
// Line reader with unbounded lookahead.
//
// The segmenter needs to look at the line after a message head (and the one
// after that, and so on) before deciding whether it belongs to the message.
// Peeked lines are kept in a FIFO and handed out again by `read_line`, so
// every source line is returned by `read_line` exactly once, in order.

use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Line reader over a `BufRead` source with a lookahead queue.
pub struct PeekLineReader<R> {
    source: R,
    /// Lines already pulled from the source but not yet returned by `read_line`.
    peeked: VecDeque<String>,
    /// The source has reported end of stream.
    exhausted: bool,
}

impl<R: BufRead> PeekLineReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            peeked: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next line in source order, or `None` at end of stream.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.peeked.pop_front() {
            return Ok(Some(line));
        }
        self.next_source_line()
    }

    /// Read the next line not yet seen by any peek and append it to the
    /// lookahead queue. Successive calls walk further ahead.
    pub fn peek_line(&mut self) -> io::Result<Option<String>> {
        match self.next_source_line()? {
            Some(line) => {
                self.peeked.push_back(line.clone());
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    /// The line `read_line` would return next, without consuming it.
    pub fn peek_next_line_only(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.peeked.front() {
            return Ok(Some(line.clone()));
        }
        self.peek_line()
    }

    /// Number of lines waiting in the lookahead queue.
    pub fn buffered(&self) -> usize {
        self.peeked.len()
    }

    fn next_source_line(&mut self) -> io::Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut line = String::new();
        if self.source.read_line(&mut line)? == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> PeekLineReader<Cursor<Vec<u8>>> {
        PeekLineReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_read_strips_line_endings() {
        let mut r = reader("one\r\ntwo\nthree");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("three"));
        assert_eq!(r.read_line().unwrap(), None);
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn test_peek_walks_ahead_and_read_replays() {
        let mut r = reader("a\nb\nc\nd\n");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.peek_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.peek_line().unwrap().as_deref(), Some("c"));
        assert_eq!(r.buffered(), 2);

        assert_eq!(r.read_line().unwrap().as_deref(), Some("b"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("c"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("d"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn test_peek_next_line_only_is_stable() {
        let mut r = reader("x\ny\n");
        assert_eq!(r.peek_next_line_only().unwrap().as_deref(), Some("x"));
        assert_eq!(r.peek_next_line_only().unwrap().as_deref(), Some("x"));
        assert_eq!(r.buffered(), 1);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("x"));
        assert_eq!(r.peek_next_line_only().unwrap().as_deref(), Some("y"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("y"));
        assert_eq!(r.peek_next_line_only().unwrap(), None);
    }

    #[test]
    fn test_peek_at_end_returns_none() {
        let mut r = reader("only\n");
        assert_eq!(r.peek_line().unwrap().as_deref(), Some("only"));
        assert_eq!(r.peek_line().unwrap(), None);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("only"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let mut r = reader("a\n\nb\n");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("a"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("b"));
    }
}
