//! Transport layer for protocol messages
//!
//! Incoming messages are a stream of JSON values with no framing: any
//! whitespace, newlines included, may separate them, and one value may span
//! several lines. Outgoing messages are written one JSON value per line.
//!
//! A value that fails to parse is reported as an [`io::ErrorKind::InvalidData`]
//! error and the input up to the end of the offending line is dropped, so the
//! next call picks up with the following line.

use serde::Serialize;
use serde_json::{Deserializer, Value};
use std::io::{self, BufRead, BufReader, Read, Stdin, Stdout, Write};

/// A trait for transporting protocol messages
pub trait Transport {
    /// Reads the next message; `None` once the peer closed the stream.
    ///
    /// Malformed input yields an `InvalidData` error; the transport stays
    /// usable afterwards.
    fn read_message(&mut self) -> io::Result<Option<Value>>;

    /// Writes a message and flushes it.
    fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<()>;
}

/// Transport over any byte reader and writer.
pub struct StreamTransport<R: Read, W: Write> {
    incoming: BufReader<R>,
    /// Complete lines read but not yet consumed as values.
    pending: String,
    outgoing: W,
}

impl<R: Read, W: Write> std::fmt::Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    /// Creates a transport reading from `reader` and writing to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            incoming: BufReader::new(reader),
            pending: String::new(),
            outgoing: writer,
        }
    }

    /// Drops pending input through the end of its `line`th line (1-based).
    fn skip_lines(&mut self, line: usize) {
        let end = self
            .pending
            .match_indices('\n')
            .nth(line.saturating_sub(1))
            .map_or(self.pending.len(), |(index, _)| index + 1);
        self.pending.drain(..end);
    }
}

impl StreamTransport<Stdin, Stdout> {
    /// Standard I/O transport (stdin/stdout)
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> Transport for StreamTransport<R, W> {
    fn read_message(&mut self) -> io::Result<Option<Value>> {
        loop {
            let parsed = {
                let mut values = Deserializer::from_str(&self.pending).into_iter::<Value>();
                let next = values.next();
                next.map(|value| value.map(|value| (value, values.byte_offset())))
            };
            match parsed {
                Some(Ok((value, consumed))) => {
                    self.pending.drain(..consumed);
                    return Ok(Some(value));
                }
                // The value continues on a line not read yet.
                Some(Err(e)) if e.is_eof() => {}
                Some(Err(e)) => {
                    self.skip_lines(e.line());
                    return Err(io::Error::new(io::ErrorKind::InvalidData, e));
                }
                None => self.pending.clear(),
            }

            let mut line = String::new();
            if self.incoming.read_line(&mut line)? == 0 {
                if self.pending.trim().is_empty() {
                    return Ok(None);
                }
                self.pending.clear();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "stream ended inside a message",
                ));
            }
            self.pending.push_str(&line);
        }
    }

    fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.outgoing, message)?;
        self.outgoing.write_all(b"\n")?;
        self.outgoing.flush()
    }
}
