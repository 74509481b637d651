//! Newline-delimited frames to any `io::Write`.

use chainwatch_core::{MessageSink, TransportError};
use std::io::{self, Write};

pub struct WriterSink<W> {
    writer: W,
    endpoint: String,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, endpoint: impl Into<String>) -> Self {
        Self {
            writer,
            endpoint: endpoint.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), "stdout")
    }
}

impl<W: Write + Send> MessageSink for WriterSink<W> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.writer
            .write_all(frame)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|source| TransportError::Send {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
