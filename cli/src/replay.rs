//! JSON-lines event source: one `ChainEvent` per line, blank lines skipped.

use async_trait::async_trait;
use chainwatch_core::{ChainEvent, EventSource, WatcherError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<Option<ChainEvent>, WatcherError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| WatcherError::Source(format!("read failed after line {}: {e}", self.line_no)))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| WatcherError::Source(format!("line {}: {e}", self.line_no)));
        }
    }
}
