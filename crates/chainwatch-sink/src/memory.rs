//! In-memory sink for tests and embedding.

use chainwatch_core::{MessageSink, TransportError};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Records every frame. Clones share the same buffer, so a test can keep a
/// handle while the watcher owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Frames parsed as JSON. Frames that are not valid JSON are skipped.
    pub fn messages(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .filter_map(|f| serde_json::from_slice(f).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl MessageSink for MemorySink {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_vec());
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}
