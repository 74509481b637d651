//! The `MessageSink` trait and the publisher that feeds it.

use crate::error::{TransportError, WatcherError};
use crate::message::OutboundMessage;

/// A fire-and-forget, one-directional transport.
///
/// `send` delivers one opaque frame. It may block until the transport can
/// accept the frame; there is no acknowledgment and no retry.
pub trait MessageSink: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// The transport's identifier (bind address or name).
    fn endpoint(&self) -> &str;
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Serializes messages to compact JSON and pushes them through a sink.
pub struct Publisher {
    sink: Box<dyn MessageSink>,
    sent: u64,
}

impl Publisher {
    pub fn new(sink: Box<dyn MessageSink>) -> Self {
        Self { sink, sent: 0 }
    }

    pub fn publish<M: OutboundMessage>(&mut self, msg: &M) -> Result<(), WatcherError> {
        let frame = serde_json::to_vec(msg)?;
        self.sink.send(&frame)?;
        self.sent += 1;
        tracing::debug!(
            msg_type = %msg.msg_type(),
            block_num = msg.block_num(),
            bytes = frame.len(),
            endpoint = self.sink.endpoint(),
            "Published message"
        );
        Ok(())
    }

    /// Number of messages published so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn endpoint(&self) -> &str {
        self.sink.endpoint()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::message::BlockMessage;
    use chrono::Utc;

    struct Broken;

    impl MessageSink for Broken {
        fn send(&mut self, _frame: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::Closed("no peer".into()))
        }
        fn endpoint(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn publish_writes_one_json_frame() {
        let sink = RecordingSink::default();
        let mut publisher = Publisher::new(Box::new(sink.clone()));
        publisher.publish(&BlockMessage::new(9, Utc::now())).unwrap();

        let msgs = sink.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["block_num"], 9);
        assert_eq!(msgs[0]["msg_type"], 0);
        assert_eq!(publisher.sent(), 1);
    }

    #[test]
    fn send_failure_propagates() {
        let mut publisher = Publisher::new(Box::new(Broken));
        let err = publisher.publish(&BlockMessage::new(1, Utc::now())).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(publisher.sent(), 0);
    }
}
