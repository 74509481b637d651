//! # chainwatch-sink
//!
//! [`MessageSink`](chainwatch_core::MessageSink) implementations.
//!
//! | Sink            | Use                                                    |
//! |-----------------|--------------------------------------------------------|
//! | `TcpPushSink`   | production; downstream consumers connect and pull      |
//! | `WriterSink`    | `--stdout` and log files                               |
//! | `MemorySink`    | tests                                                  |
//!
//! Every sink writes one compact JSON document per line.

pub mod memory;
pub mod tcp;
pub mod writer;

pub use memory::MemorySink;
pub use tcp::{parse_endpoint, TcpPushSink};
pub use writer::WriterSink;
