//! Encoded packet write-back for framebench.
//!
//! This crate decouples "packet produced by the encoder" from "packet
//! written to the sink" with a bounded queue drained by one writer thread.

mod error;
mod queue;
mod sink;

pub use error::SinkError;
pub use queue::{WriteObserver, WriteQueue, WriteReport};
pub use sink::{FileSink, MemorySink, NullSink, Sink};

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
