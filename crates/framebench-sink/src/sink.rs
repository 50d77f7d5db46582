//! Packet sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use framebench_encoder::EncodedPacket;

use crate::SinkResult;

/// Destination for encoded packets.
///
/// A sink is owned by the writer thread for its whole life and is closed
/// by that thread once the queue has drained.
pub trait Sink: Send {
    /// Write one packet.
    fn write(&mut self, packet: &EncodedPacket) -> SinkResult<()>;

    /// Flush and release the destination.
    fn close(&mut self) -> SinkResult<()>;

    /// Get sink name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Writes packet payloads back to back as a raw elementary stream.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) the output file.
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "Output file created");
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&mut self, packet: &EncodedPacket) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "file sink closed")
        })?;
        writer.write_all(&packet.payload)?;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
            debug!(path = %self.path.display(), "Output file closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Keeps written packets in memory behind a shared handle.
#[derive(Clone, Default)]
pub struct MemorySink {
    packets: Arc<Mutex<Vec<EncodedPacket>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    /// Create an empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets written so far, in write order.
    pub fn packets(&self) -> Vec<EncodedPacket> {
        self.packets.lock().clone()
    }

    /// Whether the writer has closed this sink.
    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl Sink for MemorySink {
    fn write(&mut self, packet: &EncodedPacket) -> SinkResult<()> {
        self.packets.lock().push(packet.clone());
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        *self.closed.lock() = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Discards packets.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write(&mut self, _packet: &EncodedPacket) -> SinkResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
