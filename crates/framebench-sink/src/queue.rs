//! Bounded write queue with a background writer thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};

use framebench_encoder::EncodedPacket;
use framebench_types::{ConfigError, TimingSummary};

use crate::error::SinkError;
use crate::sink::Sink;
use crate::SinkResult;

/// Called by the writer thread with the duration of each successful sink write.
pub type WriteObserver = Arc<dyn Fn(Duration) + Send + Sync>;

/// Outcome of draining a write queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Packets the sink accepted.
    pub packets_written: u64,

    /// Payload bytes the sink accepted.
    pub bytes_written: u64,

    /// Packets consumed after the sink failed and never written.
    pub packets_discarded: u64,

    /// Time spent inside `Sink::write`.
    pub write_time: TimingSummary,

    /// First sink error, if any.
    pub error: Option<String>,
}

impl WriteReport {
    /// Whether any sink operation failed.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Counters updated by the writer thread.
#[derive(Default)]
struct WriteStats {
    packets_written: AtomicU64,
    bytes_written: AtomicU64,
    packets_discarded: AtomicU64,
    write_ns_total: AtomicU64,
    write_ns_max: AtomicU64,
    failed: AtomicBool,
}

impl WriteStats {
    fn record_write(&self, bytes: usize, elapsed: Duration) {
        let nanos = elapsed.as_nanos() as u64;
        self.packets_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.write_ns_total.fetch_add(nanos, Ordering::Relaxed);
        self.write_ns_max.fetch_max(nanos, Ordering::Relaxed);
    }

    fn record_discard(&self) {
        self.packets_discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self, error: Option<String>) -> WriteReport {
        let packets = self.packets_written.load(Ordering::Relaxed);
        let total_ms = self.write_ns_total.load(Ordering::Relaxed) as f64 / 1e6;
        WriteReport {
            packets_written: packets,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            packets_discarded: self.packets_discarded.load(Ordering::Relaxed),
            write_time: TimingSummary {
                total_ms,
                avg_ms: if packets > 0 {
                    total_ms / packets as f64
                } else {
                    0.0
                },
                max_ms: self.write_ns_max.load(Ordering::Relaxed) as f64 / 1e6,
            },
            error,
        }
    }
}

/// Bounded FIFO of encoded packets drained by one writer thread.
///
/// [`WriteQueue::push`] blocks while `capacity` packets are waiting, so a
/// slow sink throttles the producer instead of growing memory. A failing
/// sink never blocks producers: the writer keeps consuming and counts the
/// remaining packets as discarded.
pub struct WriteQueue {
    sender: Option<Sender<EncodedPacket>>,
    writer: Option<JoinHandle<Option<SinkError>>>,
    capacity: usize,
    stats: Arc<WriteStats>,
    report: Option<WriteReport>,
}

impl WriteQueue {
    /// Spawn the writer thread for `sink`.
    pub fn start(sink: Box<dyn Sink>, capacity: usize) -> SinkResult<Self> {
        Self::start_observed(sink, capacity, None)
    }

    /// Spawn the writer thread, reporting every sink write to `observer`.
    #[instrument(name = "write_queue_start", skip(sink, observer), fields(sink = sink.name()))]
    pub fn start_observed(
        sink: Box<dyn Sink>,
        capacity: usize,
        observer: Option<WriteObserver>,
    ) -> SinkResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity.into());
        }

        let (sender, receiver): (Sender<EncodedPacket>, Receiver<EncodedPacket>) =
            crossbeam_channel::bounded(capacity);
        let stats = Arc::new(WriteStats::default());

        let writer_stats = Arc::clone(&stats);
        let writer = thread::Builder::new()
            .name("packet-writer".into())
            .spawn(move || writer_loop(sink, receiver, writer_stats, observer))
            .map_err(SinkError::SpawnFailed)?;

        info!("Writer thread started");

        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            capacity,
            stats,
            report: None,
        })
    }

    /// Enqueue a packet, blocking while the queue is full.
    pub fn push(&self, packet: EncodedPacket) -> SinkResult<()> {
        let sender = self.sender.as_ref().ok_or(SinkError::QueueClosed)?;
        sender.send(packet).map_err(|_| SinkError::QueueClosed)
    }

    /// Packets waiting for the writer.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Maximum number of waiting packets.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Packets written so far.
    pub fn packets_written(&self) -> u64 {
        self.stats.packets_written.load(Ordering::Relaxed)
    }

    /// Whether the sink has reported a failure.
    pub fn has_failed(&self) -> bool {
        self.stats.failed.load(Ordering::SeqCst)
    }

    /// Stop accepting packets, wait for the writer to drain everything
    /// already queued, and return the write report.
    ///
    /// Safe to call before any push and more than once.
    #[instrument(name = "write_queue_drain", skip(self))]
    pub fn drain_and_stop(&mut self) -> WriteReport {
        if let Some(ref report) = self.report {
            return report.clone();
        }

        debug!(pending = self.pending(), "Draining write queue");

        // Dropping the only sender ends the writer's receive loop once empty
        self.sender = None;

        let error = match self.writer.take() {
            Some(handle) => match handle.join() {
                Ok(error) => error.map(|e| e.to_string()),
                Err(_) => {
                    error!("Writer thread panicked");
                    Some(SinkError::WriterPanicked.to_string())
                }
            },
            None => None,
        };

        let report = self.stats.report(error);
        info!(
            packets_written = report.packets_written,
            bytes_written = report.bytes_written,
            packets_discarded = report.packets_discarded,
            failed = report.failed(),
            "Write queue drained"
        );

        self.report = Some(report.clone());
        report
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        if self.report.is_none() {
            self.drain_and_stop();
        }
    }
}

/// Writer thread body. Returns the first sink error.
fn writer_loop(
    mut sink: Box<dyn Sink>,
    receiver: Receiver<EncodedPacket>,
    stats: Arc<WriteStats>,
    observer: Option<WriteObserver>,
) -> Option<SinkError> {
    debug!(sink = sink.name(), "Writer loop starting");

    let mut first_error: Option<SinkError> = None;

    for packet in receiver.iter() {
        if first_error.is_some() {
            stats.record_discard();
            continue;
        }

        let start = Instant::now();
        match sink.write(&packet) {
            Ok(()) => {
                let elapsed = start.elapsed();
                stats.record_write(packet.len(), elapsed);
                if let Some(ref observer) = observer {
                    observer(elapsed);
                }
                trace!(pts = packet.pts, size = packet.len(), "Packet written");
            }
            Err(e) => {
                error!(pts = packet.pts, "Sink write failed: {}", e);
                stats.failed.store(true, Ordering::SeqCst);
                stats.record_discard();
                first_error = Some(e);
            }
        }
    }

    if let Err(e) = sink.close() {
        warn!("Sink close failed: {}", e);
        stats.failed.store(true, Ordering::SeqCst);
        first_error.get_or_insert(e);
    }

    debug!("Writer loop stopped");
    first_error
}
