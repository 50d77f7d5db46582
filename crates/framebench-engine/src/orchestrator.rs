//! Benchmark run loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use framebench_encoder::{EncodedPacket, Encoder};
use framebench_frames::FrameCache;
use framebench_sink::{Sink, WriteQueue, WriteReport};
use framebench_types::{BenchConfig, CancelToken, PerfSnapshot, RunState};

use crate::error::EngineError;
use crate::metrics::MetricsAccumulator;
use crate::results::BenchmarkResults;
use crate::EngineResult;

/// How the encode loop ended.
struct LoopOutcome {
    failure: Option<EngineError>,
    cancelled: bool,
}

/// Drives one encoder over a pre-generated frame cache.
///
/// Frames are fed to the encoder strictly in order on the calling thread.
/// Generation workers and the packet writer run on their own threads
/// behind blocking calls.
pub struct Benchmark {
    config: BenchConfig,
    cache: FrameCache,
    state: Arc<RwLock<RunState>>,
    history: Vec<RunState>,
    cancel: CancelToken,
}

impl Benchmark {
    /// Create a benchmark over synthetic frames.
    pub fn new(config: BenchConfig) -> Self {
        Self::with_cache(config, FrameCache::synthetic())
    }

    /// Create a benchmark over a caller-supplied frame cache.
    pub fn with_cache(config: BenchConfig, mut cache: FrameCache) -> Self {
        let cancel = CancelToken::new();
        cache.set_cancel_token(cancel.clone());
        Self {
            config,
            cache,
            state: Arc::new(RwLock::new(RunState::Idle)),
            history: vec![RunState::Idle],
            cancel,
        }
    }

    /// Register a callback for frame generation progress.
    pub fn set_generation_progress<F>(&mut self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.cache.set_progress_callback(callback);
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.state.read().clone()
    }

    /// Shared handle for observing the run state from another thread.
    pub fn state_handle(&self) -> Arc<RwLock<RunState>> {
        Arc::clone(&self.state)
    }

    /// States entered during the most recent run, in order.
    pub fn state_history(&self) -> &[RunState] {
        &self.history
    }

    /// Token that stops the current run between frames.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The frame cache backing this benchmark.
    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Run configuration.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run the benchmark without progress reporting.
    pub fn run(&mut self, encoder: &mut dyn Encoder, sink: Box<dyn Sink>) -> BenchmarkResults {
        self.run_with_progress(encoder, sink, |_, _| true)
    }

    /// Run the benchmark.
    ///
    /// `progress` is called with the frame index and a cumulative snapshot
    /// every `reporting_stride` frames and on the last frame; returning
    /// `false` requests cancellation. Buffered output is still flushed and
    /// written after a cancellation or an encoder failure.
    #[instrument(name = "benchmark_run", skip_all, fields(
        encoder = encoder.name(),
        frames = self.config.frame_count,
    ))]
    pub fn run_with_progress<F>(
        &mut self,
        encoder: &mut dyn Encoder,
        sink: Box<dyn Sink>,
        mut progress: F,
    ) -> BenchmarkResults
    where
        F: FnMut(u64, &PerfSnapshot) -> bool,
    {
        self.cancel.reset();
        self.history.clear();
        self.transition_to(RunState::Initializing);

        let mut metrics = MetricsAccumulator::new(self.config.fps);

        let generation_start = Instant::now();
        if let Err(e) = self.initialize() {
            error!("Benchmark initialization failed: {}", e);
            let cancelled = e.is_cancelled();
            return self.finish(FinishArgs {
                encoder: encoder.name(),
                metrics: &metrics,
                generation: generation_start.elapsed(),
                encode: Duration::ZERO,
                write: WriteReport::default(),
                failure: Some(e),
                cancelled,
            });
        }
        let generation = generation_start.elapsed();

        let mut queue = match WriteQueue::start_observed(
            sink,
            self.config.write_queue_capacity,
            Some(metrics.write_observer()),
        ) {
            Ok(queue) => queue,
            Err(e) => {
                error!("Failed to start writer: {}", e);
                return self.finish(FinishArgs {
                    encoder: encoder.name(),
                    metrics: &metrics,
                    generation,
                    encode: Duration::ZERO,
                    write: WriteReport::default(),
                    failure: Some(e.into()),
                    cancelled: false,
                });
            }
        };

        self.transition_to(RunState::Running { frames_encoded: 0 });
        metrics.start();

        let mut outcome = self.encode_frames(encoder, &queue, &mut metrics, &mut progress);

        self.transition_to(RunState::Draining);

        if outcome.failure.is_none() {
            if let Err(e) = flush_encoder(encoder, &queue, &mut metrics) {
                error!("Encoder flush failed: {}", e);
                outcome.failure = Some(e);
            }
        }
        if let Err(e) = encoder.close() {
            warn!("Encoder close failed: {}", e);
        }

        let write = queue.drain_and_stop();
        let encode = metrics.elapsed();

        self.finish(FinishArgs {
            encoder: encoder.name(),
            metrics: &metrics,
            generation,
            encode,
            write,
            failure: outcome.failure,
            cancelled: outcome.cancelled,
        })
    }

    fn initialize(&self) -> EngineResult<()> {
        self.config.validate()?;
        self.cache.initialize(&self.config.cache_config())?;
        Ok(())
    }

    /// Feed every frame to the encoder in order.
    fn encode_frames<F>(
        &self,
        encoder: &mut dyn Encoder,
        queue: &WriteQueue,
        metrics: &mut MetricsAccumulator,
        progress: &mut F,
    ) -> LoopOutcome
    where
        F: FnMut(u64, &PerfSnapshot) -> bool,
    {
        let total = self.config.frame_count;
        let stride = self.config.reporting_stride;
        let mut scratch = Vec::with_capacity(self.config.frame_size());

        for index in 0..total {
            if self.cancel.is_cancelled() {
                info!(index, "Run cancelled");
                return LoopOutcome {
                    failure: None,
                    cancelled: true,
                };
            }

            let frame_start = Instant::now();
            if let Err(e) = self.cache.read_frame_into(index, &mut scratch) {
                error!(index, "Frame retrieval failed: {}", e);
                return LoopOutcome {
                    failure: Some(e.into()),
                    cancelled: false,
                };
            }
            let copy = frame_start.elapsed();

            let encode_start = Instant::now();
            let packets = match encoder.encode(&scratch, index as i64) {
                Ok(packets) => packets,
                Err(source) => {
                    error!(index, "Encode error: {}", source);
                    return LoopOutcome {
                        failure: Some(EngineError::Encode { index, source }),
                        cancelled: false,
                    };
                }
            };
            let encode = encode_start.elapsed();

            let push_start = Instant::now();
            if let Err(e) = push_packets(queue, packets, metrics) {
                return LoopOutcome {
                    failure: Some(e),
                    cancelled: false,
                };
            }
            let push = push_start.elapsed();

            metrics.record(copy, encode, push);
            *self.state.write() = RunState::Running {
                frames_encoded: metrics.frames(),
            };

            let last = index + 1 == total;
            if index % stride == 0 || last {
                let snapshot = metrics.snapshot();
                info!(
                    frames = snapshot.frames,
                    fps = snapshot.fps,
                    pending = queue.pending(),
                    "Encode progress"
                );
                if !progress(index as u64, &snapshot) {
                    info!(index, "Cancellation requested by progress callback");
                    self.cancel.cancel();
                }
            }
        }

        LoopOutcome {
            failure: None,
            cancelled: false,
        }
    }

    fn finish(&mut self, args: FinishArgs<'_>) -> BenchmarkResults {
        let write_failed = args.write.failed();
        let failure = match (args.failure, args.write.error.clone()) {
            (Some(e), _) => Some(e.to_string()),
            (None, Some(sink_error)) => Some(format!("Sink error: {sink_error}")),
            (None, None) => None,
        };

        let final_state = match failure {
            Some(ref message) => RunState::Failed {
                message: message.clone(),
            },
            None => RunState::Completed,
        };
        self.transition_to(final_state.clone());

        let snapshot = args.metrics.snapshot_at(args.encode);
        let encode_secs = args.encode.as_secs_f64();
        let fps = if encode_secs > 0.0 {
            snapshot.frames as f64 / encode_secs
        } else {
            0.0
        };

        let results = BenchmarkResults {
            state: final_state,
            failure,
            cancelled: args.cancelled,
            write_failed,
            encoder: args.encoder.to_string(),
            frames_requested: self.config.frame_count,
            frames_encoded: snapshot.frames,
            generation_secs: args.generation.as_secs_f64(),
            encode_secs,
            fps,
            bitrate_kbps: snapshot.bitrate_kbps,
            metrics: snapshot,
            write: args.write,
        };

        info!(
            state = results.state.name(),
            frames = results.frames_encoded,
            fps = results.fps,
            bitrate_kbps = results.bitrate_kbps,
            cancelled = results.cancelled,
            "Benchmark finished"
        );

        results
    }

    fn transition_to(&mut self, new_state: RunState) {
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, new_state.clone())
        };

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.history.push(new_state);
    }
}

/// Inputs to [`Benchmark::finish`].
struct FinishArgs<'a> {
    encoder: &'static str,
    metrics: &'a MetricsAccumulator,
    generation: Duration,
    encode: Duration,
    write: WriteReport,
    failure: Option<EngineError>,
    cancelled: bool,
}

/// Hand packets to the writer in encoder output order.
fn push_packets(
    queue: &WriteQueue,
    packets: Vec<EncodedPacket>,
    metrics: &mut MetricsAccumulator,
) -> EngineResult<()> {
    for packet in packets {
        metrics.add_bytes(packet.len());
        queue.push(packet)?;
    }
    Ok(())
}

/// Drain the encoder until it reports end of stream.
fn flush_encoder(
    encoder: &mut dyn Encoder,
    queue: &WriteQueue,
    metrics: &mut MetricsAccumulator,
) -> EngineResult<()> {
    let mut flushed = 0usize;
    loop {
        let packets = encoder.flush().map_err(EngineError::Flush)?;
        if packets.is_empty() {
            break;
        }
        flushed += packets.len();
        push_packets(queue, packets, metrics)?;
    }
    debug!(flushed, "Encoder drained");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use framebench_encoder::SyntheticEncoder;
    use framebench_sink::MemorySink;
    use framebench_types::EncoderSettings;

    fn small_config(frames: usize) -> BenchConfig {
        BenchConfig {
            width: 32,
            height: 32,
            frame_count: frames,
            fps: 30,
            worker_threads: Some(2),
            write_queue_capacity: 2,
            reporting_stride: 4,
            encoder: EncoderSettings {
                keyframe_interval: 8,
                lookahead: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn encoder_for(config: &BenchConfig) -> SyntheticEncoder {
        SyntheticEncoder::new(config.width, config.height, config.encoder.clone()).unwrap()
    }

    #[test]
    fn test_state_sequence_for_successful_run() {
        let config = small_config(12);
        let mut encoder = encoder_for(&config);
        let mut benchmark = Benchmark::new(config);

        let results = benchmark.run(&mut encoder, Box::new(MemorySink::new()));

        assert!(results.is_success());
        assert_eq!(
            benchmark
                .state_history()
                .iter()
                .map(RunState::name)
                .collect::<Vec<_>>(),
            vec!["Initializing", "Running", "Draining", "Completed"]
        );
        assert_eq!(benchmark.state(), RunState::Completed);
    }

    #[test]
    fn test_progress_reported_on_stride_and_last_frame() {
        let config = small_config(10);
        let mut encoder = encoder_for(&config);
        let mut benchmark = Benchmark::new(config);

        let mut calls = Vec::new();
        let results = benchmark.run_with_progress(
            &mut encoder,
            Box::new(MemorySink::new()),
            |index, snapshot| {
                calls.push((index, snapshot.frames));
                true
            },
        );

        assert!(results.is_success());
        assert_eq!(calls, vec![(0, 1), (4, 5), (8, 9), (9, 10)]);
    }

    #[test]
    fn test_invalid_config_never_runs() {
        let config = BenchConfig {
            width: 31,
            ..small_config(4)
        };
        let mut encoder = SyntheticEncoder::new(32, 32, EncoderSettings::default()).unwrap();
        let mut benchmark = Benchmark::new(config);

        let results = benchmark.run(&mut encoder, Box::new(MemorySink::new()));

        assert!(results.state.is_failed());
        assert_eq!(results.frames_encoded, 0);
        assert!(!benchmark
            .state_history()
            .iter()
            .any(|state| state.is_running()));
        assert!(results.failure.unwrap().contains("Invalid configuration"));
    }
}
