use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use framebench_encoder::{EncodedPacket, Encoder, EncoderError, EncoderResult, SyntheticEncoder};
use framebench_engine::{run_benchmark, Benchmark, BenchmarkResults};
use framebench_sink::{MemorySink, Sink, SinkError, SinkResult};
use framebench_types::{BenchConfig, EncoderSettings, RunState};

fn config(frames: usize) -> BenchConfig {
    BenchConfig {
        width: 64,
        height: 64,
        frame_count: frames,
        fps: 30,
        worker_threads: Some(4),
        write_queue_capacity: 4,
        reporting_stride: 5,
        encoder: EncoderSettings {
            keyframe_interval: 10,
            lookahead: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn synthetic(config: &BenchConfig) -> SyntheticEncoder {
    SyntheticEncoder::new(config.width, config.height, config.encoder.clone()).unwrap()
}

fn pts_of(packets: &[EncodedPacket]) -> Vec<i64> {
    packets.iter().map(|p| p.pts).collect()
}

/// Wraps the synthetic encoder and fails on one frame.
struct FailingEncoder {
    inner: SyntheticEncoder,
    fail_at: i64,
    flush_calls: usize,
}

impl Encoder for FailingEncoder {
    fn encode(&mut self, frame: &[u8], pts: i64) -> EncoderResult<Vec<EncodedPacket>> {
        if pts == self.fail_at {
            return Err(EncoderError::Encoding("injected failure".into()));
        }
        self.inner.encode(frame, pts)
    }

    fn flush(&mut self) -> EncoderResult<Vec<EncodedPacket>> {
        self.flush_calls += 1;
        self.inner.flush()
    }

    fn close(&mut self) -> EncoderResult<()> {
        self.inner.close()
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Accepts a fixed number of packets, then fails every write.
struct BrokenSink {
    accept: usize,
    attempts: Arc<AtomicUsize>,
}

impl Sink for BrokenSink {
    fn write(&mut self, _packet: &EncodedPacket) -> SinkResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.accept {
            return Err(SinkError::WriteFailed("disk full".into()));
        }
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Sleeps inside every write.
struct SlowSink {
    delay: Duration,
}

impl Sink for SlowSink {
    fn write(&mut self, _packet: &EncodedPacket) -> SinkResult<()> {
        thread::sleep(self.delay);
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[test]
fn test_memory_run_writes_every_frame_in_order() {
    let config = config(40);
    let mut encoder = synthetic(&config);
    let sink = MemorySink::new();

    let results = run_benchmark(config, &mut encoder, Box::new(sink.clone()));

    assert!(results.is_success(), "{:?}", results.failure);
    assert_eq!(results.state, RunState::Completed);
    assert_eq!(results.frames_encoded, 40);
    assert_eq!(results.write.packets_written, 40);
    assert_eq!(results.write.packets_discarded, 0);
    assert_eq!(pts_of(&sink.packets()), (0..40).collect::<Vec<_>>());
    assert!(sink.is_closed());

    let bytes: u64 = sink.packets().iter().map(|p| p.len() as u64).sum();
    assert_eq!(results.metrics.bytes, bytes);
    assert_eq!(results.write.bytes_written, bytes);
    assert!(results.bitrate_kbps > 0.0);
    assert_eq!(results.encoder, "synthetic");
}

#[test]
fn test_keyframes_follow_interval() {
    let config = config(25);
    let mut encoder = synthetic(&config);
    let sink = MemorySink::new();

    run_benchmark(config, &mut encoder, Box::new(sink.clone()));

    let keyframes: Vec<i64> = sink
        .packets()
        .iter()
        .filter(|p| p.is_keyframe())
        .map(|p| p.pts)
        .collect();
    assert_eq!(keyframes, vec![0, 10, 20]);
}

#[test]
fn test_disk_run_matches_memory_run() {
    let temp = tempfile::tempdir().unwrap();

    let memory_config = config(16);
    let memory_sink = MemorySink::new();
    let mut encoder = synthetic(&memory_config);
    let memory = run_benchmark(memory_config.clone(), &mut encoder, Box::new(memory_sink.clone()));

    let disk_config = BenchConfig {
        use_disk_cache: true,
        cache_dir: temp.path().join("frames"),
        ..memory_config
    };
    let disk_sink = MemorySink::new();
    let mut encoder = synthetic(&disk_config);
    let disk = run_benchmark(disk_config, &mut encoder, Box::new(disk_sink.clone()));

    assert!(memory.is_success());
    assert!(disk.is_success());

    let memory_payloads: Vec<_> = memory_sink.packets().into_iter().map(|p| p.payload).collect();
    let disk_payloads: Vec<_> = disk_sink.packets().into_iter().map(|p| p.payload).collect();
    assert_eq!(memory_payloads, disk_payloads);
}

#[test]
fn test_encode_failure_reports_partial_results() {
    let config = config(20);
    let mut encoder = FailingEncoder {
        inner: synthetic(&config),
        fail_at: 5,
        flush_calls: 0,
    };
    let sink = MemorySink::new();
    let mut benchmark = Benchmark::new(config);

    let results = benchmark.run(&mut encoder, Box::new(sink.clone()));

    assert!(results.state.is_failed());
    assert!(!results.is_success());
    assert_eq!(results.frames_encoded, 5);
    assert!(results.failure.as_deref().unwrap().contains("frame 5"));
    assert_eq!(encoder.flush_calls, 0);

    // Lookahead 3: frames 0 and 1 were emitted before the failure
    assert_eq!(pts_of(&sink.packets()), vec![0, 1]);
    assert!(sink.is_closed());
    assert_eq!(results.write.packets_written, 2);

    let names: Vec<_> = benchmark.state_history().iter().map(RunState::name).collect();
    assert_eq!(names, vec!["Initializing", "Running", "Draining", "Failed"]);
}

#[test]
fn test_progress_callback_can_cancel() {
    let config = BenchConfig {
        reporting_stride: 4,
        ..config(30)
    };
    let mut encoder = synthetic(&config);
    let sink = MemorySink::new();
    let mut benchmark = Benchmark::new(config);

    let mut reported = Vec::new();
    let results = benchmark.run_with_progress(&mut encoder, Box::new(sink.clone()), |index, _| {
        reported.push(index);
        index < 8
    });

    assert_eq!(reported, vec![0, 4, 8]);
    assert!(results.cancelled);
    assert!(!results.is_success());
    assert_eq!(results.state, RunState::Completed);
    assert_eq!(results.frames_encoded, 9);

    // Buffered frames are flushed after cancellation
    assert_eq!(pts_of(&sink.packets()), (0..9).collect::<Vec<_>>());
}

#[test]
fn test_invalid_config_fails_before_running() {
    let config = BenchConfig {
        write_queue_capacity: 0,
        ..config(10)
    };
    let mut encoder = synthetic(&config);
    let sink = MemorySink::new();
    let mut benchmark = Benchmark::new(config);

    let results = benchmark.run(&mut encoder, Box::new(sink.clone()));

    assert!(results.state.is_failed());
    assert_eq!(results.frames_encoded, 0);
    assert!(sink.packets().is_empty());
    assert!(!benchmark.cache().is_ready());
    assert_eq!(encoder.buffered_frames(), 0);
    assert!(!benchmark.state_history().iter().any(RunState::is_running));
}

#[test]
fn test_sink_failure_does_not_stall_run() {
    let config = BenchConfig {
        write_queue_capacity: 1,
        ..config(20)
    };
    let mut encoder = synthetic(&config);
    let attempts = Arc::new(AtomicUsize::new(0));
    let sink = BrokenSink {
        accept: 2,
        attempts: Arc::clone(&attempts),
    };

    let results = run_benchmark(config, &mut encoder, Box::new(sink));

    assert!(results.write_failed);
    assert!(results.state.is_failed());
    assert_eq!(results.frames_encoded, 20);
    assert_eq!(results.write.packets_written, 2);
    assert_eq!(results.write.packets_discarded, 18);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(results.failure.unwrap().contains("disk full"));
}

#[test]
fn test_second_run_reuses_cache() {
    let config = config(12);
    let mut benchmark = Benchmark::new(config.clone());

    let mut first_encoder = synthetic(&config);
    let first_sink = MemorySink::new();
    let first = benchmark.run(&mut first_encoder, Box::new(first_sink.clone()));

    let mut second_encoder = synthetic(&config);
    let second_sink = MemorySink::new();
    let second = benchmark.run(&mut second_encoder, Box::new(second_sink.clone()));

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(first_sink.packets(), second_sink.packets());
    assert_eq!(benchmark.state_history().first(), Some(&RunState::Initializing));
}

#[test]
fn test_generation_progress_reaches_one() {
    let config = config(24);
    let mut encoder = synthetic(&config);
    let mut benchmark = Benchmark::new(config);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    benchmark.set_generation_progress(move |fraction| sink_seen.lock().push(fraction));

    let results = benchmark.run(&mut encoder, Box::new(MemorySink::new()));
    assert!(results.is_success());

    let seen = seen.lock();
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen.last().copied(), Some(1.0));
}

#[test]
fn test_cancel_during_generation_fails_run() {
    let config = BenchConfig {
        worker_threads: Some(1),
        ..config(50)
    };
    let mut encoder = synthetic(&config);
    let mut benchmark = Benchmark::new(config);

    let cancel = benchmark.cancel_token();
    benchmark.set_generation_progress(move |fraction| {
        if fraction >= 0.2 {
            cancel.cancel();
        }
    });

    let results = benchmark.run(&mut encoder, Box::new(MemorySink::new()));

    assert!(results.cancelled);
    assert!(results.state.is_failed());
    assert_eq!(results.frames_encoded, 0);
    assert!(!benchmark.cache().is_ready());
}

#[test]
fn test_slow_sink_shows_in_write_metrics() {
    let config = BenchConfig {
        write_queue_capacity: 64,
        ..config(10)
    };
    let mut encoder = synthetic(&config);
    let sink = SlowSink {
        delay: Duration::from_millis(5),
    };

    let results = run_benchmark(config, &mut encoder, Box::new(sink));

    assert!(results.is_success());
    let write = results.metrics.write;
    assert!(write.total_ms >= 50.0, "{write:?}");
    assert!(write.max_ms >= 5.0);
    assert!((write.avg_ms - write.total_ms / 10.0).abs() < 1e-9);
    assert_eq!(write.total_ms, results.write.write_time.total_ms);
}

#[test]
fn test_results_serialize_to_json() {
    let config = config(8);
    let mut encoder = synthetic(&config);
    let results = run_benchmark(config, &mut encoder, Box::new(MemorySink::new()));

    let json = serde_json::to_string(&results).unwrap();
    let parsed: BenchmarkResults = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.state, RunState::Completed);
    assert_eq!(parsed.frames_encoded, 8);
    assert_eq!(parsed.write, results.write);
    assert_eq!(parsed.metrics.bytes, results.metrics.bytes);
    assert!(parsed.is_success());
}
