//! framebench - encoder throughput benchmark driver.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use framebench_encoder::SyntheticEncoder;
use framebench_engine::{Benchmark, BenchmarkResults};
use framebench_sink::{FileSink, NullSink, Sink};
use framebench_types::{BenchConfig, EncoderSettings};

#[derive(Parser, Debug)]
#[command(about = "Encode pre-generated synthetic frames and report throughput")]
struct Args {
    #[arg(long, default_value_t = 1920)]
    width: u32,
    #[arg(long, default_value_t = 1080)]
    height: u32,
    #[arg(long, default_value_t = 300)]
    frames: usize,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Pre-generate frames to disk instead of memory
    #[arg(long, default_value_t = false)]
    disk_cache: bool,
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Generation worker count (defaults to a multiple of available cores)
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long, default_value_t = 8)]
    queue_capacity: usize,
    /// Log progress every N frames
    #[arg(long, default_value_t = 30)]
    stride: usize,
    #[arg(long, default_value_t = 6000)]
    bitrate: u32,
    #[arg(long, default_value_t = 60)]
    keyframe_interval: u32,
    #[arg(long, default_value_t = 2)]
    lookahead: u32,
    /// Write the encoded stream here; discarded when absent
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Args {
    fn bench_config(&self) -> BenchConfig {
        let defaults = BenchConfig::default();
        BenchConfig {
            width: self.width,
            height: self.height,
            frame_count: self.frames,
            fps: self.fps,
            use_disk_cache: self.disk_cache,
            cache_dir: self.cache_dir.clone().unwrap_or(defaults.cache_dir),
            worker_threads: self.threads,
            write_queue_capacity: self.queue_capacity,
            reporting_stride: self.stride,
            encoder: EncoderSettings {
                bitrate_kbps: self.bitrate,
                keyframe_interval: self.keyframe_interval,
                lookahead: self.lookahead,
            },
            ..defaults
        }
    }

    fn sink(&self) -> Result<Box<dyn Sink>> {
        match self.output {
            Some(ref path) => {
                let sink = FileSink::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                Ok(Box::new(sink))
            }
            None => Ok(Box::new(NullSink)),
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "framebench=info,framebench_engine=info,framebench_frames=info,framebench_encoder=info,framebench_sink=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_report(results: &BenchmarkResults) {
    let m = &results.metrics;
    println!("encoder:        {}", results.encoder);
    println!("state:          {}", results.state.name());
    println!(
        "frames:         {}/{}",
        results.frames_encoded, results.frames_requested
    );
    println!("generation:     {:.3} s", results.generation_secs);
    println!("encode:         {:.3} s", results.encode_secs);
    println!("fps:            {:.2}", results.fps);
    println!("bitrate:        {:.1} kbps", results.bitrate_kbps);
    for (label, timing) in [
        ("copy", &m.copy),
        ("encode", &m.encode),
        ("push", &m.push),
        ("write", &m.write),
        ("frame", &m.frame),
    ] {
        println!(
            "{:<15} avg {:.3} ms, max {:.3} ms, total {:.1} ms",
            format!("{label}:"),
            timing.avg_ms,
            timing.max_ms,
            timing.total_ms
        );
    }
    println!(
        "written:        {} packets, {} bytes, {} discarded",
        results.write.packets_written, results.write.bytes_written, results.write.packets_discarded
    );
    if let Some(ref failure) = results.failure {
        println!("failure:        {failure}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = args.bench_config();
    config.validate().context("invalid benchmark configuration")?;

    let mut encoder = SyntheticEncoder::new(config.width, config.height, config.encoder.clone())
        .context("failed to create encoder")?;
    let sink = args.sink()?;

    info!(
        width = config.width,
        height = config.height,
        frames = config.frame_count,
        disk_cache = config.use_disk_cache,
        "framebench starting"
    );

    let mut benchmark = Benchmark::new(config);
    benchmark.set_generation_progress(|fraction| {
        debug!(progress = fraction, "Frame generation progress");
    });
    let results = benchmark.run(&mut encoder, sink);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_report(&results);
    }

    if !results.is_success() {
        warn!(state = results.state.name(), "Benchmark did not complete");
        anyhow::bail!(
            "benchmark failed: {}",
            results.failure.as_deref().unwrap_or("cancelled")
        );
    }
    Ok(())
}
