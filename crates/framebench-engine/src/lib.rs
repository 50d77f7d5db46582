//! Benchmark orchestrator for framebench.
//!
//! This crate drives the encoder under test over a pre-generated frame
//! cache, forwards its packets to the write queue and accumulates per-frame
//! timings into the final results.

mod error;
mod metrics;
mod orchestrator;
mod results;

pub use error::EngineError;
pub use metrics::MetricsAccumulator;
pub use orchestrator::Benchmark;
pub use results::BenchmarkResults;

use framebench_encoder::Encoder;
use framebench_sink::Sink;
use framebench_types::BenchConfig;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Run one benchmark with the synthetic frame cache and no progress reporting.
pub fn run_benchmark(
    config: BenchConfig,
    encoder: &mut dyn Encoder,
    sink: Box<dyn Sink>,
) -> BenchmarkResults {
    Benchmark::new(config).run(encoder, sink)
}
