use std::env;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Simulated origin latency in milliseconds (from ORIGIN_LATENCY_MS env var, defaults to 20)
    pub origin_latency_ms: u64,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,

    /// Number of identical fetches issued per pass (from BENCH_FANOUT env var, defaults to 16)
    pub fanout: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            origin_latency_ms: env::var("ORIGIN_LATENCY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            sample_size: env::var("BENCH_SAMPLE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            fanout: env::var("BENCH_FANOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!("  Origin Latency: {}ms", config.origin_latency_ms);
        eprintln!("  Sample Size: {}", config.sample_size);
        eprintln!("  Fan-out: {}", config.fanout);
        config
    }
}
