//! Build benchmark - baseline timing of a project build command
//!
//! Runs a build command a few times after an optional warmup and reports
//! mean/min/max wall-clock time plus the peak memory seen across runs.

use crate::error::{Error, Result};
use crate::sampler::ResourceSampler;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// Aggregate of the measured runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMeasurement {
    /// Command line that was measured
    pub command: String,
    /// Number of measured runs
    pub runs: u32,
    /// Mean duration in milliseconds
    pub mean_ms: f64,
    /// Fastest run in milliseconds
    pub min_ms: u64,
    /// Slowest run in milliseconds
    pub max_ms: u64,
    /// Highest resident memory across runs
    pub peak_memory_bytes: Option<u64>,
}

/// Repeated build runner
#[derive(Debug, Clone)]
pub struct BuildBenchmark {
    iterations: u32,
    warmup: u32,
    timeout: Duration,
    sampler: ResourceSampler,
}

impl BuildBenchmark {
    /// Create a benchmark with `iterations` measured runs
    #[must_use]
    pub fn new(iterations: u32, warmup: u32, timeout: Duration) -> Self {
        Self {
            iterations: iterations.max(1),
            warmup,
            timeout,
            sampler: ResourceSampler::default(),
        }
    }

    /// Use a custom sampler
    #[must_use]
    pub fn with_sampler(mut self, sampler: ResourceSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Measure `program args` run from `cwd`.
    ///
    /// Any failed run aborts the benchmark: a baseline made of failing
    /// builds is meaningless.
    pub async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<BuildMeasurement> {
        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            command = %command_line,
            iterations = self.iterations,
            warmup = self.warmup,
            "Starting build benchmark"
        );

        for i in 0..self.warmup {
            debug!(run = i + 1, "Warmup run");
            self.run_once(program, args, cwd).await?;
        }

        let mut durations = Vec::with_capacity(self.iterations as usize);
        let mut peak: Option<u64> = None;
        for i in 0..self.iterations {
            let (elapsed_ms, run_peak) = self.run_once(program, args, cwd).await?;
            debug!(run = i + 1, elapsed_ms, "Measured run");
            durations.push(elapsed_ms);
            peak = match (peak, run_peak) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let total: u64 = durations.iter().sum();
        let measurement = BuildMeasurement {
            command: command_line,
            runs: self.iterations,
            mean_ms: total as f64 / durations.len() as f64,
            min_ms: durations.iter().copied().min().unwrap_or_default(),
            max_ms: durations.iter().copied().max().unwrap_or_default(),
            peak_memory_bytes: peak,
        };

        info!(
            command = %measurement.command,
            mean_ms = measurement.mean_ms,
            peak_memory_bytes = ?measurement.peak_memory_bytes,
            "Build benchmark completed"
        );
        Ok(measurement)
    }

    async fn run_once(&self, program: &str, args: &[String], cwd: &Path) -> Result<(u64, Option<u64>)> {
        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::NotFound(program.to_string()),
                _ => Error::Io(e),
            })?;

        let sampling = self.sampler.start(child.id(), started);
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(Error::Timeout(self.timeout.as_millis() as u64));
            }
        };
        let usage = sampling.stop().await;

        if !status.success() {
            return Err(Error::Execution(format!(
                "'{}' exited with {}",
                program,
                status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string())
            )));
        }

        Ok((usage.elapsed_ms, usage.peak_memory_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterations_at_least_one() {
        let bench = BuildBenchmark::new(0, 0, Duration::from_secs(1));
        assert_eq!(bench.iterations, 1);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let bench = BuildBenchmark::new(1, 0, Duration::from_secs(5));
        let err = bench
            .run("vbg-test-no-such-build-tool", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_measures_runs() {
        let dir = tempfile::tempdir().unwrap();
        let bench = BuildBenchmark::new(2, 1, Duration::from_secs(10));
        let args = vec!["-c".to_string(), "sleep 0.05".to_string()];
        let m = bench.run("sh", &args, dir.path()).await.unwrap();

        assert_eq!(m.runs, 2);
        assert_eq!(m.command, "sh -c sleep 0.05");
        assert!(m.min_ms >= 50);
        assert!(m.max_ms >= m.min_ms);
        assert!(m.mean_ms >= m.min_ms as f64);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_build_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let bench = BuildBenchmark::new(1, 0, Duration::from_secs(10));
        let args = vec!["-c".to_string(), "exit 2".to_string()];
        let err = bench.run("sh", &args, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let bench = BuildBenchmark::new(1, 0, Duration::from_millis(200));
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let err = bench.run("sh", &args, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(200)));
    }
}
