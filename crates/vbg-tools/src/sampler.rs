//! Resource sampler - peak memory and wall-clock measurement
//!
//! A sampler is started right after a child process is spawned. It polls the
//! child's resident memory on a short interval from a background task and
//! keeps the highest value seen in a shared atomic. Stopping the sampler
//! cancels the loop and returns the measurement.
//!
//! Measurement never affects the outcome of the measured invocation: when the
//! process cannot be observed the memory field is reported as unknown.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default polling interval
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one measured invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Wall-clock time from invocation start to completion
    pub elapsed_ms: u64,
    /// Highest resident memory observed, `None` when unknown
    pub peak_memory_bytes: Option<u64>,
    /// Number of successful samples
    pub samples: u32,
}

impl ResourceUsage {
    /// Usage for an invocation whose process was never observed
    #[must_use]
    pub fn unmeasured(elapsed: Duration) -> Self {
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
            peak_memory_bytes: None,
            samples: 0,
        }
    }

    /// Elapsed time as a `Duration`
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Peak memory in MiB, if known
    #[must_use]
    pub fn peak_memory_mib(&self) -> Option<f64> {
        self.peak_memory_bytes
            .map(|bytes| bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Factory for per-invocation sampling tasks
#[derive(Debug, Clone, Copy)]
pub struct ResourceSampler {
    interval: Duration,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

impl ResourceSampler {
    /// Create a sampler polling at the given interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        // A zero interval would spin the loop.
        let interval = interval.max(Duration::from_millis(1));
        Self { interval }
    }

    /// Polling interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start sampling `pid`. `started` marks the beginning of the invocation
    /// and is the origin of the reported elapsed time.
    ///
    /// A missing pid (the child already exited before its id was read)
    /// yields an unknown peak.
    pub fn start(&self, pid: Option<u32>, started: Instant) -> ActiveSampling {
        let peak = Arc::new(AtomicU64::new(0));
        let samples = Arc::new(AtomicU32::new(0));
        let stop = CancellationToken::new();

        let handle = pid.map(|raw| {
            tokio::spawn(sample_loop(
                Pid::from_u32(raw),
                self.interval,
                Arc::clone(&peak),
                Arc::clone(&samples),
                stop.clone(),
            ))
        });

        ActiveSampling {
            started,
            peak,
            samples,
            stop,
            handle,
        }
    }
}

/// A running sampling task bound to one invocation
pub struct ActiveSampling {
    started: Instant,
    peak: Arc<AtomicU64>,
    samples: Arc<AtomicU32>,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ActiveSampling {
    /// Stop sampling and return the measurement
    pub async fn stop(mut self) -> ResourceUsage {
        let elapsed = self.started.elapsed();
        self.stop.cancel();

        let observed = match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Sampler task did not finish cleanly");
                    false
                }
            },
            None => false,
        };

        ResourceUsage {
            elapsed_ms: elapsed.as_millis() as u64,
            peak_memory_bytes: observed.then(|| self.peak.load(Ordering::Relaxed)),
            samples: self.samples.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ActiveSampling {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn sample_loop(
    pid: Pid,
    interval: Duration,
    peak: Arc<AtomicU64>,
    samples: Arc<AtomicU32>,
    stop: CancellationToken,
) {
    let mut system = System::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_memory(),
                );
                match system.process(pid) {
                    Some(process) => {
                        peak.fetch_max(process.memory(), Ordering::Relaxed);
                        samples.fetch_add(1, Ordering::Relaxed);
                    }
                    None => {
                        trace!(pid = %pid, "Sampled process has exited");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmeasured_usage() {
        let usage = ResourceUsage::unmeasured(Duration::from_millis(1500));
        assert_eq!(usage.elapsed_ms, 1500);
        assert_eq!(usage.peak_memory_bytes, None);
        assert_eq!(usage.peak_memory_mib(), None);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let sampler = ResourceSampler::new(Duration::ZERO);
        assert!(sampler.interval() > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_missing_pid_reports_unknown_peak() {
        let sampler = ResourceSampler::default();
        let active = sampler.start(None, Instant::now());
        let usage = active.stop().await;
        assert_eq!(usage.peak_memory_bytes, None);
        assert_eq!(usage.samples, 0);
    }

    #[tokio::test]
    async fn test_samples_own_process() {
        let sampler = ResourceSampler::new(Duration::from_millis(10));
        let active = sampler.start(Some(std::process::id()), Instant::now());
        tokio::time::sleep(Duration::from_millis(60)).await;
        let usage = active.stop().await;

        assert!(usage.samples >= 1);
        assert!(usage.peak_memory_bytes.unwrap_or(0) > 0);
        assert!(usage.elapsed_ms >= 60);
    }

    #[tokio::test]
    async fn test_exited_process_is_not_an_error() {
        // u32::MAX is never a live pid
        let sampler = ResourceSampler::new(Duration::from_millis(10));
        let active = sampler.start(Some(u32::MAX), Instant::now());
        tokio::time::sleep(Duration::from_millis(30)).await;
        let usage = active.stop().await;

        assert_eq!(usage.samples, 0);
        assert_eq!(usage.peak_memory_bytes, Some(0));
    }
}
