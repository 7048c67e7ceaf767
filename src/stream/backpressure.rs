//! Backpressure controller (spec.md §4.7, §5).
//!
//! Every check interval the controller samples p95 orchestration latency and
//! the failure count since the last check; crossing either threshold pauses
//! consumption, and it resumes once a full interval comes back clean. One
//! [`evaluate`](BackpressureController::evaluate) call *is* one interval's
//! worth of signal — the hysteresis property from spec.md §8 ("does not
//! oscillate within a single check interval") falls out of that shape for
//! free, since the pause flag only ever changes once per call.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering}
    },
    time::Duration
};

/// Default latency threshold (spec.md §4.7: 200 ms).
pub const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_millis(200);
/// Default failure-count threshold (spec.md §4.7: 5).
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 5;
/// Default check interval (spec.md §4.7: 5 s).
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub struct BackpressureController {
    latencies:         Mutex<Vec<Duration>>,
    failures:          AtomicU64,
    paused:            AtomicBool,
    latency_threshold: Duration,
    failure_threshold: u64
}

impl BackpressureController {
    pub fn new(latency_threshold: Duration, failure_threshold: u64) -> Self {
        Self {
            latencies: Mutex::new(Vec::new()),
            failures: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            latency_threshold,
            failure_threshold
        }
    }

    pub fn record_latency(&self, elapsed: Duration) {
        self.latencies.lock().expect("backpressure lock poisoned").push(elapsed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Roll up the samples collected since the last call into a pause/resume
    /// decision, then reset the window. Call once per check interval.
    pub fn evaluate(&self) -> bool {
        let mut latencies = self.latencies.lock().expect("backpressure lock poisoned");
        let p95 = percentile_95(&mut latencies);
        latencies.clear();
        drop(latencies);

        let failures = self.failures.swap(0, Ordering::AcqRel);
        let breach = p95.is_some_and(|p| p > self.latency_threshold) || failures > self.failure_threshold;
        self.paused.store(breach, Ordering::Release);
        breach
    }
}

impl Default for BackpressureController {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_THRESHOLD, DEFAULT_FAILURE_THRESHOLD)
    }
}

fn percentile_95(samples: &mut [Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();
    let idx = (((samples.len() - 1) as f64) * 0.95).round() as usize;
    Some(samples[idx])
}
