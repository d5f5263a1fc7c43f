use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters describing the scanner itself
#[derive(Clone)]
pub struct Metrics {
    pub cycles_completed: Arc<AtomicU64>,
    pub cycles_aborted: Arc<AtomicU64>,
    pub fs_stats_failures: Arc<AtomicU64>,
    pub dir_failures: Arc<AtomicU64>,
    pub last_cycle_duration_ms: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles_completed: Arc::new(AtomicU64::new(0)),
            cycles_aborted: Arc::new(AtomicU64::new(0)),
            fs_stats_failures: Arc::new(AtomicU64::new(0)),
            dir_failures: Arc::new(AtomicU64::new(0)),
            last_cycle_duration_ms: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_cycle_completed(&self, duration: Duration) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_duration_ms.store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn inc_cycles_aborted(&self) {
        self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fs_stats_failures(&self) {
        self.fs_stats_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dir_failures(&self) {
        self.dir_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            fs_stats_failures: self.fs_stats_failures.load(Ordering::Relaxed),
            dir_failures: self.dir_failures.load(Ordering::Relaxed),
            last_cycle_duration_ms: self.last_cycle_duration_ms.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub fs_stats_failures: u64,
    pub dir_failures: u64,
    pub last_cycle_duration_ms: u64,
    pub uptime_seconds: u64,
}
