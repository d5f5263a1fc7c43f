//! Periodic disk-usage scanning of the storage root.
//!
//! [`DiskUsageScanner`] owns the current [`Snapshot`]. A cycle builds a
//! complete new snapshot off to the side and installs it with a single `Arc`
//! swap, so readers see either the previous result or the new one in full.

pub mod fs;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use chrono::Utc;
use thiserror::Error;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::metrics::Metrics;
use crate::template::Matcher;
use crate::types::{DataPoint, FilesystemStats, Snapshot};

pub use self::fs::{DirEntryInfo, LocalFs, StorageBackend};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The storage root could not be listed; the previous snapshot stays current.
    #[error("failed to list storage root {path}: {source}")]
    ListRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a completed cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories that matched the template and were measured.
    pub matched: usize,
    /// Entries that were not directories or did not match.
    pub skipped: usize,
    /// Matched directories whose size could not be computed.
    pub failed: usize,
    pub fs_stats_available: bool,
    pub duration: Duration,
}

pub struct DiskUsageScanner {
    root: PathBuf,
    matcher: Arc<Matcher>,
    backend: Arc<dyn StorageBackend>,
    current: RwLock<Arc<Snapshot>>,
    metrics: Metrics,
}

impl DiskUsageScanner {
    /// Creates the scanner and runs the first cycle before returning.
    ///
    /// A failed first cycle is logged and leaves the empty initial snapshot
    /// in place; the background loop retries on its next tick.
    pub fn new(root: impl Into<PathBuf>, matcher: Arc<Matcher>, backend: Arc<dyn StorageBackend>) -> Self {
        let scanner = Self {
            root: root.into(),
            matcher,
            backend,
            current: RwLock::new(Arc::new(Snapshot::default())),
            metrics: Metrics::new(),
        };
        if let Err(e) = scanner.run_scan_cycle() {
            tracing::warn!("Initial scan failed, serving an empty snapshot until the next cycle: {}", e);
        }
        scanner
    }

    /// Scans the local filesystem.
    pub fn local(root: impl Into<PathBuf>, matcher: Arc<Matcher>) -> Self {
        Self::new(root, matcher, Arc::new(LocalFs))
    }

    /// Returns the most recently installed snapshot without waiting for a running cycle.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Runs one full pass over the storage root and installs the result.
    pub fn run_scan_cycle(&self) -> Result<ScanSummary, ScanError> {
        let start = Instant::now();
        let mut summary = ScanSummary::default();

        let fs_stats = match self.backend.fs_stats(&self.root) {
            Ok(stats) => {
                summary.fs_stats_available = true;
                stats
            }
            Err(e) => {
                self.metrics.inc_fs_stats_failures();
                tracing::warn!("Error getting filesystem stats for {}: {}", self.root.display(), e);
                FilesystemStats::default()
            }
        };

        let entries = match self.backend.list_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) => {
                self.metrics.inc_cycles_aborted();
                tracing::error!("Error reading storage root {}: {}", self.root.display(), source);
                return Err(ScanError::ListRoot { path: self.root.clone(), source });
            }
        };

        let mut data_points = Vec::new();
        for entry in entries {
            if !entry.is_dir {
                summary.skipped += 1;
                continue;
            }
            let Some(labels) = self.matcher.extract(&entry.name) else {
                tracing::trace!("{} does not match template, skipping", entry.name);
                summary.skipped += 1;
                continue;
            };
            match self.backend.dir_size(&entry.path) {
                Ok(size_bytes) => {
                    summary.matched += 1;
                    data_points.push(DataPoint { name: entry.name, size_bytes, labels });
                }
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.inc_dir_failures();
                    tracing::warn!("Error scanning {}: {}", entry.name, e);
                }
            }
        }

        summary.duration = start.elapsed();
        let snapshot = Snapshot {
            data_points,
            fs_stats,
            taken_at: Some(Utc::now()),
            scan_duration_ms: summary.duration.as_millis() as u64,
        };
        self.install(snapshot);
        self.metrics.record_cycle_completed(summary.duration);

        tracing::debug!(
            "Scan finished in {:?}. Found {} directories. Disk Usage: {:.2} GB / {:.2} GB",
            summary.duration,
            summary.matched,
            fs_stats.used_bytes as f64 / GIB,
            fs_stats.capacity_bytes as f64 / GIB,
        );
        Ok(summary)
    }

    fn install(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Re-scans every `period` until `cancel` fires.
///
/// The constructor already ran the first cycle, so the first tick waits a
/// full period. Cycles run one at a time on the blocking pool; a slow cycle
/// delays the next tick instead of overlapping with it.
pub fn spawn_background_scanner(
    scanner: Arc<DiskUsageScanner>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let s = scanner.clone();
            if let Err(e) = task::spawn_blocking(move || s.run_scan_cycle()).await {
                tracing::error!("scan cycle panicked: {}", e);
            }
        }
        tracing::info!("Background scanner stopped");
    })
}
