#[cfg(test)]
mod tests {
    use crate::scanner::{DirEntryInfo, DiskUsageScanner, LocalFs, ScanError, StorageBackend};
    use crate::template::Matcher;
    use crate::types::FilesystemStats;
    use std::collections::HashSet;
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn write_file(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    /// pvc-abc123-vol1 (150 bytes), pvc-def456-vol2 (42 bytes), lost+found, a stray file.
    fn create_storage_root() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        write_file(&base.join("pvc-abc123-vol1/data/file1.bin"), 100);
        write_file(&base.join("pvc-abc123-vol1/data/nested/deeper/file2.bin"), 50);
        fs::create_dir_all(base.join("pvc-abc123-vol1/empty")).unwrap();
        write_file(&base.join("pvc-def456-vol2/file.bin"), 42);
        write_file(&base.join("lost+found/orphan"), 7);
        write_file(&base.join("pvc-notadir-file"), 9);

        temp_dir
    }

    fn matcher(template: &str) -> Arc<Matcher> {
        Arc::new(Matcher::compile(template).unwrap())
    }

    /// LocalFs with switchable failures.
    #[derive(Default)]
    struct FlakyFs {
        fail_list: AtomicBool,
        fail_stats: AtomicBool,
        failing_dirs: Mutex<HashSet<String>>,
    }

    impl StorageBackend for FlakyFs {
        fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated list failure"));
            }
            LocalFs.list_dir(path)
        }

        fn dir_size(&self, path: &Path) -> io::Result<u64> {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if self.failing_dirs.lock().unwrap().contains(&name) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated walk failure"));
            }
            LocalFs.dir_size(path)
        }

        fn fs_stats(&self, _path: &Path) -> io::Result<FilesystemStats> {
            if self.fail_stats.load(Ordering::SeqCst) {
                return Err(io::Error::other("simulated statvfs failure"));
            }
            Ok(FilesystemStats { capacity_bytes: 1000, used_bytes: 400 })
        }
    }

    #[test]
    fn end_to_end_scan_of_storage_root() {
        let root = create_storage_root();
        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));

        let snapshot = scanner.current_snapshot();
        assert!(snapshot.taken_at.is_some());

        let mut points: Vec<(String, u64)> = snapshot
            .data_points
            .iter()
            .map(|dp| (dp.labels[0].clone(), dp.size_bytes))
            .collect();
        points.sort();
        assert_eq!(points, vec![("abc123".to_string(), 150), ("def456".to_string(), 42)]);
        assert_eq!(snapshot.total_bytes(), 192);
    }

    #[test]
    fn data_points_follow_listing_order() {
        let root = create_storage_root();
        let backend = Arc::new(FlakyFs::default());
        let scanner = DiskUsageScanner::new(root.path(), matcher("pvc-{id}-*"), backend);

        let listed: Vec<String> = LocalFs
            .list_dir(root.path())
            .unwrap()
            .into_iter()
            .filter(|e| e.is_dir && e.name.starts_with("pvc-"))
            .map(|e| e.name)
            .collect();
        let names: Vec<String> = scanner.current_snapshot().data_points.iter().map(|dp| dp.name.clone()).collect();
        assert_eq!(names, listed);
    }

    #[test]
    fn local_fs_stats_are_consistent() {
        let root = create_storage_root();
        let stats = LocalFs.fs_stats(root.path()).unwrap();
        assert!(stats.capacity_bytes > 0);
        assert!(stats.used_bytes <= stats.capacity_bytes);
    }

    #[test]
    fn scan_is_idempotent_on_unchanged_tree() {
        let root = create_storage_root();
        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));

        let first = scanner.current_snapshot();
        scanner.run_scan_cycle().unwrap();
        let second = scanner.current_snapshot();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.data_points, second.data_points);
    }

    #[test]
    fn rescan_picks_up_changes() {
        let root = create_storage_root();
        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));
        assert_eq!(scanner.current_snapshot().data_points.len(), 2);

        write_file(&root.path().join("pvc-ghi789-vol3/f"), 5);
        fs::remove_dir_all(root.path().join("pvc-def456-vol2")).unwrap();
        let summary = scanner.run_scan_cycle().unwrap();
        assert_eq!(summary.matched, 2);

        let snapshot = scanner.current_snapshot();
        let mut ids: Vec<&str> = snapshot.data_points.iter().map(|dp| dp.labels[0].as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["abc123", "ghi789"]);
    }

    #[test]
    fn unlistable_root_keeps_last_good_snapshot() {
        let root = create_storage_root();
        let backend = Arc::new(FlakyFs::default());
        let scanner = DiskUsageScanner::new(root.path(), matcher("pvc-{id}-*"), backend.clone());
        let good = scanner.current_snapshot();
        assert_eq!(good.data_points.len(), 2);

        backend.fail_list.store(true, Ordering::SeqCst);
        let result = scanner.run_scan_cycle();
        assert!(matches!(result, Err(ScanError::ListRoot { .. })));

        let after = scanner.current_snapshot();
        assert!(Arc::ptr_eq(&good, &after));
        assert_eq!(scanner.metrics().get_snapshot().cycles_aborted, 1);
    }

    #[test]
    fn failed_initial_listing_leaves_empty_snapshot() {
        let root = create_storage_root();
        let backend = Arc::new(FlakyFs::default());
        backend.fail_list.store(true, Ordering::SeqCst);
        let scanner = DiskUsageScanner::new(root.path(), matcher("pvc-{id}-*"), backend.clone());

        let snapshot = scanner.current_snapshot();
        assert!(snapshot.is_initial());
        assert!(snapshot.data_points.is_empty());

        backend.fail_list.store(false, Ordering::SeqCst);
        scanner.run_scan_cycle().unwrap();
        assert_eq!(scanner.current_snapshot().data_points.len(), 2);
    }

    #[test]
    fn fs_stats_failure_zeroes_stats_but_scans() {
        let root = create_storage_root();
        let backend = Arc::new(FlakyFs::default());
        let scanner = DiskUsageScanner::new(root.path(), matcher("pvc-{id}-*"), backend.clone());
        assert_eq!(scanner.current_snapshot().fs_stats.capacity_bytes, 1000);

        backend.fail_stats.store(true, Ordering::SeqCst);
        let summary = scanner.run_scan_cycle().unwrap();
        assert!(!summary.fs_stats_available);

        let snapshot = scanner.current_snapshot();
        assert_eq!(snapshot.fs_stats, FilesystemStats::default());
        assert_eq!(snapshot.data_points.len(), 2);
        assert_eq!(scanner.metrics().get_snapshot().fs_stats_failures, 1);
    }

    #[test]
    fn failing_directory_is_excluded_for_that_cycle_only() {
        let root = create_storage_root();
        let backend = Arc::new(FlakyFs::default());
        backend.failing_dirs.lock().unwrap().insert("pvc-abc123-vol1".to_string());
        let scanner = DiskUsageScanner::new(root.path(), matcher("pvc-{id}-*"), backend.clone());

        let snapshot = scanner.current_snapshot();
        assert_eq!(snapshot.data_points.len(), 1);
        assert_eq!(snapshot.data_points[0].labels, vec!["def456".to_string()]);
        assert_eq!(scanner.metrics().get_snapshot().dir_failures, 1);

        backend.failing_dirs.lock().unwrap().clear();
        let summary = scanner.run_scan_cycle().unwrap();
        assert_eq!(summary.failed, 0);
        assert_eq!(scanner.current_snapshot().data_points.len(), 2);
    }

    #[test]
    fn summary_counts_skipped_entries() {
        let root = create_storage_root();
        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));
        let summary = scanner.run_scan_cycle().unwrap();
        // lost+found (no match) and pvc-notadir-file (not a directory)
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.matched, 2);
    }

    #[test]
    fn missing_directory_walk_fails() {
        let root = TempDir::new().unwrap();
        assert!(LocalFs.dir_size(&root.path().join("gone")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_counted() {
        let root = create_storage_root();
        let outside = TempDir::new().unwrap();
        write_file(&outside.path().join("big.bin"), 4096);
        std::os::unix::fs::symlink(outside.path(), root.path().join("pvc-def456-vol2/link-dir")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("big.bin"),
            root.path().join("pvc-def456-vol2/link-file"),
        )
        .unwrap();
        // A symlinked volume directory is not a directory entry of the root
        std::os::unix::fs::symlink(outside.path(), root.path().join("pvc-linked-vol9")).unwrap();

        assert_eq!(LocalFs.dir_size(&root.path().join("pvc-def456-vol2")).unwrap(), 42);

        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));
        assert_eq!(scanner.current_snapshot().data_points.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_sub_entry_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        // root ignores permission bits
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let root = TempDir::new().unwrap();
        let volume = root.path().join("pvc-x-vol");
        write_file(&volume.join("ok.bin"), 10);
        write_file(&volume.join("locked/secret.bin"), 500);
        let locked = volume.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let size = LocalFs.dir_size(&volume);
        let scanner = DiskUsageScanner::local(root.path(), matcher("pvc-{id}-*"));
        let snapshot = scanner.current_snapshot();

        // restore so TempDir can clean up
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(size.unwrap(), 10);
        assert_eq!(snapshot.data_points.len(), 1);
        assert_eq!(snapshot.data_points[0].labels, vec!["x".to_string()]);
        assert_eq!(snapshot.data_points[0].size_bytes, 10);
        assert_eq!(scanner.metrics().get_snapshot().dir_failures, 0);
    }

    /// Every directory of one cycle reports that cycle's generation as its size.
    #[derive(Default)]
    struct GenerationFs {
        generation: AtomicU64,
    }

    impl StorageBackend for GenerationFs {
        fn list_dir(&self, _path: &Path) -> io::Result<Vec<DirEntryInfo>> {
            self.generation.fetch_add(1, Ordering::SeqCst);
            Ok((0..8)
                .map(|i| DirEntryInfo {
                    name: format!("pvc-{}-vol", i),
                    path: format!("/virtual/pvc-{}-vol", i).into(),
                    is_dir: true,
                })
                .collect())
        }

        fn dir_size(&self, _path: &Path) -> io::Result<u64> {
            thread::sleep(Duration::from_micros(200));
            Ok(self.generation.load(Ordering::SeqCst))
        }

        fn fs_stats(&self, _path: &Path) -> io::Result<FilesystemStats> {
            Ok(FilesystemStats::default())
        }
    }

    #[test]
    fn readers_never_observe_mixed_snapshots() {
        let scanner = Arc::new(DiskUsageScanner::new(
            "/virtual",
            matcher("pvc-{id}-*"),
            Arc::new(GenerationFs::default()),
        ));

        let writer = {
            let scanner = scanner.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    scanner.run_scan_cycle().unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let scanner = scanner.clone();
                thread::spawn(move || {
                    let mut last_seen = 0;
                    for _ in 0..2000 {
                        let snapshot = scanner.current_snapshot();
                        assert_eq!(snapshot.data_points.len(), 8);
                        let generation = snapshot.data_points[0].size_bytes;
                        assert!(snapshot.data_points.iter().all(|dp| dp.size_bytes == generation));
                        assert!(generation >= last_seen);
                        last_seen = generation;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(scanner.current_snapshot().data_points[0].size_bytes, 51);
    }

    #[tokio::test(start_paused = true)]
    async fn background_scanner_rescans_on_interval_and_stops_on_cancel() {
        let backend = Arc::new(GenerationFs::default());
        let scanner = Arc::new(DiskUsageScanner::new("/virtual", matcher("pvc-{id}-*"), backend.clone()));
        assert_eq!(scanner.metrics().get_snapshot().cycles_completed, 1);

        let cancel = CancellationToken::new();
        let handle = crate::scanner::spawn_background_scanner(scanner.clone(), Duration::from_secs(30), cancel.clone());

        // No cycle before the first full period
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scanner.metrics().get_snapshot().cycles_completed, 1);

        for expected in 2..=3 {
            let target = expected;
            tokio::time::sleep(Duration::from_secs(30)).await;
            // The cycle runs on the blocking pool, which holds the paused clock
            // until it returns; yield until it lands, bounded by wall time.
            let deadline = std::time::Instant::now() + Duration::from_secs(10);
            while scanner.metrics().get_snapshot().cycles_completed < target
                && std::time::Instant::now() < deadline
            {
                tokio::task::yield_now().await;
            }
            assert_eq!(scanner.metrics().get_snapshot().cycles_completed, target);
        }

        cancel.cancel();
        handle.await.unwrap();
    }
}
