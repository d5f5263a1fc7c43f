use std::fmt::Write;

use axum::{extract::State, http::header, response::IntoResponse};

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;
use crate::types::Snapshot;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.scanner.current_snapshot();
    let body = render_prometheus(
        &snapshot,
        state.scanner.matcher().label_names(),
        &state.scanner.metrics().get_snapshot(),
    );
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// Renders a snapshot plus the scanner's own counters.
///
/// Filesystem gauges are left out while capacity is zero, which is the case
/// before the first scan and whenever the stats query failed.
pub fn render_prometheus(snapshot: &Snapshot, label_names: &[String], m: &MetricsSnapshot) -> String {
    let mut out = String::with_capacity(256 + snapshot.data_points.len() * 96);

    header_lines(
        &mut out,
        "local_path_pvc_usage_bytes",
        "Actual disk usage of the specific local-path PVC directory",
        "gauge",
    );
    for dp in &snapshot.data_points {
        out.push_str("local_path_pvc_usage_bytes");
        if !label_names.is_empty() {
            out.push('{');
            for (i, (name, value)) in label_names.iter().zip(dp.labels.iter()).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
            }
            out.push('}');
        }
        let _ = writeln!(out, " {}", dp.size_bytes);
    }

    if snapshot.fs_stats.capacity_bytes > 0 {
        sample(
            &mut out,
            "local_path_storage_capacity_bytes",
            "Total capacity of the underlying storage filesystem",
            "gauge",
            snapshot.fs_stats.capacity_bytes,
        );
        sample(
            &mut out,
            "local_path_storage_total_used_bytes",
            "Total used space on the underlying storage filesystem (includes non-PVC data)",
            "gauge",
            snapshot.fs_stats.used_bytes,
        );
    }

    sample(&mut out, "local_path_exporter_scan_cycles_total", "Completed scan cycles", "counter", m.cycles_completed);
    sample(
        &mut out,
        "local_path_exporter_scan_cycles_aborted_total",
        "Scan cycles aborted because the storage root could not be listed",
        "counter",
        m.cycles_aborted,
    );
    sample(
        &mut out,
        "local_path_exporter_fs_stats_failures_total",
        "Failed filesystem statistics queries",
        "counter",
        m.fs_stats_failures,
    );
    sample(
        &mut out,
        "local_path_exporter_dir_failures_total",
        "Matched directories whose size could not be computed",
        "counter",
        m.dir_failures,
    );
    sample(
        &mut out,
        "local_path_exporter_last_scan_duration_seconds",
        "Duration of the last completed scan cycle",
        "gauge",
        m.last_cycle_duration_ms as f64 / 1000.0,
    );
    if let Some(taken_at) = snapshot.taken_at {
        sample(
            &mut out,
            "local_path_exporter_last_scan_timestamp_seconds",
            "Unix time of the last completed scan cycle",
            "gauge",
            taken_at.timestamp(),
        );
    }
    sample(&mut out, "local_path_exporter_uptime_seconds", "Uptime seconds", "gauge", m.uptime_seconds);

    out
}

fn header_lines(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn sample(out: &mut String, name: &str, help: &str, kind: &str, value: impl std::fmt::Display) {
    header_lines(out, name, help, kind);
    let _ = writeln!(out, "{} {}", name, value);
}

/// Escapes `\`, `"` and newlines as the text format requires.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
