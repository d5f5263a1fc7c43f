use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_path_exporter::{
    config,
    routes,
    scanner::{spawn_background_scanner, DiskUsageScanner},
    state::AppState,
    template::Matcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily file rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "local-path-exporter.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    // DEBUG=true is honoured for deployments predating RUST_LOG support
    let default_filter = if std::env::var("DEBUG").is_ok_and(|v| v == "true") {
        "debug,tower_http=info"
    } else {
        "info,tower_http=info"
    };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    // Load configuration (embedded defaults -> local-path-exporter.toml -> env/.env)
    let app_cfg = config::load()?;
    let refresh_interval = app_cfg.scanner.refresh_interval();

    info!("--- local-path exporter starting ---");
    info!("Path: {}", app_cfg.storage.path);
    info!("Template: {}", app_cfg.storage.metric_template);
    info!("Refresh Interval: {:?}", refresh_interval);

    config::ensure_storage_root(&app_cfg.storage.path)?;
    let matcher = Arc::new(Matcher::compile(&app_cfg.storage.metric_template)?);
    info!("Labels: {:?} (pattern {})", matcher.label_names(), matcher.pattern());

    // Initial scan runs before anything is served
    let root = app_cfg.storage.path.clone();
    let scanner = Arc::new(tokio::task::spawn_blocking(move || DiskUsageScanner::local(root, matcher)).await?);
    let initial = scanner.current_snapshot();
    info!("Initial scan found {} directories", initial.data_points.len());

    let cancel = CancellationToken::new();
    let background = spawn_background_scanner(scanner.clone(), refresh_interval, cancel.clone());

    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    // IPv6 literals need brackets in socket address syntax
    let host_part = if host.contains(':') { format!("[{}]", host) } else { host.clone() };
    let addr: SocketAddr = format!("{}:{}", host_part, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;

    let app = routes::router(AppState::new(scanner, app_cfg));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    cancel.cancel();
    let _ = background.await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
