use std::path::Path;

use ::config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Flat variable names understood by earlier exporter deployments.
pub const LEGACY_STORAGE_PATH: &str = "STORAGE_PATH";
pub const LEGACY_METRIC_TEMPLATE: &str = "METRIC_TEMPLATE";
pub const LEGACY_LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const LEGACY_REFRESH_INTERVAL: &str = "REFRESH_INTERVAL_SECONDS";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one directory per volume.
    pub path: String,
    /// Naming template, e.g. `pvc-{pvc_uid}_{namespace}_{pvc_name}`.
    pub metric_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Signed so that negative values reach validation instead of failing as a type error.
    pub refresh_interval_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scanner: ScannerConfig,
}

impl ScannerConfig {
    /// Only meaningful after [`validate`] accepted the value.
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_interval_seconds.max(1) as u64)
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = defaults_builder()
        // Optional local file: local-path-exporter.toml (in CWD)
        .add_source(File::with_name("local-path-exporter").required(false));

    if let Ok(custom_path) = std::env::var("LOCAL_PATH_EXPORTER_CONFIG") {
        builder = builder.add_source(File::with_name(&custom_path).required(false));
    }
    builder = builder.add_source(Environment::with_prefix("LOCAL_PATH_EXPORTER").separator("__"));
    // Flat legacy variables last so existing manifests keep working unchanged
    builder = apply_legacy_env(builder, |key| std::env::var(key).ok())?;

    finish(builder)
}

/// Layers `toml` over the embedded defaults and validates the result.
pub fn from_toml_str(toml: &str) -> anyhow::Result<AppConfig> {
    let builder = defaults_builder().add_source(File::from_str(toml, FileFormat::Toml));
    finish(builder)
}

fn defaults_builder() -> ConfigBuilder<DefaultState> {
    ::config::Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<AppConfig> {
    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Maps `STORAGE_PATH`, `METRIC_TEMPLATE`, `LISTEN_ADDR` and
/// `REFRESH_INTERVAL_SECONDS` onto their structured keys.
pub fn apply_legacy_env<F>(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> anyhow::Result<ConfigBuilder<DefaultState>>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(path) = get(LEGACY_STORAGE_PATH) {
        builder = builder.set_override("storage.path", path)?;
    }
    if let Some(template) = get(LEGACY_METRIC_TEMPLATE) {
        builder = builder.set_override("storage.metric_template", template)?;
    }
    if let Some(interval) = get(LEGACY_REFRESH_INTERVAL) {
        let secs: i64 = interval.trim().parse().map_err(|e| {
            anyhow::anyhow!("{} must be a valid integer, got '{}': {}", LEGACY_REFRESH_INTERVAL, interval, e)
        })?;
        builder = builder.set_override("scanner.refresh_interval_seconds", secs)?;
    }
    if let Some(addr) = get(LEGACY_LISTEN_ADDR) {
        let (host, port) = split_listen_addr(&addr)
            .ok_or_else(|| anyhow::anyhow!("invalid {}: {}", LEGACY_LISTEN_ADDR, addr))?;
        builder = builder.set_override("server.host", host)?.set_override("server.port", port as i64)?;
    }
    Ok(builder)
}

/// Splits `host:port`. An empty host (`:9100`) binds all interfaces.
pub fn split_listen_addr(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.trim().rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Some((host.to_string(), port))
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Storage
    if cfg.storage.path.trim().is_empty() {
        return Err(anyhow::anyhow!("storage.path must not be empty"));
    }
    if cfg.storage.metric_template.is_empty() {
        return Err(anyhow::anyhow!("storage.metric_template must not be empty"));
    }

    // Scanner
    if cfg.scanner.refresh_interval_seconds <= 0 {
        return Err(anyhow::anyhow!(
            "scanner.refresh_interval_seconds must be > 0, got {}",
            cfg.scanner.refresh_interval_seconds
        ));
    }

    Ok(())
}

/// Fails unless `path` exists and is a directory.
pub fn ensure_storage_root(path: &str) -> anyhow::Result<()> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(anyhow::anyhow!("storage path does not exist: {}", path));
    }
    if !p.is_dir() {
        return Err(anyhow::anyhow!("storage path is not a directory: {}", path));
    }
    Ok(())
}
