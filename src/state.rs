use std::sync::Arc;

use crate::config::AppConfig;
use crate::scanner::DiskUsageScanner;

/// The shared application state handed to every handler.
///
/// There is exactly one scanner per process; it is created in `main` and
/// passed here explicitly rather than registered globally.
#[derive(Clone)]
pub struct AppState {
    /// The scanner owning the current snapshot.
    pub scanner: Arc<DiskUsageScanner>,
    /// The application configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(scanner: Arc<DiskUsageScanner>, config: AppConfig) -> Self {
        Self { scanner, config: Arc::new(config) }
    }
}
