use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

// Health check endpoint - lightweight, never touches the scanner
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: ready once at least one scan cycle has been installed
pub async fn readyz(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = state.scanner.current_snapshot();
    if snapshot.is_initial() {
        return Err(AppError::ServiceUnavailable("no completed scan yet".to_string()));
    }
    Ok((StatusCode::OK, "ready"))
}

// Version/Build info endpoint (JSON)
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "storage": {
            "path": state.scanner.root().display().to_string(),
            "template": state.scanner.matcher().template(),
            "refresh_interval_seconds": state.config.scanner.refresh_interval_seconds,
        }
    });
    (StatusCode::OK, Json(body))
}
