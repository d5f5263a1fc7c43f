use axum::{extract::State, response::IntoResponse, Json};

use crate::state::AppState;
use crate::types::SnapshotDto;

// JSON view of the current snapshot, labels keyed by name
pub async fn get_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.scanner.current_snapshot();
    let matcher = state.scanner.matcher();
    Json(SnapshotDto::from_snapshot(&snapshot, matcher.template(), matcher.label_names()))
}
