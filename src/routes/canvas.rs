//! Canvas inspection routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::services::canvas::{self, CanvasSnapshot, CanvasSummary};
use crate::state::AppState;

/// `GET /api/canvas`: loaded canvases with element, client and lock counts.
pub async fn list_canvases(State(state): State<AppState>) -> Json<Vec<CanvasSummary>> {
    Json(canvas::list_canvases(&state).await)
}

/// `GET /api/canvas/:id`: full snapshot of a loaded canvas.
pub async fn get_canvas(
    State(state): State<AppState>,
    Path(canvas_id): Path<Uuid>,
) -> Result<Json<CanvasSnapshot>, StatusCode> {
    canvas::snapshot(&state, canvas_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
