//! Ungated task endpoints
//!
//! Mirrors of the CRUD routes that talk to the store directly: no admission
//! gates, no worker pool. Kept for side-by-side comparison with the gated
//! routes under load.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use gt_core::task::Task;

use crate::state::AppState;

use super::tasks::{
    apply_delete, apply_update, internal_error, TaskPayload, MSG_CREATED, MSG_DELETED,
    MSG_NOT_FOUND, MSG_UPDATED,
};

/// GET /api/tasks/singlethread - List all tasks
async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = state.task_store().find_all().await.map_err(internal_error)?;
    Ok(Json(tasks))
}

/// GET /api/tasks/singlethread/{id} - Get a single task
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .task_store()
        .find_by_id(id)
        .await
        .map_err(internal_error)?;

    match task {
        Some(task) => Ok(Json(task)),
        None => Err((StatusCode::NOT_FOUND, String::new())),
    }
}

/// POST /api/tasks/singlethread - Create a task synchronously
async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskPayload>,
) -> (StatusCode, String) {
    match state.task_store().save(payload.into_task()).await {
        Ok(saved) => (StatusCode::OK, format!("{} - {}", MSG_CREATED, saved.title)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao criar a tarefa: {}", e),
        ),
    }
}

/// PUT /api/tasks/singlethread/{id} - Update a task without gating
async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TaskPayload>,
) -> (StatusCode, String) {
    match apply_update(state.task_store(), id, payload).await {
        Ok(true) => (StatusCode::OK, format!("{} - ID: {}", MSG_UPDATED, id)),
        Ok(false) => (StatusCode::NOT_FOUND, MSG_NOT_FOUND.to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao atualizar a tarefa: {}", e),
        ),
    }
}

/// DELETE /api/tasks/singlethread/{id} - Delete a task without gating
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, String) {
    match apply_delete(state.task_store(), id).await {
        Ok(true) => (StatusCode::OK, format!("{} - ID: {}", MSG_DELETED, id)),
        Ok(false) => (StatusCode::NOT_FOUND, MSG_NOT_FOUND.to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao deletar a tarefa: {}", e),
        ),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/singlethread",
            get(list_tasks).post(create_task),
        )
        .route(
            "/api/tasks/singlethread/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}
