//! Gated task API endpoints
//!
//! The CRUD routes plus the explicit edit-gate acquire/release pair.
//! Mutating routes consult the admission gates and answer 429 when
//! saturated; creation is dispatched to the worker pool and acknowledged
//! before the save lands.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use gt_core::task::{Task, TaskRepository};

use crate::state::AppState;

// Response bodies are plain text with fixed prefixes; existing clients
// substring-match these exact strings.
pub(crate) const MSG_CREATED: &str = "Tarefa criada com sucesso";
pub(crate) const MSG_UPDATED: &str = "Tarefa atualizada com sucesso";
pub(crate) const MSG_DELETED: &str = "Tarefa deletada com sucesso";
pub(crate) const MSG_NOT_FOUND: &str = "Erro: Tarefa não encontrada.";
pub(crate) const MSG_CREATE_LIMIT: &str =
    "Limite de threads atingido. Tente novamente mais tarde.";
pub(crate) const MSG_EDIT_BUSY: &str = "Tarefa em edição. Tente novamente mais tarde.";
const MSG_GATE_ACQUIRED: &str = "Semáforo de edição adquirido";
const MSG_GATE_RELEASED: &str = "Semáforo de edição liberado";

// ============================================================================
// Request types
// ============================================================================

/// Body of POST /api/tasks and PUT /api/tasks/{id}
#[derive(Debug, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskPayload {
    pub(crate) fn into_task(self) -> Task {
        let mut task = Task::new(self.title);
        task.description = self.description;
        task
    }
}

/// Body of POST /api/tasks/acquire; extra fields of the supplied task are
/// accepted and ignored
#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    #[serde(default)]
    pub id: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/tasks - List all tasks
async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = state.task_store().find_all().await.map_err(internal_error)?;
    Ok(Json(tasks))
}

/// GET /api/tasks/{id} - Get a single task
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

/// POST /api/tasks - Create a task asynchronously behind the create gate
///
/// The 200 is optimistic: it is sent before the save lands and carries no
/// id. A save that fails later is logged only; the client is not informed.
async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskPayload>,
) -> (StatusCode, String) {
    let Some(permit) = state.create_gate().try_acquire() else {
        warn!(
            rejected_total = state.create_gate().rejected_total(),
            "create gate full, rejecting request"
        );
        return (StatusCode::TOO_MANY_REQUESTS, MSG_CREATE_LIMIT.to_string());
    };

    let task = payload.into_task();
    let title = task.title.clone();
    let store = Arc::clone(state.task_store());
    let job = async move {
        // The permit travels with the job and is dropped on every outcome,
        // including a panicking or failing save
        let _permit = permit;
        match store.save(task).await {
            Ok(saved) => info!(id = ?saved.id, "task created"),
            Err(e) => error!("failed to create task: {}", e),
        }
    };

    if let Err(e) = state.workers().submit("create task", job) {
        error!("failed to queue create job: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao criar a tarefa: {}", e),
        );
    }

    (StatusCode::OK, format!("{} - {}", MSG_CREATED, title))
}

/// PUT /api/tasks/{id} - Update a task under the edit gate
async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TaskPayload>,
) -> (StatusCode, String) {
    let Some(_guard) = state.edit_gate().acquire_scoped(Some(id)) else {
        warn!(id, "edit gate busy, rejecting update");
        return (StatusCode::TOO_MANY_REQUESTS, MSG_EDIT_BUSY.to_string());
    };

    match apply_update(state.task_store(), id, payload).await {
        Ok(true) => (StatusCode::OK, format!("{} - ID: {}", MSG_UPDATED, id)),
        Ok(false) => (StatusCode::NOT_FOUND, MSG_NOT_FOUND.to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao atualizar a tarefa: {}", e),
        ),
    }
}

/// DELETE /api/tasks/{id} - Delete a task under the edit gate
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, String) {
    // Delete holds the gate with a placeholder id rather than the target's
    let Some(_guard) = state.edit_gate().acquire_scoped(None) else {
        warn!(id, "edit gate busy, rejecting delete");
        return (StatusCode::TOO_MANY_REQUESTS, MSG_EDIT_BUSY.to_string());
    };

    match apply_delete(state.task_store(), id).await {
        Ok(true) => (StatusCode::OK, format!("{} - ID: {}", MSG_DELETED, id)),
        Ok(false) => (StatusCode::NOT_FOUND, MSG_NOT_FOUND.to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Erro ao deletar a tarefa: {}", e),
        ),
    }
}

/// POST /api/tasks/acquire - Take the edit gate for the supplied task
///
/// The gate stays held until POST /api/tasks/release. Acquiring again for
/// the id already held answers 200 and keeps the hold.
async fn acquire_edit_gate(
    State(state): State<AppState>,
    Json(req): Json<AcquireRequest>,
) -> (StatusCode, String) {
    if state.edit_gate().try_acquire(req.id) {
        info!(id = ?req.id, "edit gate acquired");
        (StatusCode::OK, MSG_GATE_ACQUIRED.to_string())
    } else {
        warn!(id = ?req.id, "edit gate busy, acquire rejected");
        (StatusCode::TOO_MANY_REQUESTS, MSG_EDIT_BUSY.to_string())
    }
}

/// POST /api/tasks/release - Clear the edit gate unconditionally
async fn release_edit_gate(State(state): State<AppState>) -> (StatusCode, String) {
    state.edit_gate().release();
    info!("edit gate released");
    (StatusCode::OK, MSG_GATE_RELEASED.to_string())
}

// ============================================================================
// Store operations shared with the ungated routes
// ============================================================================

/// Store side of an update; the gated route runs this while holding the
/// edit gate. Returns false when the id is absent.
pub(crate) async fn apply_update(
    store: &Arc<dyn TaskRepository>,
    id: i64,
    payload: TaskPayload,
) -> gt_core::Result<bool> {
    if !store.exists_by_id(id).await? {
        return Ok(false);
    }
    // The path id wins over whatever id the payload carries
    let task = payload.into_task().with_id(id);
    store.save(task).await?;
    Ok(true)
}

/// Store side of a delete; same contract as [`apply_update`]
pub(crate) async fn apply_delete(store: &Arc<dyn TaskRepository>, id: i64) -> gt_core::Result<bool> {
    if !store.exists_by_id(id).await? {
        return Ok(false);
    }
    store.delete_by_id(id).await?;
    Ok(true)
}

pub(crate) fn internal_error(error: impl std::fmt::Display) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Erro interno: {}", error),
    )
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/acquire", post(acquire_edit_gate))
        .route("/api/tasks/release", post(release_edit_gate))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::sync::watch;
    use tokio::time::sleep;
    use tower::ServiceExt;

    use gt_core::task::FileTaskStore;
    use gt_core::Error;

    const CREATE_CAPACITY: usize = 5;
    const WORKER_POOL: usize = 10;

    async fn build_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        let store = Arc::new(FileTaskStore::new(path).await.unwrap());
        let state = AppState::with_store(store, CREATE_CAPACITY, WORKER_POOL);
        (state, temp_dir)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        json_request(Method::POST, uri, body)
    }

    fn put_json(uri: &str, body: Value) -> Request<Body> {
        json_request(Method::PUT, uri, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn delete_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Wait for deferred create jobs to drain and return their permits
    async fn settle(state: &AppState) {
        for _ in 0..200 {
            if state.create_gate().in_flight() == 0 {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("create jobs did not drain");
    }

    /// Store double whose `save` blocks until the test opens the valve
    struct BlockingStore {
        open: watch::Receiver<bool>,
        saves: AtomicUsize,
    }

    impl BlockingStore {
        fn new() -> (Arc<Self>, watch::Sender<bool>) {
            let (tx, rx) = watch::channel(false);
            (
                Arc::new(Self {
                    open: rx,
                    saves: AtomicUsize::new(0),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl TaskRepository for BlockingStore {
        async fn find_all(&self) -> gt_core::Result<Vec<Task>> {
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: i64) -> gt_core::Result<Option<Task>> {
            Ok(None)
        }

        async fn exists_by_id(&self, _id: i64) -> gt_core::Result<bool> {
            Ok(true)
        }

        async fn save(&self, task: Task) -> gt_core::Result<Task> {
            let mut open = self.open.clone();
            while !*open.borrow() {
                if open.changed().await.is_err() {
                    break;
                }
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(task)
        }

        async fn delete_by_id(&self, _id: i64) -> gt_core::Result<()> {
            Ok(())
        }
    }

    /// Store double whose `save` always fails
    struct FailingStore;

    #[async_trait]
    impl TaskRepository for FailingStore {
        async fn find_all(&self) -> gt_core::Result<Vec<Task>> {
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: i64) -> gt_core::Result<Option<Task>> {
            Ok(None)
        }

        async fn exists_by_id(&self, _id: i64) -> gt_core::Result<bool> {
            Ok(false)
        }

        async fn save(&self, _task: Task) -> gt_core::Result<Task> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn delete_by_id(&self, _id: i64) -> gt_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_returns_optimistic_ack_and_eventually_persists() {
        let (state, _tmp) = build_state().await;
        let app = router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(post_json("/api/tasks", json!({"title": "A"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(MSG_CREATED));
        assert!(body.contains("A"));
        // The optimistic ack carries no id
        assert!(!body.contains("ID:"));

        settle(&state).await;

        let response = app.oneshot(get_request("/api/tasks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tasks: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let tasks = tasks.as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["title"], "A");
        assert_eq!(tasks[0]["id"], 1);
    }

    #[tokio::test]
    async fn create_burst_admits_at_most_capacity() {
        let (store, valve) = BlockingStore::new();
        let state = AppState::with_store(
            Arc::clone(&store) as Arc<dyn TaskRepository>,
            CREATE_CAPACITY,
            WORKER_POOL,
        );
        let app = router().with_state(state.clone());

        let mut accepted = 0;
        let mut rejected = 0;
        for i in 0..7 {
            let response = app
                .clone()
                .oneshot(post_json("/api/tasks", json!({"title": format!("Task {i}")})))
                .await
                .unwrap();
            match response.status() {
                StatusCode::OK => accepted += 1,
                StatusCode::TOO_MANY_REQUESTS => {
                    rejected += 1;
                    assert!(body_text(response).await.contains(MSG_CREATE_LIMIT));
                }
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(accepted, 5);
        assert_eq!(rejected, 2);

        valve.send(true).unwrap();
        settle(&state).await;

        // The store saw exactly the admitted requests
        assert_eq!(store.saves.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn update_not_found_releases_gate() {
        let (state, _tmp) = build_state().await;
        let app = router().with_state(state.clone());

        let response = app
            .oneshot(put_json("/api/tasks/42", json!({"title": "B"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.starts_with(MSG_NOT_FOUND));

        assert!(!state.edit_gate().is_locked());
    }

    #[tokio::test]
    async fn update_success_and_idempotent_repeat() {
        let (state, _tmp) = build_state().await;
        let saved = state.task_store().save(Task::new("Original")).await.unwrap();
        let id = saved.id.unwrap();
        let app = router().with_state(state.clone());

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(put_json(
                    &format!("/api/tasks/{id}"),
                    json!({"title": "Renamed"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_text(response).await;
            assert!(body.contains(MSG_UPDATED));
            assert!(body.contains(&format!("ID: {id}")));
        }

        let task = state.task_store().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.title, "Renamed");
        assert!(!state.edit_gate().is_locked());
    }

    #[tokio::test]
    async fn concurrent_updates_one_wins_one_rejected() {
        let (store, valve) = BlockingStore::new();
        let state = AppState::with_store(
            Arc::clone(&store) as Arc<dyn TaskRepository>,
            CREATE_CAPACITY,
            WORKER_POOL,
        );
        let app = router().with_state(state.clone());

        let winner = tokio::spawn(
            app.clone()
                .oneshot(put_json("/api/tasks/1", json!({"title": "Task 1 Updated"}))),
        );

        // Wait until the first update holds the gate inside its store call
        for _ in 0..200 {
            if state.edit_gate().is_locked() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(state.edit_gate().is_locked());

        let response = app
            .clone()
            .oneshot(put_json("/api/tasks/2", json!({"title": "Task 2 Updated"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(body_text(response).await.contains(MSG_EDIT_BUSY));

        valve.send(true).unwrap();
        let response = winner.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(MSG_UPDATED));
        assert!(!state.edit_gate().is_locked());
    }

    #[tokio::test]
    async fn delete_flow_and_second_delete_is_not_found() {
        let (state, _tmp) = build_state().await;
        let saved = state.task_store().save(Task::new("Doomed")).await.unwrap();
        let id = saved.id.unwrap();
        let app = router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(delete_request(&format!("/api/tasks/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(MSG_DELETED));

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/tasks/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(delete_request(&format!("/api/tasks/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.starts_with(MSG_NOT_FOUND));
        assert!(!state.edit_gate().is_locked());
    }

    #[tokio::test]
    async fn failing_saves_return_permits() {
        let state = AppState::with_store(Arc::new(FailingStore), CREATE_CAPACITY, WORKER_POOL);
        let app = router().with_state(state.clone());

        for _ in 0..CREATE_CAPACITY {
            let response = app
                .clone()
                .oneshot(post_json("/api/tasks", json!({"title": "doomed"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        settle(&state).await;

        // Every permit came back despite the store failures
        let response = app
            .oneshot(post_json("/api/tasks", json!({"title": "after the storm"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_task_found_and_missing() {
        let (state, _tmp) = build_state().await;
        let saved = state
            .task_store()
            .save(Task::new("Findable").with_description("with details"))
            .await
            .unwrap();
        let id = saved.id.unwrap();
        let app = router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/tasks/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(task["title"], "Findable");
        assert_eq!(task["description"], "with details");

        let response = app
            .oneshot(get_request(&format!("/api/tasks/{}", id + 1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn acquire_release_cycle() {
        let (state, _tmp) = build_state().await;
        let saved = state.task_store().save(Task::new("Held")).await.unwrap();
        let id = saved.id.unwrap();
        let app = router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(post_json("/api/tasks/acquire", json!({"id": id})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.edit_gate().is_locked());

        // Same id re-acquires, any other id is rejected
        let response = app
            .clone()
            .oneshot(post_json("/api/tasks/acquire", json!({"id": id})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app
            .clone()
            .oneshot(post_json("/api/tasks/acquire", json!({"id": id + 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // A mutator for another id is locked out while the client holds the gate
        let response = app
            .clone()
            .oneshot(delete_request(&format!("/api/tasks/{}", id + 1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(body_text(response).await.contains(MSG_EDIT_BUSY));

        let response = app
            .clone()
            .oneshot(post_json("/api/tasks/release", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.edit_gate().is_locked());

        let response = app
            .oneshot(delete_request(&format!("/api/tasks/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
