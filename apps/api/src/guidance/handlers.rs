use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::guidance::store::{list_active_tasks, toggle_task};
use crate::models::guidance::{GuidanceTaskRow, TaskStatus};
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub total: usize,
    pub completed: usize,
}

impl TaskProgress {
    pub fn of(tasks: &[GuidanceTaskRow]) -> Self {
        Self {
            total: tasks.len(),
            completed: tasks
                .iter()
                .filter(|t| TaskStatus::parse(&t.status) == TaskStatus::Completed)
                .count(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<GuidanceTaskRow>,
    pub progress: TaskProgress,
}

/// GET /api/v1/guidance/tasks
pub async fn handle_list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<TaskListResponse>, AppError> {
    let tasks = list_active_tasks(&state.db, user.id).await?;
    let progress = TaskProgress::of(&tasks);
    Ok(Json(TaskListResponse { tasks, progress }))
}

/// POST /api/v1/guidance/tasks/:id/toggle
pub async fn handle_toggle_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<GuidanceTaskRow>, AppError> {
    Ok(Json(toggle_task(&state.db, user.id, task_id).await?))
}
