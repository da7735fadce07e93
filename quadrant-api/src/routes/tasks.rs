/// Task endpoints with Eisenhower quadrant support
///
/// All endpoints require authentication and are scoped to the caller.
///
/// # Endpoints
///
/// - `GET /v1/tasks` - List with filters (see [`ListTasksQuery`])
/// - `POST /v1/tasks` - Create (201)
/// - `GET /v1/tasks/overdue` - Unfinished tasks past their deadline
/// - `GET /v1/tasks/:id` - Fetch
/// - `PATCH /v1/tasks/:id` - Partial update
/// - `PATCH /v1/tasks/:id/quadrant?is_urgent=&is_important=` - Move between quadrants
/// - `PATCH /v1/tasks/:id/status?status=` - Change status
/// - `DELETE /v1/tasks/:id` - Delete (204)
///
/// # Quadrants
///
/// | # | Urgent | Important | Label     |
/// |---|--------|-----------|-----------|
/// | 1 | yes    | yes       | Do First  |
/// | 2 | no     | yes       | Schedule  |
/// | 3 | yes    | no        | Delegate  |
/// | 4 | no     | no        | Eliminate |

use crate::{
    app::{AppState, CurrentUser},
    error::ApiResult,
    routes::ListResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use quadrant_shared::models::{
    task::{
        NewTask, Quadrant, Task, TaskChanges, TaskCountFilter, TaskFilter, TaskPriority,
        TaskStatus,
    },
    Page,
};
use serde::Deserialize;
use uuid::Uuid;

/// List query
///
/// Filters are combined with AND; `quadrant` is `1`-`4`.
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub skip: i64,

    #[serde(default = "super::default_limit")]
    pub limit: i64,

    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub is_urgent: Option<bool>,
    pub is_important: Option<bool>,
    pub quadrant: Option<Quadrant>,

    /// Case-insensitive substring of title or description
    pub search: Option<String>,
}

impl ListTasksQuery {
    fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }

    fn filter(self) -> TaskFilter {
        TaskFilter {
            project_id: self.project_id,
            status: self.status,
            priority: self.priority,
            is_urgent: self.is_urgent,
            is_important: self.is_important,
            quadrant: self.quadrant,
            search: self.search,
        }
    }
}

/// Quadrant move query
#[derive(Debug, Deserialize)]
pub struct QuadrantQuery {
    pub is_urgent: bool,
    pub is_important: bool,
}

/// Status change query
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: TaskStatus,
}

/// List tasks, newest first
///
/// `total` honours the project, status and quadrant filters.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<ListResponse<Task>>> {
    let page = query.page();
    let filter = query.filter();

    let items = state.tasks.list(&user, &filter, page).await?;
    let total = state
        .tasks
        .count(&user, &TaskCountFilter::from(&filter))
        .await?;

    Ok(Json(ListResponse::new(total, page, items)))
}

/// Create a task in one of the caller's projects
///
/// # Errors
///
/// - `422 Unprocessable Entity`: empty or overlong title
/// - `403 Forbidden`: the project is not the caller's
pub async fn create_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Unfinished tasks whose deadline has passed, earliest deadline first
pub async fn list_overdue(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list_overdue(&user).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.get(id, &user).await?))
}

/// Partial update; `null` clears `description` or `deadline`
pub async fn update_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskChanges>,
) -> ApiResult<Json<Task>> {
    let task = state.tasks.get(id, &user).await?;
    Ok(Json(state.tasks.update(&task, &user, req).await?))
}

pub async fn move_quadrant(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<QuadrantQuery>,
) -> ApiResult<Json<Task>> {
    let task = state.tasks.get(id, &user).await?;
    let moved = state
        .tasks
        .move_to_quadrant(&task, &user, query.is_urgent, query.is_important)
        .await?;
    Ok(Json(moved))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Task>> {
    let task = state.tasks.get(id, &user).await?;
    Ok(Json(state.tasks.update_status(&task, &user, query.status).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let task = state.tasks.get(id, &user).await?;
    state.tasks.delete(&task, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
