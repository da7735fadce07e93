/// Project endpoints
///
/// All endpoints require authentication and only ever see the caller's
/// projects; another user's project answers 404 exactly like a missing one.
///
/// # Endpoints
///
/// - `GET /v1/projects?skip=&limit=&search=` - List
/// - `POST /v1/projects` - Create (201)
/// - `GET /v1/projects/:id` - Fetch with task count
/// - `PATCH /v1/projects/:id` - Partial update
/// - `DELETE /v1/projects/:id` - Delete with its tasks (204)

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
    project::{NewProject, Project, ProjectChanges, ProjectWithTaskCount},
    Page,
};
use serde::Deserialize;
use uuid::Uuid;

/// List query
#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    #[serde(default)]
    pub skip: i64,

    #[serde(default = "super::default_limit")]
    pub limit: i64,

    /// Case-insensitive substring of name or description
    pub search: Option<String>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<ListResponse<Project>>> {
    let page = Page::new(query.skip, query.limit);
    let search = query.search.as_deref();
    let items = state.projects.list(&user, search, page).await?;
    let total = state.projects.count(&user, search).await?;

    Ok(Json(ListResponse::new(total, page, items)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.projects.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectWithTaskCount>> {
    Ok(Json(state.projects.get_with_task_count(id, &user).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProjectChanges>,
) -> ApiResult<Json<Project>> {
    let project = state.projects.get(id, &user).await?;
    Ok(Json(state.projects.update(&project, &user, req).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let project = state.projects.get(id, &user).await?;
    state.projects.delete(&project, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
