//! Work-item endpoints: projects, tasks, issues and task statuses. These are
//! plain data-shuffling CRUD handlers; the interesting part is the capability
//! gate each route declares before touching the store.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Issue, IssueSeverity, IssueStatus, Project, RoleStatus, Task, TaskStatus};

use super::{require_capability, require_principal, AppState};

// --- Projects (guarded by projects_*) ---

#[derive(Debug, Deserialize)]
pub struct CreateProjectPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_users: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_users: Option<Vec<Uuid>>,
}

pub async fn list_projects(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Project>>> {
    require_capability(&state, &headers, "projects_read")?;
    let mut projects = state.store.projects.list();
    projects.sort_by_key(|p| p.created_at);
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    require_capability(&state, &headers, "projects_read")?;
    let project = state
        .store
        .projects
        .get(&id)
        .ok_or_else(|| AppError::not_found("project_not_found", "Project not found"))?;
    Ok(Json(project))
}

pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProjectPayload>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let principal = require_capability(&state, &headers, "projects_create")?;
    if payload.title.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Project title is required"));
    }
    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        assigned_users: payload.assigned_users,
        created_by: Some(principal.user_id),
        created_at: now,
        updated_at: now,
    };
    state.store.projects.put(project.clone())?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectPayload>,
) -> AppResult<Json<Project>> {
    require_capability(&state, &headers, "projects_update")?;
    let mut project = state
        .store
        .projects
        .get(&id)
        .ok_or_else(|| AppError::not_found("project_not_found", "Project not found"))?;
    if let Some(title) = payload.title { project.title = title; }
    if let Some(description) = payload.description { project.description = Some(description); }
    if let Some(assigned_users) = payload.assigned_users { project.assigned_users = assigned_users; }
    project.updated_at = Utc::now();
    state.store.projects.put(project.clone())?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, "projects_delete")?;
    if !state.store.projects.remove(&id)? {
        return Err(AppError::not_found("project_not_found", "Project not found"));
    }
    Ok(Json(json!({"message": "Project removed"})))
}

// --- Tasks (guarded by tasks_*) ---

#[derive(Debug, Deserialize)]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Uuid>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Uuid>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

pub async fn list_tasks(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Task>>> {
    require_capability(&state, &headers, "tasks_read")?;
    let mut tasks = state.store.tasks.list();
    tasks.sort_by_key(|t| t.created_at);
    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    require_capability(&state, &headers, "tasks_read")?;
    let task = state
        .store
        .tasks
        .get(&id)
        .ok_or_else(|| AppError::not_found("task_not_found", "Task not found"))?;
    Ok(Json(task))
}

pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskPayload>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let principal = require_capability(&state, &headers, "tasks_create")?;
    if payload.title.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Task title is required"));
    }
    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        status: payload.status,
        assigned_to: payload.assigned_to,
        created_by: Some(principal.user_id),
        created_at: now,
        updated_at: now,
    };
    state.store.tasks.put(task.clone())?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskPayload>,
) -> AppResult<Json<Task>> {
    require_capability(&state, &headers, "tasks_update")?;
    let mut task = state
        .store
        .tasks
        .get(&id)
        .ok_or_else(|| AppError::not_found("task_not_found", "Task not found"))?;
    if let Some(title) = payload.title { task.title = title; }
    if let Some(description) = payload.description { task.description = Some(description); }
    if let Some(status) = payload.status { task.status = Some(status); }
    if let Some(assigned_to) = payload.assigned_to { task.assigned_to = Some(assigned_to); }
    task.updated_at = Utc::now();
    state.store.tasks.put(task.clone())?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, "tasks_delete")?;
    if !state.store.tasks.remove(&id)? {
        return Err(AppError::not_found("task_not_found", "Task not found"));
    }
    Ok(Json(json!({"message": "Task removed"})))
}

// --- Issues (session only, like the task-status catalog) ---

#[derive(Debug, Deserialize)]
pub struct CreateIssuePayload {
    pub title: String,
    pub description: String,
    pub project: Uuid,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub severity: Option<IssueSeverity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssuePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub status: Option<IssueStatus>,
    #[serde(default)]
    pub severity: Option<IssueSeverity>,
}

pub async fn list_issues(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Issue>>> {
    require_principal(&state, &headers)?;
    let mut issues = state.store.issues.list();
    issues.sort_by_key(|i| i.created_at);
    Ok(Json(issues))
}

pub async fn get_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Issue>> {
    require_principal(&state, &headers)?;
    let issue = state
        .store
        .issues
        .get(&id)
        .ok_or_else(|| AppError::not_found("issue_not_found", "Issue not found"))?;
    Ok(Json(issue))
}

pub async fn create_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateIssuePayload>,
) -> AppResult<(StatusCode, Json<Issue>)> {
    let principal = require_principal(&state, &headers)?;
    if payload.title.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Issue title and description are required"));
    }
    if state.store.projects.get(&payload.project).is_none() {
        return Err(AppError::not_found("project_not_found", "Project not found"));
    }
    let now = Utc::now();
    let issue = Issue {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        project: payload.project,
        reported_by: principal.user_id,
        assigned_to: payload.assigned_to,
        status: IssueStatus::default(),
        severity: payload.severity.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    state.store.issues.put(issue.clone())?;
    Ok((StatusCode::CREATED, Json(issue)))
}

pub async fn update_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIssuePayload>,
) -> AppResult<Json<Issue>> {
    require_principal(&state, &headers)?;
    let mut issue = state
        .store
        .issues
        .get(&id)
        .ok_or_else(|| AppError::not_found("issue_not_found", "Issue not found"))?;
    if let Some(title) = payload.title { issue.title = title; }
    if let Some(description) = payload.description { issue.description = description; }
    if let Some(assigned_to) = payload.assigned_to { issue.assigned_to = Some(assigned_to); }
    if let Some(status) = payload.status { issue.status = status; }
    if let Some(severity) = payload.severity { issue.severity = severity; }
    issue.updated_at = Utc::now();
    state.store.issues.put(issue.clone())?;
    Ok(Json(issue))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    if !state.store.issues.remove(&id)? {
        return Err(AppError::not_found("issue_not_found", "Issue not found"));
    }
    Ok(Json(json!({"message": "Issue removed"})))
}

// --- Task statuses ---

#[derive(Debug, Deserialize)]
pub struct CreateTaskStatusPayload {
    pub name: String,
    pub project: Uuid,
    #[serde(default)]
    pub status: Option<RoleStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskStatusPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
}

pub async fn list_task_statuses(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<TaskStatus>>> {
    require_principal(&state, &headers)?;
    let mut statuses = state.store.task_statuses.list();
    statuses.sort_by_key(|s| s.created_at);
    Ok(Json(statuses))
}

pub async fn get_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TaskStatus>> {
    require_principal(&state, &headers)?;
    let status = state
        .store
        .task_statuses
        .get(&id)
        .ok_or_else(|| AppError::not_found("task_status_not_found", "Task status not found"))?;
    Ok(Json(status))
}

pub async fn create_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskStatusPayload>,
) -> AppResult<(StatusCode, Json<TaskStatus>)> {
    require_principal(&state, &headers)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Task status name is required"));
    }
    if state.store.projects.get(&payload.project).is_none() {
        return Err(AppError::not_found("project_not_found", "Project not found"));
    }
    let now = Utc::now();
    let status = TaskStatus {
        id: Uuid::new_v4(),
        name: payload.name,
        status: payload.status.unwrap_or_default(),
        project: payload.project,
        created_at: now,
        updated_at: now,
    };
    state.store.task_statuses.put(status.clone())?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn update_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusPayload>,
) -> AppResult<Json<TaskStatus>> {
    require_principal(&state, &headers)?;
    let mut status = state
        .store
        .task_statuses
        .get(&id)
        .ok_or_else(|| AppError::not_found("task_status_not_found", "Task status not found"))?;
    if let Some(name) = payload.name { status.name = name; }
    if let Some(s) = payload.status { status.status = s; }
    status.updated_at = Utc::now();
    state.store.task_statuses.put(status.clone())?;
    Ok(Json(status))
}

pub async fn delete_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    if !state.store.task_statuses.remove(&id)? {
        return Err(AppError::not_found("task_status_not_found", "Task status not found"));
    }
    Ok(Json(json!({"message": "Task status removed"})))
}
