/// Project catalog and lifecycle endpoints
use crate::api::AppState;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::AppResult;
use crate::marketplace::{BrowseQuery, Page, Project, ProjectType, Tag};
use crate::quota::QuotaReportLine;
use crate::services::projects::ProjectRef;
use crate::services::{CreateProject, ProjectDetails, UpdateProject};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

pub fn create_project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/project-types", get(list_project_types))
        .route("/api/tags", get(list_tags))
        .route("/api/projects", get(browse).post(create_project))
        .route(
            "/api/projects/{slug}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/api/projects/{slug}/restore", post(restore_project))
        .route("/api/projects/{slug}/submit", post(submit_project))
        .route("/api/projects/{slug}/tags", put(set_tags))
        .route("/api/projects/{slug}/quota", get(quota_report))
        .route("/api/projects/{slug}/dependents", get(dependents))
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

async fn list_project_types(State(state): State<AppState>) -> Json<Vec<ProjectType>> {
    Json(state.market.list_project_types())
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.market.list_tags().await?))
}

/// Browse approved projects
///
/// GET /api/projects?type=mod&tag=graphics&q=grass&sort=downloads&page=1&per_page=20
async fn browse(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BrowseQuery>,
) -> AppResult<Json<Page<Project>>> {
    Ok(Json(state.market.browse(&query).await?))
}

/// Create a draft project owned by the caller
///
/// POST /api/projects
/// Body: { "project_type": "mod", "name": "...", "summary": "...", "description": "...", "tags": [...] }
async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state.market.create_project(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Json<ProjectDetails>> {
    Ok(Json(state.market.project_details(&slug, viewer.as_ref()).await?))
}

async fn update_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<UpdateProject>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.update_project(&user, &slug, payload).await?))
}

/// Soft-delete a project; owners of dependent projects are notified
///
/// DELETE /api/projects/{slug}
async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.market.delete_project(&user, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.restore_project(&user, &slug).await?))
}

/// POST /api/projects/{slug}/submit
async fn submit_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.submit_project(&user, &slug).await?))
}

/// Replace the project's tags
///
/// PUT /api/projects/{slug}/tags
/// Body: { "tags": ["graphics", "ui"] }
async fn set_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<TagsRequest>,
) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.market.set_project_tags(&user, &slug, &payload.tags).await?))
}

async fn quota_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<QuotaReportLine>>> {
    Ok(Json(state.market.quota_report(&user, &slug).await?))
}

/// Projects depending on this one, directly or transitively
///
/// GET /api/projects/{slug}/dependents
async fn dependents(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<ProjectRef>>> {
    Ok(Json(state.market.transitive_dependents(&slug, viewer.as_ref()).await?))
}
