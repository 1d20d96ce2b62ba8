/// Administrator endpoints
///
/// Every handler takes `AdminUser`, so non-admins are turned away with 403 before
/// any work happens.

use crate::api::AppState;
use crate::api::extract::ApiJson;
use crate::auth::AdminUser;
use crate::error::AppResult;
use crate::marketplace::{AbuseReport, Project, ProjectType, Tag, User};
use crate::quota::QuotaOverrides;
use crate::services::{BanRequest, CreateTag, ResolveRequest, RoleRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

pub fn create_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/projects/pending", get(pending_projects))
        .route("/api/admin/projects/{slug}/approve", post(approve_project))
        .route("/api/admin/projects/{slug}/reject", post(reject_project))
        .route("/api/admin/projects/{slug}/quota", put(set_project_quota))
        .route("/api/admin/reports", get(open_reports))
        .route("/api/admin/reports/{id}/resolve", post(resolve_report))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{username}/ban", post(ban_user))
        .route("/api/admin/users/{username}/unban", post(unban_user))
        .route("/api/admin/users/{username}/role", post(set_role))
        .route("/api/admin/users/{username}/quota", put(set_user_quota))
        .route("/api/admin/project-types/{slug}/quota", put(set_type_quota))
        .route("/api/admin/tags", post(create_tag))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub note: String,
}

async fn pending_projects(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.market.pending_projects(&admin).await?))
}

async fn approve_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.approve_project(&admin, &slug).await?))
}

/// POST /api/admin/projects/{slug}/reject
/// Body: { "note": "why" }
async fn reject_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<RejectRequest>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.reject_project(&admin, &slug, &payload.note).await?))
}

async fn open_reports(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<Vec<AbuseReport>>> {
    Ok(Json(state.market.open_reports(&admin).await?))
}

/// POST /api/admin/reports/{id}/resolve
/// Body: { "action": "resolve" | "dismiss", "note": "..." }
async fn resolve_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ResolveRequest>,
) -> AppResult<Json<AbuseReport>> {
    Ok(Json(state.market.resolve_report(&admin, &id, payload).await?))
}

async fn list_users(State(state): State<AppState>, AdminUser(admin): AdminUser) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.market.list_users(&admin).await?))
}

async fn ban_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
    ApiJson(payload): ApiJson<BanRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.market.ban_user(&admin, &username, &payload.reason).await?))
}

async fn unban_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(state.market.unban_user(&admin, &username).await?))
}

async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.market.set_user_role(&admin, &username, payload.role).await?))
}

/// Replace a user's quota overrides; omitted kinds fall back down the chain
///
/// PUT /api/admin/users/{username}/quota
async fn set_user_quota(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
    ApiJson(payload): ApiJson<QuotaOverrides>,
) -> AppResult<Json<User>> {
    Ok(Json(state.market.set_user_quota(&admin, &username, &payload).await?))
}

async fn set_project_quota(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<QuotaOverrides>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.market.set_project_quota(&admin, &slug, &payload).await?))
}

async fn set_type_quota(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<QuotaOverrides>,
) -> AppResult<Json<ProjectType>> {
    Ok(Json(state.market.set_type_quota(&admin, &slug, &payload).await?))
}

/// POST /api/admin/tags
/// Body: { "name": "...", "slug": "...", "project_type": "mod" }
async fn create_tag(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<CreateTag>,
) -> AppResult<(StatusCode, Json<Tag>)> {
    let tag = state.market.create_tag(&admin, payload).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}
