/// Account, notification and report endpoints
use crate::api::AppState;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::marketplace::{AbuseReport, Notification, Project, User};
use crate::services::{Registered, RegisterUser, ReportRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn create_user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register))
        .route("/api/users/me", get(me))
        .route("/api/users/me/token", post(rotate_token))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/reports", post(create_report))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub projects: Vec<Project>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// Register a new account
///
/// POST /api/users
/// Body: { "username": "...", "email": "..." }
/// The token in the response is never shown again.
async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<Registered>)> {
    let registered = state.market.register(payload).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /api/users/me
async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<MeResponse>> {
    let projects = state.market.my_projects(&user).await?;
    Ok(Json(MeResponse { user, projects }))
}

/// Replace the caller's API token
///
/// POST /api/users/me/token
async fn rotate_token(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let token = state.market.rotate_token(&user).await?;
    Ok(Json(json!({ "token": token })))
}

/// GET /api/notifications?unread=true
async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.market.notifications(&user, query.unread).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.market.mark_notification_read(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let updated = state.market.mark_all_notifications_read(&user).await?;
    Ok(Json(json!({ "updated": updated })))
}

/// Report a project, version or user
///
/// POST /api/reports
/// Body: { "target_kind": "project" | "version" | "user", "target_id": "...", "reason": "..." }
async fn create_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ReportRequest>,
) -> AppResult<(StatusCode, Json<AbuseReport>)> {
    let report = state.market.report(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
