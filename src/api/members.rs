/// Project membership endpoints
use crate::api::AppState;
use crate::api::extract::ApiJson;
use crate::auth::{AuthUser, MaybeUser};
use crate::error::AppResult;
use crate::marketplace::MemberView;
use crate::services::{InviteRequest, RoleChange, TransferRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};

pub fn create_member_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/{slug}/members",
            get(list_members).post(invite_member),
        )
        .route("/api/projects/{slug}/members/accept", post(accept))
        .route("/api/projects/{slug}/members/decline", post(decline))
        .route("/api/projects/{slug}/members/leave", post(leave))
        .route("/api/projects/{slug}/members/transfer", post(transfer))
        .route(
            "/api/projects/{slug}/members/{username}",
            patch(change_role).delete(remove_member),
        )
}

async fn list_members(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<MemberView>>> {
    Ok(Json(state.market.members(&slug, viewer.as_ref()).await?))
}

/// Invite a user to the project
///
/// POST /api/projects/{slug}/members
/// Body: { "username": "...", "role": "owner" | "maintainer" | "contributor" }
async fn invite_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<InviteRequest>,
) -> AppResult<(StatusCode, Json<MemberView>)> {
    let member = state.market.invite_member(&user, &slug, payload).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn accept(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.market.accept_invitation(&user, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn decline(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.market.decline_invitation(&user, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.market.leave_project(&user, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make another accepted member the primary owner
///
/// POST /api/projects/{slug}/members/transfer
/// Body: { "username": "..." }
async fn transfer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    ApiJson(payload): ApiJson<TransferRequest>,
) -> AppResult<StatusCode> {
    state.market.transfer_project(&user, &slug, &payload.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_role(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((slug, username)): Path<(String, String)>,
    ApiJson(payload): ApiJson<RoleChange>,
) -> AppResult<StatusCode> {
    state
        .market
        .change_member_role(&user, &slug, &username, payload.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((slug, username)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.market.remove_member(&user, &slug, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}
