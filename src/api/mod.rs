/// HTTP API Layer
///
/// REST endpoints under /api. Handlers extract the caller with the auth
/// extractors, delegate to `Marketplace` and let `AppError` shape failures.

// Registration, tokens, notifications and abuse reports
pub mod users;

// Project catalog, lifecycle and tags
pub mod projects;

// Version uploads, details and file downloads
pub mod versions;

// Membership invitations and management
pub mod members;

// Review queue, reports, accounts and quota overrides
pub mod admin;

// JSON-shaped rejections for bodies and query strings
pub mod extract;

use crate::services::Marketplace;
use axum::Router;
use std::sync::Arc;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Marketplace>,
}

impl AppState {
    pub fn new(market: Arc<Marketplace>) -> Self {
        Self { market }
    }
}

/// Every /api route
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .merge(users::create_user_routes())
        .merge(projects::create_project_routes())
        .merge(versions::create_version_routes())
        .merge(members::create_member_routes())
        .merge(admin::create_admin_routes())
}
