/// Version upload, listing and download endpoints
///
/// Uploads are multipart/form-data. Text fields:
/// - `version` (required), `changelog`, `release_type` (release | beta | alpha)
/// - `dependencies`: JSON array of { "project": slug, "version": label?, "kind": ... }
/// - `tags`: comma separated tag slugs
/// Every part carrying a filename is stored as a version file.

use crate::api::AppState;
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{AppError, AppResult};
use crate::marketplace::{ProjectVersion, ReleaseType};
use crate::services::{DependencyRequest, NewVersionRequest, UploadedFile, VersionDetails};
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;

pub fn create_version_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/{slug}/versions",
            get(list_versions).post(create_version),
        )
        .route(
            "/api/projects/{slug}/versions/{version}",
            get(get_version).delete(delete_version),
        )
        .route("/api/files/{id}/download", get(download_file))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("malformed upload: {}", e.body_text()))
}

/// Collect the multipart form into a version request
async fn read_upload(mut multipart: Multipart) -> AppResult<NewVersionRequest> {
    let mut version = None;
    let mut changelog = String::new();
    let mut release_type = None;
    let mut dependencies = Vec::new();
    let mut tags = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if let Some(filename) = field.file_name().map(str::to_string) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            files.push(UploadedFile { filename, bytes });
            continue;
        }

        let name = field.name().unwrap_or_default().to_string();
        let text = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "version" => version = Some(text),
            "changelog" => changelog = text,
            "release_type" => {
                let parsed: ReleaseType = serde_json::from_value(serde_json::Value::String(text.trim().to_string()))
                    .map_err(|_| AppError::validation(format!("unknown release type '{}'", text.trim())))?;
                release_type = Some(parsed);
            }
            "dependencies" if !text.trim().is_empty() => {
                dependencies = serde_json::from_str::<Vec<DependencyRequest>>(&text)
                    .map_err(|e| AppError::validation(format!("invalid dependencies: {}", e)))?;
            }
            "tags" => {
                tags = text
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => tracing::debug!("Ignoring unknown upload field '{}'", name),
        }
    }

    Ok(NewVersionRequest {
        version: version.ok_or_else(|| AppError::validation("missing 'version' field"))?,
        changelog,
        release_type,
        dependencies,
        tags,
        files,
    })
}

async fn list_versions(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<ProjectVersion>>> {
    Ok(Json(state.market.list_versions(&slug, viewer.as_ref()).await?))
}

/// Publish a new version
///
/// POST /api/projects/{slug}/versions (multipart/form-data)
async fn create_version(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<VersionDetails>)> {
    let request = read_upload(multipart).await?;
    let details = state.market.create_version(&user, &slug, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn get_version(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path((slug, version)): Path<(String, String)>,
) -> AppResult<Json<VersionDetails>> {
    Ok(Json(state.market.version_details(&slug, &version, viewer.as_ref()).await?))
}

/// Soft-delete a version; projects pinned to it are notified
///
/// DELETE /api/projects/{slug}/versions/{version}
async fn delete_version(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((slug, version)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.market.delete_version(&user, &slug, &version).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/files/{id}/download
async fn download_file(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let download = state.market.download(&id, viewer.as_ref()).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_LENGTH, download.size_bytes.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.filename),
        ),
        (header::ETAG, format!("\"{}\"", download.sha256)),
    ];
    let body = Body::from_stream(ReaderStream::new(download.file));
    Ok((headers, body).into_response())
}
