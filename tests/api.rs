//! End-to-end tests against the assembled router

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use modvault::{create_app, Config};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "modvault-test-boundary";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(Config::for_data_dir(dir.path())).await.unwrap();
    TestApp { router: app.router, _dir: dir }
}

impl TestApp {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/users",
                None,
                Some(json!({ "username": username, "email": format!("{}@example.com", username) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn upload(&self, token: &str, slug: &str, version: &str, file: &[u8]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"version\"\r\n\r\n{v}\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"changelog\"\r\n\r\nFirst release\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"pack.zip\"\r\n\
                 Content-Type: application/zip\r\n\r\n",
                b = BOUNDARY,
                v = version
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/projects/{}/versions", slug))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.call(request).await
    }

    async fn create_project(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/projects",
                Some(token),
                Some(json!({ "project_type": "tile_set", "name": name, "summary": "Hand drawn tiles" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["slug"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_check_responds() {
    let app = app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();
    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert!(body["message"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = app.json("GET", "/api/projects?page=first", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn tokens_authenticate_requests() {
    let app = app().await;
    let token = app.register("alice").await;
    assert!(token.starts_with("mv_"));

    let (status, body) = app.json("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("token_hash").is_none());

    let (status, body) = app.json("GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.json("GET", "/api/users/me", Some("mv_bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.json("POST", "/api/users/me/token", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["token"].as_str().unwrap().to_string();

    let (status, _) = app.json("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.json("GET", "/api/users/me", Some(&rotated), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn publish_review_and_download() {
    let app = app().await;
    let admin = app.register("admin").await;
    let alice = app.register("alice").await;

    let slug = app.create_project(&alice, "Forest Tiles").await;
    assert_eq!(slug, "forest-tiles");

    let (status, body) = app.upload(&alice, &slug, "1.0.0", b"tile data").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let file_id = body["files"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["files"][0]["size_bytes"], 9);

    // drafts are private
    let (status, _) = app.json("GET", &format!("/api/projects/{}", slug), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.json("POST", &format!("/api/projects/{}/submit", slug), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let (status, body) = app.json("GET", "/api/admin/projects/pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app
        .json("POST", &format!("/api/admin/projects/{}/approve", slug), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json("POST", &format!("/api/admin/projects/{}/approve", slug), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = app.json("GET", &format!("/api/projects/{}", slug), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_type"], "tile_set");
    assert_eq!(body["members"][0]["username"], "alice");

    let (status, body) = app.json("GET", "/api/projects?type=tile_set&q=forest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["slug"], slug);

    let (status, body) = app.json("GET", "/api/projects?type=mod", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/files/{}/download", file_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert_eq!(disposition, "attachment; filename=\"pack.zip\"");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"tile data");

    let (_, body) = app.json("GET", &format!("/api/projects/{}/versions/1.0.0", slug), None, None).await;
    assert_eq!(body["downloads"], 1);
}

#[tokio::test]
async fn quota_overrides_reject_large_uploads() {
    let app = app().await;
    let admin = app.register("admin").await;
    let alice = app.register("alice").await;
    let slug = app.create_project(&alice, "Tiny").await;

    let (status, _) = app
        .json("PUT", "/api/admin/users/alice/quota", Some(&admin), Some(json!({ "file_size": -5 })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .json("PUT", "/api/admin/users/alice/quota", Some(&admin), Some(json!({ "file_size": 4 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quota"]["file_size"], 4);

    let (status, body) = app.upload(&alice, &slug, "1.0.0", b"too large").await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(body["quota"]["kind"], "file_size");
    assert_eq!(body["quota"]["limit"], 4);

    let (status, body) = app.json("GET", &format!("/api/projects/{}/quota", slug), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let file_size = body
        .as_array()
        .unwrap()
        .iter()
        .find(|line| line["kind"] == "file_size")
        .unwrap();
    assert_eq!(file_size["source"], "user");
}

#[tokio::test]
async fn banned_users_are_locked_out() {
    let app = app().await;
    let admin = app.register("admin").await;
    let bob = app.register("bob").await;

    let (status, _) = app
        .json("POST", "/api/admin/users/bob/ban", Some(&admin), Some(json!({ "reason": "spam" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.json("GET", "/api/users/me", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("spam"));

    let (status, _) = app
        .json("POST", "/api/admin/users/admin/ban", Some(&admin), Some(json!({ "reason": "oops" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.json("POST", "/api/admin/users/bob/unban", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json("GET", "/api/users/me", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn membership_invitations_over_http() {
    let app = app().await;
    let _admin = app.register("admin").await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let slug = app.create_project(&alice, "Shared").await;

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/projects/{}/members", slug),
            Some(&alice),
            Some(json!({ "username": "bob", "role": "maintainer" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .json("POST", &format!("/api/projects/{}/members/accept", slug), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .json("GET", &format!("/api/projects/{}/members", slug), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let members = body.as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["username"], "alice");
    assert_eq!(members[0]["is_primary"], true);

    let (status, _) = app
        .json("DELETE", &format!("/api/projects/{}/members/alice", slug), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("POST", &format!("/api/projects/{}/members/leave", slug), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
