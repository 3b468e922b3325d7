//! Defines every HTTP route of the service.
//!
//! ## Structure
//! - **Public endpoints**
//!   - `GET  /api/projects` : active projects
//!   - `GET  /api/projects/{id}` : one project
//!   - `POST /api/projects/{id}/submissions` : multipart photos + reviews
//!   - `POST /api/projects/{id}/reviews` : reviews only (form)
//!   - `GET  /media/{token}` : presigned reads for the local backend
//!
//! - **Admin endpoints** under `/api/admin`, bearer token required except `login`
//!   - `POST   /login`
//!   - `GET    /projects`, `POST /projects`
//!   - `GET    /projects/{id}`, `PUT /projects/{id}`, `DELETE /projects/{id}`
//!   - `GET    /projects/{id}/archive`
//!   - `GET    /projects/{id}/uploaders/{uploader}/archive`
//!   - `GET    /photos/{id}/download`, `GET /photos/{id}/preview`
//!   - `DELETE /photos/{id}`

use crate::{
    handlers::{
        admin_handlers::{
            create_project, delete_photo, delete_project, download_photo, list_projects, login,
            preview_photo, project_archive, project_detail, require_admin, update_project,
            uploader_archive,
        },
        health_handlers::{healthz, readyz},
        media_handlers::media,
        project_handlers::{get_project, list_active_projects, submit, submit_reviews},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Uploads larger than this are rejected before they reach a handler.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the application router with its shared state attached.
pub fn routes(state: AppState) -> Router {
    let admin = Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(project_detail)
                .put(update_project)
                .delete(delete_project),
        )
        .route("/projects/{id}/archive", get(project_archive))
        .route(
            "/projects/{id}/uploaders/{uploader}/archive",
            get(uploader_archive),
        )
        .route("/photos/{id}/download", get(download_photo))
        .route("/photos/{id}/preview", get(preview_photo))
        .route("/photos/{id}", axum::routing::delete(delete_photo))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route("/login", post(login));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/projects", get(list_active_projects))
        .route("/api/projects/{id}", get(get_project))
        .route("/api/projects/{id}/submissions", post(submit))
        .route("/api/projects/{id}/reviews", post(submit_reviews))
        .route("/media/{token}", get(media))
        .nest("/api/admin", admin)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        auth::{AdminAuth, MediaTokens},
        local_store::LocalObjectStore,
        object_store::ObjectStore,
        testing::{RecordingSheet, memory_pool},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use bytes::Bytes;
    use serde_json::{Value, json};
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        store: Arc<LocalObjectStore>,
        sheet: Arc<RecordingSheet>,
        _dir: TempDir,
    }

    async fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let tokens = MediaTokens::new("http://localhost:5000", "test-secret");
        let local = Arc::new(LocalObjectStore::new(dir.path(), tokens));
        let store: Arc<dyn ObjectStore> = local.clone();
        let sheet = RecordingSheet::new();
        let state = AppState::new(
            memory_pool().await,
            store,
            Some(local.clone()),
            sheet.clone(),
            AdminAuth::new("pw", "test-secret"),
        );
        TestApp {
            router: routes(state),
            store: local,
            sheet,
            _dir: dir,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn login_token(router: &Router) -> String {
        let (status, body) = send(
            router,
            json_request("POST", "/api/admin/login", None, json!({ "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_endpoints_report_ok() {
        let app = app().await;

        let (status, body) = send(&app.router, get_request("/healthz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app.router, get_request("/readyz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage"], "local");
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["storage"]["ok"], true);
    }

    #[tokio::test]
    async fn admin_routes_require_a_token() {
        let app = app().await;

        let (status, _) = send(&app.router, get_request("/api/admin/projects", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app.router,
            get_request("/api/admin/projects", Some("not-a-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app.router,
            json_request("POST", "/api/admin/login", None, json!({ "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_manages_projects_visible_to_public() {
        let app = app().await;
        let token = login_token(&app.router).await;

        let (status, created) = send(
            &app.router,
            json_request(
                "POST",
                "/api/admin/projects",
                Some(&token),
                json!({ "name": "Wedding", "description": "June" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        assert!(created["folder_name"].as_str().unwrap().starts_with("wedding_"));

        let (status, listed) = send(&app.router, get_request("/api/projects", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["name"], "Wedding");

        let (status, _) = send(
            &app.router,
            json_request(
                "PUT",
                &format!("/api/admin/projects/{id}"),
                Some(&token),
                json!({ "name": "Wedding", "description": null, "is_active": false }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, listed) = send(&app.router, get_request("/api/projects", None)).await;
        assert_eq!(listed, json!([]));

        let (status, detail) = send(
            &app.router,
            get_request(&format!("/api/admin/projects/{id}"), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["photo_count"], 0);
        assert_eq!(detail["is_active"], false);
    }

    #[tokio::test]
    async fn missing_resources_map_to_status_codes() {
        let app = app().await;
        let token = login_token(&app.router).await;

        let (status, body) = send(&app.router, get_request("/api/projects/999", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);

        let (status, _) = send(
            &app.router,
            get_request("/api/admin/photos/42/download", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app.router, get_request("/media/garbage", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn media_links_stream_local_objects() {
        let app = app().await;
        app.store
            .put("wedding/alice/a.png", Bytes::from_static(b"png-bytes"), None)
            .await
            .unwrap();
        let url = app
            .store
            .presign("wedding/alice/a.png", Duration::from_secs(60))
            .await
            .unwrap();
        let path = url.strip_prefix("http://localhost:5000").unwrap();

        let response = app
            .router
            .clone()
            .oneshot(get_request(path, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"png-bytes");
    }

    const BOUNDARY: &str = "photo-collector-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File {
            name: &'a str,
            file_name: &'a str,
            content_length: Option<usize>,
            data: &'a [u8],
        },
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_length,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
                    if let Some(len) = content_length {
                        body.extend_from_slice(format!("Content-Length: {len}\r\n").as_bytes());
                    }
                    body.extend_from_slice(b"\r\n");
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn new_project(router: &Router, token: &str, name: &str) -> i64 {
        let (status, created) = send(
            router,
            json_request(
                "POST",
                "/api/admin/projects",
                Some(token),
                json!({ "name": name }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        created["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn multipart_submission_stores_photos_and_long_reviews() {
        let app = app().await;
        let token = login_token(&app.router).await;
        let id = new_project(&app.router, &token, "Wedding").await;
        let long_review = "a".repeat(60);

        let request = multipart_request(
            &format!("/api/projects/{id}/submissions"),
            &[
                Part::Text("uploader_name", "  Alice "),
                Part::File {
                    name: "photos",
                    file_name: "a.jpg",
                    content_length: Some(5),
                    data: b"jpeg1",
                },
                Part::File {
                    name: "photos",
                    file_name: "setup.exe",
                    content_length: None,
                    data: b"MZ",
                },
                Part::File {
                    name: "photos",
                    file_name: "",
                    content_length: None,
                    data: b"",
                },
                Part::File {
                    name: "photos",
                    file_name: "b.JPG",
                    content_length: None,
                    data: b"jpeg2",
                },
                Part::Text("review_1", &long_review),
                Part::Text("review_3", "too short!"),
            ],
        );
        let (status, receipt) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["photo_count"], 2);
        assert_eq!(receipt["review_count"], 1);

        let rows = app.sheet.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].uploader, "Alice");
        assert_eq!(rows[0].project, "Wedding");
        assert_eq!(rows[0].text, long_review);

        let (_, detail) = send(
            &app.router,
            get_request(&format!("/api/admin/projects/{id}"), Some(&token)),
        )
        .await;
        assert_eq!(detail["photo_count"], 2);
        let uploader = &detail["uploaders"][0];
        assert_eq!(uploader["uploader_name"], "Alice");
        let photos = uploader["photos"].as_array().unwrap();
        let names: Vec<&str> = photos
            .iter()
            .map(|p| p["original_filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["a.jpg", "b.JPG"]);
        let sizes: Vec<i64> = photos
            .iter()
            .map(|p| p["file_size"].as_i64().unwrap())
            .collect();
        assert_eq!(sizes, [5, 0]);
    }

    #[tokio::test]
    async fn multipart_submission_without_content_is_rejected() {
        let app = app().await;
        let token = login_token(&app.router).await;
        let id = new_project(&app.router, &token, "Wedding").await;

        let request = multipart_request(
            &format!("/api/projects/{id}/submissions"),
            &[
                Part::Text("uploader_name", "Alice"),
                Part::Text("review_2", "short"),
            ],
        );
        let (status, _) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = multipart_request(
            &format!("/api/projects/{id}/submissions"),
            &[Part::File {
                name: "photos",
                file_name: "a.jpg",
                content_length: None,
                data: b"jpeg",
            }],
        );
        let (status, _) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.sheet.calls(), 0);
    }

    #[tokio::test]
    async fn review_form_forwards_every_non_blank_review() {
        let app = app().await;
        let token = login_token(&app.router).await;
        let id = new_project(&app.router, &token, "Wedding").await;

        let (status, receipt) = send(
            &app.router,
            form_request(
                &format!("/api/projects/{id}/reviews"),
                "uploader_name=Bob&review_1=&review_2=short+and+sweet&review_5=%20%20",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt, json!({ "review_count": 1 }));

        let rows = app.sheet.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].uploader, "Bob");
        assert_eq!(rows[0].text, "short and sweet");

        let (status, _) = send(
            &app.router,
            form_request(&format!("/api/projects/{id}/reviews"), "uploader_name=Bob"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_project_archive_is_a_bad_request() {
        let app = app().await;
        let token = login_token(&app.router).await;
        let (_, created) = send(
            &app.router,
            json_request(
                "POST",
                "/api/admin/projects",
                Some(&token),
                json!({ "name": "Empty" }),
            ),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let (status, _) = send(
            &app.router,
            get_request(&format!("/api/admin/projects/{id}/archive"), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
