//! Admin endpoints. Everything except `login` sits behind [`require_admin`].

use axum::{
    Json,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::attachment;
use crate::{
    errors::AppError,
    models::{
        photo::Photo,
        project::{Project, ProjectDetail, ProjectSummary},
    },
    services::auth::IssuedToken,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct PhotoView {
    #[serde(flatten)]
    pub photo: Photo,
    pub file_size_display: String,
}

impl From<Photo> for PhotoView {
    fn from(photo: Photo) -> Self {
        Self {
            file_size_display: photo.file_size_display(),
            photo,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploaderView {
    pub uploader_name: String,
    pub photos: Vec<PhotoView>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailView {
    #[serde(flatten)]
    pub project: Project,
    pub photo_count: usize,
    pub downloaded_count: usize,
    pub uploaders: Vec<UploaderView>,
}

impl From<ProjectDetail> for ProjectDetailView {
    fn from(detail: ProjectDetail) -> Self {
        let photo_count = detail.photo_count();
        let downloaded_count = detail.downloaded_count();
        Self {
            project: detail.project,
            photo_count,
            downloaded_count,
            uploaders: detail
                .uploaders
                .into_iter()
                .map(|group| UploaderView {
                    uploader_name: group.uploader_name,
                    photos: group.photos.into_iter().map(PhotoView::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub deleted_photos: u64,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub url: String,
}

/// Rejects requests without a valid `Authorization: Bearer` admin token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("missing or invalid Authorization header"))?;

    state.auth.verify(token)?;
    Ok(next.run(request).await)
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AppError> {
    let issued = state.auth.login(&req.password)?;
    tracing::info!("admin login, token valid until {}", issued.expires_at);
    Ok(Json(issued))
}

/// `GET /api/admin/projects`
pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    Ok(Json(state.admin.list_projects().await?))
}

/// `POST /api/admin/projects`
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let project = state
        .admin
        .create_project(&req.name, req.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /api/admin/projects/{id}`
pub async fn project_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectDetailView>, AppError> {
    let detail = state.admin.project_detail(id).await?;
    Ok(Json(detail.into()))
}

/// `PUT /api/admin/projects/{id}`
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .admin
        .update_project(id, &req.name, req.description.as_deref(), req.is_active)
        .await?;
    Ok(Json(project))
}

/// `DELETE /api/admin/projects/{id}`
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteProjectResponse>, AppError> {
    let deleted_photos = state.admin.delete_project(id).await?;
    Ok(Json(DeleteProjectResponse { deleted_photos }))
}

/// `GET /api/admin/projects/{id}/archive`
pub async fn project_archive(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let archive = state.archives.project_archive(id).await?;
    attachment(&archive.file_name, "application/zip", archive.bytes)
}

/// `GET /api/admin/projects/{id}/uploaders/{uploader}/archive`
pub async fn uploader_archive(
    State(state): State<AppState>,
    Path((id, uploader)): Path<(i64, String)>,
) -> Result<Response, AppError> {
    let archive = state.archives.uploader_archive(id, &uploader).await?;
    attachment(&archive.file_name, "application/zip", archive.bytes)
}

/// `GET /api/admin/photos/{id}/download`
pub async fn download_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let download = state.admin.download_photo(id).await?;
    attachment(&download.file_name, download.content_type, download.bytes)
}

/// `GET /api/admin/photos/{id}/preview`
pub async fn preview_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PreviewResponse>, AppError> {
    let url = state.admin.preview_url(id).await?;
    Ok(Json(PreviewResponse { url }))
}

/// `DELETE /api/admin/photos/{id}`
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_photo(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
