//! Administrative project and photo management.

use bytes::Bytes;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ServiceError, ServiceResult, object_store::ObjectStore, repository::Repository};
use crate::models::project::{Project, ProjectDetail, ProjectSummary, sanitize_folder_name};

/// Lifetime of preview URLs.
pub const PREVIEW_TTL: Duration = Duration::from_secs(3600);

/// A single photo ready to be served as an attachment.
#[derive(Debug)]
pub struct PhotoDownload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// MIME type for the image extensions accepted on upload.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn required_name(name: &str) -> ServiceResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("project name is required".into()));
    }
    Ok(name)
}

fn optional_text(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

#[derive(Clone)]
pub struct AdminService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
}

impl AdminService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    pub async fn list_projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        self.repo.list_projects(false).await
    }

    pub async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<Project> {
        let name = required_name(name)?;
        let suffix = Uuid::new_v4().simple().to_string();
        let folder_name = format!("{}_{}", sanitize_folder_name(name), &suffix[..8]);

        let project = self
            .repo
            .create_project(name, optional_text(description), &folder_name)
            .await?;
        info!("created project {} ({})", project.id, project.folder_name);
        Ok(project)
    }

    pub async fn update_project(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> ServiceResult<Project> {
        let name = required_name(name)?;
        self.repo
            .update_project(id, name, optional_text(description), is_active)
            .await
    }

    /// Delete every stored object of the project (best effort), then the
    /// project and its photo rows.
    pub async fn delete_project(&self, id: i64) -> ServiceResult<u64> {
        let project = self.repo.get_project(id).await?;
        let photos = self.repo.list_photos(id, None).await?;
        for photo in &photos {
            if let Err(err) = self.store.delete(&photo.storage_key).await {
                warn!("could not delete object {}: {}", photo.storage_key, err);
            }
        }

        let removed = self.repo.delete_project(id).await?;
        info!("deleted project {} `{}` with {} photos", id, project.name, removed);
        Ok(removed)
    }

    pub async fn project_detail(&self, id: i64) -> ServiceResult<ProjectDetail> {
        let project = self.repo.get_project(id).await?;
        let photos = self.repo.list_photos(id, None).await?;
        Ok(ProjectDetail::group(project, photos))
    }

    /// Fetch one photo and flag it as downloaded.
    pub async fn download_photo(&self, id: i64) -> ServiceResult<PhotoDownload> {
        let photo = self.repo.get_photo(id).await?;
        let bytes = self.store.get(&photo.storage_key).await?;
        self.repo.mark_downloaded(&[photo.id], Utc::now()).await?;

        Ok(PhotoDownload {
            file_name: format!("{}_{}", photo.uploader_name, photo.original_filename),
            content_type: content_type_for(&photo.original_filename),
            bytes,
        })
    }

    pub async fn preview_url(&self, id: i64) -> ServiceResult<String> {
        let photo = self.repo.get_photo(id).await?;
        Ok(self.store.presign(&photo.storage_key, PREVIEW_TTL).await?)
    }

    pub async fn delete_photo(&self, id: i64) -> ServiceResult<()> {
        let photo = self.repo.get_photo(id).await?;
        if let Err(err) = self.store.delete(&photo.storage_key).await {
            warn!("could not delete object {}: {}", photo.storage_key, err);
        }
        self.repo.delete_photo(id).await
    }
}
