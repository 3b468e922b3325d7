//! Submission workflow: photos go to the object store and the photos table,
//! qualifying reviews go to the spreadsheet in one batch.
//!
//! Per-item failures are skipped, never fatal: a failed upload drops that
//! file, a failed spreadsheet append drops the reviews. Photo rows are
//! inserted together at the end of the request, so a failed insert leaves
//! already-uploaded objects orphaned in the store.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    ServiceError, ServiceResult,
    object_store::ObjectStore,
    repository::Repository,
    sheets::{ReviewSheet, review_rows},
};
use crate::models::photo::NewPhoto;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
pub const REVIEW_SLOTS: usize = 5;
/// Minimum review length, in characters, on the combined photo+review form.
pub const MIN_REVIEW_CHARS: usize = 50;

/// One file part of a submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    /// Length declared by the client for this part, if any.
    pub declared_len: Option<u64>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub uploader_name: String,
    pub files: Vec<UploadedFile>,
    /// Review slots in form order; only the first five are read.
    pub reviews: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub photo_count: usize,
    pub review_count: usize,
    /// Outcome of the spreadsheet append, when reviews were forwarded.
    pub review_message: Option<String>,
}

/// True when `file_name` has an extension from [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Reduce a client file name to a safe ASCII form: path separators and
/// whitespace become `_`, other characters outside `[A-Za-z0-9_.-]` are
/// dropped, and leading/trailing dots and underscores are trimmed.
pub fn secure_filename(file_name: &str) -> String {
    let spaced: String = file_name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{project}/{uploader}/{random_hex}_{sanitized_file_name}`
pub fn storage_key(project_name: &str, uploader_name: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}_{}",
        project_name,
        uploader_name,
        Uuid::new_v4().simple(),
        secure_filename(file_name)
    )
}

#[derive(Clone)]
pub struct SubmissionService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
    sheet: Arc<dyn ReviewSheet>,
}

impl SubmissionService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>, sheet: Arc<dyn ReviewSheet>) -> Self {
        Self { repo, store, sheet }
    }

    /// Store the photos and long-enough reviews of one submission.
    pub async fn submit(
        &self,
        project_id: i64,
        submission: Submission,
    ) -> ServiceResult<SubmissionReceipt> {
        let project = self.repo.get_project(project_id).await?;
        let uploader = submission.uploader_name.trim();
        if uploader.is_empty() {
            return Err(ServiceError::Validation("uploader name is required".into()));
        }

        let mut pending = Vec::new();
        for file in submission.files {
            if !is_allowed_file(&file.file_name) {
                debug!("skipping disallowed file `{}`", file.file_name);
                continue;
            }

            let key = storage_key(&project.name, uploader, &file.file_name);
            if let Err(err) = self
                .store
                .put(&key, file.data, file.content_type.as_deref())
                .await
            {
                warn!("upload of `{}` to {} failed: {}", file.file_name, key, err);
                continue;
            }

            pending.push(NewPhoto {
                project_id: project.id,
                storage_key: key,
                original_filename: file.file_name,
                uploader_name: uploader.to_string(),
                file_size: file.declared_len.map_or(0, |len| len as i64),
            });
        }

        let reviews: Vec<String> = submission
            .reviews
            .iter()
            .take(REVIEW_SLOTS)
            .map(|review| review.trim())
            .filter(|review| review.chars().count() >= MIN_REVIEW_CHARS)
            .map(str::to_string)
            .collect();
        let (review_count, review_message) =
            self.forward_reviews(uploader, &project.name, &reviews).await;

        let photos = match self.repo.insert_photos(&pending).await {
            Ok(photos) => photos,
            Err(err) => {
                error!(
                    "recording {} photos for project {} failed; their objects stay orphaned",
                    pending.len(),
                    project.id
                );
                return Err(err);
            }
        };

        if photos.is_empty() && review_count == 0 {
            return Err(ServiceError::Validation(
                "select photos to upload or write a review".into(),
            ));
        }

        info!(
            "project {} received {} photos and {} reviews from {}",
            project.id,
            photos.len(),
            review_count,
            uploader
        );
        Ok(SubmissionReceipt {
            photo_count: photos.len(),
            review_count,
            review_message,
        })
    }

    /// Reviews-only entry point: every non-blank review is forwarded, and a
    /// spreadsheet failure is the caller's error.
    pub async fn submit_reviews(
        &self,
        project_id: i64,
        uploader_name: &str,
        reviews: &[String],
    ) -> ServiceResult<usize> {
        let project = self.repo.get_project(project_id).await?;
        let uploader = uploader_name.trim();
        if uploader.is_empty() {
            return Err(ServiceError::Validation("uploader name is required".into()));
        }

        let slots = &reviews[..reviews.len().min(REVIEW_SLOTS)];
        let rows = review_rows(uploader, &project.name, slots);
        if rows.is_empty() {
            return Err(ServiceError::Validation(
                "write at least one review".into(),
            ));
        }

        let saved = self.sheet.append_rows(&rows).await?;
        info!("project {} received {} reviews from {}", project.id, saved, uploader);
        Ok(saved)
    }

    async fn forward_reviews(
        &self,
        uploader: &str,
        project_name: &str,
        reviews: &[String],
    ) -> (usize, Option<String>) {
        if reviews.is_empty() {
            return (0, None);
        }

        let rows = review_rows(uploader, project_name, reviews);
        match self.sheet.append_rows(&rows).await {
            Ok(saved) => (saved, Some(format!("{saved} reviews saved"))),
            Err(err) => {
                warn!("saving {} reviews failed: {}", rows.len(), err);
                (0, Some(err.to_string()))
            }
        }
    }
}
