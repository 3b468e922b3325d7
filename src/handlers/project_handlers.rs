//! Public endpoints: active project listing and submissions.

use axum::{
    Form, Json,
    extract::{Multipart, Path, State},
    http::header,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::AppError,
    models::project::{Project, ProjectSummary},
    services::submission::{REVIEW_SLOTS, Submission, SubmissionReceipt, UploadedFile},
    state::AppState,
};

/// Form body of `POST /api/projects/{id}/reviews`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewForm {
    pub uploader_name: String,
    pub review_1: Option<String>,
    pub review_2: Option<String>,
    pub review_3: Option<String>,
    pub review_4: Option<String>,
    pub review_5: Option<String>,
}

impl ReviewForm {
    /// Split into the uploader name and the review slots in order.
    fn into_parts(self) -> (String, Vec<String>) {
        let reviews = [
            self.review_1,
            self.review_2,
            self.review_3,
            self.review_4,
            self.review_5,
        ]
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
        (self.uploader_name, reviews)
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewReceipt {
    pub review_count: usize,
}

/// `GET /api/projects`
pub async fn list_active_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    Ok(Json(state.repo.list_projects(true).await?))
}

/// `GET /api/projects/{id}`
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.repo.get_project(id).await?))
}

/// `POST /api/projects/{id}/submissions` : multipart with `uploader_name`,
/// any number of `photos` parts and `review_1`..`review_5`.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<SubmissionReceipt>, AppError> {
    let submission = read_submission(multipart).await?;
    Ok(Json(state.submissions.submit(id, submission).await?))
}

/// `POST /api/projects/{id}/reviews` : reviews only, no length floor.
pub async fn submit_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Json<ReviewReceipt>, AppError> {
    let (uploader_name, reviews) = form.into_parts();
    let review_count = state
        .submissions
        .submit_reviews(id, &uploader_name, &reviews)
        .await?;
    Ok(Json(ReviewReceipt { review_count }))
}

/// Review slot index (0-based) for a `review_N` field name.
fn review_slot(field_name: &str) -> Option<usize> {
    let digit = field_name.strip_prefix("review_")?;
    (1..=REVIEW_SLOTS).position(|n| digit == n.to_string())
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut submission = Submission {
        reviews: vec![String::new(); REVIEW_SLOTS],
        ..Submission::default()
    };
    let malformed = |e: axum::extract::multipart::MultipartError| {
        AppError::bad_request(format!("invalid multipart body: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "uploader_name" {
            submission.uploader_name = field.text().await.map_err(malformed)?;
        } else if name == "photos" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let declared_len = field
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            let data = field.bytes().await.map_err(malformed)?;
            // an empty file input still sends a nameless part
            if file_name.is_empty() {
                continue;
            }
            submission.files.push(UploadedFile {
                file_name,
                content_type,
                declared_len,
                data,
            });
        } else if let Some(slot) = review_slot(&name) {
            submission.reviews[slot] = field.text().await.map_err(malformed)?;
        }
    }

    Ok(submission)
}
