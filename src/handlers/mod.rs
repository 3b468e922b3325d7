//! HTTP handlers. Each one parses its request, delegates to a service and
//! maps the outcome to JSON or an attachment.

pub mod admin_handlers;
pub mod health_handlers;
pub mod media_handlers;
pub mod project_handlers;

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};

use crate::errors::AppError;

/// Build a download response with an ASCII fallback file name and the
/// UTF-8 name in `filename*`.
pub fn attachment(
    file_name: &str,
    content_type: &'static str,
    bytes: impl Into<Body>,
) -> Result<Response, AppError> {
    let fallback_name: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !matches!(c, '"' | '\\') && !c.is_ascii_control() { c } else { '_' })
        .collect();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_name,
        urlencoding::encode(file_name)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(bytes.into())
        .map_err(|e| AppError::internal(format!("failed to build response: {e}")))
}
