//! `GET /media/{token}`: presigned reads for the local object store.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

use crate::{
    errors::AppError,
    services::{admin::content_type_for, object_store::StoreError},
    state::AppState,
};

/// Stream the object a media token grants, if the token is valid.
pub async fn media(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let store = state
        .local_store
        .as_ref()
        .ok_or_else(|| AppError::not_found("media links are not served by this backend"))?;
    let key = store
        .key_for_token(&token)
        .ok_or_else(|| AppError::not_found("link expired or invalid"))?;

    let file = store.open(&key).await.map_err(|err| match err {
        StoreError::NotFound(_) | StoreError::InvalidKey(_) => AppError::not_found(err.to_string()),
        other => AppError::internal(other.to_string()),
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&key)),
    );
    Ok(response)
}
