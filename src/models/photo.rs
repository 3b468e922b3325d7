//! Represents one uploaded photo, owned by a project and attributed to an
//! uploader. The binary lives in the object store under `storage_key`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A photo metadata row.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Photo {
    /// Generated integer id.
    pub id: i64,

    /// Owning project.
    pub project_id: i64,

    /// Object-store key, unique across all photos.
    pub storage_key: String,

    /// File name as supplied by the uploader.
    pub original_filename: String,

    /// Free-text uploader name.
    pub uploader_name: String,

    /// Declared size in bytes, if known.
    pub file_size: Option<i64>,

    pub uploaded_at: DateTime<Utc>,

    /// Set once the photo has been included in any download.
    pub is_downloaded: bool,

    pub downloaded_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// Human readable size: `-`, `N B`, `N.N KB` or `N.N MB`.
    pub fn file_size_display(&self) -> String {
        match self.file_size {
            None => "-".to_string(),
            Some(size) if size < 1024 => format!("{size} B"),
            Some(size) if size < 1024 * 1024 => format!("{:.1} KB", size as f64 / 1024.0),
            Some(size) => format!("{:.1} MB", size as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// A photo row waiting to be inserted.
#[derive(Clone, Debug)]
pub struct NewPhoto {
    pub project_id: i64,
    pub storage_key: String,
    pub original_filename: String,
    pub uploader_name: String,
    pub file_size: i64,
}
