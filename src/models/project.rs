//! Represents a project: a named collection soliciting photo and review
//! submissions from many uploaders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::photo::Photo;

/// A project row.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Project {
    /// Generated integer id.
    pub id: i64,

    /// Display name, also the first segment of every storage key.
    pub name: String,

    /// Optional free-text description.
    pub description: Option<String>,

    /// Unique folder name: sanitized name plus a random suffix.
    pub folder_name: String,

    /// When this project was created.
    pub created_at: DateTime<Utc>,

    /// Inactive projects are hidden from the public listing.
    pub is_active: bool,
}

/// A project together with counts aggregated over its photos.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct ProjectSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub photo_count: i64,
    pub downloaded_count: i64,
}

/// Photos of one uploader inside a project.
#[derive(Serialize, Clone, Debug)]
pub struct UploaderGroup {
    pub uploader_name: String,
    pub photos: Vec<Photo>,
}

/// A project with its photos grouped by uploader, in first-upload order.
#[derive(Clone, Debug)]
pub struct ProjectDetail {
    pub project: Project,
    pub uploaders: Vec<UploaderGroup>,
}

impl ProjectDetail {
    /// Group `photos` by uploader, keeping the order in which each uploader
    /// first appears.
    pub fn group(project: Project, photos: Vec<Photo>) -> Self {
        let mut uploaders: Vec<UploaderGroup> = Vec::new();
        for photo in photos {
            match uploaders
                .iter_mut()
                .find(|group| group.uploader_name == photo.uploader_name)
            {
                Some(group) => group.photos.push(photo),
                None => uploaders.push(UploaderGroup {
                    uploader_name: photo.uploader_name.clone(),
                    photos: vec![photo],
                }),
            }
        }
        Self { project, uploaders }
    }

    pub fn photos(&self) -> impl Iterator<Item = &Photo> {
        self.uploaders.iter().flat_map(|group| group.photos.iter())
    }

    pub fn photo_count(&self) -> usize {
        self.photos().count()
    }

    pub fn downloaded_count(&self) -> usize {
        self.photos().filter(|photo| photo.is_downloaded).count()
    }
}

/// Turn a project name into a folder-safe slug.
///
/// Every character that is not a letter, digit or `_` becomes `_`; the
/// result is lowercased. Hangul and other non-Latin letters are kept.
pub fn sanitize_folder_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}
