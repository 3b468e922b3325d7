//! Builds in-memory ZIP archives of stored photos and flags the included
//! photos as downloaded.
//!
//! Order of effects: fetch every object, compress the archive, then commit
//! all download flags in one transaction. Objects that cannot be fetched
//! are left out and keep their flag.

use bytes::Bytes;
use chrono::Utc;
use std::{
    collections::HashSet,
    io::{Cursor, Write},
    sync::Arc,
};
use tracing::{info, warn};
use zip::{CompressionMethod, ZipWriter, result::ZipResult, write::SimpleFileOptions};

use super::{ServiceError, ServiceResult, object_store::ObjectStore, repository::Repository};
use crate::models::photo::Photo;

/// A finished archive ready to be served as an attachment.
#[derive(Debug)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub entry_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `{uploader}/{original_filename}`
    ByUploader,
    /// `{original_filename}`
    Flat,
}

#[derive(Clone)]
pub struct ArchiveService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
}

impl ArchiveService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    /// Every photo of the project, grouped in folders per uploader.
    pub async fn project_archive(&self, project_id: i64) -> ServiceResult<Archive> {
        let project = self.repo.get_project(project_id).await?;
        let photos = self.repo.list_photos(project_id, None).await?;
        let file_name = format!("{}_전체사진.zip", project.name);
        self.assemble(file_name, photos, Layout::ByUploader).await
    }

    /// The photos of a single uploader, without folders.
    pub async fn uploader_archive(
        &self,
        project_id: i64,
        uploader_name: &str,
    ) -> ServiceResult<Archive> {
        let project = self.repo.get_project(project_id).await?;
        let photos = self
            .repo
            .list_photos(project_id, Some(uploader_name))
            .await?;
        let file_name = format!("{}_{}.zip", project.name, uploader_name);
        self.assemble(file_name, photos, Layout::Flat).await
    }

    async fn assemble(
        &self,
        file_name: String,
        photos: Vec<Photo>,
        layout: Layout,
    ) -> ServiceResult<Archive> {
        if photos.is_empty() {
            return Err(ServiceError::EmptySet("no photos to download".into()));
        }

        let mut entries = Vec::with_capacity(photos.len());
        let mut included = Vec::with_capacity(photos.len());
        for photo in &photos {
            match self.store.get(&photo.storage_key).await {
                Ok(data) => {
                    entries.push((entry_name(photo, layout), data));
                    included.push(photo.id);
                }
                Err(err) => {
                    warn!("leaving {} out of {}: {}", photo.storage_key, file_name, err);
                }
            }
        }

        let entry_count = entries.len();
        let bytes = tokio::task::spawn_blocking(move || write_zip(entries)).await??;

        self.repo.mark_downloaded(&included, Utc::now()).await?;
        info!(
            "built {} with {} of {} photos ({} bytes)",
            file_name,
            entry_count,
            photos.len(),
            bytes.len()
        );

        Ok(Archive {
            file_name,
            bytes,
            entry_count,
        })
    }
}

fn entry_name(photo: &Photo, layout: Layout) -> String {
    match layout {
        Layout::ByUploader => format!("{}/{}", photo.uploader_name, photo.original_filename),
        Layout::Flat => photo.original_filename.clone(),
    }
}

/// Insert ` (n)` before the extension of the last path segment.
fn numbered(name: &str, n: usize) -> String {
    let segment_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = segment_start + dot;
            format!("{} ({}){}", &name[..dot], n, &name[dot..])
        }
        _ => format!("{name} ({n})"),
    }
}

/// Entry names already written to one archive.
#[derive(Default)]
struct EntryNames {
    seen: HashSet<String>,
}

impl EntryNames {
    fn claim(&mut self, name: String) -> String {
        if self.seen.insert(name.clone()) {
            return name;
        }
        let mut n = 2;
        loop {
            let candidate = numbered(&name, n);
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn write_zip(entries: Vec<(String, Bytes)>) -> ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = EntryNames::default();

    for (name, data) in entries {
        writer.start_file(names.claim(name), options)?;
        writer.write_all(&data)?;
    }

    Ok(writer.finish()?.into_inner())
}
