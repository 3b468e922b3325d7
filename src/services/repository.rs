//! Relational persistence for projects and photos (SQLite via sqlx).
//!
//! Multi-row writes run in a single transaction. There is no optimistic
//! concurrency control: the last writer to a row wins.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::models::{
    photo::{NewPhoto, Photo},
    project::{Project, ProjectSummary},
};

#[derive(Clone)]
pub struct Repository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

fn project_not_found(id: i64) -> ServiceError {
    ServiceError::NotFound(format!("project {id} not found"))
}

fn photo_not_found(id: i64) -> ServiceError {
    ServiceError::NotFound(format!("photo {id} not found"))
}

impl Repository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        folder_name: &str,
    ) -> ServiceResult<Project> {
        sqlx::query_as::<_, Project>(
            "INSERT INTO projects (name, description, folder_name, created_at, is_active)
             VALUES (?, ?, ?, ?, 1)
             RETURNING id, name, description, folder_name, created_at, is_active",
        )
        .bind(name)
        .bind(description)
        .bind(folder_name)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Validation(format!("folder name `{folder_name}` already exists"))
            } else {
                ServiceError::Database(err)
            }
        })
    }

    pub async fn get_project(&self, id: i64) -> ServiceResult<Project> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, folder_name, created_at, is_active
             FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| project_not_found(id))
    }

    /// Projects newest first, with photo and download counts computed from
    /// the photo rows.
    pub async fn list_projects(&self, active_only: bool) -> ServiceResult<Vec<ProjectSummary>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.name, p.description, p.folder_name, p.created_at, p.is_active, \
             COUNT(ph.id) AS photo_count, \
             COALESCE(SUM(ph.is_downloaded), 0) AS downloaded_count \
             FROM projects p LEFT JOIN photos ph ON ph.project_id = p.id",
        );
        if active_only {
            builder.push(" WHERE p.is_active = 1");
        }
        builder.push(" GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC");

        Ok(builder
            .build_query_as::<ProjectSummary>()
            .fetch_all(&*self.db)
            .await?)
    }

    pub async fn update_project(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> ServiceResult<Project> {
        sqlx::query_as::<_, Project>(
            "UPDATE projects SET name = ?, description = ?, is_active = ?
             WHERE id = ?
             RETURNING id, name, description, folder_name, created_at, is_active",
        )
        .bind(name)
        .bind(description)
        .bind(is_active)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| project_not_found(id))
    }

    /// Delete a project and all of its photo rows in one transaction.
    /// Returns the number of photo rows removed.
    pub async fn delete_project(&self, id: i64) -> ServiceResult<u64> {
        let mut tx = self.db.begin().await?;

        let photos = sqlx::query("DELETE FROM photos WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let projects = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if projects == 0 {
            return Err(project_not_found(id));
        }

        tx.commit().await?;
        Ok(photos)
    }

    /// Insert a batch of photo rows atomically.
    pub async fn insert_photos(&self, photos: &[NewPhoto]) -> ServiceResult<Vec<Photo>> {
        if photos.is_empty() {
            return Ok(Vec::new());
        }

        let uploaded_at = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut inserted = Vec::with_capacity(photos.len());
        for photo in photos {
            let row = sqlx::query_as::<_, Photo>(
                "INSERT INTO photos (
                    project_id, storage_key, original_filename, uploader_name,
                    file_size, uploaded_at, is_downloaded
                 ) VALUES (?, ?, ?, ?, ?, ?, 0)
                 RETURNING id, project_id, storage_key, original_filename, uploader_name,
                           file_size, uploaded_at, is_downloaded, downloaded_at",
            )
            .bind(photo.project_id)
            .bind(&photo.storage_key)
            .bind(&photo.original_filename)
            .bind(&photo.uploader_name)
            .bind(photo.file_size)
            .bind(uploaded_at)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_photo(&self, id: i64) -> ServiceResult<Photo> {
        sqlx::query_as::<_, Photo>(
            "SELECT id, project_id, storage_key, original_filename, uploader_name,
                    file_size, uploaded_at, is_downloaded, downloaded_at
             FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| photo_not_found(id))
    }

    pub async fn delete_photo(&self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(photo_not_found(id));
        }
        Ok(())
    }

    /// Photos of a project in upload order, optionally limited to one uploader.
    pub async fn list_photos(
        &self,
        project_id: i64,
        uploader: Option<&str>,
    ) -> ServiceResult<Vec<Photo>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, project_id, storage_key, original_filename, uploader_name, \
             file_size, uploaded_at, is_downloaded, downloaded_at \
             FROM photos WHERE project_id = ",
        );
        builder.push_bind(project_id);
        if let Some(uploader) = uploader {
            builder.push(" AND uploader_name = ");
            builder.push_bind(uploader);
        }
        builder.push(" ORDER BY id ASC");

        Ok(builder
            .build_query_as::<Photo>()
            .fetch_all(&*self.db)
            .await?)
    }

    /// Flag photos as downloaded at `at`, all in one transaction.
    pub async fn mark_downloaded(&self, ids: &[i64], at: DateTime<Utc>) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        for id in ids {
            sqlx::query("UPDATE photos SET is_downloaded = 1, downloaded_at = ? WHERE id = ?")
                .bind(at)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
