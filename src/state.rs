//! Shared state handed to every handler.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{
    admin::AdminService, archive::ArchiveService, auth::AdminAuth,
    local_store::LocalObjectStore, object_store::ObjectStore, repository::Repository,
    sheets::ReviewSheet, submission::SubmissionService,
};

#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub submissions: SubmissionService,
    pub archives: ArchiveService,
    pub admin: AdminService,
    pub auth: AdminAuth,
    pub store: Arc<dyn ObjectStore>,
    /// Set when objects live on local disk; serves `/media` links.
    pub local_store: Option<Arc<LocalObjectStore>>,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        store: Arc<dyn ObjectStore>,
        local_store: Option<Arc<LocalObjectStore>>,
        sheet: Arc<dyn ReviewSheet>,
        auth: AdminAuth,
    ) -> Self {
        let repo = Repository::new(db);
        Self {
            submissions: SubmissionService::new(repo.clone(), store.clone(), sheet),
            archives: ArchiveService::new(repo.clone(), store.clone()),
            admin: AdminService::new(repo.clone(), store.clone()),
            repo,
            auth,
            store,
            local_store,
        }
    }
}
