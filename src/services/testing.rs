//! In-memory fakes shared by the service and handler tests.

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use super::{
    object_store::{ObjectStore, StoreError, StoreResult},
    repository::Repository,
    sheets::{ReviewRow, ReviewSheet, SheetError},
};

/// A migrated single-connection in-memory database.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    crate::run_migrations(&pool).await.expect("migrations");
    Arc::new(pool)
}

pub async fn memory_repository() -> Repository {
    Repository::new(memory_pool().await)
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    content_types: Mutex<HashMap<String, String>>,
    failing_puts: Mutex<Vec<String>>,
    failing_gets: Mutex<HashSet<String>>,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every put whose key contains `fragment` fail.
    pub fn fail_puts_containing(&self, fragment: &str) {
        self.failing_puts.lock().unwrap().push(fragment.to_string());
    }

    pub fn fail_get(&self, key: &str) {
        self.failing_gets.lock().unwrap().insert(key.to_string());
    }

    pub fn insert(&self, key: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(data));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.content_types.lock().unwrap().get(key).cloned()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let fails = self
            .failing_puts
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if fails {
            return Err(StoreError::Backend("injected put failure".into()));
        }
        if let Some(content_type) = content_type {
            self.content_types
                .lock()
                .unwrap()
                .insert(key.to_string(), content_type.to_string());
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        if self.failing_gets.lock().unwrap().contains(key) {
            return Err(StoreError::Backend("injected get failure".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        Ok(format!("memory://{key}?ttl={}", ttl.as_secs()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
pub struct RecordingSheet {
    rows: Mutex<Vec<ReviewRow>>,
    calls: AtomicUsize,
    failing: bool,
}

impl RecordingSheet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::default()
        })
    }

    pub fn rows(&self) -> Vec<ReviewRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewSheet for RecordingSheet {
    async fn append_rows(&self, rows: &[ReviewRow]) -> Result<usize, SheetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(SheetError::Rejected {
                status: 503,
                body: "sheet unavailable".into(),
            });
        }
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}
