//! Local-disk object store for development and single-node deployments.
//!
//! Payloads live beneath `root/{shard}/{shard}/{key}`, where the shards are
//! the first two bytes of MD5(key). Presigned URLs point at this service's
//! own `/media/{token}` route.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use super::{
    auth::MediaTokens,
    object_store::{ObjectStore, StoreError, StoreResult},
};

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    tokens: MediaTokens,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, tokens: MediaTokens) -> Self {
        Self {
            root: root.into(),
            tokens,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects empty or oversized keys, absolute keys, `..` segments and
    /// control characters.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == "..")
            || key.chars().any(|c| c.is_control() || c == '\\');
        if invalid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.root.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Open the payload for streaming out of a `/media` request.
    pub async fn open(&self, key: &str) -> StoreResult<File> {
        Self::ensure_key_safe(key)?;
        File::open(self.object_path(key))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
                _ => StoreError::Io(err),
            })
    }

    /// Resolve a media token to the key it grants.
    pub fn key_for_token(&self, token: &str) -> Option<String> {
        self.tokens.key_for(token)
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: Option<&str>) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!("stored {} bytes at {}", data.len(), file_path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        Self::ensure_key_safe(key)?;
        match fs::read(self.object_path(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.root).await;
        }
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        Self::ensure_key_safe(key)?;
        self.tokens.url_for(key, ttl).map_err(StoreError::Presign)
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalObjectStore {
        LocalObjectStore::new(
            dir.path(),
            MediaTokens::new("http://localhost:5000", "secret"),
        )
    }

    #[tokio::test]
    async fn put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let key = "Wedding/Alice/0a1b_cake.jpg";

        store
            .put(key, Bytes::from_static(b"jpeg bytes"), Some("image/jpeg"))
            .await
            .unwrap();
        assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"jpeg bytes"));

        store.delete(key).await.unwrap();
        assert!(matches!(store.get(key).await, Err(StoreError::NotFound(_))));
        // shard directories are pruned back to the root
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_ok() {
        let dir = TempDir::new().unwrap();
        store(&dir).delete("nobody/here.png").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for key in ["", "/etc/passwd", "a/../../b", "a\\b"] {
            assert!(
                matches!(
                    store.put(key, Bytes::new(), None).await,
                    Err(StoreError::InvalidKey(_))
                ),
                "key {key:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn presigned_url_resolves_to_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let url = store
            .presign("제주/민수/ff_sea.png", Duration::from_secs(3600))
            .await
            .unwrap();
        let token = url.rsplit('/').next().unwrap();
        assert_eq!(store.key_for_token(token).as_deref(), Some("제주/민수/ff_sea.png"));
    }
}
