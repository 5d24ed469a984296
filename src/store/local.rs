use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{InitError, StorageError};
use crate::format;
use crate::store::{ImageStore, StoredImage};

const TEMP_SUFFIX: &str = ".tmp";

/// Flat directory of `<id>.<extension>` files.
///
/// Lookups list the whole directory and match on the id prefix, so each `get`
/// is linear in the number of stored images. Fine for a single node with a
/// modest catalogue; an id-to-file index would have to sit behind
/// [`ImageStore`] if that stops being true.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    /// Opens the store at `base_dir`, creating it and any missing ancestors.
    #[tracing::instrument(skip(base_dir))]
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, InitError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|source| InitError::CreateRoot {
            path: base_dir.clone(),
            source,
        })?;
        tracing::info!(path = %base_dir.display(), "opened image storage");
        Ok(Self { base_dir })
    }

    pub fn root(&self) -> &Path {
        &self.base_dir
    }

    /// Final file name for an image. Bare id when there is no extension.
    pub fn file_name(id: &str, extension: &str) -> String {
        if extension.is_empty() {
            id.to_string()
        } else {
            format!("{id}.{}", extension.to_lowercase())
        }
    }

    pub fn resolve_path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    fn temp_path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(format!(".{file_name}{TEMP_SUFFIX}"))
    }

    /// Scans the directory for the entry belonging to `id`.
    async fn find(&self, id: &str) -> Result<Option<String>, StorageError> {
        let mut dir = fs::read_dir(&self.base_dir)
            .await
            .map_err(|err| StorageError::io(&self.base_dir, err))?;
        let dotted = format!("{id}.");
        let mut found: Option<String> = None;
        let mut matches = 0usize;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| StorageError::io(&self.base_dir, err))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // In-flight writes live under hidden names.
            if name.starts_with('.') {
                continue;
            }
            if name != id && !name.starts_with(&dotted) {
                continue;
            }
            matches += 1;
            if found.as_ref().is_none_or(|current| name < *current) {
                found = Some(name);
            }
        }
        if matches > 1 {
            tracing::warn!(id, matches, "several files share one image id, using the first");
        }
        Ok(found)
    }
}

fn check_key(value: &str, what: &str) -> Result<(), StorageError> {
    if value.starts_with('.') || value.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidKey(format!("{what} {value:?}")));
    }
    Ok(())
}

#[async_trait]
impl ImageStore for LocalFileStorage {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, id: &str, extension: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidKey("empty id".to_string()));
        }
        check_key(id, "id")?;
        check_key(extension, "extension")?;

        let file_name = Self::file_name(id, extension);
        let path = self.resolve_path(&file_name);
        let temp_path = self.temp_path(&file_name);

        // Publish by rename so readers see the whole file or nothing.
        if let Err(err) = write_synced(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io(&temp_path, err));
        }
        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io(&path, err));
        }

        tracing::debug!(path = %path.display(), "stored image");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<StoredImage, StorageError> {
        if id.is_empty() || check_key(id, "id").is_err() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let Some(file_name) = self.find(id).await? else {
            return Err(StorageError::NotFound(id.to_string()));
        };

        let path = self.resolve_path(&file_name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(err) => return Err(StorageError::io(&path, err)),
        };
        let extension = file_name
            .strip_prefix(id)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or("");

        tracing::debug!(path = %path.display(), size = bytes.len(), "loaded image");
        Ok(StoredImage {
            bytes,
            format: format::normalize(extension),
        })
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_creates_missing_ancestors() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("a").join("b").join("images");
        let storage = LocalFileStorage::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.root(), root.as_path());
    }

    #[test]
    fn new_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = LocalFileStorage::new(blocker.join("images")).unwrap_err();
        assert!(matches!(err, InitError::CreateRoot { .. }));
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes_and_format() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        storage.put("abc", "JPG", b"dummy data").await.unwrap();

        assert!(dir.path().join("abc.jpg").is_file());
        let image = storage.get("abc").await.unwrap();
        assert_eq!(image.bytes, b"dummy data");
        assert_eq!(image.format, "jpeg");
    }

    #[tokio::test]
    async fn put_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        storage.put("abc", "png", b"data").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["abc.png".to_string()]);
    }

    #[tokio::test]
    async fn extensionless_upload_is_stored_under_bare_id() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        storage.put("raw", "", b"data").await.unwrap();

        let image = storage.get("raw").await.unwrap();
        assert_eq!(image.bytes, b"data");
        assert_eq!(image.format, "");
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        let err = storage.get("nonexistent").await.unwrap_err();
        assert!(err.is_not_found());
        let err = storage.get("").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn lookup_does_not_match_longer_ids() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        storage.put("abcdef", "png", b"other").await.unwrap();

        assert!(storage.get("abc").await.unwrap_err().is_not_found());
        assert!(storage.get("ABCDEF").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn temp_files_are_invisible_to_lookup() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        std::fs::write(dir.path().join(".pending.png.tmp"), b"partial").unwrap();

        assert!(storage.get("pending").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn temp_file_names_cannot_be_requested_as_ids() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        std::fs::write(dir.path().join(".pending.png.tmp"), b"partial").unwrap();

        for id in [".pending.png", ".pending", ".pending.png.tmp", "../pending", "a/b"] {
            assert!(storage.get(id).await.unwrap_err().is_not_found(), "{id:?}");
        }
    }

    #[tokio::test]
    async fn unreadable_root_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("images");
        let storage = LocalFileStorage::new(&root).unwrap();
        std::fs::remove_dir(&root).unwrap();

        let err = storage.get("abc").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_the_root() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        for (id, ext) in [("../x", "png"), ("a/b", "png"), (".hidden", "png"), ("ok", "p/ng"), ("", "png")] {
            let err = storage.put(id, ext, b"x").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey(_)), "{id:?} {ext:?}");
        }
    }
}
