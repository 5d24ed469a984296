//! Upload and retrieval on top of an [`ImageStore`] and an [`ImageCodec`].

use std::sync::Arc;

use crate::codec::ImageCodec;
use crate::error::{ConversionError, RetrieveError, StorageError};
use crate::format::{self, CanonicalFormat};
use crate::id;
use crate::store::ImageStore;

/// Bytes handed back by [`ImageService::retrieve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedImage {
    pub bytes: Vec<u8>,
    /// Canonical format of `bytes`, or the stored extension when no
    /// conversion was asked for.
    pub format: String,
}

impl RetrievedImage {
    pub fn content_type(&self) -> &'static str {
        format::mime_type_for(&self.format)
    }
}

#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn ImageStore>,
    codec: Arc<dyn ImageCodec>,
}

impl ImageService {
    pub fn new(store: Arc<dyn ImageStore>, codec: Arc<dyn ImageCodec>) -> Self {
        Self { store, codec }
    }

    /// Stores an upload under a freshly allocated id and returns the id.
    ///
    /// The extension of `original_filename` is kept as the stored format and
    /// is not checked against the content. The write runs on its own task so
    /// it completes even if the caller stops waiting.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn store(&self, original_filename: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let id = id::allocate();
        let extension = extension_of(original_filename);
        let store = Arc::clone(&self.store);
        let task_id = id.clone();
        tokio::spawn(async move { store.put(&task_id, &extension, &bytes).await })
            .await
            .map_err(|err| StorageError::Task(err.to_string()))??;
        tracing::info!(%id, "stored image");
        Ok(id)
    }

    /// Loads an image, converting it when `requested` names a different format.
    ///
    /// The requested token is validated before the codec is touched, and a
    /// request for the stored format returns the stored bytes untouched.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, id: &str, requested: Option<&str>) -> Result<RetrievedImage, RetrieveError> {
        let stored = self.store.get(id).await.inspect_err(|err| {
            if !err.is_not_found() {
                tracing::error!(error = %err, "image lookup failed");
            }
        })?;

        let Some(requested) = requested else {
            return Ok(RetrievedImage {
                bytes: stored.bytes,
                format: stored.format,
            });
        };

        let canonical = format::normalize(requested);
        if !format::is_allowed(&canonical) {
            return Err(RetrieveError::BadFormat(canonical));
        }
        if canonical == stored.format {
            return Ok(RetrievedImage {
                bytes: stored.bytes,
                format: stored.format,
            });
        }

        let target: CanonicalFormat = canonical
            .parse()
            .map_err(|_| RetrieveError::BadFormat(canonical.clone()))?;
        let bytes = self.convert(stored.bytes, stored.format, target).await?;
        Ok(RetrievedImage {
            bytes,
            format: canonical,
        })
    }

    async fn convert(
        &self,
        bytes: Vec<u8>,
        stored_format: String,
        target: CanonicalFormat,
    ) -> Result<Vec<u8>, ConversionError> {
        let codec = Arc::clone(&self.codec);
        let hint = (!stored_format.is_empty()).then_some(stored_format);
        let source = hint.clone();
        let result = tokio::task::spawn_blocking(move || codec.convert(&bytes, hint.as_deref(), target))
            .await
            .map_err(|err| ConversionError::Task(err.to_string()))?;
        match &result {
            Ok(out) => tracing::debug!(?source, %target, size = out.len(), "converted image"),
            Err(err) => tracing::warn!(?source, %target, error = %err, "image conversion failed"),
        }
        result
    }
}

/// Lower-cased text after the last `.` of a file name, or empty.
pub fn extension_of(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.trim().to_lowercase(),
        _ => String::new(),
    }
}
