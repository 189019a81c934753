use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::multipart::Field;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::ApiError;

/// Destination category for an uploaded file. Each kind maps to its own
/// directory under the uploads root and carries its own extension policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PostImage,
    PostVideo,
    ProfilePicture,
    CoverPhoto,
}

impl MediaKind {
    pub fn dir(&self) -> &'static str {
        match self {
            MediaKind::PostImage => "post_images",
            MediaKind::PostVideo => "post_videos",
            MediaKind::ProfilePicture => "profile_pics",
            MediaKind::CoverPhoto => "cover_photos",
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::PostVideo => &["mp4", "mov", "webm"],
            _ => &["jpg", "jpeg", "png", "webp"],
        }
    }
}

/// A file taken off the wire, not yet persisted. The filename is the
/// client-supplied hint and is never used as a storage path.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub body: Bytes,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, kind: MediaKind, stored_name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn remove(&self, kind: MediaKind, stored_name: &str) -> anyhow::Result<()>;
}

/// Persists one optional upload and returns the stored filename.
///
/// `Ok(None)` means no file was supplied, distinct from a rejected one.
/// The stored name is generated (UUID + lower-cased extension); the hint
/// is only consulted for its extension after path components are stripped,
/// so a hostile filename cannot escape the destination directory. The file
/// is fully written before the caller records the name on the owning row.
pub async fn save_upload(
    store: &dyn MediaStore,
    kind: MediaKind,
    upload: Option<FileUpload>,
) -> Result<Option<String>, ApiError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    let ext = sanitized_extension(&upload.filename).ok_or_else(|| {
        ApiError::Validation(format!("{:?} has no usable file extension", upload.filename))
    })?;
    if !kind.allowed_extensions().contains(&ext.as_str()) {
        return Err(ApiError::Validation(format!(
            ".{} files are not accepted for {}",
            ext,
            kind.dir()
        )));
    }
    let stored = format!("{}.{}", Uuid::new_v4(), ext);
    store.put(kind, &stored, upload.body).await?;
    Ok(Some(stored))
}

/// Removes a stored file, logging instead of failing: callers that clean up
/// media after a row deletion must succeed even when the filesystem does not.
pub async fn remove_best_effort(store: &dyn MediaStore, kind: MediaKind, stored_name: &str) {
    if let Err(e) = store.remove(kind, stored_name).await {
        tracing::warn!(error = %e, file = %stored_name, "media cleanup failed");
    }
}

/// Reads a text field out of a multipart form.
pub async fn text_field(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart field".into()))
}

/// Reads a file field out of a multipart form. A file input left blank
/// arrives as an empty part; that counts as absent, the same as the field
/// not being sent at all.
pub async fn file_field(field: Field<'_>) -> Result<Option<FileUpload>, ApiError> {
    let filename = field.file_name().map(|s| s.to_string());
    let body = field
        .bytes()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart field".into()))?;
    match filename {
        Some(filename) if !filename.is_empty() && !body.is_empty() => {
            Ok(Some(FileUpload { filename, body }))
        }
        _ => Ok(None),
    }
}

/// Extension of the hint's final path segment, lower-cased.
fn sanitized_extension(hint: &str) -> Option<String> {
    let name = hint.rsplit(['/', '\\']).next().unwrap_or(hint);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Local-filesystem media store: one subdirectory per kind under the
/// configured root, created on first write.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, kind: MediaKind, stored_name: &str) -> PathBuf {
        self.root.join(kind.dir()).join(stored_name)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, kind: MediaKind, stored_name: &str, body: Bytes) -> anyhow::Result<()> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(stored_name);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn remove(&self, kind: MediaKind, stored_name: &str) -> anyhow::Result<()> {
        let path = self.path_of(kind, stored_name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> Option<FileUpload> {
        Some(FileUpload {
            filename: name.to_string(),
            body: Bytes::from_static(b"file-bytes"),
        })
    }

    #[tokio::test]
    async fn no_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let stored = save_upload(&store, MediaKind::PostImage, None).await.unwrap();
        assert_eq!(stored, None);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn stores_under_generated_name_in_kind_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let stored = save_upload(&store, MediaKind::PostImage, upload("holiday.png"))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored, "holiday.png");
        assert!(stored.ends_with(".png"));
        let path = store.path_of(MediaKind::PostImage, &stored);
        assert_eq!(path.parent().unwrap(), dir.path().join("post_images"));
        assert_eq!(std::fs::read(path).unwrap(), b"file-bytes");
    }

    #[tokio::test]
    async fn hostile_hint_cannot_escape_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let stored = save_upload(
            &store,
            MediaKind::PostImage,
            upload("../../etc/passwd.png"),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!stored.contains('/'));
        assert!(!stored.contains(".."));
        assert!(store.path_of(MediaKind::PostImage, &stored).exists());
        // the only entry under the root is the kind directory itself
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("post_images")]);
    }

    #[tokio::test]
    async fn extension_is_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let stored = save_upload(&store, MediaKind::CoverPhoto, upload("BEACH.JPG"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let err = save_upload(&store, MediaKind::PostVideo, upload("clip.avi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = save_upload(&store, MediaKind::PostImage, upload("script.exe"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let err = save_upload(&store, MediaKind::PostImage, upload("notes"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn remove_best_effort_swallows_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        // must not panic or error out
        remove_best_effort(&store, MediaKind::PostImage, "gone.png").await;
    }

    #[tokio::test]
    async fn remove_deletes_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let stored = save_upload(&store, MediaKind::ProfilePicture, upload("me.webp"))
            .await
            .unwrap()
            .unwrap();
        let path = store.path_of(MediaKind::ProfilePicture, &stored);
        assert!(path.exists());
        store
            .remove(MediaKind::ProfilePicture, &stored)
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sanitized_extension_strips_path_components() {
        assert_eq!(
            sanitized_extension("../../etc/passwd.png").as_deref(),
            Some("png")
        );
        assert_eq!(
            sanitized_extension("C:\\Users\\x\\photo.JPEG").as_deref(),
            Some("jpeg")
        );
        assert_eq!(sanitized_extension("plain.webm").as_deref(), Some("webm"));
        assert_eq!(sanitized_extension("noext"), None);
        assert_eq!(sanitized_extension("trailing."), None);
        assert_eq!(sanitized_extension(".hidden"), None);
    }
}
