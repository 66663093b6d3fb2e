// Saves image attachments under the same per-channel, per-day layout as logs.
//
// Filenames are `{HH-MM-SS}_{author}_{authorId}.{ext}`. If a second image
// from the same author lands in the same second, `_1`, `_2`, ... is added.
// Files are created with create-new so concurrent saves never overwrite.

use super::archive_models::{is_image_mime, ArchiveError, RootKind};
use super::path_resolver::{sanitize_segment, PathResolver};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const FALLBACK_EXTENSION: &str = "png";
const MAX_COLLISION_SUFFIX: u32 = 1_000;

/// Port for pulling attachment bytes off the chat platform's CDN.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ArchiveError>;
}

/// Everything needed to store one attachment.
pub struct MediaUpload<'a> {
    pub bytes: &'a [u8],
    pub mime_type: Option<&'a str>,
    pub file_name: &'a str,
    pub scope: &'a str,
    pub subscope: &'a str,
    pub author_name: &'a str,
    pub author_id: u64,
    pub now: NaiveDateTime,
}

pub struct MediaArchiver {
    resolver: Arc<PathResolver>,
}

impl MediaArchiver {
    pub fn new(resolver: Arc<PathResolver>) -> Self {
        Self { resolver }
    }

    /// Store an attachment. Returns `Ok(None)` for anything that isn't an image.
    pub async fn save(&self, upload: MediaUpload<'_>) -> Result<Option<PathBuf>, ArchiveError> {
        if !is_image_mime(upload.mime_type) {
            tracing::debug!(
                file_name = upload.file_name,
                mime_type = ?upload.mime_type,
                "Skipping non-image attachment"
            );
            return Ok(None);
        }

        let dir = self
            .resolver
            .resolve(RootKind::Media, upload.scope, upload.subscope, upload.now)?;

        let stem = format!(
            "{}_{}_{}",
            upload.now.format("%H-%M-%S"),
            sanitize_segment(upload.author_name),
            upload.author_id
        );
        let ext = extension_for(upload.file_name, upload.mime_type);

        let path = write_unique(&dir, &stem, &ext, upload.bytes).await?;
        tracing::info!(path = %path.display(), "Saved attachment");
        Ok(Some(path))
    }
}

/// Keep the real extension: the upload's own, else the MIME subtype, else png.
pub fn extension_for(file_name: &str, mime_type: Option<&str>) -> String {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }

    let from_mime = mime_type
        .and_then(|m| m.split(';').next())
        .and_then(|m| m.trim().split('/').nth(1))
        .map(|sub| sub.split('+').next().unwrap_or(sub))
        .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()));

    from_mime
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

async fn write_unique(
    dir: &Path,
    stem: &str,
    ext: &str,
    bytes: &[u8],
) -> Result<PathBuf, ArchiveError> {
    for attempt in 0..=MAX_COLLISION_SUFFIX {
        let name = if attempt == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, attempt, ext)
        };
        let path = dir.join(name);

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(ArchiveError::StorageUnavailable { path, source }),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // Don't leave a truncated image behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ArchiveError::TransferFailure(format!(
                "writing {}: {}",
                path.display(),
                e
            )));
        }

        return Ok(path);
    }

    Err(ArchiveError::TransferFailure(format!(
        "no free filename for {} in {}",
        stem,
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::path_resolver::StorageRoots;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    fn archiver(tmp: &TempDir) -> MediaArchiver {
        MediaArchiver::new(Arc::new(PathResolver::new(StorageRoots::under(
            tmp.path(),
        ))))
    }

    fn upload<'a>(bytes: &'a [u8], mime: Option<&'a str>, file_name: &'a str) -> MediaUpload<'a> {
        MediaUpload {
            bytes,
            mime_type: mime,
            file_name,
            scope: "Guild1",
            subscope: "memes",
            author_name: "bob",
            author_id: 42,
            now: now(),
        }
    }

    #[tokio::test]
    async fn non_image_attachments_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let archiver = archiver(&tmp);

        let stored = archiver
            .save(upload(b"notes", Some("text/plain"), "notes.txt"))
            .await
            .unwrap();

        assert!(stored.is_none());
        assert!(!tmp.path().join("discord_images").exists());
    }

    #[tokio::test]
    async fn image_is_stored_under_dated_folder_with_real_extension() {
        let tmp = TempDir::new().unwrap();
        let archiver = archiver(&tmp);

        let stored = archiver
            .save(upload(b"\xff\xd8jpeg", Some("image/jpeg"), "Photo.JPG"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            stored,
            tmp.path()
                .join("discord_images/Guild1/memes/2024/02/29/14-05-09_bob_42.jpg")
        );
        assert_eq!(std::fs::read(&stored).unwrap(), b"\xff\xd8jpeg");
    }

    #[tokio::test]
    async fn same_second_saves_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let archiver = archiver(&tmp);

        let first = archiver
            .save(upload(b"one", Some("image/png"), "a.png"))
            .await
            .unwrap()
            .unwrap();
        let second = archiver
            .save(upload(b"two", Some("image/png"), "b.png"))
            .await
            .unwrap()
            .unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("14-05-09_bob_42_1.png"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn extension_falls_back_to_mime_then_png() {
        assert_eq!(extension_for("pic.webp", Some("image/webp")), "webp");
        assert_eq!(extension_for("pic", Some("image/gif")), "gif");
        assert_eq!(extension_for("vector", Some("image/svg+xml")), "svg");
        assert_eq!(extension_for("noext", Some("image/")), "png");
        assert_eq!(extension_for("weird.p/g", None), "png");
    }
}
