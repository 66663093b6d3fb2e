// Derives the on-disk folder for a (scope, subscope, date) triple.
//
// Layout: root -> kind base -> scope -> subscope -> YYYY -> MM -> DD.
// The same inputs always produce the same path, so callers can re-derive it on
// every write instead of remembering it.

use super::archive_models::{ArchiveError, RootKind};
use chrono::{Datelike, NaiveDateTime};
use std::path::{Path, PathBuf};

/// The three storage trees, all under one archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    pub logs: PathBuf,
    pub media: PathBuf,
    pub users: PathBuf,
}

impl StorageRoots {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            logs: root.join("discord_logs"),
            media: root.join("discord_images"),
            users: root.join("discord_users"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: StorageRoots,
}

impl PathResolver {
    pub fn new(roots: StorageRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    /// Pure part of `resolve`: compute the directory without touching the disk.
    pub fn directory_for(
        &self,
        kind: RootKind,
        scope: &str,
        subscope: &str,
        now: NaiveDateTime,
    ) -> PathBuf {
        let base = match kind {
            RootKind::Logs => &self.roots.logs,
            RootKind::Media => &self.roots.media,
        };

        base.join(sanitize_segment(scope))
            .join(sanitize_segment(subscope))
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()))
            .join(format!("{:02}", now.day()))
    }

    /// Compute the directory and make sure the whole chain exists.
    pub fn resolve(
        &self,
        kind: RootKind,
        scope: &str,
        subscope: &str,
        now: NaiveDateTime,
    ) -> Result<PathBuf, ArchiveError> {
        let dir = self.directory_for(kind, scope, subscope, now);
        std::fs::create_dir_all(&dir).map_err(|source| ArchiveError::StorageUnavailable {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

/// Make a guild/channel/user name safe to use as one path segment.
///
/// Separators, NUL and other characters Windows refuses are replaced with `_`.
/// Names that would be interpreted as `.`/`..`, or are empty, become `_`.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
