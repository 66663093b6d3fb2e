use crate::core::archive::ArchiveError;
use crate::core::users::{LoadedRecord, UserRecord, UserRecordStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One pretty-printed JSON file per user: `{dir}/{user_id}.json`.
pub struct JsonUserRecordStore {
    dir: PathBuf,
}

impl JsonUserRecordStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", user_id))
    }

    async fn ensure_dir(&self) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArchiveError::StorageUnavailable {
                path: self.dir.clone(),
                source,
            })
    }
}

async fn read_record(path: &Path, user_id: &str) -> LoadedRecord {
    let corrupt = |reason: String| ArchiveError::RecordCorrupt {
        user_id: user_id.to_string(),
        reason,
    };

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| corrupt(e.to_string()))?;
    let record: UserRecord = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
    Ok((user_id.to_string(), record))
}

#[async_trait]
impl UserRecordStore for JsonUserRecordStore {
    async fn load_all(&self) -> Result<Vec<LoadedRecord>, ArchiveError> {
        self.ensure_dir().await?;

        let unavailable = |source| ArchiveError::StorageUnavailable {
            path: self.dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&self.dir).await.map_err(unavailable)?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(user_id) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((user_id.to_string(), path.clone()));
            }
        }
        files.sort();

        let mut loaded = Vec::with_capacity(files.len());
        for (user_id, path) in files {
            loaded.push(read_record(&path, &user_id).await);
        }
        Ok(loaded)
    }

    async fn save(&self, user_id: &str, record: &UserRecord) -> Result<(), ArchiveError> {
        self.ensure_dir().await?;

        let path = self.path_for(user_id);
        let text = serde_json::to_string_pretty(record).map_err(|e| ArchiveError::WriteFailure {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = path.with_extension("json.tmp");
        let write_failure = |source| ArchiveError::WriteFailure {
            path: path.clone(),
            source,
        };
        fs::write(&tmp, text).await.map_err(write_failure)?;
        fs::rename(&tmp, &path).await.map_err(write_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::users::{ObservedMember, UserStateStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn records_round_trip_through_disk() {
        let tmp = TempDir::new().unwrap();

        let users = UserStateStore::load(JsonUserRecordStore::new(tmp.path()))
            .await
            .unwrap();
        let al = |nick: &str| {
            ObservedMember::new(1, "Guild1", "al").with_nickname(Some(nick.to_string()))
        };
        users.upsert(&al("Al")).await.unwrap();
        users.upsert(&al("Alex")).await.unwrap();

        // Fresh process: reload from the same directory.
        let reloaded = UserStateStore::load(JsonUserRecordStore::new(tmp.path()))
            .await
            .unwrap();
        let record = reloaded.get(1).await.unwrap();
        let profile = &record.guilds["Guild1"];

        assert_eq!(profile.nickname.as_deref(), Some("Alex"));
        assert_eq!(profile.nicknames, vec!["Al"]);
    }

    #[tokio::test]
    async fn file_uses_field_tagged_layout() {
        let tmp = TempDir::new().unwrap();
        let store = JsonUserRecordStore::new(tmp.path());
        let mut record = UserRecord::default();
        record.observe(&ObservedMember::new(9, "G", "zed").with_status(Some("online".into())));

        store.save("9", &record).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("9.json")).unwrap())
                .unwrap();
        assert_eq!(json["name"], "zed");
        assert_eq!(json["guilds"]["G"]["status"], "online");
        assert!(json["guilds"]["G"]["nicknames"].is_array());
        assert!(!tmp.path().join("9.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_files_are_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("1.json"), r#"{"name": "ok", "guilds": {}}"#).unwrap();
        std::fs::write(tmp.path().join("2.json"), "line0\nline1\n").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let loaded = JsonUserRecordStore::new(tmp.path()).load_all().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(matches!(&loaded[0], Ok((id, r)) if id == "1" && r.name == "ok"));
        assert!(matches!(
            &loaded[1],
            Err(ArchiveError::RecordCorrupt { user_id, .. }) if user_id == "2"
        ));
    }

    #[tokio::test]
    async fn missing_directory_is_created_on_load() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("discord_users");

        let loaded = JsonUserRecordStore::new(&dir).load_all().await.unwrap();

        assert!(loaded.is_empty());
        assert!(dir.is_dir());
    }
}
