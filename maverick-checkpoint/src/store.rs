//! ABOUTME: CheckpointStore trait and the default file-backed impl
//! ABOUTME: Atomic temp-file + rename writes, with a startup sweep for interrupted prior writes

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::data::CheckpointData;
use crate::error::{CheckpointError, Result};

/// The checkpoint store contract. Alternative implementations
/// (in-memory, remote) satisfy the same four methods; the filesystem layout
/// below is a default, not the contract.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, workflow_id: &str, data: CheckpointData) -> Result<()>;
    async fn load(&self, workflow_id: &str, checkpoint_id: &str) -> Result<Option<CheckpointData>>;
    async fn load_latest(&self, workflow_id: &str) -> Result<Option<CheckpointData>>;
    async fn clear(&self, workflow_id: &str) -> Result<()>;
}

/// Default store: one JSON file per checkpoint at
/// `<base>/<workflow_name>/<checkpoint_id>.json`.
pub struct FileCheckpointStore {
    base: PathBuf,
}

impl FileCheckpointStore {
    /// Open (creating if needed) a store rooted at `base`, sweeping away any
    /// `*.tmp` files left over from a prior interrupted write.
    pub async fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)
            .await
            .map_err(|source| io_err(&base, source))?;
        let store = Self { base };
        store.sweep_temp_files().await?;
        Ok(store)
    }

    fn workflow_dir(&self, workflow_id: &str) -> PathBuf {
        self.base.join(workflow_id)
    }

    fn checkpoint_path(&self, workflow_id: &str, checkpoint_id: &str) -> PathBuf {
        self.workflow_dir(workflow_id)
            .join(format!("{checkpoint_id}.json"))
    }

    async fn sweep_temp_files(&self) -> Result<()> {
        let mut stack = vec![self.base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| io_err(&dir, source))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|source| io_err(&path, source))?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                    warn!(path = %path.display(), "removing leftover checkpoint temp file");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, workflow_id: &str, data: CheckpointData) -> Result<()> {
        let dir = self.workflow_dir(workflow_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_err(&dir, source))?;

        let final_path = self.checkpoint_path(workflow_id, &data.checkpoint_id);
        let tmp_path = dir.join(format!("{}.tmp", uuid_like_suffix(&data.checkpoint_id)));

        let bytes = serde_json::to_vec_pretty(&data)?;
        fs::write(&tmp_path, &bytes)
            .await
            .map_err(|source| io_err(&tmp_path, source))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|source| io_err(&final_path, source))?;

        debug!(
            workflow_id,
            checkpoint_id = %data.checkpoint_id,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self, workflow_id: &str, checkpoint_id: &str) -> Result<Option<CheckpointData>> {
        let path = self.checkpoint_path(workflow_id, checkpoint_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_err(&path, source)),
        }
    }

    async fn load_latest(&self, workflow_id: &str) -> Result<Option<CheckpointData>> {
        let dir = self.workflow_dir(workflow_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_err(&dir, source)),
        };

        let mut latest: Option<CheckpointData> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| io_err(&dir, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await.map_err(|source| io_err(&path, source))?;
            let data: CheckpointData = serde_json::from_slice(&bytes)?;
            let is_newer = match &latest {
                Some(current) => data.saved_at > current.saved_at,
                None => true,
            };
            if is_newer {
                latest = Some(data);
            }
        }
        Ok(latest)
    }

    async fn clear(&self, workflow_id: &str) -> Result<()> {
        let dir = self.workflow_dir(workflow_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&dir, source)),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// `checkpoint_id`s are arbitrary strings (often a step name); sanitize into
/// a filesystem-safe temp suffix without pulling in a UUID dependency here.
fn uuid_like_suffix(checkpoint_id: &str) -> String {
    checkpoint_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(checkpoint_id: &str) -> CheckpointData {
        CheckpointData {
            checkpoint_id: checkpoint_id.to_string(),
            workflow_name: "wf".to_string(),
            inputs_hash: "abc123abc123abc1".to_string(),
            step_results: vec![],
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).await.unwrap();
        let data = sample("cp1");
        store.save("wf", data.clone()).await.unwrap();

        let loaded = store.load("wf", "cp1").await.unwrap().unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn load_latest_picks_most_recent_saved_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).await.unwrap();

        let mut older = sample("cp1");
        older.saved_at = Utc::now() - chrono::Duration::seconds(60);
        store.save("wf", older).await.unwrap();

        let newer = sample("cp2");
        store.save("wf", newer.clone()).await.unwrap();

        let latest = store.load_latest("wf").await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, "cp2");
        assert_eq!(latest, newer);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).await.unwrap();
        assert!(store.load("wf", "nope").await.unwrap().is_none());
        assert!(store.load_latest("wf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweeps_leftover_temp_files_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let wf_dir = dir.path().join("wf");
        std::fs::create_dir_all(&wf_dir).unwrap();
        std::fs::write(wf_dir.join("stale.tmp"), b"garbage").unwrap();

        let _store = FileCheckpointStore::new(dir.path()).await.unwrap();
        assert!(!wf_dir.join("stale.tmp").exists());
    }

    #[tokio::test]
    async fn clear_removes_all_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).await.unwrap();
        store.save("wf", sample("cp1")).await.unwrap();
        store.clear("wf").await.unwrap();
        assert!(store.load_latest("wf").await.unwrap().is_none());
    }
}
