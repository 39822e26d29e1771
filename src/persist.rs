// src/persist.rs
//! Snapshot persistence of the collector. The blob is JSON:
//! `{"msgs": [...], "initial_target_count": N, "page_size": N}`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinHandle;

use crate::error::PersistenceError;
use crate::message::Message;
use crate::store::{CollectorState, StoreSettings};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, blob: &[u8]) -> Result<(), PersistenceError>;
    /// `Ok(None)` when nothing was persisted yet.
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError>;
}

/// Single JSON file, replaced atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unreadable snapshot aside to `<name>.corrupt` so a later save
    /// does not overwrite it. Returns the new path.
    pub async fn quarantine(&self) -> Result<PathBuf, PersistenceError> {
        let target = self.path.with_extension("corrupt");
        fs::rename(&self.path, &target).await?;
        Ok(target)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, blob: &[u8]) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, blob).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(&self.path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub msgs: Vec<Message>,
    pub initial_target_count: usize,
    pub page_size: usize,
}

impl Snapshot {
    pub fn of(state: &CollectorState) -> Self {
        let settings = state.settings();
        Self {
            msgs: state.snapshot().to_vec(),
            initial_target_count: settings.initial_target_count,
            page_size: settings.page_size,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_json::to_vec(self).map_err(PersistenceError::Encode)
    }

    /// Decode and restore the newest-first, unique-id shape.
    pub fn decode(blob: &[u8]) -> Result<Self, PersistenceError> {
        let mut snap: Snapshot = serde_json::from_slice(blob).map_err(PersistenceError::Decode)?;
        snap.msgs.sort_by(|a, b| b.id.cmp(&a.id));
        snap.msgs.dedup_by_key(|m| m.id);
        Ok(snap)
    }
}

/// Build the collector from persisted state, or empty when there is none.
/// `settings` from configuration take precedence over persisted ones.
pub async fn restore(store: &dyn SnapshotStore, settings: StoreSettings) -> Result<CollectorState, PersistenceError> {
    let Some(blob) = store.load().await? else {
        tracing::info!("no persisted snapshot, starting empty");
        return Ok(CollectorState::new(settings));
    };
    let snap = Snapshot::decode(&blob)?;
    if snap.page_size != settings.page_size || snap.initial_target_count != settings.initial_target_count {
        tracing::info!(
            persisted_page_size = snap.page_size,
            persisted_initial_target = snap.initial_target_count,
            "persisted settings differ from configuration, using configuration"
        );
    }
    tracing::info!(total = snap.msgs.len(), "snapshot restored");
    Ok(CollectorState::with_messages(settings, snap.msgs))
}

pub async fn save_once(store: &dyn SnapshotStore, state: &CollectorState) -> Result<(), PersistenceError> {
    let blob = Snapshot::of(state).encode()?;
    store.save(&blob).await
}

/// Save on a fixed period, independent of refresh cycles. Unchanged state is not rewritten.
pub fn spawn_autosave(store: Arc<dyn SnapshotStore>, state: Arc<CollectorState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        let mut saved_revision = state.revision();
        loop {
            ticker.tick().await;
            let revision = state.revision();
            if revision == saved_revision {
                tracing::trace!(revision, "state unchanged, skipping save");
                continue;
            }
            match save_once(store.as_ref(), &state).await {
                Ok(()) => {
                    saved_revision = revision;
                    counter!("harvester_saves_total").increment(1);
                    tracing::debug!(revision, total = state.len(), "snapshot saved");
                }
                Err(e) => {
                    counter!("harvester_save_errors_total").increment(1);
                    tracing::warn!(error = %e, "snapshot save failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StoreSettings {
        StoreSettings {
            initial_target_count: 500,
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.unwrap().is_none());
        let state = restore(&store, settings()).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn save_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("state").join("c.json"));
        let state = CollectorState::with_messages(
            settings(),
            vec![Message::new(3, "2021-01-01 10:02", "c"), Message::new(1, "2021-01-01 10:00", "a")],
        );
        save_once(&store, &state).await.unwrap();
        assert!(!dir.path().join("state").join("c.tmp").exists());

        let back = restore(&store, settings()).await.unwrap();
        assert_eq!(*back.snapshot(), *state.snapshot());
    }

    #[test]
    fn decode_sorts_and_dedups() {
        let blob = br#"{"msgs":[
            {"id":1,"created_at":"a","body":"x"},
            {"id":5,"created_at":"b","body":"y"},
            {"id":1,"created_at":"a","body":"x"}
        ],"initial_target_count":10,"page_size":5}"#;
        let snap = Snapshot::decode(blob).unwrap();
        assert_eq!(snap.msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 1]);
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = restore(&FileSnapshotStore::new(path), settings()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Decode(_)));
    }

    #[tokio::test]
    async fn quarantine_keeps_unreadable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = FileSnapshotStore::new(&path);

        let moved = store.quarantine().await.unwrap();
        assert_eq!(moved, dir.path().join("c.corrupt"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"{not json");
        assert!(store.load().await.unwrap().is_none());

        let state = CollectorState::with_messages(settings(), vec![Message::new(1, "t", "a")]);
        save_once(&store, &state).await.unwrap();
        assert_eq!(std::fs::read(&moved).unwrap(), b"{not json");
    }

    #[derive(Default)]
    struct MemoryStore {
        saves: std::sync::Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl SnapshotStore for MemoryStore {
        async fn save(&self, blob: &[u8]) -> Result<(), PersistenceError> {
            self.saves.lock().unwrap().push(blob.to_vec());
            Ok(())
        }

        async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
            Ok(self.saves.lock().unwrap().last().cloned())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_writes_only_after_changes() {
        let store = Arc::new(MemoryStore::default());
        let state = Arc::new(CollectorState::new(settings()));
        let task = spawn_autosave(store.clone(), Arc::clone(&state), Duration::from_secs(10));

        // t=15: one period passed, nothing changed
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(store.saves.lock().unwrap().is_empty());

        state.replace(vec![Message::new(7, "2021-01-01 10:00", "x")]);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.saves.lock().unwrap().len(), 1);

        // two more periods without a replace
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.saves.lock().unwrap().len(), 1);

        let blob = store.load().await.unwrap().unwrap();
        let snap = Snapshot::decode(&blob).unwrap();
        assert_eq!(snap.msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![7]);
        task.abort();
    }
}
