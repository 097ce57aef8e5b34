// src/storage/local.rs

//! Local JSON snapshot file.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::Snapshot;

/// Load/save the last published snapshot as a JSON file.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted snapshot; `None` if no file exists yet.
    pub async fn load(&self) -> Result<Option<Snapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Persist a snapshot, replacing the previous file atomically.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Folder, SnapshotBuilder};

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("snapshot.json"));

        assert!(file.load().await.unwrap().is_none());

        let mut builder = SnapshotBuilder::new();
        builder.insert(Entity::Folder(Folder {
            id: "f1".into(),
            course: "c1".into(),
            parent: None,
            name: "Hauptordner".into(),
            children: vec!["x".into()],
            changed: None,
        }));
        builder.record_failure("f2".into(), "folder listing", "boom");
        let snapshot = builder.seal();

        file.save(&snapshot).await.unwrap();
        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.is_partial());
        assert_eq!(
            loaded.children_of(&"f1".into()),
            snapshot.children_of(&"f1".into())
        );
    }
}
