//! File-backed block store.
//!
//! The store is a single JSON document holding both tables. Every write
//! re-reads the document, applies the change and replaces the file via
//! write-to-temp + rename, so a reader in another process sees either the
//! previous or the new document, never a torn one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::schema::{BlockTransformRow, PortalRow, StoreDocument};
use super::BlockStore;
use crate::model::*;
use crate::{Error, Result};

/// JSON document store at a fixed path.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store for writing, creating an empty document if the file
    /// does not exist yet. An existing file must pass the schema check.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into(), write_lock: Mutex::new(()) };
        if store.path.exists() {
            store.read_document()?;
        } else {
            store.write_document(StoreDocument::default())?;
        }
        Ok(store)
    }

    /// Open a store that must already exist (the runtime side).
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into(), write_lock: Mutex::new(()) };
        if !store.path.exists() {
            return Err(Error::NotFound(format!("store file {}", store.path.display())));
        }
        store.read_document()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_document(&self) -> Result<StoreDocument> {
        let text = fs::read_to_string(&self.path)?;
        StoreDocument::from_json(&text)
    }

    fn write_document(&self, mut doc: StoreDocument) -> Result<()> {
        doc.updated_at = Some(Utc::now());
        let text = doc.to_json()?;
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(
            path = %self.path.display(),
            blocks = doc.block_transforms.len(),
            portals = doc.portals.len(),
            "store document written"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StoreDocument) -> Result<()>,
    {
        let _guard = self.write_lock.lock();
        let mut doc = self.read_document()?;
        apply(&mut doc)?;
        self.write_document(doc)
    }
}

#[async_trait]
impl BlockStore for FileStore {
    async fn load_blocks(&self) -> Result<Vec<Block>> {
        self.read_document()?.blocks()
    }

    async fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        self.read_document()?
            .find_block(id)
            .map(BlockTransformRow::to_block)
            .transpose()
    }

    async fn insert_block(&self, block: &Block) -> Result<()> {
        self.update(|doc| {
            if doc.find_block(&block.id).is_some() {
                return Err(Error::AlreadyRegistered(block.id.to_string()));
            }
            doc.block_transforms.push(BlockTransformRow::from(block));
            Ok(())
        })
    }

    async fn load_portals(&self) -> Result<Vec<PortalRecord>> {
        self.read_document()?.portal_records()
    }

    async fn replace_portals(&self, portals: &[PortalRecord]) -> Result<()> {
        self.update(|doc| {
            doc.portals = portals.iter().map(PortalRow::from).collect();
            Ok(())
        })
    }

    async fn reset(&self) -> Result<()> {
        self.update(|doc| {
            doc.block_transforms.clear();
            doc.portals.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        let store = FileStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.load_blocks().await.unwrap().is_empty());
        assert!(store.read_document().unwrap().updated_at.is_some());
        assert!(!dir.path().join("metadata.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_insert_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        {
            let store = FileStore::open(&path).unwrap();
            let b = Block::registered(
                BlockId::from("B"),
                RigidTransform::from_translation(DVec3::X),
                None,
            );
            store.insert_block(&b).await.unwrap();
            assert!(matches!(
                store.insert_block(&b).await,
                Err(Error::AlreadyRegistered(_))
            ));
        }
        let reader = FileStore::open_existing(&path).unwrap();
        let b = reader.get_block(&BlockId::from("B")).await.unwrap().unwrap();
        assert_eq!(b.transform.translation(), DVec3::X);
    }

    #[test]
    fn test_open_existing_requires_file() {
        let dir = TempDir::new().unwrap();
        let err = FileStore::open_existing(dir.path().join("missing.json")).err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_open_rejects_foreign_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.json");
        fs::write(&path, r#"{"transforms": []}"#).unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Schema(_))));
    }
}
