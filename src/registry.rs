//! Block registry: durable store + in-memory index of resolved blocks.
//!
//! Writes go to the store first and only then into the in-memory map, so
//! a failed write leaves no trace. Entries are never replaced; `reset` is
//! the only way to remove them.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::model::*;
use crate::storage::BlockStore;
use crate::{Error, Result};

// ============================================================================
// BlockRegistry
// ============================================================================

pub struct BlockRegistry<S: BlockStore> {
    store: S,
    blocks: RwLock<HashMap<BlockId, Block>>,
}

impl<S: BlockStore> BlockRegistry<S> {
    /// Load every stored block and index it.
    pub async fn open(store: S) -> Result<Self> {
        let loaded = store.load_blocks().await?;
        let mut blocks = HashMap::with_capacity(loaded.len());
        let mut anchors = 0usize;
        for block in loaded {
            if block.is_anchor() {
                anchors += 1;
            }
            if blocks.insert(block.id.clone(), block).is_some() {
                return Err(Error::Schema("duplicate block_name in block_transforms".into()));
            }
        }
        if anchors > 1 {
            return Err(Error::Schema(format!("store holds {anchors} anchor blocks")));
        }
        debug!(blocks = blocks.len(), "registry opened");
        Ok(Self { store, blocks: RwLock::new(blocks) })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Enter `id` as the anchor with an identity transform.
    ///
    /// Fails if `id` already has an entry or another anchor exists.
    pub async fn register_anchor(&self, id: &BlockId, aabb: Option<Aabb>) -> Result<Block> {
        {
            let blocks = self.blocks.read();
            if blocks.contains_key(id) {
                return Err(Error::AlreadyRegistered(id.to_string()));
            }
            if let Some(existing) = blocks.values().find(|b| b.is_anchor()) {
                return Err(Error::AlreadyRegistered(format!(
                    "cannot anchor '{id}': '{}' is already the anchor",
                    existing.id
                )));
            }
        }
        let block = Block::anchor(id.clone(), aabb);
        self.commit(block).await
    }

    /// Store the resolved global transform of a non-anchor block.
    ///
    /// Fails if `id` already has a transform; nothing is overwritten.
    /// Fails with `NotFound` while there is no anchor to be global against.
    pub async fn put_transform(
        &self,
        id: &BlockId,
        transform: RigidTransform,
        aabb: Option<Aabb>,
    ) -> Result<Block> {
        if self.contains(id) {
            return Err(Error::AlreadyRegistered(id.to_string()));
        }
        if self.anchor().is_none() {
            return Err(Error::NotFound(format!("anchor (needed before storing '{id}')")));
        }
        // Re-validate: callers may have built the matrix by hand.
        let transform = RigidTransform::try_from_matrix(transform.matrix())?;
        self.commit(Block::registered(id.clone(), transform, aabb)).await
    }

    async fn commit(&self, block: Block) -> Result<Block> {
        self.store.insert_block(&block).await?;
        let mut blocks = self.blocks.write();
        if blocks.contains_key(&block.id) {
            return Err(Error::AlreadyRegistered(block.id.to_string()));
        }
        info!(block = %block.id, status = ?block.status, "block committed");
        blocks.insert(block.id.clone(), block.clone());
        Ok(block)
    }

    /// Drop every block and portal, in the store and in memory.
    pub async fn reset(&self) -> Result<()> {
        self.store.reset().await?;
        self.blocks.write().clear();
        info!("registry reset");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_transform(&self, id: &BlockId) -> Result<RigidTransform> {
        self.blocks
            .read()
            .get(id)
            .map(|b| b.transform)
            .ok_or_else(|| Error::NotFound(format!("block '{id}'")))
    }

    pub fn get_block(&self, id: &BlockId) -> Result<Block> {
        self.blocks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("block '{id}'")))
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.read().contains_key(id)
    }

    pub fn anchor(&self) -> Option<Block> {
        self.blocks.read().values().find(|b| b.is_anchor()).cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Owned, read-only copy for the runtime side.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot { blocks: self.blocks.read().clone() }
    }
}

// ============================================================================
// RegistrySnapshot
// ============================================================================

/// Immutable copy of the registry, loaded once and shared by the portal
/// builder and the navigation controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    blocks: HashMap<BlockId, Block>,
}

impl RegistrySnapshot {
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    /// Read every block straight from a store.
    pub async fn load<S: BlockStore + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self::from_blocks(store.load_blocks().await?))
    }

    pub fn transform(&self, id: &BlockId) -> Option<&RigidTransform> {
        self.blocks.get(id).map(|b| &b.transform)
    }

    pub fn get_transform(&self, id: &BlockId) -> Result<RigidTransform> {
        self.transform(id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("block '{id}'")))
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Blocks sorted by id, anchor first.
    pub fn blocks(&self) -> Vec<&Block> {
        let mut all: Vec<&Block> = self.blocks.values().collect();
        all.sort_by(|a, b| b.is_anchor().cmp(&a.is_anchor()).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
