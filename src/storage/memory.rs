//! In-memory block store.
//!
//! Reference implementation of `BlockStore`. Clones share the same
//! tables, so a registry can be dropped and reopened against the same
//! store to simulate a restart.
//!
//! ## Limitations
//!
//! - **No persistence**: contents die with the process.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::BlockStore;
use crate::model::*;
use crate::{Error, Result};

/// In-memory store backed by ordered row lists.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    blocks: RwLock<Vec<Block>>,
    portals: RwLock<Vec<PortalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn load_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.inner.blocks.read().clone())
    }

    async fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        Ok(self.inner.blocks.read().iter().find(|b| &b.id == id).cloned())
    }

    async fn insert_block(&self, block: &Block) -> Result<()> {
        let mut blocks = self.inner.blocks.write();
        if blocks.iter().any(|b| b.id == block.id) {
            return Err(Error::AlreadyRegistered(block.id.to_string()));
        }
        blocks.push(block.clone());
        Ok(())
    }

    async fn load_portals(&self) -> Result<Vec<PortalRecord>> {
        Ok(self.inner.portals.read().clone())
    }

    async fn replace_portals(&self, portals: &[PortalRecord]) -> Result<()> {
        *self.inner.portals.write() = portals.to_vec();
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.inner.blocks.write().clear();
        self.inner.portals.write().clear();
        Ok(())
    }
}
