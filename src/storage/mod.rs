//! # Block Store Trait
//!
//! The contract between the registry / portal builder and durable storage.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory for tests and single-process use |
//! | `FileStore` | `file` | JSON document, atomic replace on every write |
//!
//! The offline tool is the only writer; the runtime reads once at
//! startup. Stores are not expected to arbitrate concurrent writers
//! across processes.

pub mod file;
pub mod memory;
pub mod schema;

use async_trait::async_trait;

use crate::model::*;
use crate::Result;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use schema::{BlockTransformRow, PortalRow, StoreDocument};

// ============================================================================
// BlockStore Trait
// ============================================================================

/// Durable keyed storage for block transforms and portals.
#[async_trait]
pub trait BlockStore: Send + Sync + 'static {
    // ========================================================================
    // Blocks
    // ========================================================================

    /// All stored blocks, in insertion order.
    async fn load_blocks(&self) -> Result<Vec<Block>>;

    /// One block by id. Returns None if not stored.
    async fn get_block(&self, id: &BlockId) -> Result<Option<Block>>;

    /// Insert a block atomically.
    ///
    /// Fails with `AlreadyRegistered` if the key exists; stored
    /// transforms are never overwritten.
    async fn insert_block(&self, block: &Block) -> Result<()>;

    // ========================================================================
    // Portals
    // ========================================================================

    async fn load_portals(&self) -> Result<Vec<PortalRecord>>;

    /// Replace the whole portal table (it is rebuilt from its source list
    /// on every build).
    async fn replace_portals(&self, portals: &[PortalRecord]) -> Result<()>;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop every block and portal. The only way a block is destroyed.
    async fn reset(&self) -> Result<()>;
}
