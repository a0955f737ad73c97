//! # block-stitch: Block Registration and Portal Navigation
//!
//! Large scenes reconstructed as independent spatial blocks, each in its
//! own local frame, are stitched into one global frame and traversed
//! live through portals.
//!
//! ## Design Principles
//!
//! 1. **Absolute transforms**: every block stores its fully composed
//!    local-to-global transform; lookups never walk a chain
//! 2. **Trait-first seams**: `BlockStore` is the durable store contract,
//!    `Aligner` the registration solver contract, `SceneRenderer` the
//!    renderer contract
//! 3. **Offline writes, runtime reads**: registration and portal building
//!    write the store; navigation runs on a snapshot loaded once
//! 4. **Caller-owned state**: the navigation state is a value passed to
//!    every poll, never process-wide
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use block_stitch::{
//!     BlockRegistry, MemoryStore, NavigationController, NavigationEvent, NavigationState,
//!     PortalGraphBuilder, Pose, RigidTransform, StitchConfig,
//! };
//! use glam::DVec3;
//!
//! # async fn example() -> block_stitch::Result<()> {
//! let config = StitchConfig::default();
//! let registry = BlockRegistry::open(MemoryStore::new()).await?;
//! registry.register_anchor(&"A".into(), None).await?;
//! let t_b = RigidTransform::from_translation(DVec3::new(2.0, 0.0, 3.0));
//! registry.put_transform(&"B".into(), t_b, None).await?;
//!
//! let snapshot = registry.snapshot();
//! let mut portals = PortalGraphBuilder::new(&snapshot, config.portals.clone());
//! portals.add_portal(&"A".into(), DVec3::new(2.0, 0.0, 3.0), &"B".into(), 0.5)?;
//! let portals = portals.commit(registry.store()).await?;
//!
//! let controller = NavigationController::new(snapshot, portals, &config);
//! let mut state = NavigationState::new("A".into());
//! let camera = Pose::from_translation(DVec3::new(2.1, 1.0, 3.0));
//! if let NavigationEvent::Switched(switch) = controller.poll(&mut state, &camera) {
//!     // load switch.block, then place the camera at switch.pose
//!     # let _ = switch;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store | Description |
//! |-------|-------------|
//! | `MemoryStore` | In-memory, shared between clones |
//! | `FileStore` | JSON document with atomic replace |

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod export;
pub mod model;
pub mod navigation;
pub mod portal;
pub mod registration;
pub mod registry;
pub mod storage;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Aabb, Block, BlockId, EdgeDirection, PortalEdge, PortalRecord, PortalRequest, Pose,
    RegistrationStatus, RigidTransform, compute_aabb,
};

// ============================================================================
// Re-exports: Storage and registry
// ============================================================================

pub use registry::{BlockRegistry, RegistrySnapshot};
pub use storage::{BlockStore, FileStore, MemoryStore};

// ============================================================================
// Re-exports: Registration, portals, navigation
// ============================================================================

pub use config::{
    AcceptanceCriteria, Directionality, HeightPolicy, NavigationConfig, PortalConfig,
    RegistrationConfig, RemapPolicy, StitchConfig,
};
pub use navigation::{
    BlockSwitch, NavigationController, NavigationEvent, NavigationState, SceneRenderer,
};
pub use portal::{PortalGraph, PortalGraphBuilder};
pub use registration::{
    Aligner, Alignment, AlignmentMetrics, BlockPoints, RegistrationCoordinator,
    RegistrationEdge, RegistrationOptions, RegistrationOutcome,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unregistered block or missing lookup target.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The block already has a stored transform.
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// The solver failed, or its result fell below the caller's bar.
    #[error("Registration did not converge: {reason}{}", format_metrics(.metrics))]
    Convergence {
        reason: String,
        metrics: Option<AlignmentMetrics>,
    },

    /// The durable store is missing expected tables or columns.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Degenerate point sets, non-finite or non-rigid transforms.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn format_metrics(metrics: &Option<AlignmentMetrics>) -> String {
    match metrics {
        Some(m) => format!(" (inlier_rmse={:.4}, fitness={:.4})", m.inlier_rmse, m.fitness),
        None => String::new(),
    }
}

impl Error {
    /// Solver-side failure with no usable result.
    pub fn no_convergence(reason: impl Into<String>) -> Self {
        Error::Convergence { reason: reason.into(), metrics: None }
    }

    /// Metrics attached to a convergence failure, if the solver returned any.
    pub fn metrics(&self) -> Option<&AlignmentMetrics> {
        match self {
            Error::Convergence { metrics, .. } => metrics.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
