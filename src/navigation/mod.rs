//! # Navigation Controller
//!
//! Per-frame state machine that moves the camera across block
//! boundaries. The caller owns a [`NavigationState`] and hands it to
//! [`NavigationController::poll`] once per poll:
//!
//! ```text
//!            ┌──────── no trigger / cooling down ───────┐
//!            ▼                                           │
//!   [active = X, armed] ── trigger E ──▶ remap P ──▶ [active = E.dest, disarmed]
//!                                         │                      │
//!                           transform missing: skip frame        └─ re-arms after
//!                                                                   dwell + exit
//! ```
//!
//! A poll is O(edges on the active block), allocates nothing on the
//! no-trigger path and never blocks.

mod renderer;

use tracing::{debug, info, warn};

use crate::config::{HeightPolicy, NavigationConfig, RemapPolicy, StitchConfig};
use crate::model::*;
use crate::portal::PortalGraph;
use crate::registry::RegistrySnapshot;
use crate::storage::BlockStore;
use crate::{Error, Result};

pub use renderer::SceneRenderer;

// ============================================================================
// State
// ============================================================================

/// Caller-owned navigation state.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    active_block: BlockId,
    /// Polls since the last switch (saturating).
    polls_since_switch: u32,
    /// Whether triggers are live. Cleared on every switch.
    armed: bool,
    /// Render frames seen by `drive`.
    frame: u64,
    /// Portal behind the current run of skipped frames, if any.
    skipping: Option<String>,
}

impl NavigationState {
    pub fn new(active_block: BlockId) -> Self {
        Self { active_block, polls_since_switch: u32::MAX, armed: true, frame: 0, skipping: None }
    }

    pub fn active_block(&self) -> &BlockId {
        &self.active_block
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn polls_since_switch(&self) -> u32 {
        self.polls_since_switch
    }

    /// The portal whose remap has been failing on consecutive polls.
    pub fn skipping(&self) -> Option<&str> {
        self.skipping.as_deref()
    }

    fn switch_to(&mut self, block: BlockId) {
        self.active_block = block;
        self.polls_since_switch = 0;
        self.armed = false;
        self.skipping = None;
    }
}

/// A block change for the renderer to act on.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSwitch {
    pub from: BlockId,
    pub block: BlockId,
    /// Camera pose in the new block's local frame.
    pub pose: Pose,
    pub portal_id: String,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    /// No trigger under the camera.
    Idle,
    /// A recent switch has not re-armed yet.
    Cooldown,
    Switched(BlockSwitch),
    /// A trigger fired but the remap could not be computed; the frame is
    /// dropped and the state left unchanged.
    Skipped { portal_id: String, reason: String },
}

// ============================================================================
// Controller
// ============================================================================

/// Read-only runtime navigator over a registry snapshot and portal graph.
#[derive(Debug, Clone)]
pub struct NavigationController {
    snapshot: RegistrySnapshot,
    portals: PortalGraph,
    config: NavigationConfig,
    height: HeightPolicy,
}

impl NavigationController {
    pub fn new(snapshot: RegistrySnapshot, portals: PortalGraph, config: &StitchConfig) -> Self {
        Self {
            snapshot,
            height: portals.height_policy(),
            portals,
            config: config.navigation.clone(),
        }
    }

    /// Load blocks and portals from a store once, at startup.
    pub async fn load<S: BlockStore + ?Sized>(store: &S, config: &StitchConfig) -> Result<Self> {
        let snapshot = RegistrySnapshot::load(store).await?;
        let records = store.load_portals().await?;
        let portals = PortalGraph::from_records(&records, &config.portals);
        info!(blocks = snapshot.len(), portals = records.len(), "navigation snapshot loaded");
        Ok(Self::new(snapshot, portals, config))
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    pub fn portals(&self) -> &PortalGraph {
        &self.portals
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Poll once with the current camera pose (in the active block's frame).
    pub fn poll(&self, state: &mut NavigationState, pose: &Pose) -> NavigationEvent {
        state.polls_since_switch = state.polls_since_switch.saturating_add(1);
        let position = pose.position();

        if !state.armed {
            if state.polls_since_switch < self.config.dwell_polls {
                return NavigationEvent::Cooldown;
            }
            if self.config.rearm_on_exit
                && self.portals.contains_point(&state.active_block, position).is_some()
            {
                return NavigationEvent::Cooldown;
            }
            state.armed = true;
            debug!(block = %state.active_block, "portal triggers re-armed");
        }

        let Some(edge) = self.portals.contains_point(&state.active_block, position) else {
            state.skipping = None;
            return NavigationEvent::Idle;
        };

        match self.remap_pose(&state.active_block, edge, pose) {
            Ok(remapped) => {
                let from = state.active_block.clone();
                state.switch_to(edge.destination.clone());
                info!(from = %from, to = %edge.destination, portal = %edge.portal_id, "block switch");
                NavigationEvent::Switched(BlockSwitch {
                    from,
                    block: edge.destination.clone(),
                    pose: remapped,
                    portal_id: edge.portal_id.clone(),
                })
            }
            Err(e) => {
                // warn once per run; the camera usually stays on the trigger
                if state.skipping.as_deref() == Some(edge.portal_id.as_str()) {
                    debug!(block = %state.active_block, portal = %edge.portal_id, error = %e,
                        "portal remap still failing; frame skipped");
                } else {
                    warn!(block = %state.active_block, portal = %edge.portal_id, error = %e,
                        "portal remap failed; frame skipped");
                    state.skipping = Some(edge.portal_id.clone());
                }
                NavigationEvent::Skipped { portal_id: edge.portal_id.clone(), reason: e.to_string() }
            }
        }
    }

    /// Carry `pose` from `source` into `edge.destination`'s frame.
    ///
    /// Missing transforms are an error here; `poll` downgrades them to a
    /// skipped frame.
    pub fn remap_pose(&self, source: &BlockId, edge: &PortalEdge, pose: &Pose) -> Result<Pose> {
        let mut remapped = match self.config.remap {
            RemapPolicy::FullPose => {
                let t_src = self.transform(source)?;
                let t_dst = self.transform(&edge.destination)?;
                pose.transformed_by(&t_dst.inverse().compose(t_src))
            }
            RemapPolicy::PositionOnly => {
                let mut p = *pose;
                p.translation.x = edge.destination_point.x;
                p.translation.z = edge.destination_point.z;
                p
            }
        };
        if let HeightPolicy::FixedY(h) = self.height {
            remapped.translation.y = h;
        }
        Ok(remapped)
    }

    fn transform(&self, id: &BlockId) -> Result<&RigidTransform> {
        self.snapshot
            .transform(id)
            .ok_or_else(|| Error::NotFound(format!("transform for block '{id}'")))
    }

    /// One render frame: every `poll_interval` frames read the camera,
    /// poll, and on a switch load the new block and place the camera.
    /// A failed scene load leaves the state on the previous block.
    pub fn drive<R: SceneRenderer + ?Sized>(
        &self,
        renderer: &mut R,
        state: &mut NavigationState,
    ) -> Result<NavigationEvent> {
        let frame = state.frame;
        state.frame = state.frame.wrapping_add(1);
        if frame % u64::from(self.config.poll_interval.max(1)) != 0 {
            return Ok(NavigationEvent::Idle);
        }
        let pose = renderer.camera_pose();
        let since = state.polls_since_switch;
        let event = self.poll(state, &pose);
        if let NavigationEvent::Switched(switch) = &event {
            if let Err(e) = renderer.load_scene(&switch.block) {
                // the old scene is still up, so stay in it
                state.active_block = switch.from.clone();
                state.polls_since_switch = since.saturating_add(1);
                state.armed = true;
                warn!(to = %switch.block, error = %e, "scene load failed; switch reverted");
                return Err(e);
            }
            renderer.set_camera_pose(switch.pose);
        }
        Ok(event)
    }
}
