//! Renderer contract.
//!
//! The renderer owns the scene and the camera. The controller reads the
//! camera pose, and on a block switch asks for the new scene and hands
//! back the remapped pose, in that order.

use crate::model::{BlockId, Pose};
use crate::Result;

pub trait SceneRenderer {
    /// Replace the loaded scene with `block`'s reconstruction.
    fn load_scene(&mut self, block: &BlockId) -> Result<()>;

    /// Current camera pose in the loaded block's local frame.
    fn camera_pose(&self) -> Pose;

    fn set_camera_pose(&mut self, pose: Pose);
}
