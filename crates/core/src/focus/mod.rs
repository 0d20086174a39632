//! Camera choreography and transient effects for the explode and warp
//! focus operations.

pub mod camera;
pub mod choreographer;
pub mod effects;

pub use camera::{CameraRig, CameraTween, explode_camera};
pub use choreographer::{FocusChoreographer, FocusFrame, FocusKind};
pub use effects::{FocusEffectSet, WarpArc};

use mosaic_protocol::{EntityKey, Vec3};

/// What a focus operation looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusTarget {
    pub key: EntityKey,
    /// Ground point of the building.
    pub center: Vec3,
    pub height: f64,
    /// Complexity of the subject; also the number of explode shards.
    pub shard_count: u32,
    pub label: String,
}

impl FocusTarget {
    /// Point halfway up the building.
    pub fn focal_point(&self) -> Vec3 {
        self.center + Vec3::new(0.0, self.height / 2.0, 0.0)
    }
}
