use serde::{Deserialize, Serialize};

use crate::snapshot::EntityCategory;
use crate::theme::ThemeToken;
use crate::types::{CameraState, Vec3};

/// Opaque identifier of one renderer-side object (mesh, label, line, tube).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeshShape {
    Box { width: f64, height: f64, depth: f64 },
    Cylinder { radius: f64, height: f64 },
    Cone { radius: f64, height: f64 },
    Torus { radius: f64, thickness: f64 },
    Sphere { radius: f64 },
}

impl MeshShape {
    /// Vertical extent of the shape.
    pub fn height(&self) -> f64 {
        match *self {
            Self::Box { height, .. } | Self::Cylinder { height, .. } | Self::Cone { height, .. } => {
                height
            }
            Self::Torus { thickness, .. } => thickness * 2.0,
            Self::Sphere { radius } => radius * 2.0,
        }
    }

    /// Horizontal half-extent, used for footprints and picking.
    pub fn footprint(&self) -> f64 {
        match *self {
            Self::Box { width, depth, .. } => width.max(depth) / 2.0,
            Self::Cylinder { radius, .. } | Self::Cone { radius, .. } | Self::Sphere { radius } => {
                radius
            }
            Self::Torus { radius, thickness } => radius + thickness,
        }
    }
}

/// Role of a mesh inside one entity's building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshPart {
    Body,
    Roof,
    Cap,
    Chimney,
    Door,
    Effect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelStyle {
    pub color: ThemeToken,
    pub background: Option<ThemeToken>,
    pub font_size: f64,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            color: ThemeToken::LabelText,
            background: Some(ThemeToken::LabelBackground),
            font_size: 12.0,
        }
    }
}

/// Request handed to the mesh collaborator for a new entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBuild {
    pub category: EntityCategory,
    pub position: Vec3,
    /// Rotation about +Y in radians.
    pub yaw: f64,
}

/// Handles produced for one entity: the pickable body plus decorations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeshes {
    pub primary: HandleId,
    pub decorations: Vec<HandleId>,
    /// Height of the assembled building, top of roof included.
    pub height: f64,
}

impl EntityMeshes {
    pub fn all(&self) -> impl Iterator<Item = HandleId> + '_ {
        std::iter::once(self.primary).chain(self.decorations.iter().copied())
    }
}

/// Transient focus-effect geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectSpec {
    /// Variable-radius tube along a polyline (`radii.len() == path.len()`).
    Tube { path: Vec<Vec3>, radii: Vec<f64> },
    Particle { position: Vec3, radius: f64 },
    Glow { position: Vec3, radius: f64 },
    Shard { position: Vec3, size: f64 },
}

/// A single retained-scene instruction.
///
/// Backends receive creation commands through the `SceneBackend` build
/// methods and everything else as plain commands; a recorder turns both into
/// one ordered `Vec<SceneCommand>` a renderer replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneCommand {
    SpawnMesh {
        handle: HandleId,
        part: MeshPart,
        shape: MeshShape,
        position: Vec3,
        yaw: f64,
        color: ThemeToken,
    },

    SpawnLabel {
        handle: HandleId,
        text: String,
        anchor: Vec3,
        style: LabelStyle,
        enabled: bool,
    },

    /// Polyline, e.g. a memory connector.
    SpawnLine {
        handle: HandleId,
        points: Vec<Vec3>,
        color: ThemeToken,
        width: f64,
    },

    SpawnTube {
        handle: HandleId,
        path: Vec<Vec3>,
        radii: Vec<f64>,
        color: ThemeToken,
    },

    SetPosition { handle: HandleId, position: Vec3 },

    SetOpacity { handle: HandleId, opacity: f64 },

    SetColor { handle: HandleId, color: ThemeToken },

    SetLabelText { handle: HandleId, text: String },

    /// Toggle label visibility (hover-only labels).
    SetLabelEnabled { handle: HandleId, enabled: bool },

    Dispose { handle: HandleId },

    SetCamera { camera: CameraState },
}

impl SceneCommand {
    /// Handle the command targets, if any.
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            Self::SpawnMesh { handle, .. }
            | Self::SpawnLabel { handle, .. }
            | Self::SpawnLine { handle, .. }
            | Self::SpawnTube { handle, .. }
            | Self::SetPosition { handle, .. }
            | Self::SetOpacity { handle, .. }
            | Self::SetColor { handle, .. }
            | Self::SetLabelText { handle, .. }
            | Self::SetLabelEnabled { handle, .. }
            | Self::Dispose { handle } => Some(*handle),
            Self::SetCamera { .. } => None,
        }
    }

    pub fn is_spawn(&self) -> bool {
        matches!(
            self,
            Self::SpawnMesh { .. }
                | Self::SpawnLabel { .. }
                | Self::SpawnLine { .. }
                | Self::SpawnTube { .. }
        )
    }
}
