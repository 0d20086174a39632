//! Retained scene built by replaying [`SceneCommand`]s.
//!
//! Frontends keep one of these, feed it everything the core records, and
//! draw from it.

use std::collections::BTreeMap;

use mosaic_protocol::{
    CameraState, HandleId, LabelStyle, MeshPart, MeshShape, SceneCommand, ThemeToken, Vec3,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneObjectKind {
    Mesh { part: MeshPart, shape: MeshShape, yaw: f64 },
    Label { text: String, style: LabelStyle, enabled: bool },
    Line { points: Vec<Vec3>, width: f64 },
    Tube { path: Vec<Vec3>, radii: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub handle: HandleId,
    pub kind: SceneObjectKind,
    /// Center for meshes, anchor for labels, first point for lines and tubes.
    pub position: Vec3,
    pub color: ThemeToken,
    pub opacity: f64,
}

impl SceneObject {
    pub fn is_visible(&self) -> bool {
        match &self.kind {
            SceneObjectKind::Label { enabled, .. } => *enabled && self.opacity > 0.0,
            _ => self.opacity > 0.0,
        }
    }
}

/// Axis-aligned extent on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl GroundBounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> f64 {
        self.max_z - self.min_z
    }

    fn include(&mut self, p: Vec3, margin: f64) {
        self.min_x = self.min_x.min(p.x - margin);
        self.max_x = self.max_x.max(p.x + margin);
        self.min_z = self.min_z.min(p.z - margin);
        self.max_z = self.max_z.max(p.z + margin);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: BTreeMap<HandleId, SceneObject>,
    camera: CameraState,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, handle: HandleId) -> Option<&SceneObject> {
        self.objects.get(&handle)
    }

    /// Objects in handle (creation) order.
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn apply_all<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = SceneCommand>,
    {
        for command in commands {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::SpawnMesh {
                handle,
                part,
                shape,
                position,
                yaw,
                color,
            } => self.spawn(handle, SceneObjectKind::Mesh { part, shape, yaw }, position, color),
            SceneCommand::SpawnLabel {
                handle,
                text,
                anchor,
                style,
                enabled,
            } => {
                let color = style.color;
                self.spawn(
                    handle,
                    SceneObjectKind::Label {
                        text,
                        style,
                        enabled,
                    },
                    anchor,
                    color,
                );
            }
            SceneCommand::SpawnLine {
                handle,
                points,
                color,
                width,
            } => {
                let position = points.first().copied().unwrap_or_default();
                self.spawn(handle, SceneObjectKind::Line { points, width }, position, color);
            }
            SceneCommand::SpawnTube {
                handle,
                path,
                radii,
                color,
            } => {
                let position = path.first().copied().unwrap_or_default();
                self.spawn(handle, SceneObjectKind::Tube { path, radii }, position, color);
            }
            SceneCommand::SetPosition { handle, position } => {
                if let Some(object) = self.lookup(handle) {
                    object.position = position;
                }
            }
            SceneCommand::SetOpacity { handle, opacity } => {
                if let Some(object) = self.lookup(handle) {
                    object.opacity = opacity.clamp(0.0, 1.0);
                }
            }
            SceneCommand::SetColor { handle, color } => {
                if let Some(object) = self.lookup(handle) {
                    object.color = color;
                }
            }
            SceneCommand::SetLabelText { handle, text } => {
                if let Some(SceneObject {
                    kind: SceneObjectKind::Label { text: current, .. },
                    ..
                }) = self.lookup(handle)
                {
                    *current = text;
                }
            }
            SceneCommand::SetLabelEnabled { handle, enabled } => {
                if let Some(SceneObject {
                    kind: SceneObjectKind::Label { enabled: current, .. },
                    ..
                }) = self.lookup(handle)
                {
                    *current = enabled;
                }
            }
            SceneCommand::Dispose { handle } => {
                if self.objects.remove(&handle).is_none() {
                    tracing::warn!(%handle, "dispose of unknown scene object");
                }
            }
            SceneCommand::SetCamera { camera } => self.camera = camera,
        }
    }

    fn spawn(&mut self, handle: HandleId, kind: SceneObjectKind, position: Vec3, color: ThemeToken) {
        let object = SceneObject {
            handle,
            kind,
            position,
            color,
            opacity: 1.0,
        };
        if self.objects.insert(handle, object).is_some() {
            tracing::warn!(%handle, "scene object spawned twice");
        }
    }

    fn lookup(&mut self, handle: HandleId) -> Option<&mut SceneObject> {
        let object = self.objects.get_mut(&handle);
        if object.is_none() {
            tracing::warn!(%handle, "command for unknown scene object");
        }
        object
    }

    /// Ground-plane extent of every mesh, line and tube, or `None` for an
    /// empty scene.
    pub fn ground_bounds(&self) -> Option<GroundBounds> {
        let mut bounds: Option<GroundBounds> = None;
        let mut include = |p: Vec3, margin: f64| match bounds.as_mut() {
            Some(b) => b.include(p, margin),
            None => {
                bounds = Some(GroundBounds {
                    min_x: p.x - margin,
                    max_x: p.x + margin,
                    min_z: p.z - margin,
                    max_z: p.z + margin,
                });
            }
        };
        for object in self.objects.values() {
            match &object.kind {
                SceneObjectKind::Mesh { shape, .. } => include(object.position, shape.footprint()),
                SceneObjectKind::Line { points, .. } => {
                    points.iter().for_each(|p| include(*p, 0.0));
                }
                SceneObjectKind::Tube { path, .. } => path.iter().for_each(|p| include(*p, 0.0)),
                SceneObjectKind::Label { .. } => {}
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{SceneBackend, SceneRecorder};
    use mosaic_protocol::{EntityBuild, EntityCategory};

    #[test]
    fn replays_spawn_update_dispose() {
        let mut rec = SceneRecorder::new();
        let meshes = rec.build_entity(&EntityBuild {
            category: EntityCategory::Variable,
            position: Vec3::new(2.0, 0.0, 1.0),
            yaw: 0.0,
        });
        let label = rec.build_label("x = 1", Vec3::ZERO, LabelStyle::default(), false);
        rec.submit(SceneCommand::SetLabelText {
            handle: label,
            text: "x = 2".into(),
        });
        rec.submit(SceneCommand::SetOpacity {
            handle: meshes.primary,
            opacity: 0.3,
        });

        let mut scene = Scene::new();
        scene.apply_all(rec.drain());
        assert_eq!(scene.len(), 3);
        assert_eq!(scene.get(meshes.primary).map(|o| o.opacity), Some(0.3));
        match scene.get(label).map(|o| &o.kind) {
            Some(SceneObjectKind::Label { text, enabled, .. }) => {
                assert_eq!(text, "x = 2");
                assert!(!enabled);
            }
            other => panic!("unexpected {other:?}"),
        }

        scene.apply(SceneCommand::Dispose { handle: label });
        assert!(scene.get(label).is_none());
    }

    #[test]
    fn unknown_handles_are_ignored() {
        let mut scene = Scene::new();
        scene.apply(SceneCommand::SetOpacity {
            handle: HandleId(42),
            opacity: 0.5,
        });
        scene.apply(SceneCommand::Dispose {
            handle: HandleId(42),
        });
        assert!(scene.is_empty());
    }

    #[test]
    fn bounds_cover_footprints() {
        let mut scene = Scene::new();
        scene.apply(SceneCommand::SpawnMesh {
            handle: HandleId(0),
            part: MeshPart::Body,
            shape: MeshShape::Sphere { radius: 1.0 },
            position: Vec3::new(5.0, 0.0, -5.0),
            yaw: 0.0,
            color: ThemeToken::LoopRing,
        });
        let b = scene.ground_bounds().expect("one mesh");
        assert_eq!((b.min_x, b.max_x, b.min_z, b.max_z), (4.0, 6.0, -6.0, -4.0));
        assert!(Scene::new().ground_bounds().is_none());
    }
}
