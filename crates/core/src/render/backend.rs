use mosaic_protocol::{
    EffectSpec, EntityBuild, EntityCategory, EntityMeshes, HandleId, LabelStyle, MeshPart,
    MeshShape, SceneCommand, ThemeToken, Vec3,
};

/// The rendering engine seen from the core.
///
/// The core decides *where* things go and *when* they change; the backend
/// owns what they look like. Creation goes through the `build_*` methods,
/// which hand back handles; everything else is a [`SceneCommand`].
pub trait SceneBackend {
    /// Build the meshes for one entity standing on `request.position`.
    fn build_entity(&mut self, request: &EntityBuild) -> EntityMeshes;

    fn build_label(&mut self, text: &str, anchor: Vec3, style: LabelStyle, enabled: bool)
    -> HandleId;

    fn build_line(&mut self, points: &[Vec3], color: ThemeToken, width: f64) -> HandleId;

    fn build_effect(&mut self, effect: &EffectSpec, color: ThemeToken) -> HandleId;

    fn submit(&mut self, command: SceneCommand);
}

/// Backend that allocates handles and records every instruction in order.
///
/// Frontends drain the recorded commands each frame and replay them into
/// their own retained scene.
#[derive(Debug, Default)]
pub struct SceneRecorder {
    next_handle: u64,
    commands: Vec<SceneCommand>,
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> HandleId {
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub fn commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.commands)
    }

    fn spawn_mesh(
        &mut self,
        part: MeshPart,
        shape: MeshShape,
        position: Vec3,
        yaw: f64,
        color: ThemeToken,
    ) -> HandleId {
        let handle = self.allocate();
        self.commands.push(SceneCommand::SpawnMesh {
            handle,
            part,
            shape,
            position,
            yaw,
            color,
        });
        handle
    }
}

/// One mesh of a building: shape, offset of its center from the base point,
/// and default color.
struct PartSpec {
    part: MeshPart,
    shape: MeshShape,
    offset: Vec3,
    color: ThemeToken,
}

fn building_parts(category: EntityCategory, yaw: f64) -> Vec<PartSpec> {
    let front = Vec3::new(yaw.sin(), 0.0, yaw.cos());
    match category {
        EntityCategory::Function => vec![
            PartSpec {
                part: MeshPart::Body,
                shape: MeshShape::Box {
                    width: 2.2,
                    height: 3.0,
                    depth: 2.2,
                },
                offset: Vec3::new(0.0, 1.5, 0.0),
                color: ThemeToken::FunctionBody,
            },
            PartSpec {
                part: MeshPart::Roof,
                shape: MeshShape::Cone {
                    radius: 1.7,
                    height: 1.2,
                },
                offset: Vec3::new(0.0, 3.6, 0.0),
                color: ThemeToken::FunctionRoof,
            },
            PartSpec {
                part: MeshPart::Door,
                shape: MeshShape::Box {
                    width: 0.6,
                    height: 1.0,
                    depth: 0.1,
                },
                offset: front * 1.12 + Vec3::new(0.0, 0.5, 0.0),
                color: ThemeToken::Door,
            },
        ],
        EntityCategory::Variable => vec![
            PartSpec {
                part: MeshPart::Body,
                shape: MeshShape::Cylinder {
                    radius: 0.8,
                    height: 1.6,
                },
                offset: Vec3::new(0.0, 0.8, 0.0),
                color: ThemeToken::VariableBody,
            },
            PartSpec {
                part: MeshPart::Chimney,
                shape: MeshShape::Box {
                    width: 0.3,
                    height: 0.7,
                    depth: 0.3,
                },
                offset: Vec3::new(0.4, 1.95, 0.0),
                color: ThemeToken::VariableChimney,
            },
        ],
        EntityCategory::Loop => vec![
            PartSpec {
                part: MeshPart::Body,
                shape: MeshShape::Torus {
                    radius: 1.2,
                    thickness: 0.25,
                },
                offset: Vec3::new(0.0, 0.25, 0.0),
                color: ThemeToken::LoopRing,
            },
            PartSpec {
                part: MeshPart::Cap,
                shape: MeshShape::Sphere { radius: 0.4 },
                offset: Vec3::new(0.0, 0.9, 0.0),
                color: ThemeToken::LoopRing,
            },
        ],
        EntityCategory::Branch => vec![
            PartSpec {
                part: MeshPart::Body,
                shape: MeshShape::Box {
                    width: 1.2,
                    height: 2.0,
                    depth: 1.2,
                },
                offset: Vec3::new(0.0, 1.0, 0.0),
                color: ThemeToken::BranchBody,
            },
            PartSpec {
                part: MeshPart::Cap,
                shape: MeshShape::Cone {
                    radius: 0.9,
                    height: 0.8,
                },
                offset: Vec3::new(0.0, 2.4, 0.0),
                color: ThemeToken::BranchBody,
            },
        ],
    }
}

impl SceneBackend for SceneRecorder {
    fn build_entity(&mut self, request: &EntityBuild) -> EntityMeshes {
        let parts = building_parts(request.category, request.yaw);
        let height = parts
            .iter()
            .map(|p| p.offset.y + p.shape.height() / 2.0)
            .fold(0.0, f64::max);

        let mut handles = parts.into_iter().map(|p| {
            self.spawn_mesh(
                p.part,
                p.shape,
                request.position + p.offset,
                request.yaw,
                p.color,
            )
        });
        // The first part is always the body.
        let primary = handles.next().unwrap_or(HandleId(u64::MAX));
        let decorations = handles.collect();
        EntityMeshes {
            primary,
            decorations,
            height,
        }
    }

    fn build_label(
        &mut self,
        text: &str,
        anchor: Vec3,
        style: LabelStyle,
        enabled: bool,
    ) -> HandleId {
        let handle = self.allocate();
        self.commands.push(SceneCommand::SpawnLabel {
            handle,
            text: text.to_string(),
            anchor,
            style,
            enabled,
        });
        handle
    }

    fn build_line(&mut self, points: &[Vec3], color: ThemeToken, width: f64) -> HandleId {
        let handle = self.allocate();
        self.commands.push(SceneCommand::SpawnLine {
            handle,
            points: points.to_vec(),
            color,
            width,
        });
        handle
    }

    fn build_effect(&mut self, effect: &EffectSpec, color: ThemeToken) -> HandleId {
        match effect {
            EffectSpec::Tube { path, radii } => {
                let handle = self.allocate();
                self.commands.push(SceneCommand::SpawnTube {
                    handle,
                    path: path.clone(),
                    radii: radii.clone(),
                    color,
                });
                handle
            }
            EffectSpec::Particle { position, radius } | EffectSpec::Glow { position, radius } => {
                self.spawn_mesh(
                    MeshPart::Effect,
                    MeshShape::Sphere { radius: *radius },
                    *position,
                    0.0,
                    color,
                )
            }
            EffectSpec::Shard { position, size } => self.spawn_mesh(
                MeshPart::Effect,
                MeshShape::Box {
                    width: *size,
                    height: *size,
                    depth: *size,
                },
                *position,
                0.0,
                color,
            ),
        }
    }

    fn submit(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_body_first_with_unique_handles() {
        let mut rec = SceneRecorder::new();
        let meshes = rec.build_entity(&EntityBuild {
            category: EntityCategory::Function,
            position: Vec3::new(1.0, 2.0, 3.0),
            yaw: 0.0,
        });
        assert_eq!(meshes.decorations.len(), 2);
        assert!((meshes.height - 4.2).abs() < 1e-9);
        let cmds = rec.drain();
        assert_eq!(cmds.len(), 3);
        match &cmds[0] {
            SceneCommand::SpawnMesh {
                handle,
                part,
                position,
                ..
            } => {
                assert_eq!(*handle, meshes.primary);
                assert_eq!(*part, MeshPart::Body);
                assert!((position.y - 3.5).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(rec.commands().is_empty());
    }

    #[test]
    fn handles_are_never_reused() {
        let mut rec = SceneRecorder::new();
        let a = rec.build_label("a", Vec3::ZERO, LabelStyle::default(), true);
        rec.submit(SceneCommand::Dispose { handle: a });
        let b = rec.build_line(&[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)], ThemeToken::MemoryConnector, 1.0);
        assert_ne!(a, b);
    }
}
