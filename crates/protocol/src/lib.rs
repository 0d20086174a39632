pub mod commands;
pub mod snapshot;
pub mod theme;
pub mod trace;
pub mod types;

pub use commands::{
    EffectSpec, EntityBuild, EntityMeshes, HandleId, LabelStyle, MeshPart, MeshShape,
    SceneCommand,
};
pub use snapshot::{
    BranchEntity, EntityCategory, EntityKey, FunctionEntity, FunctionStatus, LoopEntity,
    MemoryNode, Snapshot, VariableEntity,
};
pub use theme::ThemeToken;
pub use trace::{ExecutionStep, SourceFormat, StepKind, Trace, TraceCursor, TraceMetadata};
pub use types::{CameraState, Vec3};
