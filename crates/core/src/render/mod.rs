pub mod backend;
pub mod reconciler;

pub use backend::{SceneBackend, SceneRecorder};
pub use reconciler::{EntityState, ReconcileStats, Reconciler, RenderEntry};
