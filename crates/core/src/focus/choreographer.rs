use mosaic_protocol::{CameraState, EntityKey, SceneCommand};

use super::camera::{CameraRig, explode_camera};
use super::effects::FocusEffectSet;
use super::FocusTarget;
use crate::config::FocusConfig;
use crate::render::SceneBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusKind {
    Explode,
    Warp,
}

/// One entered focus: what to restore and what to clean up.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusFrame {
    pub kind: FocusKind,
    pub subject: EntityKey,
    /// Camera to return to when this frame is popped.
    pub saved: CameraState,
    pub effects: FocusEffectSet,
}

/// Stack of focus frames over a single animated camera. An empty stack is
/// the normal overview.
pub struct FocusChoreographer {
    config: FocusConfig,
    rig: CameraRig,
    stack: Vec<FocusFrame>,
    clock: f64,
}

impl FocusChoreographer {
    pub fn new(config: FocusConfig) -> Self {
        let rig = CameraRig::new(config.home_camera);
        Self {
            config,
            rig,
            stack: Vec::new(),
            clock: 0.0,
        }
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn camera(&self) -> CameraState {
        self.rig.current()
    }

    /// Camera once the current animation settles.
    pub fn camera_goal(&self) -> CameraState {
        self.rig.goal()
    }

    pub fn is_animating(&self) -> bool {
        self.rig.is_animating()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_normal(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn top(&self) -> Option<&FocusFrame> {
        self.stack.last()
    }

    pub fn frames(&self) -> &[FocusFrame] {
        &self.stack
    }

    pub fn enter_explode<B: SceneBackend>(&mut self, target: &FocusTarget, backend: &mut B) {
        let effects = FocusEffectSet::explode(target, backend);
        self.push(FocusKind::Explode, target, explode_camera(target), effects, backend);
    }

    /// Jump from `source` to `destination`, framing the destination.
    pub fn enter_warp<B: SceneBackend>(
        &mut self,
        source: &FocusTarget,
        destination: &FocusTarget,
        backend: &mut B,
    ) {
        let effects = FocusEffectSet::warp(source, destination, &self.config, backend);
        self.push(
            FocusKind::Warp,
            destination,
            explode_camera(destination),
            effects,
            backend,
        );
    }

    fn push<B: SceneBackend>(
        &mut self,
        kind: FocusKind,
        subject: &FocusTarget,
        camera: CameraState,
        effects: FocusEffectSet,
        backend: &mut B,
    ) {
        if let Some(top) = self.stack.last_mut() {
            top.effects.set_strength(self.config.dim_opacity, backend);
        }
        self.stack.push(FocusFrame {
            kind,
            subject: subject.key.clone(),
            saved: self.rig.goal(),
            effects,
        });
        self.animate_to(camera);
        tracing::debug!(?kind, subject = %subject.key, depth = self.stack.len(), "entered focus");
    }

    /// Leave the top frame, whatever its kind. False on an empty stack.
    pub fn collapse<B: SceneBackend>(&mut self, backend: &mut B) -> bool {
        self.pop(backend)
    }

    /// Same as [`collapse`](Self::collapse); both leave the top frame.
    pub fn return_from_warp<B: SceneBackend>(&mut self, backend: &mut B) -> bool {
        self.pop(backend)
    }

    fn pop<B: SceneBackend>(&mut self, backend: &mut B) -> bool {
        let Some(frame) = self.stack.pop() else {
            tracing::debug!("nothing to leave");
            return false;
        };
        let kind = frame.kind;
        frame.effects.dispose(backend);
        if let Some(top) = self.stack.last_mut() {
            top.effects.set_strength(1.0, backend);
        }
        self.animate_to(frame.saved);
        tracing::debug!(?kind, depth = self.stack.len(), "left focus");
        true
    }

    /// Drop every frame and fly back to the home camera. Returns how many
    /// frames were discarded.
    pub fn reset_camera<B: SceneBackend>(&mut self, backend: &mut B) -> usize {
        let dropped = self.stack.len();
        for frame in self.stack.drain(..).rev() {
            frame.effects.dispose(backend);
        }
        self.animate_to(self.config.home_camera);
        dropped
    }

    /// Place the camera directly, e.g. from a user orbit drag.
    pub fn set_camera<B: SceneBackend>(&mut self, camera: CameraState, backend: &mut B) {
        self.rig.jump_to(camera);
        backend.submit(SceneCommand::SetCamera { camera });
    }

    fn animate_to(&mut self, camera: CameraState) {
        self.rig.animate_to(
            camera,
            self.config.animation_frames,
            self.config.frames_per_second,
        );
    }

    /// Per-frame tick: camera tween and warp particles.
    pub fn advance<B: SceneBackend>(&mut self, dt: f64, backend: &mut B) {
        self.clock += dt.max(0.0);
        if let Some(camera) = self.rig.advance(dt) {
            backend.submit(SceneCommand::SetCamera { camera });
        }
        for frame in &self.stack {
            frame
                .effects
                .animate(self.clock, self.config.particle_speed, backend);
        }
    }

    /// Run the current camera animation to completion.
    pub fn settle<B: SceneBackend>(&mut self, backend: &mut B) {
        while self.rig.is_animating() {
            self.advance(1.0 / self.config.frames_per_second, backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SceneRecorder;
    use mosaic_protocol::{HandleId, Vec3};

    fn target(key: &str, x: f64, z: f64) -> FocusTarget {
        FocusTarget {
            key: EntityKey::new(key),
            center: Vec3::new(x, 0.0, z),
            height: 3.0,
            shard_count: 4,
            label: key.to_string(),
        }
    }

    fn choreographer() -> FocusChoreographer {
        FocusChoreographer::new(FocusConfig::default())
    }

    #[test]
    fn push_pop_restores_the_camera_exactly() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        let before = f.camera();

        f.enter_explode(&target("fn:a#0", 5.0, 1.0), &mut rec);
        f.settle(&mut rec);
        f.enter_warp(&target("fn:a#0", 5.0, 1.0), &target("fn:b#4", -3.0, 7.0), &mut rec);
        f.advance(0.2, &mut rec);
        f.enter_explode(&target("fn:b#4", -3.0, 7.0), &mut rec);
        f.settle(&mut rec);
        assert_eq!(f.depth(), 3);

        assert!(f.collapse(&mut rec));
        assert!(f.return_from_warp(&mut rec));
        f.advance(0.1, &mut rec);
        assert!(f.collapse(&mut rec));
        f.settle(&mut rec);

        assert!(f.is_normal());
        assert_eq!(f.camera(), before);
    }

    #[test]
    fn pop_on_empty_stack_is_a_no_op() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        assert!(!f.collapse(&mut rec));
        assert!(!f.return_from_warp(&mut rec));
        assert!(rec.commands().is_empty());
        assert!(!f.is_animating());
    }

    #[test]
    fn pops_ignore_frame_kind() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        let before = f.camera();
        f.enter_explode(&target("fn:a#0", 5.0, 1.0), &mut rec);
        f.enter_warp(&target("fn:a#0", 5.0, 1.0), &target("fn:b#4", -3.0, 7.0), &mut rec);
        f.settle(&mut rec);

        assert!(f.collapse(&mut rec));
        assert_eq!(f.depth(), 1);
        assert!(f.collapse(&mut rec));
        assert!(!f.return_from_warp(&mut rec));
        f.settle(&mut rec);

        assert!(f.is_normal());
        assert_eq!(f.camera(), before);
    }

    #[test]
    fn warp_return_unwinds_an_explode() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        let before = f.camera();
        f.enter_explode(&target("fn:a#0", 5.0, 1.0), &mut rec);
        assert!(f.return_from_warp(&mut rec));
        f.settle(&mut rec);
        assert!(f.is_normal());
        assert_eq!(f.camera(), before);
    }

    #[test]
    fn stacked_frames_are_dimmed_then_restored() {
        let config = FocusConfig::default();
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        f.enter_explode(&target("fn:a#0", 5.0, 1.0), &mut rec);
        let first: Vec<HandleId> = f.frames()[0].effects.handles().collect();
        rec.drain();

        f.enter_warp(&target("fn:a#0", 5.0, 1.0), &target("fn:b#4", -3.0, 7.0), &mut rec);
        assert_eq!(f.frames()[0].effects.strength(), config.dim_opacity);
        let dimmed = rec
            .drain()
            .iter()
            .filter(|c| matches!(c, SceneCommand::SetOpacity { handle, .. } if first.contains(handle)))
            .count();
        assert_eq!(dimmed, first.len());
        let second: Vec<HandleId> = f.frames()[1].effects.handles().collect();

        assert!(f.return_from_warp(&mut rec));
        let cmds = rec.drain();
        for handle in &second {
            assert!(cmds.contains(&SceneCommand::Dispose { handle: *handle }));
        }
        assert_eq!(f.frames()[0].effects.strength(), 1.0);
        for handle in &first {
            assert!(!cmds.contains(&SceneCommand::Dispose { handle: *handle }));
        }
    }

    #[test]
    fn reset_disposes_everything_and_flies_home() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        f.enter_explode(&target("fn:a#0", 5.0, 1.0), &mut rec);
        f.enter_warp(&target("fn:a#0", 5.0, 1.0), &target("fn:b#4", -3.0, 7.0), &mut rec);
        let live: usize = f.frames().iter().map(|fr| fr.effects.len()).sum();
        rec.drain();

        assert_eq!(f.reset_camera(&mut rec), 2);
        let disposed = rec
            .drain()
            .iter()
            .filter(|c| matches!(c, SceneCommand::Dispose { .. }))
            .count();
        assert_eq!(disposed, live);
        f.settle(&mut rec);
        assert_eq!(f.camera(), FocusConfig::default().home_camera);
    }

    #[test]
    fn advance_emits_camera_and_particle_updates() {
        let mut rec = SceneRecorder::new();
        let mut f = choreographer();
        f.enter_warp(&target("fn:a#0", 5.0, 1.0), &target("fn:b#4", -3.0, 7.0), &mut rec);
        rec.drain();
        f.advance(1.0 / 60.0, &mut rec);
        let cmds = rec.drain();
        assert!(cmds.iter().any(|c| matches!(c, SceneCommand::SetCamera { .. })));
        let moved = cmds
            .iter()
            .filter(|c| matches!(c, SceneCommand::SetPosition { .. }))
            .count();
        assert_eq!(moved, FocusConfig::default().particle_count);
    }
}
