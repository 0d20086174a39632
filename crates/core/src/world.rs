//! The assembled visualization: one trace, one timeline, one scene.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use mosaic_protocol::{
    CameraState, EntityCategory, EntityKey, HandleId, SceneCommand, Snapshot, Trace, TraceCursor,
};

use crate::config::MosaicConfig;
use crate::focus::{FocusChoreographer, FocusTarget};
use crate::layout::SpiralGeometry;
use crate::model::TraceSnapshots;
use crate::render::{ReconcileStats, Reconciler, RenderEntry, SceneBackend, SceneRecorder};
use crate::timeline::TimelineController;

/// Owns every piece of core state for one loaded trace.
///
/// Timeline changes arrive through the controller's listener as snapshots
/// queued in an inbox; [`World::sync`] reconciles only the newest one, so a
/// burst of seeks between frames costs a single pass and the scene always
/// converges on the latest cursor.
pub struct World<B: SceneBackend> {
    trace: Arc<Trace>,
    timeline: TimelineController<TraceSnapshots>,
    inbox: Receiver<Snapshot>,
    reconciler: Reconciler,
    focus: FocusChoreographer,
    backend: B,
    last_stats: ReconcileStats,
}

impl<B: SceneBackend> World<B> {
    pub fn new(trace: Trace, config: &MosaicConfig, mut backend: B) -> Self {
        let trace = Arc::new(trace);
        let mut timeline =
            TimelineController::new(TraceSnapshots::new(Arc::clone(&trace)), &config.playback);
        let (tx, inbox) = mpsc::channel();
        timeline.subscribe(Box::new(move |update| {
            // The receiver lives as long as the world; a send only fails during teardown.
            let _ = tx.send(update.snapshot.clone());
        }));

        // Every step introduces at most one entity.
        let reconciler = Reconciler::new(SpiralGeometry::new(config.spiral.clone()), trace.len());
        let focus = FocusChoreographer::new(config.focus.clone());
        backend.submit(SceneCommand::SetCamera {
            camera: focus.camera(),
        });
        tracing::info!(
            name = trace.metadata.name.as_deref().unwrap_or("<unnamed>"),
            steps = trace.len(),
            "world created"
        );

        Self {
            trace,
            timeline,
            inbox,
            reconciler,
            focus,
            backend,
            last_stats: ReconcileStats::default(),
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn timeline(&self) -> &TimelineController<TraceSnapshots> {
        &self.timeline
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn focus(&self) -> &FocusChoreographer {
        &self.focus
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn cursor(&self) -> TraceCursor {
        self.timeline.cursor()
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.timeline.snapshot()
    }

    pub fn camera(&self) -> CameraState {
        self.focus.camera()
    }

    pub fn last_stats(&self) -> ReconcileStats {
        self.last_stats
    }

    // Timeline

    pub fn seek(&mut self, index: i64) -> TraceCursor {
        self.timeline.seek_to(index)
    }

    pub fn step_forward(&mut self) -> bool {
        self.timeline.step_forward()
    }

    pub fn step_backward(&mut self) -> bool {
        self.timeline.step_backward()
    }

    pub fn play(&mut self) -> bool {
        self.timeline.play()
    }

    pub fn stop(&mut self) -> bool {
        self.timeline.stop()
    }

    pub fn toggle_play(&mut self) -> bool {
        self.timeline.toggle_play()
    }

    pub fn set_speed(&mut self, ms: u64) {
        self.timeline.set_speed(ms);
    }

    pub fn go_to_start(&mut self) -> TraceCursor {
        self.timeline.go_to_start()
    }

    pub fn go_to_end(&mut self) -> TraceCursor {
        self.timeline.go_to_end()
    }

    /// Reconcile the newest queued snapshot, dropping older ones.
    pub fn sync(&mut self) -> Option<ReconcileStats> {
        let latest = self.inbox.try_iter().last()?;
        let stats = self.reconciler.apply(&latest, &mut self.backend);
        self.last_stats = stats;
        Some(stats)
    }

    /// Per-frame tick: playback, reconciliation, camera and effect animation.
    pub fn advance(&mut self, dt: f64) {
        // Host frame deltas are untrusted: anything Duration cannot hold counts as no time.
        let (dt, elapsed) = match Duration::try_from_secs_f64(dt) {
            Ok(elapsed) => (dt, elapsed),
            Err(_) => (0.0, Duration::ZERO),
        };
        self.timeline.tick(elapsed);
        self.sync();
        self.focus.advance(dt, &mut self.backend);
    }

    // Focus

    pub fn focus_target(&self, key: &EntityKey) -> Option<FocusTarget> {
        let entry = self.reconciler.entry(key)?;
        Some(FocusTarget {
            key: entry.key.clone(),
            center: entry.position,
            height: entry.height(),
            shard_count: entry.complexity,
            label: entry.label_text.clone(),
        })
    }

    pub fn explode(&mut self, key: &EntityKey) -> bool {
        let Some(target) = self.focus_target(key) else {
            tracing::warn!(%key, "explode target is not in the scene");
            return false;
        };
        self.focus.enter_explode(&target, &mut self.backend);
        true
    }

    /// Warp from `source` to its most closely related entity.
    pub fn warp(&mut self, source: &EntityKey) -> bool {
        let Some(destination) = self.related_entity(source) else {
            tracing::debug!(%source, "nothing to warp to");
            return false;
        };
        let (Some(from), Some(to)) = (self.focus_target(source), self.focus_target(&destination))
        else {
            tracing::warn!(%source, %destination, "warp endpoint is not in the scene");
            return false;
        };
        self.focus.enter_warp(&from, &to, &mut self.backend);
        true
    }

    pub fn collapse(&mut self) -> bool {
        self.focus.collapse(&mut self.backend)
    }

    pub fn return_from_warp(&mut self) -> bool {
        self.focus.return_from_warp(&mut self.backend)
    }

    pub fn reset_camera(&mut self) -> usize {
        self.focus.reset_camera(&mut self.backend)
    }

    /// Camera placed directly by the user.
    pub fn orbit(&mut self, camera: CameraState) {
        self.focus.set_camera(camera, &mut self.backend);
    }

    /// Warp destination for `key` in the current snapshot: the latest callee
    /// of a function (its caller if it made no calls), another variable
    /// sharing a variable's address, or else the enclosing function.
    pub fn related_entity(&self, key: &EntityKey) -> Option<EntityKey> {
        let snapshot = self.timeline.snapshot();
        if let Some(function) = snapshot.function(key) {
            return snapshot
                .functions
                .iter()
                .filter(|f| f.caller.as_ref() == Some(key))
                .max_by_key(|f| f.first_step)
                .map(|f| f.key.clone())
                .or_else(|| function.caller.clone());
        }
        if let Some(variable) = snapshot.variables.iter().find(|v| &v.key == key) {
            let sibling = snapshot
                .memory
                .iter()
                .find(|node| node.variables.contains(key))
                .and_then(|node| node.variables.iter().find(|k| *k != key).cloned());
            return sibling.or_else(|| variable.scope.clone());
        }
        snapshot
            .loops
            .iter()
            .find(|l| &l.key == key)
            .map(|l| l.scope.clone())
            .or_else(|| {
                snapshot
                    .branches
                    .iter()
                    .find(|b| &b.key == key)
                    .map(|b| b.scope.clone())
            })
            .flatten()
    }

    // Picking

    pub fn hover(&mut self, handle: Option<HandleId>) {
        self.reconciler.set_hovered(handle, &mut self.backend);
    }

    pub fn pick(&self, handle: HandleId) -> Option<&EntityKey> {
        self.reconciler.pick(handle).map(|e| &e.key)
    }

    /// Live entities in spiral order, for keyboard selection.
    pub fn active_entries(&self) -> Vec<&RenderEntry> {
        let mut entries: Vec<&RenderEntry> = EntityCategory::ALL
            .into_iter()
            .flat_map(|c| self.reconciler.entries(c))
            .filter(|e| e.is_active())
            .collect();
        entries.sort_by_key(|e| e.slot);
        entries
    }
}

impl World<SceneRecorder> {
    pub fn recording(trace: Trace, config: &MosaicConfig) -> Self {
        Self::new(trace, config, SceneRecorder::new())
    }

    /// Everything recorded since the last drain, in order.
    pub fn drain_commands(&mut self) -> Vec<SceneCommand> {
        self.backend.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_protocol::{ExecutionStep, StepKind, TraceMetadata};

    fn trace() -> Trace {
        Trace::new(
            TraceMetadata::default(),
            vec![
                ExecutionStep::new(StepKind::Call, "main"),
                ExecutionStep::new(StepKind::Decl, "n").with_value("3").with_address("0xa"),
                ExecutionStep::new(StepKind::Decl, "alias").with_value("3").with_address("0xa"),
                ExecutionStep::new(StepKind::Call, "square").with_value("n=3"),
                ExecutionStep::new(StepKind::Return, "").with_value("9"),
                ExecutionStep::new(StepKind::Assign, "n").with_value("9").with_address("0xa"),
            ],
        )
    }

    fn world() -> World<SceneRecorder> {
        World::recording(trace(), &MosaicConfig::default())
    }

    #[test]
    fn only_the_latest_snapshot_is_reconciled() {
        let mut w = world();
        w.seek(0);
        w.seek(5);
        w.seek(2);
        let stats = w.sync().expect("pending snapshot");
        assert_eq!(stats.created, 3);
        assert!(w.sync().is_none());
        assert_eq!(w.reconciler().total_entries(), 3);
    }

    #[test]
    fn playback_reaches_the_end_and_stops() {
        let mut w = world();
        w.set_speed(100);
        assert!(w.play());
        for _ in 0..20 {
            w.advance(0.1);
        }
        assert!(!w.timeline().is_playing());
        assert_eq!(w.cursor().value(), 5);
        assert_eq!(w.reconciler().total_entries(), 4);
    }

    #[test]
    fn warp_follows_relationships() {
        let mut w = world();
        w.seek(5);
        w.sync();
        let main = EntityKey::new("fn:main#0");
        let square = EntityKey::new("fn:square#3");
        let n = EntityKey::new("var:fn:main#0:n");
        let alias = EntityKey::new("var:fn:main#0:alias");
        assert_eq!(w.related_entity(&main), Some(square.clone()));
        assert_eq!(w.related_entity(&square), Some(main.clone()));
        assert_eq!(w.related_entity(&n), Some(alias));
        assert!(w.related_entity(&EntityKey::new("fn:nope#9")).is_none());

        assert!(w.warp(&main));
        assert!(w.explode(&square));
        assert_eq!(w.focus().depth(), 2);
        assert!(w.return_from_warp());
        assert!(w.collapse());
        assert!(!w.return_from_warp());
        assert!(w.focus().is_normal());
    }

    #[test]
    fn bad_frame_deltas_are_ignored() {
        let mut w = world();
        w.play();
        for dt in [f64::INFINITY, f64::NAN, -1.0, f64::MAX, 1e300] {
            w.advance(dt);
        }
        assert_eq!(w.cursor().value(), -1);
        assert!(w.timeline().is_playing());

        w.advance(0.6);
        assert_eq!(w.cursor().value(), 0);
    }

    #[test]
    fn explode_then_collapse_restores_camera() {
        let mut w = world();
        w.seek(5);
        w.sync();
        let before = w.camera();
        assert!(w.explode(&EntityKey::new("fn:square#3")));
        for _ in 0..90 {
            w.advance(1.0 / 60.0);
        }
        assert_ne!(w.camera(), before);
        assert!(w.collapse());
        for _ in 0..90 {
            w.advance(1.0 / 60.0);
        }
        assert_eq!(w.camera(), before);
        assert!(!w.explode(&EntityKey::new("fn:missing#1")));
    }

    #[test]
    fn picking_and_hover_go_through_the_reconciler() {
        let mut w = world();
        w.seek(1);
        w.sync();
        let entry = w.active_entries()[1].clone();
        assert_eq!(w.pick(entry.meshes.primary), Some(&entry.key));
        w.drain_commands();
        w.hover(Some(entry.meshes.primary));
        let label = entry.label.expect("label");
        assert_eq!(
            w.drain_commands(),
            vec![SceneCommand::SetLabelEnabled {
                handle: label,
                enabled: true
            }]
        );
    }
}
