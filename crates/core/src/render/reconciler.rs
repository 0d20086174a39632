//! Incremental mapping from snapshots onto persistent scene handles.
//!
//! Each entity key gets exactly one [`RenderEntry`] for the whole session.
//! Entries are created on first sight, updated in place afterwards, and
//! dimmed (never disposed) when the entity leaves the live set, so scrubbing
//! backwards brings back the very same handles.

use std::collections::{HashMap, HashSet};

use mosaic_protocol::{
    BranchEntity, EntityBuild, EntityCategory, EntityKey, EntityMeshes, FunctionEntity,
    FunctionStatus, HandleId, LabelStyle, LoopEntity, SceneCommand, Snapshot, ThemeToken,
    VariableEntity, Vec3,
};

use crate::layout::{EntityKeyRegistry, SpiralGeometry};
use crate::render::SceneBackend;

const INACTIVE_OPACITY: f64 = 0.3;
const LABEL_LIFT: f64 = 0.6;
const CONNECTOR_WIDTH: f64 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    pub key: EntityKey,
    pub category: EntityCategory,
    pub slot: usize,
    /// Ground point of the building.
    pub position: Vec3,
    pub yaw: f64,
    pub meshes: EntityMeshes,
    pub label: Option<HandleId>,
    pub label_text: String,
    pub tint: ThemeToken,
    pub state: EntityState,
    /// Opacity the renderer should apply to every mesh of this entry.
    pub opacity: f64,
    pub complexity: u32,
}

impl RenderEntry {
    pub fn center(&self) -> Vec3 {
        self.position
    }

    pub fn height(&self) -> f64 {
        self.meshes.height
    }

    pub fn top(&self) -> Vec3 {
        self.position + Vec3::new(0.0, self.meshes.height, 0.0)
    }

    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub connectors: usize,
}

/// Snapshot fields the reconciler needs from every entity kind.
trait SceneEntity {
    const CATEGORY: EntityCategory;

    fn key(&self) -> &EntityKey;
    fn label_text(&self) -> String;
    fn tint(&self) -> ThemeToken;
    fn complexity(&self) -> u32;
}

impl SceneEntity for FunctionEntity {
    const CATEGORY: EntityCategory = EntityCategory::Function;

    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn label_text(&self) -> String {
        match (&self.status, &self.return_value) {
            (FunctionStatus::Returned, Some(value)) => {
                format!("{}({}) → {}", self.name, self.args, value)
            }
            (FunctionStatus::Returned, None) => format!("{}({}) ✓", self.name, self.args),
            (FunctionStatus::Running, _) => format!("{}({})", self.name, self.args),
        }
    }

    fn tint(&self) -> ThemeToken {
        ThemeToken::FunctionBody
    }

    fn complexity(&self) -> u32 {
        self.complexity
    }
}

impl SceneEntity for VariableEntity {
    const CATEGORY: EntityCategory = EntityCategory::Variable;

    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn label_text(&self) -> String {
        format!("{} = {}", self.name, self.value)
    }

    fn tint(&self) -> ThemeToken {
        ThemeToken::VariableBody
    }

    fn complexity(&self) -> u32 {
        self.complexity
    }
}

impl SceneEntity for LoopEntity {
    const CATEGORY: EntityCategory = EntityCategory::Loop;

    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn label_text(&self) -> String {
        let kind = if self.subtype.is_empty() {
            "loop"
        } else {
            &self.subtype
        };
        format!("{kind} ({}) ×{}", self.condition, self.iterations)
    }

    fn tint(&self) -> ThemeToken {
        ThemeToken::LoopRing
    }

    fn complexity(&self) -> u32 {
        self.complexity
    }
}

impl SceneEntity for BranchEntity {
    const CATEGORY: EntityCategory = EntityCategory::Branch;

    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn label_text(&self) -> String {
        let kind = if self.subtype.is_empty() {
            "if"
        } else {
            &self.subtype
        };
        match self.condition_result {
            Some(result) => format!("{kind} ({}) → {result}", self.condition),
            None => format!("{kind} ({})", self.condition),
        }
    }

    fn tint(&self) -> ThemeToken {
        match self.condition_result {
            Some(true) => ThemeToken::BranchTrue,
            Some(false) => ThemeToken::BranchFalse,
            None => ThemeToken::BranchBody,
        }
    }

    fn complexity(&self) -> u32 {
        self.complexity
    }
}

#[derive(Debug, Default)]
struct CategoryCache {
    entries: HashMap<EntityKey, RenderEntry>,
}

pub struct Reconciler {
    geometry: SpiralGeometry,
    registry: EntityKeyRegistry,
    /// Slot count the height profile is scaled to. Fixed at construction so
    /// placed buildings never move.
    height_slots: usize,
    caches: HashMap<EntityCategory, CategoryCache>,
    /// Mesh handle → owning entity, for picking.
    pick_index: HashMap<HandleId, (EntityCategory, EntityKey)>,
    connectors: Vec<HandleId>,
    hovered: Option<(EntityCategory, EntityKey)>,
}

impl Reconciler {
    pub fn new(geometry: SpiralGeometry, height_slots: usize) -> Self {
        let caches = EntityCategory::ALL
            .into_iter()
            .map(|c| (c, CategoryCache::default()))
            .collect();
        Self {
            geometry,
            registry: EntityKeyRegistry::new(),
            height_slots: height_slots.max(1),
            caches,
            pick_index: HashMap::new(),
            connectors: Vec::new(),
            hovered: None,
        }
    }

    pub fn geometry(&self) -> &SpiralGeometry {
        &self.geometry
    }

    pub fn registry(&self) -> &EntityKeyRegistry {
        &self.registry
    }

    /// Number of cached entries in one category.
    pub fn cache_len(&self, category: EntityCategory) -> usize {
        self.caches.get(&category).map_or(0, |c| c.entries.len())
    }

    pub fn total_entries(&self) -> usize {
        self.caches.values().map(|c| c.entries.len()).sum()
    }

    pub fn entries(&self, category: EntityCategory) -> impl Iterator<Item = &RenderEntry> {
        self.caches
            .get(&category)
            .into_iter()
            .flat_map(|c| c.entries.values())
    }

    pub fn entry(&self, key: &EntityKey) -> Option<&RenderEntry> {
        self.caches.values().find_map(|c| c.entries.get(key))
    }

    /// Resolve a picked mesh back to its entity.
    pub fn pick(&self, handle: HandleId) -> Option<&RenderEntry> {
        let (category, key) = self.pick_index.get(&handle)?;
        self.caches.get(category)?.entries.get(key)
    }

    pub fn connectors(&self) -> &[HandleId] {
        &self.connectors
    }

    pub fn apply<B: SceneBackend>(&mut self, snapshot: &Snapshot, backend: &mut B) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        self.reconcile(&snapshot.functions, backend, &mut stats);
        self.reconcile(&snapshot.variables, backend, &mut stats);
        self.reconcile(&snapshot.loops, backend, &mut stats);
        self.reconcile(&snapshot.branches, backend, &mut stats);
        stats.connectors = self.rebuild_connectors(snapshot, backend);
        tracing::debug!(
            cursor = snapshot.cursor.value(),
            created = stats.created,
            updated = stats.updated,
            deactivated = stats.deactivated,
            "reconciled snapshot"
        );
        stats
    }

    fn reconcile<E: SceneEntity, B: SceneBackend>(
        &mut self,
        entities: &[E],
        backend: &mut B,
        stats: &mut ReconcileStats,
    ) {
        let category = E::CATEGORY;
        let next_active: HashSet<EntityKey> = entities.iter().map(|e| e.key().clone()).collect();

        for entity in entities {
            let cached = self
                .caches
                .get(&category)
                .is_some_and(|c| c.entries.contains_key(entity.key()));
            if cached {
                self.update_entry(category, entity, backend);
                stats.updated += 1;
            } else {
                self.create_entry(entity, backend);
                stats.created += 1;
            }
        }

        let Some(cache) = self.caches.get_mut(&category) else {
            return;
        };
        let mut leaving: Vec<&mut RenderEntry> = cache
            .entries
            .values_mut()
            .filter(|e| e.is_active() && !next_active.contains(&e.key))
            .collect();
        leaving.sort_by_key(|e| e.slot);
        for entry in leaving {
            entry.state = EntityState::Inactive;
            entry.opacity = INACTIVE_OPACITY;
            for handle in entry.meshes.all() {
                backend.submit(SceneCommand::SetOpacity {
                    handle,
                    opacity: INACTIVE_OPACITY,
                });
            }
            stats.deactivated += 1;
        }
    }

    fn create_entry<E: SceneEntity, B: SceneBackend>(&mut self, entity: &E, backend: &mut B) {
        let category = E::CATEGORY;
        let key = entity.key().clone();
        let slot = self.registry.slot_for(&key);
        let position = self
            .geometry
            .position(slot, self.height_slots.max(slot + 1));
        // Face along the path.
        let yaw = -(self.geometry.angle(slot) + self.geometry.angle_step_at(slot) / 2.0);

        let meshes = backend.build_entity(&EntityBuild {
            category,
            position,
            yaw,
        });
        let label_text = entity.label_text();
        let label = backend.build_label(
            &label_text,
            position + Vec3::new(0.0, meshes.height + LABEL_LIFT, 0.0),
            LabelStyle::default(),
            false,
        );
        let tint = entity.tint();
        if tint != category_color(category) {
            backend.submit(SceneCommand::SetColor {
                handle: meshes.primary,
                color: tint,
            });
        }

        for handle in meshes.all() {
            self.pick_index.insert(handle, (category, key.clone()));
        }
        tracing::debug!(%key, slot, "created entity");

        let entry = RenderEntry {
            key: key.clone(),
            category,
            slot,
            position,
            yaw,
            meshes,
            label: Some(label),
            label_text,
            tint,
            state: EntityState::Active,
            opacity: 1.0,
            complexity: entity.complexity(),
        };
        if let Some(cache) = self.caches.get_mut(&category) {
            cache.entries.insert(key, entry);
        }
    }

    fn update_entry<E: SceneEntity, B: SceneBackend>(
        &mut self,
        category: EntityCategory,
        entity: &E,
        backend: &mut B,
    ) {
        let Some(entry) = self
            .caches
            .get_mut(&category)
            .and_then(|c| c.entries.get_mut(entity.key()))
        else {
            tracing::warn!(key = %entity.key(), "update for entity without a render entry");
            return;
        };

        if entry.state == EntityState::Inactive {
            entry.state = EntityState::Active;
        }
        if entry.opacity != 1.0 {
            entry.opacity = 1.0;
            for handle in entry.meshes.all() {
                backend.submit(SceneCommand::SetOpacity {
                    handle,
                    opacity: 1.0,
                });
            }
        }

        let text = entity.label_text();
        if text != entry.label_text {
            if let Some(label) = entry.label {
                backend.submit(SceneCommand::SetLabelText {
                    handle: label,
                    text: text.clone(),
                });
            }
            entry.label_text = text;
        }

        let tint = entity.tint();
        if tint != entry.tint {
            backend.submit(SceneCommand::SetColor {
                handle: entry.meshes.primary,
                color: tint,
            });
            entry.tint = tint;
        }
        entry.complexity = entity.complexity();
    }

    /// Replace every memory connector with a fresh set for this snapshot.
    fn rebuild_connectors<B: SceneBackend>(&mut self, snapshot: &Snapshot, backend: &mut B) -> usize {
        for handle in self.connectors.drain(..) {
            backend.submit(SceneCommand::Dispose { handle });
        }

        let Some(variables) = self.caches.get(&EntityCategory::Variable) else {
            return 0;
        };
        for node in &snapshot.memory {
            let tops: Vec<Vec3> = node
                .variables
                .iter()
                .filter_map(|key| match variables.entries.get(key) {
                    Some(entry) => Some(entry.top()),
                    None => {
                        tracing::warn!(%key, address = %node.address, "memory node references unknown variable");
                        None
                    }
                })
                .collect();
            for pair in tops.windows(2) {
                let handle = backend.build_line(pair, ThemeToken::MemoryConnector, CONNECTOR_WIDTH);
                self.connectors.push(handle);
            }
        }
        self.connectors.len()
    }

    /// Show the label of the hovered entity only. Unknown handles clear the hover.
    pub fn set_hovered<B: SceneBackend>(&mut self, handle: Option<HandleId>, backend: &mut B) {
        let next = handle.and_then(|h| self.pick_index.get(&h).cloned());
        if next == self.hovered {
            return;
        }
        for (target, enabled) in [(self.hovered.take(), false), (next.clone(), true)] {
            let Some((category, key)) = target else {
                continue;
            };
            let label = self
                .caches
                .get(&category)
                .and_then(|c| c.entries.get(&key))
                .and_then(|e| e.label);
            if let Some(label) = label {
                backend.submit(SceneCommand::SetLabelEnabled {
                    handle: label,
                    enabled,
                });
            }
        }
        self.hovered = next;
    }

    pub fn hovered(&self) -> Option<&RenderEntry> {
        let (category, key) = self.hovered.as_ref()?;
        self.caches.get(category)?.entries.get(key)
    }
}

fn category_color(category: EntityCategory) -> ThemeToken {
    match category {
        EntityCategory::Function => ThemeToken::FunctionBody,
        EntityCategory::Variable => ThemeToken::VariableBody,
        EntityCategory::Loop => ThemeToken::LoopRing,
        EntityCategory::Branch => ThemeToken::BranchBody,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{SnapshotProvider, TraceSnapshots};
    use crate::render::SceneRecorder;
    use mosaic_protocol::{ExecutionStep, StepKind, Trace, TraceCursor, TraceMetadata};

    fn provider() -> TraceSnapshots {
        let steps = vec![
            ExecutionStep::new(StepKind::Call, "main"),
            ExecutionStep::new(StepKind::Decl, "a").with_value("1").with_address("0x1"),
            ExecutionStep::new(StepKind::Decl, "p").with_value("0x1").with_address("0x1"),
            ExecutionStep::new(StepKind::Call, "helper"),
            ExecutionStep::new(StepKind::Decl, "tmp").with_value("5"),
            ExecutionStep::new(StepKind::Return, "").with_value("5"),
            ExecutionStep::new(StepKind::Assign, "a").with_value("5").with_address("0x1"),
        ];
        TraceSnapshots::new(Arc::new(Trace::new(TraceMetadata::default(), steps)))
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(SpiralGeometry::default(), 16)
    }

    fn spawned(cmds: &[SceneCommand]) -> usize {
        cmds.iter()
            .filter(|c| matches!(c, SceneCommand::SpawnMesh { .. } | SceneCommand::SpawnLabel { .. }))
            .count()
    }

    #[test]
    fn same_snapshot_twice_creates_nothing_new() {
        let p = provider();
        let snap = p.snapshot_at(TraceCursor::new(4));
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();

        let first = r.apply(&snap, &mut rec);
        assert_eq!(first.created, snap.entity_count());
        let size = r.total_entries();
        rec.drain();

        let second = r.apply(&snap, &mut rec);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, snap.entity_count());
        assert_eq!(r.total_entries(), size);
        assert_eq!(spawned(&rec.drain()), 0);
    }

    #[test]
    fn out_of_scope_entities_are_dimmed_not_removed() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        r.apply(&p.snapshot_at(TraceCursor::new(4)), &mut rec);
        let tmp = EntityKey::new("var:fn:helper#3:tmp");
        let handle = r.entry(&tmp).map(|e| e.meshes.primary).expect("tmp created");
        rec.drain();

        let stats = r.apply(&p.snapshot_at(TraceCursor::new(5)), &mut rec);
        assert_eq!(stats.deactivated, 1);
        let entry = r.entry(&tmp).expect("tmp still cached");
        assert_eq!(entry.state, EntityState::Inactive);
        assert_eq!(entry.meshes.primary, handle);
        assert!(rec.drain().iter().any(|c| matches!(
            c,
            SceneCommand::SetOpacity { handle: h, opacity } if *h == handle && *opacity < 1.0
        )));

        // Already dimmed entries are not dimmed again.
        let stats = r.apply(&p.snapshot_at(TraceCursor::new(5)), &mut rec);
        assert_eq!(stats.deactivated, 0);

        // Scrubbing back revives the same handle at full opacity.
        let stats = r.apply(&p.snapshot_at(TraceCursor::new(4)), &mut rec);
        assert_eq!(stats.created, 0);
        let entry = r.entry(&tmp).expect("tmp still cached");
        assert!(entry.is_active());
        assert_eq!(entry.opacity, 1.0);
        assert_eq!(entry.meshes.primary, handle);
    }

    #[test]
    fn slots_follow_first_appearance_across_categories() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        for cursor in 0..7 {
            r.apply(&p.snapshot_at(TraceCursor::new(cursor)), &mut rec);
        }
        let slot = |k: &str| r.entry(&EntityKey::new(k)).map(|e| e.slot);
        assert_eq!(slot("fn:main#0"), Some(0));
        assert_eq!(slot("var:fn:main#0:a"), Some(1));
        assert_eq!(slot("var:fn:main#0:p"), Some(2));
        assert_eq!(slot("fn:helper#3"), Some(3));
        assert_eq!(slot("var:fn:helper#3:tmp"), Some(4));
    }

    #[test]
    fn updates_label_in_place() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        r.apply(&p.snapshot_at(TraceCursor::new(5)), &mut rec);
        rec.drain();
        r.apply(&p.snapshot_at(TraceCursor::new(6)), &mut rec);
        let cmds = rec.drain();
        assert!(cmds.iter().any(|c| matches!(
            c,
            SceneCommand::SetLabelText { text, .. } if text == "a = 5"
        )));
        assert_eq!(spawned(&cmds), 0);
        assert_eq!(
            r.entry(&EntityKey::new("var:fn:main#0:a")).map(|e| e.label_text.as_str()),
            Some("a = 5")
        );
    }

    #[test]
    fn connectors_are_rebuilt_every_pass() {
        let p = provider();
        let snap = p.snapshot_at(TraceCursor::new(2));
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        let stats = r.apply(&snap, &mut rec);
        assert_eq!(stats.connectors, 1);
        let old = r.connectors().to_vec();
        rec.drain();

        r.apply(&snap, &mut rec);
        let cmds = rec.drain();
        assert!(cmds.contains(&SceneCommand::Dispose { handle: old[0] }));
        assert_eq!(r.connectors().len(), 1);
        assert_ne!(r.connectors()[0], old[0]);
    }

    #[test]
    fn picking_resolves_every_mesh_of_an_entity() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        r.apply(&p.snapshot_at(TraceCursor::new(0)), &mut rec);
        let entry = r.entry(&EntityKey::new("fn:main#0")).expect("main").clone();
        for handle in entry.meshes.all() {
            assert_eq!(r.pick(handle).map(|e| &e.key), Some(&entry.key));
        }
        assert!(r.pick(HandleId(9_999)).is_none());
    }

    #[test]
    fn hover_toggles_only_one_label() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        r.apply(&p.snapshot_at(TraceCursor::new(1)), &mut rec);
        let main = r.entry(&EntityKey::new("fn:main#0")).cloned().expect("main");
        let a = r.entry(&EntityKey::new("var:fn:main#0:a")).cloned().expect("a");
        rec.drain();

        r.set_hovered(Some(main.meshes.primary), &mut rec);
        r.set_hovered(Some(a.meshes.primary), &mut rec);
        r.set_hovered(Some(HandleId(9_999)), &mut rec);
        let cmds = rec.drain();
        assert_eq!(
            cmds,
            vec![
                SceneCommand::SetLabelEnabled { handle: main.label.expect("label"), enabled: true },
                SceneCommand::SetLabelEnabled { handle: main.label.expect("label"), enabled: false },
                SceneCommand::SetLabelEnabled { handle: a.label.expect("label"), enabled: true },
                SceneCommand::SetLabelEnabled { handle: a.label.expect("label"), enabled: false },
            ]
        );
        assert!(r.hovered().is_none());
    }

    #[test]
    fn placed_entities_never_move() {
        let p = provider();
        let mut rec = SceneRecorder::new();
        let mut r = reconciler();
        r.apply(&p.snapshot_at(TraceCursor::new(0)), &mut rec);
        let before = r.entry(&EntityKey::new("fn:main#0")).map(|e| e.position);
        r.apply(&p.snapshot_at(TraceCursor::new(6)), &mut rec);
        let after = r.entry(&EntityKey::new("fn:main#0")).map(|e| e.position);
        assert_eq!(before, after);
    }
}
