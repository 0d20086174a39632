//! Deterministic replay of a trace prefix into the set of live entities.

use std::collections::HashMap;
use std::sync::Arc;

use mosaic_protocol::{
    BranchEntity, EntityKey, ExecutionStep, FunctionEntity, FunctionStatus, LoopEntity,
    MemoryNode, Snapshot, StepKind, Trace, TraceCursor, VariableEntity,
};

/// Produces the snapshot for a cursor position.
///
/// Implementations must be pure: the same cursor yields the same snapshot.
pub trait SnapshotProvider {
    /// Number of steps addressable by a cursor.
    fn len(&self) -> usize;

    fn snapshot_at(&self, cursor: TraceCursor) -> Snapshot;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot provider that replays the trace from the first step.
#[derive(Debug, Clone)]
pub struct TraceSnapshots {
    trace: Arc<Trace>,
}

impl TraceSnapshots {
    pub fn new(trace: Arc<Trace>) -> Self {
        Self { trace }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

impl SnapshotProvider for TraceSnapshots {
    fn len(&self) -> usize {
        self.trace.len()
    }

    fn snapshot_at(&self, cursor: TraceCursor) -> Snapshot {
        let Some(last) = cursor.index() else {
            return Snapshot::empty(cursor);
        };
        let end = (last + 1).min(self.trace.len());
        let mut replay = Replay::default();
        for step in &self.trace.steps[..end] {
            replay.apply(step);
        }
        replay.into_snapshot(cursor)
    }
}

const GLOBAL_SCOPE: &str = "global";

#[derive(Default)]
struct Replay {
    functions: Vec<FunctionEntity>,
    variables: Vec<VariableEntity>,
    loops: Vec<LoopEntity>,
    branches: Vec<BranchEntity>,
    index: HashMap<EntityKey, usize>,
    stack: Vec<EntityKey>,
}

impl Replay {
    fn scope(&self) -> Option<EntityKey> {
        self.stack.last().cloned()
    }

    fn scope_name(scope: Option<&EntityKey>) -> &str {
        scope.map_or(GLOBAL_SCOPE, EntityKey::as_str)
    }

    fn apply(&mut self, step: &ExecutionStep) {
        if let Some(top) = self.stack.last()
            && let Some(&i) = self.index.get(top)
        {
            self.functions[i].complexity += 1;
        }

        match step.kind {
            StepKind::Call => self.call(step),
            StepKind::Return => self.ret(step),
            StepKind::Decl | StepKind::Param => {
                self.declare(step);
            }
            StepKind::Assign => self.assign(step),
            StepKind::Read => self.read(step),
            StepKind::Loop => self.looped(step),
            StepKind::Branch | StepKind::Condition => self.branch(step),
            StepKind::Unknown => {}
        }
    }

    fn call(&mut self, step: &ExecutionStep) {
        let key = EntityKey::new(format!("fn:{}#{}", step.name, step.index));
        self.index.insert(key.clone(), self.functions.len());
        self.functions.push(FunctionEntity {
            key: key.clone(),
            name: step.name.clone(),
            args: step.value.clone(),
            caller: self.scope(),
            depth: step.depth,
            status: FunctionStatus::Running,
            return_value: None,
            first_step: step.index,
            complexity: 1,
        });
        self.stack.push(key);
    }

    fn ret(&mut self, step: &ExecutionStep) {
        let Some(key) = self.stack.pop() else {
            tracing::debug!(step = step.index, "return with empty call stack");
            return;
        };
        if let Some(&i) = self.index.get(&key) {
            let function = &mut self.functions[i];
            function.status = FunctionStatus::Returned;
            function.return_value = (!step.value.is_empty()).then(|| step.value.clone());
        }
    }

    fn declare(&mut self, step: &ExecutionStep) -> usize {
        let scope = self.scope();
        let key = EntityKey::new(format!(
            "var:{}:{}",
            Self::scope_name(scope.as_ref()),
            step.name
        ));
        if let Some(&i) = self.index.get(&key) {
            // Redeclaration, e.g. a loop body re-entering a block.
            let var = &mut self.variables[i];
            var.value = step.value.clone();
            if !step.address.is_empty() {
                var.address = step.address.clone();
            }
            var.complexity += 1;
            return i;
        }
        let i = self.variables.len();
        self.index.insert(key.clone(), i);
        self.variables.push(VariableEntity {
            key,
            name: step.name.clone(),
            value: step.value.clone(),
            address: step.address.clone(),
            scope,
            is_param: step.kind == StepKind::Param,
            line: step.line,
            first_step: step.index,
            complexity: 1,
        });
        i
    }

    /// Innermost visible variable with this name: current frame, then globals.
    fn resolve(&self, name: &str) -> Option<usize> {
        let scope = self.scope();
        let candidates = [scope.as_ref().map(EntityKey::as_str), Some(GLOBAL_SCOPE)];
        candidates.into_iter().flatten().find_map(|scope| {
            self.index
                .get(&EntityKey::new(format!("var:{scope}:{name}")))
                .copied()
        })
    }

    fn assign(&mut self, step: &ExecutionStep) {
        match self.resolve(&step.name) {
            Some(i) => {
                let var = &mut self.variables[i];
                var.value = step.value.clone();
                if !step.address.is_empty() {
                    var.address = step.address.clone();
                }
                var.complexity += 1;
            }
            None => {
                self.declare(step);
            }
        }
    }

    fn read(&mut self, step: &ExecutionStep) {
        let i = match self.resolve(&step.name) {
            Some(i) => {
                self.variables[i].complexity += 1;
                i
            }
            None => self.declare(step),
        };
        let var = &mut self.variables[i];
        if var.value.is_empty() {
            var.value = "<read>".to_string();
        }
        if var.address.is_empty() {
            var.address = step.address.clone();
        }
    }

    fn looped(&mut self, step: &ExecutionStep) {
        let scope = self.scope();
        let key = EntityKey::new(format!(
            "loop:{}:{}",
            Self::scope_name(scope.as_ref()),
            step.line
        ));
        let iterated = u32::from(step.condition_result != Some(false));
        if let Some(&i) = self.index.get(&key) {
            let lp = &mut self.loops[i];
            lp.condition_result = step.condition_result;
            if !step.condition.is_empty() {
                lp.condition = step.condition.clone();
            }
            lp.iterations += iterated;
            lp.complexity += 1;
            return;
        }
        self.index.insert(key.clone(), self.loops.len());
        self.loops.push(LoopEntity {
            key,
            subtype: step.subtype.clone(),
            condition: step.condition.clone(),
            condition_result: step.condition_result,
            iterations: iterated,
            line: step.line,
            scope,
            first_step: step.index,
            complexity: 1,
        });
    }

    fn branch(&mut self, step: &ExecutionStep) {
        let scope = self.scope();
        let key = EntityKey::new(format!(
            "branch:{}:{}",
            Self::scope_name(scope.as_ref()),
            step.line
        ));
        if let Some(&i) = self.index.get(&key) {
            let br = &mut self.branches[i];
            if !step.subtype.is_empty() {
                br.subtype = step.subtype.clone();
            }
            if !step.condition.is_empty() {
                br.condition = step.condition.clone();
            }
            if step.condition_result.is_some() {
                br.condition_result = step.condition_result;
            }
            br.complexity += 1;
            return;
        }
        self.index.insert(key.clone(), self.branches.len());
        self.branches.push(BranchEntity {
            key,
            subtype: step.subtype.clone(),
            condition: step.condition.clone(),
            condition_result: step.condition_result,
            line: step.line,
            scope,
            first_step: step.index,
            complexity: 1,
        });
    }

    fn scope_live(&self, scope: Option<&EntityKey>) -> bool {
        scope.is_none_or(|key| self.stack.contains(key))
    }

    fn into_snapshot(self, cursor: TraceCursor) -> Snapshot {
        let variables: Vec<VariableEntity> = self
            .variables
            .iter()
            .filter(|v| self.scope_live(v.scope.as_ref()))
            .cloned()
            .collect();
        let loops = self
            .loops
            .iter()
            .filter(|l| self.scope_live(l.scope.as_ref()) && l.condition_result != Some(false))
            .cloned()
            .collect();
        let branches = self
            .branches
            .iter()
            .filter(|b| self.scope_live(b.scope.as_ref()))
            .cloned()
            .collect();

        let mut memory: Vec<MemoryNode> = Vec::new();
        let mut by_address: HashMap<&str, usize> = HashMap::new();
        for var in variables.iter().filter(|v| !v.address.is_empty()) {
            match by_address.get(var.address.as_str()) {
                Some(&i) => memory[i].variables.push(var.key.clone()),
                None => {
                    by_address.insert(var.address.as_str(), memory.len());
                    memory.push(MemoryNode {
                        address: var.address.clone(),
                        variables: vec![var.key.clone()],
                    });
                }
            }
        }

        Snapshot {
            cursor,
            functions: self.functions,
            variables,
            loops,
            branches,
            memory,
            call_stack: self.stack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_protocol::TraceMetadata;

    fn provider(steps: Vec<ExecutionStep>) -> TraceSnapshots {
        TraceSnapshots::new(Arc::new(Trace::new(TraceMetadata::default(), steps)))
    }

    #[test]
    fn before_start_is_empty() {
        let p = provider(vec![ExecutionStep::new(StepKind::Decl, "x").with_value("1")]);
        let snap = p.snapshot_at(TraceCursor::BEFORE_START);
        assert_eq!(snap.entity_count(), 0);
    }

    #[test]
    fn assignment_updates_declared_variable() {
        let p = provider(vec![
            ExecutionStep::new(StepKind::Decl, "x").with_value("1"),
            ExecutionStep::new(StepKind::Assign, "x").with_value("2"),
            ExecutionStep::new(StepKind::Return, "x"),
        ]);
        let snap = p.snapshot_at(TraceCursor::new(1));
        assert_eq!(snap.variables.len(), 1);
        let x = snap.variable("x").expect("x is live");
        assert_eq!(x.value, "2");
        assert_eq!(x.key, "var:global:x");

        let earlier = p.snapshot_at(TraceCursor::new(0));
        assert_eq!(earlier.variable("x").map(|v| v.value.as_str()), Some("1"));
    }

    #[test]
    fn locals_go_out_of_scope_on_return() {
        let p = provider(vec![
            ExecutionStep::new(StepKind::Call, "main"),
            ExecutionStep::new(StepKind::Call, "square"),
            ExecutionStep::new(StepKind::Param, "n").with_value("4"),
            ExecutionStep::new(StepKind::Return, "").with_value("16"),
        ]);
        let inside = p.snapshot_at(TraceCursor::new(2));
        assert_eq!(inside.call_stack.len(), 2);
        assert_eq!(inside.variables.len(), 1);
        assert!(inside.variables[0].is_param);
        assert_eq!(inside.variables[0].key, "var:fn:square#1:n");

        let after = p.snapshot_at(TraceCursor::new(3));
        assert!(after.variables.is_empty());
        let square = after
            .functions
            .iter()
            .find(|f| f.name == "square")
            .expect("square recorded");
        assert_eq!(square.status, FunctionStatus::Returned);
        assert_eq!(square.return_value.as_deref(), Some("16"));
        assert_eq!(square.caller.as_ref().map(EntityKey::as_str), Some("fn:main#0"));
        assert_eq!(after.call_stack, vec![EntityKey::new("fn:main#0")]);
    }

    #[test]
    fn loops_finish_when_condition_fails() {
        let step = |result| {
            ExecutionStep::new(StepKind::Loop, "")
                .with_subtype("while")
                .with_condition("i < 2", Some(result))
                .with_line(5)
        };
        let p = provider(vec![step(true), step(true), step(false)]);
        let running = p.snapshot_at(TraceCursor::new(1));
        assert_eq!(running.loops.len(), 1);
        assert_eq!(running.loops[0].iterations, 2);
        assert!(p.snapshot_at(TraceCursor::new(2)).loops.is_empty());
    }

    #[test]
    fn branch_and_condition_share_an_entity() {
        let p = provider(vec![
            ExecutionStep::new(StepKind::Branch, "")
                .with_subtype("if")
                .with_condition("x > 1", None)
                .with_line(8),
            ExecutionStep::new(StepKind::Condition, "x > 1")
                .with_condition("x > 1", Some(false))
                .with_line(8),
        ]);
        let snap = p.snapshot_at(TraceCursor::new(1));
        assert_eq!(snap.branches.len(), 1);
        assert_eq!(snap.branches[0].subtype, "if");
        assert_eq!(snap.branches[0].condition_result, Some(false));
        assert_eq!(snap.branches[0].complexity, 2);
    }

    #[test]
    fn memory_groups_shared_addresses() {
        let p = provider(vec![
            ExecutionStep::new(StepKind::Decl, "a").with_address("0x1"),
            ExecutionStep::new(StepKind::Decl, "b").with_address("0x2"),
            ExecutionStep::new(StepKind::Decl, "alias").with_address("0x1"),
        ]);
        let snap = p.snapshot_at(TraceCursor::new(2));
        assert_eq!(snap.memory.len(), 2);
        assert_eq!(snap.memory[0].address, "0x1");
        assert_eq!(
            snap.memory[0].variables,
            vec![EntityKey::new("var:global:a"), EntityKey::new("var:global:alias")]
        );
    }

    #[test]
    fn cursor_past_end_replays_everything() {
        let p = provider(vec![ExecutionStep::new(StepKind::Decl, "x")]);
        assert_eq!(p.snapshot_at(TraceCursor::new(99)).variables.len(), 1);
    }
}
