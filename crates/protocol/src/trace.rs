use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The normalized execution trace every input format compiles into.
///
/// ```text
///   tracer JSON ─┐
///                ├─▶ Trace ──▶ Snapshot(cursor) ──▶ Reconciler ──▶ SceneCommand[] ──▶ Renderer
///   raw lines  ──┘
/// ```
///
/// Steps are immutable once produced; `steps[i].index == i`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub metadata: TraceMetadata,
    pub steps: Vec<ExecutionStep>,
}

impl Trace {
    pub fn new(metadata: TraceMetadata, mut steps: Vec<ExecutionStep>) -> Self {
        for (i, step) in steps.iter_mut().enumerate() {
            step.index = i;
        }
        Self { metadata, steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a cursor position, `None` before the first step.
    pub fn step_at(&self, cursor: TraceCursor) -> Option<&ExecutionStep> {
        cursor.index().and_then(|i| self.steps.get(i))
    }

    /// Largest valid cursor (`-1` for an empty trace).
    pub fn last_cursor(&self) -> TraceCursor {
        TraceCursor::new(self.steps.len() as i64 - 1)
    }
}

/// Run metadata attached by the tracer (`META` lines / `metadata` object).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceMetadata {
    pub name: Option<String>,
    pub source_format: SourceFormat,
    /// Free-form key/value pairs, e.g. `language`, `file`.
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceFormat {
    TracerJson,
    RawLines,
    #[default]
    Unknown,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TracerJson => write!(f, "Tracer JSON"),
            Self::RawLines => write!(f, "Raw trace lines"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepKind {
    Call,
    Decl,
    Loop,
    Assign,
    Return,
    Condition,
    Branch,
    Param,
    Read,
    #[default]
    #[serde(other)]
    Unknown,
}

impl StepKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CALL" => Self::Call,
            "DECL" => Self::Decl,
            "LOOP" => Self::Loop,
            "ASSIGN" => Self::Assign,
            "RETURN" => Self::Return,
            "CONDITION" => Self::Condition,
            "BRANCH" => Self::Branch,
            "PARAM" => Self::Param,
            "READ" => Self::Read,
            _ => Self::Unknown,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Decl => "DECL",
            Self::Loop => "LOOP",
            Self::Assign => "ASSIGN",
            Self::Return => "RETURN",
            Self::Condition => "CONDITION",
            Self::Branch => "BRANCH",
            Self::Param => "PARAM",
            Self::Read => "READ",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// One normalized code operation.
///
/// Missing source fields are neutral (`""`, `0`, `None`) rather than absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub name: String,
    pub value: String,
    pub address: String,
    pub line: u32,
    pub depth: u32,
    pub subtype: String,
    pub condition: String,
    pub condition_result: Option<bool>,
}

impl ExecutionStep {
    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>, result: Option<bool>) -> Self {
        self.condition = condition.into();
        self.condition_result = result;
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = subtype.into();
        self
    }
}

/// Position in the step sequence: `-1` is "before the first step".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceCursor(i64);

impl TraceCursor {
    pub const BEFORE_START: TraceCursor = TraceCursor(-1);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// Step index, `None` for [`TraceCursor::BEFORE_START`].
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for TraceCursor {
    fn default() -> Self {
        Self::BEFORE_START
    }
}

impl std::fmt::Display for TraceCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_new_reindexes_steps() {
        let steps = vec![
            ExecutionStep {
                index: 7,
                ..ExecutionStep::new(StepKind::Decl, "x")
            },
            ExecutionStep::new(StepKind::Assign, "x"),
        ];
        let trace = Trace::new(TraceMetadata::default(), steps);
        assert_eq!(trace.steps[0].index, 0);
        assert_eq!(trace.steps[1].index, 1);
        assert_eq!(trace.last_cursor(), TraceCursor::new(1));
    }

    #[test]
    fn cursor_before_start_has_no_step() {
        let trace = Trace::new(
            TraceMetadata::default(),
            vec![ExecutionStep::new(StepKind::Call, "main")],
        );
        assert!(trace.step_at(TraceCursor::BEFORE_START).is_none());
        assert_eq!(
            trace.step_at(TraceCursor::new(0)).map(|s| s.kind),
            Some(StepKind::Call)
        );
    }

    #[test]
    fn unknown_tags_map_to_unknown() {
        assert_eq!(StepKind::from_tag("assign"), StepKind::Assign);
        assert_eq!(StepKind::from_tag("WHATEVER"), StepKind::Unknown);
        let kind: StepKind = serde_json::from_str("\"FROB\"").unwrap_or_default();
        assert_eq!(kind, StepKind::Unknown);
    }

    #[test]
    fn empty_trace_last_cursor_is_before_start() {
        assert_eq!(Trace::default().last_cursor(), TraceCursor::BEFORE_START);
    }
}
