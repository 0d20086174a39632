use serde::{Deserialize, Serialize};

use crate::trace::TraceCursor;

/// Stable identity of a logical entity across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<&str> for EntityKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The four entity families that share one spiral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    Function,
    Variable,
    Loop,
    Branch,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Function,
        EntityCategory::Variable,
        EntityCategory::Loop,
        EntityCategory::Branch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Loop => "loop",
            Self::Branch => "branch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionStatus {
    Running,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntity {
    pub key: EntityKey,
    pub name: String,
    pub args: String,
    pub caller: Option<EntityKey>,
    pub depth: u32,
    pub status: FunctionStatus,
    pub return_value: Option<String>,
    /// Step that created the call.
    pub first_step: usize,
    /// Steps executed while this call was on the stack.
    pub complexity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEntity {
    pub key: EntityKey,
    pub name: String,
    pub value: String,
    pub address: String,
    pub scope: Option<EntityKey>,
    pub is_param: bool,
    pub line: u32,
    pub first_step: usize,
    /// Declarations, assignments and reads touching this variable.
    pub complexity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopEntity {
    pub key: EntityKey,
    pub subtype: String,
    pub condition: String,
    pub condition_result: Option<bool>,
    pub iterations: u32,
    pub line: u32,
    pub scope: Option<EntityKey>,
    pub first_step: usize,
    pub complexity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchEntity {
    pub key: EntityKey,
    pub subtype: String,
    pub condition: String,
    pub condition_result: Option<bool>,
    pub line: u32,
    pub scope: Option<EntityKey>,
    pub first_step: usize,
    pub complexity: u32,
}

/// Variables that share one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub address: String,
    pub variables: Vec<EntityKey>,
}

/// All entities live as of one cursor position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cursor: TraceCursor,
    pub functions: Vec<FunctionEntity>,
    pub variables: Vec<VariableEntity>,
    pub loops: Vec<LoopEntity>,
    pub branches: Vec<BranchEntity>,
    pub memory: Vec<MemoryNode>,
    /// Function keys, outermost first.
    pub call_stack: Vec<EntityKey>,
}

impl Snapshot {
    pub fn empty(cursor: TraceCursor) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&VariableEntity> {
        self.variables.iter().rev().find(|v| v.name == name)
    }

    pub fn function(&self, key: &EntityKey) -> Option<&FunctionEntity> {
        self.functions.iter().find(|f| &f.key == key)
    }

    pub fn entity_count(&self) -> usize {
        self.functions.len() + self.variables.len() + self.loops.len() + self.branches.len()
    }

    /// Keys of one category in snapshot order.
    pub fn keys(&self, category: EntityCategory) -> Vec<&EntityKey> {
        match category {
            EntityCategory::Function => self.functions.iter().map(|e| &e.key).collect(),
            EntityCategory::Variable => self.variables.iter().map(|e| &e.key).collect(),
            EntityCategory::Loop => self.loops.iter().map(|e| &e.key).collect(),
            EntityCategory::Branch => self.branches.iter().map(|e| &e.key).collect(),
        }
    }
}
