use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    FunctionBody,
    FunctionRoof,
    VariableBody,
    VariableChimney,
    LoopRing,
    BranchBody,
    BranchTrue,
    BranchFalse,
    Door,

    Inactive,

    LabelText,
    LabelBackground,

    MemoryConnector,

    WarpArc,
    WarpParticle,
    Glow,
    Shard,

    Background,
    Ground,
    Selection,
    TextPrimary,
    TextMuted,
}
