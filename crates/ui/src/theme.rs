use mosaic_protocol::ThemeToken;

/// Resolved RGBA color for egui rendering.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ResolvedColor {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color32(self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

pub fn resolve(token: ThemeToken, mode: ThemeMode) -> egui::Color32 {
    match mode {
        ThemeMode::Dark => resolve_dark(token),
        ThemeMode::Light => resolve_light(token),
    }
    .to_color32()
}

/// `token` with its alpha scaled by `opacity`.
pub fn resolve_faded(token: ThemeToken, mode: ThemeMode, opacity: f64) -> egui::Color32 {
    let color = match mode {
        ThemeMode::Dark => resolve_dark(token),
        ThemeMode::Light => resolve_light(token),
    };
    let alpha = (f64::from(color.a) * opacity.clamp(0.0, 1.0)).round() as u8;
    ResolvedColor { a: alpha, ..color }.to_color32()
}

fn resolve_dark(token: ThemeToken) -> ResolvedColor {
    // Catppuccin Mocha palette
    use ThemeToken::*;
    match token {
        FunctionBody => ResolvedColor::rgb(0x89, 0xb4, 0xfa), // Blue
        FunctionRoof => ResolvedColor::rgb(0xf3, 0x8b, 0xa8), // Red
        VariableBody => ResolvedColor::rgb(0x94, 0xe2, 0xd5), // Teal
        VariableChimney => ResolvedColor::rgb(0x74, 0xc7, 0xec), // Sapphire
        LoopRing => ResolvedColor::rgb(0xfa, 0xb3, 0x87),     // Peach
        BranchBody => ResolvedColor::rgb(0xcb, 0xa6, 0xf7),   // Mauve
        BranchTrue => ResolvedColor::rgb(0xa6, 0xe3, 0xa1),   // Green
        BranchFalse => ResolvedColor::rgb(0xeb, 0xa0, 0xac),  // Maroon
        Door => ResolvedColor::rgb(0x45, 0x47, 0x5a),         // Surface1

        Inactive => ResolvedColor::rgb(0x6c, 0x70, 0x86), // Overlay0

        LabelText => ResolvedColor::rgb(0xcd, 0xd6, 0xf4), // Text
        LabelBackground => ResolvedColor::rgba(0x1e, 0x1e, 0x2e, 220), // Base

        MemoryConnector => ResolvedColor::rgba(0x89, 0xdc, 0xeb, 180), // Sky

        WarpArc => ResolvedColor::rgba(0xb4, 0xbe, 0xfe, 200), // Lavender
        WarpParticle => ResolvedColor::rgb(0xf5, 0xe0, 0xdc),  // Rosewater
        Glow => ResolvedColor::rgba(0xf9, 0xe2, 0xaf, 120),    // Yellow
        Shard => ResolvedColor::rgb(0xf5, 0xc2, 0xe7),         // Pink

        Background => ResolvedColor::rgb(0x11, 0x11, 0x1b), // Crust
        Ground => ResolvedColor::rgb(0x18, 0x18, 0x25),     // Mantle
        Selection => ResolvedColor::rgba(0x89, 0xb4, 0xfa, 160),
        TextPrimary => ResolvedColor::rgb(0xcd, 0xd6, 0xf4), // Text
        TextMuted => ResolvedColor::rgb(0xa6, 0xad, 0xc8),   // Subtext0
    }
}

fn resolve_light(token: ThemeToken) -> ResolvedColor {
    use ThemeToken::*;
    match token {
        FunctionBody => ResolvedColor::rgb(40, 120, 200),
        FunctionRoof => ResolvedColor::rgb(220, 60, 20),
        VariableBody => ResolvedColor::rgb(20, 150, 140),
        VariableChimney => ResolvedColor::rgb(30, 110, 160),
        LoopRing => ResolvedColor::rgb(230, 150, 20),
        BranchBody => ResolvedColor::rgb(140, 80, 200),
        BranchTrue => ResolvedColor::rgb(60, 160, 60),
        BranchFalse => ResolvedColor::rgb(200, 50, 70),
        Door => ResolvedColor::rgb(110, 80, 60),

        Inactive => ResolvedColor::rgb(180, 180, 190),

        LabelText => ResolvedColor::rgb(30, 30, 40),
        LabelBackground => ResolvedColor::rgba(250, 250, 252, 220),

        MemoryConnector => ResolvedColor::rgba(0, 150, 170, 180),

        WarpArc => ResolvedColor::rgba(100, 60, 230, 200),
        WarpParticle => ResolvedColor::rgb(40, 60, 220),
        Glow => ResolvedColor::rgba(240, 190, 40, 120),
        Shard => ResolvedColor::rgb(200, 90, 170),

        Background => ResolvedColor::rgb(248, 249, 250),
        Ground => ResolvedColor::rgb(233, 236, 239),
        Selection => ResolvedColor::rgba(255, 200, 0, 160),
        TextPrimary => ResolvedColor::rgb(30, 30, 40),
        TextMuted => ResolvedColor::rgb(110, 110, 120),
    }
}
