//! SVG renderer: a top-down map of a retained [`Scene`].

use mosaic_protocol::{MeshShape, ThemeToken};

use crate::scene::{Scene, SceneObjectKind};

const PADDING: f64 = 2.0;

/// Render the scene seen from above as an SVG document string.
///
/// World X maps to SVG x and world Z to SVG y, scaled to fit `width`×`height`.
/// Meshes become footprints (circles or squares), connectors and warp arcs
/// polylines, and enabled labels text. `dark` selects the color palette.
pub fn render_scene_svg(scene: &Scene, width: f64, height: f64, dark: bool) -> String {
    let mut svg = String::with_capacity(scene.len() * 160 + 256);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif;font-size:11px">"#,
    ));
    let bg = resolve_color(ThemeToken::Background, dark);
    svg.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="{bg}"/>"#,
    ));

    let Some(bounds) = scene.ground_bounds() else {
        svg.push_str("</svg>");
        return svg;
    };
    let scale = ((width - 2.0 * PADDING) / bounds.width().max(1.0))
        .min((height - 2.0 * PADDING) / bounds.depth().max(1.0));
    let project = |x: f64, z: f64| {
        (
            PADDING + (x - bounds.min_x) * scale,
            PADDING + (z - bounds.min_z) * scale,
        )
    };

    // Lower parts first so roofs and caps land on top.
    let mut meshes: Vec<_> = scene
        .objects()
        .filter(|o| matches!(o.kind, SceneObjectKind::Mesh { .. }) && o.is_visible())
        .collect();
    meshes.sort_by(|a, b| a.position.y.total_cmp(&b.position.y));

    for object in meshes {
        let SceneObjectKind::Mesh { shape, .. } = &object.kind else {
            continue;
        };
        let fill = resolve_color(object.color, dark);
        let (cx, cy) = project(object.position.x, object.position.z);
        let r = shape.footprint() * scale;
        let opacity = object.opacity;
        match shape {
            MeshShape::Box { .. } => svg.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{fill}" fill-opacity="{opacity}" rx="1"/>"#,
                cx - r,
                cy - r,
                2.0 * r,
                2.0 * r,
            )),
            MeshShape::Torus { .. } => svg.push_str(&format!(
                r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="none" stroke="{fill}" stroke-opacity="{opacity}" stroke-width="{:.2}"/>"#,
                (r * 0.3).max(1.0),
            )),
            _ => svg.push_str(&format!(
                r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="{fill}" fill-opacity="{opacity}"/>"#,
            )),
        }
    }

    for object in scene.objects().filter(|o| o.is_visible()) {
        let stroke = resolve_color(object.color, dark);
        let opacity = object.opacity;
        match &object.kind {
            SceneObjectKind::Line { points, width } => {
                svg.push_str(&format!(
                    r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-opacity="{opacity}" stroke-width="{:.2}"/>"#,
                    polyline(points.iter().map(|p| project(p.x, p.z))),
                    (width * scale).max(1.0),
                ));
            }
            SceneObjectKind::Tube { path, radii } => {
                let mean = radii.iter().sum::<f64>() / radii.len().max(1) as f64;
                svg.push_str(&format!(
                    r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-opacity="{opacity}" stroke-width="{:.2}" stroke-linecap="round"/>"#,
                    polyline(path.iter().map(|p| project(p.x, p.z))),
                    (2.0 * mean * scale).max(1.0),
                ));
            }
            _ => {}
        }
    }

    let text_color = resolve_color(ThemeToken::TextPrimary, dark);
    for object in scene.objects().filter(|o| o.is_visible()) {
        if let SceneObjectKind::Label { text, .. } = &object.kind {
            let (x, y) = project(object.position.x, object.position.z);
            svg.push_str(&format!(
                r#"<text x="{x:.2}" y="{y:.2}" fill="{text_color}" text-anchor="middle" style="pointer-events:none">{}</text>"#,
                escape_xml(text),
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn polyline(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn resolve_color(token: ThemeToken, dark: bool) -> &'static str {
    if dark {
        match token {
            ThemeToken::FunctionBody => "#5c6bc0",
            ThemeToken::FunctionRoof => "#ef5350",
            ThemeToken::VariableBody => "#26a69a",
            ThemeToken::VariableChimney => "#80cbc4",
            ThemeToken::LoopRing => "#ffa726",
            ThemeToken::BranchBody => "#ab47bc",
            ThemeToken::BranchTrue => "#66bb6a",
            ThemeToken::BranchFalse => "#e53935",
            ThemeToken::Door => "#3e2723",
            ThemeToken::Inactive => "#616161",
            ThemeToken::LabelText | ThemeToken::TextPrimary => "#ececec",
            ThemeToken::LabelBackground => "#263238",
            ThemeToken::TextMuted => "#9e9e9e",
            ThemeToken::MemoryConnector => "#4dd0e1",
            ThemeToken::WarpArc => "#7c4dff",
            ThemeToken::WarpParticle => "#e1f5fe",
            ThemeToken::Glow => "#fff59d",
            ThemeToken::Shard => "#b39ddb",
            ThemeToken::Background => "#121212",
            ThemeToken::Ground => "#1e1e1e",
            ThemeToken::Selection => "#448aff",
        }
    } else {
        match token {
            ThemeToken::FunctionBody => "#3949ab",
            ThemeToken::FunctionRoof => "#c62828",
            ThemeToken::VariableBody => "#00897b",
            ThemeToken::VariableChimney => "#4db6ac",
            ThemeToken::LoopRing => "#f57c00",
            ThemeToken::BranchBody => "#8e24aa",
            ThemeToken::BranchTrue => "#2e7d32",
            ThemeToken::BranchFalse => "#c62828",
            ThemeToken::Door => "#6d4c41",
            ThemeToken::Inactive => "#bdbdbd",
            ThemeToken::LabelText | ThemeToken::TextPrimary => "#1a1a2e",
            ThemeToken::LabelBackground => "#eceff1",
            ThemeToken::TextMuted => "#666677",
            ThemeToken::MemoryConnector => "#0097a7",
            ThemeToken::WarpArc => "#651fff",
            ThemeToken::WarpParticle => "#304ffe",
            ThemeToken::Glow => "#fbc02d",
            ThemeToken::Shard => "#7e57c2",
            ThemeToken::Background => "#f8f9fa",
            ThemeToken::Ground => "#e9ecef",
            ThemeToken::Selection => "#ffd60a",
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_protocol::{HandleId, LabelStyle, MeshPart, SceneCommand, Vec3};

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene.apply(SceneCommand::SpawnMesh {
            handle: HandleId(0),
            part: MeshPart::Body,
            shape: MeshShape::Box {
                width: 2.0,
                height: 3.0,
                depth: 2.0,
            },
            position: Vec3::new(0.0, 1.5, 0.0),
            yaw: 0.0,
            color: ThemeToken::FunctionBody,
        });
        scene.apply(SceneCommand::SpawnLabel {
            handle: HandleId(1),
            text: "fn<T>(&self)".into(),
            anchor: Vec3::new(0.0, 4.0, 0.0),
            style: LabelStyle::default(),
            enabled: true,
        });
        scene
    }

    #[test]
    fn basic_svg_output() {
        let svg = render_scene_svg(&scene(), 800.0, 400.0, true);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("#5c6bc0"));
        assert!(svg.contains("<text"));
    }

    #[test]
    fn escapes_xml_entities() {
        let svg = render_scene_svg(&scene(), 400.0, 100.0, false);
        assert!(svg.contains("fn&lt;T&gt;(&amp;self)"));
    }

    #[test]
    fn hidden_labels_are_skipped() {
        let mut s = scene();
        s.apply(SceneCommand::SetLabelEnabled {
            handle: HandleId(1),
            enabled: false,
        });
        let svg = render_scene_svg(&s, 400.0, 400.0, false);
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn empty_scene_is_just_background() {
        let svg = render_scene_svg(&Scene::new(), 100.0, 100.0, false);
        assert!(svg.ends_with("/></svg>"));
        assert!(!svg.contains("<circle"));
    }
}
