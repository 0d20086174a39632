use egui::{Align2, CornerRadius, FontId, Pos2, Rect, Shape, Stroke};
use mosaic_core::scene::{Scene, SceneObject, SceneObjectKind};
use mosaic_protocol::{CameraState, HandleId, MeshShape, ThemeToken, Vec3};

use crate::theme::{self, ThemeMode};

const FIELD_OF_VIEW: f64 = std::f64::consts::FRAC_PI_4;
const NEAR_PLANE: f64 = 0.1;
const RING_SEGMENTS: usize = 24;

/// Screen-space footprint of one pickable mesh.
pub struct HitRegion {
    pub handle: HandleId,
    pub center: Pos2,
    pub radius: f32,
}

/// Result of rendering a scene: hit regions, nearest last.
pub struct RenderResult {
    pub hit_regions: Vec<HitRegion>,
}

impl RenderResult {
    pub fn hit(&self, pos: Pos2) -> Option<HandleId> {
        self.hit_regions
            .iter()
            .rev()
            .find(|r| r.center.distance(pos) <= r.radius.max(4.0))
            .map(|r| r.handle)
    }
}

/// Pinhole projection through the orbit camera.
pub struct OrbitProjection {
    eye: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    focal: f64,
    center: Pos2,
}

impl OrbitProjection {
    pub fn new(camera: &CameraState, rect: Rect) -> Self {
        let eye = camera.eye();
        let forward = (camera.target - eye)
            .normalized()
            .unwrap_or(Vec3::new(0.0, 0.0, -1.0));
        let right = forward
            .cross(Vec3::new(0.0, 1.0, 0.0))
            .normalized()
            .unwrap_or(Vec3::new(1.0, 0.0, 0.0));
        let up = right.cross(forward);
        Self {
            eye,
            forward,
            right,
            up,
            focal: f64::from(rect.height()) / (2.0 * (FIELD_OF_VIEW / 2.0).tan()),
            center: rect.center(),
        }
    }

    /// Screen position and view depth, or `None` behind the camera.
    pub fn project(&self, p: Vec3) -> Option<(Pos2, f64)> {
        let d = p - self.eye;
        let depth = d.dot(self.forward);
        if depth < NEAR_PLANE {
            return None;
        }
        let x = d.dot(self.right) / depth * self.focal;
        let y = d.dot(self.up) / depth * self.focal;
        Some((
            Pos2::new(self.center.x + x as f32, self.center.y - y as f32),
            depth,
        ))
    }

    /// Pixels per world unit at `depth`.
    pub fn scale(&self, depth: f64) -> f32 {
        (self.focal / depth) as f32
    }
}

pub fn render_scene(
    painter: &egui::Painter,
    scene: &Scene,
    projection: &OrbitProjection,
    mode: ThemeMode,
    highlighted: &[HandleId],
) -> RenderResult {
    let mut hit_regions = Vec::new();

    // Far to near.
    let mut drawables: Vec<(&SceneObject, f64)> = scene
        .objects()
        .filter(|o| o.is_visible() && !matches!(o.kind, SceneObjectKind::Label { .. }))
        .filter_map(|o| projection.project(o.position).map(|(_, depth)| (o, depth)))
        .collect();
    drawables.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (object, depth) in drawables {
        let color = theme::resolve_faded(object.color, mode, object.opacity);
        match &object.kind {
            SceneObjectKind::Mesh { shape, .. } => {
                if let Some(region) = draw_mesh(painter, projection, object, shape, color) {
                    if highlighted.contains(&object.handle) {
                        painter.circle_stroke(
                            region.center,
                            region.radius + 2.0,
                            Stroke::new(2.0, theme::resolve(ThemeToken::Selection, mode)),
                        );
                    }
                    hit_regions.push(region);
                }
            }
            SceneObjectKind::Line { points, width } => {
                let screen: Vec<Pos2> = points
                    .iter()
                    .filter_map(|p| projection.project(*p).map(|(pos, _)| pos))
                    .collect();
                let px = (*width as f32 * projection.scale(depth)).max(1.0);
                painter.add(Shape::line(screen, Stroke::new(px, color)));
            }
            SceneObjectKind::Tube { path, radii } => {
                for (segment, pair) in path.windows(2).enumerate() {
                    let (Some((a, da)), Some((b, _))) =
                        (projection.project(pair[0]), projection.project(pair[1]))
                    else {
                        continue;
                    };
                    let radius = radii.get(segment).copied().unwrap_or(0.1);
                    let px = (2.0 * radius as f32 * projection.scale(da)).max(1.0);
                    painter.line_segment([a, b], Stroke::new(px, color));
                }
            }
            SceneObjectKind::Label { .. } => {}
        }
    }

    for object in scene.objects().filter(|o| o.is_visible()) {
        if let SceneObjectKind::Label { text, style, .. } = &object.kind {
            let Some((pos, _)) = projection.project(object.position) else {
                continue;
            };
            let galley = painter.layout_no_wrap(
                text.clone(),
                FontId::proportional(style.font_size as f32),
                theme::resolve(style.color, mode),
            );
            let rect = Align2::CENTER_BOTTOM.anchor_size(pos, galley.size());
            if let Some(background) = style.background {
                painter.rect_filled(
                    rect.expand(3.0),
                    CornerRadius::same(3),
                    theme::resolve(background, mode),
                );
            }
            painter.galley(rect.min, galley, theme::resolve(style.color, mode));
        }
    }

    RenderResult { hit_regions }
}

fn draw_mesh(
    painter: &egui::Painter,
    projection: &OrbitProjection,
    object: &SceneObject,
    shape: &MeshShape,
    color: egui::Color32,
) -> Option<HitRegion> {
    let half_height = shape.height() / 2.0;
    let (center, depth) = projection.project(object.position)?;
    let scale = projection.scale(depth);
    let half_width = shape.footprint() as f32 * scale;

    match *shape {
        MeshShape::Box { .. } | MeshShape::Cylinder { .. } => {
            let (top, _) = projection.project(object.position + Vec3::new(0.0, half_height, 0.0))?;
            let (bottom, _) =
                projection.project(object.position - Vec3::new(0.0, half_height, 0.0))?;
            let rounding = if matches!(shape, MeshShape::Cylinder { .. }) {
                CornerRadius::same(6)
            } else {
                CornerRadius::same(1)
            };
            let rect = Rect::from_min_max(
                Pos2::new(top.x - half_width, top.y.min(bottom.y)),
                Pos2::new(top.x + half_width, top.y.max(bottom.y)),
            );
            painter.rect_filled(rect, rounding, color);
        }
        MeshShape::Cone { .. } => {
            let (apex, _) = projection.project(object.position + Vec3::new(0.0, half_height, 0.0))?;
            let (base, _) = projection.project(object.position - Vec3::new(0.0, half_height, 0.0))?;
            painter.add(Shape::convex_polygon(
                vec![
                    apex,
                    Pos2::new(base.x + half_width, base.y),
                    Pos2::new(base.x - half_width, base.y),
                ],
                color,
                Stroke::NONE,
            ));
        }
        MeshShape::Torus { radius, thickness } => {
            let ring: Vec<Pos2> = (0..=RING_SEGMENTS)
                .filter_map(|i| {
                    let a = std::f64::consts::TAU * i as f64 / RING_SEGMENTS as f64;
                    let p = object.position + Vec3::new(a.cos() * radius, 0.0, a.sin() * radius);
                    projection.project(p).map(|(pos, _)| pos)
                })
                .collect();
            painter.add(Shape::line(
                ring,
                Stroke::new((2.0 * thickness as f32 * scale).max(1.0), color),
            ));
        }
        MeshShape::Sphere { radius } => {
            painter.circle_filled(center, (radius as f32 * scale).max(1.5), color);
        }
    }

    Some(HitRegion {
        handle: object.handle,
        center,
        radius: half_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection() -> OrbitProjection {
        let camera = CameraState {
            target: Vec3::ZERO,
            radius: 10.0,
            alpha: 0.0,
            beta: std::f64::consts::FRAC_PI_2,
        };
        OrbitProjection::new(
            &camera,
            Rect::from_min_size(Pos2::ZERO, egui::vec2(800.0, 600.0)),
        )
    }

    #[test]
    fn target_projects_to_center() {
        let (pos, depth) = projection().project(Vec3::ZERO).expect("in front");
        assert!((pos.x - 400.0).abs() < 1e-3 && (pos.y - 300.0).abs() < 1e-3);
        assert!((depth - 10.0).abs() < 1e-9);
    }

    #[test]
    fn points_behind_the_eye_are_culled() {
        assert!(projection().project(Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn up_is_up_on_screen() {
        let (pos, _) = projection()
            .project(Vec3::new(0.0, 2.0, 0.0))
            .expect("in front");
        assert!(pos.y < 300.0);
    }
}
