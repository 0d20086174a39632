use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mosaic_core::World;
use mosaic_core::render::SceneRecorder;
use mosaic_core::scene::{Scene, SceneObject, SceneObjectKind};
use mosaic_protocol::{CameraState, EntityKey, HandleId, MeshPart, MeshShape, ThemeToken, Vec3};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders},
};

const FRAME_BUDGET: Duration = Duration::from_millis(33);
const SPEED_FACTOR: f64 = 1.5;
const SEGMENT_SAMPLES: usize = 12;

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::FunctionBody => Color::Blue,
        ThemeToken::FunctionRoof => Color::Red,
        ThemeToken::VariableBody => Color::Green,
        ThemeToken::VariableChimney => Color::LightGreen,
        ThemeToken::LoopRing => Color::Yellow,
        ThemeToken::BranchBody => Color::Magenta,
        ThemeToken::BranchTrue => Color::LightGreen,
        ThemeToken::BranchFalse => Color::LightRed,
        ThemeToken::Door => Color::Rgb(110, 76, 65),
        ThemeToken::Inactive => Color::DarkGray,
        ThemeToken::LabelText | ThemeToken::TextPrimary => Color::White,
        ThemeToken::LabelBackground => Color::Rgb(38, 50, 56),
        ThemeToken::TextMuted => Color::Gray,
        ThemeToken::MemoryConnector => Color::Cyan,
        ThemeToken::WarpArc => Color::Rgb(124, 77, 255),
        ThemeToken::WarpParticle => Color::LightCyan,
        ThemeToken::Glow => Color::LightYellow,
        ThemeToken::Shard => Color::Rgb(179, 157, 219),
        ThemeToken::Background | ThemeToken::Ground => Color::Black,
        ThemeToken::Selection => Color::Rgb(68, 138, 255),
    }
}

fn glyph(part: MeshPart, shape: &MeshShape) -> char {
    match (part, shape) {
        (MeshPart::Effect, MeshShape::Sphere { radius }) if *radius < 0.5 => '*',
        (MeshPart::Effect, MeshShape::Sphere { .. }) => '∙',
        (MeshPart::Effect, _) => '◆',
        (MeshPart::Door, _) => '▪',
        (_, MeshShape::Box { .. }) => '█',
        (_, MeshShape::Cylinder { .. }) => '●',
        (_, MeshShape::Cone { .. }) => '▲',
        (_, MeshShape::Torus { .. }) => '◯',
        (_, MeshShape::Sphere { .. }) => '•',
    }
}

/// Top-down view through the orbit camera: the camera target sits in the
/// middle of the area and the camera azimuth points up.
struct Projection {
    area: Rect,
    target: Vec3,
    sin: f64,
    cos: f64,
    scale: f64,
}

impl Projection {
    fn new(area: Rect, camera: &CameraState) -> Self {
        // Visible half-height in world units follows the orbit radius.
        let half = (camera.radius * 0.5).max(4.0);
        let (sin, cos) = camera.alpha.sin_cos();
        Self {
            area,
            target: camera.target,
            sin,
            cos,
            scale: f64::from(area.height.max(1)) / (2.0 * half),
        }
    }

    fn cell(&self, p: Vec3) -> Option<(u16, u16)> {
        let d = p - self.target;
        let u = d.x * self.cos - d.z * self.sin;
        let v = d.x * self.sin + d.z * self.cos;
        // Terminal cells are roughly twice as tall as they are wide.
        let col = f64::from(self.area.x) + f64::from(self.area.width) / 2.0 + u * self.scale * 2.0;
        let row = f64::from(self.area.y) + f64::from(self.area.height) / 2.0 + v * self.scale;
        let inside = col >= f64::from(self.area.x)
            && row >= f64::from(self.area.y)
            && col < f64::from(self.area.x + self.area.width)
            && row < f64::from(self.area.y + self.area.height);
        inside.then_some((col as u16, row as u16))
    }
}

struct Viewer {
    world: World<SceneRecorder>,
    scene: Scene,
    selected: usize,
    message: String,
}

impl Viewer {
    fn new(world: World<SceneRecorder>) -> Self {
        let mut viewer = Self {
            world,
            scene: Scene::new(),
            selected: 0,
            message: String::new(),
        };
        viewer.pump(0.0);
        viewer
    }

    fn pump(&mut self, dt: f64) {
        self.world.advance(dt);
        self.scene.apply_all(self.world.drain_commands());
    }

    fn selection(&self) -> Option<(EntityKey, HandleId, String)> {
        let entries = self.world.active_entries();
        if entries.is_empty() {
            return None;
        }
        let entry = entries[self.selected % entries.len()];
        Some((
            entry.key.clone(),
            entry.meshes.primary,
            entry.label_text.clone(),
        ))
    }

    fn cycle_selection(&mut self, forward: bool) {
        let count = self.world.active_entries().len().max(1);
        self.selected = if forward {
            (self.selected + 1) % count
        } else {
            (self.selected + count - 1) % count
        };
        let handle = self.selection().map(|(_, handle, _)| handle);
        self.world.hover(handle);
    }

    fn set_speed(&mut self, factor: f64) {
        let current = self.world.timeline().speed().as_millis() as f64;
        self.world.set_speed((current * factor).round() as u64);
        self.message = format!("speed {} ms/step", self.world.timeline().speed().as_millis());
    }

    /// Returns `false` when the viewer should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        self.message.clear();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(' ') => {
                let playing = self.world.toggle_play();
                self.message = if playing { "playing" } else { "paused" }.to_string();
            }
            KeyCode::Right => {
                if !self.world.step_forward() {
                    self.message = "at the last step".to_string();
                }
            }
            KeyCode::Left => {
                if !self.world.step_backward() {
                    self.message = "at the start".to_string();
                }
            }
            KeyCode::Home => {
                self.world.go_to_start();
            }
            KeyCode::End => {
                self.world.go_to_end();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_speed(1.0 / SPEED_FACTOR),
            KeyCode::Char('-') => self.set_speed(SPEED_FACTOR),
            KeyCode::Tab => self.cycle_selection(true),
            KeyCode::BackTab => self.cycle_selection(false),
            KeyCode::Char('e') => {
                let exploded = self
                    .selection()
                    .is_some_and(|(key, _, _)| self.world.explode(&key));
                if !exploded {
                    self.message = "nothing selected to explode".to_string();
                }
            }
            KeyCode::Char('g') => {
                let warped = self
                    .selection()
                    .is_some_and(|(key, _, _)| self.world.warp(&key));
                if !warped {
                    self.message = "no related entity to warp to".to_string();
                }
            }
            KeyCode::Char('c') => {
                if !self.world.collapse() {
                    self.message = "nothing to collapse".to_string();
                }
            }
            KeyCode::Char('b') => {
                if !self.world.return_from_warp() {
                    self.message = "no warp to return from".to_string();
                }
            }
            KeyCode::Char('r') => {
                self.world.reset_camera();
            }
            _ => {}
        }
        true
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let area = frame.area();
        let timeline = self.world.timeline();
        let name = self
            .world
            .trace()
            .metadata
            .name
            .as_deref()
            .unwrap_or("trace");

        let header_area = Rect::new(0, 0, area.width, 1);
        let header = Block::default()
            .title(format!(
                " code-mosaic · {name} | step {}/{} | {} {} ms | focus {} | space play · ←→ step · tab select · e/g/c/b/r focus · q quit ",
                self.world.cursor().value() + 1,
                timeline.len(),
                if timeline.is_playing() { "▶" } else { "⏸" },
                timeline.speed().as_millis(),
                self.world.focus().depth(),
            ))
            .style(Style::default().fg(Color::White).bg(Color::DarkGray));
        frame.render_widget(header, header_area);

        let content_area = Rect::new(0, 1, area.width, area.height.saturating_sub(2));
        let block = Block::default()
            .borders(Borders::NONE)
            .style(Style::default().bg(Color::Black));
        frame.render_widget(block, content_area);

        let selection = self.selection();
        let status_area = Rect::new(0, area.height.saturating_sub(1), area.width, 1);
        let status = match &selection {
            Some((key, _, label)) if self.message.is_empty() => format!(" [{key}] {label}"),
            _ => format!(" {}", self.message),
        };
        let status_block = Block::default()
            .title(status)
            .style(Style::default().fg(Color::Gray).bg(Color::Black));
        frame.render_widget(status_block, status_area);

        let projection = Projection::new(content_area, &self.scene.camera());
        let selected_key = selection.map(|(key, _, _)| key);
        let buf = frame.buffer_mut();
        self.draw_paths(buf, &projection);
        self.draw_meshes(buf, &projection, selected_key.as_ref());
        self.draw_labels(buf, &projection);
    }

    fn draw_paths(&self, buf: &mut Buffer, projection: &Projection) {
        for object in self.scene.objects().filter(|o| o.is_visible()) {
            let (points, ch) = match &object.kind {
                SceneObjectKind::Line { points, .. } => (points, '·'),
                SceneObjectKind::Tube { path, .. } => (path, '~'),
                _ => continue,
            };
            let fg = fade(object);
            for pair in points.windows(2) {
                for i in 0..=SEGMENT_SAMPLES {
                    let t = i as f64 / SEGMENT_SAMPLES as f64;
                    if let Some((x, y)) = projection.cell(pair[0].lerp(pair[1], t)) {
                        buf[(x, y)].set_char(ch).set_fg(fg);
                    }
                }
            }
        }
    }

    fn draw_meshes(&self, buf: &mut Buffer, projection: &Projection, selected: Option<&EntityKey>) {
        let highlighted: Vec<HandleId> = selected
            .and_then(|key| self.world.reconciler().entry(key))
            .map(|entry| entry.meshes.all().collect())
            .unwrap_or_default();

        // Lower parts first so roofs and caps win.
        let mut meshes: Vec<&SceneObject> = self
            .scene
            .objects()
            .filter(|o| matches!(o.kind, SceneObjectKind::Mesh { .. }) && o.is_visible())
            .collect();
        meshes.sort_by(|a, b| a.position.y.total_cmp(&b.position.y));

        for object in meshes {
            let SceneObjectKind::Mesh { part, shape, .. } = &object.kind else {
                continue;
            };
            let Some((x, y)) = projection.cell(object.position) else {
                continue;
            };
            let cell = &mut buf[(x, y)];
            cell.set_char(glyph(*part, shape)).set_fg(fade(object));
            if highlighted.contains(&object.handle) {
                cell.set_bg(theme_to_color(ThemeToken::Selection));
            }
        }
    }

    fn draw_labels(&self, buf: &mut Buffer, projection: &Projection) {
        for object in self.scene.objects().filter(|o| o.is_visible()) {
            let SceneObjectKind::Label { text, .. } = &object.kind else {
                continue;
            };
            let Some((x, y)) = projection.cell(object.position) else {
                continue;
            };
            let width = text.chars().count() as u16;
            let start = x.saturating_sub(width / 2).max(projection.area.x);
            let room = (projection.area.x + projection.area.width).saturating_sub(start);
            let style = Style::default()
                .fg(theme_to_color(ThemeToken::LabelText))
                .bg(theme_to_color(ThemeToken::LabelBackground));
            let shown: String = text.chars().take(usize::from(room)).collect();
            buf.set_string(start, y, shown, style);
        }
    }
}

fn fade(object: &SceneObject) -> Color {
    if object.opacity < 0.5 {
        theme_to_color(ThemeToken::Inactive)
    } else {
        theme_to_color(object.color)
    }
}

pub fn render_tui(world: World<SceneRecorder>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, Viewer::new(world));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn run<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, mut viewer: Viewer) -> Result<()> {
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        viewer.pump(now.duration_since(last).as_secs_f64());
        last = now;

        terminal.draw(|frame| viewer.draw(frame))?;

        if event::poll(FRAME_BUDGET)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && !viewer.handle_key(key.code)
        {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraState {
        CameraState {
            target: Vec3::new(3.0, 0.0, -2.0),
            radius: 20.0,
            alpha: 0.0,
            beta: 1.0,
        }
    }

    #[test]
    fn camera_target_is_centered() {
        let p = Projection::new(Rect::new(0, 1, 80, 20), &camera());
        assert_eq!(p.cell(Vec3::new(3.0, 5.0, -2.0)), Some((40, 11)));
    }

    #[test]
    fn far_points_are_clipped() {
        let p = Projection::new(Rect::new(0, 1, 80, 20), &camera());
        assert_eq!(p.cell(Vec3::new(500.0, 0.0, 0.0)), None);
    }

    #[test]
    fn nearer_side_is_lower_on_screen() {
        // alpha = 0 puts the eye on +Z, so +Z points down the screen.
        let p = Projection::new(Rect::new(0, 0, 80, 40), &camera());
        let (_, near) = p.cell(Vec3::new(3.0, 0.0, 2.0)).expect("visible");
        let (_, far) = p.cell(Vec3::new(3.0, 0.0, -6.0)).expect("visible");
        assert!(near > far);
    }
}
