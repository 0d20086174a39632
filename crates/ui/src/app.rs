use eframe::egui;
use mosaic_core::render::SceneRecorder;
use mosaic_core::scene::Scene;
use mosaic_core::{parsers, MosaicConfig, World};
use mosaic_protocol::{EntityKey, HandleId, ThemeToken};

use crate::renderer::{self, OrbitProjection};
use crate::theme::{self, ThemeMode};

const ORBIT_SENSITIVITY: f64 = 0.01;
const MIN_RADIUS: f64 = 5.0;
const MAX_RADIUS: f64 = 400.0;

/// Main application state.
pub struct MosaicApp {
    world: Option<World<SceneRecorder>>,
    /// Everything the world has drawn so far, replayed.
    scene: Scene,
    config: MosaicConfig,
    theme_mode: ThemeMode,
    selected: Option<EntityKey>,
    hovered: Option<HandleId>,
    /// Error message to display.
    error: Option<String>,
    /// Pending trace data from async load.
    pending_data: std::sync::Arc<std::sync::Mutex<Option<Vec<u8>>>>,
}

impl MosaicApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let pending_data: std::sync::Arc<std::sync::Mutex<Option<Vec<u8>>>> =
            std::sync::Arc::new(std::sync::Mutex::new(None));

        // On WASM, #demo loads the bundled trace.
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(w) = web_sys::window() {
                let hash = w.location().hash().unwrap_or_default();
                if hash == "#demo" {
                    let pd = pending_data.clone();
                    let ctx = cc.egui_ctx.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        match Self::fetch_bytes("/assets/demo.trace").await {
                            Ok(resp) => {
                                tracing::info!(bytes = resp.len(), "fetched demo trace");
                                if let Ok(mut lock) = pd.lock() {
                                    *lock = Some(resp);
                                }
                                ctx.request_repaint();
                            }
                            Err(e) => {
                                web_sys::console::error_1(
                                    &format!("code mosaic: fetch error: {e}").into(),
                                );
                            }
                        }
                    });
                }
            }
        }

        Self {
            world: None,
            scene: Scene::new(),
            config: MosaicConfig::default(),
            theme_mode: ThemeMode::Dark,
            selected: None,
            hovered: None,
            error: None,
            pending_data,
        }
    }

    fn load_trace(&mut self, data: &[u8]) {
        match parsers::parse_auto(data) {
            Ok(trace) => {
                tracing::info!(steps = trace.len(), "loaded trace");
                let mut world = World::recording(trace, &self.config);
                self.scene = Scene::new();
                self.scene.apply_all(world.drain_commands());
                self.world = Some(world);
                self.selected = None;
                self.hovered = None;
                self.error = None;
            }
            Err(e) => {
                self.error = Some(format!("Failed to parse trace: {e}"));
            }
        }
    }

    /// Replay whatever the world recorded since the last frame.
    fn pull_commands(&mut self) {
        if let Some(world) = &mut self.world {
            self.scene.apply_all(world.drain_commands());
        }
    }

    fn explode_selected(&mut self) {
        let (Some(world), Some(key)) = (&mut self.world, &self.selected) else {
            return;
        };
        if !world.explode(key) {
            self.error = Some(format!("{key} is not in the scene"));
        }
    }

    fn warp_selected(&mut self) {
        let (Some(world), Some(key)) = (&mut self.world, &self.selected) else {
            return;
        };
        if !world.warp(key) {
            self.error = Some(format!("nothing to warp to from {key}"));
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Code Mosaic");
            ui.separator();

            if ui.button("Open").clicked() {
                #[cfg(not(target_arch = "wasm32"))]
                {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Trace", &["json", "trace", "txt"])
                        .pick_file()
                    {
                        match std::fs::read(&path) {
                            Ok(data) => self.load_trace(&data),
                            Err(e) => {
                                self.error = Some(format!("Failed to read file: {e}"));
                            }
                        }
                    }
                }
            }

            let theme_label = match self.theme_mode {
                ThemeMode::Dark => "Dark",
                ThemeMode::Light => "Light",
            };
            if ui.button(theme_label).clicked() {
                self.theme_mode = match self.theme_mode {
                    ThemeMode::Dark => {
                        ctx.set_visuals(egui::Visuals::light());
                        ThemeMode::Light
                    }
                    ThemeMode::Light => {
                        ctx.set_visuals(egui::Visuals::dark());
                        ThemeMode::Dark
                    }
                };
            }

            let Some(world) = &mut self.world else {
                return;
            };
            ui.separator();

            if ui.button("⏮").on_hover_text("Start").clicked() {
                world.go_to_start();
            }
            if ui.button("◀").on_hover_text("Step back").clicked() {
                world.step_backward();
            }
            let play_label = if world.timeline().is_playing() { "⏸" } else { "▶" };
            if ui.button(play_label).on_hover_text("Play / pause").clicked() {
                world.toggle_play();
            }
            if ui.button("▶|").on_hover_text("Step forward").clicked() {
                world.step_forward();
            }
            if ui.button("⏭").on_hover_text("End").clicked() {
                world.go_to_end();
            }

            let mut speed_ms = world.timeline().speed().as_millis() as u64;
            if ui
                .add(egui::Slider::new(&mut speed_ms, 50..=2000).suffix(" ms"))
                .changed()
            {
                world.set_speed(speed_ms);
            }

            ui.separator();
            let has_selection = self.selected.is_some();
            let explode = ui.add_enabled(has_selection, egui::Button::new("Explode"));
            let warp = ui.add_enabled(has_selection, egui::Button::new("Warp"));
            if ui.button("Collapse").clicked() {
                world.collapse();
            }
            if ui.button("Return").clicked() {
                world.return_from_warp();
            }
            if ui.button("Reset camera").clicked() {
                world.reset_camera();
            }
            if explode.clicked() {
                self.explode_selected();
            }
            if warp.clicked() {
                self.warp_selected();
            }
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        if let Some(world) = &mut self.world {
            let len = world.trace().len();
            if len > 0 {
                let mut index = world.cursor().value();
                let last = len as i64 - 1;
                let slider = egui::Slider::new(&mut index, -1..=last).text("step");
                if ui.add_sized([ui.available_width(), 18.0], slider).changed() {
                    world.seek(index);
                }
            }
        }
        ui.horizontal(|ui| {
            if let Some(err) = &self.error {
                ui.colored_label(egui::Color32::RED, err);
            } else if let Some(world) = &self.world {
                let cursor = world.cursor();
                let step = world.trace().step_at(cursor);
                let step_text = step.map_or_else(
                    || "before start".to_string(),
                    |s| format!("{} {} (line {})", s.kind.tag(), s.name, s.line),
                );
                ui.label(format!(
                    "Step {}/{} | {} | Entities: {} | Focus depth: {}",
                    cursor,
                    world.trace().len(),
                    step_text,
                    world.snapshot().entity_count(),
                    world.focus().depth(),
                ));
                if let Some(key) = &self.selected {
                    ui.separator();
                    ui.label(format!("Selected: {key}"));
                }
            } else {
                ui.label("No trace loaded. Click Open or drag & drop a file");
            }
        });
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (space, left, right, e, g, c, b, r) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::E),
                i.key_pressed(egui::Key::G),
                i.key_pressed(egui::Key::C),
                i.key_pressed(egui::Key::B),
                i.key_pressed(egui::Key::R),
            )
        });
        if e {
            self.explode_selected();
        }
        if g {
            self.warp_selected();
        }
        let Some(world) = &mut self.world else {
            return;
        };
        if space {
            world.toggle_play();
        }
        if left {
            world.step_backward();
        }
        if right {
            world.step_forward();
        }
        if c {
            world.collapse();
        }
        if b {
            world.return_from_warp();
        }
        if r {
            world.reset_camera();
        }
    }

    fn viewport(&mut self, ui: &mut egui::Ui) {
        if self.world.is_none() {
            ui.centered_and_justified(|ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Drop a trace here or click Open");
                    ui.label("Supports: JSON step traces and raw tracer output");
                });
            });
            return;
        }

        let available = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(available, egui::Sense::click_and_drag());
        let painter = ui.painter_at(available);
        painter.rect_filled(
            available,
            egui::CornerRadius::ZERO,
            theme::resolve(ThemeToken::Background, self.theme_mode),
        );

        let projection = OrbitProjection::new(&self.scene.camera(), available);
        let highlighted: Vec<HandleId> = self
            .selected
            .as_ref()
            .and_then(|key| self.world.as_ref()?.reconciler().entry(key))
            .map(|entry| entry.meshes.all().collect())
            .unwrap_or_default();
        let result = renderer::render_scene(
            &painter,
            &self.scene,
            &projection,
            self.theme_mode,
            &highlighted,
        );

        let Some(world) = &mut self.world else {
            return;
        };

        let hovered = response.hover_pos().and_then(|pos| result.hit(pos));
        if hovered != self.hovered {
            self.hovered = hovered;
            world.hover(hovered);
        }

        if response.clicked() {
            self.selected = hovered.and_then(|h| world.pick(h)).cloned();
        }
        if response.double_clicked() {
            if let Some(key) = hovered.and_then(|h| world.pick(h)).cloned() {
                world.explode(&key);
            }
        }

        if response.dragged() {
            let delta = response.drag_delta();
            let mut camera = world.camera();
            camera.alpha -= f64::from(delta.x) * ORBIT_SENSITIVITY;
            camera.beta = (camera.beta - f64::from(delta.y) * ORBIT_SENSITIVITY)
                .clamp(0.05, std::f64::consts::PI - 0.05);
            world.orbit(camera);
        }

        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if response.hovered() && scroll.abs() > 0.1 {
            let mut camera = world.camera();
            camera.radius =
                (camera.radius * 2.0_f64.powf(-f64::from(scroll) * 0.002)).clamp(MIN_RADIUS, MAX_RADIUS);
            world.orbit(camera);
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl MosaicApp {
    async fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;

        let window = web_sys::window().ok_or("no window")?;
        let resp_value = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| format!("{e:?}"))?;
        let resp: web_sys::Response = resp_value.dyn_into().map_err(|_| "not a Response")?;
        if !resp.ok() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let buf = JsFuture::from(resp.array_buffer().map_err(|e| format!("{e:?}"))?)
            .await
            .map_err(|e| format!("{e:?}"))?;
        Ok(js_sys::Uint8Array::new(&buf).to_vec())
    }
}

impl eframe::App for MosaicApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let pending = {
            let mut lock = self.pending_data.lock().unwrap_or_else(|e| e.into_inner());
            lock.take()
        };
        if let Some(data) = pending {
            self.load_trace(&data);
        }

        let dt = f64::from(ctx.input(|i| i.stable_dt));
        if let Some(world) = &mut self.world {
            world.advance(dt);
        }
        self.pull_commands();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ctx, ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.viewport(ui));
        if !ctx.wants_keyboard_input() {
            self.handle_keys(ctx);
        }

        // Input handlers may have queued commands; show them this frame.
        self.pull_commands();

        if let Some(world) = &self.world {
            let focus = world.focus();
            if world.timeline().is_playing() || focus.is_animating() || !focus.is_normal() {
                ctx.request_repaint();
            }
        }

        let dropped = ctx.input(|i| {
            i.raw
                .dropped_files
                .first()
                .and_then(|file| file.bytes.as_ref().map(|bytes| bytes.to_vec()))
        });
        if let Some(data) = dropped {
            self.load_trace(&data);
        }
    }
}
