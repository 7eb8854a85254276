//! OrbitSwarm - large-scale orbital swarm visualizer
//!
//! Renders up to millions of orbiting point entities around a globe,
//! propagated by SGP4 or a two-body integrator and drawn by one of three
//! hot-swappable GPU back ends.

mod data;
mod elements;
mod lod;
mod orbits;
mod propagation;
mod registry;
mod renderer;
mod scene;

use std::sync::Arc;

use anyhow::Result;
use eframe::egui;

use data::synthesize_constellation;
use lod::CameraFrame;
use orbits::OrbitStrategyKind;
use propagation::PropagationMethod;
use renderer::{
    negotiate_compute_device, Camera, ComputeSupport, PointInstance, SceneCallback,
    SceneRenderData, SceneRenderResources, StrategyKind,
};
use scene::{Simulation, TickReport};

/// Registry capacity; every GPU buffer is sized to this.
const DEFAULT_CAPACITY: usize = 1_000_000;

/// Synthetic population seeded at startup.
const INITIAL_POPULATION: usize = 50_000;

const SPEED_PRESETS: [f64; 11] = [
    -10000.0, -1000.0, -100.0, -10.0, -1.0, 0.0, 1.0, 10.0, 100.0, 1000.0, 10000.0,
];

struct OrbitSwarmApp {
    sim: Simulation,
    camera: Camera,
    camera_drag: Option<egui::Pos2>,

    instances: Arc<Vec<PointInstance>>,
    last_report: Option<TickReport>,

    requested_orbit_strategy: OrbitStrategyKind,
    compute_support: ComputeSupport,
    speed_index: usize,

    wgpu_initialized: bool,
    last_frame_time: std::time::Instant,
    last_frame_delta: f64,
}

impl OrbitSwarmApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Result<Self> {
        let compute_support = negotiate_compute_device();

        let mut sim = Simulation::new(DEFAULT_CAPACITY);

        // Seed a synthetic swarm so the scene is alive immediately
        let epoch = sim.clock().current();
        let mut rng = rand::thread_rng();
        let batch = sim.registry_mut().add_batch(
            synthesize_constellation(INITIAL_POPULATION, 350.0..2000.0, epoch, &mut rng),
            PropagationMethod::Analytic,
        );
        log::info!(
            "seeded {} entities ({} rejected)",
            batch.ids.len(),
            batch.rejected
        );

        let wgpu_initialized = if let Some(wgpu_render_state) = &cc.wgpu_render_state {
            let device = &wgpu_render_state.device;
            let target_format = wgpu_render_state.target_format;

            let mut resources = SceneRenderResources::new(
                device,
                target_format,
                1280,
                720,
                DEFAULT_CAPACITY as u32,
                compute_support,
            );

            // A few orbit paths over the swarm
            for (i, entity) in sim.registry().iter().take(8).enumerate() {
                if let Ok(elements) = entity.record.to_classical() {
                    let hue = i as f32 / 8.0;
                    resources.orbits_mut().add_orbit(
                        elements,
                        [1.0 - hue * 0.5, 0.3 + hue * 0.6, 0.9 - hue * 0.6, 1.0],
                        0.8,
                    );
                }
            }

            wgpu_render_state
                .renderer
                .write()
                .callback_resources
                .insert(resources);
            log::info!("wgpu scene renderer initialized");
            true
        } else {
            log::error!("no wgpu render state available");
            false
        };

        Ok(Self {
            sim,
            camera: Camera::default(),
            camera_drag: None,
            instances: Arc::new(Vec::new()),
            last_report: None,
            requested_orbit_strategy: OrbitStrategyKind::default(),
            compute_support,
            speed_index: 6, // 1x
            wgpu_initialized,
            last_frame_time: std::time::Instant::now(),
            last_frame_delta: 0.0,
        })
    }

    fn handle_camera_input(&mut self, ctx: &egui::Context, viewport_rect: egui::Rect) {
        let input = ctx.input(|i| i.clone());

        if let Some(pos) = input.pointer.hover_pos() {
            if viewport_rect.contains(pos) {
                let scroll = input.raw_scroll_delta.y;
                if scroll != 0.0 {
                    self.camera.zoom(scroll * 0.1);
                }

                if input.pointer.button_down(egui::PointerButton::Primary) {
                    if let Some(last_pos) = self.camera_drag {
                        let delta = pos - last_pos;
                        self.camera.orbit(delta.x, delta.y);
                    }
                    self.camera_drag = Some(pos);
                } else {
                    self.camera_drag = None;
                }
            }
        }
    }

    fn push_render_data(&self, frame: &eframe::Frame, aspect_ratio: f32) {
        if let Some(wgpu_render_state) = frame.wgpu_render_state() {
            let renderer = wgpu_render_state.renderer.read();
            if let Some(resources) = renderer.callback_resources.get::<SceneRenderResources>() {
                let extrapolate_dt =
                    (self.last_frame_delta * self.sim.clock().multiplier()).clamp(-5.0, 5.0) as f32;

                resources.set_render_data(SceneRenderData {
                    camera: self.camera.clone(),
                    aspect_ratio,
                    instances: Arc::clone(&self.instances),
                    requested_strategy: self.sim.requested_strategy(),
                    orbit_strategy: self.requested_orbit_strategy,
                    occlusion_culling: self.sim.lod_config.occlusion_culling,
                    extrapolate_dt,
                    capacity: self.sim.registry().capacity() as u32,
                    buffer_generation: self.sim.registry().buffer_generation(),
                });
            }
        }
    }

    fn render_viewport(&mut self, ui: &mut egui::Ui, frame: &eframe::Frame) {
        let viewport_rect = ui.available_rect_before_wrap();
        let pixels_per_point = ui.ctx().pixels_per_point();
        let viewport_width = (viewport_rect.width() * pixels_per_point).round().max(1.0) as u32;
        let viewport_height = (viewport_rect.height() * pixels_per_point).round().max(1.0) as u32;

        self.handle_camera_input(ui.ctx(), viewport_rect);

        let aspect_ratio = viewport_rect.width() / viewport_rect.height();
        self.push_render_data(frame, aspect_ratio);

        let (response, painter) =
            ui.allocate_painter(viewport_rect.size(), egui::Sense::click_and_drag());

        painter.add(egui_wgpu::Callback::new_paint_callback(
            response.rect,
            SceneCallback {
                viewport_size: (viewport_width, viewport_height),
            },
        ));

        let frame_time = self.last_frame_delta.max(0.001);
        let strategy = self
            .last_report
            .as_ref()
            .map(|r| r.strategy.name())
            .unwrap_or("-");
        painter.text(
            response.rect.left_top() + egui::vec2(10.0, 10.0),
            egui::Align2::LEFT_TOP,
            format!(
                "Drag to orbit | Scroll to zoom\nFPS: {:.0} | strategy: {}",
                1.0 / frame_time,
                strategy,
            ),
            egui::FontId::monospace(12.0),
            egui::Color32::from_rgb(150, 150, 150),
        );
    }

    fn show_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("OrbitSwarm");
            ui.separator();

            let speed = SPEED_PRESETS[self.speed_index];
            egui::ComboBox::from_id_salt("speed_select")
                .selected_text(format_speed(speed))
                .show_ui(ui, |ui| {
                    for (i, preset) in SPEED_PRESETS.iter().enumerate() {
                        if ui
                            .selectable_value(&mut self.speed_index, i, format_speed(*preset))
                            .clicked()
                        {
                            self.sim.set_time_multiplier(*preset);
                        }
                    }
                });

            if ui.button("Now").clicked() {
                self.sim.reset_to_now();
            }

            ui.separator();
            ui.label("Points:");
            let mut strategy = self.sim.requested_strategy();
            for kind in [
                StrategyKind::Immediate,
                StrategyKind::Instanced,
                StrategyKind::Compute,
            ] {
                let enabled =
                    kind != StrategyKind::Compute || self.compute_support == ComputeSupport::Ready;
                if ui
                    .add_enabled(
                        enabled,
                        egui::Button::selectable(strategy == kind, kind.name()),
                    )
                    .clicked()
                {
                    strategy = kind;
                }
            }
            self.sim.request_strategy(strategy);

            ui.separator();
            ui.label("Orbits:");
            for kind in [
                OrbitStrategyKind::Polyline,
                OrbitStrategyKind::Instanced,
                OrbitStrategyKind::Parametric,
            ] {
                ui.selectable_value(&mut self.requested_orbit_strategy, kind, kind.name());
            }

            ui.separator();
            ui.checkbox(&mut self.sim.lod_config.occlusion_culling, "Occlusion");

            if let Some(report) = &self.last_report {
                ui.separator();
                ui.label(format!(
                    "{} | {} entities | {} visible{}",
                    report.sim_time_label,
                    report.entity_count,
                    report.visible_count,
                    if report.degenerate > 0 {
                        format!(" | {} degenerate", report.degenerate)
                    } else {
                        String::new()
                    },
                ));
            }
        });
    }
}

impl eframe::App for OrbitSwarmApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let now = std::time::Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f64();
        self.last_frame_time = now;
        self.last_frame_delta = frame_time;

        // Drive the tick
        let viewport = ctx.screen_rect();
        let aspect = (viewport.width() / viewport.height()).max(0.1);
        let camera_frame = CameraFrame {
            view_proj: self.camera.view_projection_matrix(aspect),
            position: self.camera.position(),
        };
        if let Some((report, instances)) = self.sim.tick(frame_time, &camera_frame) {
            self.instances = Arc::new(instances);
            self.last_report = Some(report);
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.show_top_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.wgpu_initialized {
                self.render_viewport(ui, frame);
            } else {
                ui.colored_label(egui::Color32::RED, "wgpu renderer unavailable");
            }
        });

        ctx.request_repaint();
    }
}

fn format_speed(speed: f64) -> String {
    if speed == 0.0 {
        "Paused".to_string()
    } else {
        format!("{:.0}x", speed)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("starting OrbitSwarm...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 900.0])
            .with_title("OrbitSwarm"),
        renderer: eframe::Renderer::Wgpu,
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "OrbitSwarm",
        options,
        Box::new(|cc| match OrbitSwarmApp::new(cc) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                log::error!("failed to initialize app: {}", e);
                Err(e.into())
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
