//! Simulation tick driver
//!
//! One tick per display refresh: scale the wall-clock delta by the time
//! multiplier, advance the simulated clock, propagate every entity,
//! classify against the camera, and emit the instance snapshot the active
//! back end will draw. The tick returns a typed report the shell reads;
//! nothing in here calls back out. A tick in progress ignores overlapping
//! triggers, and no single entity's propagation failure can stop the loop.

use satkit::Instant;

use crate::lod::{classify_frame, CameraFrame, DetailTier, LodConfig};
use crate::propagation::SimClock;
use crate::registry::{EntityId, EntityRegistry};
use crate::renderer::{render_velocity_from_km_s, PointInstance, StrategyKind};

/// What the shell needs to know after each tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub sim_time: Instant,
    pub sim_time_label: String,
    pub entity_count: usize,
    pub visible_count: usize,
    /// Visible entities dropped by the frame budget
    pub over_budget: usize,
    /// Entities whose propagation degenerated this tick
    pub degenerate: usize,
    pub selected: Option<EntityId>,
    pub strategy: StrategyKind,
}

/// The core simulation state machine.
pub struct Simulation {
    clock: SimClock,
    registry: EntityRegistry,
    pub lod_config: LodConfig,
    selected: Option<EntityId>,
    requested_strategy: StrategyKind,
    running: bool,
    in_tick: bool,
}

impl Simulation {
    pub fn new(capacity: usize) -> Self {
        Self {
            clock: SimClock::now(),
            registry: EntityRegistry::new(capacity),
            lod_config: LodConfig::default(),
            selected: None,
            requested_strategy: StrategyKind::default(),
            running: true,
            in_tick: false,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn requested_strategy(&self) -> StrategyKind {
        self.requested_strategy
    }

    /// Ask for a rendering strategy. The GPU side applies the change on
    /// the next frame; entity state is untouched.
    pub fn request_strategy(&mut self, kind: StrategyKind) {
        self.requested_strategy = kind;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop tick scheduling. In-flight GPU work completes on its own and
    /// is discarded at the next dispose.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Jump to an absolute simulated time and repropagate immediately.
    pub fn set_time(&mut self, time: Instant) {
        self.clock.set_time(time);
        self.registry.set_time(time);
    }

    /// Playback multiplier: 0 pauses, negative rewinds.
    pub fn set_time_multiplier(&mut self, multiplier: f64) {
        self.clock.set_multiplier(multiplier);
    }

    pub fn reset_to_now(&mut self) {
        self.clock.reset_to_now();
        self.registry.set_time(self.clock.current());
    }

    /// Change the selected entity, keeping the selection flags in sync.
    pub fn select(&mut self, id: Option<EntityId>) {
        if let Some(previous) = self.selected.take() {
            if let Some(entity) = self.registry.get_mut(previous) {
                entity.attrs.selected = false;
            }
        }
        if let Some(id) = id {
            if let Some(entity) = self.registry.get_mut(id) {
                entity.attrs.selected = true;
                self.selected = Some(id);
            }
        }
    }

    /// Run one tick. Returns `None` when not running or re-entered.
    pub fn tick(
        &mut self,
        wall_dt_s: f64,
        camera: &CameraFrame,
    ) -> Option<(TickReport, Vec<PointInstance>)> {
        if !self.running || self.in_tick {
            return None;
        }
        self.in_tick = true;

        let sim_time = self.clock.advance(wall_dt_s);
        let pass = self.registry.set_time(sim_time);
        let frame = classify_frame(&self.registry, camera, &self.lod_config);

        let mut instances = Vec::with_capacity(frame.visible.len());
        for visible in &frame.visible {
            let Some(entity) = self.registry.get(visible.id) else {
                continue;
            };
            let mut size = entity.attrs.point_size * tier_size_scale(visible.tier);
            if entity.attrs.selected {
                size *= 3.0;
            }
            instances.push(PointInstance::new(
                visible.position,
                render_velocity_from_km_s(entity.velocity_km_s()),
                size,
                entity.attrs.color,
            ));
        }

        let report = TickReport {
            sim_time,
            sim_time_label: self.clock.format(),
            entity_count: self.registry.len(),
            visible_count: frame.visible.len(),
            over_budget: frame.over_budget,
            degenerate: pass.degenerate,
            selected: self.selected,
            strategy: self.requested_strategy,
        };

        self.in_tick = false;
        Some((report, instances))
    }
}

/// How much of the configured point size each tier keeps.
fn tier_size_scale(tier: DetailTier) -> f32 {
    match tier {
        DetailTier::Detailed => 1.5,
        DetailTier::Standard => 1.0,
        DetailTier::Reduced => 0.75,
        DetailTier::Minimal => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ClassicalElements, ElementRecord, EARTH_RADIUS_KM};
    use crate::propagation::PropagationMethod;
    use crate::registry::RenderAttrs;
    use glam::{Mat4, Vec3};

    fn camera() -> CameraFrame {
        let position = Vec3::new(0.0, 0.0, 6.0);
        let view = Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), 16.0 / 9.0, 0.01, 100.0);
        CameraFrame {
            view_proj: proj * view,
            position,
        }
    }

    fn populate(sim: &mut Simulation, count: usize) -> Vec<EntityId> {
        let epoch = Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap();
        (0..count)
            .map(|i| {
                sim.registry_mut()
                    .add(
                        ElementRecord::Classical(ClassicalElements {
                            semi_major_axis_km: EARTH_RADIUS_KM + 500.0 + i as f64 * 50.0,
                            eccentricity: 0.001,
                            inclination: 0.9,
                            raan: 0.1 * i as f64,
                            arg_perigee: 0.0,
                            mean_anomaly: 0.4 * i as f64,
                            epoch,
                        }),
                        format!("sat-{}", i),
                        PropagationMethod::Analytic,
                        RenderAttrs::default(),
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_tick_produces_report() {
        let mut sim = Simulation::new(16);
        populate(&mut sim, 8);
        let (report, instances) = sim.tick(0.016, &camera()).unwrap();
        assert_eq!(report.entity_count, 8);
        assert_eq!(report.visible_count, instances.len());
    }

    #[test]
    fn test_stopped_simulation_skips_tick() {
        let mut sim = Simulation::new(4);
        populate(&mut sim, 2);
        sim.stop();
        assert!(sim.tick(0.016, &camera()).is_none());
        sim.resume();
        assert!(sim.tick(0.016, &camera()).is_some());
    }

    #[test]
    fn test_strategy_request_preserves_entities() {
        let mut sim = Simulation::new(8);
        let ids = populate(&mut sim, 5);

        sim.request_strategy(StrategyKind::Compute);
        assert_eq!(sim.registry().len(), 5);
        let after: Vec<EntityId> = sim.registry().iter().map(|e| e.id()).collect();
        assert_eq!(after, ids);
    }

    #[test]
    fn test_selection_flags() {
        let mut sim = Simulation::new(4);
        let ids = populate(&mut sim, 2);

        sim.select(Some(ids[0]));
        assert!(sim.registry().get(ids[0]).unwrap().attrs.selected);

        sim.select(Some(ids[1]));
        assert!(!sim.registry().get(ids[0]).unwrap().attrs.selected);
        assert!(sim.registry().get(ids[1]).unwrap().attrs.selected);

        sim.select(None);
        assert_eq!(sim.selected(), None);
    }

    #[test]
    fn test_paused_tick_holds_time() {
        let mut sim = Simulation::new(4);
        populate(&mut sim, 2);
        sim.set_time_multiplier(0.0);
        let (first, _) = sim.tick(0.5, &camera()).unwrap();
        let (second, _) = sim.tick(0.5, &camera()).unwrap();
        assert_eq!((second.sim_time - first.sim_time).as_seconds(), 0.0);
    }
}
