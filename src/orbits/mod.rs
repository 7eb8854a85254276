//! Orbit-path rendering
//!
//! Orbit instances are pure element data owned by the manager; the three
//! GPU strategies (CPU polyline, instanced unit circle, fully parametric
//! vertex shader) are disposable views over that set. Switching strategy
//! destroys the old strategy's buffers and rebuilds the new one from the
//! same instances, so nothing is lost in the swap. The GPU side is built
//! lazily on the first frame that actually has orbits to draw.

mod instanced;
mod parametric;
mod polyline;
mod tessellation;

pub use instanced::InstancedOrbits;
pub use parametric::ParametricOrbits;
pub use polyline::{PathVertex, PolylineOrbits};
pub use tessellation::{orbit_basis, orbit_center, orbit_ring, perifocal_rotation};

use glam::Vec3;

use crate::elements::ClassicalElements;

/// Opaque orbit-instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrbitId(u64);

impl OrbitId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// One drawable orbit path. Exists independently of any entity flying it.
#[derive(Debug, Clone)]
pub struct OrbitInstance {
    pub id: OrbitId,
    pub elements: ClassicalElements,
    pub color: [f32; 4],
    pub opacity: f32,
    pub visible: bool,
    /// Baseline tessellation for strategies without per-frame LOD
    pub segments: u32,
}

impl OrbitInstance {
    /// Color with the instance opacity folded into alpha.
    pub fn shaded_color(&self) -> [f32; 4] {
        let [r, g, b, a] = self.color;
        [r, g, b, a * self.opacity]
    }
}

/// Polyline segment count by camera distance to the orbit's center.
pub fn segments_for_distance(distance: f32) -> u32 {
    if distance <= 3.0 {
        256
    } else if distance <= 8.0 {
        128
    } else if distance <= 20.0 {
        64
    } else {
        32
    }
}

/// Which orbit-path strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrbitStrategyKind {
    #[default]
    Polyline,
    Instanced,
    Parametric,
}

impl OrbitStrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Polyline => "polyline",
            Self::Instanced => "instanced",
            Self::Parametric => "parametric",
        }
    }
}

enum OrbitStrategy {
    Polyline(PolylineOrbits),
    Instanced(InstancedOrbits),
    Parametric(ParametricOrbits),
}

/// Manager for orbit instances and the single active path strategy.
pub struct OrbitPathRenderer {
    format: wgpu::TextureFormat,
    kind: OrbitStrategyKind,
    strategy: Option<OrbitStrategy>,
    orbits: Vec<OrbitInstance>,
    next_id: u64,
}

impl OrbitPathRenderer {
    pub fn new(format: wgpu::TextureFormat, kind: OrbitStrategyKind) -> Self {
        Self {
            format,
            kind,
            strategy: None,
            orbits: Vec::new(),
            next_id: 0,
        }
    }

    pub fn kind(&self) -> OrbitStrategyKind {
        self.kind
    }

    pub fn orbit_count(&self) -> usize {
        self.orbits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrbitInstance> {
        self.orbits.iter()
    }

    pub fn add_orbit(
        &mut self,
        elements: ClassicalElements,
        color: [f32; 4],
        opacity: f32,
    ) -> OrbitId {
        let id = OrbitId(self.next_id);
        self.next_id += 1;
        self.orbits.push(OrbitInstance {
            id,
            elements,
            color,
            opacity,
            visible: true,
            segments: 128,
        });
        id
    }

    pub fn remove_orbit(&mut self, id: OrbitId) -> bool {
        let before = self.orbits.len();
        self.orbits.retain(|orbit| orbit.id != id);
        self.orbits.len() != before
    }

    pub fn set_orbit_visible(&mut self, id: OrbitId, visible: bool) -> bool {
        match self.orbits.iter_mut().find(|orbit| orbit.id == id) {
            Some(orbit) => {
                orbit.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.orbits.clear();
    }

    /// Switch the active strategy; idempotent. The old strategy's GPU
    /// buffers are disposed now and the replacement is built from the
    /// preserved instance set on the next frame.
    pub fn switch_strategy(&mut self, kind: OrbitStrategyKind) {
        if kind == self.kind {
            return;
        }
        log::info!(
            "switching orbit strategy: {} -> {}",
            self.kind.name(),
            kind.name()
        );
        self.dispose();
        self.kind = kind;
    }

    fn ensure_initialized(
        &mut self,
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
    ) {
        if self.strategy.is_some() {
            return;
        }
        self.strategy = Some(match self.kind {
            OrbitStrategyKind::Polyline => {
                OrbitStrategy::Polyline(PolylineOrbits::new(device, camera_layout, self.format))
            }
            OrbitStrategyKind::Instanced => {
                OrbitStrategy::Instanced(InstancedOrbits::new(device, camera_layout, self.format))
            }
            OrbitStrategyKind::Parametric => OrbitStrategy::Parametric(ParametricOrbits::new(
                device,
                camera_layout,
                self.format,
            )),
        });
    }

    /// Upload this frame's orbit data, building the strategy on first need.
    pub fn sync_frame(
        &mut self,
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        camera_position: Vec3,
    ) {
        if self.orbits.is_empty() && self.strategy.is_none() {
            return;
        }
        self.ensure_initialized(device, camera_layout);

        let Some(strategy) = self.strategy.as_mut() else {
            return;
        };
        match strategy {
            OrbitStrategy::Polyline(s) => s.sync_frame(device, &self.orbits, camera_position),
            OrbitStrategy::Instanced(s) => s.sync_frame(device, &self.orbits),
            OrbitStrategy::Parametric(s) => s.sync_frame(device, &self.orbits),
        }
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        match &self.strategy {
            Some(OrbitStrategy::Polyline(s)) => s.draw(render_pass),
            Some(OrbitStrategy::Instanced(s)) => s.draw(render_pass),
            Some(OrbitStrategy::Parametric(s)) => s.draw(render_pass),
            None => {}
        }
    }

    pub fn dispose(&mut self) {
        match &mut self.strategy {
            Some(OrbitStrategy::Polyline(s)) => s.dispose(),
            Some(OrbitStrategy::Instanced(s)) => s.dispose(),
            Some(OrbitStrategy::Parametric(s)) => s.dispose(),
            None => {}
        }
        self.strategy = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::EARTH_RADIUS_KM;
    use satkit::Instant;

    fn elements(altitude_km: f64) -> ClassicalElements {
        ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + altitude_km,
            eccentricity: 0.01,
            inclination: 0.9,
            raan: 1.0,
            arg_perigee: 0.5,
            mean_anomaly: 0.0,
            epoch: Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap(),
        }
    }

    #[test]
    fn test_orbit_lifecycle() {
        let mut renderer =
            OrbitPathRenderer::new(wgpu::TextureFormat::Bgra8UnormSrgb, OrbitStrategyKind::Polyline);
        let a = renderer.add_orbit(elements(500.0), [1.0, 0.2, 0.2, 1.0], 0.8);
        let b = renderer.add_orbit(elements(800.0), [0.2, 1.0, 0.2, 1.0], 1.0);
        assert_eq!(renderer.orbit_count(), 2);

        assert!(renderer.set_orbit_visible(a, false));
        assert!(!renderer.iter().find(|o| o.id == a).unwrap().visible);

        assert!(renderer.remove_orbit(a));
        assert!(!renderer.remove_orbit(a));
        assert_eq!(renderer.orbit_count(), 1);
        assert_eq!(renderer.iter().next().unwrap().id, b);
    }

    #[test]
    fn test_switch_preserves_instances() {
        let mut renderer =
            OrbitPathRenderer::new(wgpu::TextureFormat::Bgra8UnormSrgb, OrbitStrategyKind::Polyline);
        let ids: Vec<OrbitId> = (0..4)
            .map(|i| renderer.add_orbit(elements(400.0 + i as f64 * 100.0), [1.0; 4], 1.0))
            .collect();
        renderer.set_orbit_visible(ids[2], false);

        renderer.switch_strategy(OrbitStrategyKind::Parametric);
        assert_eq!(renderer.kind(), OrbitStrategyKind::Parametric);
        assert_eq!(renderer.orbit_count(), 4);
        let after: Vec<OrbitId> = renderer.iter().map(|o| o.id).collect();
        assert_eq!(after, ids);
        // Visibility flags survive the switch
        assert!(!renderer.iter().nth(2).unwrap().visible);

        // Switching to the active strategy is a no-op
        renderer.switch_strategy(OrbitStrategyKind::Parametric);
        assert_eq!(renderer.orbit_count(), 4);
    }

    #[test]
    fn test_segment_lod_coarsens_with_distance() {
        let mut last = u32::MAX;
        for d in [1.0, 5.0, 12.0, 40.0] {
            let segments = segments_for_distance(d);
            assert!(segments <= last);
            last = segments;
        }
    }

    #[test]
    fn test_shaded_color_folds_opacity() {
        let orbit = OrbitInstance {
            id: OrbitId(0),
            elements: elements(500.0),
            color: [1.0, 0.5, 0.0, 0.8],
            opacity: 0.5,
            visible: true,
            segments: 128,
        };
        assert_eq!(orbit.shaded_color(), [1.0, 0.5, 0.0, 0.4]);
    }
}
