//! GPU rendering back ends
//!
//! Three interchangeable strategies draw the entity swarm: a CPU-written
//! point buffer, GPU-instanced billboards, and a compute pipeline that
//! culls and extrapolates on the GPU before the instanced draw. One
//! strategy is active at a time; switching disposes the old strategy's
//! buffers and rebuilds the new one from the current registry snapshot, so
//! no entity state crosses the GPU boundary.

mod camera;
mod compute;
mod device;
mod globe;
mod immediate;
mod instanced;
mod scene_callback;

pub use camera::{Camera, CameraUniform};
pub use compute::ComputePoints;
pub use device::{negotiate_compute_device, ComputeSupport};
pub use globe::{generate_globe_mesh, GlobeRenderer, GlobeVertex};
pub use immediate::ImmediatePoints;
pub use instanced::InstancedBillboards;
pub use scene_callback::{SceneCallback, SceneRenderData, SceneRenderResources};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use nalgebra::Vector3;

use crate::elements::EARTH_RADIUS_KM;

/// Globe radius in render units; the whole scene is scaled so this is 1.
pub const GLOBE_RADIUS_RU: f32 = 1.0;

/// Parked position for unused or hidden buffer slots: far outside any
/// plausible view volume, so sentinel slots can never intersect the
/// visible draw surface.
pub const SENTINEL_POSITION: [f32; 3] = [0.0, 0.0, -1.0e6];

/// Map an ECI position in kilometers into the render frame.
///
/// ECI is Z-up; rendering is Y-up. The swizzle (x, z, -y) preserves
/// right-handedness, and the scale puts the globe surface at radius 1.
pub fn render_units_from_km(position_km: Vector3<f64>) -> Vec3 {
    let scale = 1.0 / EARTH_RADIUS_KM;
    Vec3::new(
        (position_km.x * scale) as f32,
        (position_km.z * scale) as f32,
        (-position_km.y * scale) as f32,
    )
}

/// Velocity companion to [`render_units_from_km`] (render units / second).
pub fn render_velocity_from_km_s(velocity_km_s: Vector3<f64>) -> Vec3 {
    render_units_from_km(velocity_km_s)
}

/// Per-entity GPU instance: the one wire format all three strategies
/// consume. The velocity feeds GPU-side extrapolation in the compute
/// strategy and is ignored by the other two.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub velocity: [f32; 3],
    _pad: f32,
    pub color: [f32; 4],
}

impl PointInstance {
    pub fn new(position: Vec3, velocity: Vec3, size: f32, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            size,
            velocity: velocity.to_array(),
            _pad: 0.0,
            color,
        }
    }

    /// A parked, invisible instance.
    pub fn sentinel() -> Self {
        Self {
            position: SENTINEL_POSITION,
            size: 0.0,
            velocity: [0.0; 3],
            _pad: 0.0,
            color: [0.0; 4],
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Default entity color keyed by altitude band.
pub fn altitude_to_color(altitude_km: f64) -> [f32; 4] {
    let alt = altitude_km as f32;
    if alt < 2000.0 {
        // LEO: blue to cyan
        let t = (alt / 2000.0).clamp(0.0, 1.0);
        [0.2, 0.4 + 0.6 * t, 1.0, 1.0]
    } else if alt < 20000.0 {
        // MEO lower: cyan to green
        let t = (alt - 2000.0) / 18000.0;
        [0.2 * (1.0 - t), 1.0, 1.0 - t, 1.0]
    } else if alt < 40000.0 {
        // MEO upper through GEO: green to yellow
        let t = (alt - 20000.0) / 20000.0;
        [t, 1.0, 0.0, 1.0]
    } else {
        // HEO: orange to red
        let t = ((alt - 40000.0) / 50000.0).min(1.0);
        [1.0, 1.0 - 0.5 * t, 0.0, 1.0]
    }
}

/// Which entity-rendering strategy is (or should be) active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// CPU-written flat point buffer
    Immediate,
    /// GPU-instanced billboard quads
    #[default]
    Instanced,
    /// Compute-pass culling and extrapolation before the instanced draw
    Compute,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Instanced => "instanced",
            Self::Compute => "compute",
        }
    }
}

/// Per-frame parameters the strategies need besides the instance list.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub camera_position: Vec3,
    /// Seconds of simulated time since the instance snapshot was built;
    /// the compute strategy extrapolates positions by this much
    pub extrapolate_dt: f32,
    pub occlusion_culling: bool,
}

enum ActiveStrategy {
    Immediate(ImmediatePoints),
    Instanced(InstancedBillboards),
    Compute(ComputePoints),
}

impl ActiveStrategy {
    fn kind(&self) -> StrategyKind {
        match self {
            Self::Immediate(_) => StrategyKind::Immediate,
            Self::Instanced(_) => StrategyKind::Instanced,
            Self::Compute(_) => StrategyKind::Compute,
        }
    }
}

/// Owner of exactly one active rendering strategy.
pub struct PointCloudRenderer {
    format: wgpu::TextureFormat,
    capacity: u32,
    compute_support: ComputeSupport,
    active: ActiveStrategy,
    last_requested: StrategyKind,
}

impl PointCloudRenderer {
    /// Build with the requested strategy, falling back to the instanced
    /// path when the compute strategy is unavailable on this device.
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        capacity: u32,
        requested: StrategyKind,
        compute_support: ComputeSupport,
    ) -> Self {
        let kind = Self::resolve(requested, compute_support);
        if kind != requested {
            log::warn!("compute strategy unavailable, falling back to instanced");
        }
        let active = Self::build(device, camera_layout, format, capacity, kind);
        Self {
            format,
            capacity,
            compute_support,
            active,
            last_requested: requested,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.active.kind()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn compute_support(&self) -> ComputeSupport {
        self.compute_support
    }

    fn resolve(requested: StrategyKind, support: ComputeSupport) -> StrategyKind {
        if requested == StrategyKind::Compute && support != ComputeSupport::Ready {
            return StrategyKind::Instanced;
        }
        requested
    }

    fn build(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        capacity: u32,
        kind: StrategyKind,
    ) -> ActiveStrategy {
        match kind {
            StrategyKind::Immediate => {
                ActiveStrategy::Immediate(ImmediatePoints::new(device, camera_layout, format, capacity))
            }
            StrategyKind::Instanced => ActiveStrategy::Instanced(InstancedBillboards::new(
                device,
                camera_layout,
                format,
                capacity,
            )),
            StrategyKind::Compute => {
                ActiveStrategy::Compute(ComputePoints::new(device, camera_layout, format, capacity))
            }
        }
    }

    /// Switch the active strategy. A no-op when the requested strategy is
    /// already active; otherwise synchronous: the previous strategy's
    /// buffers are destroyed before the new one is built, and the caller's
    /// snapshot re-populates it in the same call.
    pub fn switch_strategy(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera_layout: &wgpu::BindGroupLayout,
        requested: StrategyKind,
        snapshot: &[PointInstance],
        params: &FrameParams,
    ) {
        let kind = Self::resolve(requested, self.compute_support);
        if requested != self.last_requested {
            self.last_requested = requested;
            if kind != requested {
                // Fallback logged on the request transition, never per frame
                log::warn!("compute strategy unavailable, falling back to instanced");
            }
        }
        if kind == self.active.kind() {
            return;
        }

        log::info!(
            "switching render strategy: {} -> {}",
            self.active.kind().name(),
            kind.name()
        );
        self.dispose();
        self.active = Self::build(device, camera_layout, self.format, self.capacity, kind);
        self.sync_frame(queue, snapshot, params);
    }

    /// Throw away and rebuild the active strategy's buffers at a new
    /// capacity. Buffers are never incrementally resized.
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        capacity: u32,
    ) {
        let kind = self.active.kind();
        self.dispose();
        self.capacity = capacity;
        self.active = Self::build(device, camera_layout, self.format, capacity, kind);
    }

    /// Upload this frame's visible instances, parking the rest.
    pub fn sync_frame(
        &mut self,
        queue: &wgpu::Queue,
        instances: &[PointInstance],
        params: &FrameParams,
    ) {
        match &mut self.active {
            ActiveStrategy::Immediate(s) => s.sync_frame(queue, instances),
            ActiveStrategy::Instanced(s) => s.sync_frame(queue, instances),
            ActiveStrategy::Compute(s) => s.sync_frame(queue, instances, params),
        }
    }

    /// Encode GPU-side work that must run before the draw. Only the
    /// compute strategy emits anything here.
    pub fn encode_compute(&self, encoder: &mut wgpu::CommandEncoder) {
        if let ActiveStrategy::Compute(s) = &self.active {
            s.encode(encoder);
        }
    }

    /// Record the draw. Bind group 0 (camera) must already be set.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        match &self.active {
            ActiveStrategy::Immediate(s) => s.draw(render_pass),
            ActiveStrategy::Instanced(s) => s.draw(render_pass),
            ActiveStrategy::Compute(s) => s.draw(render_pass),
        }
    }

    /// Destroy the active strategy's GPU buffers.
    pub fn dispose(&mut self) {
        match &mut self.active {
            ActiveStrategy::Immediate(s) => s.dispose(),
            ActiveStrategy::Instanced(s) => s.dispose(),
            ActiveStrategy::Compute(s) => s.dispose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_units_swizzle() {
        let pole = Vector3::new(0.0, 0.0, EARTH_RADIUS_KM);
        let mapped = render_units_from_km(pole);
        // ECI north pole lands on render +Y at radius 1
        assert!((mapped - Vec3::new(0.0, 1.0, 0.0)).length() < 1.0e-6);

        let y_axis = render_units_from_km(Vector3::new(0.0, EARTH_RADIUS_KM, 0.0));
        assert!((y_axis - Vec3::new(0.0, 0.0, -1.0)).length() < 1.0e-6);
    }

    #[test]
    fn test_point_instance_layout() {
        assert_eq!(std::mem::size_of::<PointInstance>(), 48);
        let sentinel = PointInstance::sentinel();
        assert_eq!(sentinel.position, SENTINEL_POSITION);
        assert_eq!(sentinel.color, [0.0; 4]);
    }

    #[test]
    fn test_fallback_resolution() {
        assert_eq!(
            PointCloudRenderer::resolve(StrategyKind::Compute, ComputeSupport::Unavailable),
            StrategyKind::Instanced
        );
        assert_eq!(
            PointCloudRenderer::resolve(StrategyKind::Compute, ComputeSupport::Ready),
            StrategyKind::Compute
        );
        assert_eq!(
            PointCloudRenderer::resolve(StrategyKind::Immediate, ComputeSupport::Unavailable),
            StrategyKind::Immediate
        );
    }

    #[test]
    fn test_altitude_color_bands() {
        let leo = altitude_to_color(500.0);
        let geo = altitude_to_color(35786.0);
        assert!(leo[2] > 0.9); // blue-dominant
        assert!(geo[0] > 0.5 && geo[1] > 0.9); // yellow region
    }
}
