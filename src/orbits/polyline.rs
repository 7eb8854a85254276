//! CPU polyline orbit strategy
//!
//! Tessellates every visible orbit on the CPU, with a per-orbit segment
//! count chosen from the camera's distance to that orbit's center, and
//! concatenates the rings into one shared vertex buffer. Each orbit is
//! drawn as its own line-strip range. The buffer is only rebuilt when the
//! orbit set or an orbit's detail bucket changes.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use super::tessellation::{orbit_center, orbit_ring};
use super::{segments_for_distance, OrbitInstance};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PathVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl PathVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PathVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

pub struct PolylineOrbits {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: Option<wgpu::Buffer>,
    ranges: Vec<std::ops::Range<u32>>,
    /// (orbit id value, segment count) fingerprint of the last build
    build_key: Vec<(u64, u32)>,
}

impl PolylineOrbits {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Orbit Polyline Shader"),
            source: wgpu::ShaderSource::Wgsl(POLYLINE_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Orbit Polyline Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Orbit Polyline Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[PathVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineStrip,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer: None,
            ranges: Vec::new(),
            build_key: Vec::new(),
        }
    }

    pub fn sync_frame(
        &mut self,
        device: &wgpu::Device,
        orbits: &[OrbitInstance],
        camera_position: Vec3,
    ) {
        let key: Vec<(u64, u32)> = orbits
            .iter()
            .filter(|orbit| orbit.visible)
            .map(|orbit| {
                let distance = camera_position.distance(orbit_center(&orbit.elements));
                // Distance-driven LOD, capped by the orbit's own budget
                (
                    orbit.id.value(),
                    segments_for_distance(distance).min(orbit.segments.max(8)),
                )
            })
            .collect();

        if key == self.build_key {
            return;
        }

        let mut vertices: Vec<PathVertex> = Vec::new();
        let mut ranges = Vec::new();
        for orbit in orbits.iter().filter(|orbit| orbit.visible) {
            let distance = camera_position.distance(orbit_center(&orbit.elements));
            let segments = segments_for_distance(distance).min(orbit.segments.max(8));

            let start = vertices.len() as u32;
            let color = orbit.shaded_color();
            vertices.extend(orbit_ring(&orbit.elements, segments).into_iter().map(
                |point| PathVertex {
                    position: point.to_array(),
                    color,
                },
            ));
            ranges.push(start..vertices.len() as u32);
        }

        if let Some(buffer) = self.vertex_buffer.take() {
            buffer.destroy();
        }
        self.vertex_buffer = (!vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Orbit Polyline Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        self.ranges = ranges;
        self.build_key = key;
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = &self.vertex_buffer else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, buffer.slice(..));
        for range in &self.ranges {
            render_pass.draw(range.clone(), 0..1);
        }
    }

    pub fn dispose(&mut self) {
        if let Some(buffer) = self.vertex_buffer.take() {
            buffer.destroy();
        }
        self.ranges.clear();
        self.build_key.clear();
    }
}

const POLYLINE_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
