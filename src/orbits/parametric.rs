//! GPU-parametric orbit strategy
//!
//! No geometry at all: each orbit instance packs six floats (semi-major
//! axis, eccentricity, inclination, RAAN, argument of perigee, opacity)
//! and the vertex stage reconstructs the ellipse from the vertex index.
//! The entire orbit set uploads as one small instance buffer.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::OrbitInstance;
use crate::elements::EARTH_RADIUS_KM;

/// Vertices the shader evaluates per orbit.
const CURVE_SEGMENTS: u32 = 256;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PackedOrbit {
    /// a (render units), e, inclination, raan
    shape: [f32; 4],
    /// argument of perigee, opacity, unused, unused
    shape2: [f32; 4],
    color: [f32; 4],
}

impl PackedOrbit {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PackedOrbit>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

pub struct ParametricOrbits {
    pipeline: wgpu::RenderPipeline,
    instance_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
}

impl ParametricOrbits {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Orbit Parametric Shader"),
            source: wgpu::ShaderSource::Wgsl(PARAMETRIC_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Orbit Parametric Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Orbit Parametric Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[PackedOrbit::desc()],
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
            instance_buffer: None,
            instance_count: 0,
        }
    }

    pub fn sync_frame(&mut self, device: &wgpu::Device, orbits: &[OrbitInstance]) {
        let instances: Vec<PackedOrbit> = orbits
            .iter()
            .filter(|orbit| orbit.visible)
            .map(|orbit| {
                let e = &orbit.elements;
                PackedOrbit {
                    shape: [
                        (e.semi_major_axis_km / EARTH_RADIUS_KM) as f32,
                        e.eccentricity as f32,
                        e.inclination as f32,
                        e.raan as f32,
                    ],
                    shape2: [e.arg_perigee as f32, orbit.opacity, 0.0, 0.0],
                    color: orbit.color,
                }
            })
            .collect();

        if let Some(buffer) = self.instance_buffer.take() {
            buffer.destroy();
        }
        self.instance_count = instances.len() as u32;
        self.instance_buffer = (!instances.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Orbit Packed Buffer"),
                contents: bytemuck::cast_slice(&instances),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let Some(instances) = &self.instance_buffer else {
            return;
        };
        if self.instance_count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, instances.slice(..));
        render_pass.draw(0..CURVE_SEGMENTS + 1, 0..self.instance_count);
    }

    pub fn dispose(&mut self) {
        if let Some(buffer) = self.instance_buffer.take() {
            buffer.destroy();
        }
        self.instance_count = 0;
    }
}

const PARAMETRIC_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

const SEGMENTS: f32 = 256.0;
const TAU: f32 = 6.28318530718;

fn rot_z(angle: f32, v: vec3<f32>) -> vec3<f32> {
    let c = cos(angle);
    let s = sin(angle);
    return vec3<f32>(c * v.x - s * v.y, s * v.x + c * v.y, v.z);
}

fn rot_x(angle: f32, v: vec3<f32>) -> vec3<f32> {
    let c = cos(angle);
    let s = sin(angle);
    return vec3<f32>(v.x, c * v.y - s * v.z, s * v.y + c * v.z);
}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) shape: vec4<f32>,
    @location(1) shape2: vec4<f32>,
    @location(2) color: vec4<f32>,
) -> VertexOutput {
    let a = shape.x;
    let e = shape.y;
    let inclination = shape.z;
    let raan = shape.w;
    let arg_perigee = shape2.x;
    let opacity = shape2.y;

    // Conic parametrization swept over one revolution
    let nu = TAU * f32(vertex_index) / SEGMENTS;
    let radius = a * (1.0 - e * e) / (1.0 + e * cos(nu));
    let perifocal = vec3<f32>(radius * cos(nu), radius * sin(nu), 0.0);

    // Perifocal -> inertial: arg perigee (Z), inclination (X), RAAN (Z)
    let inertial = rot_z(raan, rot_x(inclination, rot_z(arg_perigee, perifocal)));

    // ECI Z-up to render Y-up
    let world = vec3<f32>(inertial.x, inertial.z, -inertial.y);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(world, 1.0);
    out.color = vec4<f32>(color.rgb, color.a * opacity);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
