//! Instanced orbit strategy
//!
//! One shared unit-circle line strip; each orbit is an instance carrying
//! its ellipse basis (center plus in-plane axis vectors) so the vertex
//! stage maps the ring onto the orbit. Orbit count only costs instance
//! data, not geometry.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::tessellation::orbit_basis;
use super::OrbitInstance;

/// Vertices in the shared ring (closed, so +1 for the repeated start).
const RING_SEGMENTS: u32 = 128;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct EllipseInstance {
    center: [f32; 3],
    _pad0: f32,
    major_axis: [f32; 3],
    _pad1: f32,
    minor_axis: [f32; 3],
    _pad2: f32,
    color: [f32; 4],
}

impl EllipseInstance {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EllipseInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 48,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

pub struct InstancedOrbits {
    pipeline: wgpu::RenderPipeline,
    ring_buffer: wgpu::Buffer,
    instance_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
}

impl InstancedOrbits {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> Self {
        // Unit circle parameter ring; t in [0, 2pi]
        let ring: Vec<[f32; 2]> = (0..=RING_SEGMENTS)
            .map(|i| {
                let t = 2.0 * std::f32::consts::PI * i as f32 / RING_SEGMENTS as f32;
                [t.cos(), t.sin()]
            })
            .collect();
        let ring_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Orbit Ring Buffer"),
            contents: bytemuck::cast_slice(&ring),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Orbit Instanced Shader"),
            source: wgpu::ShaderSource::Wgsl(ELLIPSE_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Orbit Instanced Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Orbit Instanced Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: 8,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        }],
                    },
                    EllipseInstance::desc(),
                ],
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
            ring_buffer,
            instance_buffer: None,
            instance_count: 0,
        }
    }

    pub fn sync_frame(&mut self, device: &wgpu::Device, orbits: &[OrbitInstance]) {
        let instances: Vec<EllipseInstance> = orbits
            .iter()
            .filter(|orbit| orbit.visible)
            .map(|orbit| {
                let (center, major, minor) = orbit_basis(&orbit.elements);
                EllipseInstance {
                    center: center.to_array(),
                    _pad0: 0.0,
                    major_axis: major.to_array(),
                    _pad1: 0.0,
                    minor_axis: minor.to_array(),
                    _pad2: 0.0,
                    color: orbit.shaded_color(),
                }
            })
            .collect();

        if let Some(buffer) = self.instance_buffer.take() {
            buffer.destroy();
        }
        self.instance_count = instances.len() as u32;
        self.instance_buffer = (!instances.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Orbit Instance Buffer"),
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
        render_pass.set_vertex_buffer(0, self.ring_buffer.slice(..));
        render_pass.set_vertex_buffer(1, instances.slice(..));
        render_pass.draw(0..RING_SEGMENTS + 1, 0..self.instance_count);
    }

    pub fn dispose(&mut self) {
        self.ring_buffer.destroy();
        if let Some(buffer) = self.instance_buffer.take() {
            buffer.destroy();
        }
        self.instance_count = 0;
    }
}

const ELLIPSE_SHADER: &str = r#"
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

@vertex
fn vs_main(
    @location(0) ring: vec2<f32>,
    @location(1) center: vec3<f32>,
    @location(2) major_axis: vec3<f32>,
    @location(3) minor_axis: vec3<f32>,
    @location(4) color: vec4<f32>,
) -> VertexOutput {
    let world = center + major_axis * ring.x + minor_axis * ring.y;

    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(world, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
