//! Immediate point-buffer strategy
//!
//! The simplest back end: two flat arrays (positions, colors) sized to the
//! registry capacity, rewritten from the CPU every frame and drawn as raw
//! points. Visible entities occupy the leading slots; slots used last frame
//! but not this one are parked at the sentinel so the geometry never
//! resizes.

use super::{PointInstance, SENTINEL_POSITION};

pub struct ImmediatePoints {
    position_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    capacity: u32,
    count: u32,
    last_count: u32,
}

impl ImmediatePoints {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        capacity: u32,
    ) -> Self {
        let position_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Immediate Position Buffer"),
            size: capacity as u64 * 12,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let color_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Immediate Color Buffer"),
            size: capacity as u64 * 16,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Immediate Point Shader"),
            source: wgpu::ShaderSource::Wgsl(POINT_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Immediate Point Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Immediate Point Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: 16,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x4,
                        }],
                    },
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
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            position_buffer,
            color_buffer,
            pipeline,
            capacity,
            count: 0,
            last_count: 0,
        }
    }

    pub fn sync_frame(&mut self, queue: &wgpu::Queue, instances: &[PointInstance]) {
        let count = instances.len().min(self.capacity as usize);

        if count > 0 {
            let mut positions = Vec::with_capacity(count * 3);
            let mut colors = Vec::with_capacity(count * 4);
            for instance in &instances[..count] {
                positions.extend_from_slice(&instance.position);
                colors.extend_from_slice(&instance.color);
            }
            queue.write_buffer(&self.position_buffer, 0, bytemuck::cast_slice(&positions));
            queue.write_buffer(&self.color_buffer, 0, bytemuck::cast_slice(&colors));
        }

        // Park slots that were live last frame but are unused now
        if self.last_count > count as u32 {
            let parked = self.last_count as usize - count;
            let positions: Vec<f32> = SENTINEL_POSITION
                .iter()
                .copied()
                .cycle()
                .take(parked * 3)
                .collect();
            let colors = vec![0.0f32; parked * 4];
            queue.write_buffer(
                &self.position_buffer,
                count as u64 * 12,
                bytemuck::cast_slice(&positions),
            );
            queue.write_buffer(
                &self.color_buffer,
                count as u64 * 16,
                bytemuck::cast_slice(&colors),
            );
        }

        self.last_count = count as u32;
        self.count = count as u32;
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, self.position_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.color_buffer.slice(..));
        render_pass.draw(0..self.count, 0..1);
    }

    pub fn dispose(&mut self) {
        self.position_buffer.destroy();
        self.color_buffer.destroy();
        self.count = 0;
        self.last_count = 0;
    }
}

const POINT_SHADER: &str = r#"
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
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(position, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
