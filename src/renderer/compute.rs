//! GPU-compute strategy
//!
//! Two GPU passes per frame: a compute pass that extrapolates each
//! instance along its velocity and applies the globe-occlusion test,
//! writing survivors (and sentinels) into a cull buffer; then the same
//! billboard draw the instanced strategy uses, fed from that buffer. The
//! tick never waits on the passes; CPU propagation stays authoritative and
//! the visual result lags by at most one frame.

use bytemuck::{Pod, Zeroable};

use super::instanced::BILLBOARD_SHADER;
use super::{FrameParams, PointInstance};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CullParams {
    camera_pos: [f32; 3],
    dt: f32,
    globe_radius: f32,
    occlusion_enabled: u32,
    count: u32,
    clear_to: u32,
}

pub struct ComputePoints {
    input_buffer: wgpu::Buffer,
    culled_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    compute_pipeline: wgpu::ComputePipeline,
    compute_bind_group: wgpu::BindGroup,
    draw_pipeline: wgpu::RenderPipeline,
    capacity: u32,
    count: u32,
    last_count: u32,
    dispatch_slots: u32,
}

impl ComputePoints {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        capacity: u32,
    ) -> Self {
        let instance_bytes = capacity as u64 * std::mem::size_of::<PointInstance>() as u64;

        let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compute Input Buffer"),
            size: instance_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let culled_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compute Culled Buffer"),
            size: instance_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compute Params Buffer"),
            size: std::mem::size_of::<CullParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cull Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(CULL_SHADER.into()),
        });

        let compute_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cull Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let compute_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cull Bind Group"),
            layout: &compute_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: culled_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cull Pipeline Layout"),
                bind_group_layouts: &[&compute_bind_group_layout],
                push_constant_ranges: &[],
            });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cull Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // Draw pass: the instanced billboard pipeline reading the culled buffer
        let draw_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Compute Draw Shader"),
            source: wgpu::ShaderSource::Wgsl(BILLBOARD_SHADER.into()),
        });

        let draw_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Compute Draw Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Compute Draw Pipeline"),
            layout: Some(&draw_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &draw_shader,
                entry_point: Some("vs_main"),
                buffers: &[PointInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &draw_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
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
            input_buffer,
            culled_buffer,
            params_buffer,
            compute_pipeline,
            compute_bind_group,
            draw_pipeline,
            capacity,
            count: 0,
            last_count: 0,
            dispatch_slots: 0,
        }
    }

    pub fn sync_frame(
        &mut self,
        queue: &wgpu::Queue,
        instances: &[PointInstance],
        params: &FrameParams,
    ) {
        let count = instances.len().min(self.capacity as usize) as u32;

        if count > 0 {
            queue.write_buffer(
                &self.input_buffer,
                0,
                bytemuck::cast_slice(&instances[..count as usize]),
            );
        }

        // The compute pass itself parks the stale tail, so only the
        // dispatch bound needs to cover it
        self.dispatch_slots = count.max(self.last_count);

        let cull_params = CullParams {
            camera_pos: params.camera_position.to_array(),
            dt: params.extrapolate_dt,
            globe_radius: super::GLOBE_RADIUS_RU,
            occlusion_enabled: params.occlusion_culling as u32,
            count,
            clear_to: self.dispatch_slots,
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&cull_params));

        self.last_count = count;
        self.count = count;
    }

    /// Encode the cull pass. Runs before the render pass in the same
    /// submission; completion is never awaited.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        if self.dispatch_slots == 0 {
            return;
        }
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Cull Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.compute_pipeline);
        pass.set_bind_group(0, &self.compute_bind_group, &[]);
        pass.dispatch_workgroups(self.dispatch_slots.div_ceil(WORKGROUP_SIZE), 1, 1);
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.draw_pipeline);
        render_pass.set_vertex_buffer(0, self.culled_buffer.slice(..));
        render_pass.draw(0..6, 0..self.count);
    }

    pub fn dispose(&mut self) {
        self.input_buffer.destroy();
        self.culled_buffer.destroy();
        self.params_buffer.destroy();
        self.count = 0;
        self.last_count = 0;
        self.dispatch_slots = 0;
    }
}

const WORKGROUP_SIZE: u32 = 256;

const CULL_SHADER: &str = r#"
struct PointInstance {
    position: vec3<f32>,
    size: f32,
    velocity: vec3<f32>,
    pad: f32,
    color: vec4<f32>,
};

struct CullParams {
    camera_pos: vec3<f32>,
    dt: f32,
    globe_radius: f32,
    occlusion_enabled: u32,
    count: u32,
    clear_to: u32,
};

@group(0) @binding(0) var<storage, read> points_in: array<PointInstance>;
@group(0) @binding(1) var<storage, read_write> points_out: array<PointInstance>;
@group(0) @binding(2) var<uniform> params: CullParams;

fn sentinel() -> PointInstance {
    var p: PointInstance;
    p.position = vec3<f32>(0.0, 0.0, -1.0e6);
    p.size = 0.0;
    p.velocity = vec3<f32>(0.0);
    p.pad = 0.0;
    p.color = vec4<f32>(0.0);
    return p;
}

// Segment-projection occlusion: the closest point of the camera-to-entity
// segment to the globe center must fall inside the segment and inside the
// globe radius.
fn occluded(position: vec3<f32>) -> bool {
    let segment = position - params.camera_pos;
    let len_sq = dot(segment, segment);
    if (len_sq <= 1.0e-12) {
        return false;
    }
    let t = dot(-params.camera_pos, segment) / len_sq;
    if (t <= 0.0 || t >= 1.0) {
        return false;
    }
    let closest = params.camera_pos + segment * t;
    return length(closest) < params.globe_radius;
}

@compute @workgroup_size(256)
fn cs_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x;
    if (idx >= params.clear_to) {
        return;
    }
    if (idx >= params.count) {
        points_out[idx] = sentinel();
        return;
    }

    var point = points_in[idx];
    let advanced = point.position + point.velocity * params.dt;

    if (params.occlusion_enabled != 0u && occluded(advanced)) {
        points_out[idx] = sentinel();
        return;
    }

    point.position = advanced;
    points_out[idx] = point;
}
"#;
