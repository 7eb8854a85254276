//! egui_wgpu integration
//!
//! The 3D scene renders into an offscreen target with its own depth
//! buffer, then blits into egui's render pass. All GPU resources live in
//! `callback_resources`; the app hands a fresh `SceneRenderData` across a
//! lock each frame. Strategy switches and capacity rebuilds are applied
//! here, synchronously, at the top of the frame they were requested in.

use parking_lot::RwLock;
use std::sync::Arc;

use super::{
    Camera, CameraUniform, ComputeSupport, FrameParams, GlobeRenderer, PointCloudRenderer,
    PointInstance, StrategyKind,
};
use crate::orbits::{OrbitPathRenderer, OrbitStrategyKind};

/// Per-frame data passed from the app to the paint callback.
#[derive(Clone)]
pub struct SceneRenderData {
    pub camera: Camera,
    pub aspect_ratio: f32,
    pub instances: Arc<Vec<PointInstance>>,
    pub requested_strategy: StrategyKind,
    pub orbit_strategy: OrbitStrategyKind,
    pub occlusion_culling: bool,
    /// Simulated seconds since the snapshot was built (GPU extrapolation)
    pub extrapolate_dt: f32,
    /// Registry capacity and its buffer generation; a generation change
    /// forces a full buffer rebuild
    pub capacity: u32,
    pub buffer_generation: u64,
}

impl Default for SceneRenderData {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            aspect_ratio: 16.0 / 9.0,
            instances: Arc::new(Vec::new()),
            requested_strategy: StrategyKind::default(),
            orbit_strategy: OrbitStrategyKind::default(),
            occlusion_culling: true,
            extrapolate_dt: 0.0,
            capacity: 0,
            buffer_generation: 0,
        }
    }
}

/// GPU resources for the 3D scene, stored in egui's callback resources.
pub struct SceneRenderResources {
    offscreen_texture: wgpu::Texture,
    offscreen_view: wgpu::TextureView,
    offscreen_size: (u32, u32),
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    target_format: wgpu::TextureFormat,

    camera_buffer: wgpu::Buffer,
    camera_bind_group_layout: wgpu::BindGroupLayout,
    camera_bind_group: wgpu::BindGroup,

    globe: GlobeRenderer,
    points: PointCloudRenderer,
    orbits: OrbitPathRenderer,
    applied_generation: u64,

    blit_pipeline: wgpu::RenderPipeline,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    blit_bind_group: wgpu::BindGroup,
    blit_sampler: wgpu::Sampler,

    render_data: RwLock<SceneRenderData>,
}

impl SceneRenderResources {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        capacity: u32,
        compute_support: ComputeSupport,
    ) -> Self {
        log::info!("initializing scene renderer ({}x{})", width, height);

        let (offscreen_texture, offscreen_view) =
            Self::create_offscreen_texture(device, width, height, target_format);
        let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let globe = GlobeRenderer::new(device, &camera_bind_group_layout, target_format);
        let points = PointCloudRenderer::new(
            device,
            &camera_bind_group_layout,
            target_format,
            capacity,
            StrategyKind::default(),
            compute_support,
        );
        let orbits = OrbitPathRenderer::new(target_format, OrbitStrategyKind::default());

        // Blit pipeline for drawing the offscreen texture into egui's pass
        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let blit_bind_group = Self::create_blit_bind_group(
            device,
            &blit_bind_group_layout,
            &offscreen_view,
            &blit_sampler,
        );

        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            offscreen_texture,
            offscreen_view,
            offscreen_size: (width, height),
            depth_texture,
            depth_view,
            target_format,
            camera_buffer,
            camera_bind_group_layout,
            camera_bind_group,
            globe,
            points,
            orbits,
            applied_generation: 0,
            blit_pipeline,
            blit_bind_group_layout,
            blit_bind_group,
            blit_sampler,
            render_data: RwLock::new(SceneRenderData::default()),
        }
    }

    /// Hand the next frame's data across to the paint callback.
    pub fn set_render_data(&self, data: SceneRenderData) {
        *self.render_data.write() = data;
    }

    /// The active (post-fallback) entity strategy.
    pub fn active_strategy(&self) -> StrategyKind {
        self.points.kind()
    }

    pub fn compute_support(&self) -> ComputeSupport {
        self.points.compute_support()
    }

    /// Orbit instances and strategy live with the GPU resources; the app
    /// mutates them through here.
    pub fn orbits_mut(&mut self) -> &mut OrbitPathRenderer {
        &mut self.orbits
    }

    pub fn orbits(&self) -> &OrbitPathRenderer {
        &self.orbits
    }

    fn create_offscreen_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_blit_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        offscreen_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(offscreen_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Resize the offscreen targets if the viewport changed.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.offscreen_size != (width, height) && width > 0 && height > 0 {
            let (offscreen_texture, offscreen_view) =
                Self::create_offscreen_texture(device, width, height, self.target_format);
            let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

            self.blit_bind_group = Self::create_blit_bind_group(
                device,
                &self.blit_bind_group_layout,
                &offscreen_view,
                &self.blit_sampler,
            );

            self.offscreen_texture = offscreen_texture;
            self.offscreen_view = offscreen_view;
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
            self.offscreen_size = (width, height);
        }
    }

    /// Apply pending switches, sync buffers, and render the scene into the
    /// offscreen target.
    pub fn render_offscreen(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let data = self.render_data.read().clone();

        let camera_uniform = CameraUniform::from_camera(&data.camera, data.aspect_ratio);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        // Capacity reconfiguration invalidates every capacity-sized buffer
        if data.buffer_generation != self.applied_generation {
            self.points
                .rebuild(device, &self.camera_bind_group_layout, data.capacity);
            self.applied_generation = data.buffer_generation;
        }

        let params = FrameParams {
            camera_position: data.camera.position(),
            extrapolate_dt: data.extrapolate_dt,
            occlusion_culling: data.occlusion_culling,
        };

        self.points.switch_strategy(
            device,
            queue,
            &self.camera_bind_group_layout,
            data.requested_strategy,
            &data.instances,
            &params,
        );
        self.points.sync_frame(queue, &data.instances, &params);

        self.orbits.switch_strategy(data.orbit_strategy);
        self.orbits
            .sync_frame(device, &self.camera_bind_group_layout, data.camera.position());

        // Compute pass (when active) runs before the draw in the same
        // submission; the tick never waits on it
        self.points.encode_compute(encoder);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Offscreen Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            self.globe.draw(&mut render_pass);
            self.orbits.draw(&mut render_pass);
            self.points.draw(&mut render_pass);
        }
    }

    /// Blit the offscreen texture into egui's render pass.
    pub fn blit(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        render_pass.set_pipeline(&self.blit_pipeline);
        render_pass.set_bind_group(0, &self.blit_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// The callback egui_wgpu invokes each frame.
pub struct SceneCallback {
    pub viewport_size: (u32, u32),
}

impl egui_wgpu::CallbackTrait for SceneCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        egui_encoder: &mut wgpu::CommandEncoder,
        callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(resources) = callback_resources.get_mut::<SceneRenderResources>() {
            resources.resize(device, self.viewport_size.0, self.viewport_size.1);
            resources.render_offscreen(device, queue, egui_encoder);
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        callback_resources: &egui_wgpu::CallbackResources,
    ) {
        if let Some(resources) = callback_resources.get::<SceneRenderResources>() {
            resources.blit(render_pass);
        }
    }
}

const BLIT_SHADER: &str = r#"
@group(0) @binding(0) var blit_texture: texture_2d<f32>;
@group(0) @binding(1) var blit_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    // Fullscreen triangle
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );

    var out: VertexOutput;
    let pos = positions[vertex_index];
    out.clip_position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos * 0.5 + 0.5;
    out.uv.y = 1.0 - out.uv.y;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(blit_texture, blit_sampler, in.uv);
}
"#;
