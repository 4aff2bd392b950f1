use crate::bind_group_factory::BindGroupFactory;
use crate::descriptor::{Filter, Wrap};
use crate::plan::{ActivationPlan, PassKind, PlannedChannel, PlannedPass, SamplerSpec};
use crate::render_constants::{bind_group, channel, frame_buffer, render_pass};
use crate::renderer::{RenderBackend, RenderError, ResourceCounts};
use crate::texture_manager::{sampler_descriptor, TextureManager};
use crate::textures::TextureData;
use crate::uniforms::FrameInputs;
use crate::webgpu_context::{GpuError, WebGpuContext};
use std::borrow::Cow;

pub enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

struct GpuPass {
    name: String,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    inputs_group: wgpu::BindGroup,
}

pub struct WgpuActivation {
    key: String,
    passes: Vec<GpuPass>,
    channels: Vec<[PlannedChannel; channel::COUNT]>,
    textures: Vec<(wgpu::Texture, wgpu::TextureView)>,
    targets: TextureManager,
    /// Per pass, one channel group per frame parity.
    channel_groups: Vec<[wgpu::BindGroup; frame_buffer::BUFFER_COUNT]>,
    counts: ResourceCounts,
    frame: u64,
}

impl WgpuActivation {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Renders activations with wgpu into a window surface or an offscreen texture.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    vertex_shader: wgpu::ShaderModule,
    inputs_layout: wgpu::BindGroupLayout,
    channels_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    placeholder: (wgpu::Texture, wgpu::TextureView),
    placeholder_sampler: wgpu::Sampler,
    live: ResourceCounts,
}

impl WgpuBackend {
    pub fn with_surface(
        context: WebGpuContext,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, GpuError> {
        let caps = surface.get_capabilities(&context.adapter);
        // Shadertoy output is written as-is, so avoid an sRGB encode.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(GpuError::IncompatibleSurface)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);
        log::info!("Surface configured: {:?} {}x{}", format, config.width, config.height);

        Ok(Self::new(
            context,
            RenderTarget::Surface { surface, config },
            format,
            width,
            height,
        ))
    }

    /// Backend drawing into an RGBA8 texture that can be read back.
    pub fn offscreen(context: WebGpuContext, width: u32, height: u32) -> Self {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let texture = create_offscreen_texture(&context.device, format, width, height);
        Self::new(
            context,
            RenderTarget::Offscreen { texture },
            format,
            width,
            height,
        )
    }

    fn new(
        context: WebGpuContext,
        target: RenderTarget,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let WebGpuContext { device, queue, .. } = context;

        let vertex_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/vertex.wgsl").into()),
        });
        let inputs_layout = BindGroupFactory::create_inputs_layout(&device);
        let channels_layout = BindGroupFactory::create_channels_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&inputs_layout, &channels_layout],
            push_constant_ranges: &[],
        });
        let placeholder = TextureManager::upload(&device, &queue, &TextureData::placeholder());
        let placeholder_sampler = device.create_sampler(&sampler_descriptor(SamplerSpec {
            filter: Filter::default(),
            wrap: Wrap::default(),
        }));

        Self {
            device,
            queue,
            target,
            format,
            width: width.max(1),
            height: height.max(1),
            vertex_shader,
            inputs_layout,
            channels_layout,
            pipeline_layout,
            placeholder,
            placeholder_sampler,
            live: ResourceCounts::default(),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn create_pass(&self, key: &str, pass: &PlannedPass, format: wgpu::TextureFormat) -> GpuPass {
        let label = format!("{} ({})", key, pass.name);
        let fragment_shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Naga(Cow::Owned(pass.shader.module.clone())),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex_shader,
                    entry_point: Some(render_pass::VERTEX_ENTRY),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_shader,
                    entry_point: Some(render_pass::FRAGMENT_ENTRY),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} inputs", label)),
            size: std::mem::size_of::<FrameInputs>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut factory = BindGroupFactory::new();
        factory.add_buffer(0, &uniforms);
        let inputs_group = factory.create(&self.device, &self.inputs_layout, &label);

        GpuPass {
            name: pass.name.clone(),
            pipeline,
            uniforms,
            inputs_group,
        }
    }

    fn create_channel_groups(
        &self,
        key: &str,
        channels: &[[PlannedChannel; channel::COUNT]],
        textures: &[(wgpu::Texture, wgpu::TextureView)],
        targets: &TextureManager,
    ) -> Vec<[wgpu::BindGroup; frame_buffer::BUFFER_COUNT]> {
        channels
            .iter()
            .enumerate()
            .map(|(index, slots)| {
                [0u64, 1].map(|frame| {
                    let mut factory = BindGroupFactory::new();
                    for (slot, planned) in slots.iter().enumerate() {
                        let (view, sampler) = match planned {
                            PlannedChannel::Unbound => {
                                (&self.placeholder.1, &self.placeholder_sampler)
                            }
                            PlannedChannel::Texture { texture, sampler } => (
                                textures.get(*texture).map_or(&self.placeholder.1, |t| &t.1),
                                targets.sampler(*sampler).unwrap_or(&self.placeholder_sampler),
                            ),
                            PlannedChannel::Buffer { pass, read, sampler } => (
                                targets
                                    .read_view(*pass, *read, frame)
                                    .unwrap_or(&self.placeholder.1),
                                targets.sampler(*sampler).unwrap_or(&self.placeholder_sampler),
                            ),
                        };
                        factory.add_channel(slot, view, sampler);
                    }
                    factory.create(
                        &self.device,
                        &self.channels_layout,
                        &format!("{} pass {} channels", key, index),
                    )
                })
            })
            .collect()
    }

    /// Texture the image pass draws into this frame, plus the surface frame to present.
    fn acquire_output(
        &self,
    ) -> Result<Option<(Option<wgpu::SurfaceTexture>, wgpu::TextureView)>, RenderError> {
        match &self.target {
            RenderTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok(Some((Some(frame), view)))
                }
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::debug!("Surface lost or outdated, reconfiguring");
                    surface.configure(&self.device, config);
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            },
            RenderTarget::Offscreen { texture } => Ok(Some((
                None,
                texture.create_view(&wgpu::TextureViewDescriptor::default()),
            ))),
        }
    }

    /// Copy the offscreen target into tightly packed RGBA8 rows, top row first.
    pub fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let RenderTarget::Offscreen { texture } = &self.target else {
            return Err(RenderError::Readback(
                "only offscreen targets can be read back".to_string(),
            ));
        };
        let unpadded = 4 * self.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded * self.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        Ok(pixels)
    }
}

impl RenderBackend for WgpuBackend {
    type Activation = WgpuActivation;

    fn activate(&mut self, plan: &ActivationPlan) -> Result<WgpuActivation, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let textures: Vec<_> = plan
            .textures
            .iter()
            .map(|data| TextureManager::upload(&self.device, &self.queue, data))
            .collect();
        let mut targets = TextureManager::new(
            &self.device,
            self.width,
            self.height,
            plan.precision,
            plan.buffer_count(),
        );
        let buffer_format = TextureManager::target_format(plan.precision);

        let mut passes = Vec::with_capacity(plan.passes.len());
        for pass in &plan.passes {
            let format = match pass.kind {
                PassKind::Buffer => buffer_format,
                PassKind::Image => self.format,
            };
            passes.push(self.create_pass(&plan.key, pass, format));
            for planned in &pass.channels {
                match planned {
                    PlannedChannel::Unbound => {}
                    PlannedChannel::Texture { sampler, .. }
                    | PlannedChannel::Buffer { sampler, .. } => {
                        targets.prepare_sampler(&self.device, *sampler)
                    }
                }
            }
        }

        let channels: Vec<_> = plan.passes.iter().map(|p| p.channels).collect();
        let channel_groups = self.create_channel_groups(&plan.key, &channels, &textures, &targets);

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Pipeline {
                key: plan.key.clone(),
                message: error.to_string(),
            });
        }

        let counts = ResourceCounts::for_plan(plan);
        self.live.add(counts);
        log::info!("Activated '{}' on the GPU ({} pass(es))", plan.key, passes.len());

        Ok(WgpuActivation {
            key: plan.key.clone(),
            passes,
            channels,
            textures,
            targets,
            channel_groups,
            counts,
            frame: 0,
        })
    }

    fn render(
        &mut self,
        activation: &mut WgpuActivation,
        inputs: &[FrameInputs],
    ) -> Result<(), RenderError> {
        if inputs.len() != activation.passes.len() {
            return Err(RenderError::InputCount {
                expected: activation.passes.len(),
                actual: inputs.len(),
            });
        }

        if activation
            .targets
            .update_size(&self.device, self.width, self.height)
        {
            activation.channel_groups = self.create_channel_groups(
                &activation.key,
                &activation.channels,
                &activation.textures,
                &activation.targets,
            );
        }

        for (pass, inputs) in activation.passes.iter().zip(inputs) {
            self.queue
                .write_buffer(&pass.uniforms, 0, bytemuck::bytes_of(inputs));
        }

        let Some((surface_frame, output_view)) = self.acquire_output()? else {
            return Ok(());
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let parity = frame_buffer::current_buffer_index(activation.frame);
        let image_index = activation.passes.len() - 1;

        for (index, pass) in activation.passes.iter().enumerate() {
            let view = if index == image_index {
                &output_view
            } else {
                match activation.targets.render_target(index, activation.frame) {
                    Some(view) => view,
                    None => continue,
                }
            };
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&pass.name),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(render_pass::CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&pass.pipeline);
            rpass.set_bind_group(bind_group::INPUTS, &pass.inputs_group, &[]);
            rpass.set_bind_group(
                bind_group::CHANNELS,
                &activation.channel_groups[index][parity],
                &[],
            );
            rpass.draw(0..render_pass::VERTEX_COUNT, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = surface_frame {
            frame.present();
        }
        activation.frame += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture } => {
                *texture = create_offscreen_texture(&self.device, self.format, width, height);
            }
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self, activation: WgpuActivation) {
        self.live.remove(activation.counts);
        log::info!("Released '{}'", activation.key);
    }

    fn live_resources(&self) -> ResourceCounts {
        self.live
    }
}

fn create_offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
