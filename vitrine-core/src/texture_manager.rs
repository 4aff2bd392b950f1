use crate::descriptor::{Filter, Precision, Wrap};
use crate::plan::{FrameRead, SamplerSpec};
use crate::render_constants::frame_buffer;
use crate::textures::TextureData;
use std::collections::HashMap;
use wgpu::util::DeviceExt;
use wgpu::{
    Device, Queue, Sampler, SamplerDescriptor, Texture, TextureDescriptor, TextureFormat,
    TextureUsages, TextureView,
};

/// GPU textures owned by one activation: double-buffered render targets for
/// its buffer passes, and the samplers its channels ask for.
pub struct TextureManager {
    width: u32,
    height: u32,
    format: TextureFormat,
    targets: Vec<[(Texture, TextureView); frame_buffer::BUFFER_COUNT]>,
    samplers: HashMap<SamplerSpec, Sampler>,
}

impl TextureManager {
    pub fn new(
        device: &Device,
        width: u32,
        height: u32,
        precision: Precision,
        buffer_count: usize,
    ) -> Self {
        let mut manager = Self {
            width: width.max(1),
            height: height.max(1),
            format: Self::target_format(precision),
            targets: Vec::with_capacity(buffer_count),
            samplers: HashMap::new(),
        };
        manager.create_targets(device, buffer_count);
        manager
    }

    /// Render target format for buffer passes.
    pub fn target_format(precision: Precision) -> TextureFormat {
        match precision {
            Precision::High => TextureFormat::Rgba16Float,
            Precision::Low | Precision::Medium => TextureFormat::Rgba8Unorm,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Recreate every target at the new size. Buffer contents are lost.
    pub fn update_size(&mut self, device: &Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        let count = self.targets.len();
        self.targets.clear();
        self.create_targets(device, count);
        true
    }

    fn create_targets(&mut self, device: &Device, count: usize) {
        for pass in 0..count {
            let a = self.create_target(device, &format!("Buffer Target A {}", pass));
            let b = self.create_target(device, &format!("Buffer Target B {}", pass));
            self.targets.push([a, b]);
        }
    }

    fn create_target(&self, device: &Device, label: &str) -> (Texture, TextureView) {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// The half of `pass` written during `frame`.
    pub fn render_target(&self, pass: usize, frame: u64) -> Option<&TextureView> {
        self.targets
            .get(pass)
            .map(|pair| &pair[frame_buffer::current_buffer_index(frame)].1)
    }

    /// The half of `pass` a channel samples during `frame`.
    pub fn read_view(&self, pass: usize, read: FrameRead, frame: u64) -> Option<&TextureView> {
        let index = match read {
            FrameRead::Current => frame_buffer::current_buffer_index(frame),
            FrameRead::Previous => frame_buffer::previous_buffer_index(frame),
        };
        self.targets.get(pass).map(|pair| &pair[index].1)
    }

    pub fn prepare_sampler(&mut self, device: &Device, spec: SamplerSpec) {
        self.samplers
            .entry(spec)
            .or_insert_with(|| device.create_sampler(&sampler_descriptor(spec)));
    }

    pub fn sampler(&self, spec: SamplerSpec) -> Option<&Sampler> {
        self.samplers.get(&spec)
    }

    /// Upload a decoded channel image with all of its mip levels.
    pub fn upload(device: &Device, queue: &Queue, data: &TextureData) -> (Texture, TextureView) {
        let texture = device.create_texture_with_data(
            queue,
            &TextureDescriptor {
                label: Some(&data.label),
                size: wgpu::Extent3d {
                    width: data.width,
                    height: data.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: data.mip_level_count(),
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data.bytes(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

pub fn sampler_descriptor(spec: SamplerSpec) -> SamplerDescriptor<'static> {
    let address_mode = match spec.wrap {
        Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::Mirror => wgpu::AddressMode::MirrorRepeat,
    };
    let (filter, mipmap_filter) = match spec.filter {
        Filter::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        Filter::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        Filter::Mipmap => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    };
    SamplerDescriptor {
        label: Some("vitrine channel sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        ..Default::default()
    }
}
