use crate::render_constants::channel;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, Device, Sampler, TextureView,
};

/// Collects bind group entries for one pass and creates the group against
/// one of the two fixed layouts below.
pub struct BindGroupFactory<'a> {
    pub entries: Vec<BindGroupEntry<'a>>,
}

impl<'a> BindGroupFactory<'a> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    pub fn add_buffer(&mut self, binding_index: u32, buffer: &'a Buffer) {
        self.entries.push(BindGroupEntry {
            binding: binding_index,
            resource: buffer.as_entire_binding(),
        });
    }

    /// Texture and sampler pair for `iChannel{slot}`.
    pub fn add_channel(&mut self, slot: usize, view: &'a TextureView, sampler: &'a Sampler) {
        self.entries.push(BindGroupEntry {
            binding: channel::texture_binding(slot),
            resource: wgpu::BindingResource::TextureView(view),
        });
        self.entries.push(BindGroupEntry {
            binding: channel::sampler_binding(slot),
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }

    pub fn create(&self, device: &Device, layout: &BindGroupLayout, label: &str) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            layout,
            entries: &self.entries,
            label: Some(label),
        })
    }

    /// Layout of the frame inputs group: one uniform buffer at binding 0.
    pub fn create_inputs_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: &inputs_layout_entries(),
            label: Some("vitrine_inputs_bind_group_layout"),
        })
    }

    /// Layout of the channel group: a filterable 2D texture and a sampler per slot.
    pub fn create_channels_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: &channel_layout_entries(),
            label: Some("vitrine_channels_bind_group_layout"),
        })
    }
}

impl Default for BindGroupFactory<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn inputs_layout_entries() -> Vec<BindGroupLayoutEntry> {
    vec![BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }]
}

fn channel_layout_entries() -> Vec<BindGroupLayoutEntry> {
    (0..channel::COUNT)
        .flat_map(|slot| {
            [
                BindGroupLayoutEntry {
                    binding: channel::texture_binding(slot),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: channel::sampler_binding(slot),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect()
}
