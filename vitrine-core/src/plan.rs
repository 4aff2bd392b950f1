//! Activation planning: everything about activating an entry that does not
//! need a GPU. Passes are wrapped and compiled, channels resolved in declared
//! order and textures decoded, so a backend only has to upload and bind.

use crate::compiler::{CompileError, CompiledShader, ShaderCompiler};
use crate::descriptor::{
    ApiVersion, ChannelBinding, ChannelSource, DescriptorError, Filter, ParamSpec, Precision,
    ShaderDescriptor, Wrap, IMAGE_PASS,
};
pub use crate::descriptor::PassKind;
use crate::render_constants::channel;
use crate::renderer::RenderError;
use crate::textures::TextureData;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Entry '{key}' requires {required} but the renderer supports up to {supported}")]
    UnsupportedApi {
        key: String,
        required: ApiVersion,
        supported: ApiVersion,
    },
    #[error("Entry '{key}' is invalid: {source}")]
    Descriptor {
        key: String,
        #[source]
        source: DescriptorError,
    },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("GPU setup failed for '{key}': {source}")]
    Backend {
        key: String,
        #[source]
        source: RenderError,
    },
}

impl ActivationError {
    /// Identifier of the entry that failed.
    pub fn key(&self) -> &str {
        match self {
            ActivationError::UnsupportedApi { key, .. } => key,
            ActivationError::Descriptor { key, .. } => key,
            ActivationError::Compile(e) => &e.key,
            ActivationError::Backend { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanOptions {
    pub max_api: ApiVersion,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_api: ApiVersion::WebGl2,
        }
    }
}

/// Which half of a double-buffered pass a channel samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// Output written earlier in the same frame.
    Current,
    /// Output of the previous frame (self or later passes).
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerSpec {
    pub filter: Filter,
    pub wrap: Wrap,
}

impl From<&ChannelBinding> for SamplerSpec {
    fn from(binding: &ChannelBinding) -> Self {
        Self {
            filter: binding.filter,
            wrap: binding.wrap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlannedChannel {
    Unbound,
    Texture {
        texture: usize,
        sampler: SamplerSpec,
    },
    Buffer {
        pass: usize,
        read: FrameRead,
        sampler: SamplerSpec,
    },
}

#[derive(Debug, Clone)]
pub struct PlannedPass {
    pub name: String,
    pub kind: PassKind,
    pub shader: CompiledShader,
    pub channels: [PlannedChannel; channel::COUNT],
}

#[derive(Debug, Clone)]
pub struct ActivationPlan {
    pub key: String,
    pub name: String,
    pub precision: Precision,
    /// Buffer passes in declaration order, then the image pass.
    pub passes: Vec<PlannedPass>,
    pub textures: Vec<TextureData>,
    pub params: Vec<ParamSpec>,
}

impl ActivationPlan {
    pub fn build(
        descriptor: &ShaderDescriptor,
        options: &PlanOptions,
    ) -> Result<Self, ActivationError> {
        let key = descriptor.key.clone();
        if descriptor.api > options.max_api {
            return Err(ActivationError::UnsupportedApi {
                key,
                required: descriptor.api,
                supported: options.max_api,
            });
        }
        descriptor
            .validate()
            .map_err(|e| ActivationError::Descriptor {
                key: key.clone(),
                source: e,
            })?;

        let compiler = ShaderCompiler::new(descriptor);
        let mut textures = TextureSet::default();
        let mut passes = Vec::with_capacity(descriptor.buffers.len() + 1);

        let pass_sources = descriptor
            .buffers
            .iter()
            .map(|b| (b.name.as_str(), PassKind::Buffer, &b.source.text, &b.channels))
            .chain(std::iter::once((
                IMAGE_PASS,
                PassKind::Image,
                &descriptor.source.text,
                &descriptor.channels,
            )));

        for (pass_index, (name, kind, text, bindings)) in pass_sources.enumerate() {
            let shader = compiler.compile(name, kind, text)?;
            let mut channels = [PlannedChannel::Unbound; channel::COUNT];
            for binding in bindings {
                channels[binding.index as usize] =
                    resolve_channel(descriptor, pass_index, binding, &mut textures);
            }
            passes.push(PlannedPass {
                name: name.to_string(),
                kind,
                shader,
                channels,
            });
        }

        log::info!(
            "Planned '{}': {} pass(es), {} texture(s)",
            descriptor.key,
            passes.len(),
            textures.textures.len()
        );

        Ok(Self {
            key,
            name: descriptor.name.clone(),
            precision: descriptor.precision,
            passes,
            textures: textures.textures,
            params: descriptor.params.clone(),
        })
    }

    pub fn buffer_count(&self) -> usize {
        self.passes.len() - 1
    }

    pub fn image_pass(&self) -> &PlannedPass {
        &self.passes[self.passes.len() - 1]
    }

    /// Channel bindings that reference a texture or buffer, over all passes.
    pub fn bound_channel_count(&self) -> usize {
        self.passes
            .iter()
            .flat_map(|p| p.channels.iter())
            .filter(|c| !matches!(c, PlannedChannel::Unbound))
            .count()
    }

    /// `iChannelResolution` for one pass. Buffer passes render at viewport size.
    pub fn channel_resolution(&self, pass: usize, viewport: (u32, u32)) -> [[f32; 4]; 4] {
        let mut resolution = [[0.0; 4]; 4];
        let Some(planned) = self.passes.get(pass) else {
            return resolution;
        };
        for (slot, planned_channel) in planned.channels.iter().enumerate() {
            resolution[slot] = match planned_channel {
                PlannedChannel::Unbound => [0.0; 4],
                PlannedChannel::Texture { texture, .. } => {
                    let data = &self.textures[*texture];
                    [data.width as f32, data.height as f32, 1.0, 0.0]
                }
                PlannedChannel::Buffer { .. } => [viewport.0 as f32, viewport.1 as f32, 1.0, 0.0],
            };
        }
        resolution
    }
}

#[derive(Default)]
struct TextureSet {
    keys: Vec<(PathBuf, bool, bool)>,
    textures: Vec<TextureData>,
}

impl TextureSet {
    fn get_or_load(&mut self, path: &PathBuf, vflip: bool, mipmaps: bool) -> usize {
        let key = (path.clone(), vflip, mipmaps);
        if let Some(index) = self.keys.iter().position(|k| *k == key) {
            return index;
        }
        self.keys.push(key);
        self.textures.push(TextureData::load(path, vflip, mipmaps));
        self.textures.len() - 1
    }
}

fn resolve_channel(
    descriptor: &ShaderDescriptor,
    pass_index: usize,
    binding: &ChannelBinding,
    textures: &mut TextureSet,
) -> PlannedChannel {
    let sampler = SamplerSpec::from(binding);
    match &binding.source {
        ChannelSource::Texture(path) => PlannedChannel::Texture {
            texture: textures.get_or_load(path, binding.vflip, binding.filter == Filter::Mipmap),
            sampler,
        },
        ChannelSource::Buffer(name) => {
            // Validation guarantees the buffer exists.
            let pass = descriptor.buffer_index(name).unwrap_or_default();
            let read = if pass < pass_index {
                FrameRead::Current
            } else {
                FrameRead::Previous
            };
            PlannedChannel::Buffer {
                pass,
                read,
                sampler,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BufferPass, ShaderSource};

    const SNIPPET: &str = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = texture(iChannel0, fragCoord / iResolution.xy);
}
"#;

    fn multipass() -> ShaderDescriptor {
        let mut descriptor = ShaderDescriptor::new("feedback", SNIPPET);
        descriptor.buffers = vec![
            BufferPass {
                name: "A".to_string(),
                source: ShaderSource::inline(SNIPPET),
                channels: vec![ChannelBinding::buffer(0, "A"), ChannelBinding::buffer(1, "B")],
            },
            BufferPass {
                name: "B".to_string(),
                source: ShaderSource::inline(SNIPPET),
                channels: vec![ChannelBinding::buffer(0, "A")],
            },
        ];
        descriptor.channels = vec![
            ChannelBinding::buffer(0, "B"),
            ChannelBinding::texture(2, "/missing/noise.png"),
        ];
        descriptor
    }

    #[test]
    fn test_pass_order_buffers_then_image() {
        let plan = ActivationPlan::build(&multipass(), &PlanOptions::default()).unwrap();
        let names: Vec<&str> = plan.passes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "image"]);
        assert_eq!(plan.buffer_count(), 2);
        assert_eq!(plan.image_pass().kind, PassKind::Image);
    }

    #[test]
    fn test_buffer_reads_follow_pass_order() {
        let plan = ActivationPlan::build(&multipass(), &PlanOptions::default()).unwrap();
        let read = |pass: usize, slot: usize| match plan.passes[pass].channels[slot] {
            PlannedChannel::Buffer { pass, read, .. } => (pass, read),
            other => panic!("expected buffer channel, got {:?}", other),
        };

        // A reads itself and the later B: previous frame.
        assert_eq!(read(0, 0), (0, FrameRead::Previous));
        assert_eq!(read(0, 1), (1, FrameRead::Previous));
        // B reads the earlier A: this frame.
        assert_eq!(read(1, 0), (0, FrameRead::Current));
        // Image reads B: this frame.
        assert_eq!(read(2, 0), (1, FrameRead::Current));
    }

    #[test]
    fn test_missing_texture_degrades_to_placeholder() {
        let plan = ActivationPlan::build(&multipass(), &PlanOptions::default()).unwrap();
        assert_eq!(plan.textures.len(), 1);
        assert!(plan.textures[0].placeholder);
        assert!(matches!(
            plan.image_pass().channels[2],
            PlannedChannel::Texture { texture: 0, .. }
        ));
        assert_eq!(plan.image_pass().channels[1], PlannedChannel::Unbound);
        assert_eq!(plan.bound_channel_count(), 5);
    }

    #[test]
    fn test_channel_resolution() {
        let plan = ActivationPlan::build(&multipass(), &PlanOptions::default()).unwrap();
        let resolution = plan.channel_resolution(2, (640, 360));
        assert_eq!(resolution[0], [640.0, 360.0, 1.0, 0.0]);
        assert_eq!(resolution[1], [0.0; 4]);
        assert_eq!(resolution[2], [8.0, 8.0, 1.0, 0.0]);
    }

    #[test]
    fn test_textures_are_shared() {
        let mut descriptor = ShaderDescriptor::new("shared", SNIPPET);
        descriptor.channels = vec![
            ChannelBinding::texture(0, "/missing/a.png"),
            ChannelBinding::texture(1, "/missing/a.png"),
            ChannelBinding {
                vflip: true,
                ..ChannelBinding::texture(2, "/missing/a.png")
            },
        ];
        let plan = ActivationPlan::build(&descriptor, &PlanOptions::default()).unwrap();
        assert_eq!(plan.textures.len(), 2);
    }

    #[test]
    fn test_unsupported_api() {
        let descriptor = ShaderDescriptor::new("modern", SNIPPET);
        let options = PlanOptions {
            max_api: ApiVersion::WebGl1,
        };
        let err = ActivationPlan::build(&descriptor, &options).unwrap_err();
        assert_eq!(err.key(), "modern");
        assert!(matches!(err, ActivationError::UnsupportedApi { .. }));
    }

    #[test]
    fn test_compile_error_in_buffer_pass_names_pass() {
        let mut descriptor = multipass();
        descriptor.buffers[1].source =
            ShaderSource::inline("void mainImage(out vec4 c, in vec2 p) { c = }");
        match ActivationPlan::build(&descriptor, &PlanOptions::default()) {
            Err(ActivationError::Compile(e)) => {
                assert_eq!(e.key, "feedback");
                assert_eq!(e.pass, "B");
            }
            other => panic!("expected compile error, got {:?}", other.map(|p| p.key)),
        }
    }
}
