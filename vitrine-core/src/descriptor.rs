use crate::render_constants::{channel, limits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("key must not be empty")]
    EmptyKey,
    #[error("key '{0}' contains characters other than letters, digits, '-', '_' or '.'")]
    InvalidKey(String),
    #[error("{pass} pass has an empty shader source")]
    EmptySource { pass: String },
    #[error("{pass} pass binds channel {index}, only 0..=3 exist")]
    ChannelOutOfRange { pass: String, index: u8 },
    #[error("{pass} pass binds channel {index} twice")]
    DuplicateChannel { pass: String, index: u8 },
    #[error("{pass} pass reads buffer '{buffer}' which is not declared")]
    UnknownBuffer { pass: String, buffer: String },
    #[error("buffer pass '{0}' is declared twice")]
    DuplicateBuffer(String),
    #[error("buffer pass name must not be empty")]
    EmptyBufferName,
    #[error("{count} buffer passes declared, at most {max} are supported")]
    TooManyBuffers { count: usize, max: usize },
    #[error("{count} parameters declared, at most {max} are supported")]
    TooManyParams { count: usize, max: usize },
    #[error("parameter '{0}' is not a valid GLSL identifier")]
    InvalidParamUniform(String),
    #[error("parameter uniform '{0}' is declared twice")]
    DuplicateParam(String),
    #[error("parameter '{name}' has an invalid range: {reason}")]
    InvalidParamRange { name: String, reason: String },
    #[error("failed to re-read {path}: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Graphics API dialect a snippet was written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[serde(rename = "webgl1")]
    WebGl1,
    #[default]
    #[serde(rename = "webgl2")]
    WebGl2,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::WebGl1 => write!(f, "webgl1"),
            ApiVersion::WebGl2 => write!(f, "webgl2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Precision {
    #[serde(rename = "lowp")]
    Low,
    #[serde(rename = "mediump")]
    Medium,
    #[default]
    #[serde(rename = "highp")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
    Mipmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wrap {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

/// Shader text as handed to the compiler, plus the file it came from (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub text: String,
    pub path: Option<PathBuf>,
}

impl ShaderSource {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            text: std::fs::read_to_string(path)?,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Current file contents, or `None` for inline text.
    fn read_file(&self) -> Result<Option<String>, DescriptorError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| DescriptorError::SourceRead {
                path: path.display().to_string(),
                source: e,
            })
    }
}

/// Where a pass draws: an offscreen buffer or the presented image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Buffer,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSource {
    Texture(PathBuf),
    Buffer(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBinding {
    pub index: u8,
    pub source: ChannelSource,
    pub filter: Filter,
    pub wrap: Wrap,
    pub vflip: bool,
}

impl ChannelBinding {
    pub fn texture(index: u8, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            source: ChannelSource::Texture(path.into()),
            filter: Filter::default(),
            wrap: Wrap::default(),
            vflip: false,
        }
    }

    pub fn buffer(index: u8, name: impl Into<String>) -> Self {
        Self {
            index,
            source: ChannelSource::Buffer(name.into()),
            filter: Filter::default(),
            wrap: Wrap::default(),
            vflip: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferPass {
    pub name: String,
    pub source: ShaderSource,
    pub channels: Vec<ChannelBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub uniform: String,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// One catalog entry: metadata, opaque shader text and its resource bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDescriptor {
    pub key: String,
    pub name: String,
    pub sort: i64,
    pub source: ShaderSource,
    pub common: Option<ShaderSource>,
    pub api: ApiVersion,
    pub precision: Precision,
    pub tags: Vec<String>,
    pub channels: Vec<ChannelBinding>,
    pub buffers: Vec<BufferPass>,
    pub params: Vec<ParamSpec>,
    pub hooks: Option<String>,
}

/// Name used for the final on-screen pass in diagnostics.
pub const IMAGE_PASS: &str = "image";

impl ShaderDescriptor {
    /// Minimal single-pass descriptor with default capabilities.
    pub fn new(key: impl Into<String>, source: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            sort: 0,
            source: ShaderSource::inline(source),
            common: None,
            api: ApiVersion::default(),
            precision: Precision::default(),
            tags: Vec::new(),
            channels: Vec::new(),
            buffers: Vec::new(),
            params: Vec::new(),
            hooks: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.tags.iter().any(|t| *t == tag)
    }

    pub fn buffer_index(&self, name: &str) -> Option<usize> {
        self.buffers.iter().position(|b| b.name == name)
    }

    pub fn param_defaults(&self) -> Vec<f32> {
        self.params.iter().map(|p| p.default).collect()
    }

    /// Every file this entry reads, in a stable order.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let sources = std::iter::once(&self.source)
            .chain(self.common.iter())
            .chain(self.buffers.iter().map(|b| &b.source));
        for source in sources {
            if let Some(path) = &source.path {
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
        for binding in self.all_channels() {
            if let ChannelSource::Texture(path) = &binding.source {
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
        paths
    }

    /// Re-read every file-backed source. Inline sources are left untouched.
    /// Nothing changes unless every file could be read.
    pub fn reload_sources(&mut self) -> Result<(), DescriptorError> {
        let fresh = std::iter::once(&self.source)
            .chain(self.common.iter())
            .chain(self.buffers.iter().map(|b| &b.source))
            .map(ShaderSource::read_file)
            .collect::<Result<Vec<_>, _>>()?;

        let sources = std::iter::once(&mut self.source)
            .chain(self.common.iter_mut())
            .chain(self.buffers.iter_mut().map(|b| &mut b.source));
        for (source, text) in sources.zip(fresh) {
            if let Some(text) = text {
                source.text = text;
            }
        }
        Ok(())
    }

    fn all_channels(&self) -> impl Iterator<Item = &ChannelBinding> {
        self.buffers
            .iter()
            .flat_map(|b| b.channels.iter())
            .chain(self.channels.iter())
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        validate_key(&self.key)?;

        if self.source.is_blank() {
            return Err(DescriptorError::EmptySource {
                pass: IMAGE_PASS.to_string(),
            });
        }

        if self.buffers.len() > limits::MAX_BUFFERS {
            return Err(DescriptorError::TooManyBuffers {
                count: self.buffers.len(),
                max: limits::MAX_BUFFERS,
            });
        }

        for (i, buffer) in self.buffers.iter().enumerate() {
            if buffer.name.trim().is_empty() {
                return Err(DescriptorError::EmptyBufferName);
            }
            if self.buffers[..i].iter().any(|b| b.name == buffer.name) {
                return Err(DescriptorError::DuplicateBuffer(buffer.name.clone()));
            }
            if buffer.source.is_blank() {
                return Err(DescriptorError::EmptySource {
                    pass: buffer.name.clone(),
                });
            }
            self.validate_channels(&buffer.name, &buffer.channels)?;
        }
        self.validate_channels(IMAGE_PASS, &self.channels)?;

        self.validate_params()
    }

    fn validate_channels(
        &self,
        pass: &str,
        channels: &[ChannelBinding],
    ) -> Result<(), DescriptorError> {
        let mut seen = [false; channel::COUNT];
        for binding in channels {
            let slot = binding.index as usize;
            if slot >= channel::COUNT {
                return Err(DescriptorError::ChannelOutOfRange {
                    pass: pass.to_string(),
                    index: binding.index,
                });
            }
            if seen[slot] {
                return Err(DescriptorError::DuplicateChannel {
                    pass: pass.to_string(),
                    index: binding.index,
                });
            }
            seen[slot] = true;

            if let ChannelSource::Buffer(name) = &binding.source {
                if self.buffer_index(name).is_none() {
                    return Err(DescriptorError::UnknownBuffer {
                        pass: pass.to_string(),
                        buffer: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_params(&self) -> Result<(), DescriptorError> {
        if self.params.len() > limits::MAX_PARAMS {
            return Err(DescriptorError::TooManyParams {
                count: self.params.len(),
                max: limits::MAX_PARAMS,
            });
        }

        for (i, param) in self.params.iter().enumerate() {
            if !is_glsl_identifier(&param.uniform) {
                return Err(DescriptorError::InvalidParamUniform(param.uniform.clone()));
            }
            if self.params[..i].iter().any(|p| p.uniform == param.uniform) {
                return Err(DescriptorError::DuplicateParam(param.uniform.clone()));
            }
            let reason = if !(param.min <= param.max) {
                Some(format!("min {} exceeds max {}", param.min, param.max))
            } else if !(param.min <= param.default && param.default <= param.max) {
                Some(format!(
                    "default {} is outside {}..={}",
                    param.default, param.min, param.max
                ))
            } else if !(param.step > 0.0) {
                Some(format!("step {} must be positive", param.step))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(DescriptorError::InvalidParamRange {
                    name: param.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), DescriptorError> {
    if key.is_empty() {
        return Err(DescriptorError::EmptyKey);
    }
    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(DescriptorError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// GLSL identifiers: ASCII letter or underscore first, no reserved `gl_`
/// prefix and no double underscore.
pub fn is_glsl_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("gl_")
        && !name.contains("__")
}
