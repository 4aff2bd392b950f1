//! Catalog loading: TOML manifests of `[[entry]]` tables turned into sorted,
//! validated [`ShaderDescriptor`]s with unique keys.

use crate::descriptor::{
    ApiVersion, BufferPass, ChannelBinding, ChannelSource, DescriptorError, Filter, ParamSpec,
    Precision, ShaderDescriptor, ShaderSource, Wrap,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Entry '{key}' in {origin} is invalid: {reason}")]
    Invalid {
        key: String,
        origin: String,
        reason: String,
    },
    #[error("Entry '{key}' in {origin} is invalid: {source}")]
    Descriptor {
        key: String,
        origin: String,
        #[source]
        source: DescriptorError,
    },
    #[error("Duplicate entry key '{key}': declared in {first} and {second}")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },
    #[error("No catalog entries found in {0}")]
    Empty(String),
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    entry: Vec<EntryManifest>,
}

#[derive(Debug, Deserialize)]
struct EntryManifest {
    key: String,
    name: Option<String>,
    #[serde(default)]
    sort: i64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    api: ApiVersion,
    #[serde(default)]
    precision: Precision,
    source: Option<String>,
    file: Option<String>,
    common: Option<String>,
    common_source: Option<String>,
    hooks: Option<String>,
    #[serde(default)]
    channel: Vec<ChannelManifest>,
    #[serde(default)]
    buffer: Vec<BufferManifest>,
    #[serde(default)]
    param: Vec<ParamManifest>,
}

#[derive(Debug, Deserialize)]
struct ChannelManifest {
    index: u8,
    texture: Option<String>,
    buffer: Option<String>,
    #[serde(default)]
    filter: Filter,
    #[serde(default)]
    wrap: Wrap,
    #[serde(default)]
    vflip: bool,
}

#[derive(Debug, Deserialize)]
struct BufferManifest {
    name: String,
    source: Option<String>,
    file: Option<String>,
    #[serde(default)]
    channel: Vec<ChannelManifest>,
}

#[derive(Debug, Deserialize)]
struct ParamManifest {
    name: String,
    uniform: Option<String>,
    default: f32,
    #[serde(default)]
    min: Option<f32>,
    #[serde(default)]
    max: Option<f32>,
    #[serde(default = "default_step")]
    step: f32,
}

fn default_step() -> f32 {
    0.01
}

/// Resolves manifest-relative paths and tags errors with the entry and origin.
struct EntryReader<'a> {
    base_dir: &'a Path,
    origin: &'a str,
    key: &'a str,
}

impl EntryReader<'_> {
    fn invalid(&self, reason: impl Into<String>) -> CatalogError {
        CatalogError::Invalid {
            key: self.key.to_string(),
            origin: self.origin.to_string(),
            reason: reason.into(),
        }
    }

    fn read_file(&self, relative: &str) -> Result<ShaderSource, CatalogError> {
        let path = self.base_dir.join(relative);
        ShaderSource::from_file(&path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    fn source(
        &self,
        pass: &str,
        inline: Option<String>,
        file: Option<String>,
    ) -> Result<ShaderSource, CatalogError> {
        match (inline, file) {
            (Some(text), None) => Ok(ShaderSource::inline(text)),
            (None, Some(file)) => self.read_file(&file),
            (Some(_), Some(_)) => Err(self.invalid(format!(
                "{pass} pass declares both 'source' and 'file'"
            ))),
            (None, None) => Err(self.invalid(format!(
                "{pass} pass needs either 'source' or 'file'"
            ))),
        }
    }

    fn channel(&self, manifest: ChannelManifest) -> Result<ChannelBinding, CatalogError> {
        let source = match (manifest.texture, manifest.buffer) {
            (Some(texture), None) => ChannelSource::Texture(self.base_dir.join(texture)),
            (None, Some(buffer)) => ChannelSource::Buffer(buffer),
            _ => {
                return Err(self.invalid(format!(
                    "channel {} must name exactly one of 'texture' or 'buffer'",
                    manifest.index
                )));
            }
        };
        Ok(ChannelBinding {
            index: manifest.index,
            source,
            filter: manifest.filter,
            wrap: manifest.wrap,
            vflip: manifest.vflip,
        })
    }

    fn channels(
        &self,
        manifests: Vec<ChannelManifest>,
    ) -> Result<Vec<ChannelBinding>, CatalogError> {
        manifests.into_iter().map(|c| self.channel(c)).collect()
    }

    fn param(&self, manifest: ParamManifest) -> ParamSpec {
        let min = manifest.min.unwrap_or(manifest.default.min(0.0));
        let max = manifest.max.unwrap_or(manifest.default.max(1.0));
        ParamSpec {
            uniform: manifest.uniform.unwrap_or_else(|| manifest.name.clone()),
            name: manifest.name,
            default: manifest.default,
            min,
            max,
            step: manifest.step,
        }
    }

    fn descriptor(&self, entry: EntryManifest) -> Result<ShaderDescriptor, CatalogError> {
        let source = self.source(crate::descriptor::IMAGE_PASS, entry.source, entry.file)?;
        let common = match (entry.common_source, entry.common) {
            (Some(text), None) => Some(ShaderSource::inline(text)),
            (None, Some(file)) => Some(self.read_file(&file)?),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(self.invalid("declares both 'common' and 'common_source'"));
            }
        };

        let buffers = entry
            .buffer
            .into_iter()
            .map(|b| {
                Ok(BufferPass {
                    source: self.source(&b.name, b.source, b.file)?,
                    channels: self.channels(b.channel)?,
                    name: b.name,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let descriptor = ShaderDescriptor {
            name: entry.name.unwrap_or_else(|| entry.key.clone()),
            key: entry.key,
            sort: entry.sort,
            source,
            common,
            api: entry.api,
            precision: entry.precision,
            tags: Vec::new(),
            channels: self.channels(entry.channel)?,
            buffers,
            params: entry.param.into_iter().map(|p| self.param(p)).collect(),
            hooks: entry.hooks,
        }
        .with_tags(entry.tags);

        descriptor
            .validate()
            .map_err(|e| CatalogError::Descriptor {
                key: descriptor.key.clone(),
                origin: self.origin.to_string(),
                source: e,
            })?;
        Ok(descriptor)
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    descriptor: ShaderDescriptor,
    origin: String,
}

/// Ordered, key-unique collection of every gallery entry.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Load every manifest named by `paths`. Directories contribute all of
    /// their `*.toml` files in file-name order.
    pub fn load(paths: &[PathBuf]) -> Result<Self, CatalogError> {
        let mut loaded = Vec::new();
        for path in paths {
            for manifest in manifest_files(path)? {
                let text = std::fs::read_to_string(&manifest).map_err(|e| CatalogError::Io {
                    path: manifest.display().to_string(),
                    source: e,
                })?;
                let base_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
                let origin = manifest.display().to_string();
                loaded.extend(parse_manifest(&text, base_dir, &origin)?);
            }
        }

        if loaded.is_empty() {
            let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            return Err(CatalogError::Empty(names.join(", ")));
        }

        let catalog = Self::build(loaded)?;
        log::info!("Loaded {} catalog entries", catalog.len());
        Ok(catalog)
    }

    /// Parse a single manifest held in memory. Relative paths resolve
    /// against `base_dir`; `origin` names the manifest in error messages.
    pub fn from_manifest_str(
        text: &str,
        base_dir: &Path,
        origin: &str,
    ) -> Result<Self, CatalogError> {
        Self::build(parse_manifest(text, base_dir, origin)?)
    }

    pub fn from_descriptors(descriptors: Vec<ShaderDescriptor>) -> Result<Self, CatalogError> {
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            descriptor
                .validate()
                .map_err(|e| CatalogError::Descriptor {
                    key: descriptor.key.clone(),
                    origin: "<memory>".to_string(),
                    source: e,
                })?;
            entries.push(CatalogEntry {
                descriptor,
                origin: "<memory>".to_string(),
            });
        }
        Self::build(entries)
    }

    fn build(mut entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        {
            let mut seen: HashMap<&str, &str> = HashMap::new();
            for entry in &entries {
                if let Some(first) = seen.insert(&entry.descriptor.key, &entry.origin) {
                    return Err(CatalogError::DuplicateKey {
                        key: entry.descriptor.key.clone(),
                        first: first.to_string(),
                        second: entry.origin.clone(),
                    });
                }
            }
        }

        // Stable: equal sort keys keep load order.
        entries.sort_by_key(|e| e.descriptor.sort);
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.descriptor.key.clone(), i))
            .collect();
        Ok(Self { entries, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ShaderDescriptor> {
        self.position(key).map(|i| &self.entries[i].descriptor)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ShaderDescriptor> {
        let i = self.position(key)?;
        Some(&mut self.entries[i].descriptor)
    }

    pub fn get_index(&self, index: usize) -> Option<&ShaderDescriptor> {
        self.entries.get(index).map(|e| &e.descriptor)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Manifest the entry was loaded from.
    pub fn origin(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].origin.as_str())
    }

    /// Descriptors in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ShaderDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|d| d.key.as_str())
    }

    /// Entries carrying any of `tags`, in display order.
    pub fn with_tags<'a>(
        &'a self,
        tags: &'a [String],
    ) -> impl Iterator<Item = &'a ShaderDescriptor> {
        self.iter().filter(move |d| tags.iter().any(|t| d.has_tag(t)))
    }

    /// Keep only the entries carrying any of `tags`. An empty list keeps everything.
    pub fn retain_tags(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        self.entries
            .retain(|e| tags.iter().any(|t| e.descriptor.has_tag(t)));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.descriptor.key.clone(), i))
            .collect();
    }

    pub fn next_after(&self, index: usize) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        Some((index + 1) % self.entries.len())
    }

    pub fn prev_before(&self, index: usize) -> Option<usize> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        Some((index % len + len - 1) % len)
    }
}

fn parse_manifest(
    text: &str,
    base_dir: &Path,
    origin: &str,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let manifest: Manifest = toml::from_str(text).map_err(|e| CatalogError::Parse {
        path: origin.to_string(),
        source: e,
    })?;

    manifest
        .entry
        .into_iter()
        .map(|entry| {
            let key = entry.key.clone();
            let reader = EntryReader {
                base_dir,
                origin,
                key: &key,
            };
            Ok(CatalogEntry {
                descriptor: reader.descriptor(entry)?,
                origin: origin.to_string(),
            })
        })
        .collect()
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let io_error = |e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_error)? {
        let entry_path = entry.map_err(io_error)?.path();
        if entry_path.is_file() && entry_path.extension().is_some_and(|ext| ext == "toml") {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SNIPPET: &str = "void mainImage(out vec4 c, in vec2 p) { c = vec4(p, 0.0, 1.0); }";

    fn descriptor(key: &str, sort: i64) -> ShaderDescriptor {
        let mut d = ShaderDescriptor::new(key, SNIPPET);
        d.sort = sort;
        d
    }

    #[test]
    fn test_sorted_by_ordering_key_stable_on_ties() {
        let catalog = Catalog::from_descriptors(vec![
            descriptor("c", 5),
            descriptor("a", 1),
            descriptor("b", 5),
            descriptor("z", -3),
        ])
        .unwrap();

        let keys: Vec<&str> = catalog.keys().collect();
        assert_eq!(keys, vec!["z", "a", "c", "b"]);
        assert_eq!(catalog.position("c"), Some(2));
        assert_eq!(catalog.get("b").unwrap().sort, 5);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_keys_fail_fast() {
        let result = Catalog::from_descriptors(vec![descriptor("dup", 1), descriptor("dup", 2)]);
        match result {
            Err(CatalogError::DuplicateKey { key, .. }) => assert_eq!(key, "dup"),
            other => panic!("expected duplicate key error, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_manifest() {
        let text = r#"
[[entry]]
key = "plasma"
name = "Plasma"
sort = 2
tags = ["Color"]
source = "void mainImage(out vec4 c, in vec2 p) { c = vec4(1.0); }"

[[entry.param]]
name = "Speed"
uniform = "SPEED"
default = 1.5
max = 4.0

[[entry]]
key = "grid"
sort = 1
api = "webgl1"
precision = "mediump"
source = "void mainImage(out vec4 c, in vec2 p) { c = vec4(0.0); }"
"#;
        let catalog = Catalog::from_manifest_str(text, Path::new("."), "inline.toml").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["grid", "plasma"]);

        let grid = catalog.get("grid").unwrap();
        assert_eq!(grid.name, "grid");
        assert_eq!(grid.api, ApiVersion::WebGl1);
        assert_eq!(grid.precision, Precision::Medium);

        let plasma = catalog.get("plasma").unwrap();
        assert_eq!(plasma.tags, vec!["color"]);
        assert_eq!(plasma.params[0].min, 0.0);
        assert_eq!(plasma.params[0].max, 4.0);
        assert_eq!(catalog.origin("plasma"), Some("inline.toml"));
    }

    #[test]
    fn test_source_and_file_are_exclusive() {
        let text = r#"
[[entry]]
key = "both"
source = "void mainImage(out vec4 c, in vec2 p) {}"
file = "both.glsl"
"#;
        let result = Catalog::from_manifest_str(text, Path::new("."), "m.toml");
        assert!(matches!(result, Err(CatalogError::Invalid { .. })));
    }

    #[test]
    fn test_channel_needs_exactly_one_source() {
        let text = r#"
[[entry]]
key = "chan"
source = "void mainImage(out vec4 c, in vec2 p) {}"

[[entry.channel]]
index = 0
"#;
        let err = Catalog::from_manifest_str(text, Path::new("."), "m.toml").unwrap_err();
        assert!(err.to_string().contains("exactly one of 'texture' or 'buffer'"));
    }

    #[test]
    fn test_empty_source_reported_with_key() {
        let text = r#"
[[entry]]
key = "hollow"
source = "   "
"#;
        let err = Catalog::from_manifest_str(text, Path::new("."), "m.toml").unwrap_err();
        match err {
            CatalogError::Descriptor { key, source, .. } => {
                assert_eq!(key, "hollow");
                assert!(matches!(source, DescriptorError::EmptySource { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_load_directory_and_detect_cross_file_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wave.glsl"), SNIPPET).unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[[entry]]\nkey = \"wave\"\nfile = \"wave.glsl\"\n\n[[entry.channel]]\nindex = 0\ntexture = \"tex/noise.png\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let catalog = Catalog::load(&[dir.path().to_path_buf()]).unwrap();
        let wave = catalog.get("wave").unwrap();
        assert_eq!(wave.source.text, SNIPPET);
        assert_eq!(wave.source.path, Some(dir.path().join("wave.glsl")));
        assert_eq!(
            wave.channels[0].source,
            ChannelSource::Texture(dir.path().join("tex/noise.png"))
        );

        fs::write(
            dir.path().join("b.toml"),
            "[[entry]]\nkey = \"wave\"\nsource = \"void mainImage(out vec4 c, in vec2 p) {}\"\n",
        )
        .unwrap();
        match Catalog::load(&[dir.path().to_path_buf()]) {
            Err(CatalogError::DuplicateKey { first, second, .. }) => {
                assert!(first.ends_with("a.toml"));
                assert!(second.ends_with("b.toml"));
            }
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_shader_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("gallery.toml"),
            "[[entry]]\nkey = \"ghost\"\nfile = \"ghost.glsl\"\n",
        )
        .unwrap();
        let result = Catalog::load(&[dir.path().join("gallery.toml")]);
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Catalog::load(&[dir.path().to_path_buf()]),
            Err(CatalogError::Empty(_))
        ));
    }

    #[test]
    fn test_tag_filtering() {
        let mut catalog = Catalog::from_descriptors(vec![
            descriptor("a", 1).with_tags(["fractal"]),
            descriptor("b", 2).with_tags(["noise"]),
            descriptor("c", 3).with_tags(["noise", "fractal"]),
        ])
        .unwrap();

        let tags = vec!["noise".to_string()];
        let keys: Vec<&str> = catalog.with_tags(&tags).map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);

        catalog.retain_tags(&["fractal".to_string()]);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(catalog.position("c"), Some(1));
        assert_eq!(catalog.position("b"), None);
    }

    #[test]
    fn test_wraparound_navigation() {
        let catalog = Catalog::from_descriptors(vec![
            descriptor("a", 1),
            descriptor("b", 2),
            descriptor("c", 3),
        ])
        .unwrap();
        assert_eq!(catalog.next_after(0), Some(1));
        assert_eq!(catalog.next_after(2), Some(0));
        assert_eq!(catalog.prev_before(0), Some(2));
        assert_eq!(catalog.prev_before(1), Some(0));

        let empty = Catalog::default();
        assert_eq!(empty.next_after(0), None);
        assert_eq!(empty.prev_before(0), None);
    }
}
