use crate::descriptor::ApiVersion;
use crate::plan::PlanOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Window dimensions must be greater than 0")]
    ZeroWindow,
    #[error("At least one catalog path must be configured")]
    NoCatalogPaths,
    #[error("catalog.paths[{0}] cannot be empty")]
    EmptyCatalogPath(usize),
    #[error("catalog.tags[{0}] cannot be empty")]
    EmptyTag(usize),
    #[error("catalog.start cannot be empty")]
    EmptyStart,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Config {
    pub window: WindowConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub render: RenderConfig,
    pub hot_reload: Option<HotReloadConfig>,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogConfig {
    /// Manifest files or directories of manifests.
    pub paths: Vec<String>,
    pub start: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub struct RenderConfig {
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(default)]
    pub max_api: ApiVersion,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: default_vsync(),
            max_api: ApiVersion::default(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub struct HotReloadConfig {
    pub enabled: bool,
}

fn default_title() -> String {
    "vitrine".to_string()
}

fn default_vsync() -> bool {
    true
}

impl Config {
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.catalog.paths.is_empty() {
            return Err(ConfigError::NoCatalogPaths);
        }
        if let Some(i) = self.catalog.paths.iter().position(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyCatalogPath(i));
        }
        if let Some(i) = self.catalog.tags.iter().position(|t| t.trim().is_empty()) {
            return Err(ConfigError::EmptyTag(i));
        }
        if matches!(&self.catalog.start, Some(start) if start.trim().is_empty()) {
            return Err(ConfigError::EmptyStart);
        }
        Ok(())
    }

    /// Catalog paths resolved against the directory holding the config file.
    pub fn catalog_paths(&self, base_dir: &Path) -> Vec<PathBuf> {
        self.catalog
            .paths
            .iter()
            .map(|p| base_dir.join(p))
            .collect()
    }

    /// Tag filter, lower-cased like descriptor tags.
    pub fn tag_filter(&self) -> Vec<String> {
        self.catalog.tags.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.hot_reload.is_some_and(|h| h.enabled)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            max_api: self.render.max_api,
        }
    }
}
