mod bind_group_factory;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod gallery;
pub mod hooks;
pub mod hot_reload;
pub mod plan;
pub mod render_constants;
pub mod renderer;
pub mod shader_preprocessor;
pub mod texture_manager;
pub mod textures;
pub mod timer;
pub mod uniforms;
pub mod webgpu_context;
pub mod wgpu_renderer;

pub use crate::catalog::{Catalog, CatalogError};
pub use crate::compiler::{CompileError, CompiledShader, ShaderCompiler};
pub use crate::config::{Config, ConfigError};
pub use crate::descriptor::{
    ApiVersion, BufferPass, ChannelBinding, ChannelSource, DescriptorError, Filter, ParamSpec,
    PassKind, Precision, ShaderDescriptor, ShaderSource, Wrap,
};
pub use crate::gallery::{Gallery, GalleryError};
pub use crate::hooks::{
    EntryHooks, FrameContext, FrameUpdate, HookContext, HookRegistry, ParamPanel, WidgetOwner,
};
pub use crate::hot_reload::{ChangeSource, HotReloader, MockHotReloader};
pub use crate::plan::{ActivationError, ActivationPlan, PlanOptions};
pub use crate::renderer::{HeadlessBackend, RenderBackend, RenderError, ResourceCounts};
pub use crate::timer::Timer;
pub use crate::uniforms::{FrameInputs, MouseState};
pub use crate::webgpu_context::{GpuError, WebGpuContext};
pub use crate::wgpu_renderer::WgpuBackend;
