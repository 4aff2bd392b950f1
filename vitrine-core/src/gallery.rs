//! The catalog browser: owns the catalog, the hook registry and a render
//! backend, and keeps at most one entry active at a time.

use crate::catalog::Catalog;
use crate::hooks::{
    EntryHooks, FrameContext, FrameUpdate, HookContext, HookRegistry, NoHooks, ParamPanel,
};
use crate::plan::{ActivationError, ActivationPlan, PlanOptions};
use crate::renderer::{RenderBackend, RenderError};
use crate::timer::Timer;
use crate::uniforms::{local_date, FrameInputs, MouseState};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("No catalog entry '{0}'")]
    UnknownEntry(String),
    #[error("Entry '{key}' uses unknown hook set '{hook}'")]
    UnknownHook { key: String, hook: String },
    #[error("Failed to activate '{key}': {source}")]
    Activation {
        key: String,
        #[source]
        source: ActivationError,
    },
    #[error("Failed to render '{key}': {source}")]
    Render {
        key: String,
        #[source]
        source: RenderError,
    },
}

impl GalleryError {
    /// Entry the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            GalleryError::UnknownEntry(_) => None,
            GalleryError::UnknownHook { key, .. }
            | GalleryError::Activation { key, .. }
            | GalleryError::Render { key, .. } => Some(key),
        }
    }
}

struct ActiveEntry<A> {
    key: String,
    plan: ActivationPlan,
    activation: A,
    hooks: Box<dyn EntryHooks>,
    update: FrameUpdate,
    frame: u64,
}

pub struct Gallery<B: RenderBackend> {
    catalog: Catalog,
    registry: HookRegistry,
    backend: B,
    options: PlanOptions,
    active: Option<ActiveEntry<B::Activation>>,
    cursor: Option<usize>,
    timer: Timer,
    mouse: MouseState,
    panel: ParamPanel,
    last_error: Option<String>,
}

impl<B: RenderBackend> Gallery<B> {
    /// Every hook set the catalog names must be registered.
    pub fn new(
        catalog: Catalog,
        registry: HookRegistry,
        backend: B,
        options: PlanOptions,
    ) -> Result<Self, GalleryError> {
        for descriptor in catalog.iter() {
            if let Some(hook) = &descriptor.hooks {
                if !registry.contains(hook) {
                    return Err(GalleryError::UnknownHook {
                        key: descriptor.key.clone(),
                        hook: hook.clone(),
                    });
                }
            }
        }

        Ok(Self {
            catalog,
            registry,
            backend,
            options,
            active: None,
            cursor: None,
            timer: Timer::new(),
            mouse: MouseState::new(),
            panel: ParamPanel::new(),
            last_error: None,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn panel(&self) -> &ParamPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ParamPanel {
        &mut self.panel
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }

    /// Catalog position of the active entry, or of the entry that last failed.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Files the entry under the cursor reads.
    pub fn cursor_source_paths(&self) -> Vec<PathBuf> {
        self.cursor
            .and_then(|i| self.catalog.get_index(i))
            .map(|d| d.source_paths())
            .unwrap_or_default()
    }

    pub fn select(&mut self, key: &str) -> Result<(), GalleryError> {
        let index = self
            .catalog
            .position(key)
            .ok_or_else(|| GalleryError::UnknownEntry(key.to_string()))?;
        self.select_index(index)
    }

    /// Tear down the active entry, then build and bind the one at `index`.
    pub fn select_index(&mut self, index: usize) -> Result<(), GalleryError> {
        let Some(descriptor) = self.catalog.get_index(index) else {
            return Err(GalleryError::UnknownEntry(format!("#{}", index)));
        };
        let key = descriptor.key.clone();

        self.deactivate();
        self.cursor = Some(index);

        let Some(descriptor) = self.catalog.get_index(index) else {
            return Err(GalleryError::UnknownEntry(key));
        };
        let plan = match ActivationPlan::build(descriptor, &self.options) {
            Ok(plan) => plan,
            Err(source) => return Err(self.fail(key, source)),
        };
        self.start(index, plan)
    }

    pub fn next(&mut self) -> Result<(), GalleryError> {
        let index = match self.cursor {
            Some(i) => self.catalog.next_after(i),
            None => (!self.catalog.is_empty()).then_some(0),
        };
        match index {
            Some(i) => self.select_index(i),
            None => Ok(()),
        }
    }

    pub fn prev(&mut self) -> Result<(), GalleryError> {
        let index = match self.cursor {
            Some(i) => self.catalog.prev_before(i),
            None => self.catalog.len().checked_sub(1),
        };
        match index {
            Some(i) => self.select_index(i),
            None => Ok(()),
        }
    }

    /// Re-read the entry under the cursor from disk and rebuild it.
    ///
    /// The new programs are activated before the running ones are released,
    /// so a compile or pipeline failure leaves the running activation in
    /// place and returns the error. Hooks and their per-frame state survive,
    /// the clock keeps running and panel values carry over for parameters
    /// that still exist.
    pub fn reload_active(&mut self) -> Result<(), GalleryError> {
        let Some(index) = self.cursor else {
            return Ok(());
        };
        let Some(descriptor) = self.catalog.get_index(index) else {
            return Ok(());
        };
        let key = descriptor.key.clone();

        if let Some(descriptor) = self.catalog.get_mut(&key) {
            if let Err(source) = descriptor.reload_sources() {
                let error = ActivationError::Descriptor {
                    key: key.clone(),
                    source,
                };
                return Err(self.fail(key, error));
            }
        }
        if self.active.is_none() {
            return self.select_index(index);
        }

        let Some(descriptor) = self.catalog.get_index(index) else {
            return Ok(());
        };
        let plan = match ActivationPlan::build(descriptor, &self.options) {
            Ok(plan) => plan,
            Err(source) => return Err(self.fail(key, source)),
        };

        // Bring the new programs up before letting go of the running ones.
        let activation = match self.backend.activate(&plan) {
            Ok(activation) => activation,
            Err(source) => {
                let error = ActivationError::Backend {
                    key: key.clone(),
                    source,
                };
                return Err(self.fail(key, error));
            }
        };
        let Some(active) = self.active.as_mut() else {
            self.backend.release(activation);
            return Ok(());
        };
        let previous = std::mem::replace(&mut active.activation, activation);
        self.backend.release(previous);
        self.panel.reload_params(&plan.params);
        active.plan = plan;
        active.frame = 0;

        self.last_error = None;
        log::info!("Reloaded '{}'", key);
        Ok(())
    }

    fn start(&mut self, index: usize, plan: ActivationPlan) -> Result<(), GalleryError> {
        let key = plan.key.clone();
        let activation = match self.backend.activate(&plan) {
            Ok(activation) => activation,
            Err(source) => {
                let error = ActivationError::Backend {
                    key: key.clone(),
                    source,
                };
                return Err(self.fail(key, error));
            }
        };

        self.panel.load_params(&plan.params);
        let Some(descriptor) = self.catalog.get_index(index) else {
            self.backend.release(activation);
            return Err(GalleryError::UnknownEntry(key));
        };
        let mut hooks = self
            .registry
            .create(descriptor.hooks.as_deref())
            .unwrap_or_else(|| Box::new(NoHooks));
        let update = hooks.init(&mut HookContext {
            descriptor,
            panel: &mut self.panel,
        });

        self.timer.reset();
        self.mouse.reset();
        self.last_error = None;
        log::info!("Activated '{}' ({})", key, plan.name);
        self.active = Some(ActiveEntry {
            key,
            plan,
            activation,
            hooks,
            update,
            frame: 0,
        });
        Ok(())
    }

    fn fail(&mut self, key: String, source: ActivationError) -> GalleryError {
        log::error!("Failed to activate '{}': {}", key, source);
        self.last_error = Some(source.to_string());
        GalleryError::Activation { key, source }
    }

    /// Run the active entry's teardown and release its GPU resources.
    pub fn deactivate(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.hooks.teardown(&mut self.panel);
            self.backend.release(active.activation);
            log::info!("Deactivated '{}'", active.key);
        }
        self.panel.clear();
    }

    /// Draw one frame of the active entry. Returns whether anything was drawn.
    pub fn frame(&mut self) -> Result<bool, GalleryError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };

        let (time, delta) = self.timer.tick();
        let viewport = self.backend.size();
        let mut inputs = FrameInputs::default();
        inputs.set_resolution(viewport.0, viewport.1);
        inputs.set_time(time, delta);
        inputs.frame = active.frame as i32;
        inputs.mouse = self.mouse.to_uniform();
        inputs.date = local_date();
        inputs.set_params(&self.panel.entry_values());

        (active.update)(
            &mut inputs,
            &FrameContext {
                panel: &self.panel,
                mouse: &self.mouse,
                frame: active.frame,
            },
        );

        let per_pass: Vec<FrameInputs> = (0..active.plan.passes.len())
            .map(|pass| FrameInputs {
                channel_resolution: active.plan.channel_resolution(pass, viewport),
                ..inputs
            })
            .collect();

        let result = self.backend.render(&mut active.activation, &per_pass);
        self.mouse.end_frame();
        active.frame += 1;

        match result {
            Ok(()) => Ok(true),
            Err(source) => {
                log::error!("Failed to render '{}': {}", active.key, source);
                self.last_error = Some(source.to_string());
                Err(GalleryError::Render {
                    key: active.key.clone(),
                    source,
                })
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    /// Cursor position in window pixels (top-left origin).
    pub fn mouse_move(&mut self, x: f32, y: f32) {
        let height = self.backend.size().1 as f32;
        self.mouse.move_to(x, height - y);
    }

    pub fn mouse_press(&mut self) {
        self.mouse.press();
    }

    pub fn mouse_release(&mut self) {
        self.mouse.release();
    }
}

impl<B: RenderBackend> Drop for Gallery<B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
