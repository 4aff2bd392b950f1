//! Per-entry lifecycle hooks and the developer tweak panel.
//!
//! An entry may name a hook set in its manifest. On activation the hook's
//! `init` runs once and returns the closure the gallery calls every frame
//! before drawing; `teardown` runs when the entry is switched away from and
//! must remove any panel widgets the hook added.

use crate::descriptor::{ParamSpec, ShaderDescriptor};
use crate::uniforms::{FrameInputs, MouseState};
use std::collections::BTreeMap;

/// Who created a panel widget; teardown removes widgets by owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOwner {
    Entry,
    Hook(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub name: String,
    pub value: f32,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub owner: WidgetOwner,
}

/// Developer-facing parameter tweak panel for the active entry.
#[derive(Debug, Default)]
pub struct ParamPanel {
    widgets: Vec<Widget>,
    selected: usize,
}

impl ParamPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the panel contents with the entry's declared parameters.
    pub fn load_params(&mut self, params: &[ParamSpec]) {
        self.clear();
        for param in params {
            self.widgets.push(Widget {
                name: param.name.clone(),
                value: param.default,
                default: param.default,
                min: param.min,
                max: param.max,
                step: param.step,
                owner: WidgetOwner::Entry,
            });
        }
    }

    /// Swap in a new set of entry parameters after a reload. Hook widgets are
    /// left alone and entry values carry over by name.
    pub fn reload_params(&mut self, params: &[ParamSpec]) {
        let previous: Vec<(String, f32)> = self
            .widgets
            .iter()
            .filter(|w| w.owner == WidgetOwner::Entry)
            .map(|w| (w.name.clone(), w.value))
            .collect();
        self.widgets.retain(|w| w.owner != WidgetOwner::Entry);

        let entry_widgets = params.iter().map(|param| {
            let value = previous
                .iter()
                .find(|(name, _)| *name == param.name)
                .map_or(param.default, |(_, value)| *value);
            Widget {
                name: param.name.clone(),
                value: value.clamp(param.min, param.max),
                default: param.default,
                min: param.min,
                max: param.max,
                step: param.step,
                owner: WidgetOwner::Entry,
            }
        });
        self.widgets.splice(0..0, entry_widgets);
        self.selected = self.selected.min(self.widgets.len().saturating_sub(1));
    }

    pub fn add_widget(
        &mut self,
        owner: WidgetOwner,
        name: &str,
        default: f32,
        min: f32,
        max: f32,
        step: f32,
    ) {
        self.widgets.push(Widget {
            name: name.to_string(),
            value: default.clamp(min, max),
            default,
            min,
            max,
            step,
            owner,
        });
    }

    pub fn remove_owned_by(&mut self, owner: &WidgetOwner) {
        self.widgets.retain(|w| w.owner != *owner);
        self.selected = self.selected.min(self.widgets.len().saturating_sub(1));
    }

    pub fn clear(&mut self) {
        self.widgets.clear();
        self.selected = 0;
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.widgets.iter().find(|w| w.name == name).map(|w| w.value)
    }

    /// Set a widget by name, clamped to its range. Returns false if absent.
    pub fn set_value(&mut self, name: &str, value: f32) -> bool {
        match self.widgets.iter_mut().find(|w| w.name == name) {
            Some(widget) => {
                widget.value = value.clamp(widget.min, widget.max);
                true
            }
            None => false,
        }
    }

    /// Values of the entry's own parameters in declaration order (`iParams`).
    pub fn entry_values(&self) -> Vec<f32> {
        self.widgets
            .iter()
            .filter(|w| w.owner == WidgetOwner::Entry)
            .map(|w| w.value)
            .collect()
    }

    pub fn selected(&self) -> Option<&Widget> {
        self.widgets.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.widgets.is_empty() {
            self.selected = (self.selected + 1) % self.widgets.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.widgets.is_empty() {
            self.selected = (self.selected + self.widgets.len() - 1) % self.widgets.len();
        }
    }

    /// Move the selected widget by `steps` increments, clamped to its range.
    pub fn adjust(&mut self, steps: i32) -> Option<f32> {
        let widget = self.widgets.get_mut(self.selected)?;
        widget.value = (widget.value + widget.step * steps as f32).clamp(widget.min, widget.max);
        Some(widget.value)
    }

    pub fn reset_selected(&mut self) -> Option<f32> {
        let widget = self.widgets.get_mut(self.selected)?;
        widget.value = widget.default;
        Some(widget.value)
    }

    /// One-line description for a window title or status line.
    pub fn summary(&self) -> String {
        self.widgets
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if i == self.selected {
                    format!("[{}={:.2}]", w.name, w.value)
                } else {
                    format!("{}={:.2}", w.name, w.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What hook `init` gets to work with.
pub struct HookContext<'a> {
    pub descriptor: &'a ShaderDescriptor,
    pub panel: &'a mut ParamPanel,
}

/// Read-only state handed to the per-frame update closure.
pub struct FrameContext<'a> {
    pub panel: &'a ParamPanel,
    pub mouse: &'a MouseState,
    pub frame: u64,
}

/// Per-frame uniform update, called before every draw of the active entry.
pub type FrameUpdate = Box<dyn FnMut(&mut FrameInputs, &FrameContext<'_>)>;

pub trait EntryHooks {
    fn init(&mut self, ctx: &mut HookContext<'_>) -> FrameUpdate;

    fn teardown(&mut self, _panel: &mut ParamPanel) {}
}

/// Entries without a hook set.
pub struct NoHooks;

impl EntryHooks for NoHooks {
    fn init(&mut self, _ctx: &mut HookContext<'_>) -> FrameUpdate {
        Box::new(|_, _| {})
    }
}

/// Sweeps `iMouse` along a slow Lissajous path until the user clicks, for
/// shaders that look dead without mouse input.
pub struct AutoMouse;

impl EntryHooks for AutoMouse {
    fn init(&mut self, _ctx: &mut HookContext<'_>) -> FrameUpdate {
        Box::new(|inputs, ctx| {
            if ctx.mouse.has_interacted() {
                return;
            }
            let t = inputs.time * 0.25;
            let x = inputs.resolution[0] * (0.5 + 0.35 * (t * 1.3).sin());
            let y = inputs.resolution[1] * (0.5 + 0.35 * t.cos());
            inputs.mouse = [x, y, x, -y];
        })
    }
}

/// Adds a "Time scale" widget and runs `iTime` through it.
pub struct TimeScale;

impl TimeScale {
    pub const NAME: &'static str = "time-scale";
    pub const WIDGET: &'static str = "Time scale";

    fn owner() -> WidgetOwner {
        WidgetOwner::Hook(Self::NAME.to_string())
    }
}

impl EntryHooks for TimeScale {
    fn init(&mut self, ctx: &mut HookContext<'_>) -> FrameUpdate {
        ctx.panel
            .add_widget(Self::owner(), Self::WIDGET, 1.0, 0.0, 4.0, 0.05);
        let mut scaled_time = 0.0f32;
        Box::new(move |inputs, ctx| {
            let scale = ctx.panel.value(Self::WIDGET).unwrap_or(1.0);
            inputs.time_delta *= scale;
            scaled_time += inputs.time_delta;
            inputs.time = scaled_time;
        })
    }

    fn teardown(&mut self, panel: &mut ParamPanel) {
        panel.remove_owned_by(&Self::owner());
    }
}

type HookFactory = Box<dyn Fn() -> Box<dyn EntryHooks>>;

/// Hook sets by the name catalog entries refer to them with.
pub struct HookRegistry {
    factories: BTreeMap<String, HookFactory>,
}

impl HookRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("auto-mouse", || Box::new(AutoMouse));
        registry.register(TimeScale::NAME, || Box::new(TimeScale));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn EntryHooks> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the hook set `name`; `None` means the entry has no hooks.
    pub fn create(&self, name: Option<&str>) -> Option<Box<dyn EntryHooks>> {
        match name {
            None => Some(Box::new(NoHooks)),
            Some(name) => self.factories.get(name).map(|factory| factory()),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
