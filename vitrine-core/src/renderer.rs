//! The renderer adapter: what a graphics backend must provide to show a
//! planned entry, plus a GPU-free backend for checks and tests.

use crate::plan::ActivationPlan;
use crate::render_constants::frame_buffer;
use crate::uniforms::FrameInputs;
use crate::webgpu_context::GpuError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create GPU pipeline for '{key}': {message}")]
    Pipeline { key: String, message: String },
    #[error("Expected {expected} frame input block(s), got {actual}")]
    InputCount { expected: usize, actual: usize },
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("Pixel readback failed: {0}")]
    Readback(String),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// GPU objects held by live activations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    /// Compiled pipelines, one per pass.
    pub programs: usize,
    /// Channel textures plus both halves of every buffer target.
    pub textures: usize,
    /// Bind groups: frame inputs plus one channel group per frame parity, per pass.
    pub bindings: usize,
}

impl ResourceCounts {
    pub fn for_plan(plan: &ActivationPlan) -> Self {
        let passes = plan.passes.len();
        Self {
            programs: passes,
            textures: plan.textures.len() + plan.buffer_count() * frame_buffer::BUFFER_COUNT,
            bindings: passes * (1 + frame_buffer::BUFFER_COUNT),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn add(&mut self, other: ResourceCounts) {
        self.programs += other.programs;
        self.textures += other.textures;
        self.bindings += other.bindings;
    }

    pub fn remove(&mut self, other: ResourceCounts) {
        self.programs = self.programs.saturating_sub(other.programs);
        self.textures = self.textures.saturating_sub(other.textures);
        self.bindings = self.bindings.saturating_sub(other.bindings);
    }
}

pub trait RenderBackend {
    type Activation;

    /// Create programs, upload textures and bind channels for a planned entry.
    fn activate(&mut self, plan: &ActivationPlan) -> Result<Self::Activation, RenderError>;

    /// Draw one frame: buffer passes in order, then the image pass.
    /// `inputs` holds one uniform block per pass in the same order.
    fn render(
        &mut self,
        activation: &mut Self::Activation,
        inputs: &[FrameInputs],
    ) -> Result<(), RenderError>;

    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    fn release(&mut self, activation: Self::Activation);

    fn live_resources(&self) -> ResourceCounts;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub key: String,
    pub pass: String,
    pub frame: u64,
    pub inputs: FrameInputs,
}

#[derive(Debug)]
pub struct HeadlessActivation {
    key: String,
    passes: Vec<String>,
    counts: ResourceCounts,
    frame: u64,
}

impl HeadlessActivation {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Does the bookkeeping of a real backend without touching a GPU.
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    live: ResourceCounts,
    draws: Vec<DrawRecord>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            live: ResourceCounts::default(),
            draws: Vec::new(),
        }
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }
}

impl RenderBackend for HeadlessBackend {
    type Activation = HeadlessActivation;

    fn activate(&mut self, plan: &ActivationPlan) -> Result<HeadlessActivation, RenderError> {
        let counts = ResourceCounts::for_plan(plan);
        self.live.add(counts);
        log::debug!("Headless activation of '{}': {:?}", plan.key, counts);
        Ok(HeadlessActivation {
            key: plan.key.clone(),
            passes: plan.passes.iter().map(|p| p.name.clone()).collect(),
            counts,
            frame: 0,
        })
    }

    fn render(
        &mut self,
        activation: &mut HeadlessActivation,
        inputs: &[FrameInputs],
    ) -> Result<(), RenderError> {
        if inputs.len() != activation.passes.len() {
            return Err(RenderError::InputCount {
                expected: activation.passes.len(),
                actual: inputs.len(),
            });
        }
        for (pass, inputs) in activation.passes.iter().zip(inputs) {
            self.draws.push(DrawRecord {
                key: activation.key.clone(),
                pass: pass.clone(),
                frame: activation.frame,
                inputs: *inputs,
            });
        }
        activation.frame += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self, activation: HeadlessActivation) {
        self.live.remove(activation.counts);
    }

    fn live_resources(&self) -> ResourceCounts {
        self.live
    }
}
