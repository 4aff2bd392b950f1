//! Render constants shared by the shader preprocessor, the planner and the
//! GPU backend.
//!
//! The generated GLSL header and the wgpu bind group layouts must agree on
//! every index defined here.

/// Bind group (GLSL `set`) indices
pub mod bind_group {
    /// Per-pass frame inputs uniform block
    pub const INPUTS: u32 = 0;

    /// Channel textures and samplers
    pub const CHANNELS: u32 = 1;
}

/// Channel slot constants
pub mod channel {
    /// Number of channel slots (`iChannel0` .. `iChannel3`)
    pub const COUNT: usize = 4;

    /// Binding index of the texture for a channel slot within the channel group
    #[inline]
    pub const fn texture_binding(slot: usize) -> u32 {
        (slot * 2) as u32
    }

    /// Binding index of the sampler for a channel slot within the channel group
    #[inline]
    pub const fn sampler_binding(slot: usize) -> u32 {
        (slot * 2 + 1) as u32
    }
}

/// Limits on what a single catalog entry may declare
pub mod limits {
    /// Maximum number of buffer passes per entry
    pub const MAX_BUFFERS: usize = 4;

    /// Maximum number of tweak-panel parameters per entry (`vec4 iParams[4]`)
    pub const MAX_PARAMS: usize = 16;
}

/// Frame buffering constants for double-buffered buffer passes
pub mod frame_buffer {
    /// Number of frame buffers used in double buffering
    pub const BUFFER_COUNT: usize = 2;

    /// Buffer index written during `frame`
    #[inline]
    pub const fn current_buffer_index(frame: u64) -> usize {
        (frame as usize) % BUFFER_COUNT
    }

    /// Buffer index holding the output of the frame before `frame`
    #[inline]
    pub const fn previous_buffer_index(frame: u64) -> usize {
        ((frame + 1) as usize) % BUFFER_COUNT
    }
}

/// Render pass configuration constants
pub mod render_pass {
    /// Clear color for every pass
    pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;

    /// Entry point of the generated fragment `main()`
    pub const FRAGMENT_ENTRY: &str = "main";

    /// Entry point of the full-screen triangle vertex shader
    pub const VERTEX_ENTRY: &str = "vs_main";

    /// Vertices drawn per pass (one full-screen triangle)
    pub const VERTEX_COUNT: u32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_group_indices() {
        assert_eq!(bind_group::INPUTS, 0);
        assert_eq!(bind_group::CHANNELS, 1);
    }

    #[test]
    fn test_channel_bindings_interleave() {
        assert_eq!(channel::texture_binding(0), 0);
        assert_eq!(channel::sampler_binding(0), 1);
        assert_eq!(channel::texture_binding(3), 6);
        assert_eq!(channel::sampler_binding(3), 7);
    }

    #[test]
    fn test_frame_buffer_calculations() {
        assert_eq!(frame_buffer::current_buffer_index(0), 0);
        assert_eq!(frame_buffer::current_buffer_index(1), 1);
        assert_eq!(frame_buffer::current_buffer_index(2), 0);

        assert_eq!(frame_buffer::previous_buffer_index(0), 1);
        assert_eq!(frame_buffer::previous_buffer_index(1), 0);
        assert_eq!(frame_buffer::previous_buffer_index(2), 1);
    }

    #[test]
    fn test_read_and_write_buffers_never_alias() {
        for frame in 0..8u64 {
            assert_ne!(
                frame_buffer::current_buffer_index(frame),
                frame_buffer::previous_buffer_index(frame)
            );
        }
    }
}
