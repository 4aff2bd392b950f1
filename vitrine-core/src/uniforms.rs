use chrono::{Datelike, Local, Timelike};

/// Sample rate reported through `iSampleRate`.
pub const SAMPLE_RATE: f32 = 44100.0;

/// Mirror of the `VitrineInputs` std140 uniform block, one per pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, PartialEq)]
pub struct FrameInputs {
    pub mouse: [f32; 4],
    pub date: [f32; 4],
    pub resolution: [f32; 3],
    pub time: f32,
    pub time_delta: f32,
    pub frame: i32,
    pub frame_rate: f32,
    pub sample_rate: f32,
    // vec3 array elements are padded to 16 bytes under std140
    pub channel_resolution: [[f32; 4]; 4],
    pub params: [[f32; 4]; 4],
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            mouse: [0.0; 4],
            date: [0.0; 4],
            resolution: [0.0, 0.0, 1.0],
            time: 0.0,
            time_delta: 0.0,
            frame: 0,
            frame_rate: 0.0,
            sample_rate: SAMPLE_RATE,
            channel_resolution: [[0.0; 4]; 4],
            params: [[0.0; 4]; 4],
        }
    }
}

impl FrameInputs {
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = [width as f32, height as f32, 1.0];
    }

    pub fn set_time(&mut self, time: f32, delta: f32) {
        self.time = time;
        self.time_delta = delta;
        self.frame_rate = if delta > 0.0 { 1.0 / delta } else { 0.0 };
    }

    /// Write panel values into `iParams`, four per vec4. Extra values are ignored.
    pub fn set_params(&mut self, values: &[f32]) {
        self.params = [[0.0; 4]; 4];
        for (i, value) in values.iter().take(16).enumerate() {
            self.params[i / 4][i % 4] = *value;
        }
    }
}

/// `iDate`: year, month (0-based), day of month, seconds since midnight.
pub fn local_date() -> [f32; 4] {
    let now = Local::now();
    let seconds = now.num_seconds_from_midnight() as f32 + now.nanosecond() as f32 / 1e9;
    [
        now.year() as f32,
        now.month0() as f32,
        now.day() as f32,
        seconds,
    ]
}

/// Shadertoy `iMouse` semantics.
///
/// `xy` is the last position while the button was held, `zw` the click
/// position. `z` is negative once released and `w` is negative on every
/// frame except the one the click happened on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    position: [f32; 2],
    click: [f32; 2],
    pressed: bool,
    clicked_this_frame: bool,
    cursor: [f32; 2],
    ever_pressed: bool,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor moved, in pixels with a bottom-left origin.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.cursor = [x, y];
        if self.pressed {
            self.position = self.cursor;
        }
    }

    pub fn press(&mut self) {
        self.pressed = true;
        self.ever_pressed = true;
        self.clicked_this_frame = true;
        self.position = self.cursor;
        self.click = self.cursor;
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    /// Whether the user has interacted with the mouse since the last reset.
    pub fn has_interacted(&self) -> bool {
        self.ever_pressed
    }

    pub fn reset(&mut self) {
        *self = Self {
            cursor: self.cursor,
            ..Self::default()
        };
    }

    pub fn to_uniform(&self) -> [f32; 4] {
        let z = if self.pressed {
            self.click[0]
        } else {
            -self.click[0].abs()
        };
        let w = if self.clicked_this_frame {
            self.click[1]
        } else {
            -self.click[1].abs()
        };
        [self.position[0], self.position[1], z, w]
    }

    /// Called once a frame has consumed the state.
    pub fn end_frame(&mut self) {
        self.clicked_this_frame = false;
    }
}
