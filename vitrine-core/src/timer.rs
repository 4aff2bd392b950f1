use std::time::Instant;

/// Frame clock for the active entry. Restarted on every activation so
/// `iTime` starts at zero for each shader.
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Seconds since the start and since the previous tick.
    pub fn tick(&mut self) -> (f32, f32) {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> (f32, f32) {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        (
            now.saturating_duration_since(self.start).as_secs_f32(),
            delta.as_secs_f32(),
        )
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
