use std::time::Instant;

/// Frame clock: seconds elapsed since the previous tick.
pub trait Clock {
    fn elapsed_since_last_tick(&mut self) -> f32;
}

/// Deterministic clock for headless runs and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedStepClock {
    step: f32,
}

impl FixedStepClock {
    pub fn from_frame_rate(fps: u32) -> Self {
        Self { step: 1.0 / fps.max(1) as f32 }
    }
}

impl Clock for FixedStepClock {
    fn elapsed_since_last_tick(&mut self) -> f32 {
        self.step
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    last: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self { last: Instant::now() }
    }
}

impl Clock for WallClock {
    fn elapsed_since_last_tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}
