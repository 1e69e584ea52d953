use log::{debug, info};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::core::audio::SfxLog;
use crate::core::clock::{Clock, FixedStepClock, WallClock};
use crate::core::gfx::CellGrid;
use crate::core::input::HeldKeys;
use crate::game::chart::{Level, LevelMetadata};
use crate::game::gameplay::{Outcome, PlayMode, PlaySession, Services};
use crate::game::note::REMOVE_ANIMATION_SECONDS;
use crate::game::scores::LevelScore;

/// Extra time simulated after the last note so trailing misses and fades
/// resolve.
const TAIL_SECONDS: f32 = 2.0 + REMOVE_ANIMATION_SECONDS;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: LevelMetadata,
    pub summary: LevelScore,
    pub outcome: Outcome,
    pub health: i32,
    pub frames: u64,
    pub sounds_played: u32,
}

/// Frames needed to carry the session past the last note.
fn frame_budget(level: &Level, skip_ms: f32, frame_rate: u32) -> u64 {
    let seconds = ((level.end_time_ms() - skip_ms).max(0.0)) / 1000.0 + TAIL_SECONDS;
    (seconds * frame_rate.max(1) as f32).ceil() as u64
}

/// Plays a level headlessly until it is cleared, failed or runs out of
/// chart, and reports the result.
pub fn run(level: Level, config: &Config) -> RunReport {
    let mode = if config.auto_play { PlayMode::AUTO } else { PlayMode::empty() };
    let mut session = PlaySession::new(level, mode, config);
    let skip_ms = if session.skip() { session.elapsed_ms() as f32 } else { 0.0 };
    let budget = frame_budget(session.level(), skip_ms, config.frame_rate);

    let mut clock: Box<dyn Clock> = if config.real_time {
        Box::new(WallClock::start())
    } else {
        Box::new(FixedStepClock::from_frame_rate(config.frame_rate))
    };
    let frame_interval = Duration::from_secs_f32(1.0 / config.frame_rate.max(1) as f32);

    let mut audio = SfxLog::new(true);
    let input = HeldKeys::new();
    let mut grid = CellGrid::new(config.grid_width, config.grid_height);

    info!("Running {} for at most {budget} frames", session.level().metadata.name);
    let mut frames = 0;
    while frames < budget && session.outcome() == Outcome::Playing {
        let frame_start = Instant::now();
        grid.clear();
        let dt = clock.elapsed_since_last_tick();
        let mut services = Services { audio: &mut audio, input: &input, renderer: &mut grid };
        session.tick(dt, &mut services);
        frames += 1;

        if config.real_time {
            let spent = frame_start.elapsed();
            if spent < frame_interval {
                std::thread::sleep(frame_interval - spent);
            }
        }
    }

    let outcome = session.outcome();
    let summary = session.summary();
    debug!(
        "Final frame at scroll {} (direction {}):\n{}",
        session.scroll_offset(),
        session.speed_sign(),
        grid.rows().collect::<Vec<_>>().join("\n")
    );
    info!(
        "{} finished after {frames} frames: {outcome:?}, {}",
        session.level().metadata.name,
        summary.accuracy_combo_line()
    );

    RunReport {
        metadata: session.level().metadata.clone(),
        summary,
        outcome,
        health: session.score().health,
        frames,
        sounds_played: audio.total(),
    }
}
