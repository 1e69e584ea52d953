use std::cmp::Reverse;

use bitflags::bitflags;
use glam::IVec2;
use log::{debug, info};
use serde::Serialize;
use smallvec::SmallVec;
use winit::keyboard::KeyCode;

use crate::config::Config;
use crate::core::audio::Audio;
use crate::core::gfx::Renderer;
use crate::core::input::Input;
use crate::game::chart::Level;
use crate::game::judgment::{self, AccuracyFormula, JudgeContext, JudgeGrade, ScoreState, WeightedAccuracy};
use crate::game::note::{MISS_RANGE, NoteId, NoteKind, NoteState};
use crate::game::scores::LevelScore;
use crate::ui::color;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlayMode: u8 {
        /// Notes are judged at the line without input.
        const AUTO = 1 << 0;
        /// Chart preview: notes scroll and sound at the line, nothing is
        /// judged or removed.
        const EDITING = 1 << 1;
    }
}

/// The outside world a tick talks to.
pub struct Services<'a> {
    pub audio: &'a mut dyn Audio,
    pub input: &'a dyn Input,
    pub renderer: &'a mut dyn Renderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Playing,
    /// Every judgeable note was resolved with health left.
    Cleared,
    Failed,
}

pub struct PlaySession {
    level: Level,
    mode: PlayMode,
    score: ScoreState,
    accuracy: Box<dyn AccuracyFormula>,
    /// Session clock in ms, accumulated in f64 and narrowed only for
    /// timeline lookups.
    elapsed_ms: f64,
    scroll_offset: i32,
    speed_sign: i32,
    last_scroll: Option<i32>,
}

impl PlaySession {
    pub fn new(level: Level, mode: PlayMode, config: &Config) -> Self {
        info!(
            "Starting {} ({} by {}), mode {:?}, health {}",
            level.metadata.name, level.metadata.difficulty, level.metadata.author, mode, config.starting_health
        );
        let speed_sign = level.timeline.segments().first().map_or(1, |s| s.speed.signum());
        Self {
            level,
            mode,
            score: ScoreState::new(config.starting_health),
            accuracy: Box::new(WeightedAccuracy),
            elapsed_ms: 0.0,
            scroll_offset: 0,
            speed_sign,
            last_scroll: None,
        }
    }

    pub fn with_accuracy(mut self, formula: Box<dyn AccuracyFormula>) -> Self {
        self.accuracy = formula;
        self
    }

    #[inline(always)]
    pub fn level(&self) -> &Level {
        &self.level
    }

    #[inline(always)]
    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    #[inline(always)]
    pub const fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    #[inline(always)]
    pub const fn scroll_offset(&self) -> i32 {
        self.scroll_offset
    }

    /// +1 while the scroll moves forward, -1 while it runs backwards, 0 on
    /// a zero-speed segment.
    #[inline(always)]
    pub const fn speed_sign(&self) -> i32 {
        self.speed_sign
    }

    /// Playback time of the chart itself, lagging the session clock by the
    /// level's initial offset.
    #[inline(always)]
    pub fn music_time_ms(&self) -> f64 {
        self.elapsed_ms - f64::from(self.level.metadata.initial_offset_ms)
    }

    /// Advances the session by `dt` seconds: scrolls, judges, animates and
    /// draws every note.
    pub fn tick(&mut self, dt: f32, services: &mut Services) {
        self.elapsed_ms += f64::from(dt) * 1000.0;
        let music_ms = self.music_time_ms() as f32;
        self.scroll_offset = self.level.timeline.ms_to_offset(music_ms).round() as i32;
        self.speed_sign = self.level.timeline.speed_at_ms(music_ms).signum();

        self.step_notes(services);
        if !self.mode.contains(PlayMode::EDITING) {
            self.judge_notes(services);
        }
        self.animate_and_draw(dt, services.renderer);

        let before = self.level.notes.len();
        self.level.notes.retain(|n| n.state != NoteState::Removed);
        let evicted = before - self.level.notes.len();
        if evicted > 0 {
            debug!("Evicted {evicted} notes at scroll {}", self.scroll_offset);
        }
    }

    fn step_notes(&mut self, services: &mut Services) {
        let line_y = self.level.line_y;
        let scrolled = self.last_scroll != Some(self.scroll_offset);
        let preview = self.mode.contains(PlayMode::EDITING) && scrolled && services.audio.music_playing();
        for note in &mut self.level.notes {
            note.step(self.scroll_offset);
            if preview && note.is_pending() && note.position.y == line_y {
                if let Some(sfx) = note.sfx() {
                    services.audio.play(sfx);
                }
            }
        }
        self.last_scroll = Some(self.scroll_offset);
    }

    fn judge_notes(&mut self, services: &mut Services) {
        let auto = self.mode.contains(PlayMode::AUTO);
        let ctx = JudgeContext {
            line_y: self.level.line_y,
            speed_sign: self.speed_sign,
            hp_drain: self.level.metadata.hp_drain,
            hp_restore: self.level.metadata.hp_restore,
            accuracy: self.accuracy.as_ref(),
        };
        for note in self.level.notes.iter_mut().filter(|n| n.is_pending()) {
            if !note.crossed_line(ctx.line_y, 0, ctx.speed_sign) {
                continue;
            }
            if note.kind.is_inert() {
                note.state = NoteState::Removed;
            } else if !auto && note.crossed_line(ctx.line_y, note.miss_range(), ctx.speed_sign) {
                judgment::miss(note, &ctx, &mut self.score);
            } else if auto || note.kind.is_hold() {
                judgment::check_press(note, &ctx, &mut self.score, services.audio, services.input, auto);
            }
        }
    }

    /// Draws pending notes, runs removal fades and evicts pending notes that
    /// share a cell with a note that just started fading.
    fn animate_and_draw(&mut self, dt: f32, renderer: &mut dyn Renderer) {
        let line_y = self.level.line_y;
        let mut collisions: SmallVec<[(NoteId, IVec2); 8]> = SmallVec::new();

        for note in &mut self.level.notes {
            match note.state {
                NoteState::Pending => {
                    if !matches!(note.kind, NoteKind::Absorbed { .. }) {
                        renderer.set_glyph(note.position, note.glyph, note.glyph_rgba(), color::TRANSPARENT);
                    }
                }
                NoteState::RemovedAnimating => {
                    if note.remove_animation_time <= 0.0 {
                        collisions.push((note.id, note.position));
                    }
                    let (foreground, background) = note.removal_rgba(line_y);
                    renderer.set_cell(note.position, foreground, background);
                    note.advance_removal(dt);
                }
                NoteState::Removed => {}
            }
        }

        for note in self.level.notes.iter_mut().filter(|n| n.is_pending()) {
            if collisions.iter().any(|&(id, position)| id != note.id && position == note.position) {
                debug!("Note {} overlapped a resolved note, removing", note.id);
                note.state = NoteState::Removed;
            }
        }
    }

    /// Judges the press of `key` against the most advanced pending tap for
    /// that key within the press window. Pressing too early is a miss.
    pub fn key_pressed(&mut self, key: KeyCode, services: &mut Services) -> Option<JudgeGrade> {
        if self.mode.contains(PlayMode::EDITING) {
            return None;
        }
        let line_y = self.level.line_y;
        let sign = self.speed_sign;
        let direction = if sign < 0 { -1 } else { 1 };
        let ctx = JudgeContext {
            line_y,
            speed_sign: sign,
            hp_drain: self.level.metadata.hp_drain,
            hp_restore: self.level.metadata.hp_restore,
            accuracy: self.accuracy.as_ref(),
        };
        let note = self
            .level
            .notes
            .iter_mut()
            .filter(|n| {
                n.is_pending()
                    && n.kind == NoteKind::Tap
                    && n.key == Some(key)
                    && n.crossed_line(line_y, -MISS_RANGE, sign)
            })
            .max_by_key(|n| (n.position.y * direction, Reverse(n.id)))?;
        judgment::check_hit(note, &ctx, &mut self.score, services.audio)
    }

    /// Jumps over a long intro to shortly before the first note. Returns
    /// whether the jump happened.
    pub fn skip(&mut self) -> bool {
        let md = &self.level.metadata;
        if !md.skippable || self.elapsed_ms >= f64::from(md.skip_time_ms) {
            return false;
        }
        info!("Skipping intro of {} to {} ms", md.name, md.skip_time_ms);
        self.elapsed_ms = f64::from(md.skip_time_ms);
        true
    }

    pub fn outcome(&self) -> Outcome {
        if self.mode.contains(PlayMode::EDITING) {
            Outcome::Playing
        } else if self.score.health <= 0 {
            Outcome::Failed
        } else if self.level.judgeable_remaining() == 0 {
            Outcome::Cleared
        } else {
            Outcome::Playing
        }
    }

    pub fn summary(&self) -> LevelScore {
        LevelScore::from_state(&self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{Sfx, SfxLog};
    use crate::core::gfx::CellGrid;
    use crate::core::input::HeldKeys;
    use crate::game::parsing::level::decode_level;

    const LINE_Y: i32 = 54;

    struct Rig {
        audio: SfxLog,
        input: HeldKeys,
        grid: CellGrid,
    }

    impl Rig {
        fn new() -> Self {
            Self { audio: SfxLog::new(true), input: HeldKeys::new(), grid: CellGrid::new(80, 60) }
        }

        fn tick(&mut self, session: &mut PlaySession, dt: f32) {
            self.grid.clear();
            let mut services = Services { audio: &mut self.audio, input: &self.input, renderer: &mut self.grid };
            session.tick(dt, &mut services);
        }

        fn press(&mut self, session: &mut PlaySession, key: KeyCode) -> Option<JudgeGrade> {
            let mut services = Services { audio: &mut self.audio, input: &self.input, renderer: &mut self.grid };
            session.key_pressed(key, &mut services)
        }
    }

    fn session(chart: &str, mode: PlayMode, starting_health: i32) -> PlaySession {
        let level = decode_level(chart, "test", LINE_Y).expect("fixture chart decodes");
        let config = Config { starting_health, judgment_line_y: LINE_Y, ..Config::default() };
        PlaySession::new(level, mode, &config)
    }

    #[test]
    fn auto_play_clears_chart_with_perfects() {
        let mut s = session("as\n2:4\n120\n0\n10:5:x:y", PlayMode::AUTO, 80);
        let mut rig = Rig::new();
        for _ in 0..30 {
            rig.tick(&mut s, 0.1);
        }
        assert_eq!(s.outcome(), Outcome::Cleared);
        assert_eq!(s.score().judgment_counts, [0, 0, 2]);
        assert_eq!(s.score().score, 30);
        assert_eq!(s.score().health, 90);
        assert_eq!(rig.audio.count(Sfx::Hit), 2);
        assert_eq!(s.summary().accuracy_str, "100%");
    }

    #[test]
    fn unpressed_note_misses_past_range() {
        let mut s = session("a\n2\n120\n0\n10:5:x:y", PlayMode::empty(), 50);
        let mut rig = Rig::new();
        // Scroll 3: one past the line, still inside the miss range.
        rig.tick(&mut s, 1.5);
        assert_eq!(s.score().judged(), 0);
        rig.tick(&mut s, 0.5);
        assert_eq!(s.score().health, 40);
        assert_eq!(s.score().combo, 0);
        assert_eq!(s.score().judgment_counts, [1, 0, 0]);
        assert_eq!(s.score().accuracy, 0);
        assert_eq!(rig.audio.total(), 0, "passive misses are silent");
    }

    #[test]
    fn health_at_zero_fails() {
        let mut s = session("a\n2\n120\n0\n10:5:x:y", PlayMode::empty(), 10);
        let mut rig = Rig::new();
        assert_eq!(s.outcome(), Outcome::Playing);
        rig.tick(&mut s, 2.0);
        assert_eq!(s.outcome(), Outcome::Failed);
    }

    #[test]
    fn speed_markers_drop_without_scoring() {
        let mut s = session("a\n6\n120:60\n0:2\n1:1:x:y", PlayMode::AUTO, 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.0);
        assert_eq!(s.level().notes.iter().filter(|n| n.kind == NoteKind::SpeedMarker).count(), 1);
        rig.tick(&mut s, 1.0);
        assert!(s.level().notes.iter().all(|n| n.kind != NoteKind::SpeedMarker));
        assert_eq!(s.score().judged(), 0);
        assert_eq!(rig.audio.total(), 0);
    }

    #[test]
    fn key_press_grades_by_distance_from_line() {
        let mut s = session("aa\n2:6\n120\n0\n1:1:x:y", PlayMode::empty(), 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.5);
        // First note one unit early.
        assert_eq!(rig.press(&mut s, KeyCode::KeyA), Some(JudgeGrade::Ok));
        assert_eq!(s.score().score, 5);
        // Second note is five units away, outside the window.
        assert_eq!(rig.press(&mut s, KeyCode::KeyS), None);
        assert_eq!(rig.press(&mut s, KeyCode::KeyA), None);
        rig.tick(&mut s, 1.5);
        // Two units early is a miss.
        assert_eq!(rig.press(&mut s, KeyCode::KeyA), Some(JudgeGrade::Miss));
        assert_eq!(s.score().judgment_counts, [1, 1, 0]);
        assert_eq!(rig.audio.count(Sfx::Hit), 2);
    }

    #[test]
    fn hold_resolves_only_while_key_is_held() {
        let chart = "a│\n0:4\n120\n0\n1:1:x:y";

        let mut held = session(chart, PlayMode::empty(), 80);
        let mut rig = Rig::new();
        rig.input.press(KeyCode::KeyA);
        rig.tick(&mut held, 2.0);
        assert_eq!(held.score().judgment_counts, [0, 0, 1]);
        assert_eq!(rig.audio.count(Sfx::Tick), 1);
        assert_eq!(held.outcome(), Outcome::Cleared);

        let mut released = session(chart, PlayMode::empty(), 80);
        let mut rig = Rig::new();
        rig.tick(&mut released, 2.0);
        assert_eq!(released.score().judged(), 0);
        rig.tick(&mut released, 0.5);
        assert_eq!(released.score().judgment_counts, [1, 0, 0]);
    }

    #[test]
    fn absorbed_notes_are_not_drawn() {
        let mut s = session("a│\n0:4\n120\n0\n1:1:x:y", PlayMode::EDITING, 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.0);
        let lane = IVec2::new(10, 0);
        assert_eq!(rig.grid.cell(lane + IVec2::new(0, LINE_Y)).map(|c| c.glyph), Some(' '));
        assert_eq!(rig.grid.cell(lane + IVec2::new(0, LINE_Y - 4)).map(|c| c.glyph), Some('│'));
        assert_eq!(rig.grid.cell(IVec2::new(0, LINE_Y)).map(|c| c.glyph), Some('>'));
    }

    #[test]
    fn editing_previews_sounds_without_judging() {
        let mut s = session("a\n2\n120\n0\n1:1:x:y", PlayMode::EDITING, 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.5);
        rig.tick(&mut s, 0.5);
        rig.tick(&mut s, 0.0);
        assert_eq!(rig.audio.count(Sfx::Hit), 1);
        assert_eq!(s.score().judged(), 0);
        assert_eq!(s.level().notes.len(), 2);
        assert_eq!(s.outcome(), Outcome::Playing);
        assert_eq!(rig.press(&mut s, KeyCode::KeyA), None);
    }

    #[test]
    fn resolved_note_clears_pending_note_in_same_cell() {
        let mut s = session("aa\n2:2\n120\n0\n1:1:x:y", PlayMode::empty(), 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.5);
        assert_eq!(rig.press(&mut s, KeyCode::KeyA), Some(JudgeGrade::Ok));
        rig.tick(&mut s, 0.0);
        assert!(s.level().note(1).is_none(), "stacked duplicate is evicted");
        assert_eq!(s.level().note(0).map(|n| n.state), Some(NoteState::RemovedAnimating));
        assert_eq!(s.score().judged(), 1);
    }

    #[test]
    fn removal_fade_colors_the_cell_then_evicts() {
        let mut s = session("a\n2\n120\n0\n1:1:x:y", PlayMode::AUTO, 80);
        let mut rig = Rig::new();
        rig.tick(&mut s, 1.0);
        let cell = rig.grid.cell(IVec2::new(10, LINE_Y)).copied().unwrap();
        assert_eq!(cell.foreground, color::GREEN);
        for _ in 0..5 {
            rig.tick(&mut s, 0.25);
        }
        assert!(s.level().note(0).is_none());
    }

    #[test]
    fn skip_jumps_once_to_before_first_note() {
        let mut s = session("a\n40\n120\n0\n1:1:x:y", PlayMode::AUTO, 80);
        assert!(s.skip());
        assert_eq!(s.elapsed_ms(), 15_000.0);
        assert!(!s.skip());
        let mut rig = Rig::new();
        rig.tick(&mut s, 0.0);
        assert_eq!(s.scroll_offset(), 30);

        let mut short = session("a\n4\n120\n0\n1:1:x:y", PlayMode::AUTO, 80);
        assert!(!short.skip());
    }

    #[test]
    fn reversal_flips_the_crossing_direction() {
        // Scroll runs up to offset 10 in 5 s, then back down.
        let mut s = session("sda\n8:9:12\n120:-120\n0:10\n10:5:x:y", PlayMode::empty(), 80);
        let mut rig = Rig::new();
        let markers = |s: &PlaySession| s.level().notes.iter().filter(|n| n.kind == NoteKind::SpeedMarker).count();

        rig.tick(&mut s, 4.5);
        assert_eq!((s.scroll_offset(), s.speed_sign()), (9, 1));
        assert_eq!(markers(&s), 1, "the marker at 10 is still ahead");
        assert_eq!(s.score().judged(), 0);

        rig.tick(&mut s, 0.5);
        assert_eq!((s.scroll_offset(), s.speed_sign()), (10, -1));
        assert_eq!(markers(&s), 0);
        // The note at 12 never reached the line and now sits past it.
        assert_eq!(s.score().judgment_counts, [1, 0, 0]);
        assert_eq!(s.level().note(2).map(|n| n.state), Some(NoteState::RemovedAnimating));
        assert!(s.level().note(0).is_some_and(|n| n.is_pending()), "below the line is not yet crossed");

        rig.tick(&mut s, 1.0);
        assert_eq!(s.scroll_offset(), 8);
        assert_eq!(rig.press(&mut s, KeyCode::KeyS), Some(JudgeGrade::Perfect));

        // The note at 9 drifts up past the miss range on the way back.
        rig.tick(&mut s, 0.5);
        assert_eq!(s.scroll_offset(), 7);
        assert_eq!(s.score().judgment_counts, [2, 0, 1]);
        assert_eq!(s.outcome(), Outcome::Cleared);
    }

    #[test]
    fn scroll_stays_in_sync_over_a_twenty_minute_chart() {
        let mut s = session("a\n2400\n120\n0\n1:1:x:y", PlayMode::AUTO, 80);
        let mut rig = Rig::new();
        let mut services = Services { audio: &mut rig.audio, input: &rig.input, renderer: &mut rig.grid };
        let dt = 1.0 / 60.0;
        for minute in 1..=20 {
            for _ in 0..3600 {
                s.tick(dt, &mut services);
            }
            assert_eq!(s.scroll_offset(), minute * 120, "scroll drifted after {minute} min");
        }
        assert!((s.elapsed_ms() - 1_200_000.0).abs() < 1.0, "clock at {} ms", s.elapsed_ms());
        assert_eq!(s.score().judgment_counts, [0, 0, 1], "the last note is hit on the line");
    }

    #[test]
    fn custom_accuracy_formula_is_used() {
        struct Always(i32);
        impl AccuracyFormula for Always {
            fn accuracy(&self, _: &judgment::JudgmentCounts) -> i32 {
                self.0
            }
        }
        let mut s = session("a\n2\n120\n0\n1:1:x:y", PlayMode::AUTO, 80).with_accuracy(Box::new(Always(42)));
        let mut rig = Rig::new();
        rig.tick(&mut s, 1.0);
        assert_eq!(s.score().accuracy, 42);
    }
}
