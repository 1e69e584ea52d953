use log::trace;
use serde::Serialize;

use crate::core::audio::Audio;
use crate::core::input::Input;
use crate::game::note::{HIT_RANGE, Note};

/// Tier points for a hit that lands exactly on the line (or any hold).
pub const TIER_PERFECT: i32 = 10;
/// Tier points for a hit inside the window but off the line.
pub const TIER_OK: i32 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JudgeGrade {
    Miss,
    Ok,
    Perfect,
}

impl JudgeGrade {
    #[inline(always)]
    pub const fn tier(self) -> i32 {
        match self {
            Self::Miss => 0,
            Self::Ok => TIER_OK,
            Self::Perfect => TIER_PERFECT,
        }
    }

    /// Slot in the judgment histogram (`tier / 5`).
    #[inline(always)]
    pub const fn index(self) -> usize {
        (self.tier() / TIER_OK) as usize
    }
}

/// Histogram of resolved notes: `[miss, ok, perfect]`.
pub type JudgmentCounts = [u32; 3];

/// Turns the judgment histogram into an integer percentage. Recomputed
/// after every resolved note.
pub trait AccuracyFormula {
    fn accuracy(&self, counts: &JudgmentCounts) -> i32;
}

/// Perfect hits weigh 1, ok hits 0.5, misses 0, over everything judged so
/// far. An empty histogram reads as 100%.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeightedAccuracy;

impl AccuracyFormula for WeightedAccuracy {
    fn accuracy(&self, counts: &JudgmentCounts) -> i32 {
        let total: u32 = counts.iter().sum();
        if total == 0 {
            return 100;
        }
        let weighted = counts[JudgeGrade::Ok.index()] as f32 * 0.5
            + counts[JudgeGrade::Perfect.index()] as f32;
        (weighted / total as f32 * 100.0).floor() as i32
    }
}

/// Score, combo, health and accuracy for one play session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreState {
    pub score: i32,
    pub combo: u32,
    pub max_combo: u32,
    pub health: i32,
    pub judgment_counts: JudgmentCounts,
    pub accuracy: i32,
}

impl ScoreState {
    pub fn new(starting_health: i32) -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            health: starting_health,
            judgment_counts: [0; 3],
            accuracy: 100,
        }
    }

    #[inline(always)]
    pub fn judged(&self) -> u32 {
        self.judgment_counts.iter().sum()
    }

    #[inline(always)]
    pub fn misses(&self) -> u32 {
        self.judgment_counts[JudgeGrade::Miss.index()]
    }

    pub fn apply_hit(&mut self, grade: JudgeGrade, hp_restore: i32) {
        self.health += hp_restore;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.score += grade.tier() * self.combo as i32;
        self.judgment_counts[grade.index()] += 1;
    }

    pub fn apply_miss(&mut self, hp_drain: i32) {
        self.health -= hp_drain;
        self.combo = 0;
        self.judgment_counts[JudgeGrade::Miss.index()] += 1;
    }

    pub fn recalculate_accuracy(&mut self, formula: &dyn AccuracyFormula) {
        self.accuracy = formula.accuracy(&self.judgment_counts);
    }
}

/// Per-frame facts the judgment functions need about the line and level.
#[derive(Clone, Copy)]
pub struct JudgeContext<'a> {
    pub line_y: i32,
    /// Sign of the currently scrolling speed segment.
    pub speed_sign: i32,
    pub hp_drain: i32,
    pub hp_restore: i32,
    pub accuracy: &'a dyn AccuracyFormula,
}

/// Grade a hit would get at the note's current position, or `None` when it
/// is outside the hit window.
pub fn grade_at_position(note: &Note, ctx: &JudgeContext) -> Option<JudgeGrade> {
    let on_line = note.position.y == ctx.line_y;
    let in_window = if note.kind.is_hold() {
        on_line
    } else {
        note.crossed_line(ctx.line_y, -HIT_RANGE, ctx.speed_sign)
    };
    if !in_window {
        return None;
    }
    Some(if on_line || note.kind.is_hold() { JudgeGrade::Perfect } else { JudgeGrade::Ok })
}

/// Resolves a pending note as a hit or a miss depending on where it sits
/// relative to the line, plays its sound and starts the removal fade.
/// Returns `None` (and changes nothing) for notes that cannot be judged.
pub fn check_hit(
    note: &mut Note,
    ctx: &JudgeContext,
    score: &mut ScoreState,
    audio: &mut dyn Audio,
) -> Option<JudgeGrade> {
    if !note.is_pending() || note.kind.is_inert() {
        trace!("Ignoring judgment on note {} ({:?}, {:?})", note.id, note.kind, note.state);
        return None;
    }
    let grade = match grade_at_position(note, ctx) {
        Some(grade) => {
            score.apply_hit(grade, ctx.hp_restore);
            grade
        }
        None => {
            score.apply_miss(ctx.hp_drain);
            JudgeGrade::Miss
        }
    };
    if let Some(sfx) = note.sfx() {
        audio.play(sfx);
    }
    score.recalculate_accuracy(ctx.accuracy);
    note.begin_removal();
    trace!("Note {} at offset {} judged {:?}", note.id, note.offset, grade);
    Some(grade)
}

/// Resolves a note that drifted past the miss range. Silent.
pub fn miss(note: &mut Note, ctx: &JudgeContext, score: &mut ScoreState) -> Option<JudgeGrade> {
    if !note.is_pending() || note.kind.is_inert() {
        return None;
    }
    score.apply_miss(ctx.hp_drain);
    score.recalculate_accuracy(ctx.accuracy);
    note.begin_removal();
    trace!("Note {} at offset {} missed", note.id, note.offset);
    Some(JudgeGrade::Miss)
}

/// Judges the note if auto-play is on or its key is held.
pub fn check_press(
    note: &mut Note,
    ctx: &JudgeContext,
    score: &mut ScoreState,
    audio: &mut dyn Audio,
    input: &dyn Input,
    auto_play: bool,
) -> Option<JudgeGrade> {
    if !note.is_pending() || note.kind.is_inert() {
        return None;
    }
    let held = note.key.is_some_and(|key| input.is_key_held(key));
    if auto_play || held {
        check_hit(note, ctx, score, audio)
    } else {
        None
    }
}
