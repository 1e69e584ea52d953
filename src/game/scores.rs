use serde::Serialize;

use crate::game::judgment::{JudgmentCounts, ScoreState};
use crate::ui::color::{self, Color};

/// Results-screen summary of a finished (or abandoned) play session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelScore {
    pub score: i32,
    pub score_str: String,
    pub accuracy: i32,
    pub accuracy_str: String,
    pub accuracy_color: Color,
    pub max_combo: u32,
    pub max_combo_str: String,
    /// Green on a perfect run, yellow on a full combo, white otherwise.
    pub max_combo_color: Color,
    /// Miss, ok, perfect.
    pub scores: JudgmentCounts,
}

impl LevelScore {
    pub fn from_state(state: &ScoreState) -> Self {
        let accuracy_str = format!("{}%", state.accuracy);
        Self {
            score: state.score,
            score_str: format!("SCORE: {}", state.score),
            accuracy: state.accuracy,
            accuracy_str,
            accuracy_color: color::accuracy_rgba(state.accuracy),
            max_combo: state.max_combo,
            max_combo_str: format!("{}x", state.max_combo),
            max_combo_color: color::combo_rgba(state.accuracy, state.misses()),
            scores: state.judgment_counts,
        }
    }

    /// `accuracy% | max_combox`, as shown under the score.
    pub fn accuracy_combo_line(&self) -> String {
        format!("{}|{}", self.accuracy_str, self.max_combo_str)
    }
}
