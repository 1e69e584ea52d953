use chrono::TimeDelta;
use log::info;
use serde::Serialize;

use crate::game::note::{Note, NoteId};
use crate::game::timing::SpeedTimeline;

/// How long before the first note a skip lands.
pub const SKIP_LEAD_MS: i32 = 5000;
/// Intros shorter than this are not worth skipping.
pub const MIN_SKIP_MS: i32 = 5000;
pub const DEFAULT_LINES_FREQUENCY: i32 = 4;

/// The colon-delimited metadata field of a chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaRecord {
    pub hp_drain: i32,
    pub hp_restore: i32,
    pub difficulty: String,
    pub author: String,
    pub lines_frequency: i32,
    pub initial_offset_ms: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelMetadata {
    pub name: String,
    pub hp_drain: i32,
    pub hp_restore: i32,
    pub difficulty: String,
    pub author: String,
    /// Beat-line spacing hint for renderers.
    pub lines_frequency: i32,
    pub initial_offset_ms: i32,
    pub length: String,
    pub max_offset: i32,
    pub min_bpm: i32,
    pub max_bpm: i32,
    pub avg_bpm: i32,
    pub bpm: String,
    pub skippable: bool,
    pub skip_time_ms: i32,
    pub object_count: usize,
    pub speeds_count: usize,
}

impl LevelMetadata {
    /// Derives the summary once from decoded data. `offsets` are the note
    /// offsets that count toward length and skip (speed markers excluded).
    pub fn aggregate(
        name: &str,
        meta: MetaRecord,
        object_count: usize,
        offsets: &[i32],
        timeline: &SpeedTimeline,
    ) -> Self {
        let max_offset = offsets.iter().copied().max().unwrap_or(0);
        let min_offset = offsets.iter().copied().min().unwrap_or(0);

        let length_ms = timeline.offset_to_ms(max_offset) - meta.initial_offset_ms as f32;
        let length = format_length(length_ms);

        let min_time = (timeline.offset_to_ms(min_offset) as i32).saturating_add(meta.initial_offset_ms);
        let skip_time_ms = min_time.saturating_sub(SKIP_LEAD_MS);
        let skippable = skip_time_ms > MIN_SKIP_MS;

        let magnitudes: Vec<i32> = timeline
            .segments()
            .iter()
            .map(|s| i32::try_from(s.speed.unsigned_abs()).unwrap_or(i32::MAX))
            .collect();
        let min_bpm = magnitudes.iter().copied().min().unwrap_or(0);
        let max_bpm = magnitudes.iter().copied().max().unwrap_or(0);
        let sum: i64 = magnitudes.iter().map(|&m| i64::from(m)).sum();
        let avg_bpm = if magnitudes.is_empty() { 0 } else { (sum / magnitudes.len() as i64) as i32 };
        let bpm = if min_bpm == max_bpm {
            avg_bpm.to_string()
        } else {
            format!("{min_bpm}-{max_bpm} ({avg_bpm})")
        };

        info!("Initial offset of {name}: {} ms", meta.initial_offset_ms);

        Self {
            name: name.to_string(),
            hp_drain: meta.hp_drain,
            hp_restore: meta.hp_restore,
            difficulty: meta.difficulty,
            author: meta.author,
            lines_frequency: meta.lines_frequency,
            initial_offset_ms: meta.initial_offset_ms,
            length,
            max_offset,
            min_bpm,
            max_bpm,
            avg_bpm,
            bpm,
            skippable,
            skip_time_ms,
            object_count,
            speeds_count: timeline.len(),
        }
    }
}

/// `h:mm:ss` once an hour is reached, `m:ss` below, `-` prefixed when
/// negative.
pub fn format_length(ms: f32) -> String {
    let sign = if ms < 0.0 { "-" } else { "" };
    let span = TimeDelta::milliseconds(ms.abs().round() as i64);
    let hours = span.num_hours();
    let minutes = span.num_minutes() % 60;
    let seconds = span.num_seconds() % 60;
    if hours != 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{minutes}:{seconds:02}")
    }
}

/// A decoded chart: its notes, speed timeline and derived metadata.
#[derive(Clone, Debug)]
pub struct Level {
    pub metadata: LevelMetadata,
    pub notes: Vec<Note>,
    pub timeline: SpeedTimeline,
    /// Screen row of the judgment line the notes were positioned against.
    pub line_y: i32,
}

impl Level {
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Chart notes other than hold continuations.
    pub fn count_objects(&self) -> usize {
        self.notes.iter().filter(|n| n.from_chart && !n.kind.is_hold()).count()
    }

    /// Notes still waiting for a judgment.
    pub fn judgeable_remaining(&self) -> usize {
        self.notes.iter().filter(|n| n.kind.is_judgeable() && n.is_pending()).count()
    }

    /// Elapsed playback time at which the last note reaches the line.
    pub fn end_time_ms(&self) -> f32 {
        self.timeline.offset_to_ms(self.metadata.max_offset) + self.metadata.initial_offset_ms as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::timing::SpeedSegment;

    fn meta(initial_offset_ms: i32) -> MetaRecord {
        MetaRecord {
            hp_drain: 10,
            hp_restore: 5,
            difficulty: "easy".to_string(),
            author: "someone".to_string(),
            lines_frequency: DEFAULT_LINES_FREQUENCY,
            initial_offset_ms,
        }
    }

    #[test]
    fn length_formats_by_magnitude() {
        assert_eq!(format_length(0.0), "0:00");
        assert_eq!(format_length(125_000.0), "2:05");
        assert_eq!(format_length(3_725_000.0), "1:02:05");
        assert_eq!(format_length(-4_000.0), "-0:04");
    }

    #[test]
    fn bpm_range_reports_min_max_and_floored_average() {
        let timeline = SpeedTimeline::new(vec![
            SpeedSegment::new(120, 0),
            SpeedSegment::new(91, 5),
            SpeedSegment::new(-100, 10),
        ])
        .unwrap();
        let md = LevelMetadata::aggregate("x", meta(0), 3, &[0, 5, 10], &timeline);
        assert_eq!(md.min_bpm, 91);
        assert_eq!(md.max_bpm, 120);
        assert_eq!(md.avg_bpm, 103);
        assert_eq!(md.bpm, "91-120 (103)");
        assert_eq!(md.speeds_count, 3);
    }

    #[test]
    fn most_negative_speed_reports_positive_magnitude() {
        let timeline = SpeedTimeline::new(vec![SpeedSegment::new(i32::MIN, 0)]).unwrap();
        let md = LevelMetadata::aggregate("x", meta(0), 0, &[], &timeline);
        assert_eq!(md.min_bpm, i32::MAX);
        assert_eq!(md.max_bpm, i32::MAX);
        assert_eq!(md.avg_bpm, i32::MAX);
    }

    #[test]
    fn single_bpm_displays_bare_value() {
        let timeline = SpeedTimeline::new(vec![SpeedSegment::new(120, 0)]).unwrap();
        let md = LevelMetadata::aggregate("x", meta(0), 2, &[0, 240], &timeline);
        assert_eq!(md.bpm, "120");
        // 240 units at 500 ms
        assert_eq!(md.length, "2:00");
        assert_eq!(md.max_offset, 240);
    }

    #[test]
    fn skip_point_sits_five_seconds_before_first_note() {
        let timeline = SpeedTimeline::new(vec![SpeedSegment::new(120, 0)]).unwrap();
        // First note 30 s in, plus 1 s of initial offset.
        let md = LevelMetadata::aggregate("x", meta(1000), 1, &[60, 80], &timeline);
        assert_eq!(md.skip_time_ms, 26_000);
        assert!(md.skippable);

        let md = LevelMetadata::aggregate("x", meta(0), 1, &[20], &timeline);
        assert_eq!(md.skip_time_ms, 5_000);
        assert!(!md.skippable, "skip must lie strictly beyond five seconds");
    }

    #[test]
    fn empty_chart_measures_zero() {
        let timeline = SpeedTimeline::new(vec![SpeedSegment::new(120, 0)]).unwrap();
        let md = LevelMetadata::aggregate("x", meta(2000), 0, &[], &timeline);
        assert_eq!(md.max_offset, 0);
        assert_eq!(md.length, "-0:02");
        assert_eq!(md.skip_time_ms, -3000);
        assert!(!md.skippable);
    }
}
