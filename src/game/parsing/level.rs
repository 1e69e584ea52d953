use std::path::Path;

use log::{debug, info};
use thiserror::Error;
use winit::keyboard::KeyCode;

use crate::core::input::{key_for_glyph, lane_x_for_glyph};
use crate::game::chart::{DEFAULT_LINES_FREQUENCY, Level, LevelMetadata, MetaRecord};
use crate::game::note::{HOLD_CHAR, Note, NoteId, NoteKind, SPEED_CHAR};
use crate::game::timing::{SpeedSegment, SpeedTimeline, TimelineError};

const FIELD_NAMES: [&str; 5] = ["glyphs", "offsets", "speeds", "speed offsets", "metadata"];

/// Largest magnitude accepted for note offsets, speeds and speed offsets.
pub const CHART_VALUE_LIMIT: i32 = 1 << 24;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Chart is missing field {index} ({name})")]
    MissingField { index: usize, name: &'static str },

    #[error("Invalid integer in {field}: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("{field} value {value} exceeds the limit of {}", CHART_VALUE_LIMIT)]
    OutOfRange { field: &'static str, value: i32 },

    #[error("{left} has {left_len} entries but {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("Metadata record has {0} entries, expected at least 4")]
    MissingMetadata(usize),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The five chart fields, parsed but not yet turned into entities.
struct RawChart {
    glyphs: Vec<char>,
    offsets: Vec<i32>,
    speeds: Vec<SpeedSegment>,
    meta: MetaRecord,
}

fn parse_int(field: &'static str, value: &str) -> Result<i32, DecodeError> {
    value.trim().parse::<i32>().map_err(|_| DecodeError::InvalidInteger {
        field,
        value: value.to_string(),
    })
}

/// `a:b:c` into bounded integers; an empty field is an empty list.
fn parse_int_list(field: &'static str, raw: &str) -> Result<Vec<i32>, DecodeError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(':')
        .map(|value| {
            let value = parse_int(field, value)?;
            if value.unsigned_abs() > CHART_VALUE_LIMIT.unsigned_abs() {
                return Err(DecodeError::OutOfRange { field, value });
            }
            Ok(value)
        })
        .collect()
}

fn parse_meta(raw: &str) -> Result<MetaRecord, DecodeError> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 4 {
        return Err(DecodeError::MissingMetadata(parts.len()));
    }
    let lines_frequency = match parts.get(4) {
        Some(value) => parse_int("lines frequency", value)?,
        None => DEFAULT_LINES_FREQUENCY,
    };
    let initial_offset_ms = match parts.get(5) {
        Some(value) => parse_int("initial offset", value)?,
        None => 0,
    };
    Ok(MetaRecord {
        hp_drain: parse_int("hp drain", parts[0])?,
        hp_restore: parse_int("hp restore", parts[1])?,
        difficulty: parts[2].to_string(),
        author: parts[3].to_string(),
        lines_frequency,
        initial_offset_ms,
    })
}

impl RawChart {
    fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut lines = text.lines();
        let mut fields = [""; 5];
        for (index, field) in fields.iter_mut().enumerate() {
            *field = lines.next().ok_or(DecodeError::MissingField {
                index,
                name: FIELD_NAMES[index],
            })?;
        }

        let glyphs: Vec<char> = fields[0].chars().collect();
        let offsets = parse_int_list(FIELD_NAMES[1], fields[1])?;
        if glyphs.len() != offsets.len() {
            return Err(DecodeError::LengthMismatch {
                left: FIELD_NAMES[0],
                left_len: glyphs.len(),
                right: FIELD_NAMES[1],
                right_len: offsets.len(),
            });
        }

        let speeds = parse_int_list(FIELD_NAMES[2], fields[2])?;
        let speed_offsets = parse_int_list(FIELD_NAMES[3], fields[3])?;
        if speeds.len() != speed_offsets.len() {
            return Err(DecodeError::LengthMismatch {
                left: FIELD_NAMES[2],
                left_len: speeds.len(),
                right: FIELD_NAMES[3],
                right_len: speed_offsets.len(),
            });
        }
        let speeds = speeds
            .into_iter()
            .zip(speed_offsets)
            .map(|(speed, offset)| SpeedSegment::new(speed, offset))
            .collect();

        Ok(Self { glyphs, offsets, speeds, meta: parse_meta(fields[4])? })
    }

    /// Glyphs that count as objects: everything but hold continuations.
    fn object_count(&self) -> usize {
        self.glyphs.iter().filter(|&&g| g != HOLD_CHAR).count()
    }

    /// Offsets that measure length and skip point; speed-marker glyphs are
    /// excluded.
    fn timed_offsets(&self) -> Vec<i32> {
        self.glyphs
            .iter()
            .zip(&self.offsets)
            .filter(|&(&g, _)| g != SPEED_CHAR)
            .map(|(_, &offset)| offset)
            .collect()
    }

    fn metadata(&self, name: &str, timeline: &SpeedTimeline) -> LevelMetadata {
        LevelMetadata::aggregate(
            name,
            self.meta.clone(),
            self.object_count(),
            &self.timed_offsets(),
            timeline,
        )
    }
}

/// Points the hold at the latest earlier tap at or before `offset` and marks
/// that tap absorbed. Returns the lane, key and id the hold takes over.
fn absorb_into_hold(
    notes: &mut [Note],
    hold_id: NoteId,
    offset: i32,
) -> (i32, Option<KeyCode>, Option<NoteId>) {
    let target = notes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.offset <= offset && matches!(n.kind, NoteKind::Tap | NoteKind::Absorbed { .. }))
        .max_by_key(|&(i, n)| (n.offset, i))
        .map(|(i, _)| i);
    match target {
        Some(i) => {
            let shadowed = &mut notes[i];
            shadowed.kind = NoteKind::Absorbed { by: hold_id };
            (shadowed.start_position().x, shadowed.key, Some(shadowed.id))
        }
        None => (0, None, None),
    }
}

/// Decodes chart text into a [`Level`]. Nothing is returned on error.
pub fn decode_level(text: &str, name: &str, line_y: i32) -> Result<Level, DecodeError> {
    let raw = RawChart::parse(text)?;
    let timeline = SpeedTimeline::new(raw.speeds.clone())?;

    let mut notes: Vec<Note> = Vec::with_capacity(raw.glyphs.len() + raw.speeds.len());
    for (id, (&glyph, &offset)) in raw.glyphs.iter().zip(&raw.offsets).enumerate() {
        let note = match glyph {
            HOLD_CHAR => {
                let (lane_x, key, shadows) = absorb_into_hold(&mut notes, id, offset);
                Note::new(id, glyph, offset, NoteKind::Hold { shadows }, lane_x, key, line_y)
            }
            SPEED_CHAR => Note::new(id, glyph, offset, NoteKind::SpeedMarker, 0, None, line_y),
            _ => Note::new(
                id,
                glyph,
                offset,
                NoteKind::Tap,
                lane_x_for_glyph(glyph).unwrap_or(0),
                key_for_glyph(glyph),
                line_y,
            ),
        };
        notes.push(note);
    }
    for segment in timeline.sorted_by_offset() {
        let id = notes.len();
        notes.push(Note::speed_marker(id, segment.offset, line_y));
    }

    let metadata = raw.metadata(name, &timeline);
    info!(
        "Decoded {name}: {} notes, {} speed segments, bpm {}, length {}",
        notes.len(),
        metadata.speeds_count,
        metadata.bpm,
        metadata.length
    );
    Ok(Level { metadata, notes, timeline, line_y })
}

/// Metadata only, without building notes. Agrees with
/// `decode_level(..).metadata`.
pub fn peek_metadata(text: &str, name: &str) -> Result<LevelMetadata, DecodeError> {
    let raw = RawChart::parse(text)?;
    let timeline = SpeedTimeline::new(raw.speeds.clone())?;
    Ok(raw.metadata(name, &timeline))
}

/// Reads and decodes a chart file; the file stem becomes the level name.
pub fn load_level(path: impl AsRef<Path>, line_y: i32) -> Result<Level, DecodeError> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    debug!("Loading chart {}", path.display());
    let text = std::fs::read_to_string(path)?;
    decode_level(&text, &name, line_y)
}
