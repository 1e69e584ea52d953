use glam::IVec2;
use winit::keyboard::KeyCode;

use crate::core::audio::Sfx;
use crate::ui::color::{self, Color};

/// Glyph of a hold continuation.
pub const HOLD_CHAR: char = '│';
/// Glyph of a speed-change marker.
pub const SPEED_CHAR: char = '>';

/// How far before the line (in offset units) a press still counts.
pub const HIT_RANGE: i32 = 1;
/// How far past the line a tap may drift before it is a miss.
pub const MISS_RANGE: i32 = 2;
pub const HOLD_MISS_RANGE: i32 = 1;

/// Removal fade: colors blend at this rate per second...
pub const REMOVE_ANIMATION_RATE: f32 = 3.0;
/// ...and the note is evicted once its timer reaches this many seconds.
pub const REMOVE_ANIMATION_SECONDS: f32 = 1.0;

/// Decode-order index of a note; stable for the lifetime of the level even
/// as resolved notes are evicted.
pub type NoteId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteKind {
    Tap,
    /// Sustained note judged on exact alignment with the line. `shadows` is
    /// the earlier note whose lane and key it took over.
    Hold { shadows: Option<NoteId> },
    /// Scroll speed change. Drawn, dropped silently at the line.
    SpeedMarker,
    /// A tap taken over by a later hold; never drawn or judged.
    Absorbed { by: NoteId },
}

impl NoteKind {
    #[inline(always)]
    pub const fn is_hold(self) -> bool {
        matches!(self, Self::Hold { .. })
    }

    /// Markers and absorbed notes pass the line without scoring.
    #[inline(always)]
    pub const fn is_inert(self) -> bool {
        matches!(self, Self::SpeedMarker | Self::Absorbed { .. })
    }

    #[inline(always)]
    pub const fn is_judgeable(self) -> bool {
        !self.is_inert()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    RemovedAnimating,
    Removed,
}

#[derive(Clone, Debug)]
pub struct Note {
    pub id: NoteId,
    pub glyph: char,
    pub key: Option<KeyCode>,
    /// Position in offset space, fixed at decode time.
    pub offset: i32,
    pub kind: NoteKind,
    pub state: NoteState,
    /// `true` for notes from the glyph layout, `false` for markers
    /// synthesized from speed changes.
    pub from_chart: bool,
    start_position: IVec2,
    pub position: IVec2,
    pub remove_animation_time: f32,
}

/// Whether a scroll coordinate `y` has passed the line, shifted by
/// `line_offset` units along the current scroll direction.
#[inline(always)]
pub fn crossed_line(y: i32, line_y: i32, line_offset: i32, speed_sign: i32) -> bool {
    let line = line_y + line_offset * speed_sign;
    match speed_sign {
        1 => y >= line,
        -1 => y <= line,
        _ => y == line,
    }
}

impl Note {
    pub fn new(
        id: NoteId,
        glyph: char,
        offset: i32,
        kind: NoteKind,
        lane_x: i32,
        key: Option<KeyCode>,
        line_y: i32,
    ) -> Self {
        let start_position = IVec2::new(lane_x, line_y.saturating_sub(offset));
        Self {
            id,
            glyph,
            key,
            offset,
            kind,
            state: NoteState::Pending,
            from_chart: true,
            start_position,
            position: start_position,
            remove_animation_time: 0.0,
        }
    }

    /// Marker synthesized for a speed change so the change scrolls visibly.
    pub fn speed_marker(id: NoteId, offset: i32, line_y: i32) -> Self {
        let mut note = Self::new(id, SPEED_CHAR, offset, NoteKind::SpeedMarker, 0, None, line_y);
        note.from_chart = false;
        note
    }

    #[inline(always)]
    pub const fn start_position(&self) -> IVec2 {
        self.start_position
    }

    #[inline(always)]
    pub fn is_pending(&self) -> bool {
        self.state == NoteState::Pending
    }

    /// Moves the note with the global scroll. Resolved notes stay where they
    /// were judged.
    #[inline(always)]
    pub fn step(&mut self, scroll_offset: i32) {
        if !self.is_pending() {
            return;
        }
        self.position.y = self.start_position.y.saturating_add(scroll_offset);
    }

    #[inline(always)]
    pub fn crossed_line(&self, line_y: i32, line_offset: i32, speed_sign: i32) -> bool {
        crossed_line(self.position.y, line_y, line_offset, speed_sign)
    }

    #[inline(always)]
    pub const fn miss_range(&self) -> i32 {
        if self.kind.is_hold() { HOLD_MISS_RANGE } else { MISS_RANGE }
    }

    /// Sound the note makes when resolved, if any.
    #[inline(always)]
    pub const fn sfx(&self) -> Option<Sfx> {
        match self.kind {
            NoteKind::Tap => Some(Sfx::Hit),
            NoteKind::Hold { .. } => Some(Sfx::Tick),
            NoteKind::SpeedMarker | NoteKind::Absorbed { .. } => None,
        }
    }

    pub const fn glyph_rgba(&self) -> Color {
        match self.kind {
            NoteKind::SpeedMarker => color::SPEED_MARKER_RGBA,
            _ => color::NOTE_RGBA,
        }
    }

    /// Starting color of the removal fade, from where the note was resolved.
    pub fn judged_rgba(&self, line_y: i32) -> Color {
        let distance = (self.position.y - line_y).abs();
        if distance > 1 {
            color::RED
        } else if distance == 0 {
            color::GREEN
        } else if self.kind.is_hold() {
            color::RED
        } else {
            color::YELLOW
        }
    }

    /// Current (foreground, background) of the removal fade.
    pub fn removal_rgba(&self, line_y: i32) -> (Color, Color) {
        let start = self.judged_rgba(line_y);
        let t = self.remove_animation_time;
        (
            color::animate_color(t, start, color::WHITE, REMOVE_ANIMATION_RATE),
            color::animate_color(t, start, color::TRANSPARENT, REMOVE_ANIMATION_RATE),
        )
    }

    /// Enters the removal animation. No-op unless pending.
    #[inline(always)]
    pub fn begin_removal(&mut self) {
        if self.is_pending() {
            self.state = NoteState::RemovedAnimating;
            self.remove_animation_time = 0.0;
        }
    }

    /// Advances the removal fade by `dt` seconds; the note becomes
    /// `Removed` once the fade has run its course.
    pub fn advance_removal(&mut self, dt: f32) {
        if self.state != NoteState::RemovedAnimating {
            return;
        }
        if self.remove_animation_time >= REMOVE_ANIMATION_SECONDS {
            self.state = NoteState::Removed;
            return;
        }
        self.remove_animation_time += dt;
    }
}
