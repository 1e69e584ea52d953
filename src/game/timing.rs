use log::{debug, info};
use thiserror::Error;

/// A segment at `speed` scrolls `|speed|` offset units per minute.
const MS_PER_MINUTE: f32 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSegment {
    /// BPM-like rate; the sign is the scroll direction.
    pub speed: i32,
    /// Chart offset the segment starts at.
    pub offset: i32,
}

impl SpeedSegment {
    pub const fn new(speed: i32, offset: i32) -> Self {
        Self { speed, offset }
    }

    #[inline(always)]
    pub fn ms_per_offset(&self) -> f32 {
        if self.speed == 0 {
            0.0
        } else {
            MS_PER_MINUTE / self.speed.unsigned_abs() as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("no speed segment starts at offset 0")]
    MissingOrigin,
    #[error("more than one speed segment starts at offset {0}")]
    DuplicateOffset(i32),
    #[error("speed segment at offset {0} is never reached by the scroll")]
    Unreachable(i32),
}

/// Per-segment data precomputed along traversal order.
#[derive(Debug, Clone, Copy)]
struct SpanRuntime {
    start_ms: f32,
    /// `f32::INFINITY` for the last segment.
    end_ms: f32,
    /// Offset of the successor segment; `None` for the open-ended last one.
    end_offset: Option<i32>,
    /// Direction the scroll moves through this span (+1/-1). Zero-speed
    /// segments keep the direction they were entered with.
    direction: i32,
}

impl SpanRuntime {
    #[inline(always)]
    fn encloses(&self, start: i32, target: i32) -> bool {
        match (self.end_offset, self.direction >= 0) {
            (Some(end), true) => start <= target && target < end,
            (Some(end), false) => end < target && target <= start,
            (None, true) => target >= start,
            (None, false) => target <= start,
        }
    }
}

/// Speed segments in temporal traversal order, plus the lookups that turn
/// chart offsets into playback time and back.
#[derive(Debug, Clone)]
pub struct SpeedTimeline {
    segments: Vec<SpeedSegment>,
    by_offset: Vec<SpeedSegment>,
    spans: Vec<SpanRuntime>,
}

/// Offset units between two chart offsets, without `i32` overflow.
#[inline(always)]
fn span_units(from: i32, to: i32) -> f32 {
    (i64::from(to) - i64::from(from)).unsigned_abs() as f32
}

/// Orders segments the way the scroll actually visits them.
///
/// Segments are sorted by offset, then walked starting from the one at
/// offset 0. Each step moves the index in the direction of the last
/// non-zero speed seen, skipping segments already emitted, so a reverse
/// segment sends the walk back toward lower offsets.
pub fn order_speeds(mut segments: Vec<SpeedSegment>) -> Result<Vec<SpeedSegment>, TimelineError> {
    segments.sort_by_key(|s| s.offset);
    if let Some(pair) = segments.windows(2).find(|w| w[0].offset == w[1].offset) {
        return Err(TimelineError::DuplicateOffset(pair[0].offset));
    }
    let origin = segments
        .iter()
        .position(|s| s.offset == 0)
        .ok_or(TimelineError::MissingOrigin)?;

    let len = segments.len() as isize;
    let mut visited = vec![false; segments.len()];
    let mut ordered = Vec::with_capacity(segments.len());
    let mut index = origin as isize;
    let mut direction: isize = 1;

    loop {
        let segment = segments[index as usize];
        visited[index as usize] = true;
        ordered.push(segment);
        if segment.speed != 0 {
            direction = segment.speed.signum() as isize;
        }
        if ordered.len() == segments.len() {
            break;
        }
        loop {
            index += direction;
            if index < 0 || index >= len {
                let stranded = segments
                    .iter()
                    .zip(&visited)
                    .find(|(_, seen)| !**seen)
                    .map_or(0, |(s, _)| s.offset);
                return Err(TimelineError::Unreachable(stranded));
            }
            if !visited[index as usize] {
                break;
            }
        }
    }

    Ok(ordered)
}

impl SpeedTimeline {
    pub fn new(segments: Vec<SpeedSegment>) -> Result<Self, TimelineError> {
        let segments = order_speeds(segments)?;

        let mut spans = Vec::with_capacity(segments.len());
        let mut elapsed = 0.0_f32;
        let mut direction = 1;
        for (i, seg) in segments.iter().enumerate() {
            if seg.speed != 0 {
                direction = seg.speed.signum();
            }
            let end_offset = segments.get(i + 1).map(|next| next.offset);
            let (end_ms, span_direction) = match end_offset {
                Some(end) => (
                    elapsed + span_units(seg.offset, end) * seg.ms_per_offset(),
                    end.cmp(&seg.offset) as i32,
                ),
                None => (f32::INFINITY, direction),
            };
            spans.push(SpanRuntime { start_ms: elapsed, end_ms, end_offset, direction: span_direction });
            elapsed = end_ms;
        }

        info!("SpeedTimeline ordered {} segments.", segments.len());
        debug!(
            "Traversal order: {:?}",
            segments.iter().map(|s| (s.offset, s.speed)).collect::<Vec<_>>()
        );
        let mut by_offset = segments.clone();
        by_offset.sort_by_key(|s| s.offset);
        Ok(Self { segments, by_offset, spans })
    }

    /// Segments in traversal order; the first one always starts at offset 0.
    #[inline(always)]
    pub fn segments(&self) -> &[SpeedSegment] {
        &self.segments
    }

    /// Segments in chart order, lowest offset first.
    #[inline(always)]
    pub fn sorted_by_offset(&self) -> &[SpeedSegment] {
        &self.by_offset
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Playback time (ms, relative to offset 0) at which the scroll first
    /// reaches `target`. Offsets the scroll never passes are extrapolated
    /// backwards from the origin, giving negative times.
    pub fn offset_to_ms(&self, target: i32) -> f32 {
        for (seg, span) in self.segments.iter().zip(&self.spans) {
            if span.encloses(seg.offset, target) {
                return span.start_ms + span_units(seg.offset, target) * seg.ms_per_offset();
            }
        }
        let origin = self.segments[0];
        -(span_units(origin.offset, target) * origin.ms_per_offset())
    }

    /// Scroll offset reached after `ms` of playback.
    pub fn ms_to_offset(&self, ms: f32) -> f32 {
        if ms < 0.0 {
            let origin = self.segments[0];
            let per = origin.ms_per_offset();
            if per == 0.0 {
                return origin.offset as f32;
            }
            return origin.offset as f32 + self.spans[0].direction as f32 * ms / per;
        }
        match self.active_index(ms) {
            Some(i) => {
                let (seg, span) = (self.segments[i], self.spans[i]);
                let per = seg.ms_per_offset();
                if per == 0.0 {
                    return seg.offset as f32;
                }
                seg.offset as f32 + span.direction as f32 * (ms - span.start_ms) / per
            }
            None => self.segments.last().map_or(0.0, |s| s.offset as f32),
        }
    }

    /// Speed of the segment scrolling at `ms`; its sign is the current
    /// scroll direction.
    pub fn speed_at_ms(&self, ms: f32) -> i32 {
        if ms < 0.0 {
            return self.segments[0].speed;
        }
        self.active_index(ms)
            .or_else(|| self.segments.len().checked_sub(1))
            .map_or(0, |i| self.segments[i].speed)
    }

    #[inline(always)]
    fn active_index(&self, ms: f32) -> Option<usize> {
        // Zero-length spans (zero speed, or nothing between two segments)
        // are never active.
        self.spans.iter().position(|span| ms >= span.start_ms && ms < span.end_ms)
    }
}
