/// Straight RGBA in 0..=1, the format every renderer cell takes.
pub type Color = [f32; 4];

/// Opaque color from a `0xRRGGBB` literal.
pub const fn rgb(hex: u32) -> Color {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
        1.0,
    ]
}

pub const WHITE: Color = rgb(0xFFFFFF);
pub const GREEN: Color = rgb(0x5CE087);
pub const YELLOW: Color = rgb(0xFFFF00);
pub const RED: Color = rgb(0xFF3030);
pub const BLUE: Color = rgb(0x3D94FF);
pub const TRANSPARENT: Color = [1.0, 1.0, 1.0, 0.0];

/// Glyph color for ordinary notes.
pub const NOTE_RGBA: Color = WHITE;
/// Glyph color for speed-change markers.
pub const SPEED_MARKER_RGBA: Color = BLUE;

/// Linear blend from `from` to `to`; `elapsed * rate` is the blend factor,
/// clamped to 0..=1 so the color holds at `to` once the fade is over.
#[inline(always)]
pub fn animate_color(elapsed: f32, from: Color, to: Color, rate: f32) -> Color {
    let t = (elapsed * rate).clamp(0.0, 1.0);
    let s = 1.0 - t;
    [
        from[0] * s + to[0] * t,
        from[1] * s + to[1] * t,
        from[2] * s + to[2] * t,
        from[3] * s + to[3] * t,
    ]
}

/// Accuracy readout color: green at 100%, yellow from 70%, red below.
#[inline(always)]
pub const fn accuracy_rgba(accuracy: i32) -> Color {
    if accuracy >= 100 {
        GREEN
    } else if accuracy >= 70 {
        YELLOW
    } else {
        RED
    }
}

/// Max-combo readout color: green for a perfect run, yellow for a full
/// combo with lower tiers, white once anything was missed.
#[inline(always)]
pub const fn combo_rgba(accuracy: i32, misses: u32) -> Color {
    if accuracy >= 100 {
        GREEN
    } else if misses == 0 {
        YELLOW
    } else {
        WHITE
    }
}
