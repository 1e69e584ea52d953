use rustc_hash::FxHashSet;
use winit::keyboard::KeyCode;

/// Keyboard rows notes are laid out on. A glyph's row and column decide
/// both its lane on screen and the key that plays it.
pub const KEYBOARD_ROWS: [&str; 4] = ["1234567890-=", "qwertyuiop[]", "asdfghjkl;'", "zxcvbnm,./"];

/// Horizontal span the lanes are spread across.
const LANE_SPAN: i32 = 90;

pub trait Input {
    fn is_key_held(&self, key: KeyCode) -> bool;
}

/// Set of currently held keys.
#[derive(Clone, Debug, Default)]
pub struct HeldKeys {
    held: FxHashSet<KeyCode>,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key);
    }
}

impl Input for HeldKeys {
    fn is_key_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }
}

/// Screen column of a glyph's lane, or `None` for glyphs outside the layout.
/// Rows are matched case-sensitively, so uppercase letters have no lane.
pub fn lane_x_for_glyph(glyph: char) -> Option<i32> {
    let widest = KEYBOARD_ROWS.iter().map(|row| row.len()).max().unwrap_or(1) as i32;
    let mul = LANE_SPAN / widest;
    KEYBOARD_ROWS.iter().enumerate().find_map(|(row, keys)| {
        keys.find(glyph)
            .map(|col| (col as i32 + 1) * (mul - 1) + row as i32 * mul / 3)
    })
}

#[inline(always)]
pub fn key_for_glyph(glyph: char) -> Option<KeyCode> {
    let key = match glyph.to_ascii_uppercase() {
        '1' => KeyCode::Digit1,
        '2' => KeyCode::Digit2,
        '3' => KeyCode::Digit3,
        '4' => KeyCode::Digit4,
        '5' => KeyCode::Digit5,
        '6' => KeyCode::Digit6,
        '7' => KeyCode::Digit7,
        '8' => KeyCode::Digit8,
        '9' => KeyCode::Digit9,
        '0' => KeyCode::Digit0,
        '-' => KeyCode::Minus,
        '=' => KeyCode::Equal,
        'Q' => KeyCode::KeyQ,
        'W' => KeyCode::KeyW,
        'E' => KeyCode::KeyE,
        'R' => KeyCode::KeyR,
        'T' => KeyCode::KeyT,
        'Y' => KeyCode::KeyY,
        'U' => KeyCode::KeyU,
        'I' => KeyCode::KeyI,
        'O' => KeyCode::KeyO,
        'P' => KeyCode::KeyP,
        '[' => KeyCode::BracketLeft,
        ']' => KeyCode::BracketRight,
        'A' => KeyCode::KeyA,
        'S' => KeyCode::KeyS,
        'D' => KeyCode::KeyD,
        'F' => KeyCode::KeyF,
        'G' => KeyCode::KeyG,
        'H' => KeyCode::KeyH,
        'J' => KeyCode::KeyJ,
        'K' => KeyCode::KeyK,
        'L' => KeyCode::KeyL,
        ';' => KeyCode::Semicolon,
        '\'' => KeyCode::Quote,
        'Z' => KeyCode::KeyZ,
        'X' => KeyCode::KeyX,
        'C' => KeyCode::KeyC,
        'V' => KeyCode::KeyV,
        'B' => KeyCode::KeyB,
        'N' => KeyCode::KeyN,
        'M' => KeyCode::KeyM,
        ',' => KeyCode::Comma,
        '.' => KeyCode::Period,
        '/' => KeyCode::Slash,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_follow_keyboard_rows() {
        // mul = 90 / 12 = 7
        assert_eq!(lane_x_for_glyph('1'), Some(6));
        assert_eq!(lane_x_for_glyph('2'), Some(12));
        assert_eq!(lane_x_for_glyph('q'), Some(8));
        assert_eq!(lane_x_for_glyph('Q'), None);
        assert_eq!(lane_x_for_glyph('a'), Some(10));
        assert_eq!(lane_x_for_glyph('z'), Some(13));
        assert_eq!(lane_x_for_glyph('>'), None);
    }

    #[test]
    fn unknown_glyphs_have_no_key() {
        assert_eq!(key_for_glyph('a'), Some(KeyCode::KeyA));
        assert_eq!(key_for_glyph('/'), Some(KeyCode::Slash));
        assert_eq!(key_for_glyph('>'), None);
        assert_eq!(key_for_glyph('│'), None);
    }

    #[test]
    fn uppercase_glyphs_keep_their_key_but_not_their_lane() {
        assert_eq!(key_for_glyph('Q'), Some(KeyCode::KeyQ));
        assert_eq!(lane_x_for_glyph('Q'), None);
    }

    #[test]
    fn held_keys_report_pressed_keys() {
        let mut keys = HeldKeys::new();
        keys.press(KeyCode::KeyA);
        assert!(keys.is_key_held(KeyCode::KeyA));
        assert!(!keys.is_key_held(KeyCode::KeyS));
    }
}
