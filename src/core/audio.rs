use log::trace;
use rustc_hash::FxHashMap;

/* ============================== Public API ============================== */

/// Sound effects the judgment engine can trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sfx {
    /// Tap note resolved.
    Hit,
    /// Hold note resolved, or a note passing the line while editing.
    Tick,
}

impl Sfx {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Hit => "assets/sounds/hit.ogg",
            Self::Tick => "assets/sounds/tick.ogg",
        }
    }
}

/// Fire-and-forget playback. The engine never waits on a sound.
pub trait Audio {
    fn play(&mut self, sfx: Sfx);

    /// Whether the chart's music is currently audible. Editing mode only
    /// previews line crossings while it is.
    fn music_playing(&self) -> bool {
        false
    }
}

/// Headless sink: logs each request and keeps per-effect counts.
#[derive(Debug, Default)]
pub struct SfxLog {
    counts: FxHashMap<Sfx, u32>,
    music_playing: bool,
}

impl SfxLog {
    pub fn new(music_playing: bool) -> Self {
        Self { counts: FxHashMap::default(), music_playing }
    }

    pub fn count(&self, sfx: Sfx) -> u32 {
        self.counts.get(&sfx).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

impl Audio for SfxLog {
    fn play(&mut self, sfx: Sfx) {
        trace!("SFX: {}", sfx.path());
        *self.counts.entry(sfx).or_insert(0) += 1;
    }

    fn music_playing(&self) -> bool {
        self.music_playing
    }
}
