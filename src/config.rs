use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "linebeat.ini";

/// `[Section]` headers and `Key=Value` lines; `;` and `#` start comments.
#[derive(Debug, Default)]
pub struct SimpleIni {
    values: FxHashMap<(String, String), String>,
}

impl SimpleIni {
    pub fn parse(content: &str) -> Self {
        let mut values = FxHashMap::default();
        let mut section = String::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with([';', '#']) {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
            } else if let Some((key, value)) = line.split_once('=')
                && !key.trim().is_empty()
            {
                values.insert((section.clone(), key.trim().to_string()), value.trim().to_string());
            }
        }
        Self { values }
    }

    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub log_level: LogLevel,
    /// Judge every note at the line without input.
    pub auto_play: bool,
    /// Pace the headless run against the wall clock instead of stepping
    /// as fast as possible.
    pub real_time: bool,
    pub frame_rate: u32,
    /// Screen row of the judgment line.
    pub judgment_line_y: i32,
    pub starting_health: i32,
    pub grid_width: u16,
    pub grid_height: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            auto_play: true,
            real_time: false,
            frame_rate: 60,
            judgment_line_y: 54,
            starting_health: 80,
            grid_width: 80,
            grid_height: 60,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

#[inline(always)]
const fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn default_config_contents() -> String {
    let default = Config::default();
    let mut content = String::new();

    // [Options] section - keys in alphabetical order
    content.push_str("[Options]\n");
    content.push_str(&format!("AutoPlay={}\n", flag(default.auto_play)));
    content.push_str(&format!("FrameRate={}\n", default.frame_rate));
    content.push_str(&format!("GridHeight={}\n", default.grid_height));
    content.push_str(&format!("GridWidth={}\n", default.grid_width));
    content.push_str(&format!("JudgmentLineY={}\n", default.judgment_line_y));
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push_str(&format!("RealTime={}\n", flag(default.real_time)));
    content.push_str(&format!("StartingHealth={}\n", default.starting_health));
    content
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, default_config_contents())
}

/// Builds a config from parsed INI data, using defaults for missing or
/// malformed keys.
pub fn from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    Config {
        log_level: conf
            .get("Options", "LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level),
        auto_play: conf
            .get("Options", "AutoPlay")
            .and_then(|v| v.parse::<u8>().ok())
            .map_or(default.auto_play, |v| v != 0),
        real_time: conf
            .get("Options", "RealTime")
            .and_then(|v| v.parse::<u8>().ok())
            .map_or(default.real_time, |v| v != 0),
        frame_rate: conf
            .get("Options", "FrameRate")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(default.frame_rate),
        judgment_line_y: conf
            .get("Options", "JudgmentLineY")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(default.judgment_line_y),
        starting_health: conf
            .get("Options", "StartingHealth")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(default.starting_health),
        grid_width: conf
            .get("Options", "GridWidth")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(default.grid_width),
        grid_height: conf
            .get("Options", "GridHeight")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(default.grid_height),
    }
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    match SimpleIni::load(CONFIG_PATH) {
        Ok(conf) => {
            let loaded = from_ini(&conf);
            *CONFIG.lock().unwrap() = loaded;
            info!("Configuration loaded from '{CONFIG_PATH}'.");
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_reads_sections_and_skips_comments() {
        let ini = SimpleIni::parse("; comment\n# another\n[Options]\n AutoPlay = 0 \n\n[Other]\nKey=Value=More\n=skipped\n");
        assert_eq!(ini.get("Options", "AutoPlay"), Some("0"));
        assert_eq!(ini.get("Other", "Key"), Some("Value=More"));
        assert_eq!(ini.get("Options", "Key"), None);
        assert_eq!(ini.get("Other", ""), None);
    }

    #[test]
    fn default_file_round_trips() {
        let config = from_ini(&SimpleIni::parse(&default_config_contents()));
        let default = Config::default();
        assert_eq!(config.log_level, default.log_level);
        assert_eq!(config.auto_play, default.auto_play);
        assert_eq!(config.real_time, default.real_time);
        assert_eq!(config.frame_rate, default.frame_rate);
        assert_eq!(config.judgment_line_y, default.judgment_line_y);
        assert_eq!(config.starting_health, default.starting_health);
        assert_eq!((config.grid_width, config.grid_height), (default.grid_width, default.grid_height));
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let config = from_ini(&SimpleIni::parse(
            "[Options]\nLogLevel=loud\nFrameRate=0\nStartingHealth=fifty\nAutoPlay=0\nJudgmentLineY=30\n",
        ));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.starting_health, 80);
        assert!(!config.auto_play);
        assert_eq!(config.judgment_line_y, 30);
    }

    #[test]
    fn log_levels_parse_case_insensitively() {
        assert_eq!(LogLevel::from_str("TRACE"), Ok(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("warning"), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::Debug.as_level_filter(), log::LevelFilter::Debug);
        assert!(LogLevel::from_str("verbose").is_err());
    }
}
