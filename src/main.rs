mod app;
mod config;
mod core;
mod game;
mod ui;

use std::path::Path;

const USAGE: &str = "usage: linebeat [--info] <chart-file>";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    let config = config::get();
    log::set_max_level(config.log_level.as_level_filter());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (info_only, chart_path) = match args.as_slice() {
        [flag, path] if flag == "--info" => (true, path),
        [path] => (false, path),
        _ => return Err(USAGE.into()),
    };

    if info_only {
        // Listing only: metadata without building notes.
        let path = Path::new(chart_path);
        let name = path.file_stem().map_or_else(|| "untitled".into(), |s| s.to_string_lossy());
        let text = std::fs::read_to_string(path)?;
        let metadata = game::parsing::level::peek_metadata(&text, &name)?;
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    let level = game::parsing::level::load_level(chart_path, config.judgment_line_y)?;
    log::info!(
        "{} [{}] by {}: {} objects, {} BPM, length {}{}",
        level.metadata.name,
        level.metadata.difficulty,
        level.metadata.author,
        level.metadata.object_count,
        level.metadata.bpm,
        level.metadata.length,
        if level.metadata.skippable { ", skippable intro" } else { "" }
    );

    let report = app::run(level, &config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
