//! Check tool availability.

use markercut_common::config::{config_file_path, AppConfig};
use markercut_render_engine::backend::tool_availability;

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    super::session::init_logging(&config, None);

    println!("markercut System Check");
    println!("{}", "=".repeat(50));
    println!("Config: {}", config_file_path().display());
    println!("Output root: {}", config.output_root.display());
    println!("Max parallel: {}", config.workers());
    println!();

    let tools = tool_availability(&config.tools);
    for (name, path, available) in &tools {
        if *available {
            println!("[OK]   {name}: {}", path.display());
        } else {
            println!("[MISS] {name}: {} not runnable", path.display());
        }
    }

    println!();
    let encoder_ok = tools
        .iter()
        .filter(|(name, _, _)| *name != "ffplay")
        .all(|(_, _, available)| *available);
    if encoder_ok {
        println!("ffmpeg and ffprobe are available. markercut can render.");
    } else {
        println!("ffmpeg and ffprobe are required to render. Set their paths in the config file.");
    }

    Ok(())
}
