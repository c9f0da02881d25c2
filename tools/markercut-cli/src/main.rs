//! markercut CLI: cut, speed-ramp, loop, and merge clips described by a markers file.
//!
//! Usage:
//!   markercut render -j <MARKERS> [-i <INPUT>] Encode every marker pair, then merge
//!   markercut plan -j <MARKERS> [-i <INPUT>]   Print graphs and encoder commands only
//!   markercut merge -j <MARKERS>               Merge already generated clips
//!   markercut preview -j <MARKERS> [-i <INPUT>] [--pair <N>]
//!   markercut check                            Check ffmpeg/ffprobe/ffplay availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::args::{ClipArgs, InputArgs, SessionArgs, VideoArgs};

#[derive(Parser)]
#[command(
    name = "markercut",
    about = "Cut speed-ramped, cropped, and looping webm clips from marker pairs",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode every marker pair and merge the results
    Render {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        clip: ClipArgs,

        /// Marker pairs encoded concurrently
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Skip merging after the batch
        #[arg(long)]
        no_merge: bool,
    },

    /// Print the filter graph, duration, and encoder commands of each pair
    Plan {
        #[command(flatten)]
        session: SessionArgs,

        /// Local input video (probed unless all video properties are given)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        clip: ClipArgs,

        #[command(flatten)]
        video: VideoArgs,

        /// Only plan this 1-based marker pair
        #[arg(long)]
        pair: Option<usize>,

        /// Print plans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge generated clips
    Merge {
        #[command(flatten)]
        session: SessionArgs,

        /// Merge list overriding the markers file's (e.g. "1-3,5;7-6")
        #[arg(short, long)]
        merge_list: Option<String>,

        /// Title prefix the clips were generated with
        #[arg(long)]
        title_prefix: Option<String>,
    },

    /// Play marker pairs with ffplay
    Preview {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        clip: ClipArgs,

        /// 1-based marker pair to preview (default: prompt for pairs until q)
        #[arg(long)]
        pair: Option<usize>,
    },

    /// Check tool availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = markercut_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    match cli.command {
        Commands::Render {
            session,
            input,
            clip,
            max_parallel,
            no_merge,
        } => {
            if let Some(max_parallel) = max_parallel {
                config.max_parallel = max_parallel;
            }
            commands::render::run(config, session, input, clip, !no_merge).await
        }
        Commands::Plan {
            session,
            input,
            clip,
            video,
            pair,
            json,
        } => commands::plan::run(config, session, input, clip, video, pair, json),
        Commands::Merge {
            session,
            merge_list,
            title_prefix,
        } => commands::merge::run(config, session, merge_list, title_prefix),
        Commands::Preview {
            session,
            input,
            clip,
            pair,
        } => commands::preview::run(config, session, input, clip, pair),
        Commands::Check => commands::check::run(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_arguments() {
        let cli = Cli::parse_from([
            "markercut",
            "-v",
            "render",
            "-j",
            "trip.json",
            "-i",
            "trip.mp4",
            "--multiply-crop",
            "2",
            "--loop",
            "fwrev",
            "--max-parallel",
            "4",
        ]);
        assert!(cli.verbose);
        let Commands::Render {
            session,
            input,
            max_parallel,
            no_merge,
            ..
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!(session.markers, PathBuf::from("trip.json"));
        assert_eq!(input.input, Some(PathBuf::from("trip.mp4")));
        assert!(!input.no_auto_find_input_video);
        assert_eq!(session.multiply_crop, Some(2.0));
        assert_eq!(max_parallel, Some(4));
        assert!(!no_merge);
    }

    #[test]
    fn test_preview_input_and_pair_are_optional() {
        let cli = Cli::parse_from([
            "markercut",
            "preview",
            "-j",
            "trip.json",
            "--no-auto-find-input-video",
        ]);
        let Commands::Preview { input, pair, .. } = cli.command else {
            panic!("expected preview");
        };
        assert!(input.input.is_none());
        assert!(input.no_auto_find_input_video);
        assert!(pair.is_none());
    }

    #[test]
    fn test_uniform_and_per_axis_crop_multiples_conflict() {
        let parsed = Cli::try_parse_from([
            "markercut",
            "merge",
            "-j",
            "trip.json",
            "--multiply-crop",
            "2",
            "--multiply-crop-x",
            "1.5",
        ]);
        assert!(parsed.is_err());
    }
}
