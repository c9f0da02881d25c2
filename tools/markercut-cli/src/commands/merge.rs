//! Merge generated clips.

use markercut_clip_model::merge_list::parse_merge_list;
use markercut_clip_model::settings::ClipOptions;
use markercut_common::config::AppConfig;
use markercut_render_engine::backend::{EncoderBackend, FfmpegBackend};
use markercut_render_engine::merge::{merge_clips, MergeOutcome};

use super::args::SessionArgs;
use super::session::{init_logging, Session};

pub fn run(
    config: AppConfig,
    session: SessionArgs,
    merge_list: Option<String>,
    title_prefix: Option<String>,
) -> anyhow::Result<()> {
    let session = Session::open(&config, session)?;
    init_logging(&config, Some(session.layout.log_path()));

    let list = merge_list.unwrap_or_else(|| session.markers.marker_pair_merge_list.clone());
    if list.trim().is_empty() {
        println!("No merge list given and the markers file has none.");
        return Ok(());
    }

    let options = ClipOptions {
        title_prefix: title_prefix.filter(|p| !p.is_empty()),
        ..ClipOptions::default()
    };
    let backend = FfmpegBackend::new(config.tools.clone());
    let incomplete = merge_all(&session, &list, &options, &backend)?;
    if incomplete > 0 {
        anyhow::bail!("{incomplete} merges were not generated");
    }
    Ok(())
}

/// Merge every group of `list`, returning how many did not produce output.
pub fn merge_all(
    session: &Session,
    list: &str,
    options: &ClipOptions,
    backend: &dyn EncoderBackend,
) -> anyhow::Result<usize> {
    let groups = parse_merge_list(list)?;
    let clips = session.clip_paths(options);
    println!("Merging {} groups", groups.len());

    let results = merge_clips(&session.layout, &groups, &clips, backend);
    let mut incomplete = 0;
    for result in &results {
        match &result.outcome {
            MergeOutcome::Generated { .. } => println!("  [OK]   {}", result.file_name),
            MergeOutcome::Skipped { .. } => {
                println!("  [SKIP] {} (already exists)", result.file_name)
            }
            MergeOutcome::MissingInputs { reason } | MergeOutcome::Failed { reason } => {
                incomplete += 1;
                println!("  [FAIL] {}: {reason}", result.file_name)
            }
        }
    }
    Ok(incomplete)
}
