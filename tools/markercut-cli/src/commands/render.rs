//! Encode every marker pair, then merge.

use std::sync::Arc;

use markercut_common::config::AppConfig;
use markercut_render_engine::backend::{EncoderBackend, FfmpegBackend};
use markercut_render_engine::batch::{run_batch, PairOutcome};

use super::args::{ClipArgs, InputArgs, SessionArgs};
use super::merge::merge_all;
use super::session::{init_logging, video_properties, Session};

pub async fn run(
    config: AppConfig,
    session: SessionArgs,
    input: InputArgs,
    clip: ClipArgs,
    merge: bool,
) -> anyhow::Result<()> {
    let session = Session::open(&config, session)?;
    init_logging(&config, Some(session.layout.log_path()));
    let options = clip.to_options()?;

    if session.markers.marker_pairs.is_empty() {
        tracing::warn!("Markers file has no marker pairs");
        return Ok(());
    }

    let backend = FfmpegBackend::new(config.tools.clone());
    if !backend.is_available() {
        anyhow::bail!(
            "ffmpeg not found at {}; run `markercut check`",
            config.tools.ffmpeg.display()
        );
    }

    let input = session.input_video(input)?;
    let video = video_properties(&config, &input, None)?;
    let source = session.source(video, options.clone());
    let ctx = Arc::new(session.batch_context(
        input,
        source,
        Arc::new(backend),
        config.workers(),
    ));

    println!("Rendering {} marker pairs", session.markers.marker_pairs.len());
    println!("  Output: {}", session.layout.dir().display());

    let report = run_batch(Arc::clone(&ctx), &session.markers.marker_pairs).await;
    let report_path = session.layout.report_path();
    if let Err(e) = report.write_json(&report_path) {
        tracing::warn!(path = %report_path.display(), error = %e, "Failed to write batch report");
    }

    for result in &report.results {
        match &result.outcome {
            PairOutcome::Generated { .. } => println!("  [OK]   {}", result.file_name),
            PairOutcome::Skipped { .. } => println!("  [SKIP] {} (already exists)", result.file_name),
            PairOutcome::Failed { reason } => {
                println!("  [FAIL] pair {}: {reason}", result.number)
            }
        }
    }
    println!(
        "Generated {}, skipped {}, failed {}",
        report.generated(),
        report.skipped(),
        report.failed()
    );

    if merge && !session.markers.marker_pair_merge_list.trim().is_empty() {
        merge_all(
            &session,
            &session.markers.marker_pair_merge_list,
            &options,
            ctx.backend.as_ref(),
        )?;
    }

    if report.failed() > 0 {
        anyhow::bail!("{} marker pairs failed", report.failed());
    }
    Ok(())
}
