//! Dry run: show what each marker pair would be encoded with.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use markercut_common::config::AppConfig;
use markercut_render_engine::backend::FfmpegBackend;
use markercut_render_engine::compile::{compile_pair, CompiledPair};
use markercut_render_engine::plan::{build_clip_plan, ClipPlan};
use serde::Serialize;

use super::args::{ClipArgs, SessionArgs, VideoArgs};
use super::session::{init_logging, video_properties, Session};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedPair {
    number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    compiled: Option<CompiledPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<ClipPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(
    config: AppConfig,
    session: SessionArgs,
    input: Option<PathBuf>,
    clip: ClipArgs,
    video: VideoArgs,
    pair: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    init_logging(&config, None);
    let session = Session::open(&config, session)?;
    let options = clip.to_options()?;

    let known = video.properties()?;
    let input = match (input, known.is_some()) {
        (Some(input), _) => input,
        (None, true) => PathBuf::from("input.mp4"),
        (None, false) => anyhow::bail!(
            "--input is required unless --video-width, --video-height and --video-fps are given"
        ),
    };
    let video = video_properties(&config, &input, known)?;

    let pairs = &session.markers.marker_pairs;
    let selected: Vec<usize> = match pair {
        Some(n) if n >= 1 && n <= pairs.len() => vec![n],
        Some(n) => anyhow::bail!("marker pair {n} does not exist ({} defined)", pairs.len()),
        None => (1..=pairs.len()).collect(),
    };

    let source = session.source(video, options);
    let ctx = session.batch_context(
        input,
        source,
        Arc::new(FfmpegBackend::new(config.tools.clone())),
        config.workers(),
    );

    let planned: Vec<PlannedPair> = selected
        .into_iter()
        .map(|number| match compile_pair(&pairs[number - 1], number, &ctx.source) {
            Ok(compiled) => {
                let plan = build_clip_plan(&ctx.plan_request(&compiled));
                PlannedPair {
                    number,
                    compiled: Some(compiled),
                    plan: Some(plan),
                    error: None,
                }
            }
            Err(err) => PlannedPair {
                number,
                compiled: None,
                plan: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&planned).context("Failed to serialize plans")?;
        println!("{text}");
        return Ok(());
    }

    for entry in &planned {
        print_pair(entry);
    }
    Ok(())
}

fn print_pair(entry: &PlannedPair) {
    let (Some(compiled), Some(plan)) = (&entry.compiled, &entry.plan) else {
        println!(
            "Pair {}: {}",
            entry.number,
            entry.error.as_deref().unwrap_or("not planned")
        );
        println!();
        return;
    };

    let encode = &compiled.encode;
    println!("Pair {}: {}", entry.number, plan.file_name);
    println!(
        "  Input:    {:.3}s - {:.3}s ({:.3}s)",
        compiled.start,
        compiled.end,
        compiled.duration()
    );
    println!("  Output:   {:.3}s", plan.output_duration);
    println!(
        "  Loop:     {}  variable speed: {}  audio: {}",
        compiled.options.loop_mode.as_str(),
        compiled.profile.is_variable_speed,
        compiled.audio
    );
    println!(
        "  Encode:   crf {}, max {}k, speed {}, two-pass {}",
        encode.crf, encode.target_max_bitrate, encode.encode_speed, encode.two_pass
    );
    println!("  Graph:    {}", plan.graph);
    for invocation in &plan.invocations {
        println!("  $ {}", invocation.display_command());
    }
    println!();
}
