//! Play marker pairs with ffplay, one given pair or interactively.

use std::io::{BufRead, Write};
use std::sync::Arc;

use markercut_common::config::AppConfig;
use markercut_render_engine::backend::{EncoderBackend, FfmpegBackend};
use markercut_render_engine::batch::BatchContext;
use markercut_render_engine::compile::compile_pair;
use markercut_render_engine::plan::build_preview_invocation;

use super::args::{ClipArgs, InputArgs, SessionArgs};
use super::session::{init_logging, video_properties, Session};

pub fn run(
    config: AppConfig,
    session: SessionArgs,
    input: InputArgs,
    clip: ClipArgs,
    pair: Option<usize>,
) -> anyhow::Result<()> {
    init_logging(&config, None);
    let session = Session::open(&config, session)?;
    let options = clip.to_options()?;
    let input = session.input_video(input)?;

    let video = video_properties(&config, &input, None)?;
    let backend = FfmpegBackend::new(config.tools.clone());
    let source = session.source(video, options);
    let ctx = session.batch_context(input, source, Arc::new(backend.clone()), 1);
    let count = session.markers.marker_pairs.len();

    if let Some(pair) = pair {
        return preview_pair(&session, &ctx, &backend, pair);
    }

    if count == 0 {
        anyhow::bail!("markers file has no marker pairs");
    }
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Marker pair number (1-{count}) or q to quit: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        match parse_pair_choice(&line, count) {
            PairChoice::Quit => break,
            PairChoice::Pair(pair) => {
                if let Err(e) = preview_pair(&session, &ctx, &backend, pair) {
                    tracing::error!(pair, error = %e, "Preview failed");
                }
            }
            PairChoice::Invalid(reason) => tracing::error!("{reason}"),
        }
    }
    Ok(())
}

fn preview_pair(
    session: &Session,
    ctx: &BatchContext,
    backend: &FfmpegBackend,
    pair: usize,
) -> anyhow::Result<()> {
    let marker_pair = pair
        .checked_sub(1)
        .and_then(|i| session.markers.marker_pairs.get(i))
        .ok_or_else(|| anyhow::anyhow!("marker pair {pair} does not exist"))?;
    let compiled = compile_pair(marker_pair, pair, &ctx.source)?;
    let invocation = build_preview_invocation(&ctx.plan_request(&compiled));

    println!(
        "Previewing pair {pair} ({:.3}s - {:.3}s); press W in ffplay to toggle the corrected view",
        compiled.start, compiled.end
    );
    backend.run(&invocation, None)?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum PairChoice {
    Quit,
    Pair(usize),
    Invalid(String),
}

/// Blank input or `q`/`quit` ends the loop.
fn parse_pair_choice(line: &str, count: usize) -> PairChoice {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return PairChoice::Quit;
    }
    match line.parse::<usize>() {
        Ok(pair) if (1..=count).contains(&pair) => PairChoice::Pair(pair),
        Ok(pair) => PairChoice::Invalid(format!("{pair} is not a valid marker pair number")),
        Err(_) => PairChoice::Invalid(format!("{line} is not a valid number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_choices() {
        assert_eq!(parse_pair_choice(" 2 \n", 3), PairChoice::Pair(2));
        assert_eq!(parse_pair_choice("q", 3), PairChoice::Quit);
        assert_eq!(parse_pair_choice("QUIT", 3), PairChoice::Quit);
        assert_eq!(parse_pair_choice("", 3), PairChoice::Quit);
        assert!(matches!(parse_pair_choice("0", 3), PairChoice::Invalid(_)));
        assert!(matches!(parse_pair_choice("4", 3), PairChoice::Invalid(_)));
        assert!(matches!(parse_pair_choice("two", 3), PairChoice::Invalid(_)));
    }
}
