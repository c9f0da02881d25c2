//! Batch clip generation.
//!
//! Each marker pair is compiled, planned, and encoded independently. A pair
//! whose output already exists is skipped, so re-running a batch only fills
//! in what is missing. A failing pair is logged and the batch moves on.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use markercut_clip_model::markers::MarkerPair;
use markercut_common::error::{MarkercutError, MarkercutResult};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::backend::{EncodeProgress, EncoderBackend, ProgressCallback};
use crate::compile::{compile_pair, CompiledPair, SourceContext};
use crate::plan::{build_clip_plan, ClipPlan, OutputLayout, PlanRequest};

/// Everything scoped to one batch run.
pub struct BatchContext {
    pub input: PathBuf,
    pub layout: OutputLayout,
    pub source: SourceContext,
    pub video_title: String,
    pub backend: Arc<dyn EncoderBackend>,
    pub max_parallel: usize,
}

impl BatchContext {
    /// Output path a pair is (or would be) written to.
    pub fn clip_path(&self, pair: &MarkerPair, number: usize) -> PathBuf {
        let options = self.source.options_for(pair);
        self.layout.clip_path(number, options.title_prefix.as_deref())
    }

    /// Compile and plan one pair without running anything.
    pub fn plan_pair(&self, pair: &MarkerPair, number: usize) -> MarkercutResult<ClipPlan> {
        let compiled = compile_pair(pair, number, &self.source)?;
        Ok(build_clip_plan(&self.plan_request(&compiled)))
    }

    /// Plan inputs for an already compiled pair.
    pub fn plan_request<'a>(&'a self, compiled: &'a CompiledPair) -> PlanRequest<'a> {
        let video = &self.source.video;
        PlanRequest {
            compiled,
            input: &self.input,
            layout: &self.layout,
            video_title: &self.video_title,
            source_size: (video.width, video.height),
            frame_rate: video.frame_rate.as_f64(),
            color_space: video.color_space.as_deref(),
        }
    }
}

/// What happened to one marker pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Generated { path: PathBuf },
    Skipped { path: PathBuf },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResult {
    pub number: usize,
    pub file_name: String,
    pub outcome: PairOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_duration: Option<f64>,
}

/// Results of a batch, in marker pair order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<PairResult>,
}

impl BatchReport {
    pub fn generated(&self) -> usize {
        self.count(|o| matches!(o, PairOutcome::Generated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PairOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PairOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&PairOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &std::path::Path) -> MarkercutResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Generate one clip, blocking until its invocations finish.
pub fn process_pair(ctx: &BatchContext, pair: &MarkerPair, number: usize) -> PairResult {
    let path = ctx.clip_path(pair, number);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if path.is_file() {
        info!(pair = number, file = %file_name, "Skipped existing file");
        return PairResult {
            number,
            file_name,
            outcome: PairOutcome::Skipped { path },
            output_duration: None,
        };
    }

    info!(pair = number, file = %file_name, "Generating clip");
    let failed = |err: MarkercutError| {
        let reason = err.to_string();
        error!(pair = number, file = %file_name, %reason, "Marker pair generation failed");
        if !err.is_pair_local() {
            warn!(pair = number, "Failure is not specific to this pair; later pairs may fail too");
        }
        PairResult {
            number,
            file_name: file_name.clone(),
            outcome: PairOutcome::Failed { reason },
            output_duration: None,
        }
    };

    let plan = match ctx.plan_pair(pair, number) {
        Ok(plan) => plan,
        Err(err) => return failed(err),
    };

    if let Err(err) = std::fs::create_dir_all(ctx.layout.dir()) {
        return failed(err.into());
    }

    let passes = plan.invocations.len();
    for (i, invocation) in plan.invocations.iter().enumerate() {
        if passes > 1 {
            info!(pair = number, pass = i + 1, of = passes, stage = ?invocation.stage, "Running pass");
        }
        tracing::debug!(pair = number, command = %invocation.display_command(), "Encoder command");
        if let Err(err) = ctx.backend.run(invocation, Some(progress_logger(number))) {
            return failed(err);
        }
    }

    info!(pair = number, file = %plan.file_name, "Successfully generated");
    PairResult {
        number,
        file_name: plan.file_name,
        outcome: PairOutcome::Generated { path: plan.output },
        output_duration: Some(plan.output_duration),
    }
}

/// Debug-log encoder progress in quarter steps.
fn progress_logger(number: usize) -> ProgressCallback {
    let logged_quarter = AtomicU8::new(0);
    Arc::new(move |p: EncodeProgress| {
        let quarter = (p.progress * 4.0).floor().clamp(0.0, 4.0) as u8;
        if quarter > logged_quarter.fetch_max(quarter, Ordering::Relaxed) {
            tracing::debug!(
                pair = number,
                percent = quarter * 25,
                eta_secs = p.eta_secs.round(),
                "Encode progress"
            );
        }
    })
}

/// Generate every marker pair, at most `max_parallel` at a time.
///
/// Results come back in marker pair order regardless of completion order.
pub async fn run_batch(ctx: Arc<BatchContext>, pairs: &[MarkerPair]) -> BatchReport {
    let started_at = Utc::now();
    let permits = Arc::new(Semaphore::new(ctx.max_parallel.max(1)));
    info!(
        pairs = pairs.len(),
        max_parallel = ctx.max_parallel.max(1),
        backend = ctx.backend.name(),
        "Starting batch"
    );

    let mut handles = Vec::with_capacity(pairs.len());
    for (i, pair) in pairs.iter().enumerate() {
        let number = i + 1;
        let ctx = Arc::clone(&ctx);
        let pair = pair.clone();
        let permits = Arc::clone(&permits);
        handles.push((
            number,
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                tokio::task::spawn_blocking(move || process_pair(&ctx, &pair, number)).await
            }),
        ));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (number, handle) in handles {
        let result = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) | Err(err) => {
                error!(pair = number, error = %err, "Marker pair worker failed");
                PairResult {
                    number,
                    file_name: String::new(),
                    outcome: PairOutcome::Failed {
                        reason: err.to_string(),
                    },
                    output_duration: None,
                }
            }
        };
        results.push(result);
    }

    let report = BatchReport {
        started_at,
        finished_at: Utc::now(),
        results,
    };
    info!(
        generated = report.generated(),
        skipped = report.skipped(),
        failed = report.failed(),
        elapsed_secs = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0,
        "Batch finished"
    );
    report
}
