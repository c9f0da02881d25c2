//! External encoder backends.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use markercut_common::config::ToolPaths;
use markercut_common::error::{MarkercutError, MarkercutResult};

use crate::plan::{EncoderInvocation, Tool};

/// Progress callback for encoder runs.
pub type ProgressCallback = Arc<dyn Fn(EncodeProgress) + Send + Sync>;

/// Encode progress report.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Output time encoded so far.
    pub out_time_secs: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    pub stage: EncodeStage,
}

/// Stages of one encoder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Encoding,
    Finalizing,
    Complete,
}

/// Trait for encoder backends (ffmpeg, test doubles).
pub trait EncoderBackend: Send + Sync {
    /// Run one invocation to completion.
    fn run(
        &self,
        invocation: &EncoderInvocation,
        progress: Option<ProgressCallback>,
    ) -> MarkercutResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Runs ffmpeg and ffplay as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    tools: ToolPaths,
}

impl FfmpegBackend {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Ffmpeg => &self.tools.ffmpeg,
            Tool::Ffplay => &self.tools.ffplay,
        }
    }

    fn run_ffmpeg(
        &self,
        invocation: &EncoderInvocation,
        progress: Option<ProgressCallback>,
    ) -> MarkercutResult<()> {
        tracing::debug!(command = %invocation.display_command(), "Running ffmpeg");
        let mut cmd = Command::new(self.program(Tool::Ffmpeg));
        cmd.args(["-progress", "pipe:1", "-nostats"])
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| MarkercutError::encode(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            stage = ?invocation.stage,
            expected_duration_secs = invocation.expected_duration,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MarkercutError::encode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MarkercutError::encode("Failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks once a full stderr pipe goes unread.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        loop {
            line.clear();
            let bytes = reader.read_line(&mut line).map_err(|e| {
                MarkercutError::encode(format!("Failed reading ffmpeg progress: {e}"))
            })?;
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &latest,
                    invocation.expected_duration,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| MarkercutError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(MarkercutError::encode(format!(
                "ffmpeg {:?} failed (status {status}): {}",
                invocation.stage,
                last_lines(&stderr_output, 20)
            )));
        }

        if let Some(cb) = &progress {
            cb(EncodeProgress {
                progress: 1.0,
                out_time_secs: latest.out_time_secs,
                eta_secs: 0.0,
                stage: EncodeStage::Complete,
            });
        }
        tracing::debug!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg process finished"
        );
        Ok(())
    }

    fn run_ffplay(&self, invocation: &EncoderInvocation) -> MarkercutResult<()> {
        tracing::debug!(command = %invocation.display_command(), "Running ffplay");
        let status = Command::new(self.program(Tool::Ffplay))
            .args(&invocation.args)
            .status()
            .map_err(|e| MarkercutError::encode(format!("Failed to start ffplay: {e}")))?;
        if !status.success() {
            return Err(MarkercutError::encode(format!(
                "ffplay exited with status {status}"
            )));
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegBackend {
    fn run(
        &self,
        invocation: &EncoderInvocation,
        progress: Option<ProgressCallback>,
    ) -> MarkercutResult<()> {
        if let Some(parent) = invocation.output.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }
        match invocation.tool {
            Tool::Ffmpeg => self.run_ffmpeg(invocation, progress),
            Tool::Ffplay => self.run_ffplay(invocation),
        }
    }

    fn is_available(&self) -> bool {
        command_exists(&self.tools.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Whether `binary` runs, either as a path or found on `PATH`.
pub fn command_exists(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Availability of each configured tool, in `ffmpeg, ffprobe, ffplay` order.
pub fn tool_availability(tools: &ToolPaths) -> Vec<(&'static str, PathBuf, bool)> {
    [
        ("ffmpeg", &tools.ffmpeg),
        ("ffprobe", &tools.ffprobe),
        ("ffplay", &tools.ffplay),
    ]
    .into_iter()
    .map(|(name, path)| (name, path.clone(), command_exists(path)))
    .collect()
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> EncodeProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    EncodeProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time_secs: state.out_time_secs,
        eta_secs,
        stage: if state.complete {
            EncodeStage::Finalizing
        } else {
            EncodeStage::Encoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_state_parses_microseconds() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "1500000");
        state.update("frame", "45");
        assert!((state.out_time_secs - 1.5).abs() < 1e-12);
        state.update("out_time_us", "N/A");
        assert!((state.out_time_secs - 1.5).abs() < 1e-12);
        state.update("progress", "continue");
        assert!(!state.complete);
        state.update("progress", "end");
        assert!(state.complete);
    }

    #[test]
    fn test_progress_report_clamps_and_estimates() {
        let state = ProgressState {
            out_time_secs: 2.0,
            complete: false,
        };
        let report = progress_report(&state, 4.0, 10.0);
        assert_eq!(report.stage, EncodeStage::Encoding);
        assert!((report.progress - 0.5).abs() < 1e-12);
        assert!((report.eta_secs - 10.0).abs() < 1e-9);

        let report = progress_report(&state, 0.0, 10.0);
        assert_eq!(report.progress, 0.0);
        assert_eq!(report.eta_secs, 0.0);
    }

    #[test]
    fn test_last_lines_keeps_tail() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("only", 5), "only");
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        assert!(!command_exists(Path::new("markercut-no-such-binary")));
    }
}
