//! Merging generated clips with ffmpeg's concat demuxer.

use std::path::{Path, PathBuf};

use markercut_clip_model::merge_list::MergeGroup;
use markercut_common::error::{MarkercutError, MarkercutResult};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::backend::EncoderBackend;
use crate::plan::{build_concat_invocation, OutputLayout};

/// What happened to one merge group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeOutcome {
    Generated { path: PathBuf },
    Skipped { path: PathBuf },
    /// A referenced clip was never generated; nothing was attempted.
    MissingInputs { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub label: String,
    pub file_name: String,
    pub outcome: MergeOutcome,
}

/// Concat manifest for one group: one `file '<name>'` line per clip.
///
/// `clips[n - 1]` is the expected output of marker pair `n`. Names are
/// relative to the manifest, which lives beside the clips.
pub fn build_manifest(group: &MergeGroup, clips: &[PathBuf]) -> MarkercutResult<String> {
    let mut manifest = String::new();
    for &index in &group.indices {
        let path = index
            .checked_sub(1)
            .and_then(|i| clips.get(i))
            .ok_or_else(|| {
                MarkercutError::missing_clip(
                    index,
                    format!("only {} marker pairs are defined", clips.len()),
                )
            })?;
        if !path.is_file() {
            return Err(MarkercutError::missing_clip(
                index,
                format!("{} has not been generated", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MarkercutError::missing_clip(index, "clip path has no file name"))?;
        manifest.push_str(&format!("file '{}'\n", name.replace('\'', "'\\''")));
    }
    Ok(manifest)
}

/// Merge each group into `<suffix>-(<label>).webm`.
///
/// Groups are independent: a missing clip or failed concat only affects its
/// own group. Existing merged outputs are skipped.
pub fn merge_clips(
    layout: &OutputLayout,
    groups: &[MergeGroup],
    clips: &[PathBuf],
    backend: &dyn EncoderBackend,
) -> Vec<MergeResult> {
    groups
        .iter()
        .map(|group| merge_group(layout, group, clips, backend))
        .collect()
}

fn merge_group(
    layout: &OutputLayout,
    group: &MergeGroup,
    clips: &[PathBuf],
    backend: &dyn EncoderBackend,
) -> MergeResult {
    let file_name = layout.merge_file_name(&group.label);
    let output = layout.dir().join(&file_name);
    let result = |outcome| MergeResult {
        label: group.label.clone(),
        file_name: file_name.clone(),
        outcome,
    };

    if output.is_file() {
        info!(file = %file_name, "Skipped existing file");
        return result(MergeOutcome::Skipped { path: output });
    }

    let manifest = match build_manifest(group, clips) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(merge = %group.label, error = %err, "Aborting merge");
            return result(MergeOutcome::MissingInputs {
                reason: err.to_string(),
            });
        }
    };

    info!(file = %file_name, clips = ?group.indices, "Generating merged clip");
    let manifest_path = layout.manifest_path();
    let outcome = write_and_concat(&manifest_path, &manifest, &output, backend);
    if let Err(err) = std::fs::remove_file(&manifest_path) {
        tracing::debug!(error = %err, path = %manifest_path.display(), "Could not remove concat manifest");
    }

    match outcome {
        Ok(()) => {
            info!(file = %file_name, "Successfully generated");
            result(MergeOutcome::Generated { path: output })
        }
        Err(err) => {
            error!(file = %file_name, error = %err, "Failed to generate merged clip");
            result(MergeOutcome::Failed {
                reason: err.to_string(),
            })
        }
    }
}

fn write_and_concat(
    manifest_path: &Path,
    manifest: &str,
    output: &Path,
    backend: &dyn EncoderBackend,
) -> MarkercutResult<()> {
    if let Some(parent) = manifest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(manifest_path, manifest)?;
    backend.run(&build_concat_invocation(manifest_path, output), None)
}
