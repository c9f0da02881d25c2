//! Loading a markers file and deriving everything scoped to one run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use markercut_clip_model::crop::CropMultiple;
use markercut_clip_model::markers::MarkersFile;
use markercut_clip_model::settings::{resolve, ClipOptions};
use markercut_clip_model::video::VideoProperties;
use markercut_common::config::{AppConfig, LoggingConfig};
use markercut_render_engine::backend::EncoderBackend;
use markercut_render_engine::batch::BatchContext;
use markercut_render_engine::compile::SourceContext;
use markercut_render_engine::plan::OutputLayout;
use markercut_render_engine::probe::probe_video;

use super::args::{InputArgs, SessionArgs};

pub struct Session {
    pub markers: MarkersFile,
    pub layout: OutputLayout,
    args: SessionArgs,
}

impl Session {
    pub fn open(config: &AppConfig, args: SessionArgs) -> anyhow::Result<Self> {
        let markers = MarkersFile::load(&args.markers)
            .with_context(|| format!("Failed to load markers {}", args.markers.display()))?;
        let suffix = title_suffix(&markers, &args.markers, args.title_suffix.as_deref());
        let root = args
            .output_root
            .clone()
            .unwrap_or_else(|| config.output_root.clone());
        Ok(Self {
            markers,
            layout: OutputLayout::new(root, suffix),
            args,
        })
    }

    /// Title written into clip metadata.
    pub fn video_title(&self) -> String {
        if self.markers.video_title.trim().is_empty() {
            self.layout.title_suffix().to_string()
        } else {
            self.markers.video_title.clone()
        }
    }

    pub fn source(&self, video: VideoProperties, options: ClipOptions) -> SourceContext {
        SourceContext {
            crop_multiple: resolve_crop_multiple(&self.args, &self.markers, &video),
            video,
            options,
        }
    }

    pub fn batch_context(
        &self,
        input: PathBuf,
        source: SourceContext,
        backend: Arc<dyn EncoderBackend>,
        max_parallel: usize,
    ) -> BatchContext {
        BatchContext {
            input,
            layout: self.layout.clone(),
            source,
            video_title: self.video_title(),
            backend,
            max_parallel,
        }
    }

    /// The explicit input, else the first `<titleSuffix>-full.*` in the
    /// output folder unless auto-discovery is off.
    pub fn input_video(&self, args: InputArgs) -> anyhow::Result<PathBuf> {
        if let Some(input) = args.input {
            return Ok(input);
        }
        if args.no_auto_find_input_video {
            anyhow::bail!("no input video given; pass --input");
        }

        let suffix = self.layout.title_suffix();
        let mut found = find_input_videos(self.layout.dir(), suffix).into_iter();
        let Some(input) = found.next() else {
            anyhow::bail!(
                "no input video given and no {suffix}-full.* in {}; pass --input",
                self.layout.dir().display()
            );
        };
        tracing::info!(path = %input.display(), "Using found input video");
        let others: Vec<PathBuf> = found.collect();
        if !others.is_empty() {
            tracing::warn!(?others, "Found other potential input videos");
        }
        Ok(input)
    }

    /// Expected clip path of every marker pair, in pair order.
    pub fn clip_paths(&self, options: &ClipOptions) -> Vec<PathBuf> {
        self.markers
            .marker_pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                let resolved = resolve(options, &pair.overrides);
                self.layout
                    .clip_path(i + 1, resolved.title_prefix.as_deref())
            })
            .collect()
    }
}

/// Explicit suffix, else the markers' `titleSuffix`, else the markers file stem.
pub fn title_suffix(markers: &MarkersFile, path: &Path, explicit: Option<&str>) -> String {
    explicit
        .or(markers.title_suffix.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "markers".to_string())
        })
}

/// Files in `dir` named `<title_suffix>-full.<ext>`, sorted by name.
pub fn find_input_videos(dir: &Path, title_suffix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let prefix = format!("{title_suffix}-full.");
    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let Some(ext) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                return false;
            };
            !ext.is_empty() && !ext.contains('.') && entry.path().is_file()
        })
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found
}

/// Explicit multiples win; otherwise crops authored at a different
/// resolution are scaled to the video unless auto-scaling is off.
pub fn resolve_crop_multiple(
    args: &SessionArgs,
    markers: &MarkersFile,
    video: &VideoProperties,
) -> CropMultiple {
    if let Some(factor) = args.multiply_crop {
        return CropMultiple::uniform(factor);
    }
    if args.multiply_crop_x.is_some() || args.multiply_crop_y.is_some() {
        return CropMultiple {
            x: args.multiply_crop_x.unwrap_or(1.0),
            y: args.multiply_crop_y.unwrap_or(1.0),
        };
    }
    if args.no_auto_scale_crop_res {
        return CropMultiple::IDENTITY;
    }
    match CropMultiple::from_resolution_mismatch(
        video,
        markers.crop_res_width,
        markers.crop_res_height,
    ) {
        Some(multiple) => {
            tracing::warn!(
                crop_res = %format!("{}x{}", markers.crop_res_width, markers.crop_res_height),
                video_res = %format!("{}x{}", video.width, video.height),
                multiply_x = multiple.x,
                multiply_y = multiple.y,
                "Crop resolution does not match video resolution; scaling crops"
            );
            multiple
        }
        None => CropMultiple::IDENTITY,
    }
}

/// Probe `input` unless `known` properties were supplied.
pub fn video_properties(
    config: &AppConfig,
    input: &Path,
    known: Option<VideoProperties>,
) -> anyhow::Result<VideoProperties> {
    match known {
        Some(video) => Ok(video),
        None => probe_video(&config.tools.ffprobe, input)
            .with_context(|| format!("Failed to probe {}", input.display())),
    }
}

/// Install logging, optionally appending to `file` as well.
pub fn init_logging(config: &AppConfig, file: Option<PathBuf>) {
    let file = file.or_else(|| config.logging.file.clone());
    if let Some(parent) = file.as_deref().and_then(Path::parent) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {e}", parent.display());
        }
    }
    markercut_common::logging::init_logging(&LoggingConfig {
        file,
        ..config.logging.clone()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use markercut_clip_model::video::FrameRate;

    fn args() -> SessionArgs {
        SessionArgs {
            markers: PathBuf::from("/clips/Trip Highlights.json"),
            output_root: None,
            title_suffix: None,
            multiply_crop: None,
            multiply_crop_x: None,
            multiply_crop_y: None,
            no_auto_scale_crop_res: false,
        }
    }

    fn markers(crop_res: (u32, u32)) -> MarkersFile {
        let json = format!(
            r#"{{"videoTitle": "Trip", "cropResWidth": {}, "cropResHeight": {}, "markerPairs": []}}"#,
            crop_res.0, crop_res.1
        );
        MarkersFile::parse(&json, Path::new("m.json")).unwrap()
    }

    fn video() -> VideoProperties {
        VideoProperties {
            width: 1920,
            height: 1080,
            frame_rate: FrameRate::new(30, 1).unwrap(),
            bit_rate_kbps: None,
            color_space: None,
        }
    }

    #[test]
    fn test_title_suffix_precedence() {
        let mut m = markers((1920, 1080));
        let path = Path::new("/clips/Trip Highlights.json");
        assert_eq!(title_suffix(&m, path, None), "Trip Highlights");
        m.title_suffix = Some("trip".to_string());
        assert_eq!(title_suffix(&m, path, None), "trip");
        assert_eq!(title_suffix(&m, path, Some("cut")), "cut");
        assert_eq!(title_suffix(&m, path, Some("  ")), "trip");
    }

    #[test]
    fn test_input_video_discovery() {
        let root = std::env::temp_dir().join(format!("markercut-find-{}", std::process::id()));
        let session = Session {
            markers: markers((1920, 1080)),
            layout: OutputLayout::new(&root, "trip"),
            args: args(),
        };
        let dir = session.layout.dir().to_path_buf();
        std::fs::create_dir_all(dir.join("trip-full.d")).unwrap();
        for name in [
            "trip-full.webm",
            "trip-full.mkv",
            "trip-full.webm.part",
            "trip-1.webm",
            "other-full.mp4",
        ] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let found = find_input_videos(&dir, "trip");
        assert_eq!(found, vec![dir.join("trip-full.mkv"), dir.join("trip-full.webm")]);
        assert_eq!(find_input_videos(&dir, "other"), vec![dir.join("other-full.mp4")]);
        assert!(find_input_videos(&root.join("nope"), "trip").is_empty());

        assert_eq!(
            session.input_video(InputArgs::default()).unwrap(),
            dir.join("trip-full.mkv")
        );
        let explicit = InputArgs {
            input: Some(PathBuf::from("given.mp4")),
            no_auto_find_input_video: false,
        };
        assert_eq!(session.input_video(explicit).unwrap(), PathBuf::from("given.mp4"));
        let off = InputArgs {
            input: None,
            no_auto_find_input_video: true,
        };
        assert!(session.input_video(off).is_err());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_crop_multiple_resolution() {
        let video = video();
        let mismatched = markers((1280, 720));
        assert_eq!(
            resolve_crop_multiple(&args(), &mismatched, &video),
            CropMultiple::uniform(1.5)
        );

        let mut no_auto = args();
        no_auto.no_auto_scale_crop_res = true;
        assert!(resolve_crop_multiple(&no_auto, &mismatched, &video).is_identity());

        let mut per_axis = args();
        per_axis.multiply_crop_y = Some(2.0);
        assert_eq!(
            resolve_crop_multiple(&per_axis, &mismatched, &video),
            CropMultiple { x: 1.0, y: 2.0 }
        );

        assert!(resolve_crop_multiple(&args(), &markers((1920, 1080)), &video).is_identity());
    }
}
