//! Encoder invocation plans and output naming.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compile::CompiledPair;
use crate::filter_graph::{assemble, seconds, GraphMode, GraphRequest, StabilizationPass};

/// Null muxer target for first passes.
#[cfg(windows)]
const NULL_SINK: &str = "NUL";
#[cfg(not(windows))]
const NULL_SINK: &str = "/dev/null";

/// Encode speed for the throwaway stabilization detect output.
const DETECT_ENCODE_SPEED: u8 = 5;

/// External program an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Ffmpeg,
    Ffplay,
}

/// Role of an invocation within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStage {
    SinglePass,
    FirstPass,
    SecondPass,
    StabilizeDetect,
    StabilizeTransform,
    Preview,
    Concat,
}

/// One external process run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderInvocation {
    pub tool: Tool,
    pub stage: InvocationStage,
    pub args: Vec<String>,
    /// File written on success, if any.
    pub output: Option<PathBuf>,
    /// Expected media duration, for progress reporting.
    pub expected_duration: f64,
}

impl EncoderInvocation {
    /// Shell-like rendering for logs and dry runs.
    pub fn display_command(&self) -> String {
        let program = match self.tool {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffplay => "ffplay",
        };
        let mut out = program.to_string();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains([' ', '\'', '"', ';', '[', '(', '|']) {
                out.push('"');
                out.push_str(&arg.replace('"', "\\\""));
                out.push('"');
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// Ordered invocations producing one clip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipPlan {
    pub number: usize,
    pub file_name: String,
    pub output: PathBuf,
    /// Final-pass filter graph.
    pub graph: String,
    pub output_duration: f64,
    pub invocations: Vec<EncoderInvocation>,
}

/// Where a run's files go: `<output_root>/<title_suffix>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    title_suffix: String,
}

impl OutputLayout {
    pub fn new(output_root: impl AsRef<Path>, title_suffix: impl Into<String>) -> Self {
        let title_suffix = sanitize_file_name(&title_suffix.into());
        Self {
            dir: output_root.as_ref().join(&title_suffix),
            title_suffix,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn title_suffix(&self) -> &str {
        &self.title_suffix
    }

    /// `<prefix->?<suffix>-<n>`.
    pub fn clip_stem(&self, number: usize, title_prefix: Option<&str>) -> String {
        match title_prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!(
                "{}-{}-{number}",
                sanitize_file_name(prefix),
                self.title_suffix
            ),
            None => format!("{}-{number}", self.title_suffix),
        }
    }

    pub fn clip_file_name(&self, number: usize, title_prefix: Option<&str>) -> String {
        format!("{}.webm", self.clip_stem(number, title_prefix))
    }

    pub fn clip_path(&self, number: usize, title_prefix: Option<&str>) -> PathBuf {
        self.dir.join(self.clip_file_name(number, title_prefix))
    }

    /// Stabilization intermediates.
    pub fn shaky_dir(&self) -> PathBuf {
        self.dir.join("shaky")
    }

    pub fn merge_file_name(&self, label: &str) -> String {
        format!("{}-({label}).webm", self.title_suffix)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("inputs.txt")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.title_suffix))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}-report.json", self.title_suffix))
    }
}

/// Make a title usable as a file name on the current platform.
pub fn sanitize_file_name(name: &str) -> String {
    if cfg!(windows) {
        name.chars()
            .filter(|c| !matches!(c, '*' | '?' | '"' | '<' | '>' | '\0'))
            .map(|c| if matches!(c, '/' | '|' | '\\' | ':') { '_' } else { c })
            .collect()
    } else if cfg!(target_os = "macos") {
        name.chars()
            .map(|c| if matches!(c, ':' | '\0') { '_' } else { c })
            .collect()
    } else {
        name.chars()
            .map(|c| if matches!(c, '/' | '\0') { '_' } else { c })
            .collect()
    }
}

/// Inputs for planning one clip.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub compiled: &'a CompiledPair,
    pub input: &'a Path,
    pub layout: &'a OutputLayout,
    pub video_title: &'a str,
    pub source_size: (u32, u32),
    pub frame_rate: f64,
    pub color_space: Option<&'a str>,
}

impl PlanRequest<'_> {
    fn graph(&self, mode: GraphMode, stabilization: Option<StabilizationPass>) -> String {
        let compiled = self.compiled;
        assemble(&GraphRequest {
            mode,
            start: compiled.start,
            end: compiled.end,
            source_size: self.source_size,
            crop: compiled.crop,
            options: &compiled.options,
            color_space: self.color_space,
            composite: &compiled.composite,
            stabilization,
        })
        .render()
    }

    /// Arguments shared by every encode pass.
    fn common_args(&self) -> Vec<String> {
        let compiled = self.compiled;
        let mut args = strings(&["-hide_banner", "-ss"]);
        args.push(seconds(compiled.start));
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(strings(&[
            "-c:v",
            "libvpx-vp9",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "libopus",
            "-b:a",
            "128k",
            "-slices",
            "8",
            "-row-mt",
            "1",
            "-tile-columns",
            "6",
            "-tile-rows",
            "2",
            "-crf",
        ]));
        args.push(compiled.encode.crf.to_string());
        args.push("-b:v".to_string());
        args.push(format!("{}k", compiled.encode.target_max_bitrate));
        args.push("-metadata".to_string());
        args.push(format!("title={}", self.video_title));

        if !compiled.profile.is_variable_speed && compiled.speed > 1.0 {
            args.push("-r".to_string());
            args.push(seconds(self.frame_rate * compiled.speed));
        }

        if compiled.audio {
            args.push("-af".to_string());
            args.push(format!(
                "atrim=0:{},atempo={}",
                seconds(compiled.duration()),
                seconds(compiled.speed)
            ));
        } else {
            args.push("-an".to_string());
        }
        args
    }

    fn passlog_args(&self, stem: &str) -> Vec<String> {
        vec![
            "-passlogfile".to_string(),
            self.layout.dir().join(stem).to_string_lossy().into_owned(),
        ]
    }
}

/// Build the encode plan for one compiled pair.
///
/// Stabilization runs detect then transform; otherwise two-pass runs a
/// null-sink first pass; otherwise a single pass.
pub fn build_clip_plan(request: &PlanRequest<'_>) -> ClipPlan {
    let compiled = request.compiled;
    let layout = request.layout;
    let title_prefix = compiled.options.title_prefix.as_deref();
    let stem = layout.clip_stem(compiled.number, title_prefix);
    let file_name = layout.clip_file_name(compiled.number, title_prefix);
    let output = layout.clip_path(compiled.number, title_prefix);
    let output_duration = compiled.output_duration();
    let encode = compiled.encode;
    let output_arg = output.to_string_lossy().into_owned();

    let invocation = |stage, args: Vec<String>, output: Option<PathBuf>| EncoderInvocation {
        tool: Tool::Ffmpeg,
        stage,
        args,
        output,
        expected_duration: output_duration,
    };

    let (graph, invocations) = if compiled.options.video_stabilization.enabled {
        let shaky = layout.shaky_dir();
        let transforms = shaky.join(format!("{stem}.trf"));
        let shaky_output = shaky.join(format!("{stem}-shaky.webm"));

        let detect_graph = request.graph(
            GraphMode::Encode,
            Some(StabilizationPass::Detect {
                transforms: transforms.clone(),
            }),
        );
        let transform_graph = request.graph(
            GraphMode::Encode,
            Some(StabilizationPass::Transform { transforms }),
        );

        let mut detect = request.common_args();
        detect.extend(strings(&["-f", "webm", "-y", "-vf"]));
        detect.push(detect_graph);
        if encode.two_pass {
            detect.extend(request.passlog_args(&stem));
            detect.extend(strings(&["-pass", "1"]));
        } else {
            detect.push("-speed".to_string());
            detect.push(DETECT_ENCODE_SPEED.to_string());
        }
        detect.push(shaky_output.to_string_lossy().into_owned());

        let mut transform = request.common_args();
        transform.extend(strings(&["-f", "webm", "-n", "-vf"]));
        transform.push(transform_graph.clone());
        if encode.two_pass {
            transform.extend(request.passlog_args(&stem));
            transform.extend(strings(&["-pass", "2"]));
        }
        transform.push("-speed".to_string());
        transform.push(encode.encode_speed.to_string());
        transform.push(output_arg);

        (
            transform_graph,
            vec![
                invocation(InvocationStage::StabilizeDetect, detect, Some(shaky_output)),
                invocation(
                    InvocationStage::StabilizeTransform,
                    transform,
                    Some(output.clone()),
                ),
            ],
        )
    } else if encode.two_pass {
        let graph = request.graph(GraphMode::Encode, None);

        let mut first = request.common_args();
        first.push("-vf".to_string());
        first.push(graph.clone());
        first.extend(request.passlog_args(&stem));
        first.extend(strings(&["-pass", "1", "-f", "null", "-y", NULL_SINK]));

        let mut second = request.common_args();
        second.extend(strings(&["-f", "webm", "-n", "-vf"]));
        second.push(graph.clone());
        second.push("-speed".to_string());
        second.push(encode.encode_speed.to_string());
        second.extend(request.passlog_args(&stem));
        second.extend(strings(&["-pass", "2"]));
        second.push(output_arg);

        (
            graph,
            vec![
                invocation(InvocationStage::FirstPass, first, None),
                invocation(InvocationStage::SecondPass, second, Some(output.clone())),
            ],
        )
    } else {
        let graph = request.graph(GraphMode::Encode, None);
        let mut args = request.common_args();
        args.extend(strings(&["-f", "webm", "-n", "-vf"]));
        args.push(graph.clone());
        args.push("-speed".to_string());
        args.push(encode.encode_speed.to_string());
        args.push(output_arg);
        (
            graph,
            vec![invocation(
                InvocationStage::SinglePass,
                args,
                Some(output.clone()),
            )],
        )
    };

    ClipPlan {
        number: compiled.number,
        file_name,
        output,
        graph,
        output_duration,
        invocations,
    }
}

/// Build an ffplay preview of one compiled pair from a local input.
///
/// The geometry-only graph is passed as a second `-vf`, which ffplay lets
/// the viewer toggle to compare against the corrected output.
pub fn build_preview_invocation(request: &PlanRequest<'_>) -> EncoderInvocation {
    let compiled = request.compiled;
    let mode = GraphMode::Preview;
    let graph = assemble(&GraphRequest {
        mode,
        start: compiled.start,
        end: compiled.end,
        source_size: request.source_size,
        crop: compiled.crop,
        options: &compiled.options,
        color_space: request.color_space,
        composite: &compiled.composite,
        stabilization: None,
    });

    let mut args = strings(&["-hide_banner", "-ss"]);
    args.push(seconds(compiled.start));
    args.push("-i".to_string());
    args.push(request.input.to_string_lossy().into_owned());
    args.extend(strings(&[
        "-fs", "-sync", "video", "-fast", "-genpts", "-infbuf", "-loop", "0", "-vf",
    ]));
    args.push(graph.render());
    args.push("-vf".to_string());
    args.push(graph.correction_free_prefix());

    if compiled.audio {
        args.push("-af".to_string());
        args.push(format!(
            "atrim={}:{},atempo={}",
            seconds(compiled.start),
            seconds(compiled.end),
            seconds(compiled.speed)
        ));
    } else {
        args.push("-an".to_string());
    }

    EncoderInvocation {
        tool: Tool::Ffplay,
        stage: InvocationStage::Preview,
        args,
        output: None,
        expected_duration: compiled.output_duration(),
    }
}

/// Stream-copy concatenation of the clips listed in `manifest`.
pub fn build_concat_invocation(manifest: &Path, output: &Path) -> EncoderInvocation {
    let mut args = strings(&["-n", "-hide_banner", "-f", "concat", "-safe", "0", "-i"]);
    args.push(manifest.to_string_lossy().into_owned());
    args.extend(strings(&["-c", "copy"]));
    args.push(output.to_string_lossy().into_owned());
    EncoderInvocation {
        tool: Tool::Ffmpeg,
        stage: InvocationStage::Concat,
        args,
        output: Some(output.to_path_buf()),
        expected_duration: 0.0,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile_pair, SourceContext};
    use markercut_clip_model::crop::CropMultiple;
    use markercut_clip_model::markers::MarkerPair;
    use markercut_clip_model::settings::{ClipOptions, StabilizationPreset};
    use markercut_clip_model::video::{FrameRate, VideoProperties};

    fn source(options: ClipOptions) -> SourceContext {
        SourceContext {
            video: VideoProperties {
                width: 1920,
                height: 1080,
                frame_rate: FrameRate::new(30, 1).unwrap(),
                bit_rate_kbps: Some(5000.0),
                color_space: Some("bt709".to_string()),
            },
            crop_multiple: CropMultiple::IDENTITY,
            options,
        }
    }

    fn plan_for(pair: &MarkerPair, options: ClipOptions) -> ClipPlan {
        let ctx = source(options);
        let compiled = compile_pair(pair, 3, &ctx).unwrap();
        let layout = OutputLayout::new("/out", "session");
        build_clip_plan(&PlanRequest {
            compiled: &compiled,
            input: Path::new("/media/in.mp4"),
            layout: &layout,
            video_title: "My Video",
            source_size: (1920, 1080),
            frame_rate: 30.0,
            color_space: None,
        })
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_layout_names() {
        let layout = OutputLayout::new("webms", "trip");
        assert_eq!(layout.clip_file_name(2, None), "trip-2.webm");
        assert_eq!(layout.clip_file_name(2, Some("best")), "best-trip-2.webm");
        assert_eq!(layout.merge_file_name("1-3,5"), "trip-(1-3,5).webm");
        assert_eq!(layout.dir(), Path::new("webms/trip"));
        assert_eq!(layout.manifest_path(), Path::new("webms/trip/inputs.txt"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_sanitize_replaces_path_separators() {
        assert_eq!(sanitize_file_name("a/b"), "a_b");
    }

    #[test]
    fn test_single_pass_plan() {
        let mut pair = MarkerPair::new(12.0, 15.0);
        pair.speed = 2.0;
        let plan = plan_for(
            &pair,
            ClipOptions {
                audio: true,
                ..ClipOptions::default()
            },
        );

        assert_eq!(plan.file_name, "session-3.webm");
        assert_eq!(plan.invocations.len(), 1);
        let inv = &plan.invocations[0];
        assert_eq!(inv.stage, InvocationStage::SinglePass);
        assert_eq!(flag_value(&inv.args, "-ss"), Some("12"));
        assert_eq!(flag_value(&inv.args, "-i"), Some("/media/in.mp4"));
        assert_eq!(flag_value(&inv.args, "-crf"), Some("22"));
        assert_eq!(flag_value(&inv.args, "-b:v"), Some("7500k"));
        assert_eq!(flag_value(&inv.args, "-r"), Some("60"));
        assert_eq!(flag_value(&inv.args, "-af"), Some("atrim=0:3,atempo=2"));
        assert_eq!(flag_value(&inv.args, "-speed"), Some("3"));
        assert_eq!(flag_value(&inv.args, "-metadata"), Some("title=My Video"));
        assert!(inv.args.contains(&"-n".to_string()));
        assert_eq!(inv.args.last().map(String::as_str), Some("/out/session/session-3.webm"));
        assert_eq!(flag_value(&inv.args, "-vf"), Some(plan.graph.as_str()));
    }

    #[test]
    fn test_two_pass_plan_shares_pass_log() {
        let plan = plan_for(
            &MarkerPair::new(0.0, 2.0),
            ClipOptions {
                two_pass: true,
                ..ClipOptions::default()
            },
        );
        let [first, second] = plan.invocations.as_slice() else {
            panic!("expected two invocations");
        };
        assert_eq!(first.stage, InvocationStage::FirstPass);
        assert_eq!(flag_value(&first.args, "-pass"), Some("1"));
        assert_eq!(flag_value(&first.args, "-f"), Some("null"));
        assert!(first.output.is_none());
        assert_eq!(flag_value(&second.args, "-pass"), Some("2"));
        assert_eq!(
            flag_value(&first.args, "-passlogfile"),
            flag_value(&second.args, "-passlogfile")
        );
        assert!(first.args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_stabilization_plan_orders_detect_before_transform() {
        let plan = plan_for(
            &MarkerPair::new(0.0, 2.0),
            ClipOptions {
                video_stabilization: StabilizationPreset::from_level(2).unwrap(),
                ..ClipOptions::default()
            },
        );
        let [detect, transform] = plan.invocations.as_slice() else {
            panic!("expected two invocations");
        };
        assert_eq!(detect.stage, InvocationStage::StabilizeDetect);
        assert!(flag_value(&detect.args, "-vf").unwrap().contains("vidstabdetect"));
        assert_eq!(flag_value(&detect.args, "-speed"), Some("5"));
        assert_eq!(
            detect.output.as_deref(),
            Some(Path::new("/out/session/shaky/session-3-shaky.webm"))
        );
        assert_eq!(transform.stage, InvocationStage::StabilizeTransform);
        assert!(plan.graph.contains("vidstabtransform=input='/out/session/shaky/session-3.trf'"));
        assert!(flag_value(&transform.args, "-pass").is_none());
    }

    #[test]
    fn test_preview_invocation() {
        let ctx = source(ClipOptions::default());
        let compiled = compile_pair(&MarkerPair::new(4.0, 6.0), 1, &ctx).unwrap();
        let layout = OutputLayout::new("/out", "session");
        let inv = build_preview_invocation(&PlanRequest {
            compiled: &compiled,
            input: Path::new("in.mp4"),
            layout: &layout,
            video_title: "",
            source_size: (1920, 1080),
            frame_rate: 30.0,
            color_space: None,
        });
        assert_eq!(inv.tool, Tool::Ffplay);
        let vfs: Vec<&String> = inv
            .args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && inv.args[i - 1] == "-vf")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(vfs.len(), 2);
        assert!(vfs[0].starts_with("trim=4:6,"));
        assert!(vfs[0].contains("setpts="));
        assert_eq!(
            vfs[1].as_str(),
            "trim=4:6,crop=x=0:y=0:w=1920:h=1080,scale=w=iw/2:h=ih/2"
        );
    }

    #[test]
    fn test_concat_invocation() {
        let inv = build_concat_invocation(Path::new("d/inputs.txt"), Path::new("d/s-(1-2).webm"));
        assert_eq!(
            inv.display_command(),
            "ffmpeg -n -hide_banner -f concat -safe 0 -i d/inputs.txt -c copy \"d/s-(1-2).webm\""
        );
    }
}
