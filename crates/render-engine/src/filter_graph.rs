//! Filter-graph IR and assembly.
//!
//! A clip's video filters are built as an ordered list of typed stages and
//! rendered to ffmpeg filter-graph text only at the process boundary.
//! Stages are appended in a fixed order; the graph tracks the frame size as
//! crop, half-scale, and transpose stages change it.

use std::path::PathBuf;

use markercut_clip_model::crop::{format_pixels, CropRect};
use markercut_clip_model::settings::{ClipOptions, Rotation};
use markercut_processing_core::loop_compose::{CrossfadeWindows, LoopComposite};
use markercut_processing_core::time_remap::RemapExpression;
use serde::Serialize;

/// Pad label joining the pre-stabilization chain to the stabilizer.
const STABILIZATION_PAD: &str = "[shaky];[shaky]";

/// Sharpening applied after vidstabtransform.
const STABILIZATION_UNSHARP: &str = "unsharp=5:5:0.8:3:3:0.4";

/// Whether the graph feeds an encoder or a live preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// The input is already seeked to the clip start.
    Encode,
    /// The input keeps its own timestamps.
    Preview,
}

impl GraphMode {
    pub fn is_preview(&self) -> bool {
        matches!(self, Self::Preview)
    }
}

/// Which half of a two-pass stabilization the graph is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilizationPass {
    Detect { transforms: PathBuf },
    Transform { transforms: PathBuf },
}

/// One typed filter stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FilterStage {
    Trim {
        start: f64,
        end: f64,
    },
    Crop {
        rect: CropRect,
    },
    HalfScale,
    Transpose {
        rotation: Rotation,
    },
    Gamma {
        value: f64,
    },
    Extra {
        filters: String,
    },
    Deinterlace,
    ExpandColorRange {
        color_space: String,
    },
    Denoise {
        luma_spatial: u32,
    },
    StabilizeDetect {
        transforms: PathBuf,
        shakiness: u32,
    },
    StabilizeTransform {
        transforms: PathBuf,
        smoothing: u32,
        zoomspeed: Option<f64>,
    },
    TimeRemap {
        expression: RemapExpression,
    },
    ForwardReverseLoop {
        forward: RemapExpression,
        reverse: RemapExpression,
    },
    CrossfadeLoop {
        expression: RemapExpression,
        windows: CrossfadeWindows,
    },
}

impl FilterStage {
    /// Filter text for this stage.
    pub fn render(&self) -> String {
        match self {
            Self::Trim { start, end } => format!("trim={}:{}", seconds(*start), seconds(*end)),
            Self::Crop { rect } => format!(
                "crop=x={}:y={}:w={}:h={}",
                format_pixels(rect.x),
                format_pixels(rect.y),
                format_pixels(rect.w),
                format_pixels(rect.h)
            ),
            Self::HalfScale => "scale=w=iw/2:h=ih/2".to_string(),
            Self::Transpose { rotation } => format!("transpose={}", rotation.transpose_arg()),
            Self::Gamma { value } => format!("lutyuv=y=gammaval({value})"),
            Self::Extra { filters } => filters.clone(),
            Self::Deinterlace => "bwdif".to_string(),
            Self::ExpandColorRange { color_space } => {
                format!("colorspace=all={color_space}:range=pc")
            }
            Self::Denoise { luma_spatial } => format!("hqdn3d=luma_spatial={luma_spatial}"),
            Self::StabilizeDetect {
                transforms,
                shakiness,
            } => format!(
                "vidstabdetect=result='{}':shakiness={shakiness}",
                filter_path(transforms)
            ),
            Self::StabilizeTransform {
                transforms,
                smoothing,
                zoomspeed,
            } => {
                let mut text = format!(
                    "vidstabtransform=input='{}':smoothing={smoothing}",
                    filter_path(transforms)
                );
                if let Some(zoomspeed) = zoomspeed {
                    text.push_str(&format!(":optzoom=2:zoomspeed={zoomspeed}"));
                }
                text.push(',');
                text.push_str(STABILIZATION_UNSHARP);
                text
            }
            Self::TimeRemap { expression } => expression.render_setpts(),
            Self::ForwardReverseLoop { forward, reverse } => format!(
                "split=2[f1][f2];[f1]{}[f];[f2]{},select='gt(n,0)',reverse,setpts=(PTS-STARTPTS)[r];[f][r]concat=n=2",
                forward.render_setpts(),
                reverse.render_setpts()
            ),
            Self::CrossfadeLoop {
                expression,
                windows,
            } => render_crossfade(expression, windows),
        }
    }

    /// Stabilizer stages start a new labeled chain instead of continuing
    /// the comma-separated one.
    fn starts_labeled_chain(&self) -> bool {
        matches!(
            self,
            Self::StabilizeDetect { .. } | Self::StabilizeTransform { .. }
        )
    }

    /// Stages that only select, place, or orient frames.
    fn is_geometry(&self) -> bool {
        matches!(
            self,
            Self::Trim { .. }
                | Self::Crop { .. }
                | Self::HalfScale
                | Self::Transpose { .. }
        )
    }
}

fn render_crossfade(expression: &RemapExpression, windows: &CrossfadeWindows) -> String {
    let d = seconds(windows.clip_duration);
    let f = seconds(windows.fade_duration);
    let alpha = windows.tail_alpha_expression();
    format!(
        "{setpts},split=3[1][2][3];\
         [1]select='lte(t,{f})',setpts=(PTS-STARTPTS)[fi];\
         [2]select='gt(t,{f})*lt(t,{d}-{f})',setpts=(PTS-STARTPTS)[m];\
         [3]select='gte(t,{d}-{f})',setpts=(PTS-STARTPTS)[3b];\
         [3b]format=yuva420p,geq=lum='p(X,Y)':a='{alpha}*alpha(X,Y)'[fo];\
         [fi][fo]overlay=eof_action=pass,setpts=(PTS-STARTPTS)[cf];\
         [m][cf]concat=n=2",
        setpts = expression.render_setpts()
    )
}

/// Ordered stages plus the tracked frame size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    stages: Vec<FilterStage>,
    width: f64,
    height: f64,
}

impl FilterGraph {
    /// Empty graph over frames of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            stages: Vec::new(),
            width,
            height,
        }
    }

    /// Append a stage, updating the tracked frame size.
    pub fn push(&mut self, stage: FilterStage) {
        match &stage {
            FilterStage::Crop { rect } => {
                self.width = rect.w;
                self.height = rect.h;
            }
            FilterStage::HalfScale => {
                self.width /= 2.0;
                self.height /= 2.0;
            }
            FilterStage::Transpose { .. } => {
                std::mem::swap(&mut self.width, &mut self.height);
            }
            _ => {}
        }
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Frame size after every stage so far.
    pub fn frame_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Render the whole graph.
    pub fn render(&self) -> String {
        render_stages(&self.stages)
    }

    /// Geometry-only prefix: everything up to and including transpose,
    /// before any color or timing correction.
    pub fn correction_free_prefix(&self) -> String {
        let end = self
            .stages
            .iter()
            .position(|s| !s.is_geometry())
            .unwrap_or(self.stages.len());
        render_stages(&self.stages[..end])
    }
}

fn render_stages(stages: &[FilterStage]) -> String {
    let mut out = String::new();
    for stage in stages {
        if stage.starts_labeled_chain() {
            out.push_str(STABILIZATION_PAD);
        } else if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&stage.render());
    }
    out
}

/// Everything the assembler needs for one clip.
#[derive(Debug, Clone)]
pub struct GraphRequest<'a> {
    pub mode: GraphMode,
    /// Clip bounds in source time, delay applied.
    pub start: f64,
    pub end: f64,
    pub source_size: (u32, u32),
    pub crop: CropRect,
    pub options: &'a ClipOptions,
    pub color_space: Option<&'a str>,
    pub composite: &'a LoopComposite,
    /// Encode mode only.
    pub stabilization: Option<StabilizationPass>,
}

/// Assemble the filter graph for one clip in the fixed stage order.
pub fn assemble(request: &GraphRequest<'_>) -> FilterGraph {
    let options = request.options;
    let (source_w, source_h) = request.source_size;
    let mut graph = FilterGraph::new(f64::from(source_w), f64::from(source_h));

    match request.mode {
        GraphMode::Encode => graph.push(FilterStage::Trim {
            start: 0.0,
            end: request.end - request.start,
        }),
        GraphMode::Preview => graph.push(FilterStage::Trim {
            start: request.start,
            end: request.end,
        }),
    }

    graph.push(FilterStage::Crop { rect: request.crop });

    if request.mode.is_preview() {
        graph.push(FilterStage::HalfScale);
    }

    if let Some(rotation) = options.rotate {
        graph.push(FilterStage::Transpose { rotation });
    }

    if (0.0..=4.0).contains(&options.gamma) && options.gamma != 1.0 {
        graph.push(FilterStage::Gamma {
            value: options.gamma,
        });
    }

    if !options.extra_video_filters.trim().is_empty() {
        graph.push(FilterStage::Extra {
            filters: options.extra_video_filters.trim().to_string(),
        });
    }

    if options.deinterlace {
        graph.push(FilterStage::Deinterlace);
    }

    if options.expand_color_range {
        graph.push(FilterStage::ExpandColorRange {
            color_space: request.color_space.unwrap_or("bt709").to_string(),
        });
    }

    if options.denoise.enabled {
        graph.push(FilterStage::Denoise {
            luma_spatial: options.denoise.luma_spatial,
        });
    }

    let stabilization = &options.video_stabilization;
    if request.mode == GraphMode::Encode && stabilization.enabled {
        match &request.stabilization {
            Some(StabilizationPass::Detect { transforms }) => {
                graph.push(FilterStage::StabilizeDetect {
                    transforms: transforms.clone(),
                    shakiness: stabilization.shakiness,
                })
            }
            Some(StabilizationPass::Transform { transforms }) => {
                graph.push(FilterStage::StabilizeTransform {
                    transforms: transforms.clone(),
                    smoothing: stabilization.smoothing,
                    zoomspeed: options
                        .video_stabilization_dynamic_zoom
                        .then_some(stabilization.zoomspeed),
                })
            }
            None => {}
        }
    }

    // Previews play the forward pass only; loop composites need the whole clip.
    let timing = match (request.mode, request.composite) {
        (GraphMode::Preview, composite) => FilterStage::TimeRemap {
            expression: composite.primary_remap().expression.clone(),
        },
        (GraphMode::Encode, LoopComposite::Plain { remap }) => FilterStage::TimeRemap {
            expression: remap.expression.clone(),
        },
        (GraphMode::Encode, LoopComposite::ForwardReverse { forward, reverse, .. }) => {
            FilterStage::ForwardReverseLoop {
                forward: forward.expression.clone(),
                reverse: reverse.expression.clone(),
            }
        }
        (GraphMode::Encode, LoopComposite::Crossfade { remap, windows, .. }) => {
            FilterStage::CrossfadeLoop {
                expression: remap.expression.clone(),
                windows: *windows,
            }
        }
    };
    graph.push(timing);

    graph
}

/// Seconds as ffmpeg expects them: up to six decimals, no trailing zeros.
pub fn seconds(value: f64) -> String {
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        t => t.to_string(),
    }
}

/// Path text safe inside a single-quoted filter option.
fn filter_path(path: &std::path::Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}
