//! markercut Render Engine
//!
//! Turns compiled marker pairs into encoder runs.
//!
//! # Pipeline Architecture
//!
//! ```text
//! MarkerPair + SourceContext
//!         │
//!         ├── compile     (options, crop, speed map, loop, encode settings)
//!         │
//!         ├── filter graph (trim → crop → … → stabilize → time remap / loop)
//!         │
//!         ├── plan        (single pass | two-pass | detect + transform)
//!         │
//!         ▼
//!   EncoderBackend (ffmpeg) ──► <suffix>-<n>.webm
//!                                     │
//!                                     ▼
//!                        merge (concat) ──► <suffix>-(<label>).webm
//! ```

pub mod backend;
pub mod batch;
pub mod compile;
pub mod filter_graph;
pub mod merge;
pub mod plan;
pub mod probe;

pub use backend::{EncoderBackend, FfmpegBackend};
pub use batch::{run_batch, BatchContext, BatchReport, PairOutcome};
pub use compile::{compile_pair, CompiledPair, SourceContext};
pub use merge::{merge_clips, MergeOutcome};
pub use plan::{ClipPlan, EncoderInvocation, OutputLayout};
