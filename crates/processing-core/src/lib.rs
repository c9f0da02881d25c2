//! markercut Processing Core: the speed-ramp compiler
//!
//! Turns marker pair speed specifications into frame-exact timing:
//! - **Speed maps:** Validated piecewise-linear speed curves
//! - **Time remap:** Closed-form output-time expressions and output durations
//! - **Loops:** Forward-reverse and crossfade composition with easing curves
//! - **Encode presets:** Bitrate-driven encoder settings
//!
//! This crate is pure computation. It performs no I/O and spawns no processes.
//! All inputs are data; all outputs are data.

pub mod easing;
pub mod encode_preset;
pub mod loop_compose;
pub mod speed_map;
pub mod time_remap;

pub use encode_preset::{EncodePreset, EncodeSettings};
pub use loop_compose::{compose_loop, LoopComposite, LoopSpec};
pub use speed_map::{normalize, SpeedMap, SpeedProfile};
pub use time_remap::{integrate, TimeRemap};
