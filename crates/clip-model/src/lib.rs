//! markercut Clip Model
//!
//! Defines the core data contracts for clip generation:
//! - **Markers:** The markers file and its marker pairs (time range, crop, speed)
//! - **Video:** Source video properties and rational frame rates
//! - **Crop:** Crop strings with `iw`/`ih` sentinels and their pixel resolution
//! - **Settings:** Clip options, per-pair overrides, and layered resolution
//! - **Merge lists:** Compact range syntax for concatenating generated clips
//!
//! Every type here is a plain value; nothing is mutated after loading.

pub mod crop;
pub mod error;
pub mod markers;
pub mod merge_list;
pub mod settings;
pub mod video;

pub use crop::*;
pub use error::*;
pub use markers::*;
pub use merge_list::*;
pub use settings::*;
pub use video::*;
