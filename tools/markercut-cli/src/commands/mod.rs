pub mod args;
pub mod check;
pub mod merge;
pub mod plan;
pub mod preview;
pub mod render;
pub mod session;
