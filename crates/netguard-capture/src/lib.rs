//! Capture process supervision and position tracking for NetGuard Pro.

pub mod position;
pub mod runner;

pub use position::PositionStore;
pub use runner::{CaptureRunner, CaptureSpec, OutputMode, RunnerState};
