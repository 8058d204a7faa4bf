//! Collector workers composing capture, parsing, and storage (spec C5).

pub mod collector;
pub mod inventory;
pub mod worker;

pub use collector::{flush_batch, BatchOutcome};
pub use inventory::{inventory, CaptureMode, ToolProfile};
pub use worker::run_log_tail_cycle;
