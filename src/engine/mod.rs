//! Engine module housing the recording-session orchestration.
//!
//! `EngineHandle` (`core`) wires a source to the analysis and processing
//! threads; `clock` supplies the wall-clock anchor for event timestamps.

pub mod clock;
pub mod core;

pub use clock::{FixedTimeSource, SystemTimeSource, TimeSource};
pub use core::EngineHandle;
