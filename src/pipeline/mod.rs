//! Recording pipeline
//!
//! ```text
//! SampleSource ──batch──► SampleBuffer ──► WindowScheduler ──reading──► CutSession
//!                                                                         │ rising edge
//!                                                 MachineMonitor ◄────────┘ (background)
//!                                                       │
//!                                                  LobePoint ──► CalibrationSession
//! ```
//!
//! Readings come out in strict window order. Machine queries never block the
//! scheduler and never end a session.

mod buffer;
mod detector;
mod scheduler;
mod session;
pub mod processing_loop;
pub mod source;

pub use buffer::*;
pub use detector::*;
pub use processing_loop::ProcessingLoop;
pub use scheduler::*;
pub use session::*;
pub use source::{BatchEvent, CaptureSource, SampleSource};
