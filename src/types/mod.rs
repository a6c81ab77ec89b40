//! Shared data structures for chatter detection and stability-lobe calibration
//!
//! This module defines the core types flowing through the analysis pipeline:
//! - Acquisition: Sample, LoadSample (raw biaxial acceleration + machine loads)
//! - Windowing: Window, Trajectory, BisectionPoint
//! - Output: ChatterReading (one per analysed window)
//! - Calibration: LobePoint (one per detected chatter excursion)

mod sample;
mod analysis;
mod calibration;

pub use sample::*;
pub use analysis::*;
pub use calibration::*;
