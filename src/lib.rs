//! Chatterscope: Machine-Tool Chatter Detection
//!
//! Windowed analysis of biaxial accelerometer data from a milling spindle,
//! and stability-lobe calibration from the chatter onsets it detects.
//!
//! ## Architecture
//!
//! - **Acquisition**: interleaved DAQ scans decoded into timestamped samples
//! - **Processing**: filter design, conditioning, double integration,
//!   once-per-revolution sampling and the chatter indicator
//! - **Pipeline**: sliding-window scheduling, rising-edge detection and the
//!   cancellable recording session
//! - **Machine**: timeout-bounded controller queries and cut geometry
//! - **Lobe**: stability-lobe model and its Levenberg-Marquardt fit
//! - **Storage**: capture and calibration CSV files

pub mod acquisition;
pub mod config;
pub mod lobe;
pub mod machine;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::ChatterConfig;

// Re-export commonly used types
pub use types::{ChatterReading, LoadSample, LobePoint, Sample, Window};

// Re-export the analysis entry points
pub use lobe::{FitError, LobeFitter, LobeModel};
pub use pipeline::{analyze_capture, ProcessingLoop, SessionReport, WindowPlan, WindowScheduler};
pub use processing::{ProcessingError, WindowAnalyzer};
pub use storage::{Capture, StorageError};
