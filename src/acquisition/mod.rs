//! Accelerometer acquisition
//!
//! Turns the data-acquisition device's interleaved two-channel voltage
//! stream into time-stamped [`Sample`](crate::types::Sample) batches:
//!
//! - `demux`: de-interleaving, voltage to acceleration, missed-scan sentinels
//! - `daq`: the scan-stream trait, a simulated device and the batch source
//! - `synthetic`: deterministic cutting signals (stable or chattering)

mod daq;
mod demux;
mod synthetic;

pub use daq::*;
pub use demux::*;
pub use synthetic::*;

use thiserror::Error;

/// Acquisition errors
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Hardware disconnect, malformed scan buffer or too many missed scans
    #[error("Acquisition fault: {0}")]
    Fault(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
