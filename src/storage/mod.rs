//! Capture and calibration persistence
//!
//! Plain numeric CSV files, one row per record, for offline consumption by
//! plotting and reporting tools:
//! - captures: `time,accel_x,accel_y[,spindle_load,x_load,y_load,z_load][,chatter_indicator]`
//! - lobe points: `rpm,depth`
//! - lobe constants: the seven fitted parameters followed by the residual

mod calibration;
mod capture;

pub use calibration::*;
pub use capture::*;

use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Format error: {0}")]
    Format(String),
}

/// Rows of a CSV file in which every field parsed as a number.
#[derive(Debug, Clone, Default)]
pub struct NumericRows {
    pub rows: Vec<Vec<f64>>,
    /// Header, preamble, and short rows that were passed over
    pub skipped: usize,
}

/// Read every all-numeric row with at least `min_width` fields.
pub fn read_numeric_rows(path: &Path, min_width: usize) -> Result<NumericRows, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
    let mut out = NumericRows::default();

    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Result<Vec<f64>, _> = line.split(',').map(|f| f.trim().parse::<f64>()).collect();
        match parsed {
            Ok(row) if row.len() >= min_width => out.rows.push(row),
            _ => {
                tracing::debug!(line = line_num + 1, path = %path.display(), "Skipping non-numeric row");
                out.skipped += 1;
            }
        }
    }
    Ok(out)
}

pub(crate) fn create_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::Io(dir.to_path_buf(), e))
        }
        _ => Ok(()),
    }
}

/// `<prefix>_<MM>_<DD>_<HH>_<mm>[_<rpm>].csv`
pub fn timestamped_file_name<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>, rpm: Option<f64>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format("%m_%d_%H_%M");
    match rpm {
        Some(rpm) => format!("{prefix}_{stamp}_{rpm:.0}.csv"),
        None => format!("{prefix}_{stamp}.csv"),
    }
}

/// Index of the last entry at or before `t`, falling back to the first entry.
///
/// `times` must be sorted ascending. Returns `None` only when it is empty.
pub fn nearest_preceding(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    Some(times.partition_point(|&x| x <= t).saturating_sub(1))
}

/// Index of the first entry at or after `t`, clamped to the last entry.
///
/// `times` must be sorted ascending. Returns `None` only when it is empty.
pub fn first_at_or_after(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    Some(times.partition_point(|&x| x < t).min(times.len() - 1))
}
