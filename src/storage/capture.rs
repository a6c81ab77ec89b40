//! Accelerometer capture files

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::{create_parent, first_at_or_after, nearest_preceding, read_numeric_rows, StorageError};
use crate::processing::detrend;
use crate::types::{ChatterReading, DetrendKind, LoadSample, Sample};

/// Positions of the time and acceleration columns in a capture file.
///
/// Parsed from an order string such as `TXY` or `TZXY`: one letter per
/// column, `T`, `X` and `Y` exactly once each, any other letter an ignored
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    time: usize,
    x: usize,
    y: usize,
    width: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self { time: 0, x: 1, y: 2, width: 3 }
    }
}

impl ColumnLayout {
    pub fn parse(order: &str) -> Result<Self, StorageError> {
        let mut time = None;
        let mut x = None;
        let mut y = None;
        let mut width = 0;

        for (idx, c) in order.trim().chars().enumerate() {
            let slot = match c.to_ascii_uppercase() {
                'T' => &mut time,
                'X' => &mut x,
                'Y' => &mut y,
                c if c.is_ascii_alphabetic() => {
                    width = idx + 1;
                    continue;
                }
                other => {
                    return Err(StorageError::Format(format!(
                        "unexpected character {other:?} in column order {order:?}"
                    )))
                }
            };
            if slot.replace(idx).is_some() {
                return Err(StorageError::Format(format!(
                    "column {c:?} repeated in column order {order:?}"
                )));
            }
            width = idx + 1;
        }

        match (time, x, y) {
            (Some(time), Some(x), Some(y)) => Ok(Self { time, x, y, width }),
            _ => Err(StorageError::Format(format!(
                "column order {order:?} must name T, X and Y"
            ))),
        }
    }

    pub const fn width(&self) -> usize {
        self.width
    }
}

/// One recorded capture with its per-batch load diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub samples: Vec<Sample>,
    pub loads: Vec<LoadSample>,
}

impl Capture {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            loads: Vec::new(),
        }
    }

    pub fn with_loads(mut self, loads: Vec<LoadSample>) -> Self {
        self.loads = loads;
        self
    }

    /// Read a capture, shifting time so the first row is at zero.
    pub fn read_csv(path: &Path, layout: ColumnLayout) -> Result<Self, StorageError> {
        let rows = read_numeric_rows(path, layout.width)?;
        let Some(t0) = rows.rows.first().map(|row| row[layout.time]) else {
            return Err(StorageError::Format(format!(
                "{} contains no numeric rows",
                path.display()
            )));
        };

        let samples: Vec<Sample> = rows
            .rows
            .iter()
            .map(|row| Sample::new(row[layout.time] - t0, row[layout.x], row[layout.y]))
            .collect();

        info!(
            path = %path.display(),
            samples = samples.len(),
            skipped_rows = rows.skipped,
            "Loaded capture"
        );
        Ok(Self::new(samples))
    }

    /// Samples per second, from the count over the covered time span.
    pub fn estimate_sample_rate(&self) -> Option<f64> {
        let (first, last) = (self.samples.first()?, self.samples.last()?);
        let span = last.t - first.t;
        (span > 0.0).then(|| self.samples.len() as f64 / span)
    }

    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0.0,
        }
    }

    /// Drop the first `seconds` of the capture (spindle and sensor settling).
    pub fn trim_settle(mut self, seconds: f64) -> Self {
        if let Some(first) = self.samples.first() {
            let cutoff = first.t + seconds;
            self.samples.retain(|s| s.t >= cutoff);
            self.loads.retain(|l| l.t >= cutoff);
        }
        self
    }

    /// Remove the least-squares line from both acceleration axes.
    pub fn detrend(mut self) -> Self {
        let ax: Vec<f64> = self.samples.iter().map(|s| s.ax).collect();
        let ay: Vec<f64> = self.samples.iter().map(|s| s.ay).collect();
        let ax = detrend(&ax, DetrendKind::Linear);
        let ay = detrend(&ay, DetrendKind::Linear);
        for ((sample, x), y) in self.samples.iter_mut().zip(ax).zip(ay) {
            sample.ax = x;
            sample.ay = y;
        }
        self
    }

    /// Write the capture, optionally with a merged chatter-indicator column.
    pub fn write_csv(&self, path: &Path, readings: Option<&[ChatterReading]>) -> Result<(), StorageError> {
        create_parent(path)?;
        let file = File::create(path).map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
        let mut out = BufWriter::new(file);
        let io = |e| StorageError::Io(path.to_path_buf(), e);

        let indicator = readings
            .filter(|r| !r.is_empty())
            .map(|r| indicator_column(&self.samples, r));
        let load_times: Vec<f64> = self.loads.iter().map(|l| l.t).collect();

        let mut header = String::from("time,accel_x,accel_y");
        if !self.loads.is_empty() {
            header.push_str(",spindle_load,x_load,y_load,z_load");
        }
        if indicator.is_some() {
            header.push_str(",chatter_indicator");
        }
        writeln!(out, "{header}").map_err(io)?;

        for (idx, s) in self.samples.iter().enumerate() {
            write!(out, "{},{},{}", s.t, s.ax, s.ay).map_err(io)?;
            if let Some(load) = nearest_preceding(&load_times, s.t).map(|i| &self.loads[i]) {
                write!(out, ",{},{},{},{}", load.spindle, load.x, load.y, load.z).map_err(io)?;
            }
            if let Some(values) = &indicator {
                write!(out, ",{}", values[idx]).map_err(io)?;
            }
            writeln!(out).map_err(io)?;
        }
        out.flush().map_err(io)?;

        info!(
            path = %path.display(),
            rows = self.samples.len(),
            merged_indicator = indicator.is_some(),
            "Capture written"
        );
        Ok(())
    }
}

/// Indicator value for every sample, from the window that covers it.
///
/// Readings are stamped at their window's last sample, so the covering window
/// is the first reading at or after the row. Rows past the last window take
/// the last reading. Empty when there are no readings.
pub fn indicator_column(samples: &[Sample], readings: &[ChatterReading]) -> Vec<f64> {
    let times: Vec<f64> = readings.iter().map(|r| r.t).collect();
    samples
        .iter()
        .filter_map(|s| first_at_or_after(&times, s.t).map(|i| readings[i].value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_capture(n: usize, rate: f64) -> Capture {
        Capture::new(
            (0..n)
                .map(|i| {
                    let t = i as f64 / rate;
                    Sample::new(t, 2.0 + 3.0 * t, -1.0 + 0.5 * t)
                })
                .collect(),
        )
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!(ColumnLayout::parse("TXY").unwrap(), ColumnLayout::default());
        let tzxy = ColumnLayout::parse("tzxy").unwrap();
        assert_eq!((tzxy.time, tzxy.x, tzxy.y, tzxy.width()), (0, 2, 3, 4));
        assert!(ColumnLayout::parse("TX").is_err());
        assert!(ColumnLayout::parse("TXXY").is_err());
        assert!(ColumnLayout::parse("T,X,Y").is_err());
    }

    #[test]
    fn test_read_removes_time_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.csv");
        std::fs::write(
            &path,
            "Acquired with NI-DAQ\ntime,z,x,y\n10.0,9,0.1,0.2\n10.5,9,0.3,0.4\n11.0,9,0.5,0.6\n",
        )
        .unwrap();

        let capture = Capture::read_csv(&path, ColumnLayout::parse("TZXY").unwrap()).unwrap();
        assert_eq!(capture.samples.len(), 3);
        assert_eq!(capture.samples[0], Sample::new(0.0, 0.1, 0.2));
        assert_eq!(capture.samples[2], Sample::new(1.0, 0.5, 0.6));
        assert!((capture.estimate_sample_rate().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_read_empty_capture_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "time,x,y\n").unwrap();
        assert!(matches!(
            Capture::read_csv(&path, ColumnLayout::default()),
            Err(StorageError::Format(_))
        ));
    }

    #[test]
    fn test_single_sample_has_no_rate() {
        assert_eq!(ramp_capture(1, 10.0).estimate_sample_rate(), None);
    }

    #[test]
    fn test_settle_trim_and_detrend() {
        let capture = ramp_capture(100, 10.0).trim_settle(1.0).detrend();
        assert_eq!(capture.samples.len(), 90);
        assert!((capture.samples[0].t - 1.0).abs() < 1e-12);
        for s in &capture.samples {
            assert!(s.ax.abs() < 1e-9 && s.ay.abs() < 1e-9);
        }
    }

    #[test]
    fn test_indicator_column_uses_covering_window() {
        let samples: Vec<Sample> = (0..6).map(|i| Sample::new(f64::from(i) * 0.1, 0.0, 0.0)).collect();
        let readings = [
            ChatterReading { t: 0.2, value: 0.3 },
            ChatterReading { t: 0.4, value: 0.9 },
        ];
        let column = indicator_column(&samples, &readings);
        assert_eq!(column, vec![0.3, 0.3, 0.3, 0.9, 0.9, 0.9]);
        assert!(indicator_column(&samples, &[]).is_empty());
    }

    #[test]
    fn test_write_merged_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("merged.csv");
        let loads = vec![LoadSample { t: 0.0, spindle: 12.0, x: 1.0, y: 2.0, z: 3.0 }];
        let capture = ramp_capture(4, 2.0).with_loads(loads);
        let readings = [ChatterReading { t: 1.0, value: 0.5 }];

        capture.write_csv(&path, Some(&readings)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,accel_x,accel_y,spindle_load,x_load,y_load,z_load,chatter_indicator");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "0,2,-1,12,1,2,3,0.5");

        // The merged file reads back through the default layout
        let back = Capture::read_csv(&path, ColumnLayout::default()).unwrap();
        assert_eq!(back.samples, capture.samples);
    }
}
