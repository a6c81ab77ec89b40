//! Lobe point and lobe constant files

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::{create_parent, read_numeric_rows, StorageError};
use crate::lobe::{LobeModel, PARAMETER_COUNT, PARAMETER_NAMES};
use crate::types::LobePoint;

fn write_rows<I>(path: &Path, header: &str, rows: I) -> Result<(), StorageError>
where
    I: IntoIterator<Item = String>,
{
    create_parent(path)?;
    let io = |e| StorageError::Io(path.to_path_buf(), e);
    let mut out = BufWriter::new(File::create(path).map_err(io)?);
    writeln!(out, "{header}").map_err(io)?;
    for row in rows {
        writeln!(out, "{row}").map_err(io)?;
    }
    out.flush().map_err(io)
}

/// Write `rpm,depth` rows. Also used for tabulated lobe curves.
pub fn write_lobe_points(path: &Path, points: &[LobePoint]) -> Result<(), StorageError> {
    write_rows(path, "rpm,depth", points.iter().map(|p| format!("{},{}", p.rpm, p.depth)))?;
    info!(path = %path.display(), points = points.len(), "Lobe points written");
    Ok(())
}

pub fn read_lobe_points(path: &Path) -> Result<Vec<LobePoint>, StorageError> {
    let rows = read_numeric_rows(path, 2)?;
    Ok(rows.rows.iter().map(|row| LobePoint::new(row[0], row[1])).collect())
}

/// Write the fitted parameters followed by the residual as a single row.
pub fn write_lobe_constants(path: &Path, model: &LobeModel) -> Result<(), StorageError> {
    let header = format!("{},residual", PARAMETER_NAMES.join(","));
    let row = model
        .params
        .iter()
        .chain(std::iter::once(&model.residual))
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    write_rows(path, &header, std::iter::once(row))?;
    info!(path = %path.display(), residual = model.residual, "Lobe constants written");
    Ok(())
}

pub fn read_lobe_constants(path: &Path) -> Result<LobeModel, StorageError> {
    let rows = read_numeric_rows(path, PARAMETER_COUNT)?;
    let row = rows.rows.first().ok_or_else(|| {
        StorageError::Format(format!("{} contains no parameter row", path.display()))
    })?;

    let mut params = [0.0; PARAMETER_COUNT];
    params.copy_from_slice(&row[..PARAMETER_COUNT]);
    let mut model = LobeModel::from_params(params);
    if let Some(&residual) = row.get(PARAMETER_COUNT) {
        model.residual = residual;
    }
    Ok(model)
}
