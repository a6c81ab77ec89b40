//! Depth of cut and measurement span from tool position

use super::Axis;
use crate::config::{defaults::MM_PER_INCH, MachineConfig};
use crate::types::CutGeometry;

/// Workpiece geometry used to turn axis positions into a depth of cut.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkpieceGeometry {
    pub geometry: CutGeometry,
    pub x_offset_mm: f64,
    pub z_offset_mm: f64,
    pub material_length_mm: f64,
    pub edge_margin_mm: f64,
    pub incline_deg: f64,
    pub report_inches: bool,
}

impl WorkpieceGeometry {
    pub fn from_config(config: &MachineConfig) -> Self {
        Self {
            geometry: config.geometry,
            x_offset_mm: config.x_offset_mm,
            z_offset_mm: config.z_offset_mm,
            material_length_mm: config.material_length_mm,
            edge_margin_mm: config.edge_margin_mm,
            incline_deg: config.incline_deg,
            report_inches: config.report_inches,
        }
    }

    /// Axis whose position determines the depth of cut.
    pub const fn depth_axis(&self) -> Axis {
        match self.geometry {
            CutGeometry::Incline => Axis::X,
            CutGeometry::Flat => Axis::Z,
        }
    }

    /// Whether the tool is clear of the stock's entry and exit transients.
    pub fn in_bounds(&self, x_mm: f64) -> bool {
        let lo = self.x_offset_mm + self.edge_margin_mm;
        let hi = self.x_offset_mm + self.material_length_mm - self.edge_margin_mm;
        (lo..=hi).contains(&x_mm)
    }

    /// Depth of cut from the position of [`depth_axis`](Self::depth_axis).
    ///
    /// Inclined stock: `tan(angle) * (x - x_offset)`. Flat stock: `z - z_offset`.
    pub fn depth_of_cut(&self, position_mm: f64) -> f64 {
        let depth_mm = match self.geometry {
            CutGeometry::Incline => self.incline_deg.to_radians().tan() * (position_mm - self.x_offset_mm),
            CutGeometry::Flat => position_mm - self.z_offset_mm,
        };
        if self.report_inches {
            depth_mm / MM_PER_INCH
        } else {
            depth_mm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_bounds_excludes_edges() {
        let g = WorkpieceGeometry::from_config(&MachineConfig::default());
        assert!(!g.in_bounds(431.85 + 5.0));
        assert!(g.in_bounds(431.85 + 10.0));
        assert!(g.in_bounds(431.85 + 50.0));
        assert!(g.in_bounds(431.85 + 104.648 - 10.0));
        assert!(!g.in_bounds(431.85 + 100.0));
    }

    #[test]
    fn test_incline_depth_in_inches() {
        let g = WorkpieceGeometry::from_config(&MachineConfig::default());
        let depth = g.depth_of_cut(431.85 + 25.4);
        assert!((depth - 7f64.to_radians().tan()).abs() < 1e-12);
        assert_eq!(g.depth_axis(), Axis::X);
    }

    #[test]
    fn test_flat_depth_in_mm() {
        let config = MachineConfig {
            geometry: CutGeometry::Flat,
            report_inches: false,
            ..MachineConfig::default()
        };
        let g = WorkpieceGeometry::from_config(&config);
        assert!((g.depth_of_cut(-490.277) - 2.0).abs() < 1e-9);
        assert_eq!(g.depth_axis(), Axis::Z);
    }
}
