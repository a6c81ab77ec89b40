//! Poincaré section of the tool-tip trajectory at revolution boundaries

use crate::types::{BisectionPoint, Trajectory};

pub struct PoincareSampler;

impl PoincareSampler {
    /// Displacement at each boundary index. Out-of-range indices are ignored.
    pub fn collect(trajectory: &Trajectory, boundaries: &[usize]) -> Vec<BisectionPoint> {
        boundaries
            .iter()
            .filter(|&&i| i < trajectory.len())
            .map(|&i| BisectionPoint {
                index: i,
                t: trajectory.time.get(i).copied().unwrap_or(f64::NAN),
                x: trajectory.disp_x[i],
                y: trajectory.disp_y[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_displacement_at_boundaries() {
        let trajectory = Trajectory {
            time: vec![0.0, 0.1, 0.2, 0.3],
            vel_x: vec![0.0; 4],
            vel_y: vec![0.0; 4],
            disp_x: vec![1.0, 2.0, 3.0, 4.0],
            disp_y: vec![-1.0, -2.0, -3.0, -4.0],
        };
        let points = PoincareSampler::collect(&trajectory, &[1, 3, 9]);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], BisectionPoint { index: 1, t: 0.1, x: 2.0, y: -2.0 });
        assert_eq!(points[1].index, 3);
    }
}
