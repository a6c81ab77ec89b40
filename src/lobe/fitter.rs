//! Levenberg-Marquardt fit of the stability-lobe model
//!
//! Forward-difference Jacobian, Marquardt diagonal scaling, and a damping
//! factor that shrinks tenfold on an accepted step and grows tenfold on a
//! rejected one. A rejected step never moves the parameters, so the cost is
//! monotonically non-increasing.
//!
//! Without a configured starting point the fit is seeded from the points
//! themselves: the shallowest point is taken as the single-mode lobe minimum,
//! and the damping ratio whose curve best matches the data picks the rest.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use super::{stability_limit, FitError, LobeModel, PARAMETER_COUNT};
use crate::config::CalibrationConfig;
use crate::types::LobePoint;

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
/// Damping above this means no step reduces the cost.
const MAX_DAMPING: f64 = 1e16;
/// sqrt(f64::EPSILON), relative Jacobian step
const JACOBIAN_STEP: f64 = 1.490_116_119_384_765_6e-8;
const ZERO_COST: f64 = 1e-30;
/// Seed damping ratios: `SEED_DAMPING_MIN * SEED_DAMPING_GROWTH^k`
const SEED_DAMPING_MIN: f64 = 0.005;
const SEED_DAMPING_GROWTH: f64 = 1.25;
const SEED_DAMPING_STEPS: i32 = 21;

/// Optimiser settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Converged when the relative cost reduction of a step drops below this
    pub ftol: f64,
    /// Converged when the step is this small relative to the parameters
    pub xtol: f64,
    /// A point where no step lowers the cost is a minimum only if every
    /// Jacobian column is this close to orthogonal to the residual
    pub gtol: f64,
    /// `None` seeds the fit from the points
    pub initial_guess: Option<[f64; PARAMETER_COUNT]>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

impl FitOptions {
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            ftol: config.ftol,
            xtol: config.xtol,
            gtol: config.gtol,
            initial_guess: config.initial_guess,
        }
    }
}

/// Fits [`LobeModel`]s to recorded lobe points.
#[derive(Debug, Clone, Default)]
pub struct LobeFitter {
    options: FitOptions,
}

struct Problem<'a> {
    rpm: &'a [f64],
    depth: &'a [f64],
}

impl Problem<'_> {
    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        let params = to_array(p);
        DVector::from_iterator(
            self.rpm.len(),
            self.rpm
                .iter()
                .zip(self.depth)
                .map(|(&n, &d)| stability_limit(n, &params) - d),
        )
    }

    fn jacobian(&self, p: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(r.len(), p.len());
        for j in 0..p.len() {
            let h = JACOBIAN_STEP * p[j].abs().max(1.0);
            let mut shifted = p.clone();
            shifted[j] += h;
            let column = (self.residuals(&shifted) - r) / h;
            jac.set_column(j, &column);
        }
        jac
    }
}

fn cost(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

/// Largest cosine between the residual and a Jacobian column.
fn scaled_gradient(jtj: &DMatrix<f64>, gradient: &DVector<f64>, c: f64) -> f64 {
    let residual_norm = (2.0 * c).sqrt();
    if residual_norm == 0.0 {
        return 0.0;
    }
    (0..gradient.len())
        .filter_map(|k| {
            let column_norm = jtj[(k, k)].sqrt();
            (column_norm > 0.0).then(|| gradient[k].abs() / (column_norm * residual_norm))
        })
        .fold(0.0, f64::max)
}

/// Single-mode starting point `[x1, -1, 0, 0, 0, -wn^2, -2 zeta wn]`.
///
/// The shallowest finite point is treated as the lobe minimum, which for
/// damping ratio `zeta` sits at `wn * sqrt(1 + 2 zeta)` with depth
/// `2 zeta (1 + zeta) / x1`. Returns `None` when no point has a finite
/// positive depth.
pub fn seed_parameters(points: &[LobePoint]) -> Option<[f64; PARAMETER_COUNT]> {
    let usable: Vec<&LobePoint> = points
        .iter()
        .filter(|p| p.rpm > 0.0 && p.depth.is_finite() && p.depth > 0.0)
        .collect();
    let lowest = usable.iter().min_by(|a, b| a.depth.total_cmp(&b.depth))?;

    (0..SEED_DAMPING_STEPS)
        .map(|k| {
            let zeta = SEED_DAMPING_MIN * SEED_DAMPING_GROWTH.powi(k);
            let wn = lowest.rpm / (1.0 + 2.0 * zeta).sqrt();
            let x1 = 2.0 * zeta * (1.0 + zeta) / lowest.depth;
            [x1, -1.0, 0.0, 0.0, 0.0, -wn * wn, -2.0 * zeta * wn]
        })
        .filter_map(|params| {
            let c: f64 = usable
                .iter()
                .map(|p| (stability_limit(p.rpm, &params) - p.depth).powi(2))
                .sum();
            c.is_finite().then_some((c, params))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, params)| params)
}

fn to_array(p: &DVector<f64>) -> [f64; PARAMETER_COUNT] {
    let mut out = [0.0; PARAMETER_COUNT];
    for (slot, value) in out.iter_mut().zip(p.iter()) {
        *slot = *value;
    }
    out
}

impl LobeFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn fit(&self, points: &[LobePoint]) -> Result<LobeModel, FitError> {
        let initial = match self.options.initial_guess {
            Some(guess) => guess,
            None => seed_parameters(points).unwrap_or([1.0; PARAMETER_COUNT]),
        };
        debug!(?initial, "Lobe fit starting point");
        self.fit_from(points, initial)
    }

    /// Fit starting from an explicit parameter vector.
    pub fn fit_from(
        &self,
        points: &[LobePoint],
        initial: [f64; PARAMETER_COUNT],
    ) -> Result<LobeModel, FitError> {
        if points.len() < PARAMETER_COUNT {
            return Err(FitError::Underdetermined {
                points: points.len(),
                parameters: PARAMETER_COUNT,
            });
        }

        let rpm: Vec<f64> = points.iter().map(|p| p.rpm).collect();
        let depth: Vec<f64> = points.iter().map(|p| p.depth).collect();
        let problem = Problem { rpm: &rpm, depth: &depth };

        let mut p = DVector::from_row_slice(&initial);
        let mut r = problem.residuals(&p);
        let mut c = cost(&r);
        if !c.is_finite() {
            return Err(FitError::NonConvergence {
                iterations: 0,
                cost: c,
                reason: "model is not finite at the initial guess".to_string(),
            });
        }

        let mut damping = INITIAL_DAMPING;
        for iteration in 0..self.options.max_iterations {
            if c < ZERO_COST {
                return Ok(self.finish(to_array(&p), c, iteration, points.len()));
            }

            let jac = problem.jacobian(&p, &r);
            let jtj = jac.transpose() * &jac;
            let gradient = jac.transpose() * &r;

            loop {
                let mut system = jtj.clone();
                for k in 0..PARAMETER_COUNT {
                    system[(k, k)] += damping * jtj[(k, k)].max(1e-12);
                }

                let accepted = system.lu().solve(&(-&gradient)).and_then(|step| {
                    let trial = &p + &step;
                    let trial_r = problem.residuals(&trial);
                    let trial_c = cost(&trial_r);
                    (trial_c.is_finite() && trial_c < c).then_some((step, trial, trial_r, trial_c))
                });

                if let Some((step, trial, trial_r, trial_c)) = accepted {
                    let reduction = (c - trial_c) / c;
                    let small_step = step.norm() < self.options.xtol * (p.norm() + self.options.xtol);
                    p = trial;
                    r = trial_r;
                    c = trial_c;
                    damping = (damping / 10.0).max(MIN_DAMPING);
                    if reduction < self.options.ftol || small_step {
                        return Ok(self.finish(to_array(&p), c, iteration + 1, points.len()));
                    }
                    break;
                }

                damping *= 10.0;
                if damping > MAX_DAMPING {
                    if scaled_gradient(&jtj, &gradient, c) <= self.options.gtol {
                        return Ok(self.finish(to_array(&p), c, iteration + 1, points.len()));
                    }
                    return Err(FitError::NonConvergence {
                        iterations: iteration + 1,
                        cost: c,
                        reason: "no step reduces the cost".to_string(),
                    });
                }
            }
            debug!(iteration, cost = c, damping, "Lobe fit step");
        }

        Err(FitError::NonConvergence {
            iterations: self.options.max_iterations,
            cost: c,
            reason: "iteration budget exhausted".to_string(),
        })
    }

    fn finish(&self, params: [f64; PARAMETER_COUNT], cost: f64, iterations: usize, points: usize) -> LobeModel {
        info!(iterations, residual = 2.0 * cost, points, "Stability lobe fitted");
        LobeModel {
            params,
            residual: 2.0 * cost,
            iterations,
            points,
        }
    }
}
