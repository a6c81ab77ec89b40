//! Minimum-order Butterworth design and second-order-section filtering
//!
//! The design pre-warps both band edges, picks the smallest order whose
//! stop-band attenuation meets the requirement, then places the cutoff so the
//! pass-band ripple requirement is met exactly at the pass edge. The analog
//! prototype is mapped through the bilinear transform into cascaded biquads,
//! which stay well conditioned at the high orders a narrow transition band
//! produces.
//!
//! Frequencies inside [`FilterSpec`] are normalised to Nyquist (`0 < cutoff < 1`).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

use super::ProcessingError;

/// Orders above this are rejected as a mis-specified transition band.
pub const MAX_FILTER_ORDER: usize = 512;

/// Bilinear transform constant for frequencies normalised to Nyquist (fs = 2).
const BILINEAR_FS2: f64 = 4.0;

// ============================================================================
// Requirements and Spec
// ============================================================================

/// Which side of the transition band is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterBand {
    #[default]
    Highpass,
    Lowpass,
}

/// Pass/stop specification a filter must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterRequirements {
    pub band: FilterBand,
    /// Pass-band edge (Hz)
    pub pass_hz: f64,
    /// Stop-band edge (Hz)
    pub stop_hz: f64,
    /// Maximum loss in the pass band (dB)
    pub pass_ripple_db: f64,
    /// Minimum attenuation in the stop band (dB)
    pub stop_attenuation_db: f64,
    pub sample_rate_hz: f64,
}

impl FilterRequirements {
    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate_hz / 2.0
    }

    /// Reject edge orderings and gains no Butterworth design can satisfy.
    ///
    /// A high-pass keeps frequencies above the pass edge, so its stop edge
    /// must lie below the pass edge; a low-pass is the mirror image.
    pub fn validate(&self) -> Result<(), ProcessingError> {
        let values = [
            self.pass_hz,
            self.stop_hz,
            self.pass_ripple_db,
            self.stop_attenuation_db,
            self.sample_rate_hz,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("all filter parameters must be finite"));
        }
        if self.sample_rate_hz <= 0.0 {
            return Err(invalid(format!(
                "sample rate must be positive, got {} Hz",
                self.sample_rate_hz
            )));
        }
        if self.pass_hz <= 0.0 || self.stop_hz <= 0.0 {
            return Err(invalid("band edges must be positive"));
        }

        let nyquist = self.nyquist_hz();
        if self.pass_hz >= nyquist || self.stop_hz >= nyquist {
            return Err(invalid(format!(
                "band edges ({} Hz, {} Hz) must lie below Nyquist ({} Hz)",
                self.pass_hz, self.stop_hz, nyquist
            )));
        }

        match self.band {
            FilterBand::Lowpass if self.pass_hz >= self.stop_hz => Err(invalid(format!(
                "low-pass needs pass edge below stop edge ({} Hz >= {} Hz)",
                self.pass_hz, self.stop_hz
            ))),
            FilterBand::Highpass if self.stop_hz >= self.pass_hz => Err(invalid(format!(
                "high-pass needs stop edge below pass edge ({} Hz >= {} Hz)",
                self.stop_hz, self.pass_hz
            ))),
            _ if self.pass_ripple_db <= 0.0 => Err(invalid("pass-band ripple must be positive")),
            _ if self.stop_attenuation_db <= self.pass_ripple_db => Err(invalid(format!(
                "stop-band attenuation ({} dB) must exceed pass-band ripple ({} dB)",
                self.stop_attenuation_db, self.pass_ripple_db
            ))),
            _ => Ok(()),
        }
    }
}

fn invalid(message: impl Into<String>) -> ProcessingError {
    ProcessingError::InvalidFilterSpec(message.into())
}

/// Designed filter order and Nyquist-normalised cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub band: FilterBand,
    pub order: usize,
    pub cutoff: f64,
}

impl FilterSpec {
    /// Smallest Butterworth order meeting `req`, with its cutoff.
    pub fn minimum_order(req: &FilterRequirements) -> Result<Self, ProcessingError> {
        req.validate()?;

        let nyquist = req.nyquist_hz();
        let pass_warped = (PI * (req.pass_hz / nyquist) / 2.0).tan();
        let stop_warped = (PI * (req.stop_hz / nyquist) / 2.0).tan();
        let selectivity = match req.band {
            FilterBand::Lowpass => stop_warped / pass_warped,
            FilterBand::Highpass => pass_warped / stop_warped,
        };

        let g_stop = 10f64.powf(0.1 * req.stop_attenuation_db);
        let g_pass = 10f64.powf(0.1 * req.pass_ripple_db);
        let exact_order = ((g_stop - 1.0) / (g_pass - 1.0)).log10() / (2.0 * selectivity.log10());
        if !exact_order.is_finite() || exact_order > MAX_FILTER_ORDER as f64 {
            return Err(invalid(format!(
                "transition band requires order {exact_order:.0}, limit is {MAX_FILTER_ORDER}"
            )));
        }
        let order = (exact_order.ceil() as usize).max(1);

        // Natural frequency that puts exactly `pass_ripple_db` of loss at the pass edge.
        let w0 = (g_pass - 1.0).powf(-1.0 / (2.0 * order as f64));
        let warped_cutoff = match req.band {
            FilterBand::Lowpass => w0 * pass_warped,
            FilterBand::Highpass => pass_warped / w0,
        };
        let cutoff = (2.0 / PI) * warped_cutoff.atan();
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(invalid(format!("designed cutoff {cutoff} outside (0, 1)")));
        }

        Ok(Self {
            band: req.band,
            order,
            cutoff,
        })
    }
}

// ============================================================================
// Second-Order Sections
// ============================================================================

/// One biquad: `(b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondOrderSection {
    pub b: [f64; 3],
    /// Denominator with `a[0] == 1`
    pub a: [f64; 3],
}

/// Cascade of biquads applied with zero initial state on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<SecondOrderSection>,
}

impl SosFilter {
    /// Digital Butterworth filter realising `spec`.
    pub fn butterworth(spec: &FilterSpec) -> Self {
        let n = spec.order.max(1);
        let warped = BILINEAR_FS2 * (PI * spec.cutoff / 2.0).tan();

        let prototype: Vec<Complex64> = (0..n)
            .map(|k| {
                let theta = PI * (2 * k + n + 1) as f64 / (2 * n) as f64;
                Complex64::from_polar(1.0, theta)
            })
            .collect();
        let prototype_product: Complex64 = prototype.iter().map(|p| -p).product();

        // Analog poles after frequency transformation, the digital image of
        // the analog zeros, and the overall gain after the bilinear map.
        let (analog_poles, zero_location, gain) = match spec.band {
            FilterBand::Highpass => {
                let poles: Vec<Complex64> = prototype.iter().map(|p| warped / p).collect();
                let denominator: Complex64 = poles.iter().map(|p| BILINEAR_FS2 - p).product();
                let gain = (Complex64::new(BILINEAR_FS2.powi(n as i32), 0.0)
                    / (denominator * prototype_product))
                    .re;
                (poles, 1.0, gain)
            }
            FilterBand::Lowpass => {
                let poles: Vec<Complex64> = prototype.iter().map(|p| p * warped).collect();
                let denominator: Complex64 = poles.iter().map(|p| BILINEAR_FS2 - p).product();
                let gain = (Complex64::new(warped.powi(n as i32), 0.0) / denominator).re;
                (poles, -1.0, gain)
            }
        };

        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|p| (BILINEAR_FS2 + p) / (BILINEAR_FS2 - p))
            .collect();

        let mut sections = Vec::with_capacity(n.div_ceil(2));
        for pole in digital_poles.iter().filter(|p| p.im > 1e-10 * p.norm()) {
            sections.push(SecondOrderSection {
                b: [1.0, -2.0 * zero_location, 1.0],
                a: [1.0, -2.0 * pole.re, pole.norm_sqr()],
            });
        }
        for pole in digital_poles.iter().filter(|p| p.im.abs() <= 1e-10 * p.norm()) {
            sections.push(SecondOrderSection {
                b: [1.0, -zero_location, 0.0],
                a: [1.0, -pole.re, 0.0],
            });
        }

        if let Some(first) = sections.first_mut() {
            for coefficient in &mut first.b {
                *coefficient *= gain;
            }
        }

        Self { sections }
    }

    pub fn sections(&self) -> &[SecondOrderSection] {
        &self.sections
    }

    /// Filter `input` causally, starting from rest.
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        let mut signal = input.to_vec();
        for section in &self.sections {
            let (mut z1, mut z2) = (0.0, 0.0);
            for value in &mut signal {
                let x = *value;
                let y = section.b[0] * x + z1;
                z1 = section.b[1] * x - section.a[1] * y + z2;
                z2 = section.b[2] * x - section.a[2] * y;
                *value = y;
            }
        }
        signal
    }

    /// Magnitude response at a Nyquist-normalised frequency.
    pub fn magnitude_at(&self, normalized_freq: f64) -> f64 {
        let z_inv = Complex64::from_polar(1.0, -PI * normalized_freq);
        let z_inv2 = z_inv * z_inv;
        self.sections
            .iter()
            .map(|s| {
                let num = s.b[0] + z_inv * s.b[1] + z_inv2 * s.b[2];
                let den = s.a[0] + z_inv * s.a[1] + z_inv2 * s.a[2];
                num / den
            })
            .product::<Complex64>()
            .norm()
    }

    /// All poles strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.sections
            .iter()
            .all(|s| s.a[2].abs() < 1.0 && s.a[1].abs() < 1.0 + s.a[2])
    }
}

// ============================================================================
// Designer (cached)
// ============================================================================

/// A designed filter, shared read-only by every window at one sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignedFilter {
    pub spec: FilterSpec,
    pub sos: SosFilter,
}

/// Designs filters and reuses the last design while the requirements are unchanged.
#[derive(Debug, Default)]
pub struct FilterDesigner {
    cached: Option<(FilterRequirements, Arc<DesignedFilter>)>,
}

impl FilterDesigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn design(
        &mut self,
        req: &FilterRequirements,
    ) -> Result<Arc<DesignedFilter>, ProcessingError> {
        if let Some((cached_req, filter)) = &self.cached {
            if cached_req == req {
                return Ok(Arc::clone(filter));
            }
        }

        let spec = FilterSpec::minimum_order(req)?;
        let filter = Arc::new(DesignedFilter {
            sos: SosFilter::butterworth(&spec),
            spec,
        });
        debug!(
            order = spec.order,
            cutoff = spec.cutoff,
            band = ?spec.band,
            "Designed Butterworth filter"
        );
        self.cached = Some((*req, Arc::clone(&filter)));
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highpass(pass_hz: f64, stop_hz: f64) -> FilterRequirements {
        FilterRequirements {
            band: FilterBand::Highpass,
            pass_hz,
            stop_hz,
            pass_ripple_db: 3.0,
            stop_attenuation_db: 40.0,
            sample_rate_hz: 8000.0,
        }
    }

    #[test]
    fn test_minimum_order_matches_reference_design() {
        // 200/150 Hz at 8 kHz is 0.05/0.0375 of Nyquist
        let spec = FilterSpec::minimum_order(&highpass(200.0, 150.0)).unwrap();
        assert_eq!(spec.order, 16);
        assert!((spec.cutoff - 0.049_992_610_794).abs() < 1e-9, "cutoff: {}", spec.cutoff);
    }

    #[test]
    fn test_valid_specs_give_positive_order_and_unit_interval_cutoff() {
        let rates: [f64; 3] = [1600.0, 8000.0, 48_000.0];
        for rate in rates {
            let nyquist = rate / 2.0;
            for lo_frac in [0.01, 0.1, 0.3, 0.6] {
                for gap in [1.05, 1.3, 2.0] {
                    let lo = nyquist * lo_frac;
                    let hi = (lo * gap).min(nyquist * 0.99);
                    if hi <= lo {
                        continue;
                    }
                    let lowpass = FilterRequirements {
                        band: FilterBand::Lowpass,
                        pass_hz: lo,
                        stop_hz: hi,
                        pass_ripple_db: 1.0,
                        stop_attenuation_db: 30.0,
                        sample_rate_hz: rate,
                    };
                    let highpass = FilterRequirements {
                        band: FilterBand::Highpass,
                        pass_hz: hi,
                        stop_hz: lo,
                        ..lowpass
                    };
                    for req in [lowpass, highpass] {
                        let spec = FilterSpec::minimum_order(&req).unwrap();
                        assert!(spec.order >= 1);
                        assert!(spec.cutoff > 0.0 && spec.cutoff < 1.0, "{req:?} -> {spec:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let cases = [
            highpass(150.0, 150.0),
            highpass(150.0, 200.0),
            highpass(4000.0, 150.0),
            highpass(200.0, 4500.0),
            highpass(-1.0, 150.0),
            FilterRequirements {
                band: FilterBand::Lowpass,
                ..highpass(200.0, 150.0)
            },
            FilterRequirements {
                stop_attenuation_db: 2.0,
                ..highpass(200.0, 150.0)
            },
        ];
        for req in cases {
            let err = FilterSpec::minimum_order(&req).unwrap_err();
            assert!(matches!(err, ProcessingError::InvalidFilterSpec(_)), "{req:?}");
        }
    }

    #[test]
    fn test_butterworth_highpass_coefficients() {
        // Second-order high-pass at half Nyquist
        let spec = FilterSpec {
            band: FilterBand::Highpass,
            order: 2,
            cutoff: 0.5,
        };
        let filter = SosFilter::butterworth(&spec);
        let s = filter.sections()[0];
        assert_eq!(filter.sections().len(), 1);
        assert!((s.b[0] - 0.292_893_218_8).abs() < 1e-9);
        assert!((s.b[1] + 0.585_786_437_6).abs() < 1e-9);
        assert!((s.b[2] - 0.292_893_218_8).abs() < 1e-9);
        assert!(s.a[1].abs() < 1e-9);
        assert!((s.a[2] - 0.171_572_875_3).abs() < 1e-9);
    }

    #[test]
    fn test_butterworth_lowpass_coefficients() {
        let spec = FilterSpec {
            band: FilterBand::Lowpass,
            order: 2,
            cutoff: 0.5,
        };
        let s = SosFilter::butterworth(&spec).sections()[0];
        assert!((s.b[0] - 0.292_893_218_8).abs() < 1e-9);
        assert!((s.b[1] - 0.585_786_437_6).abs() < 1e-9);
        assert!((s.a[2] - 0.171_572_875_3).abs() < 1e-9);
    }

    #[test]
    fn test_designed_response_meets_requirements() {
        let req = highpass(200.0, 150.0);
        let filter = SosFilter::butterworth(&FilterSpec::minimum_order(&req).unwrap());
        assert!(filter.is_stable());
        assert_eq!(filter.sections().len(), 8);

        let nyquist = req.nyquist_hz();
        let pass_gain = filter.magnitude_at(req.pass_hz / nyquist);
        let stop_gain = filter.magnitude_at(req.stop_hz / nyquist);
        assert!(pass_gain >= 10f64.powf(-req.pass_ripple_db / 20.0) - 1e-6, "pass: {pass_gain}");
        assert!(stop_gain <= 10f64.powf(-req.stop_attenuation_db / 20.0), "stop: {stop_gain}");
        assert!((filter.magnitude_at(0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_odd_order_has_first_order_section() {
        let spec = FilterSpec {
            band: FilterBand::Highpass,
            order: 3,
            cutoff: 0.2,
        };
        let filter = SosFilter::butterworth(&spec);
        assert_eq!(filter.sections().len(), 2);
        assert!(filter.sections().iter().any(|s| s.a[2] == 0.0 && s.b[2] == 0.0));
        assert!((filter.magnitude_at(0.999) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_preserves_length_and_removes_dc() {
        let filter = SosFilter::butterworth(&FilterSpec {
            band: FilterBand::Highpass,
            order: 4,
            cutoff: 0.1,
        });
        let input = vec![5.0; 4000];
        let output = filter.apply(&input);
        assert_eq!(output.len(), input.len());
        assert!(output[3999].abs() < 1e-6, "dc leak: {}", output[3999]);
    }

    #[test]
    fn test_designer_reuses_cached_design() {
        let mut designer = FilterDesigner::new();
        let req = highpass(200.0, 150.0);
        let first = designer.design(&req).unwrap();
        let second = designer.design(&req).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let third = designer.design(&highpass(300.0, 150.0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
