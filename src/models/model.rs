//! Model evaluation for the modified blackbody and the power law.
//!
//! The fitter and the renderer rely on the same primitives:
//! - evaluate one model at one frequency
//! - sum every saved fit of a target at one frequency
//! - sample a model over a frequency grid (for plots)

use rayon::prelude::*;

use crate::domain::{BlackbodyParams, FitKind, ModelParams, SavedFit, SourceFrame};

/// Normalisation constant of the dust emission formula.
pub const FLUX_NORMALIZATION: f64 = 0.00182917;
/// Dust mass absorption coefficient at the reference frequency.
pub const KAPPA_0: f64 = 0.192;
/// Reference frequency for `KAPPA_0`, in GHz.
pub const NU_0_GHZ: f64 = 856.6;
/// Planck constant (J s).
pub const PLANCK_H: f64 = 6.626e-34;
/// Boltzmann constant (J/K).
pub const BOLTZMANN_K: f64 = 1.38e-23;

/// Speed of light (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Upper frequency (Hz) of plotted blackbody curves.
pub const BLACKBODY_DISPLAY_MAX: f64 = 1.0e14;
/// Frequency span (Hz) of plotted power-law curves.
pub const POWER_LAW_DISPLAY_SPAN: (f64, f64) = (1.0e11, 3.0e14);
/// Upper frequency (Hz) of the plot and of the summed curve.
pub const SUM_DISPLAY_MAX: f64 = 2.0e14;

/// Modified blackbody flux density (Jy) at `freq` (Hz).
///
/// `S_ν = C κ₀ (ν_GHz/ν₀)^(β+3) (M/D²) / (exp(hν/kT) − 1) × (1+z)`
pub fn modified_blackbody(freq: f64, p: &BlackbodyParams, frame: &SourceFrame) -> f64 {
    let nu_ghz = freq / 1.0e9;
    let emissivity = (nu_ghz / NU_0_GHZ).powf(p.beta + 3.0);
    let mass_term = p.dust_mass / (frame.distance * frame.distance);
    let planck = 1.0 / ((PLANCK_H * freq) / (BOLTZMANN_K * p.dust_temperature)).exp_m1();
    let snu = FLUX_NORMALIZATION * KAPPA_0 * emissivity * mass_term * planck;
    snu * (1.0 + frame.redshift)
}

/// Power-law flux density `amplitude · freq^exponent`.
pub fn power_law(freq: f64, amplitude: f64, exponent: f64) -> f64 {
    amplitude * freq.powf(exponent)
}

/// Evaluate any model at `freq`.
pub fn evaluate(params: &ModelParams, freq: f64, frame: &SourceFrame) -> f64 {
    match params {
        ModelParams::ModBlackbody(p) => modified_blackbody(freq, p, frame),
        ModelParams::PowerLaw(p) => power_law(freq, p.amplitude, p.exponent),
    }
}

/// Sum of every saved fit at `freq`; `0.0` for no fits.
pub fn sum_of_fits(fits: &[SavedFit], freq: f64, frame: &SourceFrame) -> f64 {
    fits.iter().map(|f| evaluate(&f.params, freq, frame)).sum()
}

/// `n` log-spaced frequencies from `lo` to `hi` inclusive.
///
/// Returns an empty grid when the bounds are not positive and increasing.
pub fn log_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if !(lo > 0.0 && hi > lo && lo.is_finite() && hi.is_finite()) || n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![lo];
    }
    let (l0, l1) = (lo.ln(), hi.ln());
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            (l0 + u * (l1 - l0)).exp()
        })
        .collect()
}

/// Evaluate `f` at every grid point in parallel.
pub fn sample_on_grid<F>(grid: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync,
{
    grid.par_iter().map(|&nu| f(nu)).collect()
}

/// Sample one model over a grid.
pub fn sample_curve(params: &ModelParams, grid: &[f64], frame: &SourceFrame) -> Vec<f64> {
    sample_on_grid(grid, |nu| evaluate(params, nu, frame))
}

/// Sample the sum of fits over a grid.
pub fn sample_sum(fits: &[SavedFit], grid: &[f64], frame: &SourceFrame) -> Vec<f64> {
    sample_on_grid(grid, |nu| sum_of_fits(fits, nu, frame))
}

/// Frequency span a saved fit is drawn over, given the plot's lower bound.
pub fn display_span(kind: FitKind, x_lower: f64) -> (f64, f64) {
    match kind {
        FitKind::ModBlackbody => (x_lower, BLACKBODY_DISPLAY_MAX),
        FitKind::PowerLaw => POWER_LAW_DISPLAY_SPAN,
    }
}

/// Wavelength in metres.
pub fn frequency_to_wavelength(freq: f64) -> f64 {
    SPEED_OF_LIGHT / freq
}

/// Frequency in Hz of a wavelength in metres.
pub fn wavelength_to_frequency(wavelength: f64) -> f64 {
    SPEED_OF_LIGHT / wavelength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRange, PowerLawParams};

    const FRAME: SourceFrame = SourceFrame {
        distance: 20.0,
        redshift: 0.01,
    };

    fn bb() -> BlackbodyParams {
        BlackbodyParams {
            dust_temperature: 25.0,
            dust_mass: 1.0e6,
            beta: 1.8,
        }
    }

    #[test]
    fn blackbody_matches_formula_by_hand() {
        let nu = 3.0e11;
        let x: f64 = PLANCK_H * nu / (BOLTZMANN_K * 25.0);
        let expected = 0.00182917 * 0.192 * ((300.0_f64 / 856.6).powf(4.8)) * (1.0e6 / 400.0)
            / (x.exp() - 1.0)
            * 1.01;
        let got = modified_blackbody(nu, &bb(), &FRAME);
        assert!(((got - expected) / expected).abs() < 1e-12, "{got} vs {expected}");
    }

    #[test]
    fn blackbody_scales_with_mass_and_inverse_square_distance() {
        let nu = 5.0e11;
        let base = modified_blackbody(nu, &bb(), &FRAME);
        let heavier = BlackbodyParams {
            dust_mass: 2.0e6,
            ..bb()
        };
        let farther = SourceFrame {
            distance: 40.0,
            ..FRAME
        };
        assert!((modified_blackbody(nu, &heavier, &FRAME) / base - 2.0).abs() < 1e-12);
        assert!((modified_blackbody(nu, &bb(), &farther) / base - 0.25).abs() < 1e-12);
    }

    #[test]
    fn power_law_is_amplitude_times_power() {
        assert_eq!(power_law(10.0, 3.0, 2.0), 300.0);
        assert!((power_law(1.0e11, 2.0e-25, 2.0) - 2.0e-3).abs() < 1e-15);
    }

    #[test]
    fn sum_of_no_fits_is_zero() {
        for nu in [1.0e9, 3.0e11, 1.0e14] {
            assert_eq!(sum_of_fits(&[], nu, &FRAME), 0.0);
        }
    }

    #[test]
    fn sum_of_fits_adds_each_model() {
        let range = FitRange::new(0, 3);
        let fits = vec![
            SavedFit {
                params: ModelParams::ModBlackbody(bb()),
                range,
                line_style: "solid".to_string(),
            },
            SavedFit {
                params: ModelParams::PowerLaw(PowerLawParams {
                    amplitude: 1.0e-24,
                    exponent: 2.0,
                }),
                range,
                line_style: "dashed".to_string(),
            },
        ];
        let nu = 2.0e11;
        let expected = modified_blackbody(nu, &bb(), &FRAME) + power_law(nu, 1.0e-24, 2.0);
        assert!((sum_of_fits(&fits, nu, &FRAME) - expected).abs() < 1e-15);

        let grid = [1.0e11, 2.0e11];
        let sampled = sample_sum(&fits, &grid, &FRAME);
        assert!((sampled[1] - expected).abs() < 1e-15);
    }

    #[test]
    fn log_grid_hits_both_ends() {
        let g = log_grid(1.0e9, 1.0e14, 6);
        assert_eq!(g.len(), 6);
        assert!((g[0] - 1.0e9).abs() / 1.0e9 < 1e-12);
        assert!((g[5] - 1.0e14).abs() / 1.0e14 < 1e-12);
        assert!((g[1] - 1.0e10).abs() / 1.0e10 < 1e-12);
        assert!(log_grid(0.0, 1.0, 5).is_empty());
    }

    #[test]
    fn wavelength_conversion() {
        assert!((frequency_to_wavelength(SPEED_OF_LIGHT) - 1.0).abs() < 1e-12);
        let nu = wavelength_to_frequency(7.7e-6);
        assert!((nu / 3.89e13 - 1.0).abs() < 5e-3);
        assert!((wavelength_to_frequency(frequency_to_wavelength(nu)) / nu - 1.0).abs() < 1e-12);
    }

    #[test]
    fn display_spans_follow_the_kind() {
        assert_eq!(display_span(FitKind::ModBlackbody, 5.0e10), (5.0e10, 1.0e14));
        assert_eq!(display_span(FitKind::PowerLaw, 5.0e10), (1.0e11, 3.0e14));
    }
}
