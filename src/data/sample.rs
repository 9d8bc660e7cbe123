//! Synthetic survey generation.
//!
//! Each synthetic target is a dusty galaxy: a modified blackbody in the
//! submillimetre/far-infrared plus a falling synchrotron-like power law in the
//! radio, observed by a handful of telescopes with multiplicative noise.
//! Generation is fully determined by the seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::domain::{BlackbodyParams, PointStyle, PointStyleTable, SourceFrame, TargetRecord, Uncertainty};
use crate::error::SedError;
use crate::models::{log_grid, modified_blackbody, power_law};
use crate::store::CsvStore;

/// Hubble constant (km/s/Mpc) used to derive redshift from distance.
const HUBBLE_CONSTANT: f64 = 70.0;
const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Relative 1σ scatter applied to every synthetic flux.
const FLUX_SCATTER: f64 = 0.05;
/// Quoted relative uncertainty.
const QUOTED_UNCERTAINTY: f64 = 0.1;
/// Chance that a point is reported as an upper limit.
const UPPER_LIMIT_PROBABILITY: f64 = 0.08;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub targets: usize,
    pub seed: u64,
    pub points_per_target: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            targets: 5,
            seed: 42,
            points_per_target: 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticSurvey {
    pub records: Vec<TargetRecord>,
    pub styles: PointStyleTable,
    /// Dust parameters each record was generated from, in record order.
    pub truth: Vec<BlackbodyParams>,
}

pub fn generate_survey(config: &SampleConfig) -> Result<SyntheticSurvey, SedError> {
    if config.targets == 0 {
        return Err(SedError::Config("sample target count must be > 0".to_string()));
    }
    if config.points_per_target < 4 {
        return Err(SedError::Config("synthetic targets need at least 4 points".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, FLUX_SCATTER).map_err(|e| SedError::Config(format!("noise distribution error: {e}")))?;

    let mut records = Vec::with_capacity(config.targets);
    let mut truth = Vec::with_capacity(config.targets);
    for i in 0..config.targets {
        let distance: f64 = rng.gen_range(5.0..80.0);
        let frame = SourceFrame {
            distance,
            redshift: distance * HUBBLE_CONSTANT / SPEED_OF_LIGHT_KM_S,
        };
        let dust = BlackbodyParams {
            dust_temperature: rng.gen_range(18.0..40.0),
            dust_mass: 10f64.powf(rng.gen_range(5.5..7.5)),
            beta: rng.gen_range(1.2..2.2),
        };
        let exponent: f64 = rng.gen_range(-1.0..-0.5);
        let flux_at_10ghz = 10f64.powf(rng.gen_range(-3.0..-1.5));
        let amplitude = flux_at_10ghz / 1.0e10_f64.powf(exponent);

        let frequencies = log_grid(1.0e9, 5.0e12, config.points_per_target);
        let mut telescopes = Vec::with_capacity(frequencies.len());
        let mut fluxes = Vec::with_capacity(frequencies.len());
        let mut upper = Vec::with_capacity(frequencies.len());
        let mut lower = Vec::with_capacity(frequencies.len());

        for &nu in &frequencies {
            let model = modified_blackbody(nu, &dust, &frame) + power_law(nu, amplitude, exponent);
            let flux = model * (1.0 + noise.sample(&mut rng));
            let sigma = Uncertainty::Value(QUOTED_UNCERTAINTY * flux.abs());

            telescopes.push(telescope_for(nu).to_string());
            fluxes.push(flux);
            upper.push(if rng.gen_bool(UPPER_LIMIT_PROBABILITY) {
                Uncertainty::Limit
            } else {
                sigma
            });
            lower.push(sigma);
        }

        records.push(TargetRecord {
            name: format!("SYN-{:03}", i + 1),
            frequencies,
            telescopes,
            fluxes,
            uncertainty_upper: upper,
            uncertainty_lower: lower,
            redshift: frame.redshift,
            distance,
        });
        truth.push(dust);
    }

    log::debug!("generated {} synthetic targets (seed={})", records.len(), config.seed);
    Ok(SyntheticSurvey {
        records,
        styles: default_point_styles(),
        truth,
    })
}

/// Write a survey's records and styles into a CSV store.
pub fn write_survey(store: &CsvStore, survey: &SyntheticSurvey) -> Result<(), SedError> {
    store.write_records(&survey.records)?;
    store.write_point_styles(&survey.styles)?;
    log::info!(
        "wrote {} synthetic targets to {}",
        survey.records.len(),
        store.dir().display()
    );
    Ok(())
}

fn telescope_for(nu: f64) -> &'static str {
    if nu < 5.0e10 {
        "VLA"
    } else if nu < 1.0e12 {
        "ALMA"
    } else if nu < 4.0e12 {
        "Herschel"
    } else {
        "Spitzer"
    }
}

/// The style table written alongside synthetic data; the last row is the fallback.
pub fn default_point_styles() -> PointStyleTable {
    let entry = |telescope: &str, marker: &str, color: &str| PointStyle {
        telescope: telescope.to_string(),
        marker: marker.to_string(),
        color: color.to_string(),
    };
    PointStyleTable::new(vec![
        entry("VLA", "s", "blue"),
        entry("ALMA", "o", "red"),
        entry("Herschel", "D", "green"),
        entry("Other", "x", "gray"),
    ])
}
