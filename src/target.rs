//! The per-target aggregate.
//!
//! A `Target` owns one parsed record plus the state that fitting leaves
//! behind: the points left after the last fit's exclusions, the last blackbody holds and the
//! per-kind "already warned about unweighted fallback" flags.
//!
//! Fits are persisted before anything on the target changes. When a request
//! subtracts the saved fits first, the subtracted fluxes are computed into a
//! buffer and only replace the canonical fluxes once the new fit is stored.

use std::collections::HashSet;

use crate::domain::{FitKind, FitOutcome, FitRequest, HeldParams, PointStyleTable, SavedFit, TargetRecord, Uncertainty};
use crate::error::SedError;
use crate::fit::{FitEngine, FitInput};
use crate::models::{SUM_DISPLAY_MAX, display_span, log_grid, sample_curve, sample_sum, sum_of_fits};
use crate::parse::parse_row_group;
use crate::render::{ChartCurve, ChartPoint, ErrorBar, ReferenceBand, SUM_CURVE_LABEL, SedChart};
use crate::store::{RecordStore, TargetKey};
use crate::style::{Classification, classify};

/// Centres (Hz) of the PAH emission features marked on every chart.
pub const PAH_FREQUENCIES: [f64; 5] = [3.89e13, 2.65e13, 2.36e13, 4.84e13, 3.49e13];

/// Samples per plotted curve.
pub const CURVE_SAMPLES: usize = 200;

/// Limit arrows are drawn with a length of `flux / LIMIT_ARROW_FRACTION`.
const LIMIT_ARROW_FRACTION: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct Target {
    record: TargetRecord,
    classification: Classification,
    working_frequencies: Vec<f64>,
    working_fluxes: Vec<f64>,
    held: HeldParams,
    fallback_warned: HashSet<FitKind>,
    engine: FitEngine,
}

impl Target {
    pub fn from_record(record: TargetRecord, styles: &PointStyleTable) -> Result<Self, SedError> {
        validate(&record)?;
        let classification = classify(&record.telescopes, styles);
        Ok(Self {
            record,
            classification,
            working_frequencies: Vec::new(),
            working_fluxes: Vec::new(),
            held: HeldParams::none(),
            fallback_warned: HashSet::new(),
            engine: FitEngine::default(),
        })
    }

    /// Read, parse and classify one target from a store.
    pub fn load(store: &dyn RecordStore, key: TargetKey<'_>, styles: &PointStyleTable) -> Result<Self, SedError> {
        let group = store.read_target(key)?;
        let record = parse_row_group(&group)?;
        Self::from_record(record, styles)
    }

    pub fn with_engine(mut self, engine: FitEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &TargetRecord {
        &self.record
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Canonical frequencies minus the exclusions of the most recent
    /// successful fit. The fit range is not applied here.
    pub fn working_frequencies(&self) -> &[f64] {
        &self.working_frequencies
    }

    /// Fluxes matching [`Target::working_frequencies`], after any subtraction.
    pub fn working_fluxes(&self) -> &[f64] {
        &self.working_fluxes
    }

    pub fn held(&self) -> HeldParams {
        self.held
    }

    /// Held blackbody slots of the last blackbody fit, e.g. `"dust_temp, beta"`.
    pub fn hold_descriptor(&self) -> String {
        self.held.descriptor()
    }

    /// Whether the unweighted fallback has already been reported for `kind`.
    pub fn fallback_warned(&self, kind: FitKind) -> bool {
        self.fallback_warned.contains(&kind)
    }

    pub fn saved_fits(&self, store: &dyn RecordStore) -> Result<Vec<SavedFit>, SedError> {
        store.read_saved_fits(self.name())
    }

    /// Fit, persist, then commit the request's effects on this target.
    pub fn create_fit(&mut self, store: &mut dyn RecordStore, request: FitRequest) -> Result<FitOutcome, SedError> {
        self.working_frequencies.clear();
        self.working_fluxes.clear();

        let fluxes = if request.subtract {
            let saved = store.read_saved_fits(self.name())?;
            let frame = self.record.frame();
            self.record
                .frequencies
                .iter()
                .zip(&self.record.fluxes)
                .map(|(&nu, &flux)| flux - sum_of_fits(&saved, nu, &frame))
                .collect()
        } else {
            self.record.fluxes.clone()
        };

        let input = FitInput {
            frequencies: &self.record.frequencies,
            fluxes: &fluxes,
            uncertainty_lower: &self.record.uncertainty_lower,
            frame: self.record.frame(),
            request: &request,
        };
        let outcome = self.engine.fit(&input)?;

        store.write_saved_fit(self.name(), &outcome.fit)?;
        log::info!(
            "{}: saved {} fit over {} (chi2={:.4e})",
            self.name(),
            request.kind,
            outcome.fit.range,
            outcome.chi_square
        );

        if let Some(reason) = &outcome.weighting_fallback {
            if self.fallback_warned.insert(request.kind) {
                log::warn!(
                    "{}: could not fit {} with uncertainties ({reason}); fitting unweighted",
                    self.name(),
                    request.kind
                );
            }
        }
        let excluded: HashSet<usize> = request.exclusions.iter().copied().collect();
        let kept = |i: &usize| !excluded.contains(i);
        self.working_frequencies = (0..self.record.len())
            .filter(kept)
            .map(|i| self.record.frequencies[i])
            .collect();
        self.working_fluxes = (0..fluxes.len()).filter(kept).map(|i| fluxes[i]).collect();
        if request.subtract {
            self.record.fluxes = fluxes;
        }
        if request.kind == FitKind::ModBlackbody {
            self.held = request.held;
        }

        Ok(outcome)
    }

    /// Delete every saved fit of `kind`; a no-op when there are none.
    pub fn clear_fits(&self, store: &mut dyn RecordStore, kind: FitKind) -> Result<usize, SedError> {
        let removed = store.clear_saved_fits(self.name(), kind)?;
        if removed > 0 {
            log::info!("{}: cleared {removed} {kind} fit(s)", self.name());
        } else {
            log::debug!("{}: no {kind} fits to clear", self.name());
        }
        Ok(removed)
    }

    /// Build the chart for this target with the given saved fits overlaid.
    pub fn chart(&self, fits: &[SavedFit]) -> SedChart {
        let rec = &self.record;
        let frame = rec.frame();

        let min_freq = rec.frequencies.iter().copied().fold(f64::INFINITY, f64::min);
        let x_lower = min_freq / 2.0;

        let positive = rec.fluxes.iter().copied().filter(|f| *f > 0.0);
        let min_flux = positive.clone().fold(f64::INFINITY, f64::min);
        let max_flux = positive.fold(f64::NEG_INFINITY, f64::max);
        let y_bounds = if min_flux.is_finite() && max_flux.is_finite() {
            (min_flux / 2.0, max_flux * 1.5)
        } else {
            (1.0e-6, 1.0)
        };

        let points = (0..rec.len())
            .map(|i| ChartPoint {
                frequency: rec.frequencies[i],
                flux: rec.fluxes[i],
                error: error_bar(rec.fluxes[i], rec.uncertainty_upper[i], rec.uncertainty_lower[i]),
                category: self.classification.categories[i].clone(),
                marker: self.classification.markers[i].clone(),
                color: self.classification.colors[i].clone(),
            })
            .collect();

        let mut curves: Vec<ChartCurve> = fits
            .iter()
            .map(|fit| {
                let (lo, hi) = display_span(fit.kind(), x_lower);
                let grid = log_grid(lo, hi, CURVE_SAMPLES);
                ChartCurve {
                    label: fit.kind().to_string(),
                    line_style: fit.line_style.clone(),
                    fluxes: sample_curve(&fit.params, &grid, &frame),
                    frequencies: grid,
                }
            })
            .collect();
        if !fits.is_empty() {
            let grid = log_grid(x_lower, SUM_DISPLAY_MAX, CURVE_SAMPLES);
            curves.push(ChartCurve {
                label: SUM_CURVE_LABEL.to_string(),
                line_style: "solid".to_string(),
                fluxes: sample_sum(fits, &grid, &frame),
                frequencies: grid,
            });
        }

        SedChart {
            title: format!("SED for {}", rec.name),
            x_label: "Rest Frequency (Hz)".to_string(),
            y_label: "Flux Density (Jy)".to_string(),
            x_bounds: (x_lower, SUM_DISPLAY_MAX),
            y_bounds,
            points,
            curves,
            bands: pah_bands(),
            legend: self.classification.legend(),
        }
    }
}

fn validate(rec: &TargetRecord) -> Result<(), SedError> {
    let n = rec.frequencies.len();
    let lengths = [
        rec.telescopes.len(),
        rec.fluxes.len(),
        rec.uncertainty_upper.len(),
        rec.uncertainty_lower.len(),
    ];
    if n == 0 || lengths.iter().any(|&l| l != n) {
        return Err(SedError::malformed_record(
            Some(&rec.name),
            format!("array lengths disagree: {n} frequencies vs {lengths:?}"),
        ));
    }
    if let Some(bad) = rec.frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
        return Err(SedError::malformed_record(Some(&rec.name), format!("frequency {bad} must be positive")));
    }
    if !(rec.redshift >= 0.0 && rec.distance > 0.0) {
        return Err(SedError::malformed_record(
            Some(&rec.name),
            format!("redshift {} / distance {} out of range", rec.redshift, rec.distance),
        ));
    }
    Ok(())
}

fn error_bar(flux: f64, upper: Uncertainty, lower: Uncertainty) -> ErrorBar {
    if upper.is_limit() {
        return ErrorBar::UpperLimit(flux / LIMIT_ARROW_FRACTION);
    }
    match lower {
        Uncertainty::Limit => ErrorBar::LowerLimit(flux / LIMIT_ARROW_FRACTION),
        Uncertainty::Value(v) if v > 0.0 => ErrorBar::Symmetric(v),
        Uncertainty::Value(_) => ErrorBar::None,
    }
}

/// Bands are `ν/10` wide, starting `√10/100·ν` below the centre.
fn pah_bands() -> Vec<ReferenceBand> {
    PAH_FREQUENCIES
        .iter()
        .map(|&nu| {
            let width = nu / 10.0;
            let lower = nu - width * 10f64.sqrt() / 10.0;
            ReferenceBand {
                center: nu,
                lower,
                upper: lower + width,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRange, ModelParams, PointStyle, PowerLawParams};
    use crate::models::power_law;
    use crate::store::MemoryStore;

    const AMPLITUDE: f64 = 1.0e-25;

    fn styles() -> PointStyleTable {
        PointStyleTable::new(vec![
            PointStyle {
                telescope: "ALMA".into(),
                marker: "o".into(),
                color: "red".into(),
            },
            PointStyle {
                telescope: "Other".into(),
                marker: "x".into(),
                color: "gray".into(),
            },
        ])
    }

    /// Eight points on `scale · A ν²`.
    fn record(scale: f64) -> TargetRecord {
        let frequencies = log_grid(1.0e11, 1.0e12, 8);
        let fluxes: Vec<f64> = frequencies.iter().map(|&nu| scale * power_law(nu, AMPLITUDE, 2.0)).collect();
        let mut telescopes = vec!["ALMA".to_string(); 8];
        telescopes[7] = "SCUBA".to_string();
        TargetRecord {
            name: "M82".to_string(),
            uncertainty_upper: fluxes.iter().map(|f| Uncertainty::Value(0.1 * f)).collect(),
            uncertainty_lower: fluxes.iter().map(|f| Uncertainty::Value(0.1 * f)).collect(),
            frequencies,
            telescopes,
            fluxes,
            redshift: 0.0007,
            distance: 3.5,
        }
    }

    fn saved_power_law() -> SavedFit {
        SavedFit {
            params: ModelParams::PowerLaw(PowerLawParams {
                amplitude: AMPLITUDE,
                exponent: 2.0,
            }),
            range: FitRange::new(0, 8),
            line_style: "dashed".to_string(),
        }
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        let mut rec = record(1.0);
        rec.telescopes.pop();
        let err = Target::from_record(rec, &styles()).unwrap_err();
        assert!(matches!(err, SedError::MalformedRecord { .. }));
    }

    #[test]
    fn classification_happens_at_construction() {
        let target = Target::from_record(record(1.0), &styles()).unwrap();
        assert_eq!(target.classification().categories[0], "ALMA");
        assert_eq!(target.classification().categories[7], "Other");
        assert_eq!(target.classification().markers[7], "x");
    }

    #[test]
    fn invalid_range_writes_nothing() {
        let mut store = MemoryStore::default();
        let mut target = Target::from_record(record(1.0), &styles()).unwrap();

        let err = target
            .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(4, 4)))
            .unwrap_err();
        assert!(matches!(err, SedError::InvalidFitRange(_)));
        assert!(target.saved_fits(&store).unwrap().is_empty());
        assert!(target.working_frequencies().is_empty());
    }

    #[test]
    fn successful_fit_is_persisted_and_sets_working_points() {
        let mut store = MemoryStore::default();
        let mut target = Target::from_record(record(1.0), &styles()).unwrap();

        let request = FitRequest::new(FitKind::PowerLaw, FitRange::new(1, 7)).with_exclusions(vec![3]);
        let outcome = target.create_fit(&mut store, request).unwrap();

        assert_eq!(target.saved_fits(&store).unwrap(), vec![outcome.fit.clone()]);
        assert_eq!(outcome.fit.range, FitRange::new(1, 7));
        assert_eq!(outcome.points_used, 5);

        let expected: Vec<f64> = (0..8).filter(|&i| i != 3).map(|i| target.record().frequencies[i]).collect();
        assert_eq!(target.working_frequencies(), expected.as_slice());
        assert_eq!(target.working_fluxes().len(), 7);
        assert_eq!(target.working_fluxes()[3], target.record().fluxes[4]);
    }

    /// Ten points on `flux_at_lo · (ν/lo)^exponent` with 10% uncertainties.
    fn power_law_record(exponent: f64, lo: f64, hi: f64, flux_at_lo: f64) -> (TargetRecord, f64) {
        let mut rec = record(1.0);
        let amplitude = flux_at_lo * lo.powf(-exponent);
        rec.frequencies = log_grid(lo, hi, 10);
        rec.fluxes = rec.frequencies.iter().map(|&nu| power_law(nu, amplitude, exponent)).collect();
        rec.uncertainty_upper = rec.fluxes.iter().map(|f| Uncertainty::Value(0.1 * f)).collect();
        rec.uncertainty_lower = rec.uncertainty_upper.clone();
        rec.telescopes = vec!["ALMA".to_string(); 10];
        (rec, amplitude)
    }

    #[test]
    fn power_law_exponents_are_recovered_through_the_target() {
        for (exponent, lo, hi, flux_at_lo) in [(-0.7, 1.0e9, 1.0e11, 1.0e-2), (3.5, 1.0e11, 1.0e12, 1.0e-3)] {
            let mut store = MemoryStore::default();
            let (rec, amplitude) = power_law_record(exponent, lo, hi, flux_at_lo);
            let mut target = Target::from_record(rec, &styles()).unwrap();

            let outcome = target
                .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 10)))
                .unwrap();
            let ModelParams::PowerLaw(p) = outcome.fit.params else {
                panic!("expected power-law parameters");
            };
            assert!(outcome.weighted);
            assert!((p.exponent - exponent).abs() < 1e-4, "{} vs {exponent}", p.exponent);
            assert!((p.amplitude / amplitude - 1.0).abs() < 1e-3, "{} vs {amplitude}", p.amplitude);
            assert_eq!(target.saved_fits(&store).unwrap(), vec![outcome.fit]);
        }
    }

    #[test]
    fn zero_lower_uncertainty_falls_back_to_unweighted() {
        let mut store = MemoryStore::default();
        let (mut rec, _) = power_law_record(-0.7, 1.0e9, 1.0e11, 1.0e-2);
        rec.uncertainty_lower[4] = Uncertainty::Value(0.0);
        let mut target = Target::from_record(rec, &styles()).unwrap();

        let outcome = target
            .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 10)))
            .unwrap();
        let ModelParams::PowerLaw(p) = outcome.fit.params else {
            panic!("expected power-law parameters");
        };
        assert!(!outcome.weighted);
        assert!(outcome.weighting_fallback.is_some());
        assert!((p.exponent + 0.7).abs() < 1e-4, "{}", p.exponent);
        assert!(target.fallback_warned(FitKind::PowerLaw));
    }

    #[test]
    fn failed_write_does_not_flag_the_fallback() {
        let mut store = MemoryStore::default();
        store.set_fail_writes(true);
        let mut rec = record(1.0);
        rec.uncertainty_lower[2] = Uncertainty::Limit;
        let mut target = Target::from_record(rec, &styles()).unwrap();

        let err = target
            .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 8)))
            .unwrap_err();
        assert!(matches!(err, SedError::Persistence(_)));
        assert!(!target.fallback_warned(FitKind::PowerLaw));

        store.set_fail_writes(false);
        let outcome = target
            .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 8)))
            .unwrap();
        assert!(!outcome.weighted);
        assert!(target.fallback_warned(FitKind::PowerLaw));
    }

    #[test]
    fn subtraction_is_committed_after_persisting() {
        let mut store = MemoryStore::default();
        store.write_saved_fit("M82", &saved_power_law()).unwrap();
        let mut target = Target::from_record(record(2.0), &styles()).unwrap();
        let expected: Vec<f64> = record(1.0).fluxes;

        let request = FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 8)).with_subtract(true);
        let outcome = target.create_fit(&mut store, request).unwrap();

        for (got, want) in target.record().fluxes.iter().zip(&expected) {
            assert!(((got - want) / want).abs() < 1e-12, "{got} vs {want}");
        }
        let ModelParams::PowerLaw(p) = outcome.fit.params else {
            panic!("expected power-law parameters");
        };
        assert!((p.exponent - 2.0).abs() < 1e-3);
        assert_eq!(target.saved_fits(&store).unwrap().len(), 2);
    }

    #[test]
    fn failed_persistence_leaves_fluxes_untouched() {
        let mut store = MemoryStore::default();
        store.write_saved_fit("M82", &saved_power_law()).unwrap();
        store.set_fail_writes(true);
        let mut target = Target::from_record(record(2.0), &styles()).unwrap();

        let request = FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 8)).with_subtract(true);
        let err = target.create_fit(&mut store, request).unwrap_err();

        assert!(matches!(err, SedError::Persistence(_)));
        assert_eq!(target.record().fluxes, record(2.0).fluxes);
        assert_eq!(target.saved_fits(&store).unwrap().len(), 1);
        assert!(target.working_frequencies().is_empty());
    }

    #[test]
    fn held_parameters_are_recorded_for_blackbody_fits() {
        let mut store = MemoryStore::default();
        let mut target = Target::from_record(record(1.0), &styles()).unwrap();
        let held = HeldParams::from_hold_vector([30.0, 1.0e6, 1.5]);

        let request = FitRequest::new(FitKind::ModBlackbody, FitRange::new(0, 8)).with_held(held);
        let outcome = target.create_fit(&mut store, request).unwrap();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(target.held(), held);
        assert_eq!(target.hold_descriptor(), "dust_temp, dust_mass, beta");
    }

    #[test]
    fn fallback_is_flagged_once_per_kind() {
        let mut store = MemoryStore::default();
        let mut rec = record(1.0);
        rec.uncertainty_lower[2] = Uncertainty::Limit;
        let mut target = Target::from_record(rec, &styles()).unwrap();
        assert!(!target.fallback_warned(FitKind::PowerLaw));

        for _ in 0..2 {
            let outcome = target
                .create_fit(&mut store, FitRequest::new(FitKind::PowerLaw, FitRange::new(0, 8)))
                .unwrap();
            assert!(!outcome.weighted);
        }
        assert!(target.fallback_warned(FitKind::PowerLaw));
        assert!(!target.fallback_warned(FitKind::ModBlackbody));
    }

    #[test]
    fn clearing_twice_is_harmless() {
        let mut store = MemoryStore::default();
        store.write_saved_fit("M82", &saved_power_law()).unwrap();
        let target = Target::from_record(record(1.0), &styles()).unwrap();

        assert_eq!(target.clear_fits(&mut store, FitKind::PowerLaw).unwrap(), 1);
        assert_eq!(target.clear_fits(&mut store, FitKind::PowerLaw).unwrap(), 0);
        assert!(target.saved_fits(&store).unwrap().is_empty());
    }

    #[test]
    fn chart_carries_points_curves_and_bands() {
        let mut rec = record(1.0);
        rec.uncertainty_upper[0] = Uncertainty::Limit;
        rec.uncertainty_lower[1] = Uncertainty::Limit;
        let target = Target::from_record(rec.clone(), &styles()).unwrap();

        let chart = target.chart(&[saved_power_law()]);
        assert_eq!(chart.title, "SED for M82");
        assert_eq!(chart.points.len(), 8);
        assert_eq!(chart.points[0].error, ErrorBar::UpperLimit(rec.fluxes[0] / 5.0));
        assert_eq!(chart.points[1].error, ErrorBar::LowerLimit(rec.fluxes[1] / 5.0));
        assert_eq!(chart.points[2].error, ErrorBar::Symmetric(0.1 * rec.fluxes[2]));

        assert_eq!(chart.curves.len(), 2);
        assert_eq!(chart.curves[0].line_style, "dashed");
        assert!((chart.curves[0].frequencies[0] / 1.0e11 - 1.0).abs() < 1e-12);
        assert_eq!(chart.curves[1].label, SUM_CURVE_LABEL);

        assert_eq!(chart.bands.len(), 5);
        assert!(chart.bands.iter().all(|b| b.lower < b.center && b.center < b.upper));
        assert!((chart.x_bounds.0 / 5.0e10 - 1.0).abs() < 1e-12);
        assert_eq!(chart.x_bounds.1, SUM_DISPLAY_MAX);
        assert_eq!(chart.legend.len(), 2);
    }

    #[test]
    fn chart_without_fits_has_no_curves() {
        let target = Target::from_record(record(1.0), &styles()).unwrap();
        assert!(target.chart(&[]).curves.is_empty());
    }
}
