//! Fit one emission model to a subset of a target's points.
//!
//! A request goes through:
//!
//! - range and exclusion validation
//! - subset selection (exclusions removed, then the range sliced)
//! - hold resolution (blackbody only)
//! - a weighted Levenberg–Marquardt attempt, then an unweighted retry
//! - reconstruction of the full parameter vector
//!
//! Holding all three blackbody parameters skips the solver entirely.

use crate::domain::{
    BLACKBODY_INITIAL_GUESS, BlackbodyParams, FitKind, FitOutcome, FitRequest, HeldParams,
    ModelParams, POWER_LAW_INITIAL_GUESS, PowerLawParams, SavedFit, SourceFrame, Uncertainty,
};
use crate::error::SedError;
use crate::math::{LmConfig, LmResult, SolveError, levenberg_marquardt};
use crate::models::{modified_blackbody, power_law};

/// Borrowed view of everything one fit needs.
#[derive(Debug, Clone, Copy)]
pub struct FitInput<'a> {
    pub frequencies: &'a [f64],
    /// Fluxes to fit, already background-subtracted when requested.
    pub fluxes: &'a [f64],
    pub uncertainty_lower: &'a [Uncertainty],
    pub frame: SourceFrame,
    pub request: &'a FitRequest,
}

/// Points that survived exclusion and slicing, in canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitSubset {
    pub frequencies: Vec<f64>,
    pub fluxes: Vec<f64>,
    pub sigmas: Vec<Uncertainty>,
}

impl FitSubset {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// How residuals are scaled in one solver attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Divide by the lower uncertainty of each point.
    ByUncertainty,
    Uniform,
}

impl Weighting {
    fn label(self) -> &'static str {
        match self {
            Weighting::ByUncertainty => "weighted",
            Weighting::Uniform => "unweighted",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    lm: LmConfig,
}

impl FitEngine {
    pub fn new(lm: LmConfig) -> Self {
        Self { lm }
    }

    pub fn fit(&self, input: &FitInput<'_>) -> Result<FitOutcome, SedError> {
        let request = input.request;
        let subset = select_subset(input)?;

        let held = match request.kind {
            FitKind::ModBlackbody => request.held,
            FitKind::PowerLaw => {
                if !request.held.is_empty() {
                    log::warn!(
                        "ignoring held parameters ({}) for a power-law fit",
                        request.held.descriptor()
                    );
                }
                HeldParams::none()
            }
        };

        let initial = initial_guess(request.kind, &held);
        if subset.len() < initial.len() {
            return Err(SedError::InvalidFitRange(format!(
                "{} points selected but {} parameters are free",
                subset.len(),
                initial.len()
            )));
        }

        let model = FreeModel {
            kind: request.kind,
            held,
            frame: input.frame,
            pivot: pivot_frequency(&subset.frequencies),
        };

        if initial.is_empty() {
            return Ok(short_circuit(&model, &subset, request));
        }

        let mut failures: Vec<String> = Vec::with_capacity(2);
        for weighting in [Weighting::ByUncertainty, Weighting::Uniform] {
            match self.attempt(&model, &subset, &initial, weighting) {
                Ok((res, params)) => {
                    log::debug!(
                        "{} {} fit: chi2={:.6e} after {} iterations (converged={})",
                        weighting.label(),
                        request.kind,
                        res.chi_square,
                        res.iterations,
                        res.converged
                    );
                    if !res.converged {
                        log::info!(
                            "{} fit hit the iteration cap ({}); keeping the last parameters",
                            request.kind,
                            self.lm.max_iterations
                        );
                    }
                    let outcome = build_outcome(
                        request,
                        params,
                        res.chi_square,
                        subset.len(),
                        initial.len(),
                        res.iterations,
                        weighting,
                        failures.pop(),
                        res.converged,
                    );
                    return Ok(outcome);
                }
                Err(reason) => {
                    log::debug!("{} {} attempt failed: {reason}", weighting.label(), request.kind);
                    failures.push(reason);
                }
            }
        }

        Err(SedError::FitDidNotConverge {
            kind: request.kind,
            reason: format!("weighted: {}; unweighted: {}", failures[0], failures[1]),
        })
    }

    fn attempt(
        &self,
        model: &FreeModel,
        subset: &FitSubset,
        initial: &[f64],
        weighting: Weighting,
    ) -> Result<(LmResult, ModelParams), String> {
        let scale = residual_scale(subset, weighting)?;
        let res = levenberg_marquardt(
            |p, out| {
                for (i, r) in out.iter_mut().enumerate() {
                    *r = (model.eval(p, subset.frequencies[i]) - subset.fluxes[i]) / scale[i];
                }
            },
            initial,
            subset.len(),
            &self.lm,
        )
        .map_err(|e: SolveError| e.to_string())?;

        let params = model
            .full_params(&res.params)
            .ok_or_else(|| "solver returned the wrong number of parameters".to_string())?;
        if params.positional().iter().any(|v| !v.is_finite()) {
            return Err(format!("fitted parameters are not finite: {:?}", params.positional()));
        }
        Ok((res, params))
    }
}

/// Validate the request against `input` and pick the fitted points.
///
/// Exclusions are removed from the full arrays in descending index order, then
/// `[start, end - exclusions)` is kept.
pub fn select_subset(input: &FitInput<'_>) -> Result<FitSubset, SedError> {
    let n = input.frequencies.len();
    if input.fluxes.len() != n || input.uncertainty_lower.len() != n {
        return Err(SedError::InvalidFitRange(format!(
            "input arrays disagree in length ({n} frequencies, {} fluxes, {} uncertainties)",
            input.fluxes.len(),
            input.uncertainty_lower.len()
        )));
    }

    let range = input.request.range;
    if range.start >= range.end {
        return Err(SedError::InvalidFitRange(format!(
            "start {} must be below end {}",
            range.start, range.end
        )));
    }
    if range.end > n {
        return Err(SedError::InvalidFitRange(format!(
            "end {} exceeds the {n} available points",
            range.end
        )));
    }

    let mut exclusions = input.request.exclusions.clone();
    exclusions.sort_unstable();
    exclusions.dedup();
    if let Some(bad) = exclusions.iter().find(|&&e| !range.contains(e)) {
        return Err(SedError::InvalidFitRange(format!("excluded index {bad} lies outside {range}")));
    }

    let mut frequencies = input.frequencies.to_vec();
    let mut fluxes = input.fluxes.to_vec();
    let mut sigmas = input.uncertainty_lower.to_vec();
    for &idx in exclusions.iter().rev() {
        frequencies.remove(idx);
        fluxes.remove(idx);
        sigmas.remove(idx);
    }

    let end = range.end - exclusions.len();
    if range.start >= end {
        return Err(SedError::InvalidFitRange(format!("every point in {range} is excluded")));
    }

    Ok(FitSubset {
        frequencies: frequencies[range.start..end].to_vec(),
        fluxes: fluxes[range.start..end].to_vec(),
        sigmas: sigmas[range.start..end].to_vec(),
    })
}

fn initial_guess(kind: FitKind, held: &HeldParams) -> Vec<f64> {
    match kind {
        FitKind::ModBlackbody => held.free_values(BLACKBODY_INITIAL_GUESS),
        FitKind::PowerLaw => POWER_LAW_INITIAL_GUESS.to_vec(),
    }
}

/// Per-point residual divisors for one attempt.
fn residual_scale(subset: &FitSubset, weighting: Weighting) -> Result<Vec<f64>, String> {
    match weighting {
        Weighting::Uniform => Ok(vec![1.0; subset.len()]),
        Weighting::ByUncertainty => subset
            .sigmas
            .iter()
            .enumerate()
            .map(|(i, sigma)| match sigma {
                Uncertainty::Value(v) if v.is_finite() && *v > 0.0 => Ok(*v),
                Uncertainty::Value(v) => Err(format!("lower uncertainty {v} of point {i} cannot weight a fit")),
                Uncertainty::Limit => Err(format!("point {i} is a detection limit")),
            })
            .collect(),
    }
}

/// Maps a free-parameter vector to a model value.
///
/// The power law is solved as `A·(ν/pivot)^α` so the amplitude stays on the
/// scale of the fluxes; `full_params` converts back to `amplitude·ν^α`.
struct FreeModel {
    kind: FitKind,
    held: HeldParams,
    frame: SourceFrame,
    pivot: f64,
}

impl FreeModel {
    fn eval(&self, free: &[f64], freq: f64) -> f64 {
        match self.kind {
            FitKind::ModBlackbody => match self.held.expand(free) {
                Some(p) => modified_blackbody(freq, &p, &self.frame),
                None => f64::NAN,
            },
            FitKind::PowerLaw => match free {
                [a, alpha] => power_law(freq / self.pivot, *a, *alpha),
                _ => f64::NAN,
            },
        }
    }

    fn full_params(&self, free: &[f64]) -> Option<ModelParams> {
        match self.kind {
            FitKind::ModBlackbody => self.held.expand(free).map(ModelParams::ModBlackbody),
            FitKind::PowerLaw => match free {
                [a, alpha] => Some(ModelParams::PowerLaw(PowerLawParams {
                    amplitude: *a * self.pivot.powf(-*alpha),
                    exponent: *alpha,
                })),
                _ => None,
            },
        }
    }
}

/// Geometric mean of the fitted frequencies.
fn pivot_frequency(frequencies: &[f64]) -> f64 {
    if frequencies.is_empty() {
        return 1.0;
    }
    let mean_ln = frequencies.iter().map(|nu| nu.ln()).sum::<f64>() / frequencies.len() as f64;
    mean_ln.exp()
}

fn short_circuit(model: &FreeModel, subset: &FitSubset, request: &FitRequest) -> FitOutcome {
    let full = model.held.slots().map(|s| s.unwrap_or_default());
    let params = BlackbodyParams::from_array(full);
    let (weighting, scale) = match residual_scale(subset, Weighting::ByUncertainty) {
        Ok(scale) => (Weighting::ByUncertainty, scale),
        Err(_) => (Weighting::Uniform, vec![1.0; subset.len()]),
    };
    let chi_square = subset
        .frequencies
        .iter()
        .zip(&subset.fluxes)
        .zip(&scale)
        .map(|((&nu, &flux), &s)| {
            let r = (modified_blackbody(nu, &params, &model.frame) - flux) / s;
            r * r
        })
        .sum();
    log::debug!("all blackbody parameters held; skipping the solver");
    build_outcome(
        request,
        ModelParams::ModBlackbody(params),
        chi_square,
        subset.len(),
        0,
        0,
        weighting,
        None,
        true,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_outcome(
    request: &FitRequest,
    params: ModelParams,
    chi_square: f64,
    points_used: usize,
    free_parameters: usize,
    iterations: usize,
    weighting: Weighting,
    weighting_fallback: Option<String>,
    converged: bool,
) -> FitOutcome {
    let degrees_of_freedom = points_used - free_parameters;
    let reduced_chi_square = if degrees_of_freedom > 0 {
        chi_square / degrees_of_freedom as f64
    } else {
        f64::NAN
    };
    FitOutcome {
        fit: SavedFit {
            params,
            range: request.range,
            line_style: request.line_style.clone(),
        },
        chi_square,
        reduced_chi_square,
        degrees_of_freedom,
        points_used,
        free_parameters,
        iterations,
        weighted: weighting == Weighting::ByUncertainty,
        weighting_fallback,
        converged,
    }
}
