//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - produced by the record parser and the synthetic generator
//! - persisted by a record store
//! - exported to JSON alongside rendered charts

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Initial guess for `[dust_temperature (K), dust_mass (M_sun), beta]`.
pub const BLACKBODY_INITIAL_GUESS: [f64; 3] = [25.0, 1.0e6, 1.8];

/// Initial guess for `[amplitude, exponent]`.
pub const POWER_LAW_INITIAL_GUESS: [f64; 2] = [0.0, 2.0];

/// Line style used when the caller does not pick one.
pub const DEFAULT_LINE_STYLE: &str = "solid";

/// Which emission model a fit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FitKind {
    ModBlackbody,
    PowerLaw,
}

impl FitKind {
    /// Stable identifier used in persisted rows.
    pub fn as_str(self) -> &'static str {
        match self {
            FitKind::ModBlackbody => "mod_blackbody",
            FitKind::PowerLaw => "power_law",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            FitKind::ModBlackbody => "Modified blackbody",
            FitKind::PowerLaw => "Power law",
        }
    }

    /// Number of model parameters.
    pub fn param_count(self) -> usize {
        match self {
            FitKind::ModBlackbody => 3,
            FitKind::PowerLaw => 2,
        }
    }

    pub fn parse(s: &str) -> Option<FitKind> {
        match s.trim() {
            "mod_blackbody" => Some(FitKind::ModBlackbody),
            "power_law" => Some(FitKind::PowerLaw),
            _ => None,
        }
    }
}

impl fmt::Display for FitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uncertainty cell.
///
/// `Limit` marks a one-sided detection limit; it is never coerced to a number
/// because it switches the point to an arrow instead of an error bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uncertainty {
    Value(f64),
    Limit,
}

impl Uncertainty {
    pub fn value(self) -> Option<f64> {
        match self {
            Uncertainty::Value(v) => Some(v),
            Uncertainty::Limit => None,
        }
    }

    pub fn is_limit(self) -> bool {
        matches!(self, Uncertainty::Limit)
    }
}

impl fmt::Display for Uncertainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uncertainty::Value(v) => write!(f, "{v}"),
            Uncertainty::Limit => f.write_str("Limit"),
        }
    }
}

/// Distance and redshift of a source; everything the blackbody needs besides
/// its own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceFrame {
    /// Distance in Mpc.
    pub distance: f64,
    pub redshift: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackbodyParams {
    /// Dust temperature in K.
    pub dust_temperature: f64,
    /// Dust mass in solar masses.
    pub dust_mass: f64,
    /// Emissivity index.
    pub beta: f64,
}

impl BlackbodyParams {
    pub fn from_array(p: [f64; 3]) -> Self {
        Self {
            dust_temperature: p[0],
            dust_mass: p[1],
            beta: p[2],
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.dust_temperature, self.dust_mass, self.beta]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawParams {
    pub amplitude: f64,
    pub exponent: f64,
}

/// Fitted parameters tagged with their model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    ModBlackbody(BlackbodyParams),
    PowerLaw(PowerLawParams),
}

impl ModelParams {
    pub fn kind(&self) -> FitKind {
        match self {
            ModelParams::ModBlackbody(_) => FitKind::ModBlackbody,
            ModelParams::PowerLaw(_) => FitKind::PowerLaw,
        }
    }

    /// Parameters in persisted column order.
    pub fn positional(&self) -> Vec<f64> {
        match self {
            ModelParams::ModBlackbody(p) => p.to_array().to_vec(),
            ModelParams::PowerLaw(p) => vec![p.amplitude, p.exponent],
        }
    }

    /// Rebuild from persisted column order; extra trailing values are ignored.
    pub fn from_positional(kind: FitKind, values: &[f64]) -> Option<Self> {
        match kind {
            FitKind::ModBlackbody => match values {
                [t, m, b, ..] => Some(ModelParams::ModBlackbody(BlackbodyParams::from_array([
                    *t, *m, *b,
                ]))),
                _ => None,
            },
            FitKind::PowerLaw => match values {
                [a, alpha, ..] => Some(ModelParams::PowerLaw(PowerLawParams {
                    amplitude: *a,
                    exponent: *alpha,
                })),
                _ => None,
            },
        }
    }
}

/// Which blackbody parameters are held fixed during a fit.
///
/// `None` means free. Slot order is `(dust_temp, dust_mass, beta)`, matching
/// the positional parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeldParams {
    pub dust_temp: Option<f64>,
    pub dust_mass: Option<f64>,
    pub beta: Option<f64>,
}

impl HeldParams {
    pub const SLOT_NAMES: [&'static str; 3] = ["dust_temp", "dust_mass", "beta"];

    /// Everything free.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from a 3-slot hold vector where `0` means free.
    pub fn from_hold_vector(hold: [f64; 3]) -> Self {
        let held = |v: f64| if v != 0.0 { Some(v) } else { None };
        Self {
            dust_temp: held(hold[0]),
            dust_mass: held(hold[1]),
            beta: held(hold[2]),
        }
    }

    pub fn slots(&self) -> [Option<f64>; 3] {
        [self.dust_temp, self.dust_mass, self.beta]
    }

    pub fn held_count(&self) -> usize {
        self.slots().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.held_count() == 0
    }

    pub fn all_held(&self) -> bool {
        self.held_count() == 3
    }

    /// Drop held slots from a full 3-slot vector, keeping position order.
    pub fn free_values(&self, full: [f64; 3]) -> Vec<f64> {
        self.slots()
            .iter()
            .zip(full)
            .filter(|(slot, _)| slot.is_none())
            .map(|(_, v)| v)
            .collect()
    }

    /// Merge a free-parameter vector back into full blackbody parameters.
    ///
    /// Returns `None` when `free.len()` does not equal the number of free slots.
    pub fn expand(&self, free: &[f64]) -> Option<BlackbodyParams> {
        if free.len() != 3 - self.held_count() {
            return None;
        }
        let mut it = free.iter().copied();
        let mut out = [0.0; 3];
        for (dst, slot) in out.iter_mut().zip(self.slots()) {
            *dst = match slot {
                Some(v) => v,
                None => it.next()?,
            };
        }
        Some(BlackbodyParams::from_array(out))
    }

    /// Human-readable list of held slots, e.g. `"dust_temp, beta"` or `"none"`.
    pub fn descriptor(&self) -> String {
        let names: Vec<&str> = Self::SLOT_NAMES
            .iter()
            .zip(self.slots())
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }
}

/// Half-open index span `[start, end)` into a target's canonical arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRange {
    pub start: usize,
    pub end: usize,
}

impl FitRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, idx: usize) -> bool {
        idx >= self.start && idx < self.end
    }
}

impl fmt::Display for FitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A persisted fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFit {
    pub params: ModelParams,
    pub range: FitRange,
    /// Rendering hint; opaque to fitting.
    pub line_style: String,
}

impl SavedFit {
    pub fn kind(&self) -> FitKind {
        self.params.kind()
    }
}

/// Marker/color pair for one telescope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointStyle {
    pub telescope: String,
    pub marker: String,
    pub color: String,
}

/// Process-wide telescope style table, in lookup order.
///
/// The last entry doubles as the visuals for unknown telescopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointStyleTable {
    pub entries: Vec<PointStyle>,
}

impl PointStyleTable {
    pub fn new(entries: Vec<PointStyle>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fallback(&self) -> Option<&PointStyle> {
        self.entries.last()
    }
}

/// Typed contents of one target's row group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub name: String,
    /// Observed frequency in Hz, in measurement order.
    pub frequencies: Vec<f64>,
    pub telescopes: Vec<String>,
    /// Flux density in Jy.
    pub fluxes: Vec<f64>,
    pub uncertainty_upper: Vec<Uncertainty>,
    pub uncertainty_lower: Vec<Uncertainty>,
    pub redshift: f64,
    /// Distance in Mpc.
    pub distance: f64,
}

impl TargetRecord {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frame(&self) -> SourceFrame {
        SourceFrame {
            distance: self.distance,
            redshift: self.redshift,
        }
    }
}

/// An immutable fit request.
#[derive(Debug, Clone, PartialEq)]
pub struct FitRequest {
    pub kind: FitKind,
    pub range: FitRange,
    /// Individual indices inside `range` to drop from the fit.
    pub exclusions: Vec<usize>,
    /// Blackbody holds; ignored for power-law fits.
    pub held: HeldParams,
    /// Fit against flux minus the sum of the target's saved fits.
    pub subtract: bool,
    pub line_style: String,
}

impl FitRequest {
    pub fn new(kind: FitKind, range: FitRange) -> Self {
        Self {
            kind,
            range,
            exclusions: Vec::new(),
            held: HeldParams::none(),
            subtract: false,
            line_style: DEFAULT_LINE_STYLE.to_string(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: Vec<usize>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_held(mut self, held: HeldParams) -> Self {
        self.held = held;
        self
    }

    pub fn with_subtract(mut self, subtract: bool) -> Self {
        self.subtract = subtract;
        self
    }

    pub fn with_line_style(mut self, line_style: impl Into<String>) -> Self {
        self.line_style = line_style.into();
        self
    }
}

/// Result of a successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub fit: SavedFit,
    /// Sum of squared (possibly weighted) residuals.
    pub chi_square: f64,
    /// `chi_square / degrees_of_freedom`; NaN when there are no degrees of freedom.
    pub reduced_chi_square: f64,
    pub degrees_of_freedom: usize,
    pub points_used: usize,
    pub free_parameters: usize,
    pub iterations: usize,
    /// `false` when the fit fell back to uniform weights.
    pub weighted: bool,
    /// Why the weighted attempt was abandoned, when it was.
    pub weighting_fallback: Option<String>,
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_vector_zero_means_free() {
        let held = HeldParams::from_hold_vector([0.0, 2.0e7, 0.0]);
        assert_eq!(held.dust_temp, None);
        assert_eq!(held.dust_mass, Some(2.0e7));
        assert_eq!(held.beta, None);
        assert_eq!(held.descriptor(), "dust_mass");
    }

    #[test]
    fn expand_covers_every_two_hold_combination() {
        let cases = [
            (HeldParams::from_hold_vector([30.0, 5.0e6, 0.0]), [30.0, 5.0e6, 9.0]),
            (HeldParams::from_hold_vector([30.0, 0.0, 2.0]), [30.0, 9.0, 2.0]),
            (HeldParams::from_hold_vector([0.0, 5.0e6, 2.0]), [9.0, 5.0e6, 2.0]),
        ];
        for (held, expected) in cases {
            let full = held.expand(&[9.0]).unwrap();
            assert_eq!(full.to_array(), expected, "{}", held.descriptor());
        }
    }

    #[test]
    fn expand_covers_single_holds_in_position_order() {
        let held = HeldParams::from_hold_vector([0.0, 4.0e6, 0.0]);
        assert_eq!(held.free_values([25.0, 1.0e6, 1.8]), vec![25.0, 1.8]);
        let full = held.expand(&[31.0, 1.6]).unwrap();
        assert_eq!(full.to_array(), [31.0, 4.0e6, 1.6]);
        assert!(held.expand(&[31.0]).is_none());
    }

    #[test]
    fn descriptor_lists_held_slots_in_order() {
        assert_eq!(HeldParams::none().descriptor(), "none");
        let held = HeldParams::from_hold_vector([20.0, 0.0, 1.5]);
        assert_eq!(held.descriptor(), "dust_temp, beta");
        assert!(HeldParams::from_hold_vector([20.0, 1.0, 1.5]).all_held());
    }

    #[test]
    fn positional_params_round_trip() {
        let p = ModelParams::PowerLaw(PowerLawParams {
            amplitude: 3.0e-25,
            exponent: 2.1,
        });
        let back = ModelParams::from_positional(FitKind::PowerLaw, &p.positional()).unwrap();
        assert_eq!(back, p);
        assert!(ModelParams::from_positional(FitKind::ModBlackbody, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn fit_kind_parses_persisted_names() {
        assert_eq!(FitKind::parse("mod_blackbody"), Some(FitKind::ModBlackbody));
        assert_eq!(FitKind::parse(" power_law "), Some(FitKind::PowerLaw));
        assert_eq!(FitKind::parse("gaussian"), None);
    }
}
