//! Formatted terminal output.
//!
//! Formatting lives in one place so:
//! - the fitting and store code stays free of presentation details
//! - output changes are localized

use crate::domain::{FitOutcome, ModelParams, SavedFit};
use crate::models::frequency_to_wavelength;
use crate::target::Target;

/// Numbered list of target names, as accepted by `<target>` arguments.
pub fn format_target_list(names: &[String]) -> String {
    if names.is_empty() {
        return "No targets in store.\n".to_string();
    }
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("{i:>4}  {name}\n"));
    }
    out
}

/// Short description of a loaded target.
pub fn format_target_summary(target: &Target) -> String {
    let rec = target.record();
    let (lo, hi) = rec
        .frequencies
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| (lo.min(f), hi.max(f)));

    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", rec.name));
    out.push_str(&format!(
        "Points: n={} | frequency=[{lo:.3e}, {hi:.3e}] Hz | wavelength=[{:.1}, {:.1}] um\n",
        rec.len(),
        frequency_to_wavelength(hi) * 1.0e6,
        frequency_to_wavelength(lo) * 1.0e6
    ));
    out.push_str(&format!("Redshift: {} | Distance: {} Mpc\n", rec.redshift, rec.distance));
    let categories: Vec<String> = target
        .classification()
        .legend()
        .into_iter()
        .map(|e| e.category)
        .collect();
    out.push_str(&format!("Telescopes: {}\n", categories.join(", ")));
    out
}

/// Table of saved fits with their parameters, range and line style.
pub fn format_saved_fits(name: &str, fits: &[SavedFit]) -> String {
    if fits.is_empty() {
        return format!("No saved fits for {name}.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("Saved fits for {name}:\n"));
    out.push_str(
        format!(
            "{:<3} {:<14} {:>12} {:>12} {:>12} {:<10} {:<10}",
            "#", "type", "p1", "p2", "p3", "range", "linestyle"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<3} {:-<14} {:-<12} {:-<12} {:-<12} {:-<10} {:-<10}\n",
        "", "", "", "", "", "", ""
    ));

    for (i, fit) in fits.iter().enumerate() {
        let p = fit.params.positional();
        let p3 = p.get(2).map(|v| fmt_param(*v)).unwrap_or_default();
        out.push_str(
            format!(
                "{i:<3} {:<14} {:>12} {:>12} {:>12} {:<10} {:<10}",
                fit.kind().as_str(),
                fmt_param(p[0]),
                fmt_param(p[1]),
                p3,
                fit.range.to_string(),
                fit.line_style
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Result of one fit request.
pub fn format_fit_outcome(name: &str, outcome: &FitOutcome, hold_descriptor: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} fit for {name} over {}\n",
        outcome.fit.kind().display_name(),
        outcome.fit.range
    ));

    match &outcome.fit.params {
        ModelParams::ModBlackbody(p) => {
            out.push_str(&format!("- dust temperature: {:.4} K\n", p.dust_temperature));
            out.push_str(&format!("- dust mass       : {:.4e} M_sun\n", p.dust_mass));
            out.push_str(&format!("- beta            : {:.4}\n", p.beta));
            out.push_str(&format!("- held            : {hold_descriptor}\n"));
        }
        ModelParams::PowerLaw(p) => {
            out.push_str(&format!("- amplitude: {:.4e}\n", p.amplitude));
            out.push_str(&format!("- exponent : {:.4}\n", p.exponent));
        }
    }

    let reduced = if outcome.reduced_chi_square.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.4}", outcome.reduced_chi_square)
    };
    out.push_str(&format!(
        "chi2={:.4e} reduced={reduced} dof={} points={} free={} iterations={}\n",
        outcome.chi_square,
        outcome.degrees_of_freedom,
        outcome.points_used,
        outcome.free_parameters,
        outcome.iterations
    ));
    if !outcome.weighted {
        out.push_str("(fitted without uncertainties)\n");
    }
    if !outcome.converged {
        out.push_str("(iteration limit reached; parameters may not be optimal)\n");
    }
    out
}

fn fmt_param(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1.0e-3..1.0e5).contains(&a) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BlackbodyParams, FitRange, PointStyle, PointStyleTable, PowerLawParams, TargetRecord, Uncertainty,
    };

    fn fits() -> Vec<SavedFit> {
        vec![
            SavedFit {
                params: ModelParams::ModBlackbody(BlackbodyParams {
                    dust_temperature: 25.0,
                    dust_mass: 1.0e6,
                    beta: 1.8,
                }),
                range: FitRange::new(0, 5),
                line_style: "solid".to_string(),
            },
            SavedFit {
                params: ModelParams::PowerLaw(PowerLawParams {
                    amplitude: 2.5e-25,
                    exponent: 2.0,
                }),
                range: FitRange::new(5, 9),
                line_style: "dashed".to_string(),
            },
        ]
    }

    #[test]
    fn saved_fit_table_lists_each_fit() {
        let txt = format_saved_fits("M82", &fits());
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with("0   mod_blackbody"), "{txt}");
        assert!(lines[3].contains("25.0000"));
        assert!(lines[3].contains("1.0000e6"));
        assert!(lines[3].ends_with("[0, 5)     solid"), "{txt}");
        assert!(lines[4].contains("2.5000e-25"));
        assert!(lines[4].ends_with("dashed"));
    }

    #[test]
    fn empty_outputs_say_so() {
        assert_eq!(format_saved_fits("M82", &[]), "No saved fits for M82.\n");
        assert_eq!(format_target_list(&[]), "No targets in store.\n");
    }

    #[test]
    fn summary_lists_span_and_telescopes() {
        let record = TargetRecord {
            name: "M82".to_string(),
            frequencies: vec![3.0e11, 3.0e12],
            telescopes: vec!["ALMA".to_string(), "IRAS".to_string()],
            fluxes: vec![0.5, 20.0],
            uncertainty_upper: vec![Uncertainty::Value(0.05), Uncertainty::Limit],
            uncertainty_lower: vec![Uncertainty::Value(0.05), Uncertainty::Value(2.0)],
            redshift: 0.0007,
            distance: 3.5,
        };
        let styles = PointStyleTable::new(vec![PointStyle {
            telescope: "ALMA".to_string(),
            marker: "o".to_string(),
            color: "red".to_string(),
        }]);
        let target = Target::from_record(record, &styles).unwrap();

        let txt = format_target_summary(&target);
        assert!(txt.starts_with("=== M82 ===\n"), "{txt}");
        assert!(txt.contains("n=2"), "{txt}");
        assert!(txt.contains("wavelength=[99.9, 999.3] um"), "{txt}");
        assert!(txt.contains("Telescopes: ALMA, Other\n"), "{txt}");
    }

    #[test]
    fn target_list_is_numbered_from_zero() {
        let txt = format_target_list(&["M82".to_string(), "NGC 253".to_string()]);
        assert_eq!(txt, "   0  M82\n   1  NGC 253\n");
    }

    #[test]
    fn outcome_mentions_holds_and_nan_reduced_chi_square() {
        let outcome = FitOutcome {
            fit: fits().remove(0),
            chi_square: 1.5,
            reduced_chi_square: f64::NAN,
            degrees_of_freedom: 0,
            points_used: 3,
            free_parameters: 3,
            iterations: 12,
            weighted: false,
            weighting_fallback: Some("point 2 is a detection limit".to_string()),
            converged: true,
        };
        let txt = format_fit_outcome("M82", &outcome, "beta");
        assert!(txt.starts_with("Modified blackbody fit for M82 over [0, 5)\n"));
        assert!(txt.contains("- held            : beta\n"));
        assert!(txt.contains("reduced=n/a"));
        assert!(txt.contains("(fitted without uncertainties)"));
    }
}
