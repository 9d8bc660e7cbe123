//! Command-line parsing for the `sed` binary.
//!
//! Argument parsing stays here; dispatch lives in `app`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DEFAULT_LINE_STYLE, FitKind, FitRange, HeldParams};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sed", version, about = "Galaxy SED survey: inspect targets, fit dust and power-law models")]
pub struct Cli {
    /// Directory holding seds.csv, fit_parameters.csv and point_styles.csv.
    ///
    /// Overrides SED_DATA_DIR.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the targets in the store with their indices.
    Targets,
    /// Print a target summary and plot its SED with saved fits overlaid.
    Show(ShowArgs),
    /// Fit a model over a range of a target's points and save the result.
    Fit(FitArgs),
    /// Delete every saved fit of one kind for a target.
    Clear(ClearArgs),
    /// List a target's saved fits.
    Fits(TargetArg),
    /// Write a seeded synthetic survey into a directory.
    Sample(SampleArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct TargetArg {
    /// Target name or zero-based index.
    pub target: String,
}

#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    /// Target name or zero-based index.
    pub target: String,

    /// Plot width (columns). Overrides SED_PLOT_WIDTH.
    #[arg(long)]
    pub width: Option<usize>,

    /// Plot height (rows). Overrides SED_PLOT_HEIGHT.
    #[arg(long)]
    pub height: Option<usize>,

    /// Also write the chart as JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Target name or zero-based index.
    pub target: String,

    /// Model to fit.
    #[arg(long, value_enum)]
    pub kind: FitKind,

    /// Half-open point range, `START,END`.
    #[arg(long, value_parser = parse_range, value_name = "START,END")]
    pub range: FitRange,

    /// Point indices to drop from the range.
    #[arg(long, value_delimiter = ',', value_name = "I,J,...")]
    pub exclude: Vec<usize>,

    /// Held blackbody parameters `T,M,B`; 0 leaves a slot free.
    #[arg(long, value_parser = parse_hold, value_name = "T,M,B")]
    pub hold: Option<HeldParams>,

    /// Line style stored with the fit.
    #[arg(long, default_value = DEFAULT_LINE_STYLE)]
    pub line_style: String,

    /// Fit the residual after subtracting the target's saved fits.
    #[arg(long)]
    pub subtract: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ClearArgs {
    /// Target name or zero-based index.
    pub target: String,

    /// Which fits to delete.
    #[arg(long, value_enum)]
    pub kind: FitKind,
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output directory (created if missing).
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Number of synthetic targets.
    #[arg(long, default_value_t = 5)]
    pub targets: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Photometry points per target.
    #[arg(long, default_value_t = 14)]
    pub points: usize,
}

fn parse_range(s: &str) -> Result<FitRange, String> {
    let (start, end) = s
        .split_once(',')
        .ok_or_else(|| format!("expected START,END, got '{s}'"))?;
    let index = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("bad range bound '{v}': {e}"))
    };
    Ok(FitRange::new(index(start)?, index(end)?))
}

fn parse_hold(s: &str) -> Result<HeldParams, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("bad hold value '{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [t, m, b] => Ok(HeldParams::from_hold_vector([*t, *m, *b])),
        _ => Err(format!("expected three values T,M,B, got {}", values.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_command_parses_every_option() {
        let cli = Cli::try_parse_from([
            "sed",
            "--data-dir",
            "/tmp/seds",
            "fit",
            "M82",
            "--kind",
            "mod-blackbody",
            "--range",
            "2,9",
            "--exclude",
            "4,6",
            "--hold",
            "0,0,1.8",
            "--line-style",
            "dashed",
            "--subtract",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/seds")));
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.target, "M82");
        assert_eq!(args.kind, FitKind::ModBlackbody);
        assert_eq!(args.range, FitRange::new(2, 9));
        assert_eq!(args.exclude, vec![4, 6]);
        assert_eq!(args.hold.unwrap().beta, Some(1.8));
        assert_eq!(args.hold.unwrap().dust_temp, None);
        assert_eq!(args.line_style, "dashed");
        assert!(args.subtract);
    }

    #[test]
    fn fit_defaults() {
        let cli = Cli::try_parse_from(["sed", "fit", "0", "--kind", "power-law", "--range", "0,5"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.exclude.is_empty());
        assert!(args.hold.is_none());
        assert_eq!(args.line_style, DEFAULT_LINE_STYLE);
        assert!(!args.subtract);
    }

    #[test]
    fn global_data_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["sed", "targets", "--data-dir", "d"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("d")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Cli::try_parse_from(["sed", "fit", "0", "--kind", "power-law", "--range", "5"]).is_err());
        assert!(Cli::try_parse_from(["sed", "fit", "0", "--kind", "power-law", "--range", "a,b"]).is_err());
        assert!(Cli::try_parse_from(["sed", "fit", "0", "--kind", "gauss", "--range", "0,5"]).is_err());
        assert!(
            Cli::try_parse_from(["sed", "fit", "0", "--kind", "mod-blackbody", "--range", "0,5", "--hold", "1,2"])
                .is_err()
        );
    }

    #[test]
    fn sample_defaults() {
        let cli = Cli::try_parse_from(["sed", "sample", "--out", "out"]).unwrap();
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!((args.targets, args.seed, args.points), (5, 42, 14));
    }
}
