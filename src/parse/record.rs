//! Row-group parsing.
//!
//! One target occupies a fixed block of delimited rows:
//!
//! ```text
//! row 0: <name>, Frequency (Hz), f1, f2, ...
//! row 1:       , Telescope,      t1, t2, ...
//! row 2:       , Flux (Jy),      s1, s2, ...
//! row 3:       , Upper unc.,     u1, u2, ...
//! row 4:       , Lower unc.,     l1, l2, ...
//! row 5:       , Redshift,       z
//! row 6:       , Distance (Mpc), d
//! ```
//!
//! The first two columns are labels. Trailing empty cells are padding from the
//! widest row in the sheet and are dropped; an empty cell inside the payload is
//! an error.

use serde::{Deserialize, Serialize};

use crate::domain::{TargetRecord, Uncertainty};
use crate::error::SedError;
use crate::parse::numeric::parse_numeric;

/// Rows per target block (excluding any separator row).
pub const LINES_PER_DATA_SET: usize = 7;

/// Column where the data payload starts.
pub const DATA_COLUMN_OFFSET: usize = 2;

const ROW_LABELS: [&str; LINES_PER_DATA_SET] = [
    "Frequency (Hz)",
    "Telescope",
    "Flux Density (Jy)",
    "Upper Uncertainty (Jy)",
    "Lower Uncertainty (Jy)",
    "Redshift",
    "Distance (Mpc)",
];

/// Raw string cells for one target, as read from a record store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowGroup {
    pub rows: Vec<Vec<String>>,
}

impl RowGroup {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Convenience for tests and fixtures: split each line on commas.
    pub fn from_lines(lines: &[&str]) -> Self {
        Self {
            rows: lines
                .iter()
                .map(|l| l.split(',').map(str::to_string).collect())
                .collect(),
        }
    }
}

/// Parse one target's row group into a typed record.
pub fn parse_row_group(group: &RowGroup) -> Result<TargetRecord, SedError> {
    if group.rows.len() != LINES_PER_DATA_SET {
        return Err(SedError::malformed_record(
            None,
            format!(
                "expected {LINES_PER_DATA_SET} rows, found {}",
                group.rows.len()
            ),
        ));
    }

    let name = group.rows[0]
        .first()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SedError::malformed_record(None, "missing target name"))?
        .to_string();
    let ctx = Ctx { name: &name };

    let freq_cells = ctx.payload(group, 0)?;
    let tele_cells = ctx.payload(group, 1)?;
    let flux_cells = ctx.payload(group, 2)?;
    let upper_cells = ctx.payload(group, 3)?;
    let lower_cells = ctx.payload(group, 4)?;

    let n = freq_cells.len();
    if n == 0 {
        return Err(ctx.error("no frequency values"));
    }
    for (row, cells) in [(1, &tele_cells), (2, &flux_cells), (3, &upper_cells), (4, &lower_cells)] {
        if cells.len() != n {
            return Err(ctx.error(format!(
                "row {} ({}) has {} values, expected {n}",
                row + 1,
                ROW_LABELS[row],
                cells.len()
            )));
        }
    }

    let frequencies = freq_cells
        .iter()
        .map(|c| {
            let v = ctx.number(c, 0)?;
            if v > 0.0 {
                Ok(v)
            } else {
                Err(ctx.error(format!("frequency '{c}' must be positive")))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let telescopes = tele_cells.iter().map(|c| c.trim().to_string()).collect();
    let fluxes = flux_cells
        .iter()
        .map(|c| ctx.number(c, 2))
        .collect::<Result<Vec<_>, _>>()?;
    let uncertainty_upper = upper_cells
        .iter()
        .map(|c| ctx.uncertainty(c, 3))
        .collect::<Result<Vec<_>, _>>()?;
    let uncertainty_lower = lower_cells
        .iter()
        .map(|c| ctx.uncertainty(c, 4))
        .collect::<Result<Vec<_>, _>>()?;

    let redshift = ctx.scalar(group, 5)?;
    if redshift < 0.0 {
        return Err(ctx.error(format!("redshift {redshift} is negative")));
    }
    let distance = ctx.scalar(group, 6)?;
    if distance <= 0.0 {
        return Err(ctx.error(format!("distance {distance} must be positive")));
    }

    Ok(TargetRecord {
        name,
        frequencies,
        telescopes,
        fluxes,
        uncertainty_upper,
        uncertainty_lower,
        redshift,
        distance,
    })
}

/// Decode an uncertainty cell.
///
/// `None`/`none` mean "no uncertainty given" and become `0.0`; `Limit`/`limit`
/// are kept as a sentinel.
pub fn parse_uncertainty(cell: &str) -> Result<Uncertainty, SedError> {
    let s = cell.trim();
    match s {
        "None" | "none" => Ok(Uncertainty::Value(0.0)),
        "Limit" | "limit" => Ok(Uncertainty::Limit),
        _ => parse_numeric(s).map(Uncertainty::Value),
    }
}

impl TargetRecord {
    /// Re-derive the raw row group, the inverse of [`parse_row_group`].
    pub fn to_row_group(&self) -> RowGroup {
        let row = |first: &str, label: &str, cells: Vec<String>| {
            let mut r = vec![first.to_string(), label.to_string()];
            r.extend(cells);
            r
        };
        let nums = |v: &[f64]| v.iter().map(|x| format_number(*x)).collect::<Vec<_>>();
        let uncs = |v: &[Uncertainty]| {
            v.iter()
                .map(|u| match u {
                    Uncertainty::Value(x) => format_number(*x),
                    Uncertainty::Limit => "Limit".to_string(),
                })
                .collect::<Vec<_>>()
        };

        RowGroup::new(vec![
            row(&self.name, ROW_LABELS[0], nums(&self.frequencies)),
            row("", ROW_LABELS[1], self.telescopes.clone()),
            row("", ROW_LABELS[2], nums(&self.fluxes)),
            row("", ROW_LABELS[3], uncs(&self.uncertainty_upper)),
            row("", ROW_LABELS[4], uncs(&self.uncertainty_lower)),
            row("", ROW_LABELS[5], vec![format_number(self.redshift)]),
            row("", ROW_LABELS[6], vec![format_number(self.distance)]),
        ])
    }
}

/// Shortest representation that parses back to the same value; large and tiny
/// magnitudes use the sheet's `E` notation.
fn format_number(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1.0e-4..1.0e9).contains(&a) {
        format!("{v:E}")
    } else {
        format!("{v}")
    }
}

struct Ctx<'a> {
    name: &'a str,
}

impl Ctx<'_> {
    fn error(&self, reason: impl Into<String>) -> SedError {
        SedError::malformed_record(Some(self.name), reason)
    }

    fn payload<'g>(&self, group: &'g RowGroup, row: usize) -> Result<Vec<&'g str>, SedError> {
        let cells: Vec<&str> = group.rows[row]
            .iter()
            .skip(DATA_COLUMN_OFFSET)
            .map(|s| s.trim())
            .collect();
        let used = cells.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
        let cells = &cells[..used];
        if let Some(pos) = cells.iter().position(|c| c.is_empty()) {
            return Err(self.error(format!(
                "row {} ({}) has an empty cell at column {}",
                row + 1,
                ROW_LABELS[row],
                pos + DATA_COLUMN_OFFSET
            )));
        }
        Ok(cells.to_vec())
    }

    fn number(&self, cell: &str, row: usize) -> Result<f64, SedError> {
        parse_numeric(cell).map_err(|e| self.rewrap(e, row))
    }

    fn uncertainty(&self, cell: &str, row: usize) -> Result<Uncertainty, SedError> {
        parse_uncertainty(cell).map_err(|e| self.rewrap(e, row))
    }

    fn scalar(&self, group: &RowGroup, row: usize) -> Result<f64, SedError> {
        let cell = group.rows[row]
            .get(DATA_COLUMN_OFFSET)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| self.error(format!("row {} ({}) is empty", row + 1, ROW_LABELS[row])))?;
        self.number(cell, row)
    }

    fn rewrap(&self, err: SedError, row: usize) -> SedError {
        let detail = match err {
            SedError::MalformedRecord { reason, .. } => reason,
            other => other.to_string(),
        };
        self.error(format!("row {} ({}): {detail}", row + 1, ROW_LABELS[row]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lines() -> Vec<&'static str> {
        vec![
            "NGC 1332,Frequency (Hz),2.3E+11,3.45E+11,6.00E+12,,",
            ",Telescope,ALMA,ALMA,IRAS,,",
            ",Flux Density (Jy),0.0021,0.0054,1.2E+0,,",
            ",Upper Uncertainty (Jy),0.0002,None,Limit,,",
            ",Lower Uncertainty (Jy),2.0E-4,none,0.1,,",
            ",Redshift,0.005,,,,",
            ",Distance (Mpc),22.9,,,,",
        ]
    }

    #[test]
    fn parses_full_group() {
        let rec = parse_row_group(&RowGroup::from_lines(&sample_lines())).unwrap();
        assert_eq!(rec.name, "NGC 1332");
        assert_eq!(rec.frequencies, vec![2.3e11, 3.45e11, 6.0e12]);
        assert_eq!(rec.telescopes, vec!["ALMA", "ALMA", "IRAS"]);
        assert_eq!(rec.fluxes, vec![0.0021, 0.0054, 1.2]);
        assert_eq!(
            rec.uncertainty_upper,
            vec![Uncertainty::Value(0.0002), Uncertainty::Value(0.0), Uncertainty::Limit]
        );
        assert_eq!(
            rec.uncertainty_lower,
            vec![Uncertainty::Value(2.0e-4), Uncertainty::Value(0.0), Uncertainty::Value(0.1)]
        );
        assert_eq!(rec.redshift, 0.005);
        assert_eq!(rec.distance, 22.9);
    }

    #[test]
    fn mismatched_row_lengths_are_malformed() {
        let mut lines = sample_lines();
        lines[2] = ",Flux Density (Jy),0.0021,0.0054,,,";
        let err = parse_row_group(&RowGroup::from_lines(&lines)).unwrap_err();
        match err {
            SedError::MalformedRecord { target, reason } => {
                assert_eq!(target.as_deref(), Some("NGC 1332"));
                assert!(reason.contains("row 3"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn gap_inside_payload_is_malformed() {
        let mut lines = sample_lines();
        lines[1] = ",Telescope,ALMA,,IRAS,,";
        assert!(matches!(
            parse_row_group(&RowGroup::from_lines(&lines)),
            Err(SedError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn bad_scientific_literal_is_reported_with_row() {
        let mut lines = sample_lines();
        lines[0] = "NGC 1332,Frequency (Hz),2.3E+11,3.45E+1.1,6.00E+12,,";
        let err = parse_row_group(&RowGroup::from_lines(&lines)).unwrap_err();
        assert!(err.to_string().contains("row 1"), "{err}");
    }

    #[test]
    fn missing_distance_is_malformed() {
        let mut lines = sample_lines();
        lines[6] = ",Distance (Mpc),,,,,";
        assert!(parse_row_group(&RowGroup::from_lines(&lines)).is_err());
    }

    #[test]
    fn wrong_row_count_is_malformed() {
        let lines = &sample_lines()[..6];
        assert!(parse_row_group(&RowGroup::from_lines(lines)).is_err());
    }

    #[test]
    fn row_group_round_trips_through_parser() {
        let rec = parse_row_group(&RowGroup::from_lines(&sample_lines())).unwrap();
        let again = parse_row_group(&rec.to_row_group()).unwrap();
        assert_eq!(again, rec);
    }

    #[test]
    fn uncertainty_sentinels() {
        assert_eq!(parse_uncertainty("None").unwrap(), Uncertainty::Value(0.0));
        assert_eq!(parse_uncertainty("limit").unwrap(), Uncertainty::Limit);
        assert_eq!(parse_uncertainty("1.5E-3").unwrap(), Uncertainty::Value(0.0015));
        assert!(parse_uncertainty("LIMIT?").is_err());
    }
}
