//! Directory-backed record store.
//!
//! Layout:
//!
//! ```text
//! <dir>/seds.csv            header, then one 7-row group per target
//! <dir>/fit_parameters.csv  target,kind,p1,p2,p3,range_start,range_end,line_style
//! <dir>/point_styles.csv    telescope,marker,color (last row = fallback)
//! ```
//!
//! A target group starts at any row whose first cell is non-empty; blank rows
//! between groups are ignored. Saved fits are rewritten through a temporary
//! file and renamed into place so a failed write never truncates the table.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{FitKind, FitRange, ModelParams, PointStyle, PointStyleTable, SavedFit, TargetRecord};
use crate::error::SedError;
use crate::parse::RowGroup;
use crate::store::{RecordStore, TargetKey, group_name};

pub const SEDS_FILE: &str = "seds.csv";
pub const FITS_FILE: &str = "fit_parameters.csv";
pub const STYLES_FILE: &str = "point_styles.csv";

const SEDS_HEADER: [&str; 3] = ["Target", "Quantity", "Values"];

/// One row of `fit_parameters.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FitRow {
    target: String,
    kind: FitKind,
    p1: f64,
    p2: f64,
    p3: Option<f64>,
    range_start: usize,
    range_end: usize,
    line_style: String,
}

impl FitRow {
    fn new(target: &str, fit: &SavedFit) -> Self {
        let p = fit.params.positional();
        Self {
            target: target.to_string(),
            kind: fit.kind(),
            p1: p[0],
            p2: p[1],
            p3: p.get(2).copied(),
            range_start: fit.range.start,
            range_end: fit.range.end,
            line_style: fit.line_style.clone(),
        }
    }

    fn to_saved_fit(&self) -> Result<SavedFit, SedError> {
        let mut values = vec![self.p1, self.p2];
        values.extend(self.p3);
        let params = ModelParams::from_positional(self.kind, &values).ok_or_else(|| {
            SedError::Persistence(format!(
                "{FITS_FILE}: {} row for '{}' is missing parameters",
                self.kind, self.target
            ))
        })?;
        Ok(SavedFit {
            params,
            range: FitRange::new(self.range_start, self.range_end),
            line_style: self.line_style.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Open an existing data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SedError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(SedError::Config(format!(
                "data directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Create the directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SedError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| SedError::persistence(&format!("failed to create '{}'", dir.display()), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Replace `seds.csv` with the given records.
    pub fn write_records(&self, records: &[TargetRecord]) -> Result<(), SedError> {
        let path = self.path(SEDS_FILE);
        let ctx = format!("failed to write '{}'", path.display());
        write_atomically(&path, |tmp| {
            let mut w = csv::WriterBuilder::new().flexible(true).from_path(tmp)?;
            w.write_record(SEDS_HEADER)?;
            for rec in records {
                for row in rec.to_row_group().rows {
                    w.write_record(&row)?;
                }
            }
            w.flush()?;
            Ok(())
        })
        .map_err(|e| SedError::persistence(&ctx, e))?;
        log::debug!("wrote {} targets to {}", records.len(), path.display());
        Ok(())
    }

    /// Replace `point_styles.csv`.
    pub fn write_point_styles(&self, table: &PointStyleTable) -> Result<(), SedError> {
        let path = self.path(STYLES_FILE);
        let ctx = format!("failed to write '{}'", path.display());
        write_atomically(&path, |tmp| {
            let mut w = csv::Writer::from_path(tmp)?;
            if table.is_empty() {
                w.write_record(["telescope", "marker", "color"])?;
            }
            for entry in &table.entries {
                w.serialize(entry)?;
            }
            w.flush()?;
            Ok(())
        })
        .map_err(|e| SedError::persistence(&ctx, e))
    }

    fn read_groups(&self) -> Result<Vec<RowGroup>, SedError> {
        let path = self.path(SEDS_FILE);
        let ctx = format!("failed to read '{}'", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| SedError::persistence(&ctx, e))?;

        let mut groups: Vec<RowGroup> = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| SedError::persistence(&ctx, e))?;
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            if !cells[0].is_empty() {
                groups.push(RowGroup::new(vec![cells]));
                continue;
            }
            match groups.last_mut() {
                Some(group) => group.rows.push(cells),
                None => {
                    return Err(SedError::malformed_record(
                        None,
                        format!("{SEDS_FILE} line {} has data before any target name", i + 2),
                    ));
                }
            }
        }

        log::debug!("read {} row groups from {}", groups.len(), path.display());
        Ok(groups)
    }

    fn read_fit_rows(&self) -> Result<Vec<FitRow>, SedError> {
        let path = self.path(FITS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let ctx = format!("failed to read '{}'", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| SedError::persistence(&ctx, e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<FitRow>, _>>()
            .map_err(|e| SedError::persistence(&ctx, e))
    }

    fn write_fit_rows(&self, rows: &[FitRow]) -> Result<(), SedError> {
        let path = self.path(FITS_FILE);
        let ctx = format!("failed to write '{}'", path.display());
        write_atomically(&path, |tmp| {
            let mut w = csv::Writer::from_path(tmp)?;
            if rows.is_empty() {
                w.write_record([
                    "target",
                    "kind",
                    "p1",
                    "p2",
                    "p3",
                    "range_start",
                    "range_end",
                    "line_style",
                ])?;
            }
            for row in rows {
                w.serialize(row)?;
            }
            w.flush()?;
            Ok(())
        })
        .map_err(|e| SedError::persistence(&ctx, e))?;
        log::debug!("wrote {} fit rows to {}", rows.len(), path.display());
        Ok(())
    }
}

/// Write through `<path>.tmp`, then rename over `path`.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&Path) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl RecordStore for CsvStore {
    fn list_targets(&self) -> Result<Vec<String>, SedError> {
        Ok(self
            .read_groups()?
            .iter()
            .filter_map(|g| group_name(g).map(str::to_string))
            .collect())
    }

    fn read_target(&self, key: TargetKey<'_>) -> Result<RowGroup, SedError> {
        let mut groups = self.read_groups()?;
        let idx = match key {
            TargetKey::Index(i) => (i < groups.len()).then_some(i),
            TargetKey::Name(n) => groups.iter().position(|g| group_name(g) == Some(n)),
        };
        match idx {
            Some(i) => Ok(groups.swap_remove(i)),
            None => Err(SedError::UnknownTarget(key.to_string())),
        }
    }

    fn read_saved_fits(&self, target: &str) -> Result<Vec<SavedFit>, SedError> {
        self.read_fit_rows()?
            .iter()
            .filter(|r| r.target == target)
            .map(FitRow::to_saved_fit)
            .collect()
    }

    fn write_saved_fit(&mut self, target: &str, fit: &SavedFit) -> Result<(), SedError> {
        let mut rows = self.read_fit_rows()?;
        let at = rows
            .iter()
            .rposition(|r| r.target == target)
            .map_or(rows.len(), |i| i + 1);
        rows.insert(at, FitRow::new(target, fit));
        self.write_fit_rows(&rows)
    }

    fn clear_saved_fits(&mut self, target: &str, kind: FitKind) -> Result<usize, SedError> {
        let rows = self.read_fit_rows()?;
        let before = rows.len();
        let kept: Vec<FitRow> = rows
            .into_iter()
            .filter(|r| !(r.target == target && r.kind == kind))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.write_fit_rows(&kept)?;
        }
        Ok(removed)
    }

    fn read_point_styles(&self) -> Result<PointStyleTable, SedError> {
        let path = self.path(STYLES_FILE);
        if !path.exists() {
            log::debug!("{} not found; using an empty style table", path.display());
            return Ok(PointStyleTable::default());
        }
        let ctx = format!("failed to read '{}'", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| SedError::persistence(&ctx, e))?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<PointStyle>, _>>()
            .map_err(|e| SedError::persistence(&ctx, e))?;
        Ok(PointStyleTable::new(entries))
    }
}
