//! In-memory record store.

use crate::domain::{FitKind, PointStyleTable, SavedFit, TargetRecord};
use crate::error::SedError;
use crate::parse::RowGroup;
use crate::store::{RecordStore, TargetKey, group_name};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    groups: Vec<RowGroup>,
    /// `(target, fit)` pairs in insertion order.
    fits: Vec<(String, SavedFit)>,
    styles: PointStyleTable,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new(groups: Vec<RowGroup>, styles: PointStyleTable) -> Self {
        Self {
            groups,
            fits: Vec::new(),
            styles,
            fail_writes: false,
        }
    }

    pub fn from_records(records: &[TargetRecord], styles: PointStyleTable) -> Self {
        Self::new(records.iter().map(TargetRecord::to_row_group).collect(), styles)
    }

    /// Make every subsequent write fail with a persistence error.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check_writable(&self) -> Result<(), SedError> {
        if self.fail_writes {
            Err(SedError::Persistence("store is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for MemoryStore {
    fn list_targets(&self) -> Result<Vec<String>, SedError> {
        Ok(self
            .groups
            .iter()
            .filter_map(|g| group_name(g).map(str::to_string))
            .collect())
    }

    fn read_target(&self, key: TargetKey<'_>) -> Result<RowGroup, SedError> {
        let group = match key {
            TargetKey::Index(i) => self.groups.get(i),
            TargetKey::Name(n) => self.groups.iter().find(|g| group_name(g) == Some(n)),
        };
        group.cloned().ok_or_else(|| SedError::UnknownTarget(key.to_string()))
    }

    fn read_saved_fits(&self, target: &str) -> Result<Vec<SavedFit>, SedError> {
        Ok(self
            .fits
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, f)| f.clone())
            .collect())
    }

    fn write_saved_fit(&mut self, target: &str, fit: &SavedFit) -> Result<(), SedError> {
        self.check_writable()?;
        let at = self
            .fits
            .iter()
            .rposition(|(t, _)| t == target)
            .map_or(self.fits.len(), |i| i + 1);
        self.fits.insert(at, (target.to_string(), fit.clone()));
        Ok(())
    }

    fn clear_saved_fits(&mut self, target: &str, kind: FitKind) -> Result<usize, SedError> {
        let before = self.fits.len();
        let matches = |(t, f): &(String, SavedFit)| t == target && f.kind() == kind;
        if self.fits.iter().any(matches) {
            self.check_writable()?;
        }
        self.fits.retain(|entry| !matches(entry));
        Ok(before - self.fits.len())
    }

    fn read_point_styles(&self) -> Result<PointStyleTable, SedError> {
        Ok(self.styles.clone())
    }
}
