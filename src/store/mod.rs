//! Record stores.
//!
//! A store serves raw target row groups, keeps saved fits per target and holds
//! the telescope point-style table.
//!
//! - in-memory store for tests and embedding (`memory`)
//! - directory of CSV files (`csv_store`)

pub mod csv_store;
pub mod memory;

pub use csv_store::*;
pub use memory::*;

use std::fmt;

use crate::domain::{FitKind, PointStyleTable, SavedFit};
use crate::error::SedError;
use crate::parse::RowGroup;

/// How a caller names a target: by position in the store or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKey<'a> {
    Index(usize),
    Name(&'a str),
}

impl<'a> TargetKey<'a> {
    /// All-digit input is an index, anything else a name.
    pub fn parse(s: &'a str) -> Self {
        let s = s.trim();
        match s.parse::<usize>() {
            Ok(i) => TargetKey::Index(i),
            Err(_) => TargetKey::Name(s),
        }
    }
}

impl fmt::Display for TargetKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKey::Index(i) => write!(f, "#{i}"),
            TargetKey::Name(n) => f.write_str(n),
        }
    }
}

pub trait RecordStore {
    /// Target names in store order.
    fn list_targets(&self) -> Result<Vec<String>, SedError>;

    fn read_target(&self, key: TargetKey<'_>) -> Result<RowGroup, SedError>;

    /// Saved fits of one target in insertion order; empty when there are none.
    fn read_saved_fits(&self, target: &str) -> Result<Vec<SavedFit>, SedError>;

    /// Append a fit after the target's last saved fit.
    fn write_saved_fit(&mut self, target: &str, fit: &SavedFit) -> Result<(), SedError>;

    /// Remove every saved fit of `kind`; returns how many were removed.
    fn clear_saved_fits(&mut self, target: &str, kind: FitKind) -> Result<usize, SedError>;

    fn read_point_styles(&self) -> Result<PointStyleTable, SedError>;

    /// Resolve a key to the target's name.
    fn resolve_name(&self, key: TargetKey<'_>) -> Result<String, SedError> {
        let names = self.list_targets()?;
        match key {
            TargetKey::Index(i) => names
                .get(i)
                .cloned()
                .ok_or_else(|| SedError::UnknownTarget(format!("index {i} (store has {} targets)", names.len()))),
            TargetKey::Name(n) => names
                .into_iter()
                .find(|t| t == n)
                .ok_or_else(|| SedError::UnknownTarget(n.to_string())),
        }
    }
}

/// Name cell of a row group (row 0, column 0), if present.
pub fn group_name(group: &RowGroup) -> Option<&str> {
    group
        .rows
        .first()
        .and_then(|r| r.first())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_are_indices() {
        assert_eq!(TargetKey::parse("3"), TargetKey::Index(3));
        assert_eq!(TargetKey::parse(" NGC 1332 "), TargetKey::Name("NGC 1332"));
        assert_eq!(TargetKey::parse("-1"), TargetKey::Name("-1"));
    }

    #[test]
    fn group_name_reads_first_cell() {
        let g = RowGroup::from_lines(&["M82 ,Frequency (Hz),1.0E+11"]);
        assert_eq!(group_name(&g), Some("M82"));
        assert_eq!(group_name(&RowGroup::default()), None);
    }
}
