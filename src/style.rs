//! Telescope → display category classification.
//!
//! Each telescope label is matched against the point-style table in table
//! order. Labels with no entry fall into the shared `Other` category and borrow
//! the visuals of the table's last entry.

use serde::{Deserialize, Serialize};

use crate::domain::{PointStyle, PointStyleTable};

/// Category assigned to telescopes missing from the table.
pub const OTHER_CATEGORY: &str = "Other";

const DEFAULT_MARKER: &str = "o";
const DEFAULT_COLOR: &str = "black";

/// Parallel per-point display attributes, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub categories: Vec<String>,
    pub markers: Vec<String>,
    pub colors: Vec<String>,
}

/// One legend row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub category: String,
    pub marker: String,
    pub color: String,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Distinct categories in first-seen order.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut out: Vec<LegendEntry> = Vec::new();
        for ((category, marker), color) in self.categories.iter().zip(&self.markers).zip(&self.colors) {
            if out.iter().any(|e| &e.category == category) {
                continue;
            }
            out.push(LegendEntry {
                category: category.clone(),
                marker: marker.clone(),
                color: color.clone(),
            });
        }
        out
    }
}

/// Classify telescope labels against the style table.
pub fn classify(telescopes: &[String], table: &PointStyleTable) -> Classification {
    let fallback = table.fallback();
    let mut out = Classification {
        categories: Vec::with_capacity(telescopes.len()),
        markers: Vec::with_capacity(telescopes.len()),
        colors: Vec::with_capacity(telescopes.len()),
    };

    for label in telescopes {
        let (category, style) = match table.entries.iter().find(|e| e.telescope == *label) {
            Some(style) => (style.telescope.as_str(), Some(style)),
            None => (OTHER_CATEGORY, fallback),
        };
        let (marker, color) = visuals(style);
        out.categories.push(category.to_string());
        out.markers.push(marker);
        out.colors.push(color);
    }

    out
}

fn visuals(style: Option<&PointStyle>) -> (String, String) {
    match style {
        Some(s) => (s.marker.clone(), s.color.clone()),
        None => (DEFAULT_MARKER.to_string(), DEFAULT_COLOR.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PointStyleTable {
        let entry = |t: &str, m: &str, c: &str| PointStyle {
            telescope: t.to_string(),
            marker: m.to_string(),
            color: c.to_string(),
        };
        PointStyleTable::new(vec![
            entry("ALMA", "o", "red"),
            entry("Herschel", "s", "blue"),
            entry("Other", "x", "gray"),
        ])
    }

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_and_unknown_labels_keep_input_order() {
        let c = classify(&labels(&["Herschel", "VLA", "ALMA"]), &table());
        assert_eq!(c.categories, vec!["Herschel", "Other", "ALMA"]);
        assert_eq!(c.markers, vec!["s", "x", "o"]);
        assert_eq!(c.colors, vec!["blue", "gray", "red"]);
    }

    #[test]
    fn unknown_label_takes_fallback_visuals() {
        let c = classify(&labels(&["Spitzer"]), &table());
        assert_eq!(c.categories, vec![OTHER_CATEGORY]);
        assert_eq!(c.markers, vec!["x"]);
        assert_eq!(c.colors, vec!["gray"]);
    }

    #[test]
    fn empty_table_uses_builtin_defaults() {
        let c = classify(&labels(&["ALMA"]), &PointStyleTable::default());
        assert_eq!(c.categories, vec![OTHER_CATEGORY]);
        assert_eq!(c.markers, vec![DEFAULT_MARKER]);
        assert_eq!(c.colors, vec![DEFAULT_COLOR]);
    }

    #[test]
    fn legend_is_first_seen_and_distinct() {
        let c = classify(&labels(&["ALMA", "VLA", "ALMA", "Herschel", "WISE"]), &table());
        let legend: Vec<String> = c.legend().into_iter().map(|e| e.category).collect();
        assert_eq!(legend, vec!["ALMA", "Other", "Herschel"]);
    }
}
