//! Chart model and renderers.
//!
//! A [`SedChart`] is a backend-neutral description of one SED plot. Renderers
//! turn it into output:
//!
//! - log-log terminal chart (`ascii`)
//! - pretty-printed JSON (`json`)

pub mod ascii;
pub mod json;

pub use ascii::*;
pub use json::*;

use serde::{Deserialize, Serialize};

use crate::error::SedError;
use crate::style::LegendEntry;

/// How a point's uncertainty is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "size", rename_all = "snake_case")]
pub enum ErrorBar {
    None,
    /// `flux ± size`.
    Symmetric(f64),
    /// The point is an upper limit; arrow points down.
    UpperLimit(f64),
    /// The point is a lower limit; arrow points up.
    LowerLimit(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub frequency: f64,
    pub flux: f64,
    pub error: ErrorBar,
    pub category: String,
    pub marker: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartCurve {
    pub label: String,
    pub line_style: String,
    pub frequencies: Vec<f64>,
    pub fluxes: Vec<f64>,
}

/// Shaded vertical band marking a reference emission feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBand {
    pub center: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SedChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_bounds: (f64, f64),
    pub y_bounds: (f64, f64),
    pub points: Vec<ChartPoint>,
    pub curves: Vec<ChartCurve>,
    pub bands: Vec<ReferenceBand>,
    pub legend: Vec<LegendEntry>,
}

pub trait Renderer {
    fn render(&mut self, chart: &SedChart) -> Result<(), SedError>;
}
