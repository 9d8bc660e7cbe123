//! JSON chart export.
//!
//! The JSON form is the portable representation of a chart: points with their
//! visuals and error bars, pre-sampled curves, reference bands and bounds.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SedError;
use crate::render::{Renderer, SedChart};

/// Writes charts as pretty-printed JSON.
pub struct JsonChartRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonChartRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonChartRenderer<File> {
    /// Create (or truncate) `path` and render into it.
    pub fn create(path: &Path) -> Result<Self, SedError> {
        let file = File::create(path)
            .map_err(|e| SedError::Render(format!("failed to create chart JSON '{}': {e}", path.display())))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> Renderer for JsonChartRenderer<W> {
    fn render(&mut self, chart: &SedChart) -> Result<(), SedError> {
        serde_json::to_writer_pretty(&mut self.out, chart)
            .map_err(|e| SedError::Render(format!("failed to write chart JSON: {e}")))?;
        writeln!(self.out).map_err(|e| SedError::Render(format!("failed to write chart JSON: {e}")))
    }
}
