//! Log-log terminal plotting.
//!
//! Fixed-size character grid, deterministic output. Drawing order (later
//! layers only fill blank cells, except points which always win):
//!
//! - reference bands: `|`
//! - curves: `-` solid, `:` dashed or dash-dot, `.` dotted, `~` the summed curve
//! - error bars `|` and limit arrows `v` / `^`
//! - points, drawn with the first character of their marker

use std::io::Write;

use crate::error::SedError;
use crate::render::{ChartCurve, ErrorBar, Renderer, SedChart};

/// Label of the summed curve; drawn with its own glyph.
pub const SUM_CURVE_LABEL: &str = "sum of fits";

pub const DEFAULT_WIDTH: usize = 72;
pub const DEFAULT_HEIGHT: usize = 20;

/// Writes charts as text to any `Write` sink.
pub struct AsciiRenderer<W: Write> {
    out: W,
    width: usize,
    height: usize,
}

impl<W: Write> AsciiRenderer<W> {
    pub fn new(out: W, width: usize, height: usize) -> Self {
        Self {
            out,
            width: width.max(10),
            height: height.max(5),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for AsciiRenderer<W> {
    fn render(&mut self, chart: &SedChart) -> Result<(), SedError> {
        let text = render_ascii_chart(chart, self.width, self.height)?;
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| SedError::Render(format!("failed to write chart: {e}")))
    }
}

/// Render a chart to a string.
pub fn render_ascii_chart(chart: &SedChart, width: usize, height: usize) -> Result<String, SedError> {
    let width = width.max(10);
    let height = height.max(5);
    let axes = LogAxes::new(chart.x_bounds, chart.y_bounds, width, height)?;

    let mut grid = vec![vec![' '; width]; height];

    for band in &chart.bands {
        let (Some(x0), Some(x1)) = (axes.col(band.lower), axes.col(band.upper)) else {
            continue;
        };
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        for row in grid.iter_mut() {
            for cell in &mut row[x0..=x1] {
                *cell = '|';
            }
        }
    }

    for curve in &chart.curves {
        draw_curve(&mut grid, &axes, curve, curve_glyph(curve));
    }

    for p in &chart.points {
        let Some(x) = axes.col(p.frequency) else { continue };
        match p.error {
            ErrorBar::None => {}
            ErrorBar::Symmetric(size) => {
                let top = axes.row_clamped(p.flux + size);
                let bottom = axes.row_clamped(p.flux - size);
                for row in grid.iter_mut().take(bottom + 1).skip(top) {
                    put(row, x, '|');
                }
            }
            ErrorBar::UpperLimit(size) => put(&mut grid[axes.row_clamped(p.flux - size)], x, 'v'),
            ErrorBar::LowerLimit(size) => put(&mut grid[axes.row_clamped(p.flux + size)], x, '^'),
        }
    }

    for p in &chart.points {
        let (Some(x), Some(y)) = (axes.col(p.frequency), axes.row(p.flux)) else {
            continue;
        };
        grid[y][x] = p.marker.chars().next().unwrap_or('o');
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} | x=[{:.3e}, {:.3e}] {} | y=[{:.3e}, {:.3e}] {}\n",
        chart.title, chart.x_bounds.0, chart.x_bounds.1, chart.x_label, chart.y_bounds.0, chart.y_bounds.1, chart.y_label
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    for entry in &chart.legend {
        let glyph = entry.marker.chars().next().unwrap_or('o');
        out.push_str(&format!("  {glyph} {} ({})\n", entry.category, entry.color));
    }
    for curve in &chart.curves {
        out.push_str(&format!("  {} {} ({})\n", curve_glyph(curve), curve.label, curve.line_style));
    }

    Ok(out)
}

fn curve_glyph(curve: &ChartCurve) -> char {
    if curve.label == SUM_CURVE_LABEL {
        return '~';
    }
    match curve.line_style.as_str() {
        "dashed" | "--" | "dashdot" | "-." => ':',
        "dotted" | ":" => '.',
        _ => '-',
    }
}

fn put(row: &mut [char], x: usize, ch: char) {
    if row[x] == ' ' || row[x] == '|' {
        row[x] = ch;
    }
}

/// Maps data coordinates onto grid cells on log scales.
struct LogAxes {
    lx: (f64, f64),
    ly: (f64, f64),
    width: usize,
    height: usize,
}

impl LogAxes {
    fn new(x: (f64, f64), y: (f64, f64), width: usize, height: usize) -> Result<Self, SedError> {
        let valid = |(lo, hi): (f64, f64)| lo > 0.0 && hi > lo && hi.is_finite();
        if !valid(x) || !valid(y) {
            return Err(SedError::Render(format!(
                "log axes need positive increasing bounds, got x={x:?} y={y:?}"
            )));
        }
        Ok(Self {
            lx: (x.0.log10(), x.1.log10()),
            ly: (y.0.log10(), y.1.log10()),
            width,
            height,
        })
    }

    fn unit_x(&self, v: f64) -> Option<f64> {
        if !v.is_finite() || v <= 0.0 {
            return None;
        }
        Some((v.log10() - self.lx.0) / (self.lx.1 - self.lx.0))
    }

    fn unit_y(&self, v: f64) -> Option<f64> {
        if !v.is_finite() || v <= 0.0 {
            return None;
        }
        Some((v.log10() - self.ly.0) / (self.ly.1 - self.ly.0))
    }

    /// Column of `v`, or `None` outside the x bounds.
    fn col(&self, v: f64) -> Option<usize> {
        let u = inside(self.unit_x(v)?)?;
        Some((u * (self.width as f64 - 1.0)).round() as usize)
    }

    /// Row of `v` (row 0 is the top), or `None` outside the y bounds.
    fn row(&self, v: f64) -> Option<usize> {
        let u = inside(self.unit_y(v)?)?;
        Some(self.row_of(u))
    }

    /// Row of `v`, pinned to the grid; non-positive values land on the bottom row.
    fn row_clamped(&self, v: f64) -> usize {
        let u = self.unit_y(v).unwrap_or(0.0).clamp(0.0, 1.0);
        self.row_of(u)
    }

    fn row_of(&self, u: f64) -> usize {
        (self.height as f64 - 1.0 - u * (self.height as f64 - 1.0)).round() as usize
    }
}

/// Accept unit coordinates within rounding of the bounds.
fn inside(u: f64) -> Option<f64> {
    const SLACK: f64 = 1e-9;
    (-SLACK..=1.0 + SLACK).contains(&u).then(|| u.clamp(0.0, 1.0))
}

fn draw_curve(grid: &mut [Vec<char>], axes: &LogAxes, curve: &ChartCurve, ch: char) {
    let mut prev: Option<(usize, usize)> = None;
    for (&nu, &flux) in curve.frequencies.iter().zip(&curve.fluxes) {
        let (Some(x), Some(y)) = (axes.col(nu), axes.row(flux)) else {
            prev = None;
            continue;
        };
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, y, ch),
            None => put(&mut grid[y], x, ch),
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham-ish); only fills blank or band cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
            put(&mut grid[y0 as usize], x0 as usize, ch);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
