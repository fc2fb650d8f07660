//! Plot descriptions and their SVG rendering.
//!
//! A [`Plot`] holds everything needed to draw it; [`Plot::to_svg`] renders a
//! standalone SVG document and [`Plot::save_svg`] writes it to disk.

use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::metrics::ConfusionMatrix;

/// Categorical colours, cycled when there are more levels than entries.
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

const SCATTER_WIDTH: f64 = 640.0;
const SCATTER_HEIGHT: f64 = 480.0;
const PAIRS_CELL: f64 = 150.0;
const HEATMAP_CELL: f64 = 80.0;
const MARGIN: f64 = 60.0;
const LEGEND_WIDTH: f64 = 140.0;

/// A renderable chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plot {
    /// Two projected dimensions against each other, coloured by label.
    Scatter {
        title: String,
        /// Names of the two columns of `coordinates`.
        dimensions: Vec<String>,
        coordinates: Array2<f64>,
        labels: Vec<String>,
        levels: Vec<String>,
    },
    /// Every pair of projected dimensions in a grid.
    PairsMatrix {
        title: String,
        dimensions: Vec<String>,
        coordinates: Array2<f64>,
        labels: Vec<String>,
        levels: Vec<String>,
    },
    /// Annotated heat map of a confusion matrix (predicted x true).
    ConfusionHeatmap {
        title: String,
        matrix: ConfusionMatrix,
    },
}

impl Plot {
    pub fn kind(&self) -> &'static str {
        match self {
            Plot::Scatter { .. } => "scatter",
            Plot::PairsMatrix { .. } => "pairs_matrix",
            Plot::ConfusionHeatmap { .. } => "confusion_heatmap",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Plot::Scatter { title, .. }
            | Plot::PairsMatrix { title, .. }
            | Plot::ConfusionHeatmap { title, .. } => title,
        }
    }

    /// Render as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        self.to_string()
    }

    pub fn save_svg(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_svg())?;
        Ok(())
    }

    /// Projected coordinates as a frame with one column per dimension and a
    /// trailing `label` column. `None` for heat maps.
    pub fn to_dataframe(&self) -> Result<Option<DataFrame>> {
        let (dimensions, coordinates, labels) = match self {
            Plot::Scatter {
                dimensions,
                coordinates,
                labels,
                ..
            }
            | Plot::PairsMatrix {
                dimensions,
                coordinates,
                labels,
                ..
            } => (dimensions, coordinates, labels),
            Plot::ConfusionHeatmap { .. } => return Ok(None),
        };

        let mut columns: Vec<Column> = dimensions
            .iter()
            .zip(coordinates.axis_iter(Axis(1)))
            .map(|(name, values)| Column::new(name.as_str().into(), values.to_vec()))
            .collect();
        columns.push(Column::new("label".into(), labels.clone()));

        Ok(Some(DataFrame::new(columns)?))
    }

    /// Write [`to_dataframe`](Self::to_dataframe) as CSV. Returns `false` for heat maps.
    pub fn save_coordinates(&self, path: impl AsRef<Path>) -> Result<bool> {
        let Some(mut df) = self.to_dataframe()? else {
            return Ok(false);
        };
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(true)
    }
}

impl fmt::Display for Plot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut svg = String::new();
        match self {
            Plot::Scatter {
                title,
                dimensions,
                coordinates,
                labels,
                levels,
            } => render_scatter(&mut svg, title, dimensions, coordinates, labels, levels)?,
            Plot::PairsMatrix {
                title,
                dimensions,
                coordinates,
                labels,
                levels,
            } => render_pairs(&mut svg, title, dimensions, coordinates, labels, levels)?,
            Plot::ConfusionHeatmap { title, matrix } => render_heatmap(&mut svg, title, matrix)?,
        }
        f.write_str(&svg)
    }
}

fn open_document(svg: &mut String, width: f64, height: f64, title: &str) -> fmt::Result {
    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">"
    )?;
    svg.push_str("  <style>\n");
    svg.push_str("    .axis { stroke: #333; stroke-width: 1; }\n");
    svg.push_str("    .label { font-family: sans-serif; font-size: 12px; fill: #222; }\n");
    svg.push_str("    .title { font-family: sans-serif; font-size: 16px; font-weight: bold; }\n");
    svg.push_str("  </style>\n");
    svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n");
    writeln!(
        svg,
        "  <text x=\"{:.1}\" y=\"28\" text-anchor=\"middle\" class=\"title\">{}</text>",
        width / 2.0,
        escape(title)
    )
}

fn close_document(svg: &mut String) {
    svg.push_str("</svg>\n");
}

fn colour(levels: &[String], label: &str) -> &'static str {
    let idx = levels.iter().position(|l| l == label).unwrap_or(0);
    PALETTE[idx % PALETTE.len()]
}

/// Value range padded by 5%, widened when all values coincide.
fn padded_range(values: ArrayView1<'_, f64>) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let span = hi - lo;
    if span <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - 0.05 * span, hi + 0.05 * span)
}

/// Draw points of columns `(cx, cy)` into the box at `(x0, y0)` of size `w x h`.
#[allow(clippy::too_many_arguments)]
fn draw_points(
    svg: &mut String,
    coordinates: &Array2<f64>,
    cx: usize,
    cy: usize,
    labels: &[String],
    levels: &[String],
    (x0, y0, w, h): (f64, f64, f64, f64),
    radius: f64,
) -> fmt::Result {
    let (xmin, xmax) = padded_range(coordinates.column(cx));
    let (ymin, ymax) = padded_range(coordinates.column(cy));

    for (row, label) in coordinates.rows().into_iter().zip(labels) {
        let px = x0 + (row[cx] - xmin) / (xmax - xmin) * w;
        let py = y0 + h - (row[cy] - ymin) / (ymax - ymin) * h;
        writeln!(
            svg,
            "  <circle cx=\"{px:.2}\" cy=\"{py:.2}\" r=\"{radius:.1}\" fill=\"{}\" fill-opacity=\"0.8\"/>",
            colour(levels, label)
        )?;
    }
    Ok(())
}

fn draw_legend(svg: &mut String, levels: &[String], x: f64, y: f64) -> fmt::Result {
    writeln!(svg, "  <text x=\"{x:.1}\" y=\"{y:.1}\" class=\"label\">label</text>")?;
    for (i, level) in levels.iter().enumerate() {
        let ly = y + 20.0 + i as f64 * 18.0;
        writeln!(
            svg,
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/>",
            x + 6.0,
            ly - 4.0,
            PALETTE[i % PALETTE.len()]
        )?;
        writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{ly:.1}\" class=\"label\">{}</text>",
            x + 16.0,
            escape(level)
        )?;
    }
    Ok(())
}

fn render_scatter(
    svg: &mut String,
    title: &str,
    dimensions: &[String],
    coordinates: &Array2<f64>,
    labels: &[String],
    levels: &[String],
) -> fmt::Result {
    let width = SCATTER_WIDTH + LEGEND_WIDTH;
    open_document(svg, width, SCATTER_HEIGHT, title)?;

    let plot_w = SCATTER_WIDTH - 2.0 * MARGIN;
    let plot_h = SCATTER_HEIGHT - 2.0 * MARGIN;
    writeln!(
        svg,
        "  <rect x=\"{MARGIN}\" y=\"{MARGIN}\" width=\"{plot_w}\" height=\"{plot_h}\" fill=\"none\" class=\"axis\"/>"
    )?;

    draw_points(
        svg,
        coordinates,
        0,
        1,
        labels,
        levels,
        (MARGIN, MARGIN, plot_w, plot_h),
        4.0,
    )?;

    let x_name = dimensions.first().map(String::as_str).unwrap_or("dim1");
    let y_name = dimensions.get(1).map(String::as_str).unwrap_or("dim2");
    writeln!(
        svg,
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{}</text>",
        MARGIN + plot_w / 2.0,
        SCATTER_HEIGHT - 20.0,
        escape(x_name)
    )?;
    writeln!(
        svg,
        "  <text x=\"20\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\" transform=\"rotate(-90 20 {:.1})\">{}</text>",
        MARGIN + plot_h / 2.0,
        MARGIN + plot_h / 2.0,
        escape(y_name)
    )?;

    draw_legend(svg, levels, SCATTER_WIDTH, MARGIN + 10.0)?;
    close_document(svg);
    Ok(())
}

fn render_pairs(
    svg: &mut String,
    title: &str,
    dimensions: &[String],
    coordinates: &Array2<f64>,
    labels: &[String],
    levels: &[String],
) -> fmt::Result {
    let k = coordinates.ncols();
    let grid = PAIRS_CELL * k as f64;
    open_document(svg, grid + 2.0 * MARGIN + LEGEND_WIDTH, grid + 2.0 * MARGIN, title)?;

    let inset = 8.0;
    for r in 0..k {
        for c in 0..k {
            let x0 = MARGIN + c as f64 * PAIRS_CELL;
            let y0 = MARGIN + r as f64 * PAIRS_CELL;
            writeln!(
                svg,
                "  <rect x=\"{x0:.1}\" y=\"{y0:.1}\" width=\"{PAIRS_CELL}\" height=\"{PAIRS_CELL}\" fill=\"none\" class=\"axis\"/>"
            )?;

            if r == c {
                let name = dimensions.get(r).cloned().unwrap_or_else(|| format!("dim{}", r + 1));
                writeln!(
                    svg,
                    "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"title\">{}</text>",
                    x0 + PAIRS_CELL / 2.0,
                    y0 + PAIRS_CELL / 2.0 + 6.0,
                    escape(&name)
                )?;
            } else {
                let inner = PAIRS_CELL - 2.0 * inset;
                draw_points(
                    svg,
                    coordinates,
                    c,
                    r,
                    labels,
                    levels,
                    (x0 + inset, y0 + inset, inner, inner),
                    2.5,
                )?;
            }
        }
    }

    draw_legend(svg, levels, grid + 2.0 * MARGIN, MARGIN + 10.0)?;
    close_document(svg);
    Ok(())
}

fn render_heatmap(svg: &mut String, title: &str, matrix: &ConfusionMatrix) -> fmt::Result {
    let n = matrix.levels().len();
    let grid = HEATMAP_CELL * n as f64;
    let left = MARGIN + 60.0;
    let top = MARGIN + 20.0;
    open_document(svg, left + grid + MARGIN, top + grid + MARGIN, title)?;

    let max = matrix.max_count().max(1) as f64;
    for (p, row) in matrix.counts().iter().enumerate() {
        for (t, &count) in row.iter().enumerate() {
            let x = left + t as f64 * HEATMAP_CELL;
            let y = top + p as f64 * HEATMAP_CELL;
            let intensity = count as f64 / max;
            // White to dark blue.
            let r = (255.0 - 222.0 * intensity) as u8;
            let g = (255.0 - 180.0 * intensity) as u8;
            let b = (255.0 - 75.0 * intensity) as u8;
            let text_fill = if intensity > 0.5 { "#ffffff" } else { "#222222" };

            writeln!(
                svg,
                "  <rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{HEATMAP_CELL}\" height=\"{HEATMAP_CELL}\" fill=\"#{r:02X}{g:02X}{b:02X}\" stroke=\"#ffffff\"/>"
            )?;
            writeln!(
                svg,
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"16\" fill=\"{text_fill}\">{count}</text>",
                x + HEATMAP_CELL / 2.0,
                y + HEATMAP_CELL / 2.0 + 6.0
            )?;
        }
    }

    for (i, level) in matrix.levels().iter().enumerate() {
        let offset = i as f64 * HEATMAP_CELL + HEATMAP_CELL / 2.0;
        writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{}</text>",
            left + offset,
            top - 8.0,
            escape(level)
        )?;
        writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" class=\"label\">{}</text>",
            left - 8.0,
            top + offset + 4.0,
            escape(level)
        )?;
    }

    writeln!(
        svg,
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">Reference (true)</text>",
        left + grid / 2.0,
        top + grid + 30.0
    )?;
    writeln!(
        svg,
        "  <text x=\"20\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\" transform=\"rotate(-90 20 {:.1})\">Prediction</text>",
        top + grid / 2.0,
        top + grid / 2.0
    )?;

    close_document(svg);
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
