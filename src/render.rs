//! Chart rendering behind the [`Renderer`] trait.
//!
//! [`ChartRenderer`] draws into an RGB buffer with plotters, encodes the
//! buffer as PNG and writes one artifact file per request. [`NullRenderer`]
//! skips the drawing entirely for callers that only want the analysis half
//! of a plot request.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Deserialize;

use crate::stats;
use crate::table::{Column, DataTable};

/// The chart families the render layer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Histogram,
    Bar,
    Boxplot,
    Scatter,
    Line,
    Countplot,
    Violin,
    Heatmap,
    Pairplot,
}

impl PlotKind {
    pub const ALL: [PlotKind; 9] = [
        PlotKind::Histogram,
        PlotKind::Bar,
        PlotKind::Boxplot,
        PlotKind::Scatter,
        PlotKind::Line,
        PlotKind::Countplot,
        PlotKind::Violin,
        PlotKind::Heatmap,
        PlotKind::Pairplot,
    ];

    pub fn from_name(name: &str) -> Option<PlotKind> {
        match name {
            "histogram" => Some(PlotKind::Histogram),
            "bar" => Some(PlotKind::Bar),
            "boxplot" => Some(PlotKind::Boxplot),
            "scatter" => Some(PlotKind::Scatter),
            "line" => Some(PlotKind::Line),
            "countplot" => Some(PlotKind::Countplot),
            "violin" => Some(PlotKind::Violin),
            "heatmap" => Some(PlotKind::Heatmap),
            "pairplot" => Some(PlotKind::Pairplot),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlotKind::Histogram => "histogram",
            PlotKind::Bar => "bar",
            PlotKind::Boxplot => "boxplot",
            PlotKind::Scatter => "scatter",
            PlotKind::Line => "line",
            PlotKind::Countplot => "countplot",
            PlotKind::Violin => "violin",
            PlotKind::Heatmap => "heatmap",
            PlotKind::Pairplot => "pairplot",
        }
    }

    pub fn supported_names() -> Vec<String> {
        Self::ALL.iter().map(|k| k.name().to_string()).collect()
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the renderer needs to draw one chart. Column names are
/// expected to be already resolved against the table.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub kind: PlotKind,
    pub x: Option<String>,
    pub y: Option<String>,
    pub hue: Option<String>,
    pub columns: Vec<String>,
    pub title: String,
}

/// Where a rendered chart landed on disk and the path a client fetches it
/// under.
#[derive(Debug, Clone)]
pub struct PlotArtifact {
    pub path: PathBuf,
    pub url: String,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

/// Output geometry and artifact directory for [`ChartRenderer`].
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: default_width(),
            height: default_height(),
            output_dir: default_output_dir(),
        }
    }
}

/// Draws one chart from an already validated request.
pub trait Renderer {
    fn render(&self, table: &DataTable, request: &RenderRequest) -> Result<PlotArtifact>;
}

/// Renderer that draws nothing and touches no files. Used where only the
/// analysis half of a plot request matters, such as dry runs and tests.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _table: &DataTable, request: &RenderRequest) -> Result<PlotArtifact> {
        let file_name = format!("plot_{}.png", request.kind);
        Ok(PlotArtifact {
            url: format!("/plots/{}", file_name),
            path: PathBuf::from(file_name),
        })
    }
}

/// Renders charts to PNG files with plotters, one artifact per request.
pub struct ChartRenderer {
    config: RenderConfig,
    sequence: AtomicU64,
}

impl ChartRenderer {
    pub fn new(config: RenderConfig) -> Self {
        ChartRenderer {
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Timestamp plus a process-wide sequence number keeps artifact names
    /// unique even for requests landing within the same second.
    fn artifact_name(&self, kind: PlotKind) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        format!("plot_{}_{}_{}.png", kind, stamp, seq)
    }
}

impl Renderer for ChartRenderer {
    fn render(&self, table: &DataTable, request: &RenderRequest) -> Result<PlotArtifact> {
        let width = self.config.width;
        let height = self.config.height;
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root =
                BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).context("Failed to fill background")?;
            match request.kind {
                PlotKind::Histogram => draw_histogram(&root, table, request)?,
                PlotKind::Bar => draw_bar(&root, table, request)?,
                PlotKind::Boxplot => draw_boxplot(&root, table, request)?,
                PlotKind::Scatter => draw_scatter(&root, table, request)?,
                PlotKind::Line => draw_line(&root, table, request)?,
                PlotKind::Countplot => draw_countplot(&root, table, request)?,
                PlotKind::Violin => draw_violin(&root, table, request)?,
                PlotKind::Heatmap => draw_heatmap(&root, table, request)?,
                PlotKind::Pairplot => draw_pairplot(&root, table, request)?,
            }
            root.present().context("Failed to present drawing")?;
        }

        let mut png_bytes = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;

        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "Failed to create plot directory {}",
                self.config.output_dir.display()
            )
        })?;
        let file_name = self.artifact_name(request.kind);
        let path = self.config.output_dir.join(&file_name);
        fs::write(&path, &png_bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(PlotArtifact {
            url: format!("/plots/{}", file_name),
            path,
        })
    }
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart2d<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const SERIES_COLORS: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, RGBColor(255, 165, 0)];

fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

fn chart_on<'a, 'b>(
    root: &'a Area<'b>,
    title: &str,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<Chart2d<'a, 'b>> {
    ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")
}

/// Plain mesh for continuous axes, with date tick labels when the x axis
/// carries epoch seconds.
fn draw_continuous_mesh(chart: &mut Chart2d<'_, '_>, date_axis: bool) -> Result<()> {
    if date_axis {
        chart
            .configure_mesh()
            .x_label_formatter(&format_epoch_day)
            .draw()
            .context("Failed to draw mesh")?;
    } else {
        chart
            .configure_mesh()
            .draw()
            .context("Failed to draw mesh")?;
    }
    Ok(())
}

/// Tick labels for a temporal axis plotted as epoch seconds.
fn format_epoch_day(value: &f64) -> String {
    match chrono::DateTime::from_timestamp(*value as i64, 0) {
        Some(t) => t.format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}

/// Mesh with category names along the x axis; bars sit at `idx + 0.5` so
/// the axis runs from zero to the category count.
fn draw_category_mesh(chart: &mut Chart2d<'_, '_>, categories: &[String]) -> Result<()> {
    let labels = categories.to_vec();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len())
        .x_label_formatter(&move |x: &f64| {
            let idx = *x as usize;
            if *x >= 0.0 && idx < labels.len() {
                labels[idx].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .context("Failed to draw mesh")?;
    Ok(())
}

fn padded_range(min: f64, max: f64) -> Range<f64> {
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

fn value_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    Some((min, max))
}

/// Square-root rule, clamped so tiny and huge samples both stay readable.
fn bin_count(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(1, 50)
}

/// Equal-width bins as `(left, right, count)` plus the tallest count. The
/// last bin is closed so the maximum lands inside it.
fn bin_values(values: &[f64]) -> Option<(Vec<(f64, f64, usize)>, usize)> {
    let (min, max) = value_bounds(values)?;
    if min == max {
        return Some((vec![(min - 0.5, max + 0.5, values.len())], values.len()));
    }
    let bins = bin_count(values.len());
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let bars = counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect();
    Some((bars, max_count))
}

/// Distinct display values with their counts, in order of first appearance.
fn category_counts(column: &Column) -> (Vec<String>, Vec<usize>) {
    let mut labels: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for value in column.display_values() {
        match labels.iter().position(|l| *l == value) {
            Some(i) => counts[i] += 1,
            None => {
                labels.push(value);
                counts.push(1);
            }
        }
    }
    (labels, counts)
}

/// Pairwise-complete `(x, y)` points grouped by the hue column's display
/// value, classes in order of first appearance. Without a hue everything
/// lands in a single unlabelled class. The x side takes the continuous
/// projection, so a temporal axis plots as its epoch timeline.
fn class_points(
    table: &DataTable,
    x: &str,
    y: &str,
    hue: Option<&str>,
) -> Result<Vec<(String, Vec<(f64, f64)>)>> {
    let x_col = table
        .column(x)
        .ok_or_else(|| anyhow!("unknown column '{}'", x))?;
    let y_col = table
        .column(y)
        .ok_or_else(|| anyhow!("unknown column '{}'", y))?;
    let hue_col = match hue {
        Some(name) => Some(
            table
                .column(name)
                .ok_or_else(|| anyhow!("unknown column '{}'", name))?,
        ),
        None => None,
    };
    let mut classes: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    for row in 0..table.row_count() {
        let (Some(px), Some(py)) = (x_col.continuous_cell(row), y_col.numeric_cell(row)) else {
            continue;
        };
        let label = match hue_col {
            Some(col) => match col.display_cell(row) {
                Some(value) => value,
                None => continue,
            },
            None => String::new(),
        };
        match classes.iter_mut().find(|(name, _)| *name == label) {
            Some((_, points)) => points.push((px, py)),
            None => classes.push((label, vec![(px, py)])),
        }
    }
    Ok(classes)
}

fn required<'a>(field: &'a Option<String>, what: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| anyhow!("chart is missing its {} column", what))
}

fn draw_histogram(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let x = required(&request.x, "x")?;
    let column = table
        .column(x)
        .ok_or_else(|| anyhow!("unknown column '{}'", x))?;
    // Categorical data gets count bars instead of binned values.
    if !column.is_numeric() {
        let (labels, counts) = category_counts(column);
        return draw_count_bars(root, &request.title, labels, counts);
    }
    let values = column.numeric_values();
    let (bars, max_count) =
        bin_values(&values).ok_or_else(|| anyhow!("column '{}' has no values to plot", x))?;
    let x_start = bars.first().map(|b| b.0).unwrap_or(0.0);
    let x_end = bars.last().map(|b| b.1).unwrap_or(1.0);
    let mut chart = chart_on(
        root,
        &request.title,
        padded_range(x_start, x_end),
        0.0..(max_count as f64 * 1.05),
    )?;
    chart
        .configure_mesh()
        .draw()
        .context("Failed to draw mesh")?;
    chart
        .draw_series(bars.iter().map(|&(left, right, count)| {
            Rectangle::new([(left, 0.0), (right, count as f64)], BLUE.mix(0.6).filled())
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

fn draw_count_bars(
    root: &Area<'_>,
    title: &str,
    labels: Vec<String>,
    counts: Vec<usize>,
) -> Result<()> {
    if labels.is_empty() {
        return Err(anyhow!("no values to plot"));
    }
    let max_count = counts.iter().copied().max().unwrap_or(0) as f64;
    let mut chart = chart_on(root, title, 0.0..labels.len() as f64, 0.0..max_count * 1.05)?;
    draw_category_mesh(&mut chart, &labels)?;
    chart
        .draw_series(counts.iter().enumerate().map(|(idx, &count)| {
            let center = idx as f64 + 0.5;
            Rectangle::new(
                [(center - 0.4, 0.0), (center + 0.4, count as f64)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

fn draw_countplot(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let x = required(&request.x, "x")?;
    let column = table
        .column(x)
        .ok_or_else(|| anyhow!("unknown column '{}'", x))?;
    let (labels, counts) = category_counts(column);
    draw_count_bars(root, &request.title, labels, counts)
}

/// Bars show the mean of `y` within each `x` category.
fn draw_bar(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let x = required(&request.x, "x")?;
    let y = required(&request.y, "y")?;
    let groups = table.grouped_numeric(Some(x), y);
    let mut labels = Vec::new();
    let mut means = Vec::new();
    for (label, values) in &groups {
        if let Some(mean) = stats::mean(values) {
            labels.push(label.clone());
            means.push(mean);
        }
    }
    if labels.is_empty() {
        return Err(anyhow!("no complete rows to plot"));
    }
    // Bars grow from zero, so zero must stay inside the range.
    let low = means.iter().fold(0.0f64, |a, &b| a.min(b));
    let high = means.iter().fold(0.0f64, |a, &b| a.max(b));
    let mut chart = chart_on(
        root,
        &request.title,
        0.0..labels.len() as f64,
        padded_range(low, high),
    )?;
    draw_category_mesh(&mut chart, &labels)?;
    chart
        .draw_series(means.iter().enumerate().map(|(idx, &mean)| {
            let center = idx as f64 + 0.5;
            Rectangle::new(
                [(center - 0.4, 0.0), (center + 0.4, mean)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

struct BoxStat {
    q1: f64,
    median: f64,
    q3: f64,
    lower_whisker: f64,
    upper_whisker: f64,
    outliers: Vec<f64>,
}

/// Tukey box statistics: whiskers reach the most extreme values still
/// inside the 1.5 IQR fences, everything beyond is an outlier dot.
fn box_stat(values: &[f64]) -> Option<BoxStat> {
    let sorted = stats::sorted(values);
    let five = stats::five_number(&sorted)?;
    let (lower_fence, upper_fence) = stats::iqr_fences(five.q1, five.q3);
    let mut lower_whisker = five.q1;
    for &v in &sorted {
        if v >= lower_fence {
            lower_whisker = v;
            break;
        }
    }
    let mut upper_whisker = five.q3;
    for &v in sorted.iter().rev() {
        if v <= upper_fence {
            upper_whisker = v;
            break;
        }
    }
    let outliers = sorted
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();
    Some(BoxStat {
        q1: five.q1,
        median: five.median,
        q3: five.q3,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

fn draw_boxplot(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let y = required(&request.y, "y")?;
    let groups = table.grouped_numeric(request.x.as_deref(), y);
    let mut labels = Vec::new();
    let mut boxes = Vec::new();
    for (label, values) in &groups {
        if let Some(stat) = box_stat(values) {
            labels.push(label.clone());
            boxes.push(stat);
        }
    }
    if boxes.is_empty() {
        return Err(anyhow!("no values to plot"));
    }
    let all: Vec<f64> = groups
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .collect();
    let (y_min, y_max) = value_bounds(&all).ok_or_else(|| anyhow!("no values to plot"))?;
    let mut chart = chart_on(
        root,
        &request.title,
        0.0..labels.len() as f64,
        padded_range(y_min, y_max),
    )?;
    draw_category_mesh(&mut chart, &labels)?;
    for (idx, stat) in boxes.iter().enumerate() {
        let center = idx as f64 + 0.5;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(center - 0.25, stat.q1), (center + 0.25, stat.q3)],
                BLUE.mix(0.35).filled(),
            )))
            .context("Failed to draw box")?;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(center - 0.25, stat.q1), (center + 0.25, stat.q3)],
                BLUE.stroke_width(1),
            )))
            .context("Failed to draw box")?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(center - 0.25, stat.median), (center + 0.25, stat.median)],
                BLACK.stroke_width(2),
            )))
            .context("Failed to draw median")?;
        let whiskers = [
            vec![(center, stat.q3), (center, stat.upper_whisker)],
            vec![(center, stat.q1), (center, stat.lower_whisker)],
            vec![
                (center - 0.12, stat.upper_whisker),
                (center + 0.12, stat.upper_whisker),
            ],
            vec![
                (center - 0.12, stat.lower_whisker),
                (center + 0.12, stat.lower_whisker),
            ],
        ];
        for segment in whiskers {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    segment,
                    BLACK.stroke_width(1),
                )))
                .context("Failed to draw whisker")?;
        }
        chart
            .draw_series(
                stat.outliers
                    .iter()
                    .map(|&v| Circle::new((center, v), 2, BLACK.filled())),
            )
            .context("Failed to draw outliers")?;
    }
    Ok(())
}

fn draw_scatter(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let x = required(&request.x, "x")?;
    let y = required(&request.y, "y")?;
    let classes = class_points(table, x, y, request.hue.as_deref())?;
    let xs: Vec<f64> = classes
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.0))
        .collect();
    let ys: Vec<f64> = classes
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.1))
        .collect();
    let (x_min, x_max) = value_bounds(&xs).ok_or_else(|| anyhow!("no complete rows to plot"))?;
    let (y_min, y_max) = value_bounds(&ys).ok_or_else(|| anyhow!("no complete rows to plot"))?;
    let mut chart = chart_on(
        root,
        &request.title,
        padded_range(x_min, x_max),
        padded_range(y_min, y_max),
    )?;
    let date_axis = table.column(x).map(|c| c.is_temporal()).unwrap_or(false);
    draw_continuous_mesh(&mut chart, date_axis)?;
    let with_legend = request.hue.is_some();
    for (idx, (label, points)) in classes.iter().enumerate() {
        let color = series_color(idx);
        let series = chart
            .draw_series(
                points
                    .iter()
                    .map(move |&(px, py)| Circle::new((px, py), 3, color.filled())),
            )
            .context("Failed to draw points")?;
        if with_legend {
            series
                .label(label.clone())
                .legend(move |(lx, ly)| Circle::new((lx, ly), 3, color.filled()));
        }
    }
    if with_legend {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .context("Failed to draw legend")?;
    }
    Ok(())
}

fn draw_line(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let x = required(&request.x, "x")?;
    let y = required(&request.y, "y")?;
    let classes = class_points(table, x, y, request.hue.as_deref())?;
    let xs: Vec<f64> = classes
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.0))
        .collect();
    let ys: Vec<f64> = classes
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.1))
        .collect();
    let (x_min, x_max) = value_bounds(&xs).ok_or_else(|| anyhow!("no complete rows to plot"))?;
    let (y_min, y_max) = value_bounds(&ys).ok_or_else(|| anyhow!("no complete rows to plot"))?;
    let mut chart = chart_on(
        root,
        &request.title,
        padded_range(x_min, x_max),
        padded_range(y_min, y_max),
    )?;
    let date_axis = table.column(x).map(|c| c.is_temporal()).unwrap_or(false);
    draw_continuous_mesh(&mut chart, date_axis)?;
    let with_legend = request.hue.is_some();
    for (idx, (label, points)) in classes.iter().enumerate() {
        let color = series_color(idx);
        let mut sorted_points = points.clone();
        sorted_points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let series = chart
            .draw_series(LineSeries::new(sorted_points, color.stroke_width(2)))
            .context("Failed to draw line")?;
        if with_legend {
            series.label(label.clone()).legend(move |(lx, ly)| {
                PathElement::new(vec![(lx, ly), (lx + 16, ly)], color.stroke_width(2))
            });
        }
    }
    if with_legend {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .context("Failed to draw legend")?;
    }
    Ok(())
}

fn draw_violin(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let y = required(&request.y, "y")?;
    let groups = table.grouped_numeric(request.x.as_deref(), y);
    let mut labels = Vec::new();
    let mut lobes: Vec<Vec<(f64, f64)>> = Vec::new();
    for (label, values) in &groups {
        if values.is_empty() {
            continue;
        }
        let bandwidth = silverman_bandwidth(values);
        let (grid, density) = compute_kde(values, bandwidth);
        if grid.is_empty() {
            continue;
        }
        labels.push(label.clone());
        lobes.push(grid.into_iter().zip(density).collect());
    }
    if lobes.is_empty() {
        return Err(anyhow!("no values to plot"));
    }
    let y_min = lobes
        .iter()
        .flat_map(|lobe| lobe.iter().map(|p| p.0))
        .fold(f64::INFINITY, f64::min);
    let y_max = lobes
        .iter()
        .flat_map(|lobe| lobe.iter().map(|p| p.0))
        .fold(f64::NEG_INFINITY, f64::max);
    let mut chart = chart_on(
        root,
        &request.title,
        0.0..labels.len() as f64,
        padded_range(y_min, y_max),
    )?;
    draw_category_mesh(&mut chart, &labels)?;
    for (idx, lobe) in lobes.iter().enumerate() {
        let center = idx as f64 + 0.5;
        // Symmetric outline: down one side of the density curve, back up
        // the mirrored side.
        let mut outline: Vec<(f64, f64)> = lobe
            .iter()
            .map(|&(gy, d)| (center - d * 0.4, gy))
            .collect();
        outline.extend(lobe.iter().rev().map(|&(gy, d)| (center + d * 0.4, gy)));
        chart
            .draw_series(std::iter::once(Polygon::new(
                outline,
                BLUE.mix(0.4).filled(),
            )))
            .context("Failed to draw violin")?;
    }
    Ok(())
}

fn draw_heatmap(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let names = if request.columns.is_empty() {
        table.numeric_column_names()
    } else {
        request.columns.clone()
    };
    if names.is_empty() {
        return Err(anyhow!("heatmap needs a numeric column"));
    }
    let mut cells = Vec::with_capacity(names.len());
    for name in &names {
        let column = table
            .column(name)
            .ok_or_else(|| anyhow!("unknown column '{}'", name))?;
        let values = column
            .numeric_cells()
            .ok_or_else(|| anyhow!("column '{}' is not numeric", name))?;
        cells.push(values);
    }
    let k = names.len();
    let mut matrix: Vec<Vec<Option<f64>>> = vec![vec![None; k]; k];
    for i in 0..k {
        matrix[i][i] = Some(1.0);
        for j in (i + 1)..k {
            let (a, b) = stats::pairwise_complete(cells[i], cells[j]);
            let r = stats::pearson(&a, &b);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    let kf = k as f64;
    let mut chart = chart_on(root, &request.title, 0.0..kf, 0.0..kf)?;
    let x_labels = names.clone();
    let y_labels = names.clone();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(k)
        .y_labels(k)
        .x_label_formatter(&move |x: &f64| {
            let idx = *x as usize;
            if *x >= 0.0 && idx < x_labels.len() {
                x_labels[idx].clone()
            } else {
                String::new()
            }
        })
        .y_label_formatter(&move |y: &f64| {
            let idx = *y as usize;
            if *y >= 0.0 && idx < y_labels.len() {
                y_labels[idx].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .context("Failed to draw mesh")?;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &r) in row.iter().enumerate() {
            // Pairs with no overlapping rows stay grey.
            let color = r.map(diverging_color).unwrap_or(RGBColor(224, 224, 224));
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [
                        (j as f64 + 0.03, i as f64 + 0.03),
                        (j as f64 + 0.97, i as f64 + 0.97),
                    ],
                    color.filled(),
                )))
                .context("Failed to draw cell")?;
            if let Some(r) = r {
                let shade = if r.abs() > 0.6 { WHITE } else { BLACK };
                chart
                    .draw_series(std::iter::once(Text::new(
                        format!("{:.2}", r),
                        (j as f64 + 0.35, i as f64 + 0.45),
                        ("sans-serif", 14).into_font().color(&shade),
                    )))
                    .context("Failed to draw cell label")?;
            }
        }
    }
    Ok(())
}

fn draw_pairplot(root: &Area<'_>, table: &DataTable, request: &RenderRequest) -> Result<()> {
    let names = if request.columns.is_empty() {
        table.numeric_column_names()
    } else {
        request.columns.clone()
    };
    if names.is_empty() {
        return Err(anyhow!("pairplot needs a numeric column"));
    }
    let titled = root
        .titled(&request.title, ("sans-serif", 20))
        .context("Failed to draw title")?;
    let panels = titled.split_evenly((names.len(), names.len()));
    for (i, row_name) in names.iter().enumerate() {
        for (j, col_name) in names.iter().enumerate() {
            let panel = &panels[i * names.len() + j];
            if i == j {
                draw_mini_histogram(panel, table, row_name)?;
            } else {
                draw_mini_scatter(panel, table, col_name, row_name)?;
            }
        }
    }
    Ok(())
}

fn draw_mini_histogram(area: &Area<'_>, table: &DataTable, name: &str) -> Result<()> {
    let column = table
        .column(name)
        .ok_or_else(|| anyhow!("unknown column '{}'", name))?;
    let values = column.numeric_values();
    let Some((bars, max_count)) = bin_values(&values) else {
        // A column with no values leaves its panel blank.
        return Ok(());
    };
    let x_start = bars.first().map(|b| b.0).unwrap_or(0.0);
    let x_end = bars.last().map(|b| b.1).unwrap_or(1.0);
    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .caption(name, ("sans-serif", 12))
        .x_label_area_size(15)
        .y_label_area_size(20)
        .build_cartesian_2d(padded_range(x_start, x_end), 0.0..(max_count as f64 * 1.05))
        .context("Failed to build chart")?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(3)
        .y_labels(3)
        .draw()
        .context("Failed to draw mesh")?;
    chart
        .draw_series(bars.iter().map(|&(left, right, count)| {
            Rectangle::new([(left, 0.0), (right, count as f64)], BLUE.mix(0.6).filled())
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

fn draw_mini_scatter(area: &Area<'_>, table: &DataTable, x: &str, y: &str) -> Result<()> {
    let classes = class_points(table, x, y, None)?;
    let points = classes
        .into_iter()
        .next()
        .map(|(_, points)| points)
        .unwrap_or_default();
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (Some((x_min, x_max)), Some((y_min, y_max))) = (value_bounds(&xs), value_bounds(&ys))
    else {
        return Ok(());
    };
    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .x_label_area_size(15)
        .y_label_area_size(20)
        .build_cartesian_2d(padded_range(x_min, x_max), padded_range(y_min, y_max))
        .context("Failed to build chart")?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(3)
        .y_labels(3)
        .draw()
        .context("Failed to draw mesh")?;
    chart
        .draw_series(
            points
                .iter()
                .map(|&(px, py)| Circle::new((px, py), 2, BLUE.mix(0.6).filled())),
        )
        .context("Failed to draw points")?;
    Ok(())
}

/// Blue for -1 through white at zero to red for +1.
fn diverging_color(r: f64) -> RGBColor {
    let t = r.clamp(-1.0, 1.0);
    let fade = (255.0 * (1.0 - t.abs())) as u8;
    if t >= 0.0 {
        RGBColor(255, fade, fade)
    } else {
        RGBColor(fade, fade, 255)
    }
}

/// Silverman's rule of thumb for bandwidth selection.
fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 1.0;
    }
    let sorted = stats::sorted(values);
    let std_dev = stats::sample_std(values).unwrap_or(0.0);
    let iqr = stats::percentile(&sorted, 0.75) - stats::percentile(&sorted, 0.25);
    let scale = if iqr > 0.0 { std_dev.min(iqr / 1.34) } else { std_dev };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Gaussian KDE over a fixed grid, extended past the data range for smooth
/// edges and normalized to a 0-1 peak for drawing.
fn compute_kde(values: &[f64], bandwidth: f64) -> (Vec<f64>, Vec<f64>) {
    const GRID_POINTS: usize = 128;

    let n = values.len() as f64;
    let (min, max) = match value_bounds(values) {
        Some(bounds) => bounds,
        None => return (vec![], vec![]),
    };
    let extend = 3.0 * bandwidth;
    let start = min - extend;
    let end = max + extend;
    let range = end - start;
    if range <= 0.0 {
        return (vec![min], vec![1.0]);
    }
    let step = range / (GRID_POINTS - 1) as f64;
    let mut grid = Vec::with_capacity(GRID_POINTS);
    let mut density = Vec::with_capacity(GRID_POINTS);
    for i in 0..GRID_POINTS {
        let point = start + i as f64 * step;
        let mut d = 0.0;
        for &v in values {
            d += gaussian_kernel((point - v) / bandwidth);
        }
        grid.push(point);
        density.push(d / (n * bandwidth));
    }
    let peak = density.iter().fold(0.0f64, |a, &b| a.max(b));
    if peak > 0.0 {
        for d in &mut density {
            *d /= peak;
        }
    }
    (grid, density)
}
