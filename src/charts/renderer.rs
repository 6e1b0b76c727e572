//! Static Chart Renderer
//! Draws aggregate tables as PNG files with plotters. Purely a sink: data in,
//! image file out, nothing retained between calls.

use plotters::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::spec::{palette_color, ChartKind, ChartSpec};
use crate::stats::{AggregateTable, BinnedDistribution, Crosstab};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("chart {file}: nothing to draw")]
    EmptyChart { file: String },
    #[error("chart {file}: table lacks frequency columns")]
    MissingFrequencies { file: String },
    #[error("chart kind {kind:?} does not match the supplied data")]
    InputMismatch { kind: ChartKind },
    #[error("failed to render chart: {0}")]
    Backend(String),
}

/// Data a chart can be drawn from.
pub enum ChartInput<'a> {
    Table(&'a AggregateTable),
    Distribution(&'a BinnedDistribution),
    Matrix(&'a Crosstab),
}

pub struct ChartRenderer;

impl ChartRenderer {
    /// Render one chart into `out_dir` and return the written path.
    pub fn render(
        input: &ChartInput,
        spec: &ChartSpec,
        out_dir: &Path,
    ) -> Result<PathBuf, ChartError> {
        let path = out_dir.join(&spec.file_name);
        match (spec.kind, input) {
            (ChartKind::Bar, ChartInput::Table(table)) => Self::draw_bars(
                &labels_of(table),
                &table.metrics(),
                spec,
                &path,
                true,
            )?,
            (ChartKind::Histogram, ChartInput::Distribution(dist)) => {
                let labels: Vec<String> = dist.intervals.iter().map(|iv| iv.label()).collect();
                let counts: Vec<f64> = dist.counts.iter().map(|c| *c as f64).collect();
                Self::draw_bars(&labels, &counts, spec, &path, false)?
            }
            (ChartKind::Pareto, ChartInput::Table(table)) => {
                Self::draw_pareto(table, spec, &path)?
            }
            (ChartKind::Line, ChartInput::Table(table)) => Self::draw_line(table, spec, &path)?,
            (ChartKind::StackedArea, ChartInput::Matrix(matrix)) => {
                Self::draw_stacked_area(matrix, spec, &path)?
            }
            (kind, _) => return Err(ChartError::InputMismatch { kind }),
        }
        info!(path = %path.display(), "chart written");
        Ok(path)
    }

    /// Vertical bars over categorical labels. With `cycle_colors` every bar
    /// takes the next palette color, otherwise all bars share one.
    fn draw_bars(
        labels: &[String],
        values: &[f64],
        spec: &ChartSpec,
        path: &Path,
        cycle_colors: bool,
    ) -> Result<(), ChartError> {
        if labels.is_empty() {
            return Err(ChartError::EmptyChart {
                file: spec.file_name.clone(),
            });
        }
        let n = labels.len();
        let y_max = axis_max(values);

        let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(90)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.6f64..(n as f64 - 0.4), 0f64..y_max)
            .map_err(backend)?;

        let tick_labels = labels.to_vec();
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&move |x| tick_label(&tick_labels, *x))
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .x_desc(&spec.x_label)
            .y_desc(&spec.y_label)
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(values.iter().enumerate().map(|(i, v)| {
                let color = if cycle_colors {
                    palette_color(i)
                } else {
                    palette_color(4)
                };
                Rectangle::new([(i as f64 - 0.35, 0.0), (i as f64 + 0.35, *v)], color.filled())
            }))
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Descending bars with the cumulative share on a secondary axis.
    fn draw_pareto(
        table: &AggregateTable,
        spec: &ChartSpec,
        path: &Path,
    ) -> Result<(), ChartError> {
        if table.rows.is_empty() {
            return Err(ChartError::EmptyChart {
                file: spec.file_name.clone(),
            });
        }
        let mut cumulative = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            match row.cumulative_frequency {
                Some(share) => cumulative.push(share),
                None => {
                    return Err(ChartError::MissingFrequencies {
                        file: spec.file_name.clone(),
                    })
                }
            }
        }

        let n = table.rows.len();
        let y_max = axis_max(&table.metrics());

        let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(90)
            .y_label_area_size(70)
            .right_y_label_area_size(60)
            .build_cartesian_2d(-0.6f64..(n as f64 - 0.4), 0f64..y_max)
            .map_err(backend)?
            .set_secondary_coord(-0.6f64..(n as f64 - 0.4), 0f64..1.05f64);

        let tick_labels = labels_of(table);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&move |x| tick_label(&tick_labels, *x))
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .x_desc(&spec.x_label)
            .y_desc(&spec.y_label)
            .draw()
            .map_err(backend)?;
        chart
            .configure_secondary_axes()
            .y_desc("Cumulative share")
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(table.rows.iter().enumerate().map(|(i, row)| {
                Rectangle::new(
                    [(i as f64 - 0.35, 0.0), (i as f64 + 0.35, row.metric)],
                    palette_color(6).filled(),
                )
            }))
            .map_err(backend)?;

        let points: Vec<(f64, f64)> = cumulative
            .iter()
            .enumerate()
            .map(|(i, share)| (i as f64, *share))
            .collect();
        chart
            .draw_secondary_series(LineSeries::new(
                points.iter().copied(),
                palette_color(0).stroke_width(2),
            ))
            .map_err(backend)?;
        chart
            .draw_secondary_series(
                points
                    .iter()
                    .map(|p| Circle::new(*p, 3, palette_color(0).filled())),
            )
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Metric over numeric labels (years). Labels that do not parse as
    /// numbers are skipped.
    fn draw_line(table: &AggregateTable, spec: &ChartSpec, path: &Path) -> Result<(), ChartError> {
        let points: Vec<(f64, f64)> = table
            .rows
            .iter()
            .filter_map(|row| row.label.parse::<f64>().ok().map(|x| (x, row.metric)))
            .collect();
        if points.is_empty() {
            return Err(ChartError::EmptyChart {
                file: spec.file_name.clone(),
            });
        }

        let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y_max = axis_max(&points.iter().map(|p| p.1).collect::<Vec<_>>());

        let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d((x_min - 0.5)..(x_max + 0.5), 0f64..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_labels(points.len().min(12))
            .x_label_formatter(&|x| format!("{x:.0}"))
            .x_desc(&spec.x_label)
            .y_desc(&spec.y_label)
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                palette_color(0).stroke_width(2),
            ))
            .map_err(backend)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|p| Circle::new(*p, 3, palette_color(0).filled())),
            )
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// One filled band per column label, stacked over numeric row labels.
    fn draw_stacked_area(
        matrix: &Crosstab,
        spec: &ChartSpec,
        path: &Path,
    ) -> Result<(), ChartError> {
        let mut xs: Vec<f64> = Vec::new();
        let mut kept_rows: Vec<usize> = Vec::new();
        for (i, label) in matrix.row_labels.iter().enumerate() {
            if let Ok(x) = label.parse::<f64>() {
                xs.push(x);
                kept_rows.push(i);
            }
        }
        if xs.len() < 2 || matrix.col_labels.is_empty() {
            return Err(ChartError::EmptyChart {
                file: spec.file_name.clone(),
            });
        }

        // layers[k][i] = stacked height of columns 0..=k at row i
        let cols = matrix.col_labels.len();
        let mut layers = vec![vec![0.0f64; xs.len()]; cols];
        for (i, row) in kept_rows.iter().enumerate() {
            let mut running = 0.0;
            for (k, layer) in layers.iter_mut().enumerate() {
                running += matrix.counts[*row][k] as f64;
                layer[i] = running;
            }
        }
        let y_max = axis_max(&layers[cols - 1]);

        let x_min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_labels(xs.len().min(12))
            .x_label_formatter(&|x| format!("{x:.0}"))
            .x_desc(&spec.x_label)
            .y_desc(&spec.y_label)
            .draw()
            .map_err(backend)?;

        // Tallest layer first so each band stays visible in its own color.
        for k in (0..cols).rev() {
            let color = palette_color(k);
            let band: Vec<(f64, f64)> = xs.iter().zip(&layers[k]).map(|(x, y)| (*x, *y)).collect();
            chart
                .draw_series(
                    AreaSeries::new(band, 0.0, color.filled())
                        .border_style(color.stroke_width(1)),
                )
                .map_err(backend)?
                .label(&matrix.col_labels[k])
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.85))
            .draw()
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }
}

fn labels_of(table: &AggregateTable) -> Vec<String> {
    table.rows.iter().map(|r| r.label.clone()).collect()
}

/// Tick text for integer positions, blank elsewhere.
fn tick_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels
        .get(rounded as usize)
        .cloned()
        .unwrap_or_default()
}

/// Upper axis bound with a little headroom.
fn axis_max(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn backend<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Backend(err.to_string())
}
