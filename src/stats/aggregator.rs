//! Aggregator Module
//! Group-by reductions, frequency tables and crosstabs over cleaned tables.

use indexmap::IndexMap;
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use thiserror::Error;

use crate::data::BinEdges;
use crate::data::Interval;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("column {0:?} has no usable values")]
    EmptyColumn(String),
    #[error("cannot compute frequencies: total of {metric:?} is not positive")]
    UndefinedFrequency { metric: String },
}

/// Reduction applied to a numeric column within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reduce {
    Mean,
    Sum,
}

impl Reduce {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reduce::Mean => values.mean(),
            Reduce::Sum => values.iter().sum(),
        }
    }

    fn describe(self, column: &str) -> String {
        match self {
            Reduce::Mean => format!("mean({column})"),
            Reduce::Sum => format!("sum({column})"),
        }
    }
}

/// One group of an aggregate table.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRow {
    pub label: String,
    pub count: usize,
    pub metric: f64,
    pub relative_frequency: Option<f64>,
    pub cumulative_frequency: Option<f64>,
}

/// Result of a group-by reduction. Rows come out sorted by label; calling
/// [`AggregateTable::with_frequencies`] re-sorts them into ranking order and
/// fills in the frequency columns.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateTable {
    pub key: String,
    pub metric: String,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    /// Count rows per value of `key`. Rows with a null key are skipped.
    pub fn count_by(df: &DataFrame, key: &str) -> Result<Self, StatsError> {
        let key_column = df.column(key)?;
        let mut groups: IndexMap<String, usize> = IndexMap::new();

        for i in 0..df.height() {
            if let Some(label) = label_at(key_column, i) {
                *groups.entry(label).or_insert(0) += 1;
            }
        }
        if groups.is_empty() {
            return Err(StatsError::EmptyColumn(key.to_string()));
        }

        let mut rows: Vec<AggregateRow> = groups
            .into_iter()
            .map(|(label, count)| AggregateRow {
                label,
                count,
                metric: count as f64,
                relative_frequency: None,
                cumulative_frequency: None,
            })
            .collect();
        rows.sort_by(|a, b| compare_labels(&a.label, &b.label));

        Ok(Self {
            key: key.to_string(),
            metric: "count".to_string(),
            rows,
        })
    }

    /// Reduce a numeric column per value of `key`. Rows with a null key or a
    /// null value do not contribute, so every group holds at least one value
    /// and the reduction is always defined.
    pub fn reduce_by(
        df: &DataFrame,
        key: &str,
        value: &str,
        reduce: Reduce,
    ) -> Result<Self, StatsError> {
        let key_column = df.column(key)?;
        let values_f64 = df.column(value)?.cast(&DataType::Float64)?;
        let values = values_f64.f64()?;

        let mut groups: IndexMap<String, Vec<f64>> = IndexMap::new();
        for i in 0..df.height() {
            if let (Some(label), Some(v)) = (label_at(key_column, i), values.get(i)) {
                if !v.is_nan() {
                    groups.entry(label).or_default().push(v);
                }
            }
        }
        if groups.is_empty() {
            return Err(StatsError::EmptyColumn(value.to_string()));
        }

        let mut rows: Vec<AggregateRow> = groups
            .into_iter()
            .map(|(label, group_values)| AggregateRow {
                label,
                count: group_values.len(),
                metric: reduce.apply(&group_values),
                relative_frequency: None,
                cumulative_frequency: None,
            })
            .collect();
        rows.sort_by(|a, b| compare_labels(&a.label, &b.label));

        Ok(Self {
            key: key.to_string(),
            metric: reduce.describe(value),
            rows,
        })
    }

    /// Fill in relative and cumulative frequency. Rows are re-sorted
    /// descending by metric, ties broken by label ascending, so repeated runs
    /// rank identically. Errors when the metric total is not positive.
    pub fn with_frequencies(mut self) -> Result<Self, StatsError> {
        let total: f64 = self.rows.iter().map(|r| r.metric).sum();
        if total <= 0.0 {
            return Err(StatsError::UndefinedFrequency {
                metric: self.metric.clone(),
            });
        }

        self.rows.sort_by(|a, b| {
            b.metric
                .partial_cmp(&a.metric)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });

        let mut running = 0.0;
        for row in &mut self.rows {
            let share = row.metric / total;
            running += share;
            row.relative_frequency = Some(share);
            row.cumulative_frequency = Some(running);
        }
        Ok(self)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    pub fn metrics(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.metric).collect()
    }
}

/// Equal-width frequency distribution of one numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct BinnedDistribution {
    pub intervals: Vec<Interval>,
    pub counts: Vec<usize>,
}

impl BinnedDistribution {
    /// Bin the non-null values of a column into `bins` equal-width intervals.
    pub fn from_column(df: &DataFrame, column: &str, bins: usize) -> Result<Self, StatsError> {
        let values_f64 = df.column(column)?.cast(&DataType::Float64)?;
        let observed: Vec<f64> = values_f64
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();

        let edges = BinEdges::equal_width(&observed, bins)
            .ok_or_else(|| StatsError::EmptyColumn(column.to_string()))?;
        let mut counts = vec![0usize; edges.count()];
        for value in &observed {
            counts[edges.index_of(*value)] += 1;
        }

        Ok(Self {
            intervals: edges.intervals(),
            counts,
        })
    }

    /// View the distribution as an aggregate table keyed by interval label,
    /// with frequency columns filled in.
    pub fn frequency_table(&self, key: &str) -> Result<AggregateTable, StatsError> {
        let rows = self
            .intervals
            .iter()
            .zip(&self.counts)
            .map(|(interval, count)| AggregateRow {
                label: interval.label(),
                count: *count,
                metric: *count as f64,
                relative_frequency: None,
                cumulative_frequency: None,
            })
            .collect();

        AggregateTable {
            key: key.to_string(),
            metric: "count".to_string(),
            rows,
        }
        .with_frequencies()
    }
}

/// Row-by-column count matrix for two categorical keys.
#[derive(Debug, Clone, Serialize)]
pub struct Crosstab {
    pub row_key: String,
    pub col_key: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// counts[row][col], aligned with the label vectors.
    pub counts: Vec<Vec<usize>>,
}

impl Crosstab {
    /// Count rows per (row_key, col_key) pair. Rows where either key is null
    /// are skipped. Labels come out sorted ascending on both axes.
    pub fn count(df: &DataFrame, row_key: &str, col_key: &str) -> Result<Self, StatsError> {
        let rows_column = df.column(row_key)?;
        let cols_column = df.column(col_key)?;

        let mut pairs: IndexMap<(String, String), usize> = IndexMap::new();
        for i in 0..df.height() {
            if let (Some(row), Some(col)) = (label_at(rows_column, i), label_at(cols_column, i)) {
                *pairs.entry((row, col)).or_insert(0) += 1;
            }
        }
        if pairs.is_empty() {
            return Err(StatsError::EmptyColumn(row_key.to_string()));
        }

        let mut row_labels: Vec<String> = Vec::new();
        let mut col_labels: Vec<String> = Vec::new();
        for (row, col) in pairs.keys() {
            if !row_labels.contains(row) {
                row_labels.push(row.clone());
            }
            if !col_labels.contains(col) {
                col_labels.push(col.clone());
            }
        }
        row_labels.sort_by(|a, b| compare_labels(a, b));
        col_labels.sort_by(|a, b| compare_labels(a, b));

        let mut counts = vec![vec![0usize; col_labels.len()]; row_labels.len()];
        for ((row, col), n) in &pairs {
            let r = row_labels.iter().position(|l| l == row).unwrap_or(0);
            let c = col_labels.iter().position(|l| l == col).unwrap_or(0);
            counts[r][c] = *n;
        }

        Ok(Self {
            row_key: row_key.to_string(),
            col_key: col_key.to_string(),
            row_labels,
            col_labels,
            counts,
        })
    }

    /// Total count per row label.
    pub fn row_totals(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }
}

/// Grouping label of a cell, for string and numeric key columns alike.
fn label_at(column: &Column, i: usize) -> Option<String> {
    let value = column.get(i).ok()?;
    if value.is_null() {
        None
    } else {
        Some(value.to_string().trim_matches('"').to_string())
    }
}

/// Label ordering that keeps numeric-looking labels (years, building
/// numbers, interval bounds) in numeric order instead of lexicographic.
fn compare_labels(a: &str, b: &str) -> Ordering {
    match (leading_number(a), leading_number(b)) {
        (Some(x), Some(y)) => x
            .partial_cmp(&y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn leading_number(label: &str) -> Option<f64> {
    label
        .split(['-', ' '])
        .next()
        .and_then(|head| head.parse::<f64>().ok())
}
