//! Export Module
//! Writes aggregate tables as CSV files, formats them as console tables and
//! assembles the textual run summary.

use polars::prelude::*;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::pipeline::RunSummary;
use crate::stats::AggregateTable;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct TableExporter;

impl TableExporter {
    /// Write an aggregate table as a CSV file next to the charts. Frequency
    /// columns are included only when the table carries them.
    pub fn write_csv(
        table: &AggregateTable,
        out_dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf, ExportError> {
        let mut df = Self::to_frame(table)?;
        let path = out_dir.join(file_name);
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_float_precision(Some(6))
            .finish(&mut df)?;
        info!(path = %path.display(), rows = table.rows.len(), "aggregate table written");
        Ok(path)
    }

    /// View an aggregate table as a DataFrame, for CSV export. Count tables
    /// skip the metric column, which would just repeat the counts.
    pub fn to_frame(table: &AggregateTable) -> Result<DataFrame, ExportError> {
        let labels: Vec<String> = table.rows.iter().map(|r| r.label.clone()).collect();
        let counts: Vec<i64> = table.rows.iter().map(|r| r.count as i64).collect();

        let mut columns = vec![
            Column::new(table.key.clone().into(), labels),
            Column::new("count".into(), counts),
        ];
        if table.metric != "count" {
            let metrics: Vec<f64> = table.rows.iter().map(|r| r.metric).collect();
            columns.push(Column::new(table.metric.clone().into(), metrics));
        }
        if table.rows.iter().all(|r| r.relative_frequency.is_some()) {
            columns.push(Column::new(
                "relative_frequency".into(),
                table
                    .rows
                    .iter()
                    .map(|r| r.relative_frequency)
                    .collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                "cumulative_frequency".into(),
                table
                    .rows
                    .iter()
                    .map(|r| r.cumulative_frequency)
                    .collect::<Vec<_>>(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Aligned text rendering of an aggregate table for the console.
    pub fn format_table(table: &AggregateTable) -> String {
        let label_width = table
            .rows
            .iter()
            .map(|r| r.label.len())
            .chain([table.key.len()])
            .max()
            .unwrap_or(8);
        let with_frequencies = table.rows.iter().all(|r| r.relative_frequency.is_some());
        let with_metric = table.metric != "count";

        let mut out = String::new();
        let _ = write!(out, "{:<label_width$}  {:>8}", table.key, "count");
        if with_metric {
            let _ = write!(out, "  {:>16}", table.metric);
        }
        if with_frequencies {
            let _ = write!(out, "  {:>10}  {:>10}", "rel_freq", "cum_freq");
        }
        out.push('\n');

        for row in &table.rows {
            let _ = write!(out, "{:<label_width$}  {:>8}", row.label, row.count);
            if with_metric {
                let _ = write!(out, "  {:>16.4}", row.metric);
            }
            if let (Some(rel), Some(cum)) = (row.relative_frequency, row.cumulative_frequency) {
                let _ = write!(out, "  {:>10.4}  {:>10.4}", rel, cum);
            }
            out.push('\n');
        }
        out
    }

    /// Print an aggregate table to the console.
    pub fn print(table: &AggregateTable) {
        println!("\n{}", Self::format_table(table));
    }

    /// Write the prose summary of a run.
    pub fn write_summary(summary: &RunSummary, out_dir: &Path) -> Result<PathBuf, ExportError> {
        let mut text = String::new();
        text.push_str("Real-estate transactions analysis\n");
        text.push_str("=================================\n\n");

        for report in [&summary.properties_cleaning, &summary.customers_cleaning] {
            let _ = writeln!(
                text,
                "{}: {} rows, {} cells nulled during cleaning",
                report.table,
                report.rows,
                report.nulled_cells()
            );
            for (column, count) in &report.malformed {
                let _ = writeln!(text, "  malformed {column}: {count}");
            }
            for (column, count) in &report.unmapped {
                let _ = writeln!(text, "  outside dictionary {column}: {count}");
            }
            for (column, count) in &report.inconsistent {
                let _ = writeln!(text, "  inconsistent {column}: {count}");
            }
            if report.duplicate_ids > 0 {
                let _ = writeln!(text, "  duplicate identifiers: {}", report.duplicate_ids);
            }
        }
        let _ = writeln!(
            text,
            "enrichment: {} rows without computable age, {} reversed date spans",
            summary.enrichment.missing_dates, summary.enrichment.negative_date_spans
        );

        for line in &summary.highlights {
            let _ = writeln!(text, "\n{line}");
        }

        for table in &summary.tables {
            let _ = writeln!(text, "\n{}", Self::format_table(table));
        }

        match summary.area_price_covariance {
            Some(value) => {
                let _ = writeln!(text, "area/price population covariance: {value:.4}");
            }
            None => {
                let _ = writeln!(text, "area/price population covariance: undefined");
            }
        }
        match summary.area_price_correlation {
            Some(value) => {
                let _ = writeln!(text, "area/price correlation: {value:.4}");
            }
            None => {
                let _ = writeln!(text, "area/price correlation: undefined");
            }
        }
        if let Some(note) = &summary.correlation_note {
            let _ = writeln!(text, "  ({note})");
        }

        let path = out_dir.join("summary.txt");
        fs::write(&path, text)?;
        info!(path = %path.display(), "summary written");
        Ok(path)
    }

    /// Machine-readable counterpart of the summary.
    pub fn write_summary_json(
        summary: &RunSummary,
        out_dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let path = out_dir.join("summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AggregateTable;

    fn table() -> AggregateTable {
        let df = DataFrame::new(vec![Column::new(
            "country".into(),
            vec!["USA", "USA", "Canada"],
        )])
        .unwrap();
        AggregateTable::count_by(&df, "country").unwrap()
    }

    #[test]
    fn csv_has_key_and_count_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = TableExporter::write_csv(&table(), dir.path(), "by_country.csv").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("country,count"));
        assert_eq!(lines.next(), Some("Canada,1"));
        assert_eq!(lines.next(), Some("USA,2"));
    }

    #[test]
    fn mean_tables_carry_the_metric_column() {
        let dir = tempfile::tempdir().unwrap();
        let df = DataFrame::new(vec![
            Column::new("country".into(), vec!["USA", "USA"]),
            Column::new("price".into(), vec![100.0, 200.0]),
        ])
        .unwrap();
        let means =
            AggregateTable::reduce_by(&df, "country", "price", crate::stats::Reduce::Mean).unwrap();
        let path = TableExporter::write_csv(&means, dir.path(), "means.csv").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("country,count,mean(price)"));
        assert_eq!(lines.next(), Some("USA,2,150.000000"));
    }

    #[test]
    fn ranked_tables_carry_frequency_columns() {
        let dir = tempfile::tempdir().unwrap();
        let ranked = table().with_frequencies().unwrap();
        let path = TableExporter::write_csv(&ranked, dir.path(), "ranked.csv").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "country,count,relative_frequency,cumulative_frequency"
        );
        let first = contents.lines().nth(1).unwrap();
        assert!(first.starts_with("USA,2,0.666667,0.666667"));
    }

    #[test]
    fn text_table_is_aligned_and_complete() {
        let text = TableExporter::format_table(&table());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("country"));
        assert!(lines[1].starts_with("Canada"));
        assert!(lines[2].starts_with("USA"));
        // All rows render to the same width.
        assert_eq!(lines[1].len(), lines[2].len());
    }
}
