//! Data Enricher Module
//! Derives new columns from cleaned tables: merged names, age at purchase,
//! sale year and equal-width interval buckets.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// What the enricher had to leave undefined.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentReport {
    /// Rows where birth date or sale date was null, so no age was computed.
    pub missing_dates: usize,
    /// Rows where the sale predates the birth date. Age stays null.
    pub negative_date_spans: usize,
}

/// Equal-width bin layout over an observed value range.
///
/// The layout is fully determined by (min, max, count), so the same input
/// distribution always reproduces the same boundaries. The upper edge of the
/// last bin is inclusive so the maximum lands in a bin. When every value is
/// identical the range collapses to a single bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinEdges {
    lower: f64,
    width: f64,
    count: usize,
}

/// One contiguous interval of a bin layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// Stable textual form used as a grouping label and axis tick.
    pub fn label(&self) -> String {
        format!("{:.1}-{:.1}", self.lower, self.upper)
    }
}

impl BinEdges {
    /// Lay `count` equal-width bins over the observed values. Returns None
    /// when there is nothing to bin.
    pub fn equal_width(values: &[f64], count: usize) -> Option<Self> {
        if values.is_empty() || count == 0 {
            return None;
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            return Some(Self {
                lower: min,
                width: 0.0,
                count: 1,
            });
        }
        Some(Self {
            lower: min,
            width: (max - min) / count as f64,
            count,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Bin index for a value, clamped into the layout's range.
    pub fn index_of(&self, value: f64) -> usize {
        if self.width <= 0.0 {
            return 0;
        }
        let offset = ((value - self.lower) / self.width).floor();
        (offset.max(0.0) as usize).min(self.count - 1)
    }

    pub fn interval(&self, index: usize) -> Interval {
        Interval {
            index,
            lower: self.lower + self.width * index as f64,
            upper: self.lower + self.width * (index + 1) as f64,
        }
    }

    /// All intervals of the layout in ascending order.
    pub fn intervals(&self) -> Vec<Interval> {
        (0..self.count).map(|i| self.interval(i)).collect()
    }

    pub fn label_of(&self, value: f64) -> String {
        self.interval(self.index_of(value)).label()
    }
}

/// Derivation passes over the cleaned tables.
pub struct Enricher;

impl Enricher {
    /// Enrich the customers table: merge name/surname into full_name, derive
    /// age_at_purchase, sale_year and age_group, drop the merged columns.
    pub fn enrich_customers(
        df: &DataFrame,
        age_bins: usize,
    ) -> Result<(DataFrame, EnrichmentReport), EnrichError> {
        let mut report = EnrichmentReport::default();

        let names = df.column("name")?.str()?;
        let surnames = df.column("surname")?.str()?;
        let births = df.column("birth_date")?.str()?;
        let sales = df.column("date_of_sale")?.str()?;

        let mut full_names: Vec<Option<String>> = Vec::with_capacity(df.height());
        let mut ages: Vec<Option<i64>> = Vec::with_capacity(df.height());
        let mut years: Vec<Option<i64>> = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            full_names.push(merge_name(names.get(i), surnames.get(i)));

            let birth = births.get(i).and_then(iso_date);
            let sale = sales.get(i).and_then(iso_date);
            years.push(sale.map(|d| i64::from(d.year())));
            ages.push(match (birth, sale) {
                (Some(b), Some(s)) => {
                    let days = (s - b).num_days();
                    if days < 0 {
                        warn!(row = i, "date of sale predates birth date");
                        report.negative_date_spans += 1;
                        None
                    } else {
                        // Calendar years approximated as 365 days; the
                        // boundaries are part of the output contract.
                        Some(days / 365)
                    }
                }
                _ => {
                    report.missing_dates += 1;
                    None
                }
            });
        }

        let observed: Vec<f64> = ages.iter().flatten().map(|a| *a as f64).collect();
        let age_groups: Vec<Option<String>> = match BinEdges::equal_width(&observed, age_bins) {
            Some(edges) => ages
                .iter()
                .map(|age| age.map(|a| edges.label_of(a as f64)))
                .collect(),
            None => vec![None; ages.len()],
        };

        let mut out = df.drop("name")?.drop("surname")?;
        out.with_column(Column::new("full_name".into(), full_names))?;
        out.with_column(Column::new("age_at_purchase".into(), ages))?;
        out.with_column(Column::new("age_group".into(), age_groups))?;
        out.with_column(Column::new("sale_year".into(), years))?;

        Ok((out, report))
    }

    /// Enrich the properties table with a price_group interval bucket.
    pub fn enrich_properties(df: &DataFrame, price_bins: usize) -> Result<DataFrame, EnrichError> {
        let prices = df.column("price_in_dollars")?.f64()?;
        let observed: Vec<f64> = prices.into_iter().flatten().collect();

        let groups: Vec<Option<String>> = match BinEdges::equal_width(&observed, price_bins) {
            Some(edges) => prices
                .into_iter()
                .map(|price| price.map(|p| edges.label_of(p)))
                .collect(),
            None => vec![None; df.height()],
        };

        let mut out = df.clone();
        out.with_column(Column::new("price_group".into(), groups))?;
        Ok(out)
    }
}

fn merge_name(name: Option<&str>, surname: Option<&str>) -> Option<String> {
    match (name, surname) {
        (Some(n), Some(s)) => Some(format!("{n} {s}")),
        (Some(n), None) => Some(n.to_string()),
        (None, Some(s)) => Some(s.to_string()),
        (None, None) => None,
    }
}

fn iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers(birth: &[Option<&str>], sale: &[Option<&str>]) -> DataFrame {
        let n = birth.len();
        DataFrame::new(vec![
            Column::new(
                "customer_ID".into(),
                (0..n).map(|i| format!("C{i}")).collect::<Vec<_>>(),
            ),
            Column::new("name".into(), vec![Some("Ada"); n]),
            Column::new("surname".into(), vec![Some("Lang"); n]),
            Column::new("birth_date".into(), birth.to_vec()),
            Column::new("date_of_sale".into(), sale.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn thirty_year_span_gives_age_thirty() {
        let df = customers(&[Some("1980-01-01")], &[Some("2010-01-01")]);
        let (out, report) = Enricher::enrich_customers(&df, 5).unwrap();
        let ages = out.column("age_at_purchase").unwrap().i64().unwrap();
        assert_eq!(ages.get(0), Some(30));
        assert_eq!(report.missing_dates, 0);
        assert_eq!(report.negative_date_spans, 0);
    }

    #[test]
    fn age_is_null_when_either_date_is_null() {
        let df = customers(
            &[None, Some("1975-06-01")],
            &[Some("2008-02-01"), None],
        );
        let (out, report) = Enricher::enrich_customers(&df, 5).unwrap();
        let ages = out.column("age_at_purchase").unwrap().i64().unwrap();
        assert_eq!(ages.get(0), None);
        assert_eq!(ages.get(1), None);
        assert_eq!(report.missing_dates, 2);
    }

    #[test]
    fn reversed_dates_are_flagged_not_negative() {
        let df = customers(&[Some("1990-05-01")], &[Some("1985-01-01")]);
        let (out, report) = Enricher::enrich_customers(&df, 5).unwrap();
        let ages = out.column("age_at_purchase").unwrap().i64().unwrap();
        assert_eq!(ages.get(0), None);
        assert_eq!(report.negative_date_spans, 1);
    }

    #[test]
    fn name_and_surname_merge_then_disappear() {
        let df = customers(&[Some("1980-01-01")], &[Some("2010-01-01")]);
        let (out, _) = Enricher::enrich_customers(&df, 5).unwrap();
        let full = out.column("full_name").unwrap().str().unwrap();
        assert_eq!(full.get(0), Some("Ada Lang"));
        assert!(out.column("name").is_err());
        assert!(out.column("surname").is_err());
    }

    #[test]
    fn sale_year_is_extracted() {
        let df = customers(&[Some("1980-01-01")], &[Some("2007-09-12")]);
        let (out, _) = Enricher::enrich_customers(&df, 5).unwrap();
        let years = out.column("sale_year").unwrap().i64().unwrap();
        assert_eq!(years.get(0), Some(2007));
    }

    #[test]
    fn equal_width_bins_are_deterministic() {
        let values = [20.0, 30.0, 40.0, 50.0, 60.0];
        let edges = BinEdges::equal_width(&values, 5).unwrap();
        assert_eq!(edges.count(), 5);
        assert_eq!(edges.interval(0).label(), "20.0-28.0");
        assert_eq!(edges.interval(4).label(), "52.0-60.0");
        // Maximum is inclusive in the last bin.
        assert_eq!(edges.index_of(60.0), 4);
        assert_eq!(edges.index_of(20.0), 0);
        assert_eq!(edges.index_of(28.0), 1);
    }

    #[test]
    fn identical_values_collapse_to_one_bin() {
        let edges = BinEdges::equal_width(&[7.0, 7.0, 7.0], 5).unwrap();
        assert_eq!(edges.count(), 1);
        assert_eq!(edges.index_of(7.0), 0);
    }

    #[test]
    fn price_groups_land_in_ten_bins() {
        let prices: Vec<Option<f64>> = (0..20).map(|i| Some(100_000.0 + 10_000.0 * i as f64)).collect();
        let df = DataFrame::new(vec![
            Column::new("ID".into(), (0..20).map(|i| format!("P{i}")).collect::<Vec<_>>()),
            Column::new("price_in_dollars".into(), prices),
        ])
        .unwrap();
        let out = Enricher::enrich_properties(&df, 10).unwrap();
        let groups = out.column("price_group").unwrap().str().unwrap();
        assert_eq!(groups.get(0), Some("100000.0-119000.0"));
        assert_eq!(groups.get(19), Some("271000.0-290000.0"));
    }

    #[test]
    fn all_null_prices_leave_groups_null() {
        let df = DataFrame::new(vec![
            Column::new("ID".into(), vec!["P1", "P2"]),
            Column::new("price_in_dollars".into(), vec![None::<f64>, None]),
        ])
        .unwrap();
        let out = Enricher::enrich_properties(&df, 10).unwrap();
        assert_eq!(out.column("price_group").unwrap().null_count(), 2);
    }
}
