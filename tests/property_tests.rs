//! Property-based tests for the cleaning, binning and ranking invariants.

use polars::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

use estatelens::data::{BinEdges, Enricher, TableCleaner};
use estatelens::stats::{AggregateTable, BinnedDistribution};

/// Distinct labels with positive group sizes.
fn label_counts() -> impl Strategy<Value = Vec<(String, usize)>> {
    prop::collection::btree_map("[a-z]{1,8}", 1..40usize, 1..12)
        .prop_map(|groups| groups.into_iter().collect())
}

/// Finite samples for the binning properties.
fn samples() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6..1.0e6f64, 1..200)
}

fn key_frame(groups: &[(String, usize)]) -> DataFrame {
    let mut cells: Vec<String> = Vec::new();
    for (label, count) in groups {
        for _ in 0..*count {
            cells.push(label.clone());
        }
    }
    DataFrame::new(vec![Column::new("k".into(), cells)]).expect("build key frame")
}

proptest! {
    /// Relative frequencies always sum to one and the cumulative column is
    /// non-decreasing, ending at one, whatever the group sizes.
    #[test]
    fn frequencies_are_a_distribution(groups in label_counts()) {
        let table = AggregateTable::count_by(&key_frame(&groups), "k")
            .expect("count_by")
            .with_frequencies()
            .expect("with_frequencies");

        let total: f64 = table
            .rows
            .iter()
            .map(|r| r.relative_frequency.expect("filled in"))
            .sum();
        prop_assert!((total - 1.0).abs() < 1e-9);

        let mut previous = 0.0;
        for row in &table.rows {
            let cumulative = row.cumulative_frequency.expect("filled in");
            prop_assert!(cumulative + 1e-12 >= previous);
            previous = cumulative;
        }
        prop_assert!((previous - 1.0).abs() < 1e-9);

        for pair in table.rows.windows(2) {
            prop_assert!(pair[0].metric >= pair[1].metric);
        }
    }

    /// Every observed value gets a bin index inside the edge range and the
    /// maximum always lands in the last bin.
    #[test]
    fn binning_covers_every_value(values in samples(), bins in 1..12usize) {
        let edges = BinEdges::equal_width(&values, bins).expect("non-empty input");

        for value in &values {
            prop_assert!(edges.index_of(*value) < edges.count());
        }

        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        prop_assert_eq!(edges.index_of(max), edges.count() - 1);
    }

    /// Edges are a pure function of the observed values.
    #[test]
    fn binning_is_deterministic(values in samples(), bins in 1..12usize) {
        let first = BinEdges::equal_width(&values, bins).expect("non-empty input");
        let second = BinEdges::equal_width(&values, bins).expect("non-empty input");
        prop_assert_eq!(first.intervals(), second.intervals());
    }

    /// Cleaning a categorical column whose values all lie in the dictionary
    /// introduces no nulls and reports nothing unmapped.
    #[test]
    fn in_domain_categoricals_survive_cleaning(
        entities in prop::collection::vec(
            prop_oneof![
                Just("Individual"),
                Just("individual"),
                Just("Firm"),
                Just("Business"),
                Just("COMPANY"),
            ],
            1..30,
        )
    ) {
        let n = entities.len();
        let ids: Vec<String> = (0..n).map(|i| format!("C{i:04}")).collect();
        let df = DataFrame::new(vec![
            Column::new("customer_ID".into(), ids),
            Column::new("entity".into(), entities.clone()),
            Column::new("name".into(), vec!["Ana"; n]),
            Column::new("surname".into(), vec!["Silva"; n]),
            Column::new("sex".into(), vec!["F"; n]),
            Column::new("birth_date".into(), vec!["1980-06-15"; n]),
            Column::new("purpose".into(), vec!["Home"; n]),
            Column::new("source".into(), vec!["Agency"; n]),
            Column::new("mortgage".into(), vec!["yes"; n]),
            Column::new("date_of_sale".into(), vec!["2006-06-15"; n]),
        ])
        .expect("build customers frame");

        let (cleaned, report) = TableCleaner::clean_customers(&df).expect("clean");
        prop_assert!(report.unmapped.is_empty());
        prop_assert_eq!(cleaned.column("entity").expect("entity").null_count(), 0);
    }

    /// Age is null exactly when the birth date is missing, and equals the
    /// calendar-year difference when both dates share month and day.
    #[test]
    fn age_rules_hold(
        rows in prop::collection::vec(
            (any::<bool>(), 1940..2000i32, 2001..2020i32),
            1..30,
        )
    ) {
        let births: Vec<Option<String>> = rows
            .iter()
            .map(|(has_birth, birth_year, _)| {
                has_birth.then(|| format!("{birth_year}-06-15"))
            })
            .collect();
        let sales: Vec<Option<String>> = rows
            .iter()
            .map(|(_, _, sale_year)| Some(format!("{sale_year}-06-15")))
            .collect();
        let n = rows.len();
        let df = DataFrame::new(vec![
            Column::new("name".into(), vec!["Ana"; n]),
            Column::new("surname".into(), vec!["Silva"; n]),
            Column::new("birth_date".into(), births),
            Column::new("date_of_sale".into(), sales),
        ])
        .expect("build frame");

        let (enriched, report) = Enricher::enrich_customers(&df, 5).expect("enrich");
        prop_assert_eq!(report.negative_date_spans, 0);

        let ages = enriched.column("age_at_purchase").expect("ages").i64().expect("i64");
        for (i, (has_birth, birth_year, sale_year)) in rows.iter().enumerate() {
            match ages.get(i) {
                Some(age) => {
                    prop_assert!(*has_birth);
                    prop_assert_eq!(age, i64::from(sale_year - birth_year));
                }
                None => prop_assert!(!has_birth),
            }
        }
    }

    /// The price_group column and the binned distribution describe the same
    /// buckets: tallying rows per group label reproduces the interval counts.
    #[test]
    fn price_buckets_match_the_distribution(values in samples()) {
        let df = DataFrame::new(vec![Column::new(
            "price_in_dollars".into(),
            values.clone(),
        )])
        .expect("build price frame");

        let enriched = Enricher::enrich_properties(&df, 10).expect("enrich");
        let dist = BinnedDistribution::from_column(&df, "price_in_dollars", 10)
            .expect("bin the column");

        let groups = enriched
            .column("price_group")
            .expect("price_group")
            .str()
            .expect("labels");
        let mut from_rows: BTreeMap<String, usize> = BTreeMap::new();
        for label in groups.into_iter() {
            let label = label.expect("finite prices always land in a bucket");
            *from_rows.entry(label.to_string()).or_insert(0) += 1;
        }

        // Adjacent intervals can round to the same label, so sum per label.
        let mut from_bins: BTreeMap<String, usize> = BTreeMap::new();
        for (interval, count) in dist.intervals.iter().zip(&dist.counts) {
            if *count > 0 {
                *from_bins.entry(interval.label()).or_insert(0) += count;
            }
        }

        prop_assert_eq!(dist.counts.iter().sum::<usize>(), values.len());
        prop_assert_eq!(from_rows, from_bins);
    }
}
