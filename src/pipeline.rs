//! Pipeline Module
//! One linear pass over the two input tables: load, clean, enrich,
//! aggregate, render charts, export tables.

use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::charts::{ChartError, ChartInput, ChartKind, ChartRenderer, ChartSpec};
use crate::data::{
    CleanError, CleaningReport, EnrichError, EnrichmentReport, Enricher, LoaderError,
    TableCleaner, TableLoader, CUSTOMER_COLUMNS, PROPERTY_COLUMNS,
};
use crate::export::{ExportError, TableExporter};
use crate::stats::{
    complete_cases, pearson_correlation, population_covariance, AggregateTable,
    BinnedDistribution, Crosstab, Reduce, StatsError,
};

/// Equal-width buckets for customer ages.
pub const AGE_BINS: usize = 5;
/// Equal-width buckets for property prices.
pub const PRICE_BINS: usize = 10;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("load failed: {0}")]
    Load(#[from] LoaderError),
    #[error("cleaning failed: {0}")]
    Clean(#[from] CleanError),
    #[error("enrichment failed: {0}")]
    Enrich(#[from] EnrichError),
    #[error("aggregation failed: {0}")]
    Stats(#[from] StatsError),
    #[error("chart rendering failed: {0}")]
    Chart(#[from] ChartError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Where to read the input tables and where to put the artifacts.
#[derive(Debug, Clone)]
pub struct AnalysisPaths {
    pub properties: PathBuf,
    pub customers: PathBuf,
    pub out_dir: PathBuf,
}

impl AnalysisPaths {
    pub fn new(properties: &Path, customers: &Path, out_dir: &Path) -> Self {
        Self {
            properties: properties.to_path_buf(),
            customers: customers.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
        }
    }
}

/// Everything a run produced, for the summary artifacts and the caller.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub properties_cleaning: CleaningReport,
    pub customers_cleaning: CleaningReport,
    pub enrichment: EnrichmentReport,
    pub highlights: Vec<String>,
    pub tables: Vec<AggregateTable>,
    pub area_price_covariance: Option<f64>,
    pub area_price_correlation: Option<f64>,
    pub correlation_note: Option<String>,
    pub charts: Vec<PathBuf>,
    pub exports: Vec<PathBuf>,
}

/// Run the whole analysis once. Stages hand each other immutable tables;
/// nothing is retained between runs, so a rerun over the same inputs
/// reproduces every artifact byte for byte.
pub fn run(paths: &AnalysisPaths) -> Result<RunSummary, PipelineError> {
    fs::create_dir_all(&paths.out_dir)?;

    let raw_properties = TableLoader::load_with_columns(&paths.properties, &PROPERTY_COLUMNS)?;
    let raw_customers = TableLoader::load_with_columns(&paths.customers, &CUSTOMER_COLUMNS)?;

    let (properties, properties_cleaning) = TableCleaner::clean_properties(&raw_properties)?;
    let (customers, customers_cleaning) = TableCleaner::clean_customers(&raw_customers)?;
    info!(
        properties_nulled = properties_cleaning.nulled_cells(),
        customers_nulled = customers_cleaning.nulled_cells(),
        "tables cleaned"
    );

    let properties = Enricher::enrich_properties(&properties, PRICE_BINS)?;
    let (customers, enrichment) = Enricher::enrich_customers(&customers, AGE_BINS)?;
    info!(
        missing_dates = enrichment.missing_dates,
        reversed_spans = enrichment.negative_date_spans,
        "tables enriched"
    );

    let mut charts: Vec<PathBuf> = Vec::new();
    let mut exports: Vec<PathBuf> = Vec::new();

    // Mean deal satisfaction per country, as a bar chart.
    let satisfaction =
        AggregateTable::reduce_by(&properties, "country", "deal_satisfaction", Reduce::Mean)?;
    charts.push(ChartRenderer::render(
        &ChartInput::Table(&satisfaction),
        &ChartSpec::new(
            ChartKind::Bar,
            "Average deal satisfaction by country",
            "Country",
            "Mean satisfaction",
            "satisfaction_by_country.png",
        ),
        &paths.out_dir,
    )?);
    exports.push(TableExporter::write_csv(
        &satisfaction,
        &paths.out_dir,
        "satisfaction_by_country.csv",
    )?);

    // Sold listings per country, ranked, as a dual-axis Pareto chart.
    let sold_only = properties
        .clone()
        .lazy()
        .filter(col("sold").eq(lit(true)))
        .collect()?;
    let sold_by_country = AggregateTable::count_by(&sold_only, "country")?.with_frequencies()?;
    charts.push(ChartRenderer::render(
        &ChartInput::Table(&sold_by_country),
        &ChartSpec::new(
            ChartKind::Pareto,
            "Sold listings by country",
            "Country",
            "Sold listings",
            "sold_by_country_pareto.png",
        ),
        &paths.out_dir,
    )?);
    exports.push(TableExporter::write_csv(
        &sold_by_country,
        &paths.out_dir,
        "sold_by_country.csv",
    )?);

    // Price distribution over equal-width intervals, as a histogram.
    let price_distribution =
        BinnedDistribution::from_column(&properties, "price_in_dollars", PRICE_BINS)?;
    let price_bins = price_distribution.frequency_table("price_group")?;
    charts.push(ChartRenderer::render(
        &ChartInput::Distribution(&price_distribution),
        &ChartSpec::new(
            ChartKind::Histogram,
            "Price distribution",
            "Price interval (USD)",
            "Listings",
            "price_distribution.png",
        ),
        &paths.out_dir,
    )?);
    exports.push(TableExporter::write_csv(
        &price_bins,
        &paths.out_dir,
        "price_bins.csv",
    )?);

    // Purchases per sale year, as a line chart.
    let sales_by_year = AggregateTable::count_by(&customers, "sale_year")?;
    charts.push(ChartRenderer::render(
        &ChartInput::Table(&sales_by_year),
        &ChartSpec::new(
            ChartKind::Line,
            "Purchases per year",
            "Year",
            "Purchases",
            "sales_by_year.png",
        ),
        &paths.out_dir,
    )?);
    exports.push(TableExporter::write_csv(
        &sales_by_year,
        &paths.out_dir,
        "sales_by_year.csv",
    )?);

    // Purchases per year split by age group, as a stacked area chart.
    let year_by_age = Crosstab::count(&customers, "sale_year", "age_group")?;
    charts.push(ChartRenderer::render(
        &ChartInput::Matrix(&year_by_age),
        &ChartSpec::new(
            ChartKind::StackedArea,
            "Purchases per year by age group",
            "Year",
            "Purchases",
            "sales_by_age_group.png",
        ),
        &paths.out_dir,
    )?);

    // Mean price per building, console and summary only.
    let price_by_building = AggregateTable::reduce_by(
        &properties,
        "building_number",
        "price_in_dollars",
        Reduce::Mean,
    )?;

    // Area against price over rows where both are present.
    let areas = column_values(&properties, "area")?;
    let prices = column_values(&properties, "price_in_dollars")?;
    let (paired_areas, paired_prices) = complete_cases(&areas, &prices);
    let (area_price_covariance, area_price_correlation, correlation_note) =
        match population_covariance(&paired_areas, &paired_prices) {
            Ok(covariance) => match pearson_correlation(&paired_areas, &paired_prices) {
                Ok(correlation) => (Some(covariance), Some(correlation), None),
                Err(err) => (Some(covariance), None, Some(err.to_string())),
            },
            Err(err) => (None, None, Some(err.to_string())),
        };

    let highlights = build_highlights(&sold_by_country, &satisfaction, &sales_by_year);
    let tables = vec![
        satisfaction,
        sold_by_country,
        price_bins,
        sales_by_year,
        price_by_building,
    ];
    for table in &tables {
        TableExporter::print(table);
    }

    let mut summary = RunSummary {
        properties_cleaning,
        customers_cleaning,
        enrichment,
        highlights,
        tables,
        area_price_covariance,
        area_price_correlation,
        correlation_note,
        charts,
        exports,
    };
    let summary_txt = TableExporter::write_summary(&summary, &paths.out_dir)?;
    let summary_json = TableExporter::write_summary_json(&summary, &paths.out_dir)?;
    summary.exports.push(summary_txt);
    summary.exports.push(summary_json);

    info!(
        charts = summary.charts.len(),
        exports = summary.exports.len(),
        "analysis complete"
    );
    Ok(summary)
}

/// A numeric column as an option vector, in row order.
fn column_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
    let cast = df.column(column)?.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn build_highlights(
    sold_by_country: &AggregateTable,
    satisfaction: &AggregateTable,
    sales_by_year: &AggregateTable,
) -> Vec<String> {
    let mut highlights = Vec::new();

    if let Some(top) = sold_by_country.rows.first() {
        let share = top.relative_frequency.unwrap_or(0.0) * 100.0;
        highlights.push(format!(
            "Most sales in {} ({} listings, {:.1}% of all sold)",
            top.label, top.count, share
        ));
    }
    if let Some(best) = satisfaction
        .rows
        .iter()
        .max_by(|a, b| a.metric.total_cmp(&b.metric))
    {
        highlights.push(format!(
            "Highest average deal satisfaction in {} ({:.2})",
            best.label, best.metric
        ));
    }
    if let Some(busiest) = sales_by_year
        .rows
        .iter()
        .max_by(|a, b| a.metric.total_cmp(&b.metric))
    {
        highlights.push(format!(
            "Busiest year: {} with {} purchases",
            busiest.label, busiest.count
        ));
    }
    highlights
}
