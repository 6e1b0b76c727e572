//! Stats module - group-by aggregation and correlation

mod aggregator;
mod correlation;

pub use aggregator::{
    AggregateRow, AggregateTable, BinnedDistribution, Crosstab, Reduce, StatsError,
};
pub use correlation::{
    complete_cases, pearson_correlation, population_covariance, CorrelationError,
};
