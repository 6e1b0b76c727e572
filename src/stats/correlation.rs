//! Correlation Module
//! Population covariance and Pearson correlation with explicit failure modes
//! instead of NaN results.

use statrs::statistics::Statistics;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("vectors differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("cannot correlate empty vectors")]
    Empty,
    #[error("a vector has zero variance, the statistic is undefined")]
    ZeroVariance,
}

/// Population covariance of two equally long, non-degenerate vectors.
pub fn population_covariance(xs: &[f64], ys: &[f64]) -> Result<f64, CorrelationError> {
    validate(xs, ys)?;
    Ok(xs.population_covariance(ys))
}

/// Pearson correlation coefficient using population formulas.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64, CorrelationError> {
    validate(xs, ys)?;
    let covariance = xs.population_covariance(ys);
    Ok(covariance / (xs.population_std_dev() * ys.population_std_dev()))
}

/// Keep only the index positions where both columns hold a value, so the
/// resulting vectors are paired and equally long.
pub fn complete_cases(xs: &[Option<f64>], ys: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(a), Some(b)) => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), CorrelationError> {
    if xs.len() != ys.len() {
        return Err(CorrelationError::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    if xs.is_empty() {
        return Err(CorrelationError::Empty);
    }
    if xs.population_variance() == 0.0 || ys.population_variance() == 0.0 {
        return Err(CorrelationError::ZeroVariance);
    }
    Ok(())
}
