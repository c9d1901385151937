//! Descriptive statistics over return samples.
//!
//! Every function returns `None` when the sample is too small for the
//! statistic to be defined, so callers decide how to surface it.

/// Arithmetic mean. `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sum of squared deviations from the mean.
fn sum_squared_deviations(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum())
}

/// Sample variance (divisor N−1). `None` below two observations.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(sum_squared_deviations(values)? / (values.len() - 1) as f64)
}

/// Sample standard deviation (divisor N−1). `None` below two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Population variance (divisor N). `None` for an empty sample.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    Some(sum_squared_deviations(values)? / values.len() as f64)
}

/// Population covariance (divisor N) of two paired samples.
///
/// `None` when the samples are empty or of different lengths.
pub fn population_covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let cross: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Some(cross / x.len() as f64)
}

/// Percentile `q` (in `[0, 1]`) with linear interpolation between the
/// closest order statistics, at position `q·(n−1)` of the sorted sample.
///
/// `None` for an empty sample or `q` outside `[0, 1]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
