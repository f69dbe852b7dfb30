//! Confidence-score smoothing helpers.

/// Arithmetic mean of a slice of values, 0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Centered moving average that keeps the series length.
///
/// Windows are truncated at the boundaries. A window of 0 or 1, or a series
/// shorter than the window, is returned unchanged.
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || data.len() < window {
        return data.to_vec();
    }

    let pad = window / 2;
    let mut result = Vec::with_capacity(data.len());

    for i in 0..data.len() {
        let start = i.saturating_sub(pad);
        let end = (i + pad + 1).min(data.len());
        result.push(mean(&data[start..end]));
    }

    result
}
