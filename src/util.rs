pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Population variance
pub fn variance(data: &[f64]) -> Option<f64> {
    match (mean(data), data.len()) {
        (Some(data_mean), count) if count > 0 => Some(
            data.iter()
                .map(|value| {
                    let diff = data_mean - *value;

                    diff * diff
                })
                .sum::<f64>()
                / count as f64,
        ),
        _ => None,
    }
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Value at `floor(len * q)` of an ascending slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Events per second for an interval in milliseconds.
///
/// Non-positive or non-finite intervals have no rate.
pub fn rate_of(interval_ms: f64) -> Option<f64> {
    if interval_ms > 0.0 && interval_ms.is_finite() {
        Some(1000.0 / interval_ms)
    } else {
        None
    }
}
