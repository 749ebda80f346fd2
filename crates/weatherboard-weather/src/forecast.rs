//! Daily sampling of the provider's 3-hour forecast series.

/// 24h / 3h cadence
pub const SAMPLES_PER_DAY: usize = 8;

pub const MAX_FORECAST_DAYS: usize = 5;

/// Reduce a 3-hour series to one sample per day: entries 0, 8, 16, ...
///
/// Assumes the series starts at a consistent offset; no timestamp alignment
/// is performed, so a short first bucket shifts every day boundary.
pub fn daily_samples<T>(series: Vec<T>) -> Vec<T> {
    series
        .into_iter()
        .step_by(SAMPLES_PER_DAY)
        .take(MAX_FORECAST_DAYS)
        .collect()
}
