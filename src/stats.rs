use crate::config::MinSamples;
use crate::session::EventCounters;
use crate::util::{mean, percentile, rate_of, variance};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall and active time of a session at the moment of a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionDurations {
    pub session: Duration,
    pub active: Duration,
}

/// Figures computed from the recent history window after each emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveFigures {
    pub current_rate: Option<f64>,
    pub window_variance: Option<f64>,
}

/// Summary of a session; every interval figure is in milliseconds and
/// every rate in events per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub count: usize,
    pub mean_interval: f64,
    pub min_interval: f64,
    pub max_interval: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    /// population variance of the full log
    pub variance: f64,
    pub std_dev: f64,
    pub mean_rate: f64,
    pub median_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub current_rate: Option<f64>,
    /// variance of the recent history window
    pub window_variance: Option<f64>,
    pub counters: EventCounters,
    pub session_secs: f64,
    pub active_secs: f64,
    pub idle_secs: f64,
}

/// Summarize `intervals`, or `None` below the snapshot minimum.
///
/// Rates derived from a non-positive interval fall back to 0.
pub fn summarize(
    intervals: &[f64],
    counters: EventCounters,
    durations: SessionDurations,
    live: LiveFigures,
    min: &MinSamples,
) -> Option<AggregatedStats> {
    if intervals.len() < min.snapshot.max(1) {
        return None;
    }

    let sorted: Vec<f64> = intervals.iter().copied().sorted_by(f64::total_cmp).collect();
    let mean_interval = mean(intervals)?;
    let variance = variance(intervals)?;
    let min_interval = *sorted.first()?;
    let max_interval = *sorted.last()?;
    let p50 = percentile(&sorted, 0.50)?;

    let session_secs = durations.session.as_secs_f64();
    let active_secs = durations.active.as_secs_f64();

    Some(AggregatedStats {
        count: intervals.len(),
        mean_interval,
        min_interval,
        max_interval,
        p10: percentile(&sorted, 0.10)?,
        p50,
        p90: percentile(&sorted, 0.90)?,
        variance,
        std_dev: variance.sqrt(),
        mean_rate: rate_of(mean_interval).unwrap_or(0.0),
        median_rate: rate_of(p50).unwrap_or(0.0),
        min_rate: rate_of(max_interval).unwrap_or(0.0),
        max_rate: rate_of(min_interval).unwrap_or(0.0),
        current_rate: live.current_rate,
        window_variance: live.window_variance,
        counters,
        session_secs,
        active_secs,
        idle_secs: (session_secs - active_secs).max(0.0),
    })
}

/// Mean rate over the trailing `min.current_rate_window` values, once at
/// least `min.current_rate` values exist.
pub fn current_rate(trailing: &[f64], min: &MinSamples) -> Option<f64> {
    if trailing.len() < min.current_rate {
        return None;
    }
    let start = trailing.len().saturating_sub(min.current_rate_window);
    rate_of(mean(&trailing[start..])?)
}

/// Variance of the trailing `window` values, once at least
/// `min.window_variance` values exist.
pub fn window_variance(trailing: &[f64], window: usize, min: &MinSamples) -> Option<f64> {
    if trailing.len() < min.window_variance {
        return None;
    }
    variance(&trailing[trailing.len().saturating_sub(window)..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summarize_plain(data: &[f64]) -> Option<AggregatedStats> {
        summarize(
            data,
            EventCounters::default(),
            SessionDurations::default(),
            LiveFigures::default(),
            &MinSamples::default(),
        )
    }

    #[test]
    fn none_below_snapshot_minimum() {
        assert!(summarize_plain(&[100.0; 19]).is_none());
        assert!(summarize_plain(&[]).is_none());
        assert!(summarize_plain(&[100.0; 20]).is_some());
    }

    #[test]
    fn percentiles_use_floor_index() {
        let data: Vec<f64> = (1..=20).rev().map(|v| v as f64 * 10.0).collect();
        let s = summarize_plain(&data).unwrap();
        // sorted 10..=200, indices 2, 10, 18
        assert_eq!(s.p10, 30.0);
        assert_eq!(s.p50, 110.0);
        assert_eq!(s.p90, 190.0);
        assert!(s.p10 <= s.p50 && s.p50 <= s.p90);
        assert_eq!(s.min_interval, 10.0);
        assert_eq!(s.max_interval, 200.0);
    }

    #[test]
    fn rates_are_derived_from_intervals() {
        let mut data = vec![100.0; 19];
        data.push(50.0);
        let s = summarize_plain(&data).unwrap();
        assert_eq!(s.max_rate, 20.0);
        assert_eq!(s.min_rate, 10.0);
        assert_eq!(s.median_rate, 10.0);
        assert!((s.mean_rate - 1000.0 / 97.5).abs() < 1e-9);
    }

    #[test]
    fn variance_is_population() {
        let data: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 80.0 } else { 120.0 }).collect();
        let s = summarize_plain(&data).unwrap();
        assert!((s.variance - 400.0).abs() < 1e-9);
        assert!((s.std_dev - 20.0).abs() < 1e-9);
    }

    #[test]
    fn idle_time_is_session_minus_active() {
        let s = summarize(
            &[100.0; 25],
            EventCounters::default(),
            SessionDurations {
                session: Duration::from_secs(10),
                active: Duration::from_secs(4),
            },
            LiveFigures {
                current_rate: Some(9.5),
                window_variance: Some(400.0),
            },
            &MinSamples::default(),
        )
        .unwrap();
        assert_eq!(s.session_secs, 10.0);
        assert_eq!(s.active_secs, 4.0);
        assert_eq!(s.idle_secs, 6.0);
        assert_eq!(s.current_rate, Some(9.5));
        assert_eq!(s.window_variance, Some(400.0));
    }

    #[test]
    fn zero_interval_has_no_rate() {
        let mut data = vec![100.0; 20];
        data[0] = 0.0;
        let s = summarize_plain(&data).unwrap();
        assert_eq!(s.max_rate, 0.0);
    }

    #[test]
    fn current_rate_uses_last_ten() {
        let min = MinSamples::default();
        assert_eq!(current_rate(&[100.0; 4], &min), None);
        assert_eq!(current_rate(&[100.0; 5], &min), Some(10.0));
        let mut data = vec![1_000.0; 30];
        data.extend([200.0; 10]);
        assert_eq!(current_rate(&data, &min), Some(5.0));
    }

    #[test]
    fn window_variance_needs_ten_and_uses_trailing_window() {
        let min = MinSamples::default();
        assert_eq!(window_variance(&[100.0; 9], 30, &min), None);
        let mut data = vec![0.0; 40];
        data.extend((0..30).map(|i| if i % 2 == 0 { 80.0 } else { 120.0 }));
        assert_eq!(window_variance(&data, 30, &min), Some(400.0));
    }
}
