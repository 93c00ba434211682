use crate::config::VarianceMode;
use crate::stats::AggregatedStats;
use serde::{Deserialize, Serialize};

/// Reported scores never exceed this
pub const MAX_SCORE: u32 = 100;

/// Target dispersion and rate figures for one mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsProfile {
    pub ideal_variance: f64,
    pub target_variance: f64,
    pub max_variance: f64,
    pub min_rate: f64,
    pub target_rate: f64,
    pub max_rate: f64,
    pub spike_rate: f64,
    pub min_std_dev: f64,
    pub target_std_dev: f64,
}

impl ThresholdsProfile {
    pub fn for_mode(mode: VarianceMode) -> Self {
        match mode {
            VarianceMode::Wide => Self {
                ideal_variance: 1500.0,
                target_variance: 2200.0,
                max_variance: 3500.0,
                min_rate: 7.0,
                target_rate: 10.0,
                max_rate: 13.0,
                spike_rate: 15.0,
                min_std_dev: 35.0,
                target_std_dev: 45.0,
            },
            VarianceMode::Narrow => Self {
                ideal_variance: 600.0,
                target_variance: 900.0,
                max_variance: 1500.0,
                min_rate: 5.0,
                target_rate: 8.0,
                max_rate: 11.0,
                spike_rate: 13.0,
                min_std_dev: 25.0,
                target_std_dev: 30.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verdict {
    Low,
    Medium,
    High,
}

impl Verdict {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => Verdict::Low,
            s if s >= 50 => Verdict::Medium,
            _ => Verdict::High,
        }
    }
}

/// Finer six-level reading of the same score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Grade {
    Excellent,
    Good,
    Acceptable,
    Caution,
    Risky,
    Critical,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 85 => Grade::Excellent,
            s if s >= 70 => Grade::Good,
            s if s >= 55 => Grade::Acceptable,
            s if s >= 40 => Grade::Caution,
            s if s >= 25 => Grade::Risky,
            _ => Grade::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// 0..=100
    pub score: u32,
    /// sum of criterion points before the ceiling, up to 110
    pub raw_points: u32,
    pub verdict: Verdict,
    pub grade: Grade,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub thresholds: ThresholdsProfile,
}

/// Score `stats` against `t`. Pure.
pub fn assess(stats: &AggregatedStats, t: &ThresholdsProfile) -> Assessment {
    let mut points = 0;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if stats.variance >= t.target_variance {
        points += 40;
    } else if stats.variance >= t.ideal_variance {
        points += 25;
        recommendations.push(format!(
            "Increase variance by +{}% to reach {}",
            gap_percent(t.target_variance, stats.variance),
            t.target_variance
        ));
    } else {
        points += 10;
        issues.push(format!(
            "Variance critically low ({:.0} vs {} minimum)",
            stats.variance, t.ideal_variance
        ));
        recommendations.push(format!(
            "CRITICAL: Increase variance by +{}% to reach {}",
            gap_percent(t.target_variance, stats.variance),
            t.target_variance
        ));
    }

    if stats.max_rate >= t.spike_rate {
        points += 25;
    } else if stats.max_rate >= t.max_rate {
        points += 15;
        recommendations.push(format!("Allow higher rate spikes (target: {}+)", t.spike_rate));
    } else {
        points += 5;
        issues.push(format!("No rate spikes detected (max: {:.1})", stats.max_rate));
        recommendations.push(format!("Enable rate spikes up to {}", t.spike_rate));
    }

    if (t.min_rate..=t.max_rate).contains(&stats.mean_rate) {
        points += 15;
    } else {
        points += 5;
        if stats.mean_rate > t.max_rate {
            issues.push(format!("Average rate too high ({:.1})", stats.mean_rate));
        } else {
            issues.push(format!("Average rate too low ({:.1})", stats.mean_rate));
        }
    }

    if stats.std_dev >= t.target_std_dev {
        points += 20;
    } else if stats.std_dev >= t.min_std_dev {
        points += 12;
        recommendations.push(format!("Increase std dev to {}ms", t.target_std_dev));
    } else {
        points += 5;
        issues.push(format!("Std dev too low ({:.1}ms)", stats.std_dev));
        recommendations.push(format!("Target std dev: {}ms", t.target_std_dev));
    }

    if stats.count > 20 {
        let ratio = stats.counters.pattern_breaks as f64 / (stats.count as f64 / 20.0);
        if ratio >= 0.8 {
            points += 10;
        } else if ratio >= 0.5 {
            points += 5;
        }
    }

    let score = points.min(MAX_SCORE);
    Assessment {
        score,
        raw_points: points,
        verdict: Verdict::from_score(score),
        grade: Grade::from_score(score),
        issues,
        recommendations,
        thresholds: *t,
    }
}

/// How far `actual` falls short of `target`, as a whole percentage of `actual`
fn gap_percent(target: f64, actual: f64) -> i64 {
    if actual > 0.0 {
        ((target / actual - 1.0) * 100.0) as i64
    } else {
        100
    }
}
