use crate::stats::AggregatedStats;
use crate::util::{mean, rate_of, variance};
use serde::{Deserialize, Serialize};

/// Figures both sides are compared on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub mean_rate: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl Profile {
    /// Profile of a raw interval list, `None` when empty
    pub fn from_intervals(intervals: &[f64]) -> Option<Self> {
        let mean_interval = mean(intervals)?;
        let variance = variance(intervals)?;
        Some(Self {
            mean_rate: rate_of(mean_interval).unwrap_or(0.0),
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

impl From<&AggregatedStats> for Profile {
    fn from(s: &AggregatedStats) -> Self {
        Self {
            mean_rate: s.mean_rate,
            variance: s.variance,
            std_dev: s.std_dev,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RealismBand {
    Excellent,
    Good,
    #[strum(to_string = "NEEDS WORK")]
    NeedsWork,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub human: Profile,
    pub generated: Profile,
    /// signed gap of generated vs human, in percent of the human figure
    pub rate_gap_pct: f64,
    pub variance_gap_pct: f64,
    pub std_dev_gap_pct: f64,
    pub variance_points: u32,
    pub rate_points: u32,
    pub std_dev_points: u32,
    pub realism: u32,
    pub band: RealismBand,
    pub notes: Vec<String>,
}

pub fn compare(human: Profile, generated: Profile) -> Comparison {
    let rate_gap_pct = signed_gap(generated.mean_rate, human.mean_rate);
    let variance_gap_pct = signed_gap(generated.variance, human.variance);
    let std_dev_gap_pct = signed_gap(generated.std_dev, human.std_dev);

    let variance_points = match relative_diff(generated.variance, human.variance) {
        d if d < 0.15 => 50,
        d if d < 0.30 => 35,
        d if d < 0.50 => 20,
        _ => 5,
    };
    let rate_points = match relative_diff(generated.mean_rate, human.mean_rate) {
        d if d < 0.10 => 30,
        d if d < 0.20 => 20,
        d if d < 0.35 => 10,
        _ => 5,
    };
    let std_dev_points = match relative_diff(generated.std_dev, human.std_dev) {
        d if d < 0.15 => 20,
        d if d < 0.30 => 12,
        _ => 5,
    };

    let realism = variance_points + rate_points + std_dev_points;
    let band = match realism {
        r if r >= 80 => RealismBand::Excellent,
        r if r >= 60 => RealismBand::Good,
        _ => RealismBand::NeedsWork,
    };

    let mut notes = Vec::new();
    match band {
        RealismBand::Excellent => notes.push("generated stream matches the baseline closely".to_string()),
        RealismBand::Good => {
            if variance_gap_pct < -20.0 {
                notes.push(format!(
                    "variance is {:.0}% lower than baseline; target ~{:.0}",
                    variance_gap_pct.abs(),
                    human.variance
                ));
            } else if variance_gap_pct > 20.0 {
                notes.push(format!("variance is {variance_gap_pct:.0}% higher than baseline"));
            }
            if rate_gap_pct.abs() > 15.0 {
                let dir = if rate_gap_pct > 0.0 { "faster" } else { "slower" };
                notes.push(format!("rate is {:.0}% {dir} than baseline", rate_gap_pct.abs()));
            }
        }
        RealismBand::NeedsWork => {
            if variance_points < 20 {
                notes.push(format!(
                    "variance mismatch ({variance_gap_pct:+.0}%): target {:.0}, currently {:.0}",
                    human.variance, generated.variance
                ));
            }
            if rate_points < 15 {
                notes.push(format!(
                    "rate mismatch ({rate_gap_pct:+.0}%): target {:.1}, currently {:.1}",
                    human.mean_rate, generated.mean_rate
                ));
            }
        }
    }

    Comparison {
        human,
        generated,
        rate_gap_pct,
        variance_gap_pct,
        std_dev_gap_pct,
        variance_points,
        rate_points,
        std_dev_points,
        realism,
        band,
        notes,
    }
}

fn signed_gap(generated: f64, human: f64) -> f64 {
    if human != 0.0 {
        (generated - human) / human * 100.0
    } else {
        0.0
    }
}

/// `|generated - human| / human`, or 1 when the baseline is not positive
fn relative_diff(generated: f64, human: f64) -> f64 {
    if human > 0.0 {
        (generated - human).abs() / human
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(mean_rate: f64, variance: f64, std_dev: f64) -> Profile {
        Profile {
            mean_rate,
            variance,
            std_dev,
        }
    }

    #[test]
    fn identical_profiles_score_full() {
        let p = profile(10.0, 2000.0, 44.7);
        let c = compare(p, p);
        assert_eq!(c.realism, 100);
        assert_eq!(c.band, RealismBand::Excellent);
        assert_eq!(c.rate_gap_pct, 0.0);
    }

    #[test]
    fn tier_boundaries() {
        let human = profile(10.0, 1000.0, 40.0);
        // variance +20%, rate +15%, std dev +20%
        let c = compare(human, profile(11.5, 1200.0, 48.0));
        assert_eq!(c.variance_points, 35);
        assert_eq!(c.rate_points, 20);
        assert_eq!(c.std_dev_points, 12);
        assert_eq!(c.realism, 67);
        assert_eq!(c.band, RealismBand::Good);
        assert!((c.variance_gap_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn large_gaps_need_work_with_notes() {
        let human = profile(10.0, 2000.0, 45.0);
        let c = compare(human, profile(6.0, 300.0, 17.0));
        assert_eq!(c.realism, 15);
        assert_eq!(c.band, RealismBand::NeedsWork);
        assert_eq!(c.notes.len(), 2);
        assert!(c.notes[0].starts_with("variance mismatch (-85%)"));
    }

    #[test]
    fn profile_from_intervals() {
        let p = Profile::from_intervals(&[80.0, 120.0, 80.0, 120.0]).unwrap();
        assert_eq!(p.mean_rate, 10.0);
        assert_eq!(p.variance, 400.0);
        assert_eq!(p.std_dev, 20.0);
        assert!(Profile::from_intervals(&[]).is_none());
    }

    #[test]
    fn zero_baseline_is_worst_tier() {
        let c = compare(profile(0.0, 0.0, 0.0), profile(10.0, 100.0, 10.0));
        assert_eq!(c.realism, 15);
        assert_eq!(c.variance_gap_pct, 0.0);
    }
}
