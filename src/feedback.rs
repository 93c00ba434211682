use crate::config::{FeedbackConfig, MinSamples};
use crate::util::variance;
use rand::Rng;
use std::time::Duration;

/// Which band the measured variance fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackBand {
    /// below `low`
    Starved,
    /// `low..mid`
    Moderate,
    /// `mid..high`
    Fine,
    /// at or above `high`; the factor decays
    Saturated,
}

/// Streaming mean/variance (Welford) over every recorded interval
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningVariance {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningVariance {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Population variance, `None` when empty
    pub fn variance(&self) -> Option<f64> {
        (self.count > 0).then(|| self.m2 / self.count as f64)
    }
}

/// Correction factor applied as `base * (1 + factor)`, recomputed once per period
#[derive(Debug, Clone)]
pub struct VarianceFeedback {
    cfg: FeedbackConfig,
    factor: f64,
    last_check: Duration,
    adjustments: u64,
}

impl VarianceFeedback {
    pub fn new(cfg: FeedbackConfig, now: Duration) -> Self {
        Self {
            factor: cfg.initial,
            cfg,
            last_check: now,
            adjustments: 0,
        }
    }

    pub fn due(&self, now: Duration) -> bool {
        now.saturating_sub(self.last_check) >= Duration::from_millis(self.cfg.period_ms)
    }

    /// Recompute if the period elapsed and a source has enough samples.
    ///
    /// The full session is used when the mode prefers it and it is long
    /// enough, otherwise the trailing `window` values of `history`.
    pub fn maybe_recompute<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: Duration,
        session: &RunningVariance,
        history: &[f64],
        min: &MinSamples,
    ) -> Option<FeedbackBand> {
        if !self.due(now) {
            return None;
        }

        let measured = if self.cfg.prefer_session_log && session.count() >= min.feedback_session {
            session.variance()
        } else if history.len() >= min.feedback_window {
            let start = history.len().saturating_sub(self.cfg.window);
            variance(&history[start..])
        } else {
            None
        };
        let measured = measured?;

        let band = self.recompute(rng, measured);
        self.last_check = now;
        Some(band)
    }

    /// One control step for a measured variance
    pub fn recompute<R: Rng + ?Sized>(&mut self, rng: &mut R, measured: f64) -> FeedbackBand {
        let cfg = &self.cfg;
        let band = if measured < cfg.low {
            FeedbackBand::Starved
        } else if measured < cfg.mid {
            FeedbackBand::Moderate
        } else if measured < cfg.high {
            FeedbackBand::Fine
        } else {
            FeedbackBand::Saturated
        };

        match band {
            // never back off while dispersion is still starved
            FeedbackBand::Starved => self.factor = self.factor.max(cfg.starved.sample(rng)),
            FeedbackBand::Moderate => self.factor = cfg.moderate.sample(rng),
            FeedbackBand::Fine => self.factor = cfg.fine.sample(rng),
            FeedbackBand::Saturated => self.factor *= cfg.decay,
        }
        if band != FeedbackBand::Saturated {
            self.adjustments += 1;
        }

        tracing::debug!(measured, %band, factor = self.factor, "variance feedback");
        band
    }

    pub fn apply(&self, base: f64) -> f64 {
        base * (1.0 + self.factor)
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, TechniqueSet, VarianceMode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wide() -> FeedbackConfig {
        EngineConfig::for_mode(VarianceMode::Wide, TechniqueSet::Mixed).feedback
    }

    fn narrow() -> FeedbackConfig {
        EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Mixed).feedback
    }

    #[test]
    fn running_variance_matches_batch() {
        let data = [100.0, 120.0, 90.0, 102.0, 94.0, 180.0, 61.0];
        let mut rv = RunningVariance::default();
        for v in data {
            rv.push(v);
        }
        assert_eq!(rv.count(), 7);
        assert!((rv.variance().unwrap() - variance(&data).unwrap()).abs() < 1e-9);
        assert_eq!(RunningVariance::default().variance(), None);
    }

    #[test]
    fn bands_follow_thresholds() {
        let mut fb = VarianceFeedback::new(wide(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(fb.recompute(&mut rng, 100.0), FeedbackBand::Starved);
        assert!((0.40..=0.60).contains(&fb.factor()));
        assert_eq!(fb.recompute(&mut rng, 1500.0), FeedbackBand::Moderate);
        assert!((0.25..=0.40).contains(&fb.factor()));
        assert_eq!(fb.recompute(&mut rng, 2000.0), FeedbackBand::Fine);
        assert!((0.15..=0.28).contains(&fb.factor()));
        assert_eq!(fb.adjustments(), 3);
    }

    #[test]
    fn saturated_decays_existing_factor() {
        let mut fb = VarianceFeedback::new(narrow(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(2);
        let before = fb.factor();
        assert_eq!(fb.recompute(&mut rng, 5_000.0), FeedbackBand::Saturated);
        assert!((fb.factor() - before * 0.85).abs() < 1e-12);
        assert_eq!(fb.adjustments(), 0);
    }

    #[test]
    fn starved_factor_never_decreases_across_cycles() {
        let mut fb = VarianceFeedback::new(wide(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(3);
        let session = RunningVariance::default();
        // trailing window held artificially flat: variance ~ 4
        let history: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let min = MinSamples::default();

        let mut previous = fb.factor();
        for cycle in 1..=25u64 {
            let now = Duration::from_secs(10 * cycle);
            let band = fb.maybe_recompute(&mut rng, now, &session, &history, &min);
            assert_eq!(band, Some(FeedbackBand::Starved));
            assert!(fb.factor() >= previous, "cycle {cycle} decreased");
            previous = fb.factor();
        }
        assert!(previous > wide().initial);
    }

    #[test]
    fn not_due_before_period() {
        let mut fb = VarianceFeedback::new(wide(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(4);
        let history = vec![100.0; 30];
        let out = fb.maybe_recompute(
            &mut rng,
            Duration::from_secs(9),
            &RunningVariance::default(),
            &history,
            &MinSamples::default(),
        );
        assert_eq!(out, None);
        assert!(fb.due(Duration::from_secs(10)));
    }

    #[test]
    fn skips_without_enough_samples() {
        let mut fb = VarianceFeedback::new(wide(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(5);
        let history = vec![100.0; 14];
        let out = fb.maybe_recompute(
            &mut rng,
            Duration::from_secs(10),
            &RunningVariance::default(),
            &history,
            &MinSamples::default(),
        );
        assert_eq!(out, None);
        // still due; the check is retried on the next emission
        assert!(fb.due(Duration::from_secs(10)));
    }

    #[test]
    fn prefers_session_log_when_long_enough() {
        let mut fb = VarianceFeedback::new(wide(), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(6);
        let mut session = RunningVariance::default();
        for i in 0..60 {
            // alternating 40 / 160: variance 3600, saturated
            session.push(if i % 2 == 0 { 40.0 } else { 160.0 });
        }
        let flat_history = vec![100.0; 30];
        let out = fb.maybe_recompute(
            &mut rng,
            Duration::from_secs(10),
            &session,
            &flat_history,
            &MinSamples::default(),
        );
        assert_eq!(out, Some(FeedbackBand::Saturated));
    }

    #[test]
    fn apply_is_multiplicative() {
        let fb = VarianceFeedback::new(wide(), Duration::ZERO);
        assert!((fb.apply(100.0) - 115.0).abs() < 1e-9);
    }
}
